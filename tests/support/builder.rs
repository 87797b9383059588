//! Minimal baseline JPEG byte-stream builder.
//!
//! Crafts deterministic JPEG inputs for conformance testing: marker
//! segments with explicit tables and an MSB-first entropy bit writer that
//! applies the `FF 00` byte-stuffing rule. Tests choose tiny custom
//! Huffman tables so the entropy bits can be written out by hand.

#![allow(dead_code)]

/// MSB-first entropy bit writer with JPEG byte stuffing.
pub struct EntropyWriter {
    bytes: Vec<u8>,
    acc: u8,
    nbits: u8,
}

impl EntropyWriter {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            acc: 0,
            nbits: 0,
        }
    }

    /// Append the low `len` bits of `code`, most significant first.
    pub fn put_bits(&mut self, code: u16, len: u8) {
        for i in (0..len).rev() {
            self.acc = (self.acc << 1) | ((code >> i) & 1) as u8;
            self.nbits += 1;
            if self.nbits == 8 {
                self.flush_byte();
            }
        }
    }

    fn flush_byte(&mut self) {
        self.bytes.push(self.acc);
        if self.acc == 0xFF {
            self.bytes.push(0x00);
        }
        self.acc = 0;
        self.nbits = 0;
    }

    /// Pad the final partial byte with one bits and return the stuffed
    /// entropy segment.
    pub fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            let pad = 8 - self.nbits;
            self.acc = (self.acc << pad) | ((1u16 << pad) - 1) as u8;
            self.nbits = 8;
            self.flush_byte();
        }
        self.bytes
    }
}

/// Baseline JPEG segment builder.
pub struct JpegBuilder {
    data: Vec<u8>,
}

impl JpegBuilder {
    /// Start a stream with the SOI marker.
    pub fn new() -> Self {
        Self {
            data: vec![0xFF, 0xD8],
        }
    }

    fn segment(mut self, marker: u8, payload: &[u8]) -> Self {
        let len = payload.len() + 2;
        self.data.push(0xFF);
        self.data.push(marker);
        self.data.push((len >> 8) as u8);
        self.data.push(len as u8);
        self.data.extend_from_slice(payload);
        self
    }

    /// 8-bit precision quantization table, values in zig-zag order.
    pub fn dqt(self, id: u8, table: &[u8; 64]) -> Self {
        let mut payload = vec![id];
        payload.extend_from_slice(table);
        self.segment(0xDB, &payload)
    }

    /// 16-bit precision quantization table, values in zig-zag order.
    pub fn dqt16(self, id: u8, table: &[u16; 64]) -> Self {
        let mut payload = vec![0x10 | id];
        for &v in table.iter() {
            payload.push((v >> 8) as u8);
            payload.push(v as u8);
        }
        self.segment(0xDB, &payload)
    }

    /// Huffman table: `class` 0 = DC, 1 = AC.
    pub fn dht(self, class: u8, id: u8, counts: &[u8; 16], symbols: &[u8]) -> Self {
        let mut payload = vec![(class << 4) | id];
        payload.extend_from_slice(counts);
        payload.extend_from_slice(symbols);
        self.segment(0xC4, &payload)
    }

    /// Baseline frame header; components are `(h, v, quant_id)` triples
    /// with ids assigned 1..=n.
    pub fn sof0(self, width: u16, height: u16, components: &[(u8, u8, u8)]) -> Self {
        let mut payload = vec![
            8,
            (height >> 8) as u8,
            height as u8,
            (width >> 8) as u8,
            width as u8,
            components.len() as u8,
        ];
        for (i, &(h, v, q)) in components.iter().enumerate() {
            payload.push(i as u8 + 1);
            payload.push((h << 4) | v);
            payload.push(q);
        }
        self.segment(0xC0, &payload)
    }

    /// Restart interval in MCUs.
    pub fn dri(self, interval: u16) -> Self {
        self.segment(0xDD, &[(interval >> 8) as u8, interval as u8])
    }

    /// Application segment with an arbitrary payload (skipped by decoders).
    pub fn app(self, n: u8, payload: &[u8]) -> Self {
        self.segment(0xE0 | (n & 0x0F), payload)
    }

    /// Scan header; `tables` holds one `(dc_id, ac_id)` pair per component.
    pub fn sos(self, tables: &[(u8, u8)]) -> Self {
        let mut payload = vec![tables.len() as u8];
        for (i, &(dc, ac)) in tables.iter().enumerate() {
            payload.push(i as u8 + 1);
            payload.push((dc << 4) | ac);
        }
        // Spectral selection 0..63, no successive approximation.
        payload.extend_from_slice(&[0x00, 0x3F, 0x00]);
        self.segment(0xDA, &payload)
    }

    /// Append pre-stuffed entropy-coded bytes.
    pub fn entropy(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Append restart marker `RSTn`.
    pub fn restart(mut self, n: u8) -> Self {
        self.data.push(0xFF);
        self.data.push(0xD0 | (n & 7));
        self
    }

    /// Terminate with EOI and return the stream.
    pub fn eoi(mut self) -> Vec<u8> {
        self.data.push(0xFF);
        self.data.push(0xD9);
        self.data
    }
}

/// One 1-bit code and two 2-bit codes: `0`, `10`, `11` for the three
/// symbols, in order.
pub fn tiny_table(symbols: [u8; 3]) -> ([u8; 16], Vec<u8>) {
    let mut counts = [0u8; 16];
    counts[0] = 1;
    counts[1] = 2;
    (counts, symbols.to_vec())
}

/// DC table used across the conformance tests:
/// `0` -> category 0 (diff 0), `10` -> category 7, `11` -> category 4.
pub const DC_SYMBOLS: [u8; 3] = [0, 7, 4];

/// AC table used across the conformance tests:
/// `0` -> EOB, `10` -> (run 0, size 1), `11` -> (run 15, size 1).
pub const AC_SYMBOLS: [u8; 3] = [0x00, 0x01, 0xF1];

/// Write one block with the given DC difference and all-zero AC, using
/// the [`DC_SYMBOLS`]/[`AC_SYMBOLS`] tables.
///
/// The difference must be 0 or have magnitude 64..=127 (DC category 7).
pub fn write_flat_block(w: &mut EntropyWriter, dc_diff: i16) {
    if dc_diff == 0 {
        w.put_bits(0b0, 1); // DC category 0: difference is zero
    } else {
        let mag = dc_diff.unsigned_abs();
        assert!((64..=127).contains(&mag), "diff must fit DC category 7");
        w.put_bits(0b10, 2); // DC category 7
        let bits = if dc_diff > 0 {
            dc_diff as u16
        } else {
            (dc_diff + 127) as u16
        };
        w.put_bits(bits, 7);
    }
    w.put_bits(0b0, 1); // EOB
}
