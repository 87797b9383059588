//! Baseline JPEG decoding: marker parsing, block decode, MCU assembly.
//!
//! The decoder context is a flat value type owned by a single [`decode`]
//! call. The marker parser populates it up to SOS; the scan loop then walks
//! the MCU grid, decoding 8x8 blocks through the Huffman tables and the
//! Winograd IDCT and converting each MCU straight into a reusable RGB565
//! row buffer that is flushed to the sink one scanline at a time.

use crate::bit_reader::MsbBitReader;
use crate::color::ycbcr_to_rgb565;
use crate::error::{Error, Result};
use crate::huffman::HuffmanTable;
use crate::idct::{idct_cols, idct_rows, WINOGRAD_SCALE, ZIGZAG};

/// JPEG markers
const SOI: u8 = 0xD8; // Start of Image
const EOI: u8 = 0xD9; // End of Image
const SOF0: u8 = 0xC0; // Baseline DCT
const SOF2: u8 = 0xC2; // Progressive DCT
const DHT: u8 = 0xC4; // Define Huffman Table
const DQT: u8 = 0xDB; // Define Quantization Table
const DRI: u8 = 0xDD; // Define Restart Interval
const SOS: u8 = 0xDA; // Start of Scan
const RST0: u8 = 0xD0; // Restart marker 0
const RST7: u8 = 0xD7; // Restart marker 7
const TEM: u8 = 0x01; // Temporary marker, standalone

/// Image dimensions reported by [`probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Image width in pixels.
    pub width: u16,
    /// Image height in pixels.
    pub height: u16,
}

/// Decoder state for one decode call.
struct Decoder<'a> {
    reader: MsbBitReader<'a>,

    /// Frame parameters from SOF0.
    width: u16,
    height: u16,
    ncomp: u8,
    hsamp: [u8; 3],
    vsamp: [u8; 3],
    comp_qtab: [u8; 3],

    /// Scan parameters from SOS.
    comp_dc: [u8; 3],
    comp_ac: [u8; 3],

    /// DC predictor per component; reset at scan start and restarts.
    last_dc: [i16; 3],

    /// MCU geometry.
    mcu_w: u8,
    mcu_h: u8,
    mcus_x: u16,
    mcus_y: u16,

    /// Quantization tables in zig-zag order, pre-scaled for the Winograd
    /// IDCT at DQT parse time.
    qtab: [[i16; 64]; 2],

    /// Huffman tables: 0-1 = DC, 2-3 = AC.
    huff: [HuffmanTable; 4],

    /// Restart interval state.
    restart_interval: u16,
    restarts_left: u16,
    next_restart: u8,
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            reader: MsbBitReader::new(data),
            width: 0,
            height: 0,
            ncomp: 0,
            hsamp: [0; 3],
            vsamp: [0; 3],
            comp_qtab: [0; 3],
            comp_dc: [0; 3],
            comp_ac: [0; 3],
            last_dc: [0; 3],
            mcu_w: 0,
            mcu_h: 0,
            mcus_x: 0,
            mcus_y: 0,
            qtab: [[0; 64]; 2],
            huff: [HuffmanTable::EMPTY_TABLE; 4],
            restart_interval: 0,
            restarts_left: 0,
            next_restart: 0,
        }
    }

    /// Scan markers from SOI up to SOS, populating the decoder state.
    /// Returns with the cursor at the first entropy-coded byte.
    fn parse_markers(&mut self) -> Result<()> {
        if self.reader.read_u8() != 0xFF || self.reader.read_u8() != SOI {
            return Err(Error::MissingSoi);
        }
        while !self.reader.at_end() {
            let mut b = self.reader.read_u8();
            if b != 0xFF {
                continue;
            }
            // Collapse fill bytes.
            while b == 0xFF {
                b = self.reader.read_u8();
            }
            if b == 0x00 {
                continue;
            }
            match b {
                SOF0 => self.parse_sof()?,
                SOF2 => return Err(Error::ProgressiveJpeg),
                DHT => self.parse_dht()?,
                DQT => self.parse_dqt()?,
                DRI => self.parse_dri(),
                SOS => {
                    self.parse_sos()?;
                    return Ok(());
                }
                EOI => return Err(Error::MissingScan),
                _ => self.skip_segment(),
            }
        }
        Err(Error::MissingScan)
    }

    fn parse_sof(&mut self) -> Result<()> {
        let _len = self.reader.read_u16();
        let precision = self.reader.read_u8();
        if precision != 8 {
            return Err(Error::UnsupportedPrecision(precision));
        }
        self.height = self.reader.read_u16();
        self.width = self.reader.read_u16();
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }

        let ncomp = self.reader.read_u8();
        if ncomp != 1 && ncomp != 3 {
            return Err(Error::UnsupportedComponents(ncomp));
        }
        self.ncomp = ncomp;

        for i in 0..ncomp as usize {
            // Component id is ignored; components are taken in declaration
            // order, as the scan header repeats them in the same order.
            let _id = self.reader.read_u8();
            let samp = self.reader.read_u8();
            let h = samp >> 4;
            let v = samp & 0x0F;
            let qid = self.reader.read_u8();
            if qid > 1 {
                return Err(Error::InvalidTableId(qid));
            }
            if ncomp == 3 {
                let valid = if i == 0 {
                    (1..=2).contains(&h) && (1..=2).contains(&v)
                } else {
                    h == 1 && v == 1
                };
                if !valid {
                    return Err(Error::UnsupportedSampling { h, v });
                }
            }
            self.hsamp[i] = h;
            self.vsamp[i] = v;
            self.comp_qtab[i] = qid;
        }

        // MCU geometry. Single-component scans are always one 8x8 block
        // per MCU regardless of the declared sampling factors.
        if ncomp == 1 {
            self.mcu_w = 8;
            self.mcu_h = 8;
        } else {
            self.mcu_w = self.hsamp[0] * 8;
            self.mcu_h = self.vsamp[0] * 8;
        }
        self.mcus_x = ((self.width as u32 + self.mcu_w as u32 - 1) / self.mcu_w as u32) as u16;
        self.mcus_y = ((self.height as u32 + self.mcu_h as u32 - 1) / self.mcu_h as u32) as u16;
        Ok(())
    }

    fn parse_dqt(&mut self) -> Result<()> {
        let mut left = self.reader.read_u16() as i32 - 2;
        while left > 0 {
            let info = self.reader.read_u8();
            let prec = info >> 4;
            let id = (info & 0x0F) as usize;
            if id > 1 {
                return Err(Error::InvalidTableId(id as u8));
            }
            for i in 0..64 {
                let mut val = self.reader.read_u8() as i32;
                if prec != 0 {
                    // 16-bit entries: two unsigned bytes, big-endian.
                    val = (val << 8) | self.reader.read_u8() as i32;
                }
                // Fold the Winograd pre-scale in once, at parse time.
                self.qtab[id][i] = ((val * WINOGRAD_SCALE[i] as i32 + 4) >> 3) as i16;
            }
            left -= 65 + if prec != 0 { 64 } else { 0 };
        }
        if left < 0 {
            return Err(Error::TruncatedSegment);
        }
        Ok(())
    }

    fn parse_dht(&mut self) -> Result<()> {
        let mut left = self.reader.read_u16() as i32 - 2;
        while left > 0 {
            let info = self.reader.read_u8();
            let class = info >> 4;
            let id = info & 0x0F;
            if class > 1 {
                return Err(Error::InvalidTableId(class));
            }
            if id > 1 {
                return Err(Error::InvalidTableId(id));
            }

            let mut counts = [0u8; 16];
            for c in counts.iter_mut() {
                *c = self.reader.read_u8();
            }
            let total: usize = counts.iter().map(|&c| c as usize).sum();
            let mut symbols = [0u8; 256];
            for i in 0..total {
                let v = self.reader.read_u8();
                if i < 256 {
                    symbols[i] = v;
                }
            }

            let table = (class * 2 + id) as usize;
            self.huff[table] = HuffmanTable::build(&counts, &symbols[..total.min(256)]);
            left -= 17 + total as i32;
        }
        if left < 0 {
            return Err(Error::TruncatedSegment);
        }
        Ok(())
    }

    fn parse_sos(&mut self) -> Result<()> {
        let mut left = self.reader.read_u16() as i32 - 2;
        let ns = self.reader.read_u8();
        left -= 1;
        if ns != self.ncomp {
            return Err(Error::ScanComponentMismatch {
                expected: self.ncomp,
                got: ns,
            });
        }
        for i in 0..ns as usize {
            let _id = self.reader.read_u8();
            let tabs = self.reader.read_u8();
            let dc = tabs >> 4;
            let ac = tabs & 0x0F;
            if dc > 1 {
                return Err(Error::InvalidTableId(dc));
            }
            if ac > 1 {
                return Err(Error::InvalidTableId(ac));
            }
            self.comp_dc[i] = dc;
            self.comp_ac[i] = ac;
            left -= 2;
        }
        if left < 0 {
            return Err(Error::TruncatedSegment);
        }
        // Spectral selection and successive approximation bytes.
        while left > 0 {
            self.reader.read_u8();
            left -= 1;
        }
        Ok(())
    }

    fn parse_dri(&mut self) {
        let _len = self.reader.read_u16();
        self.restart_interval = self.reader.read_u16();
    }

    fn skip_segment(&mut self) {
        let len = self.reader.read_u16();
        if len >= 2 {
            self.reader.skip(len as usize - 2);
        }
    }

    /// Decode one 8x8 block of component `comp` into `out` samples.
    fn decode_block(&mut self, comp: usize, out: &mut [u8; 64]) -> Result<()> {
        let mut block = [0i16; 64];
        let q = &self.qtab[self.comp_qtab[comp] as usize];

        // DC: category symbol, then the sign-extended difference.
        let dc_table = self.comp_dc[comp] as usize;
        let s = self.huff[dc_table].decode(&mut self.reader)?;
        let nbits = s & 0x0F;
        let diff = extend(self.reader.get_bits(nbits), nbits);
        let dc = self.last_dc[comp].wrapping_add(diff);
        self.last_dc[comp] = dc;
        block[0] = (dc as i32 * q[0] as i32) as i16;

        // AC run/length pairs. The quantization table is indexed in
        // zig-zag order, matching its pre-scaled storage.
        let ac_table = self.comp_ac[comp] as usize + 2;
        let mut k = 1usize;
        while k < 64 {
            let s = self.huff[ac_table].decode(&mut self.reader)?;
            let run = (s >> 4) as usize;
            let size = s & 0x0F;
            if size == 0 {
                if run == 15 {
                    k += 16; // ZRL: sixteen zero coefficients
                    continue;
                }
                break; // EOB
            }
            k += run;
            if k >= 64 {
                return Err(Error::AcRunOverflow);
            }
            let ac = extend(self.reader.get_bits(size), size);
            block[ZIGZAG[k] as usize] = (ac as i32 * q[k] as i32) as i16;
            k += 1;
        }

        idct_rows(&mut block);
        idct_cols(&block, out);
        Ok(())
    }

    /// Resynchronise at a restart marker and reset the scan-local state.
    fn process_restart(&mut self) {
        self.reader.resync_restart();
        self.last_dc = [0; 3];
        self.restarts_left = self.restart_interval;
        // The observed marker index is tracked but not validated; a
        // mismatch does not abort the decode.
        self.next_restart = (self.next_restart + 1) & 7;
    }

    /// Walk the MCU grid, emitting completed image rows to the sink.
    fn decode_scan<S>(&mut self, sink: &mut S) -> Result<()>
    where
        S: FnMut(u16, &[u16]),
    {
        if self.restart_interval != 0 {
            self.restarts_left = self.restart_interval;
            self.next_restart = 0;
        }

        let width = self.width as usize;
        let height = self.height as usize;
        let mcu_w = self.mcu_w as usize;
        let mcu_h = self.mcu_h as usize;

        // The row buffer is the only heap allocation of a decode.
        let buf_len = width * mcu_h;
        let mut row_buf: Vec<u16> = Vec::new();
        row_buf
            .try_reserve_exact(buf_len)
            .map_err(|_| Error::OutOfMemory)?;
        row_buf.resize(buf_len, 0);

        let color = self.ncomp == 3;
        // Nearest-neighbour chroma upsampling is a coordinate shift.
        let h_shift = (color && self.hsamp[0] > 1) as usize;
        let v_shift = (color && self.vsamp[0] > 1) as usize;
        let (ny_h, ny_v) = if color {
            (self.hsamp[0] as usize, self.vsamp[0] as usize)
        } else {
            (1, 1)
        };

        let mut y_blocks = [[0u8; 64]; 4];
        let mut cb_block = [0u8; 64];
        let mut cr_block = [0u8; 64];

        for mcu_y in 0..self.mcus_y as usize {
            row_buf.fill(0);

            for mcu_x in 0..self.mcus_x as usize {
                if self.restart_interval != 0 {
                    if self.restarts_left == 0 {
                        self.process_restart();
                    }
                    self.restarts_left -= 1;
                }

                // Luma blocks in raster order, then one chroma block each.
                for vy in 0..ny_v {
                    for hx in 0..ny_h {
                        self.decode_block(0, &mut y_blocks[vy * ny_h + hx])?;
                    }
                }
                if color {
                    self.decode_block(1, &mut cb_block)?;
                    self.decode_block(2, &mut cr_block)?;
                }

                let px0 = mcu_x * mcu_w;
                for py in 0..mcu_h {
                    if mcu_y * mcu_h + py >= height {
                        break;
                    }
                    for px in 0..mcu_w {
                        let img_x = px0 + px;
                        if img_x >= width {
                            break;
                        }
                        let (y, cb, cr) = if color {
                            let yb = (py >> 3) * ny_h + (px >> 3);
                            let y = y_blocks[yb][(py & 7) * 8 + (px & 7)];
                            let cx = px >> h_shift;
                            let cy = py >> v_shift;
                            (y, cb_block[cy * 8 + cx], cr_block[cy * 8 + cx])
                        } else {
                            (y_blocks[0][py * 8 + px], 128, 128)
                        };
                        row_buf[py * width + img_x] = ycbcr_to_rgb565(y, cb, cr);
                    }
                }
            }

            for py in 0..mcu_h {
                let img_y = mcu_y * mcu_h + py;
                if img_y >= height {
                    break;
                }
                sink(img_y as u16, &row_buf[py * width..(py + 1) * width]);
            }
        }
        Ok(())
    }
}

/// Standard JPEG sign extension of an `nbits`-wide magnitude value.
fn extend(val: u16, nbits: u8) -> i16 {
    if nbits == 0 {
        return 0;
    }
    if (val as u32) < (1u32 << (nbits - 1)) {
        val as i16 - ((1u32 << nbits) - 1) as i16
    } else {
        val as i16
    }
}

/// Read the image dimensions from a JPEG buffer without decoding.
///
/// Scans the marker stream for the SOF0 frame header. Fails if the buffer
/// is not a JPEG, if no baseline frame header appears before EOI, or if
/// the frame header is truncated.
pub fn probe(data: &[u8]) -> Result<ImageInfo> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
        return Err(Error::MissingSoi);
    }
    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        match marker {
            0xFF => pos += 1, // fill byte
            0x00 => pos += 2, // stuffed data byte
            SOF0 => {
                if pos + 9 > data.len() {
                    return Err(Error::TruncatedSegment);
                }
                let height = u16::from_be_bytes([data[pos + 5], data[pos + 6]]);
                let width = u16::from_be_bytes([data[pos + 7], data[pos + 8]]);
                return Ok(ImageInfo { width, height });
            }
            EOI => break,
            SOI | TEM | RST0..=RST7 => pos += 2,
            _ => {
                if pos + 4 > data.len() {
                    break;
                }
                let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
                pos += 2 + len;
            }
        }
    }
    Err(Error::MissingFrame)
}

/// Decode a baseline JPEG to RGB565, delivering rows through `sink`.
///
/// The sink is called once per image row in top-down order with the row
/// index and a slice of `width` packed RGB565 pixels. The slice aliases a
/// buffer that is reused for subsequent rows, so it must be consumed (or
/// copied) before the sink returns.
///
/// On failure rows already delivered remain valid; the decode itself is
/// not resumable.
pub fn decode<S>(data: &[u8], mut sink: S) -> Result<()>
where
    S: FnMut(u16, &[u16]),
{
    let mut decoder = Decoder::new(data);
    decoder.parse_markers()?;
    if decoder.width == 0 || decoder.height == 0 {
        // A scan header with no preceding frame header.
        return Err(Error::MissingFrame);
    }
    decoder.decode_scan(&mut sink)
}
