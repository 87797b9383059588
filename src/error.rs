//! Error types for the jpeg565 library.

use std::fmt;

/// Result type alias for jpeg565 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while probing or decoding a JPEG stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The buffer does not start with an SOI marker.
    MissingSoi,
    /// No SOF0 frame header was found before EOI.
    MissingFrame,
    /// EOI or end of input was reached before the scan header.
    MissingScan,
    /// Progressive (SOF2) streams are not supported.
    ProgressiveJpeg,
    /// Sample precision other than 8 bits.
    UnsupportedPrecision(u8),
    /// Component count other than 1 (grayscale) or 3 (YCbCr).
    UnsupportedComponents(u8),
    /// Sampling factors outside the supported range.
    UnsupportedSampling {
        /// Horizontal sampling factor.
        h: u8,
        /// Vertical sampling factor.
        v: u8,
    },
    /// Quantization or Huffman table index outside 0..=1.
    InvalidTableId(u8),
    /// The frame header declares a zero width or height.
    InvalidDimensions {
        /// Declared image width.
        width: u16,
        /// Declared image height.
        height: u16,
    },
    /// A marker segment is shorter than its payload requires.
    TruncatedSegment,
    /// The scan header component count does not match the frame header.
    ScanComponentMismatch {
        /// Component count declared in SOF0.
        expected: u8,
        /// Component count declared in SOS.
        got: u8,
    },
    /// A Huffman code fell through the 16-bit code search.
    BadHuffmanCode,
    /// An AC coefficient run stepped past the end of an 8x8 block.
    AcRunOverflow,
    /// The row buffer could not be allocated.
    OutOfMemory,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingSoi => write!(f, "Not a JPEG stream: missing SOI marker"),
            Error::MissingFrame => write!(f, "No baseline frame header (SOF0) found"),
            Error::MissingScan => write!(f, "End of image before scan data"),
            Error::ProgressiveJpeg => write!(f, "Progressive JPEG is not supported"),
            Error::UnsupportedPrecision(p) => {
                write!(f, "Unsupported sample precision: {} bits", p)
            }
            Error::UnsupportedComponents(n) => {
                write!(f, "Unsupported component count: {}", n)
            }
            Error::UnsupportedSampling { h, v } => {
                write!(f, "Unsupported sampling factors: {}x{}", h, v)
            }
            Error::InvalidTableId(id) => {
                write!(f, "Invalid table id {}: must be 0 or 1", id)
            }
            Error::InvalidDimensions { width, height } => {
                write!(f, "Invalid image dimensions: {}x{}", width, height)
            }
            Error::TruncatedSegment => write!(f, "Truncated marker segment"),
            Error::ScanComponentMismatch { expected, got } => {
                write!(
                    f,
                    "Scan component count {} does not match frame component count {}",
                    got, expected
                )
            }
            Error::BadHuffmanCode => write!(f, "Malformed Huffman code in entropy data"),
            Error::AcRunOverflow => write!(f, "AC coefficient run past end of block"),
            Error::OutOfMemory => write!(f, "Row buffer allocation failed"),
        }
    }
}

impl std::error::Error for Error {}
