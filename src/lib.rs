//! # jpeg565
//!
//! An ultra-compact baseline JPEG decoder that emits RGB565 scanlines
//! through a caller-supplied sink.
//!
//! The decoder targets resource-constrained environments: a static working
//! set of a couple of kilobytes, a single heap allocation (one output-row
//! buffer sized to the image width), integer-only arithmetic throughout
//! (Winograd fixed-point IDCT, fixed-point BT.601 colour conversion), and
//! zero runtime dependencies.
//!
//! ## Supported input
//!
//! Baseline sequential JPEG (SOF0) only: 8-bit samples, grayscale or
//! YCbCr, 4:4:4 / 4:2:2 / 4:2:0 chroma subsampling, restart markers.
//! Progressive, hierarchical and arithmetic-coded streams are rejected.
//!
//! ## Example
//!
//! ```no_run
//! # fn main() -> jpeg565::Result<()> {
//! let data = std::fs::read("photo.jpg").unwrap();
//!
//! let info = jpeg565::probe(&data)?;
//! let width = info.width as usize;
//!
//! let mut framebuffer = vec![0u16; width * info.height as usize];
//! jpeg565::decode(&data, |y, row| {
//!     let start = y as usize * width;
//!     framebuffer[start..start + row.len()].copy_from_slice(row);
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! Rows arrive in top-down order; the row slice is reused between calls
//! and must be consumed before the sink returns.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bit_reader;
pub mod color;
mod decoder;
pub mod error;
pub mod huffman;
mod idct;

pub use color::pack_rgb565;
pub use decoder::{decode, probe, ImageInfo};
pub use error::{Error, Result};
