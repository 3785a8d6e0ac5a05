//! # qtc
//!
//! A lossless and lossy quadtree codec for square grayscale images whose
//! side length is a power of two.
//!
//! The codec represents an image as a hierarchical partition: every node
//! summarizes a square region by its integer mean intensity, uniform regions
//! collapse into single nodes, and a two-bit remainder stored per parent lets
//! the fourth child's mean be reconstructed exactly instead of transmitted.
//! An optional lossy pass merges subtrees whose local variance falls below an
//! adaptive threshold.
//!
//! ## Quick Start
//!
//! ### Compressing an image
//!
//! ```
//! use qtc::{QuadTree, Raster, compress};
//!
//! // 2x2 raster, row-major
//! let raster = Raster::from_pixels(2, vec![10, 20, 30, 40])?;
//! let tree = QuadTree::build(&raster);
//!
//! let mut qtc_bytes = Vec::new();
//! let info = compress(&tree, &mut qtc_bytes)?;
//! println!("{} bits packed ({:.2}%)", info.total_bits, info.ratio);
//! # Ok::<(), qtc::QtcError>(())
//! ```
//!
//! ### Decompressing back to pixels
//!
//! ```
//! use qtc::{QuadTree, Raster, compress, decompress};
//!
//! # let raster = Raster::from_pixels(2, vec![10, 20, 30, 40])?;
//! # let tree = QuadTree::build(&raster);
//! # let mut qtc_bytes = Vec::new();
//! # compress(&tree, &mut qtc_bytes)?;
//! let tree = decompress(&qtc_bytes[..])?;
//! let raster = tree.to_raster()?;
//! assert_eq!(raster.as_bytes(), &[10, 20, 30, 40]);
//! # Ok::<(), qtc::QtcError>(())
//! ```

use thiserror::Error;

pub mod bits;
pub mod decoder;
pub mod encoder;
pub mod grid;
pub mod lossy;
pub mod pgm;
pub mod raster;
pub mod tree;

pub use decoder::decompress;
pub use encoder::{compress, EncodeInfo};
pub use grid::render_grid;
pub use lossy::apply_lossy;
pub use pgm::{read_pgm, write_pgm};
pub use raster::Raster;
pub use tree::{QuadNode, QuadTree, Quadrant, VarianceStats};

/// Errors that can occur while building, filtering, encoding or decoding.
#[derive(Debug, Error)]
pub enum QtcError {
    /// A caller-supplied parameter was rejected (bad alpha, bad geometry
    /// arguments, contradictory options).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An underlying read or write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input stream is not a valid QTC or PGM document (bad magic,
    /// truncation, impossible field values).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The image geometry is unsupported (not square, side not a power of
    /// two, max value above 255).
    #[error("invalid image size: {0}")]
    InvalidSize(String),

    /// Memory for a large linear buffer could not be reserved.
    #[error("memory allocation failed")]
    AllocationFailed,
}

/// Result type for codec operations.
pub type Result<T> = core::result::Result<T, QtcError>;

// Stream-format constants shared by the encoder and decoder.
pub(crate) const QTC_MAGIC: &[u8; 3] = b"Q1\n";
pub(crate) const QTC_COMMENT_LINES: usize = 2;
pub(crate) const MAX_TREE_DEPTH: u8 = 32;
