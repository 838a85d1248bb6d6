//! JPEG 1 (ISO/IEC 10918-1 / ITU-T T.81) entropy decoding down to coefficients.
//!
//! Features:
//! - Baseline and extended sequential Huffman scans (8 and 12 bit precision).
//! - Progressive Huffman scans: DC first/refine, AC first/refine with EOB runs.
//! - Restart markers (DRI/RSTm) with resynchronisation on corrupt data.
//! - Interleaved and single-component scans, any sampling factors up to 4x4.
//!
//! Blocks are kept quantized and in natural order; no IDCT is performed.

pub mod coefficient_plane;
pub mod decoder;
pub mod huffman;

pub use decoder::CoefficientDecoder;
