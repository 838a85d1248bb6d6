//! Coefficient-level JPEG decoding for steganalysis.
//!
//! A [`Session`] opens one JPEG file, captures its COM payloads and the APPn
//! markers it carries, entropy decodes every scan into quantized DCT
//! coefficient planes and exposes the three planes of an RGB-space image
//! through a borrowed [`CoefficientView`]. Pixels are never reconstructed.
//!
//! ```no_run
//! use jpegcoef_rs::Session;
//!
//! let mut session = Session::new();
//! if session.open("photo.jpg").is_ok() {
//!     if let Some(view) = session.coefficients() {
//!         for component in view.iter() {
//!             println!("{}x{} blocks", component.width_in_blocks(), component.height_in_blocks());
//!         }
//!     }
//!     session.finish();
//! }
//! ```

pub mod coefficients;
pub mod constants;
pub mod decompress;
pub mod error;
pub mod input_source;
pub mod jpeg1;
pub mod jpeg_marker_code;
pub mod jpeg_stream_reader;
pub mod marker_processor;
pub mod message;
pub mod session;

pub use coefficients::{BlockGrid, CoefficientView, ComponentCoefficients};
pub use error::{JpegError, SessionError};
pub use jpeg1::coefficient_plane::{Block, CoefficientPlane};
pub use marker_processor::{AppMarkerSet, Comment, CommentOverflow};
pub use session::{Session, SessionOptions};

/// Color space of the coded data, or the space a pixel decode would produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    #[default]
    Unknown,
    Grayscale,
    Rgb,
    YCbCr,
    Cmyk,
    Ycck,
}

/// DCT process announced by the SOF marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodingProcess {
    #[default]
    Baseline,
    ExtendedSequential,
    Progressive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u8,
    pub component_count: usize,
    pub process: CodingProcess,
    pub jpeg_color_space: ColorSpace,
    pub out_color_space: ColorSpace,
}
