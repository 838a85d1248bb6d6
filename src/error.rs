use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::ColorSpace;

/// Fatal conditions raised by the decoding engine.
///
/// Any of these aborts the current decode; the session turns them into a
/// [`SessionError::Decode`] after tearing the engine down.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegError {
    #[error("Insufficient memory")]
    NotEnoughMemory,
    #[error("Input file is empty")]
    InputEmpty,
    #[error("Read from input file failed")]
    FileRead,
    #[error("Not a JPEG file: starts with 0x{0:02x} 0x{1:02x}")]
    NoSoi(u8, u8),
    #[error("Invalid JPEG file structure: two SOI markers")]
    DuplicateStartOfImage,
    #[error("Invalid JPEG file structure: two SOF markers")]
    DuplicateStartOfFrame,
    #[error("Invalid JPEG file structure: SOS before SOF")]
    StartOfScanBeforeFrame,
    #[error("Invalid JPEG file structure: missing SOS marker")]
    NoScan,
    #[error("JPEG datastream contains no image")]
    NoImage,
    #[error("Unsupported JPEG process: SOF type 0x{0:02x}")]
    SofUnsupported(u8),
    #[error("Sorry, arithmetic coding is not supported")]
    ArithmeticNotImplemented,
    #[error("Unsupported marker type 0x{0:02x}")]
    UnknownMarker(u8),
    #[error("Bogus marker length")]
    InvalidMarkerSegmentSize,
    #[error("Unsupported JPEG data precision {0}")]
    BadPrecision(u8),
    #[error("Empty JPEG image (DNL not supported)")]
    EmptyImage,
    #[error("Too many color components: {0}, max {1}")]
    ComponentCount(usize, usize),
    #[error("Bogus sampling factors")]
    BadSampling,
    #[error("Invalid component ID {0} in SOS")]
    BadComponentId(u8),
    #[error("Duplicate component ID {0} in SOF")]
    DuplicateComponentId(u8),
    #[error("Invalid progressive parameters Ss={0} Se={1} Ah={2} Al={3}")]
    BadProgression(u8, u8, u8, u8),
    #[error("Bogus DQT index {0}")]
    BadDqtIndex(u8),
    #[error("Bogus DHT index {0}")]
    BadDhtIndex(u8),
    #[error("Bogus Huffman table definition")]
    BadHuffmanTable,
    #[error("Huffman table 0x{0:02x} was not defined")]
    NoHuffmanTable(u8),
    #[error("Too many comment segments: more than {0}")]
    TooManyComments(usize),
    #[error("Improper call to JPEG library in state {0}")]
    BadState(u8),
}

/// Failure of [`crate::session::Session::open`].
///
/// `Display` renders the diagnostic line written to standard error,
/// `<path> : error: <message>`.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{} : error: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} : error: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: JpegError,
    },
    #[error("{} : error: can not get coefficients", .path.display())]
    NoCoefficients { path: PathBuf },
    #[error("{} : error: is not a RGB image", .path.display())]
    NotRgb { path: PathBuf, color_space: ColorSpace },
    #[error("{} : error: wrong number of color components: {count}", .path.display())]
    ComponentCount { path: PathBuf, count: usize },
}

impl SessionError {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Open { path, .. }
            | Self::Decode { path, .. }
            | Self::NoCoefficients { path }
            | Self::NotRgb { path, .. }
            | Self::ComponentCount { path, .. } => path,
        }
    }

    /// The engine error behind a decode failure, if any.
    pub fn jpeg_error(&self) -> Option<JpegError> {
        match self {
            Self::Decode { source, .. } => Some(*source),
            _ => None,
        }
    }
}
