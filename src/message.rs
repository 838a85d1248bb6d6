//! Trace and warning messages emitted while decoding, and the error manager
//! that routes them.
//!
//! Fatal errors never pass through here: they are [`JpegError`] values
//! returned to the caller. What remains are non-fatal diagnostics, logged
//! through `tracing`, plus the end-of-image hook used to spot data appended
//! after the EOI marker.

use std::fmt;

use crate::error::JpegError;
use crate::input_source::InputSource;

/// Called with the live input source when bytes follow the EOI marker.
pub type EndOfImageObserver = Box<dyn FnMut(&mut InputSource)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCode {
    TraceStartOfImage,
    TraceEndOfImage,
    TraceStartOfFrame { marker: u8, width: u16, height: u16, components: u8 },
    TraceStartOfScan { components: u8 },
    TraceProgression { ss: u8, se: u8, ah: u8, al: u8 },
    TraceHuffmanTable { index: u8 },
    TraceQuantizationTable { index: u8, precision: u8 },
    TraceRestartInterval { interval: u16 },
    TraceRestart { index: u8 },
    TraceJfif { major: u8, minor: u8 },
    TraceAdobe { transform: u8 },
    TraceMiscMarker { marker: u8, length: u16 },
    TraceDefineNumberOfLines,
    WarnExtraneousData { count: usize, marker: u8 },
    WarnHitMarker,
    WarnMustResync { marker: u8, expected: u8 },
    WarnBogusProgression { component: usize, coefficient: u8 },
    WarnAdobeTransform { transform: u8 },
    WarnCommentDiscarded { length: usize },
    WarnNotSequential,
    WarnBadHuffmanCode,
}

impl MessageCode {
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::WarnExtraneousData { .. }
                | Self::WarnHitMarker
                | Self::WarnMustResync { .. }
                | Self::WarnBogusProgression { .. }
                | Self::WarnAdobeTransform { .. }
                | Self::WarnCommentDiscarded { .. }
                | Self::WarnNotSequential
                | Self::WarnBadHuffmanCode
        )
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::TraceStartOfImage => write!(f, "Start of Image"),
            Self::TraceEndOfImage => write!(f, "End Of Image"),
            Self::TraceStartOfFrame { marker, width, height, components } => write!(
                f,
                "Start Of Frame 0x{marker:02x}: width={width}, height={height}, components={components}"
            ),
            Self::TraceStartOfScan { components } => {
                write!(f, "Start Of Scan: {components} components")
            }
            Self::TraceProgression { ss, se, ah, al } => {
                write!(f, "  Ss={ss}, Se={se}, Ah={ah}, Al={al}")
            }
            Self::TraceHuffmanTable { index } => write!(f, "Define Huffman Table 0x{index:02x}"),
            Self::TraceQuantizationTable { index, precision } => {
                write!(f, "Define Quantization Table {index}  precision {precision}")
            }
            Self::TraceRestartInterval { interval } => {
                write!(f, "Define Restart Interval {interval}")
            }
            Self::TraceRestart { index } => write!(f, "RST{index}"),
            Self::TraceJfif { major, minor } => write!(f, "JFIF APP0 marker: version {major}.{minor:02}"),
            Self::TraceAdobe { transform } => write!(f, "Adobe APP14 marker: transform {transform}"),
            Self::TraceMiscMarker { marker, length } => {
                write!(f, "Miscellaneous marker 0x{marker:02x}, length {length}")
            }
            Self::TraceDefineNumberOfLines => write!(f, "Define Number of Lines (ignored)"),
            Self::WarnExtraneousData { count, marker } => write!(
                f,
                "Corrupt JPEG data: {count} extraneous bytes before marker 0x{marker:02x}"
            ),
            Self::WarnHitMarker => write!(f, "Corrupt JPEG data: premature end of data segment"),
            Self::WarnMustResync { marker, expected } => write!(
                f,
                "Corrupt JPEG data: found marker 0x{marker:02x} instead of RST{expected}"
            ),
            Self::WarnBogusProgression { component, coefficient } => write!(
                f,
                "Inconsistent progression sequence for component {component} coefficient {coefficient}"
            ),
            Self::WarnAdobeTransform { transform } => {
                write!(f, "Unknown Adobe color transform code {transform}")
            }
            Self::WarnCommentDiscarded { length } => {
                write!(f, "Comment table full, discarding {length} byte comment")
            }
            Self::WarnNotSequential => write!(f, "Invalid SOS parameters for sequential JPEG"),
            Self::WarnBadHuffmanCode => write!(f, "Corrupt JPEG data: bad Huffman code"),
        }
    }
}

/// Routes diagnostics for one decode.
#[derive(Default)]
pub struct ErrorManager {
    observer: Option<EndOfImageObserver>,
    num_warnings: u32,
    end_of_image_reported: bool,
}

impl ErrorManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: Option<EndOfImageObserver>) -> Self {
        Self {
            observer,
            ..Self::default()
        }
    }

    /// Hands the observer back so it can outlive this decode.
    pub fn take_observer(&mut self) -> Option<EndOfImageObserver> {
        self.observer.take()
    }

    pub fn num_warnings(&self) -> u32 {
        self.num_warnings
    }

    pub fn end_of_image_reported(&self) -> bool {
        self.end_of_image_reported
    }

    /// Logs `code` and, for the end-of-image trace, decides whether real data
    /// follows the EOI marker.
    ///
    /// An empty buffer is refilled: a refill of exactly two bytes is the
    /// synthetic EOI the source inserts at end of file, so the image ended
    /// cleanly. Any other remainder is reported to the observer.
    pub fn emit_message(
        &mut self,
        code: MessageCode,
        source: &mut InputSource,
    ) -> Result<(), JpegError> {
        if code.is_warning() {
            self.num_warnings += 1;
            tracing::warn!("{code}");
        } else {
            tracing::trace!("{code}");
        }

        if code != MessageCode::TraceEndOfImage || self.end_of_image_reported {
            return Ok(());
        }
        let Some(observer) = self.observer.as_mut() else {
            return Ok(());
        };

        if source.bytes_in_buffer() == 0 && source.fill_input_buffer()? == 2 {
            return Ok(());
        }

        tracing::debug!(
            position = source.position(),
            buffered = source.bytes_in_buffer(),
            "data follows end of image"
        );
        self.end_of_image_reported = true;
        observer(source);
        Ok(())
    }
}

impl fmt::Debug for ErrorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorManager")
            .field("observer", &self.observer.is_some())
            .field("num_warnings", &self.num_warnings)
            .field("end_of_image_reported", &self.end_of_image_reported)
            .finish()
    }
}
