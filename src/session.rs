//! Decode session: opens one JPEG file, captures its auxiliary markers and
//! keeps the decoded coefficient planes available until it is finished.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::coefficients::{BlockGrid, CoefficientView};
use crate::constants::{MAX_COMMENTS, MAXIMUM_APPLICATION_DATA_ID, REQUIRED_COMPONENT_COUNT};
use crate::decompress::Decompressor;
use crate::error::{JpegError, SessionError};
use crate::input_source::InputSource;
use crate::jpeg_marker_code::JpegMarkerCode;
use crate::marker_processor::{AppMarkerSet, Comment, CommentOverflow, CommentTable, MarkerProcessor};
use crate::message::{EndOfImageObserver, ErrorManager};
use crate::{ColorSpace, FrameInfo};

/// Per-session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Comments captured per image before `comment_overflow` applies.
    pub max_comments: usize,
    pub comment_overflow: CommentOverflow,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_comments: MAX_COMMENTS,
            comment_overflow: CommentOverflow::Discard,
        }
    }
}

struct OpenImage {
    path: PathBuf,
    decompressor: Decompressor,
    frame_info: FrameInfo,
    block_grids: [BlockGrid; REQUIRED_COMPONENT_COUNT],
    comments: CommentTable,
    app_markers: AppMarkerSet,
}

/// One decode session.
///
/// A session is closed until [`Session::open`] succeeds, and closed again by
/// [`Session::finish`], [`Session::destroy`], a failed `open` or drop. While
/// open it owns the decoder, the coefficient planes and the captured comments.
pub struct Session {
    options: SessionOptions,
    observer: Option<EndOfImageObserver>,
    image: Option<OpenImage>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_options(SessionOptions::default())
    }

    pub fn with_options(options: SessionOptions) -> Self {
        Self {
            options,
            observer: None,
            image: None,
        }
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// Registers the hook called when data follows the EOI marker. It stays
    /// registered across opens and is called at most once per open.
    pub fn set_end_of_image_observer<F>(&mut self, observer: F)
    where
        F: FnMut(&mut InputSource) + 'static,
    {
        self.observer = Some(Box::new(observer));
    }

    pub fn clear_end_of_image_observer(&mut self) {
        self.observer = None;
    }

    pub fn is_open(&self) -> bool {
        self.image.is_some()
    }

    /// Opens `path`, parses its header and decodes all coefficients.
    ///
    /// Any previous image is released first. On failure the diagnostic
    /// `<path> : error: <message>` is written to standard error and the
    /// session is left closed.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        self.destroy();
        let path = path.as_ref().to_path_buf();

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(source) => return Err(report(SessionError::Open { path, source })),
        };

        let mut decompressor = Decompressor::new(ErrorManager::with_observer(self.observer.take()));
        let decoded = decode(&mut decompressor, file, &self.options);
        self.observer = decompressor.take_observer();

        let has_coefficients = match decoded {
            Ok(has_coefficients) => has_coefficients,
            Err(source) => return Err(report(SessionError::Decode { path, source })),
        };
        if !has_coefficients {
            return Err(report(SessionError::NoCoefficients { path }));
        }

        let frame_info = decompressor.frame_info().unwrap_or_default();
        if frame_info.out_color_space != ColorSpace::Rgb {
            return Err(report(SessionError::NotRgb {
                path,
                color_space: frame_info.out_color_space,
            }));
        }
        if frame_info.component_count != REQUIRED_COMPONENT_COUNT {
            return Err(report(SessionError::ComponentCount {
                path,
                count: frame_info.component_count,
            }));
        }

        let planes = decompressor.coefficient_planes().unwrap_or_default();
        let mut block_grids = [BlockGrid::default(); REQUIRED_COMPONENT_COUNT];
        for (grid, plane) in block_grids.iter_mut().zip(planes) {
            *grid = BlockGrid::of(plane);
        }

        let comments = decompressor.take_comments();
        let app_markers = decompressor.app_markers();
        tracing::debug!(
            path = %path.display(),
            width = frame_info.width,
            height = frame_info.height,
            comments = comments.len(),
            discarded = comments.discarded(),
            app_markers = app_markers.bits(),
            warnings = decompressor.num_warnings(),
            "session opened"
        );

        self.image = Some(OpenImage {
            path,
            decompressor,
            frame_info,
            block_grids,
            comments,
            app_markers,
        });
        Ok(())
    }

    /// Completes the decode and releases the image. No-op when closed.
    pub fn finish(&mut self) {
        let Some(mut image) = self.image.take() else {
            return;
        };
        if let Err(err) = image.decompressor.finish_decompress() {
            tracing::warn!(path = %image.path.display(), "finish failed: {err}");
        }
        tracing::debug!(path = %image.path.display(), "session finished");
    }

    /// Releases the image without completing the decode. No-op when closed.
    pub fn destroy(&mut self) {
        if let Some(image) = self.image.take() {
            tracing::debug!(path = %image.path.display(), "session destroyed");
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.image.as_ref().map(|image| image.path.as_path())
    }

    pub fn frame_info(&self) -> Option<FrameInfo> {
        self.image.as_ref().map(|image| image.frame_info)
    }

    pub fn block_grids(&self) -> Option<[BlockGrid; REQUIRED_COMPONENT_COUNT]> {
        self.image.as_ref().map(|image| image.block_grids)
    }

    /// The three coefficient planes, borrowed for as long as the session is.
    pub fn coefficients(&self) -> Option<CoefficientView<'_>> {
        let planes = self.image.as_ref()?.decompressor.coefficient_planes()?;
        planes.try_into().ok().map(CoefficientView::new)
    }

    pub fn comments(&self) -> &[Comment] {
        self.image
            .as_ref()
            .map(|image| image.comments.as_slice())
            .unwrap_or_default()
    }

    /// Comments dropped because the table was full.
    pub fn discarded_comments(&self) -> usize {
        self.image.as_ref().map_or(0, |image| image.comments.discarded())
    }

    /// APPn markers (n in 1..=15) present in the file.
    pub fn app_markers(&self) -> AppMarkerSet {
        self.image.as_ref().map(|image| image.app_markers).unwrap_or_default()
    }

    pub fn num_warnings(&self) -> u32 {
        self.image
            .as_ref()
            .map_or(0, |image| image.decompressor.num_warnings())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("options", &self.options)
            .field("observer", &self.observer.is_some())
            .field("path", &self.path())
            .finish()
    }
}

/// Runs the engine up to the decoded coefficients. Returns whether every
/// component produced a plane.
fn decode(
    decompressor: &mut Decompressor,
    file: File,
    options: &SessionOptions,
) -> Result<bool, JpegError> {
    decompressor.set_source(InputSource::from_file(file))?;
    decompressor.set_comment_table(CommentTable::new(options.max_comments, options.comment_overflow))?;
    decompressor.set_marker_processor(JpegMarkerCode::Comment, MarkerProcessor::CaptureComment)?;
    for n in 1..=MAXIMUM_APPLICATION_DATA_ID {
        if let Some(marker) = JpegMarkerCode::application_data(n) {
            decompressor.set_marker_processor(marker, MarkerProcessor::SkipExtension)?;
        }
    }

    decompressor.read_header()?;
    let has_coefficients = decompressor.read_coefficients()?.is_some();
    decompressor.close_source();
    Ok(has_coefficients)
}

fn report(err: SessionError) -> SessionError {
    eprintln!("{err}");
    tracing::debug!(path = %err.path().display(), "open failed: {err}");
    err
}
