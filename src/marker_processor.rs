//! Marker interceptors: handlers the stream reader dispatches to for COM and
//! APPn segments instead of its built-in processing.

use std::collections::HashMap;

use crate::constants::{MAX_COMMENTS, SEGMENT_LENGTH_SIZE};
use crate::error::JpegError;
use crate::input_source::InputSource;
use crate::jpeg_marker_code::JpegMarkerCode;
use crate::message::{ErrorManager, MessageCode};

/// Handler installed for a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerProcessor {
    /// Copy the segment payload into the comment table.
    CaptureComment,
    /// Record the APPn number and discard the payload.
    SkipExtension,
}

/// What happens to comments arriving after the table is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentOverflow {
    /// Consume and drop the payload, counting it as discarded.
    #[default]
    Discard,
    /// Fail the decode with [`JpegError::TooManyComments`].
    Reject,
}

/// One captured COM payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    data: Vec<u8>,
}

impl Comment {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The payload as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// Bounded, ordered store of captured comments.
#[derive(Debug, Clone)]
pub struct CommentTable {
    entries: Vec<Comment>,
    capacity: usize,
    overflow: CommentOverflow,
    discarded: usize,
}

impl Default for CommentTable {
    fn default() -> Self {
        Self::new(MAX_COMMENTS, CommentOverflow::default())
    }
}

impl CommentTable {
    pub fn new(capacity: usize, overflow: CommentOverflow) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
            overflow,
            discarded: 0,
        }
    }

    pub fn as_slice(&self) -> &[Comment] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Comments dropped under [`CommentOverflow::Discard`].
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

/// Set of APPn numbers seen in the current file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppMarkerSet(u16);

impl AppMarkerSet {
    pub fn insert(&mut self, n: u8) {
        if n < 16 {
            self.0 |= 1 << n;
        }
    }

    pub fn contains(&self, n: u8) -> bool {
        n < 16 && self.0 & (1 << n) != 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = u8> {
        let bits = self.0;
        (0..16u8).filter(move |&n| bits & (1 << n) != 0)
    }
}

/// Dispatch map plus the state the handlers fill in.
#[derive(Debug, Default)]
pub struct MarkerInterceptors {
    processors: HashMap<JpegMarkerCode, MarkerProcessor>,
    comments: CommentTable,
    app_markers: AppMarkerSet,
}

impl MarkerInterceptors {
    pub fn new(comments: CommentTable) -> Self {
        Self {
            processors: HashMap::new(),
            comments,
            app_markers: AppMarkerSet::default(),
        }
    }

    pub fn set_marker_processor(&mut self, marker: JpegMarkerCode, processor: MarkerProcessor) {
        self.processors.insert(marker, processor);
    }

    pub fn processor_for(&self, marker: JpegMarkerCode) -> Option<MarkerProcessor> {
        self.processors.get(&marker).copied()
    }

    /// Replaces the comment table, keeping the registered processors.
    pub fn set_comment_table(&mut self, comments: CommentTable) {
        self.comments = comments;
    }

    pub fn comments(&self) -> &CommentTable {
        &self.comments
    }

    pub fn take_comments(&mut self) -> CommentTable {
        let fresh = CommentTable::new(self.comments.capacity, self.comments.overflow);
        std::mem::replace(&mut self.comments, fresh)
    }

    pub fn app_markers(&self) -> AppMarkerSet {
        self.app_markers
    }

    /// Runs the processor registered for `marker`. The marker itself has
    /// already been consumed; the source is positioned at the length field.
    pub fn process(
        &mut self,
        marker: JpegMarkerCode,
        processor: MarkerProcessor,
        source: &mut InputSource,
        err: &mut ErrorManager,
    ) -> Result<(), JpegError> {
        match processor {
            MarkerProcessor::CaptureComment => self.capture_comment(source, err),
            MarkerProcessor::SkipExtension => self.skip_extension(marker, source),
        }
    }

    fn capture_comment(
        &mut self,
        source: &mut InputSource,
        err: &mut ErrorManager,
    ) -> Result<(), JpegError> {
        let length = read_payload_length(source)?;

        if self.comments.is_full() {
            return match self.comments.overflow {
                CommentOverflow::Reject => Err(JpegError::TooManyComments(self.comments.capacity)),
                CommentOverflow::Discard => {
                    source.skip(length)?;
                    self.comments.discarded += 1;
                    err.emit_message(MessageCode::WarnCommentDiscarded { length }, source)
                }
            };
        }

        let mut data = Vec::new();
        data.try_reserve_exact(length)
            .map_err(|_| JpegError::NotEnoughMemory)?;
        for _ in 0..length {
            data.push(source.next_byte()?);
        }

        self.comments
            .entries
            .try_reserve(1)
            .map_err(|_| JpegError::NotEnoughMemory)?;
        self.comments.entries.push(Comment { data });
        tracing::trace!(length, count = self.comments.len(), "captured comment");
        Ok(())
    }

    fn skip_extension(
        &mut self,
        marker: JpegMarkerCode,
        source: &mut InputSource,
    ) -> Result<(), JpegError> {
        if let Some(n) = marker.application_data_id() {
            self.app_markers.insert(n);
        }
        let length = read_payload_length(source)?;
        source.skip(length)?;
        tracing::trace!(marker = marker.code(), length, "skipped application segment");
        Ok(())
    }
}

/// Reads a segment length field and returns the payload size it announces.
fn read_payload_length(source: &mut InputSource) -> Result<usize, JpegError> {
    let length = source.read_u16()? as usize;
    length
        .checked_sub(SEGMENT_LENGTH_SIZE)
        .ok_or(JpegError::InvalidMarkerSegmentSize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn comment_segments(payloads: &[&[u8]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for payload in payloads {
            let length = (payload.len() + 2) as u16;
            bytes.extend_from_slice(&length.to_be_bytes());
            bytes.extend_from_slice(payload);
        }
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }

    #[test]
    fn test_capture_comments_in_order() {
        let mut source = InputSource::new(Cursor::new(comment_segments(&[b"hello", b"", b"xyz"])));
        let mut err = ErrorManager::new();
        let mut interceptors = MarkerInterceptors::default();
        for _ in 0..3 {
            interceptors
                .process(JpegMarkerCode::Comment, MarkerProcessor::CaptureComment, &mut source, &mut err)
                .unwrap();
        }
        let comments = interceptors.comments().as_slice();
        assert_eq!(comments.len(), 3);
        assert_eq!(comments[0].data(), b"hello");
        assert!(comments[1].is_empty());
        assert_eq!(comments[2].text(), "xyz");
        assert_eq!(source.read_u16().unwrap(), 0xFFD9);
    }

    #[test]
    fn test_overflow_discard_keeps_stream_in_sync() {
        let mut source = InputSource::new(Cursor::new(comment_segments(&[b"a", b"bb", b"ccc"])));
        let mut err = ErrorManager::new();
        let mut interceptors = MarkerInterceptors::new(CommentTable::new(2, CommentOverflow::Discard));
        for _ in 0..3 {
            interceptors
                .process(JpegMarkerCode::Comment, MarkerProcessor::CaptureComment, &mut source, &mut err)
                .unwrap();
        }
        assert_eq!(interceptors.comments().len(), 2);
        assert_eq!(interceptors.comments().discarded(), 1);
        assert_eq!(err.num_warnings(), 1);
        assert_eq!(source.read_u16().unwrap(), 0xFFD9);
    }

    #[test]
    fn test_overflow_reject() {
        let mut source = InputSource::new(Cursor::new(comment_segments(&[b"a", b"b"])));
        let mut err = ErrorManager::new();
        let mut interceptors = MarkerInterceptors::new(CommentTable::new(1, CommentOverflow::Reject));
        interceptors
            .process(JpegMarkerCode::Comment, MarkerProcessor::CaptureComment, &mut source, &mut err)
            .unwrap();
        let result =
            interceptors.process(JpegMarkerCode::Comment, MarkerProcessor::CaptureComment, &mut source, &mut err);
        assert_eq!(result, Err(JpegError::TooManyComments(1)));
    }

    #[test]
    fn test_skip_extension_records_marker_number() {
        let mut source = InputSource::new(Cursor::new(vec![0x00, 0x05, 1, 2, 3, 0xAA]));
        let mut err = ErrorManager::new();
        let mut interceptors = MarkerInterceptors::default();
        interceptors
            .process(
                JpegMarkerCode::ApplicationData13,
                MarkerProcessor::SkipExtension,
                &mut source,
                &mut err,
            )
            .unwrap();
        assert!(interceptors.app_markers().contains(13));
        assert_eq!(interceptors.app_markers().iter().collect::<Vec<_>>(), vec![13]);
        assert_eq!(source.next_byte().unwrap(), 0xAA);
    }

    #[test]
    fn test_short_length_is_rejected() {
        let mut source = InputSource::new(Cursor::new(vec![0x00, 0x01]));
        let mut err = ErrorManager::new();
        let mut interceptors = MarkerInterceptors::default();
        let result =
            interceptors.process(JpegMarkerCode::Comment, MarkerProcessor::CaptureComment, &mut source, &mut err);
        assert_eq!(result, Err(JpegError::InvalidMarkerSegmentSize));
    }
}
