//! Decompression object: the engine surface the session drives.
//!
//! Call order is `set_source`, `read_header`, `read_coefficients`,
//! `finish_decompress`. Calls out of order fail with [`JpegError::BadState`].

use crate::error::JpegError;
use crate::input_source::InputSource;
use crate::jpeg1::CoefficientDecoder;
use crate::jpeg1::coefficient_plane::CoefficientPlane;
use crate::jpeg_marker_code::JpegMarkerCode;
use crate::jpeg_stream_reader::{JpegStreamReader, MarkerStop};
use crate::marker_processor::{AppMarkerSet, CommentTable, MarkerInterceptors, MarkerProcessor};
use crate::message::{EndOfImageObserver, ErrorManager};
use crate::FrameInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DecompressState {
    Start = 200,
    HeaderRead = 202,
    CoefficientsRead = 209,
    Finished = 210,
}

pub struct Decompressor {
    reader: JpegStreamReader,
    decoder: Option<CoefficientDecoder>,
    state: DecompressState,
}

impl Decompressor {
    /// Creates an engine with no input attached.
    pub fn new(err: ErrorManager) -> Self {
        let source = InputSource::new(std::io::empty());
        Self {
            reader: JpegStreamReader::new(source, err, MarkerInterceptors::default()),
            decoder: None,
            state: DecompressState::Start,
        }
    }

    pub fn state(&self) -> DecompressState {
        self.state
    }

    fn require_state(&self, state: DecompressState) -> Result<(), JpegError> {
        if self.state == state {
            Ok(())
        } else {
            Err(JpegError::BadState(self.state as u8))
        }
    }

    pub fn set_source(&mut self, source: InputSource) -> Result<(), JpegError> {
        self.require_state(DecompressState::Start)?;
        self.reader.replace_source(source);
        Ok(())
    }

    pub fn set_comment_table(&mut self, comments: CommentTable) -> Result<(), JpegError> {
        self.require_state(DecompressState::Start)?;
        self.reader.interceptors_mut().set_comment_table(comments);
        Ok(())
    }

    /// Installs `processor` for `marker`, replacing built-in handling.
    pub fn set_marker_processor(
        &mut self,
        marker: JpegMarkerCode,
        processor: MarkerProcessor,
    ) -> Result<(), JpegError> {
        self.require_state(DecompressState::Start)?;
        self.reader.interceptors_mut().set_marker_processor(marker, processor);
        Ok(())
    }

    pub fn read_header(&mut self) -> Result<(), JpegError> {
        self.require_state(DecompressState::Start)?;
        self.reader.read_header()?;
        self.state = DecompressState::HeaderRead;
        Ok(())
    }

    pub fn frame_info(&self) -> Option<FrameInfo> {
        self.reader.frame_info()
    }

    /// Decodes every remaining scan up to EOI.
    ///
    /// Returns `Ok(None)` when some component never appeared in a scan, as
    /// its plane would hold nothing but zeros.
    pub fn read_coefficients(&mut self) -> Result<Option<&[CoefficientPlane]>, JpegError> {
        if self.state == DecompressState::HeaderRead {
            let mut decoder = CoefficientDecoder::new(&self.reader)?;
            loop {
                decoder.decode_scan(&mut self.reader)?;
                match self.reader.read_markers()? {
                    MarkerStop::StartOfScan => continue,
                    MarkerStop::EndOfImage => break,
                }
            }
            self.decoder = Some(decoder);
            self.state = DecompressState::CoefficientsRead;
        }
        self.require_state(DecompressState::CoefficientsRead)?;

        Ok(self
            .decoder
            .as_ref()
            .filter(|decoder| decoder.all_components_scanned())
            .map(|decoder| decoder.planes()))
    }

    pub fn coefficient_planes(&self) -> Option<&[CoefficientPlane]> {
        self.decoder.as_ref().map(|decoder| decoder.planes())
    }

    pub fn finish_decompress(&mut self) -> Result<(), JpegError> {
        self.require_state(DecompressState::CoefficientsRead)?;
        self.state = DecompressState::Finished;
        Ok(())
    }

    /// Releases the input. Decoded state stays available.
    pub fn close_source(&mut self) {
        self.reader.source_mut().close();
    }

    pub fn take_comments(&mut self) -> CommentTable {
        self.reader.interceptors_mut().take_comments()
    }

    pub fn app_markers(&self) -> AppMarkerSet {
        self.reader.interceptors().app_markers()
    }

    /// Warnings raised so far, including premature end of input.
    pub fn num_warnings(&self) -> u32 {
        self.reader.err().num_warnings() + self.reader.source().synthetic_eoi_count()
    }

    pub fn take_observer(&mut self) -> Option<EndOfImageObserver> {
        self.reader.err_mut().take_observer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_calls_out_of_order() {
        let mut decompressor = Decompressor::new(ErrorManager::new());
        assert_eq!(decompressor.finish_decompress(), Err(JpegError::BadState(200)));
        assert_eq!(decompressor.read_coefficients().err(), Some(JpegError::BadState(200)));
    }

    #[test]
    fn test_empty_source() {
        let mut decompressor = Decompressor::new(ErrorManager::new());
        decompressor
            .set_source(InputSource::new(Cursor::new(Vec::new())))
            .unwrap();
        assert_eq!(decompressor.read_header(), Err(JpegError::InputEmpty));
        assert_eq!(decompressor.state(), DecompressState::Start);
    }

    #[test]
    fn test_unscanned_component_yields_no_coefficients() {
        // Two-component frame whose only scan covers the first component.
        let mut bytes = vec![0xFF, 0xD8];
        bytes.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0E, 8, 0x00, 0x08, 0x00, 0x08, 2, 1, 0x11, 0, 2, 0x11, 0]);
        bytes.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x14, 0x00, 1]);
        bytes.extend_from_slice(&[0u8; 15]);
        bytes.push(0);
        bytes.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x14, 0x10, 1]);
        bytes.extend_from_slice(&[0u8; 15]);
        bytes.push(0);
        bytes.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 1, 1, 0x00, 0, 63, 0]);
        // DC category 0 ("0"), EOB ("0"), padding.
        bytes.extend_from_slice(&[0x3F, 0xFF, 0xD9]);

        let mut decompressor = Decompressor::new(ErrorManager::new());
        decompressor.set_source(InputSource::new(Cursor::new(bytes))).unwrap();
        decompressor.read_header().unwrap();
        assert!(decompressor.read_coefficients().unwrap().is_none());
        assert_eq!(decompressor.coefficient_planes().map(|p| p.len()), Some(2));
        decompressor.finish_decompress().unwrap();
        assert_eq!(decompressor.state(), DecompressState::Finished);
    }
}
