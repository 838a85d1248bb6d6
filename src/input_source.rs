//! Buffered byte source feeding the decoder.
//!
//! Behaves like the classic stdio source manager: the buffer is refilled in
//! `INPUT_BUF_SIZE` chunks, and when the underlying reader is exhausted a
//! synthetic EOI marker is inserted so the parser always terminates.

use std::fs::File;
use std::io::{ErrorKind, Read};

use crate::constants::INPUT_BUF_SIZE;
use crate::error::JpegError;
use crate::jpeg_marker_code::{JPEG_MARKER_START_BYTE, JpegMarkerCode};

const SYNTHETIC_EOI: [u8; 2] = [JPEG_MARKER_START_BYTE, JpegMarkerCode::EndOfImage as u8];

pub struct InputSource {
    reader: Option<Box<dyn Read>>,
    buffer: Box<[u8; INPUT_BUF_SIZE]>,
    next: usize,
    end: usize,
    start_of_file: bool,
    consumed: u64,
    synthetic_eoi_count: u32,
}

impl InputSource {
    pub fn new(reader: impl Read + 'static) -> Self {
        Self {
            reader: Some(Box::new(reader)),
            buffer: Box::new([0u8; INPUT_BUF_SIZE]),
            next: 0,
            end: 0,
            start_of_file: true,
            consumed: 0,
            synthetic_eoi_count: 0,
        }
    }

    pub fn from_file(file: File) -> Self {
        Self::new(file)
    }

    /// Number of bytes still waiting in the buffer.
    pub fn bytes_in_buffer(&self) -> usize {
        self.end - self.next
    }

    /// The unread part of the buffer.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer[self.next..self.end]
    }

    /// Total number of bytes handed out so far.
    pub fn position(&self) -> u64 {
        self.consumed
    }

    /// How many times end of input was papered over with a synthetic EOI.
    pub fn synthetic_eoi_count(&self) -> u32 {
        self.synthetic_eoi_count
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Releases the underlying reader. Bytes already buffered stay readable;
    /// further refills behave as end of input.
    pub fn close(&mut self) {
        self.reader = None;
    }

    /// Replaces the buffer contents with the next chunk of input and returns
    /// the number of bytes now available.
    pub fn fill_input_buffer(&mut self) -> Result<usize, JpegError> {
        let count = match self.reader.as_mut() {
            Some(reader) => read_retrying(&mut **reader, &mut self.buffer[..])?,
            None => 0,
        };

        if count == 0 {
            if self.start_of_file {
                return Err(JpegError::InputEmpty);
            }
            tracing::warn!("Premature end of JPEG file");
            self.synthetic_eoi_count += 1;
            self.buffer[..SYNTHETIC_EOI.len()].copy_from_slice(&SYNTHETIC_EOI);
            self.next = 0;
            self.end = SYNTHETIC_EOI.len();
        } else {
            self.next = 0;
            self.end = count;
        }

        self.start_of_file = false;
        Ok(self.bytes_in_buffer())
    }

    /// Returns the next byte, refilling the buffer on demand.
    pub fn next_byte(&mut self) -> Result<u8, JpegError> {
        if self.next == self.end && self.fill_input_buffer()? == 0 {
            return Err(JpegError::InputEmpty);
        }
        let byte = self.buffer[self.next];
        self.next += 1;
        self.consumed += 1;
        Ok(byte)
    }

    /// Reads a big-endian 16 bit value, as used by segment lengths.
    pub fn read_u16(&mut self) -> Result<u16, JpegError> {
        let high = self.next_byte()? as u16;
        let low = self.next_byte()? as u16;
        Ok((high << 8) | low)
    }

    /// Discards `count` bytes.
    pub fn skip(&mut self, mut count: usize) -> Result<(), JpegError> {
        while count > 0 {
            if self.next == self.end && self.fill_input_buffer()? == 0 {
                return Err(JpegError::InputEmpty);
            }
            let step = count.min(self.bytes_in_buffer());
            self.next += step;
            self.consumed += step as u64;
            count -= step;
        }
        Ok(())
    }
}

impl std::fmt::Debug for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSource")
            .field("bytes_in_buffer", &self.bytes_in_buffer())
            .field("position", &self.consumed)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn read_retrying(reader: &mut dyn Read, buffer: &mut [u8]) -> Result<usize, JpegError> {
    loop {
        match reader.read(buffer) {
            Ok(count) => return Ok(count),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::error!("input read failed: {e}");
                return Err(JpegError::FileRead);
            }
        }
    }
}
