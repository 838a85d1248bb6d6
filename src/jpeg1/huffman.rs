//! Huffman decoding for JPEG 1 scans.
//! Handles DHT table construction and the entropy-coded bit stream.

use crate::error::JpegError;
use crate::jpeg_marker_code::JPEG_MARKER_START_BYTE;
use crate::jpeg_stream_reader::JpegStreamReader;
use crate::message::MessageCode;

const MAX_CODE_LENGTH: usize = 16;

// DC symbols are magnitude categories; anything wider cannot be read back.
const MAX_DC_SYMBOL: u8 = 15;

/// Table class from the Tc nibble of a DHT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableClass {
    Dc,
    Ac,
}

/// Standard JPEG DC luminance Huffman table lengths (Table K.3).
pub const STD_LUMINANCE_DC_LENGTHS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];

/// Standard JPEG DC luminance Huffman table values (Table K.3).
pub const STD_LUMINANCE_DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// Standard JPEG AC luminance Huffman table lengths (Table K.5).
pub const STD_LUMINANCE_AC_LENGTHS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 125];

/// Standard JPEG AC luminance Huffman table values (Table K.5).
pub const STD_LUMINANCE_AC_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07,
    0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08, 0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52, 0xd1, 0xf0,
    0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x25, 0x26, 0x27, 0x28,
    0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49,
    0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69,
    0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
    0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7,
    0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5,
    0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2,
    0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9, 0xea, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

/// Canonical Huffman table in the min/max code form of ISO/IEC 10918-1 F.2.2.3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    values: Vec<u8>,
    min_code: [i32; MAX_CODE_LENGTH],
    max_code: [i32; MAX_CODE_LENGTH],
    val_ptr: [i32; MAX_CODE_LENGTH],
}

impl HuffmanTable {
    /// Builds a table from JPEG DHT lengths and values.
    ///
    /// Fails when the counts oversubscribe the code space or do not match the
    /// number of values, or when a DC table holds a category above 15.
    pub fn build_from_dht(
        class: TableClass,
        lengths: &[u8; MAX_CODE_LENGTH],
        values: &[u8],
    ) -> Result<Self, JpegError> {
        let total: usize = lengths.iter().map(|&n| n as usize).sum();
        if total > 256 || total != values.len() {
            return Err(JpegError::BadHuffmanTable);
        }
        if class == TableClass::Dc && values.iter().any(|&v| v > MAX_DC_SYMBOL) {
            return Err(JpegError::BadHuffmanTable);
        }

        let mut table = Self {
            values: values.to_vec(),
            min_code: [0; MAX_CODE_LENGTH],
            max_code: [-1; MAX_CODE_LENGTH],
            val_ptr: [0; MAX_CODE_LENGTH],
        };

        let mut code = 0i32;
        let mut val_idx = 0i32;
        for (i, &n_codes) in lengths.iter().enumerate() {
            if n_codes != 0 {
                table.val_ptr[i] = val_idx;
                table.min_code[i] = code;
                code += n_codes as i32;
                val_idx += n_codes as i32;
                table.max_code[i] = code - 1;
            }
            // All-ones codes are reserved.
            if code >= 1 << (i + 1) {
                return Err(JpegError::BadHuffmanTable);
            }
            code <<= 1;
        }
        Ok(table)
    }

    /// Looks up a `length`-bit code; `None` when no symbol has that code.
    fn lookup(&self, code: i32, length: usize) -> Option<u8> {
        let i = length - 1;
        if code <= self.max_code[i] {
            let idx = self.val_ptr[i] + (code - self.min_code[i]);
            self.values.get(idx as usize).copied()
        } else {
            None
        }
    }
}

/// Sign-extends a `size`-bit magnitude category value (F.2.2.1).
pub fn extend(value: u16, size: u8) -> i32 {
    if size == 0 {
        return 0;
    }
    let value = value as i32;
    if value < 1 << (size - 1) {
        value - (1 << size) + 1
    } else {
        value
    }
}

/// Bit-level reader over entropy-coded data with JPEG byte unstuffing.
///
/// Bytes are pulled from the stream reader's source. Hitting a marker leaves
/// its code with the stream reader and feeds zero bits from then on, so a
/// damaged scan decodes to zeros instead of failing.
#[derive(Debug, Default)]
pub struct JpegBitReader {
    bit_buffer: u64,
    bits_in_buffer: u32,
    insufficient_data: bool,
}

impl JpegBitReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops buffered bits, as required at restart boundaries.
    pub fn reset(&mut self) {
        self.bit_buffer = 0;
        self.bits_in_buffer = 0;
        self.insufficient_data = false;
    }

    /// Stops decoding until the next restart; used when a restart boundary
    /// leaves the reader sitting at a marker.
    pub fn hold_at_marker(&mut self) {
        self.insufficient_data = true;
    }

    /// True once the reader has run into a marker and is padding with zeros.
    pub fn insufficient_data(&self) -> bool {
        self.insufficient_data
    }

    pub fn bits_in_buffer(&self) -> u32 {
        self.bits_in_buffer
    }

    fn fill(&mut self, stream: &mut JpegStreamReader, needed: u32) -> Result<(), JpegError> {
        while self.bits_in_buffer <= 56 {
            if stream.unread_marker().is_some() {
                break;
            }
            let byte = stream.next_byte()?;
            if byte == JPEG_MARKER_START_BYTE {
                let mut code = stream.next_byte()?;
                while code == JPEG_MARKER_START_BYTE {
                    code = stream.next_byte()?;
                }
                if code != 0 {
                    stream.set_unread_marker(code);
                    break;
                }
            }
            self.bit_buffer = (self.bit_buffer << 8) | byte as u64;
            self.bits_in_buffer += 8;
        }

        if self.bits_in_buffer < needed {
            if !self.insufficient_data {
                stream.emit(MessageCode::WarnHitMarker)?;
                self.insufficient_data = true;
            }
            let pad = 64 - self.bits_in_buffer;
            self.bit_buffer = if pad >= 64 { 0 } else { self.bit_buffer << pad };
            self.bits_in_buffer = 64;
        }
        Ok(())
    }

    /// Reads `count` bits (at most 16), most significant first.
    pub fn read_bits(&mut self, stream: &mut JpegStreamReader, count: u8) -> Result<u16, JpegError> {
        if count == 0 {
            return Ok(0);
        }
        if count as usize > MAX_CODE_LENGTH {
            return Err(JpegError::BadHuffmanTable);
        }
        let count = count as u32;
        if self.bits_in_buffer < count {
            self.fill(stream, count)?;
        }
        let shift = self.bits_in_buffer - count;
        let value = (self.bit_buffer >> shift) & ((1u64 << count) - 1);
        self.bits_in_buffer -= count;
        Ok(value as u16)
    }

    pub fn read_bit(&mut self, stream: &mut JpegStreamReader) -> Result<bool, JpegError> {
        Ok(self.read_bits(stream, 1)? != 0)
    }

    /// Decodes one symbol. A code no table entry matches is reported as a
    /// warning and decodes as symbol 0.
    pub fn decode_huffman(
        &mut self,
        stream: &mut JpegStreamReader,
        table: &HuffmanTable,
    ) -> Result<u8, JpegError> {
        let mut code = 0i32;
        for length in 1..=MAX_CODE_LENGTH {
            code = (code << 1) | self.read_bits(stream, 1)? as i32;
            if let Some(symbol) = table.lookup(code, length) {
                return Ok(symbol);
            }
        }
        stream.emit(MessageCode::WarnBadHuffmanCode)?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_source::InputSource;
    use crate::marker_processor::MarkerInterceptors;
    use crate::message::ErrorManager;
    use std::io::Cursor;

    fn stream_over(bytes: Vec<u8>) -> JpegStreamReader {
        JpegStreamReader::new(
            InputSource::new(Cursor::new(bytes)),
            ErrorManager::new(),
            MarkerInterceptors::default(),
        )
    }

    #[test]
    fn test_extend() {
        assert_eq!(extend(0, 0), 0);
        assert_eq!(extend(0, 1), -1);
        assert_eq!(extend(1, 1), 1);
        assert_eq!(extend(0b010, 3), -5);
        assert_eq!(extend(0b101, 3), 5);
    }

    #[test]
    fn test_oversubscribed_table_is_rejected() {
        let mut lengths = [0u8; 16];
        lengths[0] = 3;
        assert_eq!(
            HuffmanTable::build_from_dht(TableClass::Ac, &lengths, &[0, 1, 2]),
            Err(JpegError::BadHuffmanTable)
        );
        lengths[0] = 1;
        assert_eq!(
            HuffmanTable::build_from_dht(TableClass::Ac, &lengths, &[0, 1]),
            Err(JpegError::BadHuffmanTable)
        );
    }

    #[test]
    fn test_unstuffing_and_marker_detection() {
        let mut stream = stream_over(vec![0xA5, 0xFF, 0x00, 0x3C, 0xFF, 0xD0, 0x11]);
        let mut reader = JpegBitReader::new();
        assert_eq!(reader.read_bits(&mut stream, 8).unwrap(), 0xA5);
        assert_eq!(reader.read_bits(&mut stream, 8).unwrap(), 0xFF);
        assert_eq!(reader.read_bits(&mut stream, 8).unwrap(), 0x3C);
        assert_eq!(stream.unread_marker(), Some(0xD0));
        assert!(!reader.insufficient_data());

        assert_eq!(reader.read_bits(&mut stream, 4).unwrap(), 0);
        assert!(reader.insufficient_data());
        assert_eq!(stream.err().num_warnings(), 1);
        assert_eq!(stream.next_byte().unwrap(), 0x11);
    }

    #[test]
    fn test_decode_standard_dc_symbols() {
        // Category 0 is "00", category 5 is "110", category 11 is "111111110".
        let mut stream = stream_over(vec![0b0011_0111, 0b1111_1000, 0xFF, 0xD9]);
        let table = HuffmanTable::build_from_dht(TableClass::Dc, &STD_LUMINANCE_DC_LENGTHS, &STD_LUMINANCE_DC_VALUES).unwrap();
        let mut reader = JpegBitReader::new();
        assert_eq!(reader.decode_huffman(&mut stream, &table).unwrap(), 0);
        assert_eq!(reader.decode_huffman(&mut stream, &table).unwrap(), 5);
        assert_eq!(reader.decode_huffman(&mut stream, &table).unwrap(), 11);
    }

    #[test]
    fn test_bad_code_decodes_as_zero() {
        let mut lengths = [0u8; 16];
        lengths[0] = 1;
        let table = HuffmanTable::build_from_dht(TableClass::Ac, &lengths, &[7]).unwrap();
        let mut stream = stream_over(vec![0x80, 0x00, 0x00, 0x00]);
        let mut reader = JpegBitReader::new();
        assert_eq!(reader.decode_huffman(&mut stream, &table).unwrap(), 0);
        assert_eq!(stream.err().num_warnings(), 1);
    }

    #[test]
    fn test_dc_table_rejects_wide_categories() {
        let mut lengths = [0u8; 16];
        lengths[0] = 1;
        assert_eq!(
            HuffmanTable::build_from_dht(TableClass::Dc, &lengths, &[0x50]),
            Err(JpegError::BadHuffmanTable)
        );
        assert_eq!(
            HuffmanTable::build_from_dht(TableClass::Dc, &lengths, &[16]),
            Err(JpegError::BadHuffmanTable)
        );
        assert!(HuffmanTable::build_from_dht(TableClass::Dc, &lengths, &[15]).is_ok());
        // AC symbols pack run and size, so the full byte range is legal.
        assert!(HuffmanTable::build_from_dht(TableClass::Ac, &lengths, &[0x50]).is_ok());
    }

    #[test]
    fn test_read_bits_rejects_more_than_sixteen() {
        let mut stream = stream_over(vec![0x12, 0x34, 0x56, 0x78, 0x9A]);
        let mut reader = JpegBitReader::new();
        assert_eq!(reader.read_bits(&mut stream, 17), Err(JpegError::BadHuffmanTable));
        assert_eq!(reader.read_bits(&mut stream, 0x50), Err(JpegError::BadHuffmanTable));
        assert_eq!(reader.read_bits(&mut stream, 16).unwrap(), 0x1234);
    }
}
