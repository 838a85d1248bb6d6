use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::constants::MAXIMUM_APPLICATION_DATA_ID;
use crate::error::JpegError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum JpegMarkerCode {
    /// TEM: For temporary private use in arithmetic coding.
    Temporary = 0x01,

    /// SOF0: Baseline DCT, Huffman coding.
    StartOfFrameBaseline = 0xC0,
    /// SOF1: Extended sequential DCT, Huffman coding.
    StartOfFrameExtended = 0xC1,
    /// SOF2: Progressive DCT, Huffman coding.
    StartOfFrameProgressive = 0xC2,
    /// SOF3: Lossless (sequential), Huffman coding.
    StartOfFrameLossless = 0xC3,

    /// DHT: Defines one or more Huffman tables.
    DefineHuffmanTable = 0xC4,

    /// SOF5: Differential sequential DCT, Huffman coding.
    StartOfFrameDifferentialSequential = 0xC5,
    /// SOF6: Differential progressive DCT, Huffman coding.
    StartOfFrameDifferentialProgressive = 0xC6,
    /// SOF7: Differential lossless, Huffman coding.
    StartOfFrameDifferentialLossless = 0xC7,

    /// JPG: Reserved for JPEG extensions.
    JpegExtension = 0xC8,

    /// SOF9: Extended sequential DCT, arithmetic coding.
    StartOfFrameExtendedArithmetic = 0xC9,
    /// SOF10: Progressive DCT, arithmetic coding.
    StartOfFrameProgressiveArithmetic = 0xCA,
    /// SOF11: Lossless (sequential), arithmetic coding.
    StartOfFrameLosslessArithmetic = 0xCB,

    /// DAC: Defines arithmetic coding conditioning.
    DefineArithmeticConditioning = 0xCC,

    /// SOF13: Differential sequential DCT, arithmetic coding.
    StartOfFrameDifferentialSequentialArithmetic = 0xCD,
    /// SOF14: Differential progressive DCT, arithmetic coding.
    StartOfFrameDifferentialProgressiveArithmetic = 0xCE,
    /// SOF15: Differential lossless, arithmetic coding.
    StartOfFrameDifferentialLosslessArithmetic = 0xCF,

    /// RST0..RST7: Restart interval termination.
    Restart0 = 0xD0,
    Restart1 = 0xD1,
    Restart2 = 0xD2,
    Restart3 = 0xD3,
    Restart4 = 0xD4,
    Restart5 = 0xD5,
    Restart6 = 0xD6,
    Restart7 = 0xD7,

    /// SOI: Marks the start of an image.
    StartOfImage = 0xD8,

    /// EOI: Marks the end of an image.
    EndOfImage = 0xD9,

    /// SOS: Marks the start of scan.
    StartOfScan = 0xDA,

    /// DQT: Defines one or more quantization tables.
    DefineQuantizationTable = 0xDB,

    /// DNL: Defines the number of lines in a scan.
    DefineNumberOfLines = 0xDC,

    /// DRI: Defines the restart interval used in succeeding scans.
    DefineRestartInterval = 0xDD,

    /// DHP: Defines hierarchical progression.
    DefineHierarchicalProgression = 0xDE,

    /// EXP: Expands reference components.
    ExpandReferenceComponents = 0xDF,

    /// APP0: Application data 0: used for JFIF header.
    ApplicationData0 = 0xE0,
    /// APP1: Application data 1: used for EXIF or XMP header.
    ApplicationData1 = 0xE1,
    /// APP2: Application data 2: used for ICC profile.
    ApplicationData2 = 0xE2,
    /// APP3: Application data 3: used for meta info
    ApplicationData3 = 0xE3,
    /// APP4: Application data 4.
    ApplicationData4 = 0xE4,
    /// APP5: Application data 5.
    ApplicationData5 = 0xE5,
    /// APP6: Application data 6.
    ApplicationData6 = 0xE6,
    /// APP7: Application data 7.
    ApplicationData7 = 0xE7,
    /// APP8: Application data 8.
    ApplicationData8 = 0xE8,
    /// APP9: Application data 9.
    ApplicationData9 = 0xE9,
    /// APP10: Application data 10.
    ApplicationData10 = 0xEA,
    /// APP11: Application data 11.
    ApplicationData11 = 0xEB,
    /// APP12: Application data 12: used for Picture info.
    ApplicationData12 = 0xEC,
    /// APP13: Application data 13: used by PhotoShop IRB
    ApplicationData13 = 0xED,
    /// APP14: Application data 14: used by Adobe
    ApplicationData14 = 0xEE,
    /// APP15: Application data 15.
    ApplicationData15 = 0xEF,

    /// COM: Comment block.
    Comment = 0xFE,
}

impl JpegMarkerCode {
    /// Decodes the second byte of a marker, failing on codes no JPEG process defines.
    pub fn from_byte(code: u8) -> Result<Self, JpegError> {
        Self::try_from_primitive(code).map_err(|_| JpegError::UnknownMarker(code))
    }

    pub fn code(self) -> u8 {
        self.into()
    }

    /// Returns the APPn marker for `n` in `0..=15`.
    pub fn application_data(n: u8) -> Option<Self> {
        if n > MAXIMUM_APPLICATION_DATA_ID {
            return None;
        }
        Self::try_from_primitive(JPEG_APPLICATION_DATA_BASE + n).ok()
    }

    /// The `n` of an APPn marker.
    pub fn application_data_id(self) -> Option<u8> {
        let code = self.code();
        (JPEG_APPLICATION_DATA_BASE..=JPEG_APPLICATION_DATA_BASE + MAXIMUM_APPLICATION_DATA_ID)
            .contains(&code)
            .then(|| code - JPEG_APPLICATION_DATA_BASE)
    }

    pub fn is_restart(self) -> bool {
        (JPEG_RESTART_MARKER_BASE..JPEG_RESTART_MARKER_BASE + JPEG_RESTART_MARKER_RANGE)
            .contains(&self.code())
    }
}

pub const JPEG_MARKER_START_BYTE: u8 = 0xFF;
pub const JPEG_RESTART_MARKER_BASE: u8 = 0xD0;
pub const JPEG_RESTART_MARKER_RANGE: u8 = 8;
pub const JPEG_APPLICATION_DATA_BASE: u8 = 0xE0;
