pub const DCT_SIZE: usize = 8;
pub const DCT_SIZE2: usize = DCT_SIZE * DCT_SIZE; // Coefficients per block.

// Size of the read buffer used by the input source, matching the classic stdio source manager.
pub const INPUT_BUF_SIZE: usize = 4096;

pub const NUM_QUANT_TABLES: usize = 4;
pub const NUM_HUFFMAN_TABLES: usize = 4;

// ISO/IEC 10918-1, B.2.2 allows up to 255 components; 10 is the customary implementation limit.
pub const MAXIMUM_COMPONENT_COUNT: usize = 10;
pub const MAXIMUM_COMPONENT_COUNT_IN_SCAN: usize = 4;
pub const MAXIMUM_SAMPLING_FACTOR: u8 = 4;
pub const MAXIMUM_BLOCKS_IN_MCU: usize = 10;

pub const MAXIMUM_APPLICATION_DATA_ID: u8 = 15;

// The size in bytes of the segment length field.
pub const SEGMENT_LENGTH_SIZE: usize = 2;

// Number of comment segments captured per image before the overflow policy applies.
pub const MAX_COMMENTS: usize = 10;

// Number of components an image must have for coefficient export.
pub const REQUIRED_COMPONENT_COUNT: usize = 3;

/// Maps zigzag (bitstream) order to natural row-major order within a block.
/// Entries 64..80 absorb out-of-range indices from corrupt run lengths.
pub const NATURAL_ORDER: [usize; DCT_SIZE2 + 16] = [
    0, 1, 8, 16, 9, 2, 3, 10,
    17, 24, 32, 25, 18, 11, 4, 5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13, 6, 7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
    63, 63, 63, 63, 63, 63, 63, 63,
    63, 63, 63, 63, 63, 63, 63, 63,
];
