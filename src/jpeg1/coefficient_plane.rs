//! Storage for one component's quantized DCT blocks.

use crate::constants::DCT_SIZE2;
use crate::error::JpegError;

/// One 8x8 block of quantized coefficients in natural (row-major) order.
pub type Block = [i16; DCT_SIZE2];

/// Block grid of one component.
///
/// Storage is padded out to whole MCUs; `width_in_blocks` and
/// `height_in_blocks` describe the part covering the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientPlane {
    width_in_blocks: usize,
    height_in_blocks: usize,
    blocks_per_row: usize,
    block_rows: usize,
    blocks: Vec<Block>,
}

impl CoefficientPlane {
    pub fn new(
        width_in_blocks: usize,
        height_in_blocks: usize,
        blocks_per_row: usize,
        block_rows: usize,
    ) -> Result<Self, JpegError> {
        let blocks_per_row = blocks_per_row.max(width_in_blocks);
        let block_rows = block_rows.max(height_in_blocks);
        let count = blocks_per_row
            .checked_mul(block_rows)
            .ok_or(JpegError::NotEnoughMemory)?;

        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(count)
            .map_err(|_| JpegError::NotEnoughMemory)?;
        blocks.resize(count, [0i16; DCT_SIZE2]);

        Ok(Self {
            width_in_blocks,
            height_in_blocks,
            blocks_per_row,
            block_rows,
            blocks,
        })
    }

    pub fn width_in_blocks(&self) -> usize {
        self.width_in_blocks
    }

    pub fn height_in_blocks(&self) -> usize {
        self.height_in_blocks
    }

    /// Row stride of the padded storage, in blocks.
    pub fn blocks_per_row(&self) -> usize {
        self.blocks_per_row
    }

    /// Number of block rows in the padded storage.
    pub fn block_rows(&self) -> usize {
        self.block_rows
    }

    /// The block at `row`, `col` of the padded storage.
    ///
    /// # Panics
    ///
    /// Panics when the position lies outside the padded storage.
    pub fn block(&self, row: usize, col: usize) -> &Block {
        assert!(col < self.blocks_per_row, "block column {col} out of range");
        &self.blocks[row * self.blocks_per_row + col]
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Block> {
        if col >= self.blocks_per_row {
            return None;
        }
        self.blocks.get(row * self.blocks_per_row + col)
    }

    pub(crate) fn block_mut(&mut self, row: usize, col: usize) -> &mut Block {
        &mut self.blocks[row * self.blocks_per_row + col]
    }

    /// Visible blocks of row `row`.
    pub fn row(&self, row: usize) -> &[Block] {
        let start = row * self.blocks_per_row;
        &self.blocks[start..start + self.width_in_blocks]
    }

    /// Iterates the visible block rows, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Block]> {
        (0..self.height_in_blocks).map(move |row| self.row(row))
    }

    /// The whole padded storage, row by row.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }
}
