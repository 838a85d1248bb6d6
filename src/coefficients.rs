//! Read-only views of the coefficient planes of an open session.

use crate::constants::REQUIRED_COMPONENT_COUNT;
use crate::jpeg1::coefficient_plane::{Block, CoefficientPlane};

/// Block-grid dimensions of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockGrid {
    pub width_in_blocks: usize,
    pub height_in_blocks: usize,
}

impl BlockGrid {
    pub fn of(plane: &CoefficientPlane) -> Self {
        Self {
            width_in_blocks: plane.width_in_blocks(),
            height_in_blocks: plane.height_in_blocks(),
        }
    }

    pub fn block_count(&self) -> usize {
        self.width_in_blocks * self.height_in_blocks
    }
}

/// The three coefficient planes of an RGB-space image, borrowed from the
/// session that decoded them.
#[derive(Debug, Clone, Copy)]
pub struct CoefficientView<'s> {
    planes: &'s [CoefficientPlane; REQUIRED_COMPONENT_COUNT],
}

impl<'s> CoefficientView<'s> {
    pub(crate) fn new(planes: &'s [CoefficientPlane; REQUIRED_COMPONENT_COUNT]) -> Self {
        Self { planes }
    }

    /// Component `index`, or `None` past the third.
    pub fn component(&self, index: usize) -> Option<ComponentCoefficients<'s>> {
        self.planes.get(index).map(|plane| ComponentCoefficients { plane })
    }

    pub fn iter(&self) -> impl Iterator<Item = ComponentCoefficients<'s>> + use<'s> {
        let planes = self.planes;
        planes.iter().map(|plane| ComponentCoefficients { plane })
    }

    pub fn block_grids(&self) -> [BlockGrid; REQUIRED_COMPONENT_COUNT] {
        [
            BlockGrid::of(&self.planes[0]),
            BlockGrid::of(&self.planes[1]),
            BlockGrid::of(&self.planes[2]),
        ]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ComponentCoefficients<'s> {
    plane: &'s CoefficientPlane,
}

impl<'s> ComponentCoefficients<'s> {
    pub fn width_in_blocks(&self) -> usize {
        self.plane.width_in_blocks()
    }

    pub fn height_in_blocks(&self) -> usize {
        self.plane.height_in_blocks()
    }

    pub fn block_grid(&self) -> BlockGrid {
        BlockGrid::of(self.plane)
    }

    /// Quantized coefficients of one block, natural order.
    pub fn block(&self, row: usize, col: usize) -> Option<&'s Block> {
        if row >= self.height_in_blocks() || col >= self.width_in_blocks() {
            return None;
        }
        self.plane.get(row, col)
    }

    pub fn rows(&self) -> impl Iterator<Item = &'s [Block]> + use<'s> {
        self.plane.rows()
    }

    /// The underlying plane, including MCU padding.
    pub fn plane(&self) -> &'s CoefficientPlane {
        self.plane
    }
}
