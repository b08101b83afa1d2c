//! The fixed-size emoji grid.
//!
//! A [`Grid`] is a square board of `side * side` cells stored row-major.
//! Cell `i` lives at row `i / side`, column `i % side`. The number of cells
//! is fixed at construction; cells can be overwritten but never added or
//! removed.
//!
//! On the wire and on disk a grid is a flat JSON array of strings. Decoding
//! rejects arrays whose length is not a perfect square.

use serde::{Deserialize, Serialize};

/// Side length used when no other size is configured.
pub const DEFAULT_GRID_SIDE: usize = 16;

/// Errors raised by grid construction and cell addressing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// The requested cell lies outside the grid.
    #[error("invalid index {index}: grid has {cells} cells")]
    InvalidIndex {
        /// The rejected index as supplied by the caller.
        index: i64,
        /// Number of cells in the grid.
        cells: usize,
    },

    /// A grid side length of zero, or one whose cell count overflows.
    #[error("invalid grid side length {0}")]
    InvalidSize(usize),

    /// A flat cell list whose length is not a perfect square.
    #[error("grid of {0} cells is not square")]
    NotSquare(usize),
}

/// Validated side length of a square grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridSize {
    side: usize,
    cells: usize,
}

impl GridSize {
    /// Create a grid size from a side length.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidSize`] if `side` is zero or `side * side`
    /// overflows `usize`.
    pub const fn new(side: usize) -> Result<Self, GridError> {
        if side == 0 {
            return Err(GridError::InvalidSize(side));
        }
        match side.checked_mul(side) {
            Some(cells) => Ok(Self { side, cells }),
            None => Err(GridError::InvalidSize(side)),
        }
    }

    /// Side length (number of rows, and of columns).
    pub const fn side(self) -> usize {
        self.side
    }

    /// Total number of cells, `side * side`.
    pub const fn cell_count(self) -> usize {
        self.cells
    }

    /// Resolve a caller-supplied index to an in-bounds cell offset.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidIndex`] when `index < 0` or
    /// `index >= side * side`.
    pub fn resolve(self, index: i64) -> Result<usize, GridError> {
        usize::try_from(index)
            .ok()
            .filter(|offset| *offset < self.cells)
            .ok_or(GridError::InvalidIndex {
                index,
                cells: self.cells,
            })
    }

    /// Row and column of an in-bounds cell offset.
    pub fn position(self, offset: usize) -> Option<(usize, usize)> {
        if offset >= self.cells {
            return None;
        }
        Some((offset.checked_div(self.side)?, offset.checked_rem(self.side)?))
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self {
            side: DEFAULT_GRID_SIDE,
            cells: DEFAULT_GRID_SIDE.saturating_mul(DEFAULT_GRID_SIDE),
        }
    }
}

/// A square board of emoji cells. Empty strings are blank cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Grid {
    size: GridSize,
    cells: Vec<String>,
}

impl Grid {
    /// Create an all-blank grid.
    pub fn blank(size: GridSize) -> Self {
        Self {
            size,
            cells: vec![String::new(); size.cell_count()],
        }
    }

    /// Build a grid from a flat row-major cell list.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::NotSquare`] if the list is empty or its length
    /// is not a perfect square.
    pub fn from_cells(cells: Vec<String>) -> Result<Self, GridError> {
        let side = cells.len().isqrt();
        if side.checked_mul(side) != Some(cells.len()) {
            return Err(GridError::NotSquare(cells.len()));
        }
        let Ok(size) = GridSize::new(side) else {
            return Err(GridError::NotSquare(cells.len()));
        };
        Ok(Self { size, cells })
    }

    /// Shape of this grid.
    pub const fn size(&self) -> GridSize {
        self.size
    }

    /// Read-only view of all cells in row-major order.
    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// Value of a single cell, or `None` when out of range.
    pub fn get(&self, offset: usize) -> Option<&str> {
        self.cells.get(offset).map(String::as_str)
    }

    /// Overwrite one cell.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidIndex`] if `index` is outside the grid.
    /// The grid is unchanged on error.
    pub fn set(&mut self, index: i64, emoji: String) -> Result<(), GridError> {
        let offset = self.size.resolve(index)?;
        let cells = self.size.cell_count();
        let slot = self
            .cells
            .get_mut(offset)
            .ok_or(GridError::InvalidIndex { index, cells })?;
        *slot = emoji;
        Ok(())
    }

    /// Number of non-blank cells.
    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_empty()).count()
    }
}

impl TryFrom<Vec<String>> for Grid {
    type Error = GridError;

    fn try_from(cells: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_cells(cells)
    }
}

impl From<Grid> for Vec<String> {
    fn from(grid: Grid) -> Self {
        grid.cells
    }
}
