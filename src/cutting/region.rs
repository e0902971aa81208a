//! Region structure for defining a cutting window
//!
//! Coordinates are in pixels with (0,0) at the top-left corner of the
//! image. Rows grow downwards and columns grow to the right.

/// Rectangular window of an image (in pixel coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Row of the top-left corner
    pub row: usize,

    /// Column of the top-left corner
    pub column: usize,

    /// Number of rows
    pub height: usize,

    /// Number of columns
    pub width: usize,
}

impl Region {
    /// Create a new region
    ///
    /// # Arguments
    /// * `row` - Row of the top-left corner
    /// * `column` - Column of the top-left corner
    /// * `height` - Number of rows
    /// * `width` - Number of columns
    pub fn new(row: usize, column: usize, height: usize, width: usize) -> Self {
        Region { row, column, height, width }
    }

    /// Row immediately below the region (exclusive end)
    pub fn end_row(&self) -> usize {
        self.row + self.height
    }

    /// Column immediately right of the region (exclusive end)
    pub fn end_column(&self) -> usize {
        self.column + self.width
    }
}
