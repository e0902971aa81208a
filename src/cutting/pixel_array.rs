//! In-memory channel-leading pixel array
//!
//! Channel images are handled as `planes x height x width` arrays of 16-bit
//! samples stored in row-major order, plane after plane. A plain 2-D image
//! is a single plane.

use crate::errors::{PrepError, PrepResult};

/// Dense `planes x height x width` array of u16 samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelArray {
    /// Number of leading planes (1 for a 2-D image)
    pub planes: usize,
    /// Rows per plane
    pub height: usize,
    /// Columns per plane
    pub width: usize,
    /// Samples in plane-major, then row-major order
    pub data: Vec<u16>,
}

impl PixelArray {
    /// Wrap raw samples, checking the length matches the shape
    pub fn new(planes: usize, height: usize, width: usize, data: Vec<u16>) -> PrepResult<Self> {
        let expected = planes * height * width;
        if data.len() != expected {
            return Err(PrepError::GenericError(format!(
                "pixel buffer holds {} samples, shape {}x{}x{} needs {}",
                data.len(),
                planes,
                height,
                width,
                expected
            )));
        }
        Ok(PixelArray { planes, height, width, data })
    }

    /// Array filled with zeros
    pub fn zeros(planes: usize, height: usize, width: usize) -> Self {
        PixelArray {
            planes,
            height,
            width,
            data: vec![0; planes * height * width],
        }
    }

    /// Shape as `(planes, height, width)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.planes, self.height, self.width)
    }

    fn index(&self, plane: usize, row: usize, column: usize) -> Option<usize> {
        if plane >= self.planes || row >= self.height || column >= self.width {
            return None;
        }
        Some((plane * self.height + row) * self.width + column)
    }

    /// Sample at a position, or `None` when out of bounds
    pub fn get(&self, plane: usize, row: usize, column: usize) -> Option<u16> {
        self.index(plane, row, column).map(|i| self.data[i])
    }

    /// Overwrite a sample; out-of-bounds writes are ignored
    pub fn set(&mut self, plane: usize, row: usize, column: usize, value: u16) {
        if let Some(i) = self.index(plane, row, column) {
            self.data[i] = value;
        }
    }

    /// Samples of one plane
    pub fn plane(&self, plane: usize) -> &[u16] {
        let size = self.height * self.width;
        let start = (plane * size).min(self.data.len());
        let end = (start + size).min(self.data.len());
        &self.data[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexing_is_plane_then_row_major() {
        let array = PixelArray::new(2, 2, 3, (0..12).collect()).unwrap();
        assert_eq!(array.get(0, 1, 2), Some(5));
        assert_eq!(array.get(1, 0, 0), Some(6));
        assert_eq!(array.get(2, 0, 0), None);
        assert_eq!(array.plane(1), &[6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        assert!(PixelArray::new(1, 2, 2, vec![0; 3]).is_err());
    }
}
