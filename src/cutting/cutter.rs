//! Core cutting
//!
//! Extracts one core's window from a full-resolution channel image. The
//! bounding box from the metadata must lie inside the image; the margin
//! around it is clipped at the image edges.

use log::debug;

use crate::errors::{PrepError, PrepResult};
use crate::metadata::CoreRecord;

use super::pixel_array::PixelArray;
use super::polygon::apply_polygon_mask;
use super::region::Region;

/// Cuts core windows out of channel images
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreCutter {
    /// Pixels added on every side of the bounding box
    pub margin: usize,
    /// Fill value outside the core polygon; `None` disables masking
    pub mask_value: Option<u16>,
}

impl CoreCutter {
    pub fn new(margin: usize, mask_value: Option<u16>) -> Self {
        CoreCutter { margin, mask_value }
    }

    /// Window of the image covered by a core, margin included
    ///
    /// # Returns
    /// The clipped window, or `InvalidBounds` when the bounding box is empty
    /// or reaches outside the image
    pub fn window(&self, image: &PixelArray, core: &CoreRecord) -> PrepResult<Region> {
        let invalid = |reason: String| PrepError::InvalidBounds {
            core_id: core.core_id.clone(),
            reason,
        };

        if core.row_start >= core.row_stop || core.column_start >= core.column_stop {
            return Err(invalid(format!(
                "empty box rows {}..{}, columns {}..{}",
                core.row_start, core.row_stop, core.column_start, core.column_stop
            )));
        }
        if core.row_start < 0
            || core.column_start < 0
            || core.row_stop > image.height as i64
            || core.column_stop > image.width as i64
        {
            return Err(invalid(format!(
                "box rows {}..{}, columns {}..{} outside image of {}x{}",
                core.row_start, core.row_stop, core.column_start, core.column_stop, image.height, image.width
            )));
        }

        let row_start = (core.row_start as usize).saturating_sub(self.margin);
        let column_start = (core.column_start as usize).saturating_sub(self.margin);
        let row_stop = (core.row_stop as usize + self.margin).min(image.height);
        let column_stop = (core.column_stop as usize + self.margin).min(image.width);

        Ok(Region::new(row_start, column_start, row_stop - row_start, column_stop - column_start))
    }

    /// Extract one core from a channel image
    ///
    /// # Arguments
    /// * `image` - Full-resolution channel image
    /// * `core` - Metadata row of the core
    ///
    /// # Returns
    /// The core's sub-array with the same number of planes as `image`
    pub fn extract(&self, image: &PixelArray, core: &CoreRecord) -> PrepResult<PixelArray> {
        let window = self.window(image, core)?;
        let mut data = Vec::with_capacity(image.planes * window.height * window.width);

        for plane in 0..image.planes {
            let samples = image.plane(plane);
            for row in window.row..window.end_row() {
                let offset = row * image.width;
                data.extend_from_slice(&samples[offset + window.column..offset + window.end_column()]);
            }
        }

        let mut cut = PixelArray::new(image.planes, window.height, window.width, data)?;

        if let (Some(fill), Some(vertices)) = (self.mask_value, core.polygon.as_deref()) {
            let masked = apply_polygon_mask(&mut cut, &window, vertices, fill);
            debug!("Masked {} pixels of core {} with {}", masked, core.core_id, fill);
        }

        Ok(cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(height: usize, width: usize) -> PixelArray {
        let data = (0..height * width).map(|v| v as u16).collect();
        PixelArray::new(1, height, width, data).unwrap()
    }

    #[test]
    fn extracts_exact_box() {
        let image = gradient(10, 10);
        let core = CoreRecord::new("A1", 2, 4, 3, 6);

        let cut = CoreCutter::default().extract(&image, &core).unwrap();

        assert_eq!(cut.shape(), (1, 2, 3));
        assert_eq!(cut.data, vec![23, 24, 25, 33, 34, 35]);
    }

    #[test]
    fn margin_is_clipped_at_edges() {
        let image = gradient(10, 10);
        let core = CoreRecord::new("A1", 1, 3, 7, 10);

        let window = CoreCutter::new(2, None).window(&image, &core).unwrap();

        assert_eq!(window, Region::new(0, 5, 5, 5));
    }

    #[test]
    fn out_of_bounds_box_is_reported() {
        let image = gradient(10, 10);
        let cutter = CoreCutter::default();

        let beyond = CoreRecord::new("A1", 5, 11, 0, 4);
        let negative = CoreRecord::new("A2", -1, 4, 0, 4);
        let empty = CoreRecord::new("A3", 4, 4, 0, 4);

        for core in [beyond, negative, empty] {
            assert!(matches!(cutter.extract(&image, &core), Err(PrepError::InvalidBounds { .. })));
        }
    }

    #[test]
    fn multi_plane_images_keep_planes() {
        let data = (0..2 * 4 * 4).map(|v| v as u16).collect();
        let image = PixelArray::new(2, 4, 4, data).unwrap();
        let core = CoreRecord::new("A1", 1, 2, 1, 3);

        let cut = CoreCutter::default().extract(&image, &core).unwrap();

        assert_eq!(cut.data, vec![5, 6, 21, 22]);
    }

    #[test]
    fn polygon_mask_applied_only_with_fill_value() {
        let image = PixelArray::new(1, 4, 4, vec![9; 16]).unwrap();
        let core = CoreRecord::new("A1", 0, 4, 0, 4).with_polygon(vec![[0.0, 0.0], [0.0, 4.0], [4.0, 4.0]]);

        let unmasked = CoreCutter::default().extract(&image, &core).unwrap();
        assert!(unmasked.data.iter().all(|&v| v == 9));

        let masked = CoreCutter::new(0, Some(0)).extract(&image, &core).unwrap();
        assert_eq!(masked.get(0, 3, 0), Some(0));
        assert_eq!(masked.get(0, 0, 3), Some(9));
    }
}
