//! Polygon masking for cut cores
//!
//! Pixels whose centre lies outside a core's outline are overwritten with a
//! fill value, plane by plane.

use super::pixel_array::PixelArray;
use super::region::Region;

/// Even-odd test of a point against a closed polygon
///
/// # Arguments
/// * `row` - Row coordinate of the point
/// * `column` - Column coordinate of the point
/// * `vertices` - Polygon as `[row, column]` pairs; closing edge is implied
pub fn point_in_polygon(row: f64, column: f64, vertices: &[[f64; 2]]) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let [ri, ci] = vertices[i];
        let [rj, cj] = vertices[j];
        if (ri > row) != (rj > row) {
            let crossing = ci + (row - ri) / (rj - ri) * (cj - ci);
            if column < crossing {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Fill every pixel outside the polygon with `fill`
///
/// The polygon is given in full-image coordinates; `window` says where the
/// array sits inside the full image.
///
/// # Arguments
/// * `array` - Cut sub-image, modified in place
/// * `window` - Position of the sub-image in the full image
/// * `vertices` - Polygon as `[row, column]` pairs
/// * `fill` - Value written outside the polygon
///
/// # Returns
/// Number of pixels (per plane) that were masked
pub fn apply_polygon_mask(array: &mut PixelArray, window: &Region, vertices: &[[f64; 2]], fill: u16) -> usize {
    let mut masked = 0;

    for r in 0..array.height {
        for c in 0..array.width {
            let row = (window.row + r) as f64 + 0.5;
            let column = (window.column + c) as f64 + 0.5;

            if !point_in_polygon(row, column, vertices) {
                for plane in 0..array.planes {
                    array.set(plane, r, c, fill);
                }
                masked += 1;
            }
        }
    }

    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_contains_its_centre() {
        let square = [[0.0, 0.0], [0.0, 4.0], [4.0, 4.0], [4.0, 0.0]];
        assert!(point_in_polygon(2.0, 2.0, &square));
        assert!(!point_in_polygon(5.0, 2.0, &square));
        assert!(!point_in_polygon(2.0, 2.0, &square[..2]));
    }

    #[test]
    fn triangle_masks_lower_left() {
        // Upper-right triangle of a 4x4 window starting at (10, 10)
        let triangle = [[10.0, 10.0], [10.0, 14.0], [14.0, 14.0]];
        let mut array = PixelArray::new(1, 4, 4, vec![7; 16]).unwrap();

        let masked = apply_polygon_mask(&mut array, &Region::new(10, 10, 4, 4), &triangle, 0);

        assert_eq!(masked, 6);
        assert_eq!(array.get(0, 0, 3), Some(7));
        assert_eq!(array.get(0, 3, 0), Some(0));
    }
}
