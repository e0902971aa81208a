//! Multiscale level generation

use crate::cutting::PixelArray;

/// Shrink an array by `factor` along rows and columns
///
/// Each output pixel is the mean of its `factor x factor` block; blocks at
/// the right and bottom edges may be partial. Planes are kept as they are.
pub fn downsample(array: &PixelArray, factor: usize) -> PixelArray {
    if factor <= 1 {
        return array.clone();
    }

    let height = array.height.div_ceil(factor).max(1);
    let width = array.width.div_ceil(factor).max(1);
    let mut out = PixelArray::zeros(array.planes, height, width);

    for plane in 0..array.planes {
        let samples = array.plane(plane);
        for row in 0..height {
            let row_end = ((row + 1) * factor).min(array.height);
            for column in 0..width {
                let column_end = ((column + 1) * factor).min(array.width);

                let mut sum: u64 = 0;
                let mut count: u64 = 0;
                for r in row * factor..row_end {
                    for c in column * factor..column_end {
                        sum += samples[r * array.width + c] as u64;
                        count += 1;
                    }
                }
                if count > 0 {
                    out.set(plane, row, column, (sum / count) as u16);
                }
            }
        }
    }

    out
}

/// Build `levels` resolutions, full resolution first
pub fn build_levels(base: &PixelArray, levels: usize, factor: usize) -> Vec<PixelArray> {
    let mut pyramid = vec![base.clone()];
    for _ in 1..levels.max(1) {
        let next = match pyramid.last() {
            Some(previous) => downsample(previous, factor),
            None => break,
        };
        pyramid.push(next);
    }
    pyramid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_mean_with_partial_edges() {
        let array = PixelArray::new(1, 3, 3, vec![1, 3, 10, 5, 7, 20, 100, 100, 50]).unwrap();
        let half = downsample(&array, 2);

        assert_eq!(half.shape(), (1, 2, 2));
        assert_eq!(half.data, vec![4, 15, 100, 50]);
    }

    #[test]
    fn levels_shrink_by_factor() {
        let base = PixelArray::zeros(1, 64, 40);
        let levels = build_levels(&base, 3, 2);

        let shapes: Vec<_> = levels.iter().map(PixelArray::shape).collect();
        assert_eq!(shapes, vec![(1, 64, 40), (1, 32, 20), (1, 16, 10)]);
        assert_eq!(build_levels(&base, 0, 2).len(), 1);
    }
}
