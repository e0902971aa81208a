//! Cutting cores out of full-resolution channel images

mod cutter;
mod pixel_array;
mod polygon;
mod region;

pub use cutter::CoreCutter;
pub use pixel_array::PixelArray;
pub use polygon::{apply_polygon_mask, point_in_polygon};
pub use region::Region;
