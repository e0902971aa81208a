//! I/O collaborators for channel images and temporary tiles
//!
//! This module provides the traits the controller reads images and parks
//! cut tiles through, and their file-backed implementations.

pub mod channel_reader;
pub mod tile_store;

pub use channel_reader::{write_gray16_tiff, ChannelImage, ChannelReader, TiffChannelReader};
pub use tile_store::{TiffTileStore, TileStore};
