//! Per-core temporary tiles
//!
//! Cut cores are parked on disk until every channel of the core has been
//! cut, one file per `(core, channel)` pair.

use std::fs;
use std::path::PathBuf;

use log::debug;

use crate::cutting::PixelArray;
use crate::errors::PrepResult;

use super::channel_reader::write_gray16_tiff;

/// Storage for cut core tiles
pub trait TileStore {
    /// Persist one channel of one core
    ///
    /// # Returns
    /// Path of the written tile
    fn write_tile(&mut self, core_id: &str, channel: &str, tile: &PixelArray) -> PrepResult<PathBuf>;
}

/// Tile store writing `<temp_dir>/<core_id>/<channel>.tiff`
#[derive(Debug, Clone)]
pub struct TiffTileStore {
    temp_dir: PathBuf,
}

impl TiffTileStore {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        TiffTileStore { temp_dir: temp_dir.into() }
    }

    /// Path a tile is written to
    pub fn tile_path(&self, core_id: &str, channel: &str) -> PathBuf {
        self.temp_dir.join(core_id).join(format!("{}.tiff", channel))
    }
}

impl TileStore for TiffTileStore {
    fn write_tile(&mut self, core_id: &str, channel: &str, tile: &PixelArray) -> PrepResult<PathBuf> {
        let path = self.tile_path(core_id, channel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_gray16_tiff(&path, tile)?;
        debug!("Cut and saved ROI {}, channel {}.", core_id, channel);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn tiles_land_in_core_folders() {
        let dir = tempdir().unwrap();
        let mut store = TiffTileStore::new(dir.path());

        let path = store.write_tile("A1", "DAPI", &PixelArray::zeros(1, 4, 4)).unwrap();

        assert_eq!(path, dir.path().join("A1").join("DAPI.tiff"));
        assert!(path.is_file());
    }
}
