//! Core assembly
//!
//! Once every channel of a core has been cut, the per-channel tiles in the
//! core's temp folder are combined into one multiscale container. Layers are
//! written one channel at a time so only a single channel is held in memory.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::errors::{PrepError, PrepResult};
use crate::io::ChannelReader;

use super::store::PyramidWriter;

/// Assembles a fully cut core into its output container
pub trait CoreAssembly {
    /// Assemble one core
    ///
    /// # Returns
    /// Path of the written container
    fn assemble(&mut self, core_id: &str) -> PrepResult<PathBuf>;
}

/// Assembler reading tiles from `<temp_dir>/<core_id>/`
pub struct CoreAssembler {
    temp_dir: PathBuf,
    writer: Box<dyn PyramidWriter>,
    reader: Box<dyn ChannelReader>,
    allowed_channels: BTreeSet<String>,
    cleanup: bool,
}

impl CoreAssembler {
    /// Create an assembler
    ///
    /// # Arguments
    /// * `temp_dir` - Folder holding one sub-folder of tiles per core
    /// * `writer` - Destination container writer
    /// * `reader` - Decoder for the tile files
    pub fn new(temp_dir: impl Into<PathBuf>, writer: Box<dyn PyramidWriter>, reader: Box<dyn ChannelReader>) -> Self {
        CoreAssembler {
            temp_dir: temp_dir.into(),
            writer,
            reader,
            allowed_channels: BTreeSet::new(),
            cleanup: false,
        }
    }

    /// Only assemble these channels; an empty set allows all
    pub fn with_allowed_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_channels = channels.into_iter().map(Into::into).collect();
        self
    }

    /// Delete the consumed tiles after a successful assembly
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    fn is_allowed(&self, channel: &str) -> bool {
        self.allowed_channels.is_empty() || self.allowed_channels.contains(channel)
    }

    fn remove_tiles(&self, tiles: &[PathBuf]) {
        for tile in tiles {
            match fs::remove_file(tile) {
                Ok(()) => debug!("Deleted intermediate TIFF: {}", tile.display()),
                Err(e) => warn!("Failed to delete {}: {}", tile.display(), e),
            }
        }
    }
}

/// Tile files of a core folder, sorted by name
fn list_tiles(core_dir: &Path) -> PrepResult<Vec<PathBuf>> {
    let mut tiles = Vec::new();
    for entry in fs::read_dir(core_dir)? {
        let path = entry?.path();
        let is_tiff = path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                ext == "tif" || ext == "tiff"
            })
            .unwrap_or(false);
        if is_tiff && path.is_file() {
            tiles.push(path);
        }
    }
    tiles.sort();
    Ok(tiles)
}

impl CoreAssembly for CoreAssembler {
    fn assemble(&mut self, core_id: &str) -> PrepResult<PathBuf> {
        let core_dir = self.temp_dir.join(core_id);
        if !core_dir.is_dir() {
            return Err(PrepError::NoTempFolder(core_id.to_string()));
        }

        let tiles = list_tiles(&core_dir)?;
        if tiles.is_empty() {
            return Err(PrepError::NoChannelFiles(core_id.to_string()));
        }

        let container = self.writer.create(core_id)?;
        let mut used_channels = Vec::new();
        let mut consumed = Vec::new();

        for tile in tiles {
            let channel = tile
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_default();
            if !self.is_allowed(&channel) {
                debug!("Skipping {} for core {}: not an allowed channel", channel, core_id);
                continue;
            }

            let image = self.reader.open(&tile)?;
            self.writer.write_layer(&container, &channel, image.pixels())?;
            drop(image);

            used_channels.push(channel);
            consumed.push(tile);
        }

        info!("ROI '{}' assembled with channels: {:?}", core_id, used_channels);

        if self.cleanup {
            self.remove_tiles(&consumed);
        }

        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{ChunkedPyramidStore, PyramidManifest, PyramidSettings};
    use crate::cutting::PixelArray;
    use crate::io::{write_gray16_tiff, TiffChannelReader};
    use tempfile::tempdir;

    fn assembler(temp: &Path, out: &Path) -> CoreAssembler {
        let store = ChunkedPyramidStore::new(out, PyramidSettings::default()).unwrap();
        CoreAssembler::new(temp, Box::new(store), Box::new(TiffChannelReader))
    }

    #[test]
    fn missing_folder_and_empty_folder() {
        let temp = tempdir().unwrap();
        let out = tempdir().unwrap();
        let mut assembler = assembler(temp.path(), out.path());

        assert!(matches!(assembler.assemble("A1"), Err(PrepError::NoTempFolder(_))));

        fs::create_dir(temp.path().join("A1")).unwrap();
        fs::write(temp.path().join("A1").join("notes.txt"), b"").unwrap();
        assert!(matches!(assembler.assemble("A1"), Err(PrepError::NoChannelFiles(_))));
    }

    #[test]
    fn assembles_allowed_channels_and_cleans_up() {
        let temp = tempdir().unwrap();
        let out = tempdir().unwrap();
        let core_dir = temp.path().join("A1");
        fs::create_dir(&core_dir).unwrap();
        for channel in ["CD45", "DAPI", "STALE"] {
            write_gray16_tiff(&core_dir.join(format!("{}.tiff", channel)), &PixelArray::zeros(1, 8, 8)).unwrap();
        }

        let mut assembler = assembler(temp.path(), out.path())
            .with_allowed_channels(["DAPI", "CD45"])
            .with_cleanup(true);
        let container = assembler.assemble("A1").unwrap();

        assert_eq!(container, out.path().join("A1.pyramid"));
        let manifest = PyramidManifest::load(&container).unwrap();
        assert_eq!(manifest.layer_names(), vec!["CD45", "DAPI"]);
        assert!(!core_dir.join("DAPI.tiff").exists());
        assert!(core_dir.join("STALE.tiff").exists());
    }
}
