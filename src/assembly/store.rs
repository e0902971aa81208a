//! Disk-backed multiscale containers
//!
//! A container is a directory `<output_dir>/<core_id>.pyramid` holding one
//! sub-directory per layer, one sub-directory per level inside it, and one
//! file per chunk named `<plane>.<row>.<column>` (chunk indices). Chunks are
//! little-endian u16 samples run through the configured codec; edge chunks
//! cover only the samples that exist. `pyramid.toml` describes the layers
//! and is rewritten after every layer, so a container is readable even if a
//! run stops between two channels.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::compression::{ChunkCodec, CodecFactory};
use crate::cutting::PixelArray;
use crate::errors::{PrepError, PrepResult};

use super::pyramid::build_levels;

/// Manifest file name inside a container
pub const MANIFEST_FILE: &str = "pyramid.toml";

/// Writes named layers into multiscale containers
pub trait PyramidWriter {
    /// Create a fresh, empty container for a core
    ///
    /// An existing container for the same core is replaced.
    ///
    /// # Returns
    /// Path of the container
    fn create(&mut self, core_id: &str) -> PrepResult<PathBuf>;

    /// Append one named layer with all of its pyramid levels
    fn write_layer(&mut self, container: &Path, name: &str, layer: &PixelArray) -> PrepResult<()>;
}

/// Pyramid shape and encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidSettings {
    /// Number of levels, full resolution included
    pub levels: usize,
    /// Shrink factor between two levels
    pub downscale: usize,
    /// Chunk shape as `(planes, rows, columns)`
    pub chunk_size: [usize; 3],
    /// Codec name, see [`CodecFactory::by_name`]
    pub compression: String,
}

impl Default for PyramidSettings {
    fn default() -> Self {
        PyramidSettings {
            levels: 3,
            downscale: 2,
            chunk_size: [1, 256, 256],
            compression: "zstd".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelEntry {
    pub level: usize,
    /// `[planes, rows, columns]`
    pub shape: [usize; 3],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerEntry {
    pub name: String,
    pub levels: Vec<LevelEntry>,
}

/// Contents of `pyramid.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PyramidManifest {
    pub core_id: String,
    pub downscale: usize,
    pub chunk_size: [usize; 3],
    pub codec: String,
    #[serde(default)]
    pub layers: Vec<LayerEntry>,
}

impl PyramidManifest {
    pub fn load(container: &Path) -> PrepResult<Self> {
        let path = container.join(MANIFEST_FILE);
        let text = fs::read_to_string(&path)?;
        toml::from_str(&text).map_err(|e| PrepError::GenericError(format!("{}: {}", path.display(), e)))
    }

    fn save(&self, container: &Path) -> PrepResult<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| PrepError::GenericError(format!("cannot serialize manifest: {}", e)))?;
        fs::write(container.join(MANIFEST_FILE), text)?;
        Ok(())
    }

    pub fn layer(&self, name: &str) -> Option<&LayerEntry> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|layer| layer.name.as_str()).collect()
    }
}

/// Chunked directory store for core pyramids
pub struct ChunkedPyramidStore {
    output_dir: PathBuf,
    settings: PyramidSettings,
    codec: Box<dyn ChunkCodec>,
}

impl ChunkedPyramidStore {
    /// Create a store writing under `output_dir`
    ///
    /// # Returns
    /// The store, or `InvalidConfig` for a zero chunk dimension, a zero
    /// downscale or an unknown codec
    pub fn new(output_dir: impl Into<PathBuf>, settings: PyramidSettings) -> PrepResult<Self> {
        if settings.chunk_size.contains(&0) {
            return Err(PrepError::InvalidConfig(format!(
                "chunk_size {:?} has a zero dimension",
                settings.chunk_size
            )));
        }
        if settings.downscale == 0 {
            return Err(PrepError::InvalidConfig("downscale must be at least 1".to_string()));
        }
        let codec = CodecFactory::by_name(&settings.compression)?;

        Ok(ChunkedPyramidStore {
            output_dir: output_dir.into(),
            settings,
            codec,
        })
    }

    /// Container path of a core
    pub fn container_path(&self, core_id: &str) -> PathBuf {
        self.output_dir.join(format!("{}.pyramid", core_id))
    }

    fn write_level(&self, dir: &Path, level: &PixelArray) -> PrepResult<usize> {
        fs::create_dir_all(dir)?;
        let [chunk_planes, chunk_rows, chunk_columns] = self.settings.chunk_size;
        let mut chunks = 0;

        for p0 in (0..level.planes).step_by(chunk_planes) {
            let p1 = (p0 + chunk_planes).min(level.planes);
            for r0 in (0..level.height).step_by(chunk_rows) {
                let r1 = (r0 + chunk_rows).min(level.height);
                for c0 in (0..level.width).step_by(chunk_columns) {
                    let c1 = (c0 + chunk_columns).min(level.width);

                    let mut raw = Vec::with_capacity((p1 - p0) * (r1 - r0) * (c1 - c0) * 2);
                    for p in p0..p1 {
                        let samples = level.plane(p);
                        for r in r0..r1 {
                            for &value in &samples[r * level.width + c0..r * level.width + c1] {
                                raw.write_u16::<LittleEndian>(value)?;
                            }
                        }
                    }

                    let name = format!("{}.{}.{}", p0 / chunk_planes, r0 / chunk_rows, c0 / chunk_columns);
                    fs::write(dir.join(name), self.codec.encode(&raw)?)?;
                    chunks += 1;
                }
            }
        }

        Ok(chunks)
    }

    /// Read one level of a layer back into memory
    ///
    /// # Arguments
    /// * `container` - Container path returned by [`PyramidWriter::create`]
    /// * `name` - Layer name
    /// * `level` - Level index, 0 being full resolution
    pub fn read_level(&self, container: &Path, name: &str, level: usize) -> PrepResult<PixelArray> {
        let manifest = PyramidManifest::load(container)?;
        let entry = manifest
            .layer(name)
            .and_then(|layer| layer.levels.iter().find(|l| l.level == level))
            .ok_or_else(|| PrepError::GenericError(format!("no level {} of layer {} in {}", level, name, container.display())))?;
        let codec = CodecFactory::by_name(&manifest.codec)?;

        let [planes, height, width] = entry.shape;
        let [chunk_planes, chunk_rows, chunk_columns] = manifest.chunk_size;
        let dir = container.join(name).join(level.to_string());
        let mut array = PixelArray::zeros(planes, height, width);

        for p0 in (0..planes).step_by(chunk_planes) {
            let p1 = (p0 + chunk_planes).min(planes);
            for r0 in (0..height).step_by(chunk_rows) {
                let r1 = (r0 + chunk_rows).min(height);
                for c0 in (0..width).step_by(chunk_columns) {
                    let c1 = (c0 + chunk_columns).min(width);

                    let file = format!("{}.{}.{}", p0 / chunk_planes, r0 / chunk_rows, c0 / chunk_columns);
                    let raw = codec.decode(&fs::read(dir.join(file))?)?;
                    let mut samples = vec![0u16; (p1 - p0) * (r1 - r0) * (c1 - c0)];
                    Cursor::new(raw).read_u16_into::<LittleEndian>(&mut samples)?;

                    let mut next = samples.into_iter();
                    for p in p0..p1 {
                        for r in r0..r1 {
                            for c in c0..c1 {
                                if let Some(value) = next.next() {
                                    array.set(p, r, c, value);
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(array)
    }
}

impl PyramidWriter for ChunkedPyramidStore {
    fn create(&mut self, core_id: &str) -> PrepResult<PathBuf> {
        let container = self.container_path(core_id);
        if container.exists() {
            debug!("Replacing existing container {}", container.display());
            fs::remove_dir_all(&container)?;
        }
        fs::create_dir_all(&container)?;

        let manifest = PyramidManifest {
            core_id: core_id.to_string(),
            downscale: self.settings.downscale,
            chunk_size: self.settings.chunk_size,
            codec: self.codec.name().to_string(),
            layers: Vec::new(),
        };
        manifest.save(&container)?;
        Ok(container)
    }

    fn write_layer(&mut self, container: &Path, name: &str, layer: &PixelArray) -> PrepResult<()> {
        let mut manifest = PyramidManifest::load(container)?;
        let layer_dir = container.join(name);
        if layer_dir.exists() {
            fs::remove_dir_all(&layer_dir)?;
        }

        let mut levels = Vec::new();
        for (index, level) in build_levels(layer, self.settings.levels, self.settings.downscale)
            .iter()
            .enumerate()
        {
            let chunks = self.write_level(&layer_dir.join(index.to_string()), level)?;
            let (planes, height, width) = level.shape();
            debug!("Layer {} level {}: {}x{}x{} in {} chunks", name, index, planes, height, width, chunks);
            levels.push(LevelEntry { level: index, shape: [planes, height, width] });
        }

        manifest.layers.retain(|existing| existing.name != name);
        manifest.layers.push(LayerEntry { name: name.to_string(), levels });
        manifest.save(container)?;

        info!("Wrote layer {} to {}", name, container.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn settings(compression: &str) -> PyramidSettings {
        PyramidSettings {
            levels: 2,
            downscale: 2,
            chunk_size: [1, 4, 4],
            compression: compression.to_string(),
        }
    }

    #[test]
    fn layers_are_chunked_and_listed() {
        let dir = tempdir().unwrap();
        let mut store = ChunkedPyramidStore::new(dir.path(), settings("deflate")).unwrap();
        let layer = PixelArray::new(1, 6, 5, (0..30).collect()).unwrap();

        let container = store.create("A1").unwrap();
        store.write_layer(&container, "DAPI", &layer).unwrap();
        store.write_layer(&container, "CD45", &layer).unwrap();

        let manifest = PyramidManifest::load(&container).unwrap();
        assert_eq!(manifest.layer_names(), vec!["DAPI", "CD45"]);
        assert_eq!(manifest.layer("DAPI").unwrap().levels[1].shape, [1, 3, 3]);
        // 6x5 with 4x4 chunks -> 2x2 chunk grid
        assert!(container.join("DAPI/0/0.1.1").is_file());

        assert_eq!(store.read_level(&container, "DAPI", 0).unwrap(), layer);
    }

    #[test]
    fn create_replaces_previous_container() {
        let dir = tempdir().unwrap();
        let mut store = ChunkedPyramidStore::new(dir.path(), settings("none")).unwrap();

        let container = store.create("A1").unwrap();
        store.write_layer(&container, "DAPI", &PixelArray::zeros(1, 2, 2)).unwrap();
        let again = store.create("A1").unwrap();

        assert_eq!(container, again);
        assert!(PyramidManifest::load(&again).unwrap().layers.is_empty());
        assert!(!again.join("DAPI").exists());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let dir = tempdir().unwrap();
        let mut zero_chunk = settings("zstd");
        zero_chunk.chunk_size = [1, 0, 4];
        assert!(ChunkedPyramidStore::new(dir.path(), zero_chunk).is_err());
        assert!(ChunkedPyramidStore::new(dir.path(), settings("jpeg")).is_err());
    }
}
