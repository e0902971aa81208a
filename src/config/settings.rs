//! Run configuration
//!
//! A run is described by one TOML file. Relative paths in it are resolved
//! against the directory the file lives in.
//!
//! ```toml
//! [general]
//! image_dir = "images"
//! temp_dir = "work/tiles"
//! output_dir = "work/cores"
//! metadata_file = "cores.toml"
//! log_dir = "logs"
//!
//! [cutting]
//! use_markers = ["DAPI", "CD45"]
//! margin = 16
//! drive_mode = "push"
//!
//! [storage]
//! max_pyramid_levels = 3
//! compression = "zstd"
//!
//! [transfer]
//! source_collection = "instrument"
//! destination_collection = "cluster"
//! batch_size = 1
//!
//! [transfer.mounts]
//! instrument = "/mnt/instrument"
//! cluster = "/"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::{Deserialize, Deserializer};

use crate::assembly::PyramidSettings;
use crate::availability::RetryPolicy;
use crate::channels::ChannelSelection;
use crate::compression::CodecFactory;
use crate::controller::DriveMode;
use crate::errors::{PrepError, PrepResult};

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Accept either `key = "a"` or `key = ["a", "b"]`
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    })
}

/// `[general]`: where things are
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneralSettings {
    /// Local image directory, or the staging directory of a remote run
    pub image_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
    pub metadata_file: PathBuf,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

/// Drive mode as written in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveModeSetting {
    #[default]
    Push,
    Poll,
}

/// `[cutting]`: channel selection and cutting behavior
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CuttingSettings {
    #[serde(default, deserialize_with = "one_or_many")]
    pub include_channels: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub exclude_channels: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub use_markers: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub ignore_markers: Vec<String>,
    #[serde(default)]
    pub margin: usize,
    /// Fill value outside core polygons; unset disables masking
    #[serde(default)]
    pub mask_value: Option<u16>,
    /// Delete transferred source images after cutting
    #[serde(default)]
    pub transfer_cleanup_enabled: bool,
    /// Delete per-core tiles after assembly
    #[serde(default)]
    pub core_cleanup_enabled: bool,
    #[serde(default)]
    pub drive_mode: DriveModeSetting,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,
    #[serde(default)]
    pub max_poll_rounds: Option<usize>,
}

impl Default for CuttingSettings {
    fn default() -> Self {
        CuttingSettings {
            include_channels: Vec::new(),
            exclude_channels: Vec::new(),
            use_markers: Vec::new(),
            ignore_markers: Vec::new(),
            margin: 0,
            mask_value: None,
            transfer_cleanup_enabled: false,
            core_cleanup_enabled: false,
            drive_mode: DriveModeSetting::Push,
            poll_interval_secs: default_poll_interval(),
            max_poll_rounds: None,
        }
    }
}

impl CuttingSettings {
    pub fn selection(&self) -> ChannelSelection {
        ChannelSelection {
            include_channels: self.include_channels.clone(),
            exclude_channels: self.exclude_channels.clone(),
            use_markers: self.use_markers.clone(),
            ignore_markers: self.ignore_markers.clone(),
        }
    }

    pub fn drive_mode(&self) -> DriveMode {
        match self.drive_mode {
            DriveModeSetting::Push => DriveMode::Push,
            DriveModeSetting::Poll => DriveMode::Poll {
                interval: Duration::from_secs_f64(self.poll_interval_secs),
                max_rounds: self.max_poll_rounds,
            },
        }
    }
}

/// `[storage]`: output container layout
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_levels")]
    pub max_pyramid_levels: usize,
    #[serde(default = "default_downscale")]
    pub downscale: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: [usize; 3],
    #[serde(default = "default_compression")]
    pub compression: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            max_pyramid_levels: default_levels(),
            downscale: default_downscale(),
            chunk_size: default_chunk_size(),
            compression: default_compression(),
        }
    }
}

impl StorageSettings {
    pub fn pyramid(&self) -> PyramidSettings {
        PyramidSettings {
            levels: self.max_pyramid_levels.max(1),
            downscale: self.downscale,
            chunk_size: self.chunk_size,
            compression: self.compression.clone(),
        }
    }
}

/// `[transfer]`: remote source through a transfer service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransferSettingsFile {
    pub source_collection: String,
    pub destination_collection: String,
    /// Directory inside the source collection holding the images
    #[serde(default = "default_remote_dir")]
    pub source_dir: String,
    #[serde(default)]
    pub local_root: Option<PathBuf>,
    #[serde(default)]
    pub remote_root: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,
    /// Collection id -> mounted directory
    #[serde(default)]
    pub mounts: BTreeMap<String, PathBuf>,
}

impl TransferSettingsFile {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.max_attempts)
            .with_base_delay(Duration::from_secs_f64(self.base_delay_secs))
            .with_max_delay(Duration::from_secs_f64(self.max_delay_secs))
    }
}

/// Longest delay or interval accepted, in seconds
const MAX_WAIT_SECS: f64 = u32::MAX as f64;

/// Whether `secs` converts to a `Duration` and is within bounds
fn valid_wait(secs: f64) -> bool {
    (0.0..=MAX_WAIT_SECS).contains(&secs)
}

fn default_poll_interval() -> f64 {
    10.0
}
fn default_levels() -> usize {
    3
}
fn default_downscale() -> usize {
    2
}
fn default_chunk_size() -> [usize; 3] {
    [1, 256, 256]
}
fn default_compression() -> String {
    "zstd".to_string()
}
fn default_remote_dir() -> String {
    "/".to_string()
}
fn default_batch_size() -> usize {
    1
}
fn default_attempts() -> u32 {
    6
}
fn default_base_delay() -> f64 {
    2.0
}
fn default_max_delay() -> f64 {
    60.0
}

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    pub general: GeneralSettings,
    #[serde(default)]
    pub cutting: CuttingSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub transfer: Option<TransferSettingsFile>,
}

impl RunConfig {
    /// Parse a configuration from TOML text
    ///
    /// Paths are taken as written; see [`RunConfig::load`] for resolution.
    pub fn from_toml(text: &str) -> PrepResult<Self> {
        let config: RunConfig =
            toml::from_str(text).map_err(|e| PrepError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load, resolve and validate a configuration file
    ///
    /// # Arguments
    /// * `path` - TOML configuration file
    ///
    /// # Returns
    /// The configuration with every relative path made relative to the
    /// file's directory
    pub fn load(path: &Path) -> PrepResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| PrepError::InvalidConfig(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config = Self::from_toml(&text)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        info!("Loaded run configuration from {}", path.display());
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        resolve(&mut self.general.image_dir);
        resolve(&mut self.general.temp_dir);
        resolve(&mut self.general.output_dir);
        resolve(&mut self.general.metadata_file);
        if let Some(log_dir) = self.general.log_dir.as_mut() {
            resolve(log_dir);
        }
        if let Some(transfer) = self.transfer.as_mut() {
            if let Some(local_root) = transfer.local_root.as_mut() {
                resolve(local_root);
            }
        }
    }

    /// Reject settings no run can work with
    pub fn validate(&self) -> PrepResult<()> {
        let invalid = |msg: String| Err(PrepError::InvalidConfig(msg));

        if self.storage.downscale == 0 {
            return invalid("storage.downscale must be at least 1".to_string());
        }
        if self.storage.chunk_size.contains(&0) {
            return invalid(format!("storage.chunk_size {:?} has a zero dimension", self.storage.chunk_size));
        }
        CodecFactory::by_name(&self.storage.compression)?;

        if !valid_wait(self.cutting.poll_interval_secs) {
            return invalid(format!("cutting.poll_interval_secs must be between 0 and {} seconds", MAX_WAIT_SECS));
        }

        if let Some(transfer) = &self.transfer {
            if transfer.batch_size == 0 {
                return invalid("transfer.batch_size must be at least 1".to_string());
            }
            if transfer.max_attempts == 0 {
                return invalid("transfer.max_attempts must be at least 1".to_string());
            }
            for secs in [transfer.base_delay_secs, transfer.max_delay_secs, transfer.poll_interval_secs] {
                if !valid_wait(secs) {
                    return invalid(format!("transfer delays must be between 0 and {} seconds", MAX_WAIT_SECS));
                }
            }
            if transfer.local_root.is_some() != transfer.remote_root.is_some() {
                return invalid("transfer.local_root and transfer.remote_root must be set together".to_string());
            }
            for (collection, mount) in &transfer.mounts {
                if mount.is_relative() {
                    return invalid(format!("mount of collection '{}' must be an absolute path", collection));
                }
            }
        }

        Ok(())
    }

    /// Whether channels come through a transfer service
    pub fn is_remote(&self) -> bool {
        self.transfer.is_some()
    }
}
