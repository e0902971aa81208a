//! Strategy for channel files that already live on local disk

use std::io;
use std::path::{Path, PathBuf};

use log::{debug, error, info};

use crate::channels::ChannelMap;
use crate::errors::{PrepError, PrepResult};

use super::strategy::AvailabilityStrategy;

/// Availability strategy over a local image directory
///
/// The channel map already holds the final paths. Readiness is a plain
/// existence check and source files are never deleted.
pub struct LocalFileStrategy {
    channel_map: ChannelMap,
    scan_queue: Vec<String>,
}

impl LocalFileStrategy {
    pub fn new(channel_map: ChannelMap) -> Self {
        LocalFileStrategy {
            channel_map,
            scan_queue: Vec::new(),
        }
    }
}

impl AvailabilityStrategy for LocalFileStrategy {
    fn name(&self) -> &'static str {
        "local"
    }

    fn channel_map(&self) -> &ChannelMap {
        &self.channel_map
    }

    fn local_path(&self, channel: &str) -> PrepResult<PathBuf> {
        self.channel_map
            .get(channel)
            .map(PathBuf::from)
            .ok_or_else(|| PrepError::UnknownChannel(channel.to_string()))
    }

    fn is_ready(&mut self, channel: &str) -> PrepResult<bool> {
        Ok(self
            .channel_map
            .get(channel)
            .map(|path| Path::new(path).exists())
            .unwrap_or(false))
    }

    fn start_ready_scan(&mut self) -> PrepResult<()> {
        // Popped from the back, so store in reverse channel order
        self.scan_queue = self.channel_map.channels().rev().map(str::to_string).collect();
        Ok(())
    }

    fn next_ready(&mut self) -> PrepResult<Option<(String, PathBuf)>> {
        let Some(channel) = self.scan_queue.pop() else {
            return Ok(None);
        };

        let path = self.local_path(&channel)?;
        if !path.exists() {
            let msg = format!("Expected file for {} at {} not found", channel, path.display());
            error!("Local error: {}", msg);
            return Err(PrepError::IoError(io::Error::new(io::ErrorKind::NotFound, msg)));
        }

        info!("Local file for {} verified: {}", channel, path.display());
        Ok(Some((channel, path)))
    }

    fn cleanup(&mut self, path: &Path, _force: bool) {
        debug!("Leaving local source file {} untouched", path.display());
    }
}
