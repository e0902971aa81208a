//! Channel selection report
//!
//! Lists the channel map a run would use without transferring or cutting
//! anything.

use std::path::PathBuf;

use clap::ArgMatches;
use log::info;

use crate::api::CorePrep;
use crate::commands::command_traits::Command;
use crate::errors::{PrepError, PrepResult};

/// Command that reports the selected channels
pub struct ScanCommand {
    config_path: PathBuf,
}

impl ScanCommand {
    pub fn new(args: &ArgMatches) -> PrepResult<Self> {
        let config_path = args
            .get_one::<String>("config")
            .map(PathBuf::from)
            .ok_or_else(|| PrepError::GenericError("Missing configuration file".to_string()))?;
        Ok(ScanCommand { config_path })
    }
}

impl Command for ScanCommand {
    fn execute(&self) -> PrepResult<()> {
        let prep = CorePrep::from_config(&self.config_path)?;
        let channel_map = prep.scan_channels()?;

        info!("Channel selection ({} channels):", channel_map.len());
        for (channel, path) in channel_map.iter() {
            info!("  {:<12} {}", channel, path);
        }
        Ok(())
    }
}
