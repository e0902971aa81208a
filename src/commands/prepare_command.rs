//! Core preparation command
//!
//! Runs the whole pipeline for one configuration: scan, make available,
//! cut and assemble.

use std::path::PathBuf;

use clap::ArgMatches;
use log::info;

use crate::api::CorePrep;
use crate::commands::command_traits::Command;
use crate::config::{DriveModeSetting, RunConfig};
use crate::errors::{PrepError, PrepResult};

/// Command that prepares every core of a run
pub struct PrepareCommand {
    /// Path to the run configuration
    config_path: PathBuf,
    /// Loaded facade
    prep: CorePrep,
    /// Forces deletion of transferred files after cutting
    cleanup: Option<bool>,
}

impl PrepareCommand {
    /// Create a new prepare command
    ///
    /// # Arguments
    /// * `args` - CLI argument matches from clap
    ///
    /// # Returns
    /// A new PrepareCommand instance or an error
    pub fn new(args: &ArgMatches) -> PrepResult<Self> {
        let config_path = args
            .get_one::<String>("config")
            .map(PathBuf::from)
            .ok_or_else(|| PrepError::GenericError("Missing configuration file".to_string()))?;

        let mut config = RunConfig::load(&config_path)?;
        if let Some(mode) = args.get_one::<String>("mode") {
            config.cutting.drive_mode = parse_mode(mode)?;
        }

        let cleanup = if args.get_flag("cleanup") { Some(true) } else { None };
        let show_progress = !args.get_flag("quiet");

        Ok(PrepareCommand {
            config_path,
            prep: CorePrep::new(config).with_progress(show_progress),
            cleanup,
        })
    }
}

/// Parse a `--mode` value
fn parse_mode(mode: &str) -> PrepResult<DriveModeSetting> {
    match mode.to_lowercase().as_str() {
        "push" => Ok(DriveModeSetting::Push),
        "poll" => Ok(DriveModeSetting::Poll),
        other => Err(PrepError::InvalidConfig(format!("unknown drive mode '{}', expected push or poll", other))),
    }
}

impl Command for PrepareCommand {
    fn execute(&self) -> PrepResult<()> {
        info!("Preparing cores for {}", self.config_path.display());

        let summary = self.prep.run(None, self.cleanup)?;

        info!("Cut {} channels", summary.channels_cut.len());
        for (core_id, container) in &summary.assembled {
            info!("  {} -> {}", core_id, container.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_modes() {
        assert_eq!(parse_mode("push").unwrap(), DriveModeSetting::Push);
        assert_eq!(parse_mode("Poll").unwrap(), DriveModeSetting::Poll);
        assert!(matches!(parse_mode("stream"), Err(PrepError::InvalidConfig(_))));
    }
}
