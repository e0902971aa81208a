//! CLI command implementations
//!
//! This module contains the commands supported by the CLI application,
//! selected through the Command pattern.

pub mod command_traits;
pub mod prepare_command;
pub mod scan_command;

pub use command_traits::{Command, CommandFactory};
pub use prepare_command::PrepareCommand;
pub use scan_command::ScanCommand;

use clap::ArgMatches;

use crate::errors::PrepResult;

/// Factory for creating command instances based on CLI arguments
pub struct CoreprepCommandFactory;

impl CoreprepCommandFactory {
    /// Create a new factory instance
    pub fn new() -> Self {
        CoreprepCommandFactory
    }
}

impl Default for CoreprepCommandFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandFactory for CoreprepCommandFactory {
    fn create_command(&self, args: &ArgMatches) -> PrepResult<Box<dyn Command>> {
        if args.get_flag("scan-only") {
            Ok(Box::new(ScanCommand::new(args)?))
        } else {
            Ok(Box::new(PrepareCommand::new(args)?))
        }
    }
}
