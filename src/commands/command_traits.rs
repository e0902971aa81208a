//! Command pattern interfaces
//!
//! This module defines the Command pattern interfaces of the CLI, keeping
//! argument handling apart from the work each command does.

use clap::ArgMatches;

use crate::errors::PrepResult;

/// Represents an executable command in the application
pub trait Command {
    /// Execute the command
    ///
    /// # Returns
    /// Result indicating success or an error
    fn execute(&self) -> PrepResult<()>;
}

/// Factory for creating commands from CLI arguments
pub trait CommandFactory {
    /// Create a new Command instance based on CLI arguments
    ///
    /// # Arguments
    /// * `args` - CLI argument matches from clap
    ///
    /// # Returns
    /// A command that implements the Command trait, or an error
    fn create_command(&self, args: &ArgMatches) -> PrepResult<Box<dyn Command>>;
}
