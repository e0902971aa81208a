pub mod errors;
pub mod channels;
pub mod availability;
pub mod metadata;
pub mod cutting;
pub mod io;
pub mod compression;
pub mod assembly;
pub mod controller;
pub mod config;
pub mod utils;
pub mod commands;
pub mod api;

pub use crate::api::CorePrep;

pub use errors::{PrepError, PrepResult};
pub use channels::{scan_channels, ChannelMap, ChannelSelection};
pub use availability::{AvailabilityStrategy, LocalFileStrategy, TransferClient, TransferFileStrategy};
pub use controller::{DriveMode, PreparationController, RunSummary};
pub use config::RunConfig;
