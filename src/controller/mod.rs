//! Orchestration of availability, cutting and assembly

mod preparation;

pub use preparation::{DriveMode, PreparationController, RunSummary};
