//! Utility modules for the core preparation pipeline

pub mod logger;
pub mod progress;
