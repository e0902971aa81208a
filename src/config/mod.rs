//! Run configuration loading and validation

mod settings;

pub use settings::{
    CuttingSettings, DriveModeSetting, GeneralSettings, RunConfig, StorageSettings, TransferSettingsFile,
};
