use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use log::info;

use crate::assembly::{ChunkedPyramidStore, CoreAssembler};
use crate::availability::{
    AvailabilityStrategy, LocalFileStrategy, MountedCollectionClient, PathTranslator, TransferFileStrategy,
    TransferSettings,
};
use crate::channels::{discover_channels, ChannelMap, ImageSource};
use crate::config::{RunConfig, TransferSettingsFile};
use crate::controller::{DriveMode, PreparationController, RunSummary};
use crate::cutting::CoreCutter;
use crate::errors::PrepResult;
use crate::io::{TiffChannelReader, TiffTileStore};
use crate::metadata::CoreTable;

/// Main interface to the coreprep library
pub struct CorePrep {
    config: RunConfig,
    show_progress: bool,
}

impl CorePrep {
    /// Create an instance from an already validated configuration
    pub fn new(config: RunConfig) -> Self {
        CorePrep {
            config,
            show_progress: false,
        }
    }

    /// Load a run configuration file
    ///
    /// # Arguments
    /// * `path` - Path to the TOML configuration
    ///
    /// # Returns
    /// A CorePrep instance or an error if the configuration is invalid
    pub fn from_config(path: &Path) -> PrepResult<Self> {
        Ok(Self::new(RunConfig::load(path)?))
    }

    /// Draw a progress bar while cutting
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Build the channel map of this run without transferring anything
    ///
    /// # Returns
    /// Channels keyed to local paths, or to service paths for a remote run
    pub fn scan_channels(&self) -> PrepResult<ChannelMap> {
        let selection = self.config.cutting.selection();
        match &self.config.transfer {
            None => discover_channels(ImageSource::Local(&self.config.general.image_dir), &selection),
            Some(transfer) => {
                let mut client = mounted_client(transfer);
                discover_channels(
                    ImageSource::Remote {
                        client: &mut client,
                        collection: &transfer.source_collection,
                        path: &transfer.source_dir,
                    },
                    &selection,
                )
            }
        }
    }

    /// Scan the source and build the matching availability strategy
    ///
    /// A remote run submits its transfers here, in batches of the
    /// configured size.
    ///
    /// # Arguments
    /// * `cleanup_override` - Replaces `transfer_cleanup_enabled` when set
    pub fn build_strategy(&self, cleanup_override: Option<bool>) -> PrepResult<Box<dyn AvailabilityStrategy>> {
        let transfer = match &self.config.transfer {
            None => {
                let channel_map = self.scan_channels()?;
                return Ok(Box::new(LocalFileStrategy::new(channel_map)));
            }
            Some(transfer) => transfer,
        };

        let mut client = mounted_client(transfer);
        let channel_map = discover_channels(
            ImageSource::Remote {
                client: &mut client,
                collection: &transfer.source_collection,
                path: &transfer.source_dir,
            },
            &self.config.cutting.selection(),
        )?;

        let staging_dir = &self.config.general.image_dir;
        fs::create_dir_all(staging_dir)?;

        let mut translator = PathTranslator::new();
        if let (Some(local_root), Some(remote_root)) = (&transfer.local_root, &transfer.remote_root) {
            translator = translator.with_roots(local_root, remote_root);
        }

        let mut settings =
            TransferSettings::new(&transfer.source_collection, &transfer.destination_collection, staging_dir);
        settings.cleanup_enabled = cleanup_override.unwrap_or(self.config.cutting.transfer_cleanup_enabled);
        settings.poll_interval = Duration::from_secs_f64(transfer.poll_interval_secs);

        let mut strategy = TransferFileStrategy::new(Box::new(client), channel_map, translator, settings)
            .with_retry_policy(transfer.retry_policy());
        strategy.submit_batches(transfer.batch_size)?;

        Ok(Box::new(strategy))
    }

    /// Wire up a controller for this run
    pub fn build_controller(&self, cleanup_override: Option<bool>) -> PrepResult<PreparationController> {
        let general = &self.config.general;
        let cutting = &self.config.cutting;

        let cores = CoreTable::load(&general.metadata_file)?;
        let strategy = self.build_strategy(cleanup_override)?;

        fs::create_dir_all(&general.temp_dir)?;
        fs::create_dir_all(&general.output_dir)?;

        let writer = ChunkedPyramidStore::new(&general.output_dir, self.config.storage.pyramid())?;
        let assembler = CoreAssembler::new(&general.temp_dir, Box::new(writer), Box::new(TiffChannelReader))
            .with_allowed_channels(strategy.channel_map().channel_set())
            .with_cleanup(cutting.core_cleanup_enabled);

        let controller = PreparationController::new(
            cores,
            strategy,
            Box::new(TiffTileStore::new(&general.temp_dir)),
            Box::new(assembler),
            CoreCutter::new(cutting.margin, cutting.mask_value),
        )
        .with_progress(self.show_progress);

        Ok(controller)
    }

    /// Cut every core out of every channel and assemble the outputs
    ///
    /// # Arguments
    /// * `mode_override` - Replaces the configured drive mode when set
    /// * `cleanup_override` - Replaces `transfer_cleanup_enabled` when set
    ///
    /// # Returns
    /// The channels cut and the container written for each core
    pub fn run(&self, mode_override: Option<DriveMode>, cleanup_override: Option<bool>) -> PrepResult<RunSummary> {
        let mode = mode_override.unwrap_or_else(|| self.config.cutting.drive_mode());
        info!(
            "Preparing cores from {} source ({:?} mode)",
            if self.config.is_remote() { "remote" } else { "local" },
            mode
        );

        let mut controller = self.build_controller(cleanup_override)?;
        controller.run(mode)
    }
}

fn mounted_client(transfer: &TransferSettingsFile) -> MountedCollectionClient {
    let mounts: HashMap<_, _> = transfer
        .mounts
        .iter()
        .map(|(collection, dir)| (collection.clone(), dir.clone()))
        .collect();
    MountedCollectionClient::new(mounts)
}
