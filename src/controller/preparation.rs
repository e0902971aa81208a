//! Preparation controller
//!
//! Drives a run: waits for channels through the availability strategy, cuts
//! each ready channel into one tile per core, cleans up the source file,
//! and assembles every core the moment all of its channels are cut.
//!
//! Push and poll mode only differ in how the next ready channel is found;
//! both feed the same `process_channel` step, which owns all bookkeeping:
//! - a channel is cut at most once per run
//! - a core is assembled at most once, right after its last channel
//! - cleanup of a channel's source runs right after that channel's cut

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};

use crate::assembly::CoreAssembly;
use crate::availability::{AvailabilityStrategy, Sleeper, ThreadSleeper};
use crate::cutting::CoreCutter;
use crate::errors::{PrepError, PrepResult};
use crate::io::{ChannelReader, TiffChannelReader, TileStore};
use crate::metadata::CoreTable;
use crate::utils::progress::ProgressTracker;

/// How the controller learns about ready channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMode {
    /// Consume channels in the order the strategy produces them
    Push,
    /// Repeatedly ask the strategy about every outstanding channel
    Poll {
        /// Wait between rounds in which nothing became ready
        interval: Duration,
        /// Give up after this many rounds
        max_rounds: Option<usize>,
    },
}

/// Outcome of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Channels in the order they were cut
    pub channels_cut: Vec<String>,
    /// Output container of every assembled core
    pub assembled: BTreeMap<String, PathBuf>,
}

/// Coordinates cutting and assembly of cores from multiplex images
pub struct PreparationController {
    cores: CoreTable,
    strategy: Box<dyn AvailabilityStrategy>,
    reader: Box<dyn ChannelReader>,
    tiles: Box<dyn TileStore>,
    assembler: Box<dyn CoreAssembly>,
    cutter: CoreCutter,
    sleeper: Box<dyn Sleeper>,
    show_progress: bool,
    required_channels: BTreeSet<String>,
    completed_channels: Vec<String>,
    ready_cores: BTreeMap<String, BTreeSet<String>>,
    assembled_cores: BTreeMap<String, PathBuf>,
}

impl PreparationController {
    /// Create a controller
    ///
    /// The required channel set of the run is taken from the strategy's
    /// channel map here and does not change afterwards.
    ///
    /// # Arguments
    /// * `cores` - Cores to cut out of every channel
    /// * `strategy` - Source of ready channel files
    /// * `tiles` - Storage for cut tiles
    /// * `assembler` - Builds the output container of a complete core
    /// * `cutter` - Margin and masking settings
    pub fn new(
        cores: CoreTable,
        strategy: Box<dyn AvailabilityStrategy>,
        tiles: Box<dyn TileStore>,
        assembler: Box<dyn CoreAssembly>,
        cutter: CoreCutter,
    ) -> Self {
        let required_channels = strategy.channel_map().channel_set();
        PreparationController {
            cores,
            strategy,
            reader: Box::new(TiffChannelReader),
            tiles,
            assembler,
            cutter,
            sleeper: Box::new(ThreadSleeper),
            show_progress: false,
            required_channels,
            completed_channels: Vec::new(),
            ready_cores: BTreeMap::new(),
            assembled_cores: BTreeMap::new(),
        }
    }

    pub fn with_reader(mut self, reader: Box<dyn ChannelReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Draw a progress bar while cutting
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn required_channels(&self) -> &BTreeSet<String> {
        &self.required_channels
    }

    pub fn completed_channels(&self) -> &[String] {
        &self.completed_channels
    }

    /// Cores with some, but not all, channels cut
    pub fn ready_cores(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.ready_cores
    }

    pub fn assembled_cores(&self) -> &BTreeMap<String, PathBuf> {
        &self.assembled_cores
    }

    /// Required channels that have not been cut yet, sorted
    pub fn outstanding_channels(&self) -> Vec<String> {
        self.required_channels
            .iter()
            .filter(|channel| !self.completed_channels.contains(channel))
            .cloned()
            .collect()
    }

    /// Cut every core out of one channel image
    ///
    /// The image handle is released when this returns, whether cutting
    /// succeeded or not.
    ///
    /// # Arguments
    /// * `channel` - Channel being processed
    /// * `path` - Local path of the channel image
    pub fn cut_channel(&mut self, channel: &str, path: &Path) -> PrepResult<()> {
        let image = self.reader.open(path)?;

        let tracker = if self.show_progress {
            ProgressTracker::new(self.cores.len() as u64, &format!("Cutting {}", channel))
        } else {
            ProgressTracker::hidden(self.cores.len() as u64)
        };

        for core in self.cores.iter() {
            let tile = self.cutter.extract(image.pixels(), core)?;
            self.tiles.write_tile(&core.core_id, channel, &tile)?;
            tracker.increment(1);
        }

        tracker.finish();
        drop(image);
        debug!("Closed file handle for channel {}.", channel);
        Ok(())
    }

    /// Cut, clean up, record and assemble for one ready channel
    ///
    /// # Returns
    /// `true` if the channel was cut, `false` if it had already been cut
    fn process_channel(&mut self, channel: &str, path: &Path) -> PrepResult<bool> {
        if !self.required_channels.contains(channel) {
            return Err(PrepError::UnknownChannel(channel.to_string()));
        }
        if self.completed_channels.iter().any(|done| done == channel) {
            warn!("Channel {} was already cut; skipping repeated arrival", channel);
            return Ok(false);
        }

        info!("Channel {} ready. Starting cutting...", channel);
        self.cut_channel(channel, path)?;
        self.strategy.cleanup(path, false);
        self.completed_channels.push(channel.to_string());

        for core_id in self.cores.core_ids() {
            if self.assembled_cores.contains_key(core_id) {
                continue;
            }
            self.ready_cores
                .entry(core_id.to_string())
                .or_default()
                .insert(channel.to_string());
        }

        info!(
            "Channel {} done ({}/{})",
            channel,
            self.completed_channels.len(),
            self.required_channels.len()
        );
        self.assemble_ready_cores()?;
        Ok(true)
    }

    /// Assemble every core whose cut channels cover the required set
    fn assemble_ready_cores(&mut self) -> PrepResult<()> {
        let complete: Vec<String> = self
            .ready_cores
            .iter()
            .filter(|(_, cut)| cut.is_superset(&self.required_channels))
            .map(|(core_id, _)| core_id.clone())
            .collect();

        for core_id in complete {
            self.ready_cores.remove(&core_id);
            info!("All channels cut for core {}. Assembling...", core_id);
            let output = self.assembler.assemble(&core_id)?;
            info!("Core {} assembled at {}", core_id, output.display());
            self.assembled_cores.insert(core_id, output);
        }
        Ok(())
    }

    fn run_push(&mut self) -> PrepResult<()> {
        self.strategy.start_ready_scan()?;
        while let Some((channel, path)) = self.strategy.next_ready()? {
            self.process_channel(&channel, &path)?;
        }

        let outstanding = self.outstanding_channels();
        if !outstanding.is_empty() {
            return Err(PrepError::MissingChannels(outstanding));
        }
        Ok(())
    }

    fn run_poll(&mut self, interval: Duration, max_rounds: Option<usize>) -> PrepResult<()> {
        let mut rounds = 0;

        loop {
            let outstanding = self.outstanding_channels();
            if outstanding.is_empty() {
                return Ok(());
            }
            rounds += 1;

            let mut progressed = false;
            for channel in &outstanding {
                if self.strategy.is_ready(channel)? {
                    let path = self.strategy.local_path(channel)?;
                    progressed |= self.process_channel(channel, &path)?;
                }
            }

            let outstanding = self.outstanding_channels();
            if outstanding.is_empty() {
                return Ok(());
            }
            if let Some(limit) = max_rounds {
                if rounds >= limit {
                    return Err(PrepError::PollLimitExceeded { rounds, outstanding });
                }
            }
            if !progressed {
                debug!("Waiting {:?} for {} channel(s)", interval, outstanding.len());
                self.sleeper.sleep(interval);
            }
        }
    }

    /// Process all channels and assemble all cores
    ///
    /// Blocks until every required channel has been cut and every core
    /// assembled, or the first unrecoverable error.
    pub fn run(&mut self, mode: DriveMode) -> PrepResult<RunSummary> {
        info!(
            "Starting ROI preparation controller: {} channels, {} cores, {} source",
            self.required_channels.len(),
            self.cores.len(),
            self.strategy.name()
        );
        if self.required_channels.is_empty() {
            warn!("No channels selected; nothing to cut");
        }

        match mode {
            DriveMode::Push => self.run_push()?,
            DriveMode::Poll { interval, max_rounds } => self.run_poll(interval, max_rounds)?,
        }

        if !self.ready_cores.is_empty() {
            warn!("Cores left incomplete: {:?}", self.ready_cores.keys().collect::<Vec<_>>());
        }
        info!(
            "All cores assembled. Controller run complete ({} cores).",
            self.assembled_cores.len()
        );

        Ok(RunSummary {
            channels_cut: self.completed_channels.clone(),
            assembled: self.assembled_cores.clone(),
        })
    }
}
