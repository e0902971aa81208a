//! File availability strategy definitions
//!
//! A strategy answers two questions for the controller: "is this channel's
//! file on local disk yet?" and "which channels became ready since I last
//! asked?". Local sources answer immediately; remote sources wait on an
//! asynchronous transfer service.

use std::path::{Path, PathBuf};

use crate::channels::ChannelMap;
use crate::errors::PrepResult;

/// Strategy for making channel source files locally available
///
/// Ready channels are produced through a cursor: [`start_ready_scan`]
/// begins a fresh pass and [`next_ready`] yields `(channel, local_path)`
/// pairs until it returns `None`. Each channel is yielded at most once per
/// pass. Keeping the cursor on the strategy lets the caller invoke
/// [`cleanup`] between two arrivals.
///
/// [`start_ready_scan`]: AvailabilityStrategy::start_ready_scan
/// [`next_ready`]: AvailabilityStrategy::next_ready
/// [`cleanup`]: AvailabilityStrategy::cleanup
pub trait AvailabilityStrategy {
    /// Short name used in log messages
    fn name(&self) -> &'static str;

    /// The channels this strategy serves
    fn channel_map(&self) -> &ChannelMap;

    /// Local path a channel's file is (or will be) available at
    ///
    /// # Returns
    /// The path, or `UnknownChannel` if the channel is not served here
    fn local_path(&self, channel: &str) -> PrepResult<PathBuf>;

    /// Check whether a channel's file is available locally
    ///
    /// # Returns
    /// `Ok(true)` once the file can be read, `Ok(false)` while it cannot,
    /// or an error when it never will be
    fn is_ready(&mut self, channel: &str) -> PrepResult<bool>;

    /// Begin a new pass over ready channels
    fn start_ready_scan(&mut self) -> PrepResult<()>;

    /// Next channel of the current pass, blocking until one is ready
    ///
    /// # Returns
    /// `Some((channel, local_path))`, or `None` when every channel has been
    /// yielded in this pass
    fn next_ready(&mut self) -> PrepResult<Option<(String, PathBuf)>>;

    /// Remove a source file that is no longer needed
    ///
    /// Failures are logged and never propagated.
    ///
    /// # Arguments
    /// * `path` - File to remove
    /// * `force` - Remove even when cleanup is disabled for this strategy
    fn cleanup(&mut self, path: &Path, force: bool);
}
