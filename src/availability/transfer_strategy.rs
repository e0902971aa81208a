//! Strategy for channel files fetched through a transfer service
//!
//! Source images sit in a remote collection and are copied into a local
//! staging directory by asynchronous transfer tasks. The strategy keeps one
//! pending record per channel from submission until the channel is seen
//! complete, and answers readiness either per channel (`is_ready`) or as a
//! stream of arrivals (`next_ready`).

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::channels::ChannelMap;
use crate::errors::{PrepError, PrepResult};

use super::path_translation::PathTranslator;
use super::retry::{retry_with_backoff, RetryFailure, RetryPolicy};
use super::sleeper::{Sleeper, ThreadSleeper};
use super::strategy::AvailabilityStrategy;
use super::transfer_client::{TaskStatus, TransferClient, TransferError, TransferListing, TransferRequest};

/// Where one channel's file comes from and where it lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPaths {
    /// Path in the source collection
    pub remote_source: String,
    /// Path in the local staging directory
    pub local_destination: PathBuf,
}

/// A submitted transfer that has not been observed complete yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransfer {
    pub task_id: String,
    pub local_path: PathBuf,
    pub channel: String,
}

/// Collections and local behavior of a remote run
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub source_collection: String,
    pub destination_collection: String,
    /// Local directory transferred files are written to
    pub staging_dir: PathBuf,
    /// Delete transferred files once they have been cut
    pub cleanup_enabled: bool,
    /// Wait between bulk-polling rounds that found nothing new
    pub poll_interval: Duration,
}

impl TransferSettings {
    pub fn new(source_collection: &str, destination_collection: &str, staging_dir: impl Into<PathBuf>) -> Self {
        TransferSettings {
            source_collection: source_collection.to_string(),
            destination_collection: destination_collection.to_string(),
            staging_dir: staging_dir.into(),
            cleanup_enabled: false,
            poll_interval: Duration::from_secs(10),
        }
    }
}

/// State of one pass over arriving channels
struct ReadyScan {
    remaining: BTreeSet<String>,
    queue: VecDeque<(String, PathBuf)>,
}

/// Service call whose transient failures are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TaskQuery {
    Status,
    Listing,
}

/// Availability strategy backed by an asynchronous transfer service
///
/// Transient errors while polling a task are tolerated up to the retry
/// policy's `max_attempts` consecutive failures of the same query; any
/// successful answer resets the count.
pub struct TransferFileStrategy {
    client: Box<dyn TransferClient>,
    channel_map: ChannelMap,
    transfer_map: BTreeMap<String, TransferPaths>,
    remote_to_channel: HashMap<String, String>,
    translator: PathTranslator,
    settings: TransferSettings,
    retry_policy: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
    pending: Vec<PendingTransfer>,
    available: BTreeSet<String>,
    submitted_tasks: Vec<String>,
    transient_errors: HashMap<(TaskQuery, String), u32>,
    scan: Option<ReadyScan>,
}

impl TransferFileStrategy {
    /// Create a strategy and compute its transfer map
    ///
    /// Nothing is submitted yet; call [`submit_all`](Self::submit_all) or
    /// [`submit_batches`](Self::submit_batches) before polling.
    ///
    /// # Arguments
    /// * `client` - Transfer service client
    /// * `channel_map` - Channels keyed to their remote source paths
    /// * `translator` - Local <-> service path mapping for the destination
    /// * `settings` - Collections, staging directory and cleanup behavior
    pub fn new(
        client: Box<dyn TransferClient>,
        channel_map: ChannelMap,
        translator: PathTranslator,
        settings: TransferSettings,
    ) -> Self {
        let transfer_map: BTreeMap<String, TransferPaths> = channel_map
            .iter()
            .map(|(channel, remote)| {
                let remote_source = remote.replace('\\', "/");
                let file_name = remote_source.rsplit('/').next().unwrap_or(&remote_source).to_string();
                let paths = TransferPaths {
                    local_destination: settings.staging_dir.join(file_name),
                    remote_source,
                };
                (channel.to_string(), paths)
            })
            .collect();

        let remote_to_channel = transfer_map
            .iter()
            .map(|(channel, paths)| (paths.remote_source.clone(), channel.clone()))
            .collect();

        info!(
            "Prepared transfer map for {} channels into {}",
            transfer_map.len(),
            settings.staging_dir.display()
        );

        TransferFileStrategy {
            client,
            channel_map,
            transfer_map,
            remote_to_channel,
            translator,
            settings,
            retry_policy: RetryPolicy::default(),
            sleeper: Box::new(ThreadSleeper),
            pending: Vec::new(),
            available: BTreeSet::new(),
            submitted_tasks: Vec::new(),
            transient_errors: HashMap::new(),
            scan: None,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn transfer_map(&self) -> &BTreeMap<String, TransferPaths> {
        &self.transfer_map
    }

    /// Outstanding transfers, in submission order
    pub fn pending(&self) -> &[PendingTransfer] {
        &self.pending
    }

    pub fn submitted_tasks(&self) -> &[String] {
        &self.submitted_tasks
    }

    /// Submit one transfer task per channel
    pub fn submit_all(&mut self) -> PrepResult<()> {
        self.submit_batches(1)
    }

    /// Submit transfer tasks of `batch_size` channels each
    ///
    /// Channels that already have a pending record or are available are
    /// skipped. Each channel of a batch gets a pending record carrying the
    /// batch's task id.
    ///
    /// # Returns
    /// `SubmissionFailed` on a non-retryable service error, or
    /// `RetriesExhausted` when every attempt hit a transient error
    pub fn submit_batches(&mut self, batch_size: usize) -> PrepResult<()> {
        if batch_size == 0 {
            return Err(PrepError::InvalidConfig("batch size must be at least 1".to_string()));
        }

        let to_submit: Vec<(String, TransferPaths)> = self
            .transfer_map
            .iter()
            .filter(|(channel, _)| {
                !self.available.contains(*channel) && !self.pending.iter().any(|p| &p.channel == *channel)
            })
            .map(|(channel, paths)| (channel.clone(), paths.clone()))
            .collect();

        for (index, batch) in to_submit.chunks(batch_size).enumerate() {
            let label = format!("coreprep batch {}", index + 1);
            let mut request = TransferRequest::new(
                &self.settings.source_collection,
                &self.settings.destination_collection,
                &label,
            );
            for (_, paths) in batch {
                let destination = self.translator.local_to_remote(&paths.local_destination);
                request.add_item(&paths.remote_source, &destination);
            }

            let channels: Vec<&str> = batch.iter().map(|(channel, _)| channel.as_str()).collect();
            let client = &mut self.client;
            let (result, stats) =
                retry_with_backoff(&self.retry_policy, self.sleeper.as_ref(), &label, || {
                    client.submit_transfer(&request)
                });

            let task_id = match result {
                Ok(task_id) => task_id,
                Err(RetryFailure::Permanent(e)) => {
                    error!("Failed to submit {}: {}", label, e);
                    return Err(PrepError::SubmissionFailed {
                        channel: channels.join(", "),
                        message: e.to_string(),
                    });
                }
                Err(RetryFailure::Exhausted { attempts, last }) => {
                    error!("Giving up on {} after {} attempts", label, attempts);
                    return Err(PrepError::RetriesExhausted {
                        channel: channels.join(", "),
                        attempts,
                        message: last.to_string(),
                    });
                }
            };

            info!(
                "Submitted {} (Task: {}) with {} channel(s) after {} attempt(s)",
                label,
                task_id,
                batch.len(),
                stats.attempts
            );
            for (channel, paths) in batch {
                self.pending.push(PendingTransfer {
                    task_id: task_id.clone(),
                    local_path: paths.local_destination.clone(),
                    channel: channel.clone(),
                });
            }
            if !self.submitted_tasks.contains(&task_id) {
                self.submitted_tasks.push(task_id);
            }
        }

        Ok(())
    }

    /// Channels still waiting on a task, for error messages
    fn task_channels(&self, task_id: &str) -> String {
        let channels: Vec<&str> = self
            .pending
            .iter()
            .filter(|p| p.task_id == task_id)
            .map(|p| p.channel.as_str())
            .collect();
        channels.join(", ")
    }

    /// Count one transient failure of a task query
    ///
    /// # Returns
    /// `RetriesExhausted` once the same query failed `max_attempts` times
    /// in a row
    fn note_transient(&mut self, query: TaskQuery, task_id: &str, error: &TransferError) -> PrepResult<()> {
        let count = self.transient_errors.entry((query, task_id.to_string())).or_insert(0);
        *count += 1;
        let attempts = *count;

        if attempts >= self.retry_policy.max_attempts {
            error!("Giving up on task {} after {} transient errors: {}", task_id, attempts, error);
            return Err(PrepError::RetriesExhausted {
                channel: self.task_channels(task_id),
                attempts,
                message: error.to_string(),
            });
        }

        warn!(
            "Transient error polling task {} ({}/{}): {}",
            task_id, attempts, self.retry_policy.max_attempts, error
        );
        Ok(())
    }

    fn note_answer(&mut self, query: TaskQuery, task_id: &str) {
        self.transient_errors.remove(&(query, task_id.to_string()));
    }

    fn mark_available(&mut self, channel: &str) {
        self.pending.retain(|p| p.channel != channel);
        self.available.insert(channel.to_string());
    }

    /// Ask every submitted task which items have landed
    ///
    /// # Returns
    /// Number of channels newly queued for the current pass
    fn poll_successful_transfers(&mut self, scan: &mut ReadyScan) -> PrepResult<usize> {
        let mut found = 0;

        for task_id in self.submitted_tasks.clone() {
            let listing = match self.client.successful_transfers(&task_id) {
                Ok(listing) => listing,
                Err(e) if e.is_retryable() => {
                    self.note_transient(TaskQuery::Listing, &task_id, &e)?;
                    continue;
                }
                Err(e) => return Err(PrepError::TransferError(format!("task {}: {}", task_id, e))),
            };
            self.note_answer(TaskQuery::Listing, &task_id);

            let items = match listing {
                TransferListing::Completed(items) => items,
                TransferListing::InProgress => {
                    debug!("Task {} is still in progress", task_id);
                    continue;
                }
            };

            for item in items {
                let Some(channel) = self.remote_to_channel.get(&item.source_path).cloned() else {
                    debug!("Ignoring unmapped transfer item {}", item.source_path);
                    continue;
                };
                if !scan.remaining.remove(&channel) {
                    continue;
                }

                let local_path = self.translator.remote_to_local(&item.destination_path);
                info!("Channel {} transferred to {}", channel, local_path.display());
                self.mark_available(&channel);
                scan.queue.push_back((channel, local_path));
                found += 1;
            }
        }

        Ok(found)
    }

    /// Check the tasks still owing channels to the current pass
    ///
    /// A failed task aborts the run. A succeeded task whose files were not
    /// listed (e.g. skipped by checksum sync) releases them if present.
    fn check_outstanding_tasks(&mut self, scan: &mut ReadyScan) -> PrepResult<()> {
        let mut owed: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for record in &self.pending {
            if scan.remaining.contains(&record.channel) {
                owed.entry(record.task_id.clone()).or_default().push(record.channel.clone());
            }
        }

        for (task_id, channels) in owed {
            let status = match self.client.task_status(&task_id) {
                Ok(status) => status,
                Err(e) if e.is_retryable() => {
                    self.note_transient(TaskQuery::Status, &task_id, &e)?;
                    continue;
                }
                Err(e) => return Err(PrepError::TransferError(format!("task {}: {}", task_id, e))),
            };
            self.note_answer(TaskQuery::Status, &task_id);

            match status {
                TaskStatus::Failed => {
                    error!("Transfer task {} failed", task_id);
                    return Err(PrepError::TransferFailed {
                        channel: channels.join(", "),
                        task_id,
                    });
                }
                TaskStatus::Succeeded => {
                    for channel in channels {
                        let local_path = self.transfer_map[&channel].local_destination.clone();
                        if !local_path.exists() {
                            return Err(PrepError::TransferError(format!(
                                "task {} succeeded but {} was not delivered to {}",
                                task_id,
                                channel,
                                local_path.display()
                            )));
                        }
                        info!("Channel {} already present at {}", channel, local_path.display());
                        scan.remaining.remove(&channel);
                        self.mark_available(&channel);
                        scan.queue.push_back((channel, local_path));
                    }
                }
                other => debug!("Task {} is {}", task_id, other),
            }
        }

        Ok(())
    }

    fn advance_scan(&mut self, scan: &mut ReadyScan) -> PrepResult<Option<(String, PathBuf)>> {
        loop {
            if let Some(ready) = scan.queue.pop_front() {
                return Ok(Some(ready));
            }
            if scan.remaining.is_empty() {
                info!("All channels transferred");
                return Ok(None);
            }

            if self.poll_successful_transfers(scan)? == 0 {
                self.check_outstanding_tasks(scan)?;
                if scan.queue.is_empty() {
                    debug!(
                        "Waiting {:?} for {} channel(s)",
                        self.settings.poll_interval,
                        scan.remaining.len()
                    );
                    self.sleeper.sleep(self.settings.poll_interval);
                }
            }
        }
    }
}

impl AvailabilityStrategy for TransferFileStrategy {
    fn name(&self) -> &'static str {
        "transfer"
    }

    fn channel_map(&self) -> &ChannelMap {
        &self.channel_map
    }

    fn local_path(&self, channel: &str) -> PrepResult<PathBuf> {
        self.transfer_map
            .get(channel)
            .map(|paths| paths.local_destination.clone())
            .ok_or_else(|| PrepError::UnknownChannel(channel.to_string()))
    }

    fn is_ready(&mut self, channel: &str) -> PrepResult<bool> {
        if !self.transfer_map.contains_key(channel) {
            return Err(PrepError::UnknownChannel(channel.to_string()));
        }
        if self.available.contains(channel) {
            return Ok(true);
        }

        let task_id = self
            .pending
            .iter()
            .find(|p| p.channel == channel)
            .map(|p| p.task_id.clone())
            .ok_or_else(|| PrepError::GenericError(format!("No transfer submitted for channel {}", channel)))?;

        let status = match self.client.task_status(&task_id) {
            Ok(status) => status,
            Err(e) if e.is_retryable() => {
                self.note_transient(TaskQuery::Status, &task_id, &e)?;
                return Ok(false);
            }
            Err(e) => return Err(PrepError::TransferError(format!("task {}: {}", task_id, e))),
        };
        self.note_answer(TaskQuery::Status, &task_id);

        match status {
            TaskStatus::Succeeded => {
                info!("Transfer of {} complete (Task: {})", channel, task_id);
                self.mark_available(channel);
                Ok(true)
            }
            TaskStatus::Failed => {
                error!("Transfer of {} failed (Task: {})", channel, task_id);
                Err(PrepError::TransferFailed {
                    channel: channel.to_string(),
                    task_id,
                })
            }
            other => {
                debug!("Transfer of {} is {}", channel, other);
                Ok(false)
            }
        }
    }

    fn start_ready_scan(&mut self) -> PrepResult<()> {
        if self.submitted_tasks.is_empty() {
            return Err(PrepError::GenericError("No transfers have been submitted".to_string()));
        }
        self.scan = Some(ReadyScan {
            remaining: self.transfer_map.keys().cloned().collect(),
            queue: VecDeque::new(),
        });
        Ok(())
    }

    fn next_ready(&mut self) -> PrepResult<Option<(String, PathBuf)>> {
        let mut scan = self
            .scan
            .take()
            .ok_or_else(|| PrepError::GenericError("Ready scan was not started".to_string()))?;

        let next = self.advance_scan(&mut scan)?;
        if next.is_some() {
            self.scan = Some(scan);
        }
        Ok(next)
    }

    fn cleanup(&mut self, path: &Path, force: bool) {
        if !self.settings.cleanup_enabled && !force {
            info!("Skipping cleanup for {}; cleanup is disabled.", path.display());
            return;
        }

        match fs::remove_file(path) {
            Ok(()) => info!("Cleaned up file: {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Nothing to clean up at {}", path.display());
            }
            Err(e) => warn!("Cleanup failed for {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::transfer_client::{TransferError, TransferItem};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Script {
        submit_results: VecDeque<Result<String, TransferError>>,
        submissions: Vec<TransferRequest>,
        statuses: HashMap<String, VecDeque<Result<TaskStatus, TransferError>>>,
        listings: HashMap<String, VecDeque<TransferListing>>,
        status_calls: usize,
    }

    /// Replays scripted answers; the last answer of a queue repeats
    #[derive(Clone, Default)]
    struct ScriptedClient(Rc<RefCell<Script>>);

    fn next_sticky<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
        if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() }
    }

    impl TransferClient for ScriptedClient {
        fn submit_transfer(&mut self, request: &TransferRequest) -> Result<String, TransferError> {
            let mut script = self.0.borrow_mut();
            script.submissions.push(request.clone());
            let n = script.submissions.len();
            script.submit_results.pop_front().unwrap_or_else(|| Ok(format!("task-{}", n)))
        }

        fn task_status(&mut self, task_id: &str) -> Result<TaskStatus, TransferError> {
            let mut script = self.0.borrow_mut();
            script.status_calls += 1;
            match script.statuses.get_mut(task_id) {
                Some(queue) => next_sticky(queue).unwrap_or(Ok(TaskStatus::Active)),
                None => Err(TransferError::NotFound(task_id.to_string())),
            }
        }

        fn successful_transfers(&mut self, task_id: &str) -> Result<TransferListing, TransferError> {
            let mut script = self.0.borrow_mut();
            Ok(script
                .listings
                .get_mut(task_id)
                .and_then(next_sticky)
                .unwrap_or(TransferListing::InProgress))
        }

        fn list_directory(&mut self, _collection: &str, _path: &str) -> Result<Vec<String>, TransferError> {
            Ok(Vec::new())
        }
    }

    #[derive(Clone, Default)]
    struct CountingSleeper(Rc<RefCell<Vec<Duration>>>);

    impl Sleeper for CountingSleeper {
        fn sleep(&self, duration: Duration) {
            self.0.borrow_mut().push(duration);
        }
    }

    fn channel_map() -> ChannelMap {
        ChannelMap::from_entries([
            ("CD45", "/remote/run/p_002.0.4_R000_dye_CD45-1_x.tif"),
            ("DAPI", "/remote/run/p_001.0.4_R000_DAPI_x.tif"),
        ])
    }

    fn strategy(client: &ScriptedClient, sleeper: &CountingSleeper, staging: &Path) -> TransferFileStrategy {
        let settings = TransferSettings::new("src-collection", "dst-collection", staging);
        TransferFileStrategy::new(
            Box::new(client.clone()),
            channel_map(),
            PathTranslator::new().with_drive_letters(false),
            settings,
        )
        .with_retry_policy(RetryPolicy::new().with_jitter(false))
        .with_sleeper(Box::new(sleeper.clone()))
    }

    #[test]
    fn transfer_map_targets_staging_dir() {
        let client = ScriptedClient::default();
        let sleeper = CountingSleeper::default();
        let strategy = strategy(&client, &sleeper, Path::new("/stage"));

        let dapi = &strategy.transfer_map()["DAPI"];
        assert_eq!(dapi.remote_source, "/remote/run/p_001.0.4_R000_DAPI_x.tif");
        assert_eq!(dapi.local_destination, PathBuf::from("/stage/p_001.0.4_R000_DAPI_x.tif"));
    }

    #[test]
    fn submit_retries_transient_errors() {
        let client = ScriptedClient::default();
        {
            let mut script = client.0.borrow_mut();
            let busy = TransferError::Api { status: 503, message: "busy".to_string() };
            script.submit_results.extend([Err(busy.clone()), Err(busy), Ok("task-ok".to_string())]);
        }
        let sleeper = CountingSleeper::default();
        let mut strategy = strategy(&client, &sleeper, Path::new("/stage"));

        strategy.submit_batches(2).unwrap();

        assert_eq!(client.0.borrow().submissions.len(), 3);
        assert_eq!(sleeper.0.borrow().len(), 2);
        assert_eq!(strategy.pending().len(), 2);
        assert!(strategy.pending().iter().all(|p| p.task_id == "task-ok"));
        assert_eq!(strategy.submitted_tasks(), ["task-ok".to_string()]);
    }

    #[test]
    fn submit_fails_fast_on_permanent_error() {
        let client = ScriptedClient::default();
        client.0.borrow_mut().submit_results.push_back(Err(TransferError::Api {
            status: 401,
            message: "unauthorized".to_string(),
        }));
        let sleeper = CountingSleeper::default();
        let mut strategy = strategy(&client, &sleeper, Path::new("/stage"));

        let err = strategy.submit_all().unwrap_err();
        assert!(matches!(err, PrepError::SubmissionFailed { .. }));
        assert_eq!(client.0.borrow().submissions.len(), 1);
        assert!(sleeper.0.borrow().is_empty());
        assert!(strategy.pending().is_empty());
    }

    #[test]
    fn is_ready_follows_task_status() {
        let client = ScriptedClient::default();
        let sleeper = CountingSleeper::default();
        let mut strategy = strategy(&client, &sleeper, Path::new("/stage"));
        strategy.submit_all().unwrap();

        // submit_all goes in channel order: CD45 -> task-1, DAPI -> task-2
        client.0.borrow_mut().statuses.insert(
            "task-1".to_string(),
            VecDeque::from([Ok(TaskStatus::Active), Ok(TaskStatus::Succeeded)]),
        );

        assert!(!strategy.is_ready("CD45").unwrap());
        assert_eq!(strategy.pending().len(), 2);
        assert!(strategy.is_ready("CD45").unwrap());
        assert_eq!(strategy.pending().len(), 1);

        let calls = client.0.borrow().status_calls;
        assert!(strategy.is_ready("CD45").unwrap());
        assert_eq!(client.0.borrow().status_calls, calls);
    }

    #[test]
    fn failed_task_is_fatal() {
        let client = ScriptedClient::default();
        let sleeper = CountingSleeper::default();
        let mut strategy = strategy(&client, &sleeper, Path::new("/stage"));
        strategy.submit_all().unwrap();
        client
            .0
            .borrow_mut()
            .statuses
            .insert("task-2".to_string(), VecDeque::from([Ok(TaskStatus::Failed)]));

        let err = strategy.is_ready("DAPI").unwrap_err();
        assert!(matches!(err, PrepError::TransferFailed { ref task_id, .. } if task_id == "task-2"));
    }

    #[test]
    fn transient_poll_error_is_not_ready() {
        let client = ScriptedClient::default();
        let sleeper = CountingSleeper::default();
        let mut strategy = strategy(&client, &sleeper, Path::new("/stage"));
        strategy.submit_all().unwrap();
        client.0.borrow_mut().statuses.insert(
            "task-2".to_string(),
            VecDeque::from([Err(TransferError::Timeout("slow".to_string()))]),
        );

        assert!(!strategy.is_ready("DAPI").unwrap());
        assert!(matches!(strategy.is_ready("NOPE"), Err(PrepError::UnknownChannel(_))));
    }

    #[test]
    fn sustained_poll_errors_exhaust_budget() {
        let client = ScriptedClient::default();
        let sleeper = CountingSleeper::default();
        let mut strategy =
            strategy(&client, &sleeper, Path::new("/stage")).with_retry_policy(RetryPolicy::new().with_max_attempts(3));
        strategy.submit_all().unwrap();
        client.0.borrow_mut().statuses.insert(
            "task-2".to_string(),
            VecDeque::from([Err(TransferError::Timeout("slow".to_string()))]),
        );

        assert!(!strategy.is_ready("DAPI").unwrap());
        assert!(!strategy.is_ready("DAPI").unwrap());
        match strategy.is_ready("DAPI") {
            Err(PrepError::RetriesExhausted { channel, attempts, .. }) => {
                assert_eq!(channel, "DAPI");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected exhausted retries, got {:?}", other),
        }
    }

    #[test]
    fn answer_resets_transient_count() {
        let client = ScriptedClient::default();
        let sleeper = CountingSleeper::default();
        let mut strategy =
            strategy(&client, &sleeper, Path::new("/stage")).with_retry_policy(RetryPolicy::new().with_max_attempts(3));
        strategy.submit_all().unwrap();
        let timeout = || Err(TransferError::Timeout("slow".to_string()));
        client.0.borrow_mut().statuses.insert(
            "task-2".to_string(),
            VecDeque::from([timeout(), timeout(), Ok(TaskStatus::Active), timeout(), timeout(), Ok(TaskStatus::Active)]),
        );

        for _ in 0..6 {
            assert!(!strategy.is_ready("DAPI").unwrap());
        }
    }

    #[test]
    fn ready_scan_gives_up_on_unreachable_service() {
        let client = ScriptedClient::default();
        let sleeper = CountingSleeper::default();
        let mut strategy =
            strategy(&client, &sleeper, Path::new("/stage")).with_retry_policy(RetryPolicy::new().with_max_attempts(2));
        strategy.submit_batches(2).unwrap();
        client.0.borrow_mut().statuses.insert(
            "task-1".to_string(),
            VecDeque::from([Err(TransferError::Connection("refused".to_string()))]),
        );

        strategy.start_ready_scan().unwrap();
        assert!(matches!(strategy.next_ready(), Err(PrepError::RetriesExhausted { attempts: 2, .. })));
        assert_eq!(sleeper.0.borrow().len(), 1);
    }

    #[test]
    fn ready_scan_streams_arrivals() {
        let client = ScriptedClient::default();
        let sleeper = CountingSleeper::default();
        let mut strategy = strategy(&client, &sleeper, Path::new("/stage"));
        strategy.submit_batches(2).unwrap();

        let dapi = TransferItem {
            source_path: "/remote/run/p_001.0.4_R000_DAPI_x.tif".to_string(),
            destination_path: "/stage/p_001.0.4_R000_DAPI_x.tif".to_string(),
        };
        let cd45 = TransferItem {
            source_path: "/remote/run/p_002.0.4_R000_dye_CD45-1_x.tif".to_string(),
            destination_path: "/stage/p_002.0.4_R000_dye_CD45-1_x.tif".to_string(),
        };
        {
            let mut script = client.0.borrow_mut();
            script.statuses.insert("task-1".to_string(), VecDeque::from([Ok(TaskStatus::Active)]));
            script.listings.insert(
                "task-1".to_string(),
                VecDeque::from([
                    TransferListing::InProgress,
                    TransferListing::Completed(vec![dapi.clone()]),
                    TransferListing::Completed(vec![dapi, cd45]),
                ]),
            );
        }

        strategy.start_ready_scan().unwrap();
        let first = strategy.next_ready().unwrap().unwrap();
        assert_eq!(first.0, "DAPI");
        assert_eq!(first.1, PathBuf::from("/stage/p_001.0.4_R000_DAPI_x.tif"));
        let second = strategy.next_ready().unwrap().unwrap();
        assert_eq!(second.0, "CD45");
        assert!(strategy.next_ready().unwrap().is_none());

        assert_eq!(sleeper.0.borrow().len(), 1);
        assert!(strategy.pending().is_empty());
    }

    #[test]
    fn ready_scan_surfaces_failed_task() {
        let client = ScriptedClient::default();
        let sleeper = CountingSleeper::default();
        let mut strategy = strategy(&client, &sleeper, Path::new("/stage"));
        strategy.submit_all().unwrap();
        {
            let mut script = client.0.borrow_mut();
            script.statuses.insert("task-1".to_string(), VecDeque::from([Ok(TaskStatus::Failed)]));
            script.statuses.insert("task-2".to_string(), VecDeque::from([Ok(TaskStatus::Active)]));
        }

        strategy.start_ready_scan().unwrap();
        assert!(matches!(strategy.next_ready(), Err(PrepError::TransferFailed { .. })));
    }

    #[test]
    fn cleanup_respects_flag_and_force() {
        let dir = tempdir().unwrap();
        let client = ScriptedClient::default();
        let sleeper = CountingSleeper::default();
        let mut strategy = strategy(&client, &sleeper, dir.path());

        let path = dir.path().join("staged.tif");
        fs::write(&path, b"tif").unwrap();

        strategy.cleanup(&path, false);
        assert!(path.exists());
        strategy.cleanup(&path, true);
        assert!(!path.exists());
        // Missing file is swallowed
        strategy.cleanup(&path, true);
    }
}
