//! File availability strategies
//!
//! This module implements the strategies that make per-channel source files
//! available on local disk: directly from a local directory, or through an
//! asynchronous transfer service with retrying submission and polling.

mod local_strategy;
mod mounted_client;
mod path_translation;
mod retry;
mod sleeper;
mod strategy;
mod transfer_client;
mod transfer_strategy;

pub use local_strategy::LocalFileStrategy;
pub use mounted_client::MountedCollectionClient;
pub use path_translation::PathTranslator;
pub use retry::{retry_with_backoff, RetryFailure, RetryPolicy, RetryStats};
pub use sleeper::{Sleeper, ThreadSleeper};
pub use strategy::AvailabilityStrategy;
pub use transfer_client::{
    TaskStatus, TransferClient, TransferError, TransferItem, TransferListing, TransferRequest,
    RETRYABLE_STATUSES,
};
pub use transfer_strategy::{PendingTransfer, TransferFileStrategy, TransferPaths, TransferSettings};
