//! Transfer service capability set
//!
//! The remote strategy talks to an asynchronous transfer service through
//! this trait only: submit a task, ask for its status, list the items that
//! already landed, and list a remote directory. Any service that can do
//! those four things can back a remote run.

use std::fmt;

/// HTTP-like status codes treated as transient
pub const RETRYABLE_STATUSES: [u16; 3] = [502, 503, 504];

/// Status of a transfer task as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Active,
    Inactive,
    Succeeded,
    Failed,
}

impl TaskStatus {
    /// Parse the service's status code (case-insensitive)
    ///
    /// Unknown codes map to `Active`: anything that is not a terminal
    /// status means "keep waiting".
    pub fn from_code(code: &str) -> Self {
        match code.to_ascii_uppercase().as_str() {
            "QUEUED" => TaskStatus::Queued,
            "INACTIVE" => TaskStatus::Inactive,
            "SUCCEEDED" => TaskStatus::Succeeded,
            "FAILED" => TaskStatus::Failed,
            _ => TaskStatus::Active,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            TaskStatus::Queued => "QUEUED",
            TaskStatus::Active => "ACTIVE",
            TaskStatus::Inactive => "INACTIVE",
            TaskStatus::Succeeded => "SUCCEEDED",
            TaskStatus::Failed => "FAILED",
        };
        write!(f, "{}", code)
    }
}

/// One file of a transfer request, in the service's path namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferItem {
    pub source_path: String,
    pub destination_path: String,
}

/// A transfer task to submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source_collection: String,
    pub destination_collection: String,
    pub label: String,
    /// Skip files whose checksum already matches at the destination
    pub sync_checksum: bool,
    pub items: Vec<TransferItem>,
}

impl TransferRequest {
    pub fn new(source_collection: &str, destination_collection: &str, label: &str) -> Self {
        TransferRequest {
            source_collection: source_collection.to_string(),
            destination_collection: destination_collection.to_string(),
            label: label.to_string(),
            sync_checksum: true,
            items: Vec::new(),
        }
    }

    pub fn add_item(&mut self, source_path: &str, destination_path: &str) {
        self.items.push(TransferItem {
            source_path: source_path.to_string(),
            destination_path: destination_path.to_string(),
        });
    }
}

/// Outcome of asking which items of a task have landed
///
/// Services commonly refuse to list items while a task is still running;
/// that is an expected state, not a failure, so it has its own variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferListing {
    /// Items that completed successfully so far
    Completed(Vec<TransferItem>),
    /// The task cannot be listed yet
    InProgress,
}

/// Errors reported by a transfer service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Service answered with an error status
    Api { status: u16, message: String },
    /// Connection could not be established or was dropped
    Connection(String),
    /// Request timed out
    Timeout(String),
    /// Task, collection or path does not exist
    NotFound(String),
    /// Anything else
    Other(String),
}

impl TransferError {
    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::Api { status, .. } => RETRYABLE_STATUSES.contains(status),
            TransferError::Connection(_) | TransferError::Timeout(_) => true,
            TransferError::NotFound(_) | TransferError::Other(_) => false,
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Api { status, message } => write!(f, "HTTP {}: {}", status, message),
            TransferError::Connection(msg) => write!(f, "connection error: {}", msg),
            TransferError::Timeout(msg) => write!(f, "timeout: {}", msg),
            TransferError::NotFound(msg) => write!(f, "not found: {}", msg),
            TransferError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for TransferError {}

/// Client of an asynchronous transfer service
pub trait TransferClient {
    /// Submit a transfer task and return its id
    fn submit_transfer(&mut self, request: &TransferRequest) -> Result<String, TransferError>;

    /// Current status of a task
    fn task_status(&mut self, task_id: &str) -> Result<TaskStatus, TransferError>;

    /// Items of a task that completed successfully
    fn successful_transfers(&mut self, task_id: &str) -> Result<TransferListing, TransferError>;

    /// File names inside a directory of a collection
    fn list_directory(&mut self, collection: &str, path: &str) -> Result<Vec<String>, TransferError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_whitelist() {
        let unavailable = TransferError::Api { status: 503, message: "busy".to_string() };
        let forbidden = TransferError::Api { status: 403, message: "denied".to_string() };

        assert!(unavailable.is_retryable());
        assert!(TransferError::Timeout("slow".to_string()).is_retryable());
        assert!(TransferError::Connection("reset".to_string()).is_retryable());
        assert!(!forbidden.is_retryable());
        assert!(!TransferError::NotFound("task".to_string()).is_retryable());
    }

    #[test]
    fn status_codes() {
        assert_eq!(TaskStatus::from_code("succeeded"), TaskStatus::Succeeded);
        assert_eq!(TaskStatus::from_code("FAILED"), TaskStatus::Failed);
        assert_eq!(TaskStatus::from_code("whatever"), TaskStatus::Active);
    }
}
