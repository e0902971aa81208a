//! Custom error types for core preparation

use std::fmt;
use std::io;

/// Errors raised while preparing cores
#[derive(Debug)]
pub enum PrepError {
    /// I/O error
    IoError(io::Error),
    /// Image decoding or encoding error
    ImageError(image::ImageError),
    /// No channel could be parsed from the scanned file list
    EmptyResult(String),
    /// The temporary folder for a core does not exist
    NoTempFolder(String),
    /// The temporary folder for a core holds no channel images
    NoChannelFiles(String),
    /// Core bounding box is degenerate or lies outside the image
    InvalidBounds {
        core_id: String,
        reason: String,
    },
    /// Invalid or inconsistent configuration / input table
    InvalidConfig(String),
    /// Transfer submission failed with a non-retryable error
    SubmissionFailed {
        channel: String,
        message: String,
    },
    /// Transfer submission kept failing with retryable errors
    RetriesExhausted {
        channel: String,
        attempts: u32,
        message: String,
    },
    /// The transfer service reported a terminal failure for a task
    TransferFailed {
        channel: String,
        task_id: String,
    },
    /// Any other transfer service error surfaced while polling or listing
    TransferError(String),
    /// A channel that is not part of the run was referenced
    UnknownChannel(String),
    /// The channel source finished while channels were still outstanding
    MissingChannels(Vec<String>),
    /// Poll mode ran out of polling rounds
    PollLimitExceeded {
        rounds: usize,
        outstanding: Vec<String>,
    },
    /// Generic error with message
    GenericError(String),
}

impl fmt::Display for PrepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrepError::IoError(e) => write!(f, "I/O error: {}", e),
            PrepError::ImageError(e) => write!(f, "Image error: {}", e),
            PrepError::EmptyResult(source) => write!(f, "No valid .0.4 TIF(F) files found in {}", source),
            PrepError::NoTempFolder(core_id) => write!(f, "No temp folder found for core: {}", core_id),
            PrepError::NoChannelFiles(core_id) => write!(f, "No TIFFs found for core: {}", core_id),
            PrepError::InvalidBounds { core_id, reason } => {
                write!(f, "Invalid bounds for core {}: {}", core_id, reason)
            }
            PrepError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            PrepError::SubmissionFailed { channel, message } => {
                write!(f, "Transfer submission failed for {}: {}", channel, message)
            }
            PrepError::RetriesExhausted { channel, attempts, message } => write!(
                f,
                "Exhausted {} attempts submitting transfer for {}: {}",
                attempts, channel, message
            ),
            PrepError::TransferFailed { channel, task_id } => {
                write!(f, "Transfer failed for {} (task {})", channel, task_id)
            }
            PrepError::TransferError(msg) => write!(f, "Transfer service error: {}", msg),
            PrepError::UnknownChannel(channel) => write!(f, "Channel {} is not part of this run", channel),
            PrepError::MissingChannels(channels) => {
                write!(f, "Channel source exhausted with channels outstanding: {}", channels.join(", "))
            }
            PrepError::PollLimitExceeded { rounds, outstanding } => write!(
                f,
                "Gave up after {} polling rounds; still waiting for: {}",
                rounds,
                outstanding.join(", ")
            ),
            PrepError::GenericError(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for PrepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PrepError::IoError(e) => Some(e),
            PrepError::ImageError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PrepError {
    fn from(error: io::Error) -> Self {
        PrepError::IoError(error)
    }
}

impl From<image::ImageError> for PrepError {
    fn from(error: image::ImageError) -> Self {
        PrepError::ImageError(error)
    }
}

impl From<String> for PrepError {
    fn from(msg: String) -> Self {
        PrepError::GenericError(msg)
    }
}

/// Result type for core preparation operations
pub type PrepResult<T> = Result<T, PrepError>;
