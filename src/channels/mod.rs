//! Channel discovery and selection

mod listing;
mod scanner;

pub use listing::{discover_channels, list_local_files, list_remote_files, ImageSource};
pub use scanner::{channel_key, parse_channel_file, scan_channels, ChannelMap, ChannelSelection, ParsedChannel, DAPI_MARKER};
