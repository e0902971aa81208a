//! Listing candidate channel files from a local or remote location

use std::fs;
use std::path::Path;

use log::info;

use crate::availability::TransferClient;
use crate::errors::{PrepError, PrepResult};

use super::scanner::{scan_channels, ChannelMap, ChannelSelection};

/// Where the per-channel source images live
pub enum ImageSource<'a> {
    /// A local directory
    Local(&'a Path),
    /// A directory inside a transfer-service collection
    Remote {
        client: &'a mut dyn TransferClient,
        collection: &'a str,
        path: &'a str,
    },
}

/// List files in a local directory whose name contains `.tif`
///
/// The listing is not recursive. Returned paths are full paths, sorted.
pub fn list_local_files(dir: &Path) -> PrepResult<Vec<String>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_tif = path
            .file_name()
            .map(|name| name.to_string_lossy().contains(".tif"))
            .unwrap_or(false);
        if is_tif && path.is_file() {
            files.push(path.to_string_lossy().to_string());
        }
    }
    files.sort();
    Ok(files)
}

/// List `.tif`/`.tiff` files inside a remote collection directory
///
/// Returned paths are service paths (`<path>/<name>`).
pub fn list_remote_files(client: &mut dyn TransferClient, collection: &str, path: &str) -> PrepResult<Vec<String>> {
    let names = client
        .list_directory(collection, path)
        .map_err(|e| PrepError::TransferError(format!("listing {}:{}: {}", collection, path, e)))?;

    let base = path.trim_end_matches('/');
    let mut files: Vec<String> = names
        .into_iter()
        .filter(|name| {
            let lower = name.to_lowercase();
            lower.ends_with(".tif") || lower.ends_with(".tiff")
        })
        .map(|name| format!("{}/{}", base, name))
        .collect();
    files.sort();
    Ok(files)
}

/// List a source location and build its channel map
///
/// # Arguments
/// * `source` - Local directory or remote collection directory
/// * `selection` - Round-selection and marker filters
///
/// # Returns
/// The channel map, keyed to local paths or service paths
pub fn discover_channels(source: ImageSource<'_>, selection: &ChannelSelection) -> PrepResult<ChannelMap> {
    let files = match source {
        ImageSource::Local(dir) => {
            info!("Scanning local directory {}", dir.display());
            list_local_files(dir)?
        }
        ImageSource::Remote { client, collection, path } => {
            info!("Scanning remote directory {}:{}", collection, path);
            list_remote_files(client, collection, path)?
        }
    };

    info!("Found {} candidate image files", files.len());
    scan_channels(&files, selection)
}
