//! Transfer client for collections mounted on the local filesystem
//!
//! Each collection id is bound to a directory. Service paths are resolved
//! relative to that directory, and a submitted task copies its items
//! synchronously, so every task is terminal as soon as it has an id.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::transfer_client::{
    TaskStatus, TransferClient, TransferError, TransferItem, TransferListing, TransferRequest,
};

struct TaskRecord {
    status: TaskStatus,
    delivered: Vec<TransferItem>,
}

/// Transfer client that copies between mounted directories
pub struct MountedCollectionClient {
    mounts: HashMap<String, PathBuf>,
    tasks: HashMap<String, TaskRecord>,
    next_task: usize,
}

impl MountedCollectionClient {
    /// Create a client from `collection id -> mount directory` bindings
    pub fn new(mounts: HashMap<String, PathBuf>) -> Self {
        MountedCollectionClient {
            mounts,
            tasks: HashMap::new(),
            next_task: 1,
        }
    }

    /// Local location of a service path inside a collection
    fn resolve(&self, collection: &str, path: &str) -> Result<PathBuf, TransferError> {
        let root = self
            .mounts
            .get(collection)
            .ok_or_else(|| TransferError::NotFound(format!("collection {}", collection)))?;
        Ok(root.join(path.trim_start_matches('/')))
    }

    fn copy_item(&self, request: &TransferRequest, item: &TransferItem) -> io::Result<bool> {
        let source = self
            .resolve(&request.source_collection, &item.source_path)
            .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e.to_string()))?;
        let destination = self
            .resolve(&request.destination_collection, &item.destination_path)
            .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e.to_string()))?;

        if request.sync_checksum && same_contents(&source, &destination) {
            debug!("{} already up to date", destination.display());
            return Ok(false);
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, &destination)?;
        Ok(true)
    }
}

fn same_contents(a: &Path, b: &Path) -> bool {
    match (fs::read(a), fs::read(b)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

impl TransferClient for MountedCollectionClient {
    fn submit_transfer(&mut self, request: &TransferRequest) -> Result<String, TransferError> {
        for collection in [&request.source_collection, &request.destination_collection] {
            if !self.mounts.contains_key(collection) {
                return Err(TransferError::NotFound(format!("collection {}", collection)));
            }
        }

        let task_id = format!("mounted-{:04}", self.next_task);
        self.next_task += 1;

        let mut status = TaskStatus::Succeeded;
        let mut delivered = Vec::new();
        for item in &request.items {
            match self.copy_item(request, item) {
                Ok(true) => delivered.push(item.clone()),
                Ok(false) => {}
                Err(e) => {
                    warn!("Task {}: copying {} failed: {}", task_id, item.source_path, e);
                    status = TaskStatus::Failed;
                    break;
                }
            }
        }

        info!(
            "Task {} ({}) {} with {} file(s) copied",
            task_id,
            request.label,
            status,
            delivered.len()
        );
        self.tasks.insert(task_id.clone(), TaskRecord { status, delivered });
        Ok(task_id)
    }

    fn task_status(&mut self, task_id: &str) -> Result<TaskStatus, TransferError> {
        self.tasks
            .get(task_id)
            .map(|task| task.status)
            .ok_or_else(|| TransferError::NotFound(format!("task {}", task_id)))
    }

    fn successful_transfers(&mut self, task_id: &str) -> Result<TransferListing, TransferError> {
        self.tasks
            .get(task_id)
            .map(|task| TransferListing::Completed(task.delivered.clone()))
            .ok_or_else(|| TransferError::NotFound(format!("task {}", task_id)))
    }

    fn list_directory(&mut self, collection: &str, path: &str) -> Result<Vec<String>, TransferError> {
        let dir = self.resolve(collection, path)?;
        let entries = fs::read_dir(&dir).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TransferError::NotFound(dir.display().to_string()),
            _ => TransferError::Other(format!("{}: {}", dir.display(), e)),
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TransferError::Other(e.to_string()))?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn client(source: &Path, destination: &Path) -> MountedCollectionClient {
        let mut mounts = HashMap::new();
        mounts.insert("src".to_string(), source.to_path_buf());
        mounts.insert("dst".to_string(), destination.to_path_buf());
        MountedCollectionClient::new(mounts)
    }

    #[test]
    fn submit_copies_and_reports_success() {
        let source = tempdir().unwrap();
        let destination = tempdir().unwrap();
        fs::create_dir_all(source.path().join("run")).unwrap();
        fs::write(source.path().join("run/a.tif"), b"pixels").unwrap();

        let mut client = client(source.path(), destination.path());
        let mut request = TransferRequest::new("src", "dst", "batch 1");
        request.add_item("/run/a.tif", "/stage/a.tif");

        let task_id = client.submit_transfer(&request).unwrap();
        assert_eq!(task_id, "mounted-0001");
        assert_eq!(client.task_status(&task_id).unwrap(), TaskStatus::Succeeded);
        assert_eq!(fs::read(destination.path().join("stage/a.tif")).unwrap(), b"pixels");

        match client.successful_transfers(&task_id).unwrap() {
            TransferListing::Completed(items) => assert_eq!(items.len(), 1),
            TransferListing::InProgress => panic!("mounted tasks are never in progress"),
        }
    }

    #[test]
    fn missing_source_fails_task() {
        let source = tempdir().unwrap();
        let destination = tempdir().unwrap();
        let mut client = client(source.path(), destination.path());

        let mut request = TransferRequest::new("src", "dst", "batch 1");
        request.add_item("/missing.tif", "/missing.tif");

        let task_id = client.submit_transfer(&request).unwrap();
        assert_eq!(client.task_status(&task_id).unwrap(), TaskStatus::Failed);
    }

    #[test]
    fn unknown_collection_is_not_found() {
        let dir = tempdir().unwrap();
        let mut client = client(dir.path(), dir.path());
        let request = TransferRequest::new("src", "elsewhere", "batch 1");

        assert!(matches!(client.submit_transfer(&request), Err(TransferError::NotFound(_))));
        assert!(matches!(client.task_status("mounted-9999"), Err(TransferError::NotFound(_))));
    }

    #[test]
    fn lists_files_only() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("run/nested")).unwrap();
        fs::write(dir.path().join("run/b.tif"), b"").unwrap();
        fs::write(dir.path().join("run/a.tif"), b"").unwrap();

        let mut client = client(dir.path(), dir.path());
        assert_eq!(client.list_directory("src", "/run").unwrap(), vec!["a.tif", "b.tif"]);
    }
}
