//! Core metadata table
//!
//! One record per physical core / ROI, produced by an upstream ROI
//! definition step and read-only here. The table is stored as TOML:
//!
//! ```toml
//! [[cores]]
//! core_id = "A1"
//! row_start = 100
//! row_stop = 612
//! column_start = 40
//! column_stop = 552
//! polygon = [[100.0, 40.0], [612.0, 40.0], [612.0, 552.0]]
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::errors::{PrepError, PrepResult};

/// Bounds and optional outline of one core, in full-resolution pixels
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoreRecord {
    pub core_id: String,
    pub row_start: i64,
    pub row_stop: i64,
    pub column_start: i64,
    pub column_stop: i64,
    /// Polygon vertices as `[row, column]` pairs
    #[serde(default)]
    pub polygon: Option<Vec<[f64; 2]>>,
}

impl CoreRecord {
    pub fn new(core_id: &str, row_start: i64, row_stop: i64, column_start: i64, column_stop: i64) -> Self {
        CoreRecord {
            core_id: core_id.to_string(),
            row_start,
            row_stop,
            column_start,
            column_stop,
            polygon: None,
        }
    }

    pub fn with_polygon(mut self, vertices: Vec<[f64; 2]>) -> Self {
        self.polygon = Some(vertices);
        self
    }
}

#[derive(Deserialize)]
struct CoreFile {
    #[serde(default)]
    cores: Vec<CoreRecord>,
}

/// The set of cores cut in one run
#[derive(Debug, Clone, Default)]
pub struct CoreTable {
    records: Vec<CoreRecord>,
}

impl CoreTable {
    /// Build a table, rejecting duplicate core ids
    pub fn from_records(records: Vec<CoreRecord>) -> PrepResult<Self> {
        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert(record.core_id.as_str()) {
                return Err(PrepError::InvalidConfig(format!(
                    "duplicate core_id '{}' in metadata",
                    record.core_id
                )));
            }
        }
        Ok(CoreTable { records })
    }

    /// Load a table from a TOML file of `[[cores]]` entries
    pub fn load(path: &Path) -> PrepResult<Self> {
        let text = fs::read_to_string(path)?;
        let file: CoreFile = toml::from_str(&text)
            .map_err(|e| PrepError::InvalidConfig(format!("{}: {}", path.display(), e)))?;

        info!("Loaded {} cores from {}", file.cores.len(), path.display());
        Self::from_records(file.cores)
    }

    pub fn records(&self) -> &[CoreRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoreRecord> {
        self.records.iter()
    }

    pub fn core_ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.core_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_cores_with_optional_polygon() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cores.toml");
        fs::write(
            &path,
            r#"
[[cores]]
core_id = "A1"
row_start = 0
row_stop = 10
column_start = 5
column_stop = 15
polygon = [[0.0, 5.0], [10.0, 5.0], [10.0, 15.0]]

[[cores]]
core_id = "A2"
row_start = 20
row_stop = 30
column_start = 20
column_stop = 30
"#,
        )
        .unwrap();

        let table = CoreTable::load(&path).unwrap();
        assert_eq!(table.core_ids().collect::<Vec<_>>(), vec!["A1", "A2"]);
        assert_eq!(table.records()[0].polygon.as_ref().map(Vec::len), Some(3));
        assert!(table.records()[1].polygon.is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let records = vec![CoreRecord::new("A1", 0, 1, 0, 1), CoreRecord::new("A1", 2, 3, 2, 3)];
        assert!(matches!(CoreTable::from_records(records), Err(PrepError::InvalidConfig(_))));
    }
}
