use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::domain::email::{MessageId, ProcessedSet};
use crate::error::StoreError;
use crate::store::repo::ProcessedRepository;

/// Processed UIDs stored as a JSON array, e.g. `[12, 40, 41]`.
pub struct JsonProcessedStore {
    path: PathBuf,
}

impl JsonProcessedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "processed.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ProcessedRepository for JsonProcessedStore {
    fn load(&self) -> Result<ProcessedSet, StoreError> {
        let s = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ProcessedSet::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        let ids: Vec<MessageId> =
            serde_json::from_str(&s).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(ids.into_iter().collect())
    }

    fn save(&self, set: &ProcessedSet) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        // the state file is only ever replaced whole
        let data = serde_json::to_string(set).map_err(StoreError::Serialize)?;
        let tmp = self.temp_path();
        fs::write(&tmp, data).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        Ok(())
    }
}
