//! JSON-file record store: one `<collection>.json` per collection

use log::debug;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{Collection, RecordStore};
use crate::error::LendingResult;

/// Record store persisting each collection as a JSON array on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Open (or create) a store rooted at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> LendingResult<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, collection: Collection) -> PathBuf {
        self.root.join(format!("{}.json", collection.as_str()))
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self, collection: Collection) -> LendingResult<Vec<Value>> {
        let path = self.path_for(collection);
        match fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, collection: Collection, records: Vec<Value>) -> LendingResult<()> {
        let path = self.path_for(collection);
        let tmp = path.with_extension("json.tmp");

        // Write-then-rename so readers never see a half-written file
        fs::write(&tmp, serde_json::to_vec_pretty(&records)?)?;
        fs::rename(&tmp, &path)?;

        debug!("Saved {} {} records to {}", records.len(), collection, path.display());
        Ok(())
    }
}
