//! JSON-file record store.
//!
//! One pretty-printed file per collection under a data directory:
//! `<dir>/solutions.json`, `<dir>/sellers.json`, and so on. Each file holds
//! an array of `{ "key": ..., "record": ... }` rows. Writes go to a temp
//! file that is then renamed over the original, so readers never see a
//! half-written collection.
//!
//! Commits hold an advisory lock on `<dir>/.lock` from the expectation check
//! until the last rename, so several processes sharing one data directory
//! see each commit as a single step.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{RecordStore, Row, StoreError, WriteBatch, expectations_hold, upsert_rows};

const LOCK_FILE: &str = ".lock";

#[derive(Serialize, Deserialize)]
struct StoredRow {
    key: String,
    record: Value,
}

/// Record store backed by JSON files in a directory.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Opens (and creates if missing) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// The data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock_dir(&self) -> Result<File, StoreError> {
        let path = self.dir.join(LOCK_FILE);
        let io = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(io)?;
        // Released when the handle is closed.
        FileExt::lock_exclusive(&file).map_err(io)?;
        Ok(file)
    }

    fn path_for(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    fn read(&self, collection: &str) -> Result<Vec<Row>, StoreError> {
        let path = self.path_for(collection);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let data = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let rows: Vec<StoredRow> =
            serde_json::from_str(&data).map_err(|source| StoreError::Schema {
                collection: collection.to_string(),
                source,
            })?;
        Ok(rows.into_iter().map(|row| (row.key, row.record)).collect())
    }

    /// Writes `rows` to the collection's temp file and returns its path.
    fn stage(&self, collection: &str, rows: Vec<Row>) -> Result<PathBuf, StoreError> {
        let path = self.path_for(collection);
        let stored: Vec<StoredRow> = rows
            .into_iter()
            .map(|(key, record)| StoredRow { key, record })
            .collect();
        let data = serde_json::to_string_pretty(&stored).map_err(|source| StoreError::Schema {
            collection: collection.to_string(),
            source,
        })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        debug!(collection, rows = stored.len(), "collection staged");
        Ok(tmp)
    }

    fn publish(&self, collection: &str, tmp: &Path) -> Result<(), StoreError> {
        let path = self.path_for(collection);
        fs::rename(tmp, &path).map_err(|source| StoreError::Io { path, source })
    }
}

impl RecordStore for JsonFileStore {
    fn load_all(&self, collection: &str) -> Result<Vec<Row>, StoreError> {
        self.read(collection)
    }

    fn fetch(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .read(collection)?
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value))
    }

    fn commit(&self, batch: WriteBatch) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock();
        let _dir_lock = self.lock_dir()?;

        let mut loaded: HashMap<String, Vec<Row>> = HashMap::new();
        let holds = expectations_hold(batch.expectations(), |collection, key| {
            if !loaded.contains_key(collection) {
                loaded.insert(collection.to_string(), self.read(collection)?);
            }
            Ok(loaded
                .get(collection)
                .and_then(|rows| rows.iter().find(|(k, _)| k == key))
                .map(|(_, value)| value.clone()))
        })?;
        if !holds {
            debug!("commit skipped, expectation failed");
            return Ok(false);
        }

        // Stage every collection before renaming any, so a failed write
        // leaves all of them untouched.
        let mut staged = Vec::new();
        for (collection, rows) in batch.into_writes() {
            let mut existing = match loaded.remove(&collection) {
                Some(existing) => existing,
                None => self.read(&collection)?,
            };
            upsert_rows(&mut existing, rows);
            let tmp = self.stage(&collection, existing)?;
            staged.push((collection, tmp));
        }
        for (collection, tmp) in &staged {
            self.publish(collection, tmp)?;
        }
        Ok(true)
    }
}
