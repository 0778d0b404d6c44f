use crate::{CoreError, CoreResult, Session, SessionStore, StoreRecord};

use std::{
    fs,
    io::{ErrorKind, Write},
    panic::Location,
    path::{Path, PathBuf},
    sync::Mutex,
};

use error_location::ErrorLocation;
use tracing::{debug, info, warn};

/// Session store backed by a JSON file.
///
/// Writes go through a temp file, `fsync` and rename, so a crash leaves
/// either the old or the new record. Compare-and-set is serialized within
/// the process by a mutex; the file itself is not locked.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    /// Store at `path`. Parent directories are created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the record file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[track_caller]
    fn read_record(&self) -> CoreResult<StoreRecord> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?self.path, "No session record yet");
                return Ok(StoreRecord::default());
            }
            Err(e) => {
                return Err(CoreError::StoreError {
                    reason: format!("Failed to read session record: {}", e),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        if contents.trim().is_empty() {
            return Ok(StoreRecord::default());
        }

        match serde_json::from_str(&contents) {
            Ok(record) => Ok(record),
            Err(e) => {
                // Keep the bad file for inspection and start over.
                let aside = self.path.with_extension("json.corrupt");
                warn!(path = ?self.path, error = %e, aside = ?aside, "Corrupt session record moved aside");
                fs::rename(&self.path, &aside).map_err(|e| CoreError::StoreError {
                    reason: format!("Failed to move corrupt session record: {}", e),
                    location: ErrorLocation::from(Location::caller()),
                })?;
                Ok(StoreRecord::default())
            }
        }
    }

    #[track_caller]
    fn write_record(&self, record: &StoreRecord) -> CoreResult<()> {
        let write_failed = |what: &str, e: &dyn std::fmt::Display| CoreError::StoreError {
            reason: format!("Failed to {what}: {e}"),
            location: ErrorLocation::from(Location::caller()),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_failed("create store directory", &e))?;
        }

        let contents =
            serde_json::to_string_pretty(record).map_err(|e| write_failed("serialize session record", &e))?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut temp_file =
            fs::File::create(&temp_path).map_err(|e| write_failed("create temp record", &e))?;
        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| write_failed("write temp record", &e))?;
        temp_file
            .sync_all()
            .map_err(|e| write_failed("sync temp record", &e))?;

        fs::rename(&temp_path, &self.path).map_err(|e| write_failed("rename temp record", &e))?;

        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> CoreResult<StoreRecord> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        self.read_record()
    }

    #[track_caller]
    fn compare_and_set(&self, expected_revision: u64, session: Option<&Session>) -> CoreResult<u64> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let current = self.read_record()?;

        if current.revision != expected_revision {
            return Err(CoreError::ConcurrentModification {
                expected: expected_revision,
                actual: current.revision,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let next = StoreRecord {
            revision: current.revision + 1,
            session: session.cloned(),
        };
        self.write_record(&next)?;

        if next.revision == 1 {
            info!(path = ?self.path, "Session record created");
        }

        Ok(next.revision)
    }
}
