use crate::{CoreError, CoreResult, Session, SessionStore, StoreRecord};

use std::{panic::Location, sync::Mutex};

use error_location::ErrorLocation;

/// Session store held in process memory. Lost on restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    record: Mutex<StoreRecord>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> CoreResult<StoreRecord> {
        Ok(self.record.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    #[track_caller]
    fn compare_and_set(&self, expected_revision: u64, session: Option<&Session>) -> CoreResult<u64> {
        let mut record = self.record.lock().unwrap_or_else(|p| p.into_inner());

        if record.revision != expected_revision {
            return Err(CoreError::ConcurrentModification {
                expected: expected_revision,
                actual: record.revision,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        record.revision += 1;
        record.session = session.cloned();
        Ok(record.revision)
    }
}
