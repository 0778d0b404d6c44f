mod file;
mod memory;

pub use {file::FileSessionStore, memory::MemorySessionStore};

use crate::{CoreResult, Session};

use serde::{Deserialize, Serialize};

/// Persisted session record with its revision.
///
/// Revision 0 means nothing has ever been written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    /// Bumped on every successful write.
    pub revision: u64,
    /// The session, absent before the first START.
    pub session: Option<Session>,
}

/// Durable home of the single session record.
///
/// Writers read a record, compute the next session and write it back with
/// [`SessionStore::compare_and_set`], which fails with
/// [`CoreError::ConcurrentModification`](crate::CoreError::ConcurrentModification)
/// when another writer got there first.
pub trait SessionStore: Send + Sync {
    /// Reads the current record.
    fn load(&self) -> CoreResult<StoreRecord>;

    /// Writes `session` if the stored revision still equals
    /// `expected_revision`. Returns the new revision.
    fn compare_and_set(&self, expected_revision: u64, session: Option<&Session>) -> CoreResult<u64>;
}

impl<S: SessionStore + ?Sized> SessionStore for std::sync::Arc<S> {
    fn load(&self) -> CoreResult<StoreRecord> {
        (**self).load()
    }

    fn compare_and_set(&self, expected_revision: u64, session: Option<&Session>) -> CoreResult<u64> {
        (**self).compare_and_set(expected_revision, session)
    }
}
