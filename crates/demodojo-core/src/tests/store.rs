use super::support::{source, t0};
use crate::{
    CoreError, FileSessionStore, MemorySessionStore, Session, SessionId, SessionState,
    SessionStore,
};

use std::fs;

fn session() -> Session {
    Session::new(SessionId::new(), source(), true, 3, t0())
}

/// WHAT: Compare-and-set refuses a write based on an old revision
/// WHY: Two near-simultaneous messages must not both win
#[test]
#[allow(clippy::unwrap_used)]
fn given_memory_store_when_stale_revision_written_then_concurrent_modification() {
    // Given: A store written once
    let store = MemorySessionStore::default();
    let first = store.compare_and_set(0, Some(&session())).unwrap();
    assert_eq!(first, 1);

    // When: Another writer still holding revision 0 writes
    let result = store.compare_and_set(0, None);

    // Then: Refused and the first write survives
    assert!(matches!(
        result,
        Err(CoreError::ConcurrentModification { expected: 0, actual: 1, .. })
    ));
    let record = store.load().unwrap();
    assert_eq!(record.revision, 1);
    assert!(record.session.is_some());
}

/// WHAT: A missing record file reads as an empty store
/// WHY: First launch has nothing persisted yet
#[test]
#[allow(clippy::unwrap_used)]
fn given_no_file_when_loaded_then_empty_record() {
    // Given: A store pointing into an empty directory
    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));

    // When: Loaded
    let record = store.load().unwrap();

    // Then: Revision 0, no session
    assert_eq!(record.revision, 0);
    assert!(record.session.is_none());
}

/// WHAT: A written session is visible to a fresh store on the same file
/// WHY: The coordinator must survive a restart with nothing held in memory
#[test]
#[allow(clippy::unwrap_used)]
fn given_written_record_when_reopened_then_same_session() {
    // Given: A session written through one store instance
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let mut written = session();
    written.state = SessionState::Recording;
    FileSessionStore::new(&path)
        .compare_and_set(0, Some(&written))
        .unwrap();

    // When: A new instance loads it
    let record = FileSessionStore::new(&path).load().unwrap();

    // Then: Identical session at revision 1, no temp file left behind
    assert_eq!(record.revision, 1);
    assert_eq!(record.session, Some(written));
    assert!(!path.with_extension("json.tmp").exists());
}

/// WHAT: A corrupt record is moved aside and the store starts empty
/// WHY: A damaged file must not wedge every future message
#[test]
#[allow(clippy::unwrap_used)]
fn given_corrupt_file_when_loaded_then_moved_aside_and_empty() {
    // Given: A file with garbage in it
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    fs::write(&path, "{ not json").unwrap();
    let store = FileSessionStore::new(&path);

    // When: Loaded
    let record = store.load().unwrap();

    // Then: Empty record, original preserved next to it
    assert_eq!(record.revision, 0);
    assert!(path.with_extension("json.corrupt").exists());
    assert!(!path.exists());
}
