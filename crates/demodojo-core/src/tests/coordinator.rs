use super::support::{Rig, source, start, t0};
use crate::{
    AckStatus, CaptureCommand, CaptureHandle, Clock, Coordinator, CoordinatorSettings, CoreResult,
    Envelope, ErrorCategory, FileSessionStore, ManualClock, MemorySessionStore, Message, Session,
    SessionState, SessionStore, StoreRecord, SyntheticDevice,
};

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chrono::Duration;

/// WHAT: Full recording with countdown, pause and stop yields a 15s artifact
/// WHY: Paused time must be excluded from the finalized duration
#[test]
#[allow(clippy::unwrap_used)]
fn given_full_flow_when_paused_two_seconds_then_artifact_is_fifteen_seconds() {
    // Given: A coordinator wired to a synthetic capture host
    let mut rig = Rig::new();

    // When: START(countdown=3), three ticks, 10s recording, 2s pause, 5s recording, STOP
    let started = rig.send(start(Some(3)));
    assert_eq!(started.ack.status, AckStatus::Applied);
    assert_eq!(rig.coordinator.snapshot().unwrap().state, SessionState::Countdown);

    for remaining in [2, 1, 0] {
        rig.clock.advance(Duration::seconds(1));
        rig.send(Message::Tick { remaining });
    }
    assert_eq!(rig.coordinator.snapshot().unwrap().state, SessionState::Recording);

    rig.record_for(10);
    rig.send(Message::Pause);
    rig.clock.advance(Duration::seconds(2));
    rig.send(Message::Resume);
    rig.record_for(5);
    let stopped = rig.send(Message::Stop);

    // Then: Completed with a 15000ms artifact and 15 counted chunks
    assert_eq!(stopped.ack.status, AckStatus::Applied);
    let snapshot = rig.coordinator.snapshot().unwrap();
    assert_eq!(snapshot.state, SessionState::Completed);
    assert_eq!(snapshot.chunk_count, 15);
    assert_eq!(snapshot.paused_ms, 2_000);
    assert_eq!(snapshot.effective_duration_ms, 15_000);
    let artifact = snapshot.artifact.unwrap();
    assert_eq!(artifact.duration_ms, 15_000);
    assert!(!artifact.duration_unreliable);
    assert!(!artifact.sequence_gap_detected);
    assert!(rig.sink.get(&artifact.artifact_ref).is_some());
    assert_eq!(rig.device.live_tracks(), 0);
}

/// WHAT: START then STOP before the countdown ends produces nothing
/// WHY: Cancelling must release the device on the same path as completion
#[test]
#[allow(clippy::unwrap_used)]
fn given_countdown_when_stopped_then_idle_and_device_released() {
    // Given: A session counting down
    let mut rig = Rig::new();
    rig.send(start(Some(3)));
    assert_eq!(rig.device.live_tracks(), 1);

    // When: STOP
    let dispatch = rig.send(Message::Stop);

    // Then: Idle, no artifact, no tracks
    assert_eq!(dispatch.ack.status, AckStatus::Applied);
    assert_eq!(dispatch.snapshot.state, SessionState::Idle);
    assert!(dispatch.snapshot.session_id.is_none());
    assert!(rig.sink.is_empty());
    assert_eq!(rig.device.live_tracks(), 0);
}

/// WHAT: A second START is rejected with an ack and leaves the session alone
/// WHY: Every rejected command yields an explicit reason
#[test]
#[allow(clippy::unwrap_used)]
fn given_recording_when_second_start_then_rejected_ack_and_state_unchanged() {
    // Given: A recording session
    let mut rig = Rig::new();
    rig.send(start(Some(0)));
    rig.send(Message::Tick { remaining: 0 });
    let before = rig.coordinator.session().unwrap();

    // When: START again
    let dispatch = rig.send(start(Some(0)));

    // Then: Rejected(SessionActive), nothing broadcast, record untouched
    assert!(matches!(
        dispatch.ack.status,
        AckStatus::Rejected { category: ErrorCategory::SessionActive, .. }
    ));
    assert!(!dispatch.broadcast);
    assert!(dispatch.commands.is_empty());
    assert_eq!(dispatch.snapshot.state, SessionState::Recording);
    assert_eq!(rig.coordinator.session().unwrap(), before);
}

/// WHAT: A frame with an unknown type is rejected as malformed
/// WHY: Unknown message types must never be silently ignored
#[test]
fn given_unknown_type_frame_when_handled_then_rejected_with_correlation() {
    // Given: An idle coordinator
    let rig = Rig::new();
    let frame = r#"{"correlationId":"6d0f3f5c-8a55-4b8e-8f0e-3f2b1b2c4d5e","message":{"type":"REWIND"}}"#;

    // When: The raw frame is handled
    let dispatch = rig.coordinator.handle_raw(frame);

    // Then: Rejected(MalformedMessage), correlation recovered, state idle
    assert!(matches!(
        dispatch.ack.status,
        AckStatus::Rejected { category: ErrorCategory::MalformedMessage, .. }
    ));
    assert!(dispatch.ack.correlation_id.is_some());
    assert_eq!(dispatch.snapshot.state, SessionState::Idle);
}

/// WHAT: QUERY_STATE returns the current snapshot without broadcasting
/// WHY: Reopened surfaces must ask for state rather than wait for a push
#[test]
fn given_countdown_when_query_state_then_noop_with_snapshot() {
    // Given: A session counting down
    let mut rig = Rig::new();
    rig.send(start(Some(5)));

    // When: QUERY_STATE
    let dispatch = rig.send(Message::QueryState);

    // Then: Noop ack carrying the countdown snapshot
    assert_eq!(dispatch.ack.status, AckStatus::Noop);
    assert!(!dispatch.broadcast);
    assert_eq!(dispatch.snapshot.state, SessionState::Countdown);
    assert_eq!(dispatch.snapshot.countdown_remaining, 5);
}

/// WHAT: Denied source surfaces a category message and RESET returns to idle
/// WHY: Terminal failures must show the reason and leave a way forward
#[test]
#[allow(clippy::unwrap_used)]
fn given_denied_source_when_reset_then_idle() {
    // Given: A device that declines the source
    let mut rig = Rig::with_device(SyntheticDevice::new(16).deny(source().source_id));
    rig.send(start(Some(3)));
    let failed = rig.coordinator.snapshot().unwrap();
    assert_eq!(failed.state, SessionState::Failed);
    assert_eq!(
        failed.last_error.as_ref().map(|e| e.category),
        Some(ErrorCategory::PermissionDenied)
    );
    assert!(failed.user_message.is_some());

    // When: RESET
    let dispatch = rig.send(Message::Reset);

    // Then: Idle snapshot
    assert_eq!(dispatch.ack.status, AckStatus::Applied);
    assert_eq!(dispatch.snapshot.state, SessionState::Idle);
    assert!(dispatch.snapshot.last_error.is_none());
}

/// WHAT: A replayed envelope is acknowledged as a no-op
/// WHY: At-least-once delivery must not double-apply commands
#[test]
#[allow(clippy::unwrap_used)]
fn given_applied_pause_when_redelivered_then_noop() {
    // Given: A recording session that applied one PAUSE envelope
    let mut rig = Rig::new();
    rig.send(start(Some(0)));
    rig.send(Message::Tick { remaining: 0 });
    let pause = Envelope::new(Message::Pause);
    assert_eq!(rig.deliver(pause.clone()).ack.status, AckStatus::Applied);

    // When: The same envelope is delivered again later
    rig.clock.advance(Duration::seconds(3));
    let again = rig.deliver(pause);

    // Then: Noop, still one paused interval
    assert_eq!(again.ack.status, AckStatus::Noop);
    assert_eq!(rig.coordinator.session().unwrap().unwrap().paused_intervals.len(), 1);
}

/// WHAT: Restarting the coordinator mid-recording recovers state from disk
/// WHY: The coordinator holds nothing between messages
#[test]
#[allow(clippy::unwrap_used)]
fn given_restart_mid_recording_when_query_state_then_recording_recovered() {
    // Given: A session driven to Recording through a file-backed coordinator
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let clock = ManualClock::new(t0());
    let handle = CaptureHandle::new();
    {
        let coordinator = Coordinator::new(
            FileSessionStore::new(&path),
            clock.clone(),
            CoordinatorSettings::default(),
        );
        let started = coordinator.handle(&Envelope::new(start(Some(0))));
        let session_id = started.snapshot.session_id.unwrap();
        coordinator.handle(&Envelope::new(Message::SourceGranted { handle }).for_session(session_id));
        coordinator.handle(&Envelope::new(Message::Tick { remaining: 0 }));
    }

    // When: A fresh coordinator is built on the same file and queried
    clock.advance(Duration::seconds(4));
    let coordinator = Coordinator::new(
        FileSessionStore::new(&path),
        clock.clone(),
        CoordinatorSettings::default(),
    );
    let dispatch = coordinator.handle(&Envelope::new(Message::QueryState));

    // Then: Still recording, with the elapsed time derived from the record
    assert_eq!(dispatch.snapshot.state, SessionState::Recording);
    assert_eq!(dispatch.snapshot.effective_duration_ms, 4_000);
}

/// WHAT: A host that restarted without the capture fails the session
/// WHY: Lost context must end in Failed, never a dangling Recording
#[test]
#[allow(clippy::unwrap_used)]
fn given_recording_when_host_reports_nothing_held_then_context_lost() {
    // Given: A recording session
    let mut rig = Rig::new();
    rig.send(start(Some(0)));
    rig.send(Message::Tick { remaining: 0 });

    // When: A restarted host reports it holds nothing
    let dispatch = rig.send(Message::HostStatus { active_handle: None });

    // Then: Failed(ContextLost), broadcast
    assert!(dispatch.broadcast);
    assert_eq!(dispatch.snapshot.state, SessionState::Failed);
    assert_eq!(
        dispatch.snapshot.last_error.map(|e| e.category),
        Some(ErrorCategory::ContextLost)
    );
}

/// Store that lets another writer sneak in before the first write.
struct RacingStore {
    inner: MemorySessionStore,
    raced: AtomicBool,
}

impl SessionStore for RacingStore {
    fn load(&self) -> CoreResult<StoreRecord> {
        self.inner.load()
    }

    fn compare_and_set(&self, expected_revision: u64, session: Option<&Session>) -> CoreResult<u64> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let current = self.inner.load()?;
            self.inner
                .compare_and_set(current.revision, current.session.as_ref())?;
        }
        self.inner.compare_and_set(expected_revision, session)
    }
}

/// WHAT: A lost compare-and-set is retried against the fresh record
/// WHY: Concurrent writers must serialize rather than clobber each other
#[test]
#[allow(clippy::unwrap_used)]
fn given_concurrent_writer_when_start_then_retried_and_applied() {
    // Given: A store where another writer wins the first race
    let store = RacingStore {
        inner: MemorySessionStore::default(),
        raced: AtomicBool::new(false),
    };
    let clock = ManualClock::new(t0());
    let coordinator = Coordinator::new(store, clock.clone(), CoordinatorSettings::default());

    // When: START is handled
    let dispatch = coordinator.handle(&Envelope::new(start(None)));

    // Then: Applied on retry, revision reflects both writes
    assert_eq!(dispatch.ack.status, AckStatus::Applied);
    assert_eq!(dispatch.snapshot.state, SessionState::Requesting);
    assert_eq!(coordinator.store().load().unwrap().revision, 2);
    assert_eq!(clock.now(), t0());
}

/// WHAT: Retries give up after the configured number of attempts
/// WHY: A permanently contended store must produce a rejection, not a spin
#[test]
fn given_store_always_racing_when_start_then_concurrent_modification_rejected() {
    // Given: A store that always reports a newer revision
    struct AlwaysAhead(MemorySessionStore);
    impl SessionStore for AlwaysAhead {
        fn load(&self) -> CoreResult<StoreRecord> {
            self.0.load()
        }
        fn compare_and_set(&self, expected: u64, _session: Option<&Session>) -> CoreResult<u64> {
            self.0.compare_and_set(expected + 1, None)
        }
    }
    let coordinator = Coordinator::new(
        AlwaysAhead(MemorySessionStore::default()),
        ManualClock::new(t0()),
        CoordinatorSettings {
            max_store_retries: 2,
            ..CoordinatorSettings::default()
        },
    );

    // When: START is handled
    let dispatch = coordinator.handle(&Envelope::new(start(None)));

    // Then: Rejected as ConcurrentModification, nothing written
    assert!(matches!(
        dispatch.ack.status,
        AckStatus::Rejected { category: ErrorCategory::ConcurrentModification, .. }
    ));
    assert_eq!(dispatch.snapshot.state, SessionState::Idle);
}

/// WHAT: A silent recording is failed by the watchdog through the coordinator
/// WHY: Stalls must release the device and reach surfaces as a broadcast
#[test]
fn given_recording_without_chunks_when_watchdog_after_timeout_then_stalled_and_released() {
    // Given: A recording session with no chunks pulled
    let mut rig = Rig::new();
    rig.send(start(Some(0)));
    rig.send(Message::Tick { remaining: 0 });
    assert_eq!(rig.device.live_tracks(), 1);

    // When: WATCHDOG after 11 silent seconds
    rig.clock.advance(Duration::seconds(11));
    let dispatch = rig.send(Message::Watchdog);

    // Then: Failed(CaptureStalled), tracks released
    assert_eq!(dispatch.snapshot.state, SessionState::Failed);
    assert_eq!(
        dispatch.snapshot.last_error.map(|e| e.category),
        Some(ErrorCategory::CaptureStalled)
    );
    assert_eq!(rig.device.live_tracks(), 0);
    assert_eq!(rig.host.active_handle(), None);
}

/// WHAT: Store revision advances once per applied envelope
/// WHY: Noop and rejected envelopes must not rewrite the record
#[test]
#[allow(clippy::unwrap_used)]
fn given_mixed_envelopes_when_handled_then_revision_counts_only_applied() {
    // Given: A fresh rig
    let mut rig = Rig::new();

    // When: START (applied + granted), QUERY_STATE (noop), PAUSE (rejected in Countdown)
    rig.send(start(Some(3)));
    rig.send(Message::QueryState);
    let pause = rig.send(Message::Pause);

    // Then: Two writes (START and SOURCE_GRANTED)
    assert!(pause.ack.status.is_rejected());
    let record: StoreRecord = rig.store.load().unwrap();
    assert_eq!(record.revision, 2);
}

/// WHAT: A request lost across a restart is failed by the watchdog and START works again
/// WHY: A fresh host announcing nothing cannot answer a request it never saw
#[test]
#[allow(clippy::unwrap_used)]
fn given_restart_while_requesting_when_watchdog_after_host_timeout_then_context_lost() {
    // Given: START was stored but its Acquire never reached a host
    let rig = Rig::new();
    rig.coordinator.handle(&Envelope::new(start(Some(3))));
    let coordinator = Coordinator::new(
        Arc::clone(&rig.store),
        rig.clock.clone(),
        CoordinatorSettings::default(),
    );

    // When: A fresh host announces itself, then the watchdog fires an hour later
    let status = coordinator.handle(&rig.host.status());
    rig.clock.advance(Duration::hours(1));
    let watchdog = coordinator.handle(&Envelope::new(Message::Watchdog));

    // Then: Still waiting after the status, failed after the watchdog, and a new START is accepted
    assert_eq!(status.ack.status, AckStatus::Noop);
    assert_eq!(status.snapshot.state, SessionState::Requesting);
    assert_eq!(watchdog.snapshot.state, SessionState::Failed);
    assert_eq!(
        watchdog.snapshot.last_error.map(|e| e.category),
        Some(ErrorCategory::ContextLost)
    );
    let restart = coordinator.handle(&Envelope::new(start(Some(3))));
    assert_eq!(restart.ack.status, AckStatus::Applied);
    assert_eq!(restart.snapshot.state, SessionState::Requesting);
}

/// WHAT: RESET during a recording returns to Idle and frees the device
/// WHY: Reset unwinds an active session exactly like a cancel
#[test]
fn given_recording_when_reset_then_idle_and_tracks_released() {
    // Given: A recording session holding device tracks
    let mut rig = Rig::new();
    rig.send(start(Some(0)));
    rig.send(Message::Tick { remaining: 0 });
    assert_eq!(rig.device.live_tracks(), 1);
    let handle = rig.host.active_handle();

    // When: RESET arrives
    let dispatch = rig.send(Message::Reset);

    // Then: Idle, a release was issued and the tracks are gone
    assert_eq!(dispatch.ack.status, AckStatus::Applied);
    assert_eq!(dispatch.snapshot.state, SessionState::Idle);
    assert_eq!(
        dispatch.commands,
        handle
            .map(|handle| vec![CaptureCommand::Release { handle }])
            .unwrap_or_default()
    );
    assert!(!dispatch.commands.is_empty());
    assert_eq!(rig.device.live_tracks(), 0);
    assert_eq!(rig.host.active_handle(), None);
    assert!(rig.sink.is_empty());
}
