#![allow(clippy::unwrap_used)]

use crate::{
    CaptureHost, CaptureTarget, Coordinator, CoordinatorSettings, Dispatch, Envelope, ManualClock,
    MemoryArtifactSink, MemorySessionStore, Message, SourceDescriptor, SyntheticDevice,
};

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

pub(crate) const CHUNK_BYTES: usize = 64;

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
}

pub(crate) fn source() -> SourceDescriptor {
    SourceDescriptor::new("tab-stream-1", CaptureTarget::Tab { tab_id: 7 })
}

pub(crate) fn start(countdown_seconds: Option<u32>) -> Message {
    Message::Start {
        source: source(),
        audio_enabled: true,
        countdown_seconds,
    }
}

/// Coordinator and Capture Host wired together in one thread, with a
/// shared manual clock and an in-memory store and sink.
pub(crate) struct Rig {
    pub(crate) clock: ManualClock,
    pub(crate) store: Arc<MemorySessionStore>,
    pub(crate) coordinator: Coordinator<Arc<MemorySessionStore>, ManualClock>,
    pub(crate) host: CaptureHost<SyntheticDevice, MemoryArtifactSink, ManualClock>,
    pub(crate) device: SyntheticDevice,
    pub(crate) sink: MemoryArtifactSink,
}

impl Rig {
    pub(crate) fn new() -> Self {
        Self::with_device(SyntheticDevice::new(CHUNK_BYTES))
    }

    pub(crate) fn with_device(device: SyntheticDevice) -> Self {
        let clock = ManualClock::new(t0());
        let store = Arc::new(MemorySessionStore::default());
        let sink = MemoryArtifactSink::default();
        Self {
            coordinator: Coordinator::new(
                Arc::clone(&store),
                clock.clone(),
                CoordinatorSettings::default(),
            ),
            host: CaptureHost::new(device.clone(), sink.clone(), clock.clone()),
            clock,
            store,
            device,
            sink,
        }
    }

    /// Sends `message` and runs every resulting host command to quiescence.
    pub(crate) fn send(&mut self, message: Message) -> Dispatch {
        self.deliver(Envelope::new(message))
    }

    pub(crate) fn deliver(&mut self, envelope: Envelope) -> Dispatch {
        let dispatch = self.coordinator.handle(&envelope);
        self.run(dispatch.commands.clone());
        dispatch
    }

    /// Pulls one chunk from the host and reports it.
    pub(crate) fn poll(&mut self) {
        for event in self.host.poll() {
            let dispatch = self.coordinator.handle(&event);
            self.run(dispatch.commands);
        }
    }

    /// Advances the clock one second at a time, pulling a chunk each second.
    pub(crate) fn record_for(&mut self, seconds: i64) {
        for _ in 0..seconds {
            self.clock.advance(Duration::seconds(1));
            self.poll();
        }
    }

    fn run(&mut self, commands: Vec<crate::CaptureCommand>) {
        let mut pending = commands;
        while !pending.is_empty() {
            let mut next = Vec::new();
            for command in pending {
                for event in self.host.execute(&command) {
                    next.extend(self.coordinator.handle(&event).commands);
                }
            }
            pending = next;
        }
    }
}
