use crate::{CaptureDevice, CoreError, CoreResult, MediaStream, SourceDescriptor};

use std::{
    collections::HashSet,
    panic::Location,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use error_location::ErrorLocation;
use tracing::debug;

/// Deterministic stand-in for a platform capture device.
///
/// Produces one chunk of `chunk_bytes` per pull while recording and nothing
/// while paused. Sources can be marked as denied to simulate a declined
/// picker, and the device as unavailable to simulate a busy encoder.
#[derive(Debug, Clone)]
pub struct SyntheticDevice {
    chunk_bytes: usize,
    denied_sources: HashSet<String>,
    unavailable: bool,
    live_tracks: Arc<AtomicUsize>,
}

impl SyntheticDevice {
    /// Device producing chunks of `chunk_bytes`.
    pub fn new(chunk_bytes: usize) -> Self {
        Self {
            chunk_bytes,
            denied_sources: HashSet::new(),
            unavailable: false,
            live_tracks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Declines `source_id` the next time it is opened.
    pub fn deny(mut self, source_id: impl Into<String>) -> Self {
        self.denied_sources.insert(source_id.into());
        self
    }

    /// Fails every open with `DeviceUnavailable`.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Streams opened and not yet stopped. Shared between clones.
    pub fn live_tracks(&self) -> usize {
        self.live_tracks.load(Ordering::SeqCst)
    }
}

impl CaptureDevice for SyntheticDevice {
    type Stream = SyntheticStream;

    #[track_caller]
    fn open(&mut self, source: &SourceDescriptor, audio_enabled: bool) -> CoreResult<SyntheticStream> {
        if self.unavailable {
            return Err(CoreError::DeviceUnavailable {
                reason: "synthetic device marked unavailable".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        if self.denied_sources.contains(&source.source_id) {
            return Err(CoreError::PermissionDenied {
                source_id: source.source_id.clone(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        self.live_tracks.fetch_add(1, Ordering::SeqCst);
        debug!(source_id = %source.source_id, audio_enabled, "Synthetic stream opened");

        Ok(SyntheticStream {
            chunk_bytes: self.chunk_bytes,
            encoding: false,
            stopped: false,
            produced: 0,
            live_tracks: Arc::clone(&self.live_tracks),
        })
    }
}

/// Stream produced by [`SyntheticDevice`].
#[derive(Debug)]
pub struct SyntheticStream {
    chunk_bytes: usize,
    encoding: bool,
    stopped: bool,
    produced: u64,
    live_tracks: Arc<AtomicUsize>,
}

impl SyntheticStream {
    #[track_caller]
    fn ensure_live(&self, operation: &'static str) -> CoreResult<()> {
        if self.stopped {
            return Err(CoreError::InvalidCaptureState {
                operation,
                state: "stopped".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(())
    }
}

impl MediaStream for SyntheticStream {
    fn start(&mut self) -> CoreResult<()> {
        self.ensure_live("start")?;
        self.encoding = true;
        Ok(())
    }

    fn pause(&mut self) -> CoreResult<()> {
        self.ensure_live("pause")?;
        self.encoding = false;
        Ok(())
    }

    fn resume(&mut self) -> CoreResult<()> {
        self.ensure_live("resume")?;
        self.encoding = true;
        Ok(())
    }

    fn take_data(&mut self) -> CoreResult<Option<Vec<u8>>> {
        if self.stopped || !self.encoding || self.chunk_bytes == 0 {
            return Ok(None);
        }
        let fill = (self.produced % 251) as u8;
        self.produced += 1;
        Ok(Some(vec![fill; self.chunk_bytes]))
    }

    // Like most live encoders, it never learns the final duration.
    fn reported_duration_ms(&self) -> u64 {
        0
    }

    fn stop_tracks(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.encoding = false;
            self.live_tracks.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
