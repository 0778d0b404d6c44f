use crate::MediaStream;

/// RAII guard that guarantees device tracks are stopped when dropped.
///
/// Every exit from a capture (normal stop, failed finalization, release,
/// host teardown) goes through this guard so a capture device is never
/// leaked.
pub(crate) struct TrackGuard<S: MediaStream> {
    stream: S,
    released: bool,
}

impl<S: MediaStream> TrackGuard<S> {
    pub(crate) fn new(stream: S) -> Self {
        Self {
            stream,
            released: false,
        }
    }

    /// Access the stream while its tracks are live.
    pub(crate) fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub(crate) fn stream(&self) -> &S {
        &self.stream
    }

    /// Stops the tracks now instead of at drop.
    pub(crate) fn release(&mut self) {
        if !self.released {
            self.stream.stop_tracks();
            self.released = true;
        }
    }
}

impl<S: MediaStream> Drop for TrackGuard<S> {
    fn drop(&mut self) {
        self.release();
    }
}
