use crate::{CoreResult, SourceDescriptor};

/// Platform capture device: turns a source descriptor into a live stream.
///
/// Implementations report a declined picker as
/// [`CoreError::PermissionDenied`](crate::CoreError::PermissionDenied) and a
/// busy or missing device as
/// [`CoreError::DeviceUnavailable`](crate::CoreError::DeviceUnavailable).
pub trait CaptureDevice: Send {
    /// Live stream type produced by this device.
    type Stream: MediaStream;

    /// Opens the source. The returned stream holds device tracks until
    /// [`MediaStream::stop_tracks`] is called.
    fn open(&mut self, source: &SourceDescriptor, audio_enabled: bool) -> CoreResult<Self::Stream>;
}

/// A live media stream with an encoder attached.
pub trait MediaStream: Send {
    /// Begin encoding.
    fn start(&mut self) -> CoreResult<()>;

    /// Suspend encoding; no data is produced while paused.
    fn pause(&mut self) -> CoreResult<()>;

    /// Continue encoding after a pause.
    fn resume(&mut self) -> CoreResult<()>;

    /// Encoded data produced since the previous call, if any.
    fn take_data(&mut self) -> CoreResult<Option<Vec<u8>>>;

    /// Duration the encoder believes it recorded. Often zero or short when
    /// the stream ended ungracefully.
    fn reported_duration_ms(&self) -> u64 {
        0
    }

    /// Stops every underlying track. Must be idempotent.
    fn stop_tracks(&mut self);
}
