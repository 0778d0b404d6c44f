use crate::{CoreError, CoreResult, SequenceRanges};

use std::panic::Location;

use error_location::ErrorLocation;
use tracing::warn;

/// Maximum bytes held in memory for one capture (2 GiB).
///
/// **Memory footprint at max capacity:**
/// - 8 Mbit/s video ≈ 1 MB per one-second chunk
/// - 2 GiB covers roughly 35 minutes at that bitrate
/// - Exceeding it fails the capture instead of dropping media
pub(crate) const MAX_BUFFERED_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Chunks held in arrival order until finalization.
///
/// Duplicates are dropped. A chunk whose sequence number does not continue
/// the run marks the buffer as gapped; it is kept where it arrived, never
/// reordered.
#[derive(Debug, Default)]
pub(crate) struct ChunkBuffer {
    chunks: Vec<Vec<u8>>,
    seen: SequenceRanges,
    total_bytes: u64,
    gap_detected: bool,
}

impl ChunkBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk. Returns `Ok(false)` for a duplicate.
    #[track_caller]
    pub(crate) fn push(&mut self, seq: u64, data: Vec<u8>) -> CoreResult<bool> {
        if self.seen.contains(seq) {
            return Ok(false);
        }

        let size = data.len() as u64;
        let total = self.total_bytes.saturating_add(size);
        if total > MAX_BUFFERED_BYTES {
            return Err(CoreError::BufferOverflow {
                buffered_bytes: self.total_bytes,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let expected = self.seen.next_expected();
        if seq != expected {
            warn!(seq, expected, "Chunk out of sequence");
            self.gap_detected = true;
        }

        self.seen.insert(seq);
        self.total_bytes = total;
        self.chunks.push(data);

        Ok(true)
    }

    pub(crate) fn len(&self) -> usize {
        self.chunks.len()
    }

    pub(crate) fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub(crate) fn gap_detected(&self) -> bool {
        self.gap_detected
    }

    /// Payloads in arrival order.
    pub(crate) fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }
}
