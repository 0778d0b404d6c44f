//! Artifact container layout.
//!
//! A fixed 32-byte header followed by the concatenated chunk payloads:
//!
//! | offset | size | field                                          |
//! |--------|------|------------------------------------------------|
//! | 0      | 4    | magic `DDRC`                                   |
//! | 4      | 2    | format version, LE                             |
//! | 6      | 2    | flags: bit0 duration unreliable, bit1 seq gap  |
//! | 8      | 8    | duration ms, LE                                |
//! | 16     | 4    | chunk count, LE                                |
//! | 20     | 8    | payload length, LE                             |
//! | 28     | 4    | reserved                                       |

use crate::{CoreError, CoreResult};

use std::panic::Location;

use error_location::ErrorLocation;

pub(crate) const MAGIC: &[u8; 4] = b"DDRC";
pub(crate) const FORMAT_VERSION: u16 = 1;
pub(crate) const HEADER_LEN: usize = 32;

const FLAG_DURATION_UNRELIABLE: u16 = 0b01;
const FLAG_SEQUENCE_GAP: u16 = 0b10;

const DURATION_OFFSET: usize = 8;
const FLAGS_OFFSET: usize = 6;

/// Decoded container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Format version.
    pub version: u16,
    /// Duration written into the container.
    pub duration_ms: u64,
    /// Duration could not be trusted.
    pub duration_unreliable: bool,
    /// Chunk sequence had holes or reordering.
    pub sequence_gap_detected: bool,
    /// Number of chunks concatenated.
    pub chunk_count: u32,
    /// Bytes following the header.
    pub payload_len: u64,
}

impl ContainerHeader {
    /// Parses the header at the front of `bytes`.
    #[track_caller]
    pub fn read(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
            return Err(CoreError::FinalizeFailed {
                reason: "not a DDRC container".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let flags = u16_at(bytes, FLAGS_OFFSET);

        Ok(Self {
            version: u16_at(bytes, 4),
            duration_ms: u64_at(bytes, DURATION_OFFSET),
            duration_unreliable: flags & FLAG_DURATION_UNRELIABLE != 0,
            sequence_gap_detected: flags & FLAG_SEQUENCE_GAP != 0,
            chunk_count: u32_at(bytes, 16),
            payload_len: u64_at(bytes, 20),
        })
    }
}

/// Concatenates `chunks` behind a header carrying the device-reported
/// duration. The result still needs [`patch_duration`].
#[track_caller]
pub(crate) fn assemble<'a, I>(chunks: I, reported_duration_ms: u64) -> CoreResult<Vec<u8>>
where
    I: IntoIterator<Item = &'a [u8]>,
    I::IntoIter: Clone,
{
    let chunks = chunks.into_iter();
    let payload_len: usize = chunks.clone().map(<[u8]>::len).sum();
    let chunk_count = u32::try_from(chunks.clone().count()).map_err(|_| CoreError::FinalizeFailed {
        reason: "too many chunks for container".to_string(),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload_len);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&reported_duration_ms.to_le_bytes());
    out.extend_from_slice(&chunk_count.to_le_bytes());
    out.extend_from_slice(&(payload_len as u64).to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);

    for chunk in chunks {
        out.extend_from_slice(chunk);
    }

    Ok(out)
}

/// Rewrites duration and flags of an assembled container in place.
#[track_caller]
pub(crate) fn patch_duration(
    container: &mut [u8],
    duration_ms: u64,
    duration_unreliable: bool,
    sequence_gap_detected: bool,
) -> CoreResult<()> {
    let header = ContainerHeader::read(container)?;
    if header.version != FORMAT_VERSION {
        return Err(CoreError::FinalizeFailed {
            reason: format!("unsupported container version {}", header.version),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let mut flags = 0u16;
    if duration_unreliable {
        flags |= FLAG_DURATION_UNRELIABLE;
    }
    if sequence_gap_detected {
        flags |= FLAG_SEQUENCE_GAP;
    }

    container[FLAGS_OFFSET..FLAGS_OFFSET + 2].copy_from_slice(&flags.to_le_bytes());
    container[DURATION_OFFSET..DURATION_OFFSET + 8].copy_from_slice(&duration_ms.to_le_bytes());

    Ok(())
}

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    let mut buf = [0u8; 2];
    buf.copy_from_slice(&bytes[at..at + 2]);
    u16::from_le_bytes(buf)
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

fn u64_at(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}
