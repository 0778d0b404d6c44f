mod buffer;
mod command;
mod container;
mod device;
mod guard;
mod host;
mod sink;
mod synthetic;

#[cfg(test)]
pub(crate) use {
    buffer::ChunkBuffer,
    container::{HEADER_LEN, MAGIC, assemble, patch_duration},
};

pub use {
    command::CaptureCommand,
    container::ContainerHeader,
    device::{CaptureDevice, MediaStream},
    host::{CaptureHost, CaptureState, ChunkReceipt, FinalizedArtifact},
    sink::{ARTIFACT_EXTENSION, ArtifactSink, FileArtifactSink, MemoryArtifactSink},
    synthetic::{SyntheticDevice, SyntheticStream},
};
