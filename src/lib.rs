//! pendant - chunked capture, storage, and sync engine for a wearable
//! audio recorder.
//!
//! The device side records encoded audio into crash-safe chunk files and
//! streams them over a packetized link when a host connects; the host side
//! reassembles, verifies, and decodes the chunks, detects conversation
//! boundaries from silence, and stitches each conversation into one
//! playable WAV with the dead air removed.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod codec;
pub mod config;
pub mod defaults;
pub mod device;
pub mod error;
pub mod host;
pub mod transport;
pub mod wire;

// Collaborator seams (radio and codec live outside this crate)
pub use codec::{AudioCodec, PcmCodec};
pub use transport::{
    loopback, ControlSink, LoopbackControlTx, LoopbackDevice, LoopbackHost, LoopbackPacketTx,
    PacketSink,
};

// Device side
pub use device::clock::{Clock, DeviceClock, SystemClock, Timestamp};
pub use device::recorder::{frame_channel, ChunkRecorder, FrameSender};
pub use device::storage::{ChunkEntry, ChunkStore, ChunkWriter};
pub use device::uploader::{ChunkUploader, UploadSession, UploadState};

// Host side
pub use host::receiver::{AudioChunk, ChunkReceiver, ReceiverEvent};
pub use host::session::{SyncEvent, SyncSession};
pub use host::silence::{Segment, SilenceAnalysis};
pub use host::stitcher::StitchResult;

// Error handling
pub use error::{PendantError, Result};

// Config
pub use config::Config;
