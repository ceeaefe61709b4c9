//! Default configuration constants for pendant.
//!
//! Shared across configuration types and module defaults so that tuning
//! values live in exactly one place.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech capture and matches what the wearable's
/// encoder produces.
pub const SAMPLE_RATE: u32 = 16_000;

/// Default chunk duration in seconds.
///
/// Each chunk is one atomic storage and transfer unit. 15 seconds keeps
/// individual files small enough to retransmit cheaply after a failed
/// session while bounding per-chunk metadata overhead.
pub const CHUNK_DURATION_S: u64 = 15;

/// Size of the recorder's bounded write buffer in bytes.
///
/// Encoded frames accumulate here and are flushed to the open chunk file
/// before the buffer would overflow, so RAM use stays fixed no matter how
/// long a chunk is.
pub const WRITE_BUF_BYTES: usize = 4096;

/// Maximum chunks enumerated for a single upload pass.
///
/// Acknowledged chunks are deleted as the pass runs, so a backlog larger
/// than this drains across successive upload requests.
pub const MAX_CHUNKS_PER_PASS: usize = 64;

/// Fixed delay between consecutive data packets in milliseconds.
///
/// There is no host-to-device flow control during the data phase; this
/// pacing is the deliberate backpressure substitute for the radio's
/// notification queue.
pub const PACKET_DELAY_MS: u64 = 8;

/// Pause after a chunk header packet in milliseconds.
///
/// Gives the host time to open its accumulator before data arrives.
pub const HEADER_SETTLE_MS: u64 = 10;

/// Gap between consecutive chunks within one upload pass in milliseconds.
pub const CHUNK_DELAY_MS: u64 = 20;

/// Window length for silence classification in milliseconds.
pub const SILENCE_WINDOW_MS: u32 = 100;

/// Default level in dBFS below which a window is classified as silence.
pub const SILENCE_THRESHOLD_DB: f32 = -40.0;

/// Level reported for an all-zero window.
///
/// `20·log10(0)` is undefined; -100 dBFS is far below any real signal.
pub const SILENCE_FLOOR_DB: f32 = -100.0;

/// Default trailing-silence gap that closes a conversation, in seconds.
pub const CONVERSATION_GAP_S: u64 = 120;

/// Smallest header timestamp treated as wall-clock time.
///
/// Timestamps below this are monotonic uptime from a device that had not
/// yet synced its clock (Sep 2020 in epoch seconds; no device runs that
/// long on one charge).
pub const EPOCH_SANITY_MIN: u32 = 1_600_000_000;
