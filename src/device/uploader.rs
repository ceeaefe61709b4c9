//! Device-side upload engine.
//!
//! One [`UploadSession`] exists per connection and carries the whole
//! session state: the state machine, the abort flag, and the wakeup for
//! the upload task. Control writes land in [`ChunkUploader::handle_control`]
//! from the connection handler; the upload task sits in
//! [`ChunkUploader::run`] and is woken, never polled.
//!
//! An upload pass snapshots the sorted chunk enumeration and streams each
//! chunk as one header packet plus its data packets, paced by fixed
//! delays — pacing is the only backpressure the link has. Nothing partial
//! is persisted: a failed or aborted pass just re-enumerates next time.

use crate::config::TransferConfig;
use crate::defaults;
use crate::device::storage::ChunkStore;
use crate::error::Result;
use crate::transport::PacketSink;
use crate::wire::{ChunkMeta, ControlCommand, Packet, PacketType, PAYLOAD_SIZE};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Upload task states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    /// A host requested an upload; the task has not picked it up yet.
    UploadRequested,
    Uploading,
}

/// Per-connection session state shared between the connection handler and
/// the upload task.
pub struct UploadSession {
    state: Mutex<UploadState>,
    abort: AtomicBool,
    wake: Notify,
}

impl UploadSession {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(UploadState::Idle),
            abort: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    pub fn state(&self) -> UploadState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_state(&self, state: UploadState) {
        match self.state.lock() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    /// Marks an upload requested and wakes the task. Returns false when a
    /// request is already active; repeated requests are idempotent.
    pub fn request_upload(&self) -> bool {
        {
            let mut guard = match self.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *guard != UploadState::Idle {
                return false;
            }
            *guard = UploadState::UploadRequested;
        }
        self.abort.store(false, Ordering::Release);
        self.wake.notify_one();
        true
    }

    /// Raises the abort flag; the pass unwinds at the next packet boundary.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Streams stored chunks to a connected host.
pub struct ChunkUploader {
    store: ChunkStore,
    session: UploadSession,
    max_chunks_per_pass: usize,
    packet_delay: Duration,
    header_settle: Duration,
    chunk_delay: Duration,
}

impl ChunkUploader {
    pub fn new(store: ChunkStore) -> Self {
        Self {
            store,
            session: UploadSession::new(),
            max_chunks_per_pass: defaults::MAX_CHUNKS_PER_PASS,
            packet_delay: Duration::from_millis(defaults::PACKET_DELAY_MS),
            header_settle: Duration::from_millis(defaults::HEADER_SETTLE_MS),
            chunk_delay: Duration::from_millis(defaults::CHUNK_DELAY_MS),
        }
    }

    pub fn with_config(store: ChunkStore, config: &TransferConfig) -> Self {
        Self {
            store,
            session: UploadSession::new(),
            max_chunks_per_pass: config.max_chunks_per_pass,
            packet_delay: Duration::from_millis(config.packet_delay_ms),
            header_settle: Duration::from_millis(config.header_settle_ms),
            chunk_delay: Duration::from_millis(config.chunk_delay_ms),
        }
    }

    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    /// Handles one control write from the host.
    pub fn handle_control(&self, command: ControlCommand) -> Result<()> {
        match command {
            ControlCommand::RequestUpload => {
                if self.session.request_upload() {
                    debug!("upload requested");
                } else {
                    debug!("upload already active, request ignored");
                }
            }
            ControlCommand::AckChunk(ts) => {
                // The ack is the host's durability commitment; deletion here
                // is the only way a chunk ever leaves the device.
                if self.store.delete(ts)? {
                    debug!(ts, "chunk acknowledged and deleted");
                } else {
                    debug!(ts, "ack for unknown chunk, ignoring");
                }
            }
            ControlCommand::Abort => {
                debug!("upload abort requested");
                self.session.abort();
            }
        }
        Ok(())
    }

    /// Upload task loop: waits for a request, runs one pass, goes back to
    /// sleep. Returns only on a transport error, which means the connection
    /// is gone and the session with it.
    pub async fn run(&self, sink: &dyn PacketSink) -> Result<()> {
        loop {
            if self.session.state() != UploadState::UploadRequested {
                self.session.wake.notified().await;
                continue;
            }
            self.session.set_state(UploadState::Uploading);

            let result = self.upload_pass(sink).await;
            self.session.set_state(UploadState::Idle);
            match result {
                Ok(true) => debug!("upload pass complete"),
                Ok(false) => info!("upload pass aborted"),
                Err(e) => {
                    warn!(error = %e, "upload pass failed, connection lost");
                    return Err(e);
                }
            }
        }
    }

    /// Streams one snapshot of the stored chunks. Returns false when the
    /// pass was aborted before the terminator went out.
    async fn upload_pass(&self, sink: &dyn PacketSink) -> Result<bool> {
        // TODO: re-enumerate within one session once acks free slots under
        // the cap, instead of waiting for the host's next request.
        let entries = self.store.enumerate(self.max_chunks_per_pass)?;
        let total_chunks = entries.len() as u16;
        info!(chunks = total_chunks, "starting upload pass");

        for (idx, entry) in entries.iter().enumerate() {
            let (header, payload) = match self.store.read_chunk(entry) {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!(ts = entry.timestamp, error = %e, "skipping unreadable chunk");
                    continue;
                }
            };

            let meta = ChunkMeta {
                data_size: payload.len() as u32,
                codec_id: header.codec_id,
                sample_rate: header.sample_rate,
                checksum: crc32fast::hash(&payload),
            };
            let total_seqs = meta.total_seqs();

            if self.session.is_aborted() {
                return Ok(false);
            }
            sink.send_packet(&Packet {
                packet_type: PacketType::ChunkHeader,
                chunk_ts: entry.timestamp,
                chunk_idx: idx as u16,
                total_chunks,
                seq: 0,
                total_seqs,
                payload: meta.encode().to_vec(),
            })
            .await?;
            tokio::time::sleep(self.header_settle).await;

            for (i, slice) in payload.chunks(PAYLOAD_SIZE).enumerate() {
                if self.session.is_aborted() {
                    return Ok(false);
                }
                sink.send_packet(&Packet {
                    packet_type: PacketType::ChunkData,
                    chunk_ts: entry.timestamp,
                    chunk_idx: idx as u16,
                    total_chunks,
                    seq: (i + 1) as u16,
                    total_seqs,
                    payload: slice.to_vec(),
                })
                .await?;
                tokio::time::sleep(self.packet_delay).await;
            }

            tokio::time::sleep(self.chunk_delay).await;
        }

        if self.session.is_aborted() {
            return Ok(false);
        }
        sink.send_packet(&Packet::done()).await?;
        Ok(true)
    }
}
