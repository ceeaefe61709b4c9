//! Sync session: one upload pass from request to stitched conversations.
//!
//! The session drives the receiver over the raw packet stream, sends the
//! acknowledgment that commits each chunk, groups chunks into
//! conversations as silence boundaries fire, and stitches each
//! conversation as it closes. Conversations with no speech at all are
//! discarded, matching the stitcher's explicit failure.

use crate::defaults;
use crate::error::Result;
use crate::host::receiver::{AudioChunk, ChunkReceiver, ReceiverEvent};
use crate::host::silence;
use crate::host::stitcher::{self, StitchResult};
use crate::transport::ControlSink;
use crate::wire::ControlCommand;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Progress and results emitted during a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A chunk arrived; `total` is the batch size the device announced.
    Progress { received: u16, total: u16 },
    /// A conversation closed and its stitched file is on disk.
    ConversationReady {
        path: PathBuf,
        speech_ms: u64,
        removed_silence_ms: u64,
    },
    /// The device's upload pass finished.
    SyncComplete { chunks_received: u16 },
}

impl From<StitchResult> for SyncEvent {
    fn from(r: StitchResult) -> Self {
        SyncEvent::ConversationReady {
            path: r.path,
            speech_ms: r.speech_ms,
            removed_silence_ms: r.removed_silence_ms,
        }
    }
}

/// Host-side state for one sync.
pub struct SyncSession {
    receiver: ChunkReceiver,
    stitch_dir: PathBuf,
    gap_ms: u64,
    /// Chunks of the conversation being accumulated, arrival order.
    current: Vec<AudioChunk>,
    received: u16,
}

impl SyncSession {
    pub fn new(receiver: ChunkReceiver, stitch_dir: impl Into<PathBuf>) -> Self {
        Self {
            receiver,
            stitch_dir: stitch_dir.into(),
            gap_ms: defaults::CONVERSATION_GAP_S * 1000,
            current: Vec::new(),
            received: 0,
        }
    }

    pub fn with_gap_ms(mut self, gap_ms: u64) -> Self {
        self.gap_ms = gap_ms;
        self
    }

    /// Handles one raw notification, acking completed chunks through
    /// `control`. Returns the events the packet produced.
    pub async fn handle_packet(
        &mut self,
        bytes: &[u8],
        control: &dyn ControlSink,
    ) -> Result<Vec<SyncEvent>> {
        let mut events = Vec::new();
        match self.receiver.handle_packet(bytes)? {
            None => {}
            Some(ReceiverEvent::ChunkComplete { chunk, total_chunks }) => {
                // The chunk is durable; the ack authorizes its deletion.
                control
                    .send_control(ControlCommand::AckChunk(chunk.timestamp))
                    .await?;
                self.received += 1;
                events.push(SyncEvent::Progress {
                    received: self.received,
                    total: total_chunks,
                });

                self.current.push(*chunk);
                let analyses: Vec<_> = self.current.iter().map(|c| c.analysis.clone()).collect();
                if silence::is_conversation_boundary(&analyses, self.gap_ms) {
                    debug!(chunks = self.current.len(), "conversation boundary");
                    if let Some(ev) = self.close_conversation() {
                        events.push(ev);
                    }
                }
            }
            Some(ReceiverEvent::UploadDone) => {
                if let Some(ev) = self.close_conversation() {
                    events.push(ev);
                }
                events.push(SyncEvent::SyncComplete {
                    chunks_received: self.received,
                });
                info!(chunks = self.received, "sync complete");
            }
        }
        Ok(events)
    }

    /// Stitches and drains the accumulated conversation, if any.
    fn close_conversation(&mut self) -> Option<SyncEvent> {
        if self.current.is_empty() {
            return None;
        }
        let chunks = std::mem::take(&mut self.current);
        let first_ts = chunks[0].timestamp;
        let out = self.stitch_dir.join(format!("conversation_{:010}.wav", first_ts));
        match stitcher::stitch(&chunks, &out) {
            Ok(result) => Some(result.into()),
            Err(e) => {
                // Typically NoSpeech: the whole group was dead air.
                warn!(ts = first_ts, error = %e, "discarding conversation");
                None
            }
        }
    }

    /// Runs one full sync: requests the upload and processes packets until
    /// the device reports done or hangs up. Returns every event emitted.
    pub async fn run(
        &mut self,
        packets: &mut mpsc::Receiver<Vec<u8>>,
        control: &dyn ControlSink,
    ) -> Result<Vec<SyncEvent>> {
        control.send_control(ControlCommand::RequestUpload).await?;

        let mut events = Vec::new();
        while let Some(wire) = packets.recv().await {
            let batch = self.handle_packet(&wire, control).await?;
            let complete = batch
                .iter()
                .any(|e| matches!(e, SyncEvent::SyncComplete { .. }));
            events.extend(batch);
            if complete {
                break;
            }
        }
        Ok(events)
    }
}
