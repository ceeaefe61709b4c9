//! Chunk recorder.
//!
//! Consumes encoded audio frames from the codec and rolls them into
//! fixed-duration chunk files. The codec callback runs in a context that
//! must never block, so frames arrive over a bounded channel: when the
//! channel is full the frame is dropped and counted, never awaited on.
//!
//! Frames are stored length-prefixed through a small write buffer so the
//! file sees batched writes instead of one write per 20 ms frame.

use crate::defaults;
use crate::device::clock::{Clock, DeviceClock, SystemClock, Timestamp};
use crate::device::storage::{ChunkEntry, ChunkStore, ChunkWriter};
use crate::error::Result;
use crate::wire::append_frame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Producer half of the frame channel, callable from the encoder context.
///
/// `push` never blocks; a full channel drops the frame and bumps the
/// counter. Losing a frame under pressure is preferable to stalling the
/// audio callback.
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<Vec<u8>>,
    dropped: Arc<AtomicU64>,
}

impl FrameSender {
    pub fn push(&self, frame: Vec<u8>) {
        if self.tx.try_send(frame).is_err() {
            let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(dropped = n, "frame channel full, dropping frame");
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Creates the bounded frame channel feeding [`ChunkRecorder::run`].
pub fn frame_channel(capacity: usize) -> (FrameSender, mpsc::Receiver<Vec<u8>>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        FrameSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        rx,
    )
}

/// Rolls encoded frames into fixed-duration chunk files.
pub struct ChunkRecorder<C: Clock = SystemClock> {
    store: ChunkStore,
    clock: Arc<DeviceClock<C>>,
    codec_id: u8,
    sample_rate: u32,
    chunk_duration: Duration,
    buf: Vec<u8>,
    buf_capacity: usize,
    writer: Option<ChunkWriter>,
    dropped_frames: u64,
}

impl<C: Clock> ChunkRecorder<C> {
    pub fn new(store: ChunkStore, clock: Arc<DeviceClock<C>>, codec_id: u8, sample_rate: u32) -> Self {
        Self {
            store,
            clock,
            codec_id,
            sample_rate,
            chunk_duration: Duration::from_secs(defaults::CHUNK_DURATION_S),
            buf: Vec::with_capacity(defaults::WRITE_BUF_BYTES),
            buf_capacity: defaults::WRITE_BUF_BYTES,
            writer: None,
            dropped_frames: 0,
        }
    }

    pub fn with_chunk_duration(mut self, duration: Duration) -> Self {
        self.chunk_duration = duration;
        self
    }

    pub fn with_buffer_capacity(mut self, bytes: usize) -> Self {
        self.buf_capacity = bytes;
        self.buf = Vec::with_capacity(bytes);
        self
    }

    /// Frames that arrived with no open chunk or were too large to buffer.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn is_recording(&self) -> bool {
        self.writer.is_some()
    }

    /// Opens the first chunk. No-op when already recording.
    pub fn start(&mut self) -> Result<()> {
        if self.writer.is_some() {
            return Ok(());
        }
        self.open_chunk()
    }

    fn open_chunk(&mut self) -> Result<()> {
        let ts = self.clock.now();
        let writer = self.store.create(ts, self.codec_id, self.sample_rate)?;
        debug!(ts = ts.secs, synced = ts.synced, "opened chunk");
        self.writer = Some(writer);
        self.buf.clear();
        Ok(())
    }

    /// Buffers one encoded frame, flushing to the file first when the
    /// buffer could not hold it.
    pub fn on_frame(&mut self, frame: &[u8]) -> Result<()> {
        if self.writer.is_none() {
            self.dropped_frames += 1;
            debug!("frame with no open chunk, dropping");
            return Ok(());
        }
        let framed_len = 2 + frame.len();
        if framed_len > self.buf_capacity {
            self.dropped_frames += 1;
            warn!(bytes = frame.len(), "frame larger than write buffer, dropping");
            return Ok(());
        }
        if self.buf.len() + framed_len > self.buf_capacity {
            self.flush()?;
        }
        append_frame(&mut self.buf, frame);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.append(&self.buf)?;
        }
        self.buf.clear();
        Ok(())
    }

    /// Finalizes the current chunk and opens the next. A storage failure
    /// loses at most the current chunk; recording continues on a fresh one.
    pub fn rotate(&mut self) -> Result<Option<ChunkEntry>> {
        let entry = self.close_chunk();
        self.open_chunk()?;
        Ok(entry)
    }

    /// Finalizes the in-flight chunk and stops recording.
    pub fn stop(&mut self) -> Option<ChunkEntry> {
        self.close_chunk()
    }

    fn close_chunk(&mut self) -> Option<ChunkEntry> {
        if let Err(e) = self.flush() {
            error!(error = %e, "flush failed, chunk payload incomplete");
        }
        let writer = self.writer.take()?;
        let ts = writer.timestamp().secs;
        if writer.payload_size() == 0 {
            // Nothing arrived this interval; finalizing would store an
            // empty chunk, so drop the file instead.
            debug!(ts, "discarding empty chunk");
            if let Err(e) = writer.discard() {
                warn!(ts, error = %e, "could not remove empty chunk file");
            }
            return None;
        }
        match writer.finalize() {
            Ok(entry) => Some(entry),
            Err(e) => {
                error!(ts, error = %e, "chunk finalize failed, chunk lost");
                None
            }
        }
    }

    /// Called when wall time arrives from the host: rewrites the open
    /// chunk's timestamp and retimestamps every finalized unsynced chunk.
    pub fn on_time_synced(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            let ts = writer.timestamp();
            if !ts.synced {
                if let Some(corrected) = self.clock.correct_unsynced(ts.secs) {
                    writer.set_timestamp(Timestamp {
                        secs: corrected,
                        synced: true,
                    })?;
                    info!(old_ts = ts.secs, new_ts = corrected, "retimestamped open chunk");
                }
            }
        }

        for entry in self.store.enumerate(usize::MAX)? {
            if entry.synced {
                continue;
            }
            match self.clock.correct_unsynced(entry.timestamp) {
                Some(corrected) => self.store.retimestamp(entry.timestamp, corrected)?,
                None => warn!(ts = entry.timestamp, "cannot correct unsynced chunk"),
            }
        }
        Ok(())
    }

    /// Station loop: multiplexes the frame channel with the rotation
    /// interval. Returns once the frame channel closes, after finalizing
    /// the in-flight chunk.
    pub async fn run(mut self, mut frames: mpsc::Receiver<Vec<u8>>) -> Result<()> {
        self.start()?;
        let mut ticker = tokio::time::interval(self.chunk_duration);
        ticker.tick().await; // first tick completes immediately

        loop {
            tokio::select! {
                frame = frames.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = self.on_frame(&frame) {
                            // That chunk is lost; frames drop until the
                            // next chunk opens.
                            error!(error = %e, "dropping chunk after write failure");
                            self.writer = None;
                            self.buf.clear();
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if let Err(e) = self.rotate() {
                        error!(error = %e, "could not open next chunk, retrying at next rotation");
                    }
                }
            }
        }

        self.stop();
        info!(dropped = self.dropped_frames, "recorder stopped");
        Ok(())
    }
}
