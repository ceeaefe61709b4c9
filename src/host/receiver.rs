//! Host-side transfer client: packet reassembly, integrity, decode.
//!
//! At most one chunk is in flight at a time. A header packet opens the
//! accumulator (silently superseding an incomplete one), data packets fill
//! it, and on the last packet the chunk is verified, decoded, written to a
//! WAV file, and analyzed for silence. Only a chunk that made it all the
//! way to disk is reported; the caller's acknowledgment, sent on that
//! report, is the commit point that authorizes deletion on the device.
//!
//! Delivery is assumed in-order and duplicate-free; any packet that does
//! not fit is dropped and logged, never fatal.

use crate::codec::AudioCodec;
use crate::error::{PendantError, Result};
use crate::host::silence::{self, SilenceAnalysis};
use crate::wire::{ChunkMeta, FrameReader, Packet, PacketType};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Upper bound on the buffer reserved from a header's declared size alone.
const MAX_PREALLOC_BYTES: usize = 4 * 1024 * 1024;

/// One chunk received, decoded, and persisted.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub timestamp: u32,
    pub sample_rate: u32,
    pub duration_ms: u64,
    /// Decoded audio on disk.
    pub wav_path: PathBuf,
    pub analysis: SilenceAnalysis,
}

/// What a packet did to the receiver.
#[derive(Debug)]
pub enum ReceiverEvent {
    /// A chunk completed and is durable; acknowledge it now.
    ChunkComplete {
        chunk: Box<AudioChunk>,
        /// Batch size the device announced for this pass.
        total_chunks: u16,
    },
    /// The device finished its upload pass.
    UploadDone,
}

struct IncomingChunk {
    timestamp: u32,
    meta: ChunkMeta,
    total_chunks: u16,
    total_seqs: u16,
    seqs_received: u16,
    data: Vec<u8>,
}

impl IncomingChunk {
    fn is_complete(&self) -> bool {
        self.seqs_received >= self.total_seqs
    }
}

/// Reassembles packets into decoded chunk WAV files.
pub struct ChunkReceiver {
    codec: Box<dyn AudioCodec>,
    out_dir: PathBuf,
    threshold_db: f32,
    incoming: Option<IncomingChunk>,
}

impl ChunkReceiver {
    pub fn new(codec: Box<dyn AudioCodec>, out_dir: impl Into<PathBuf>, threshold_db: f32) -> Self {
        Self {
            codec,
            out_dir: out_dir.into(),
            threshold_db,
            incoming: None,
        }
    }

    /// Handles one raw notification from the device.
    ///
    /// Protocol problems (wrong size, unknown type, orphan data) drop the
    /// packet and return `Ok(None)`. An `Err` is a host-side storage
    /// failure; the chunk is lost locally and stays on the device.
    pub fn handle_packet(&mut self, bytes: &[u8]) -> Result<Option<ReceiverEvent>> {
        let packet = match Packet::decode(bytes) {
            Ok(p) => p,
            Err(e) => {
                warn!(len = bytes.len(), error = %e, "dropping malformed packet");
                return Ok(None);
            }
        };

        match packet.packet_type {
            PacketType::ChunkHeader => self.on_header(packet),
            PacketType::ChunkData => self.on_data(packet),
            PacketType::UploadDone => {
                if self.incoming.take().is_some() {
                    warn!("upload done with chunk still in flight, dropping it");
                }
                Ok(Some(ReceiverEvent::UploadDone))
            }
        }
    }

    fn on_header(&mut self, packet: Packet) -> Result<Option<ReceiverEvent>> {
        if let Some(old) = self.incoming.take() {
            warn!(
                ts = old.timestamp,
                received = old.seqs_received,
                total = old.total_seqs,
                "new chunk header supersedes incomplete chunk"
            );
        }

        let meta = match ChunkMeta::decode(&packet.payload) {
            Ok(m) => m,
            Err(e) => {
                warn!(ts = packet.chunk_ts, error = %e, "dropping chunk with bad metadata");
                return Ok(None);
            }
        };
        if meta.sample_rate == 0 {
            warn!(ts = packet.chunk_ts, "dropping chunk with zero sample rate");
            return Ok(None);
        }

        debug!(
            ts = packet.chunk_ts,
            size = meta.data_size,
            idx = packet.chunk_idx,
            of = packet.total_chunks,
            "chunk transfer started"
        );
        let incoming = IncomingChunk {
            timestamp: packet.chunk_ts,
            meta,
            total_chunks: packet.total_chunks,
            total_seqs: packet.total_seqs,
            seqs_received: 1,
            // The declared size is untrusted wire input; cap the
            // pre-allocation and let the buffer grow with real payload.
            data: Vec::with_capacity((meta.data_size as usize).min(MAX_PREALLOC_BYTES)),
        };
        if incoming.is_complete() {
            // Zero-payload chunk: header is the whole transfer.
            return self.finalize(incoming);
        }
        self.incoming = Some(incoming);
        Ok(None)
    }

    fn on_data(&mut self, packet: Packet) -> Result<Option<ReceiverEvent>> {
        let Some(mut incoming) = self.incoming.take() else {
            warn!(ts = packet.chunk_ts, seq = packet.seq, "data packet with no open chunk");
            return Ok(None);
        };
        if packet.chunk_ts != incoming.timestamp {
            warn!(
                expected = incoming.timestamp,
                got = packet.chunk_ts,
                "data packet for a different chunk, dropping packet"
            );
            self.incoming = Some(incoming);
            return Ok(None);
        }

        incoming.data.extend_from_slice(&packet.payload);
        incoming.seqs_received += 1;
        if incoming.is_complete() {
            return self.finalize(incoming);
        }
        self.incoming = Some(incoming);
        Ok(None)
    }

    /// Integrity check, frame decode, WAV persist, silence analysis.
    fn finalize(&mut self, incoming: IncomingChunk) -> Result<Option<ReceiverEvent>> {
        let IncomingChunk {
            timestamp,
            meta,
            total_chunks,
            data,
            ..
        } = incoming;

        // Checksum first; an unverified chunk must not be acknowledged, so
        // it stays on the device for the next pass.
        let actual = crc32fast::hash(&data);
        if actual != meta.checksum {
            let e = PendantError::ChecksumMismatch {
                timestamp,
                expected: meta.checksum,
                actual,
            };
            warn!(error = %e, "dropping chunk without ack");
            return Ok(None);
        }

        if meta.codec_id != self.codec.codec_id() {
            warn!(
                ts = timestamp,
                codec = meta.codec_id,
                "chunk encoded with unsupported codec, dropping without ack"
            );
            return Ok(None);
        }

        let mut samples: Vec<i16> = Vec::new();
        for frame in FrameReader::new(&data) {
            let frame = match frame {
                Ok(f) => f,
                Err(e) => {
                    // A truncated tail loses only itself.
                    warn!(ts = timestamp, error = %e, "malformed frame tail, truncating");
                    break;
                }
            };
            match self.codec.decode(frame) {
                Ok(decoded) => samples.extend(decoded),
                Err(e) => warn!(ts = timestamp, error = %e, "skipping undecodable frame"),
            }
        }

        let wav_path = self.write_wav(timestamp, meta.sample_rate, &samples)?;
        let analysis = silence::analyze(&samples, meta.sample_rate, self.threshold_db);
        let duration_ms = samples.len() as u64 * 1000 / meta.sample_rate as u64;
        info!(
            ts = timestamp,
            duration_ms,
            speech_ms = analysis.speech_ms,
            "chunk received"
        );

        Ok(Some(ReceiverEvent::ChunkComplete {
            chunk: Box::new(AudioChunk {
                timestamp,
                sample_rate: meta.sample_rate,
                duration_ms,
                wav_path,
                analysis,
            }),
            total_chunks,
        }))
    }

    fn write_wav(&self, timestamp: u32, sample_rate: u32, samples: &[i16]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(format!("{:010}.wav", timestamp));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).map_err(wav_err)?;
        for &s in samples {
            writer.write_sample(s).map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)?;
        Ok(path)
    }
}

fn wav_err(e: hound::Error) -> PendantError {
    PendantError::Audio {
        message: format!("wav write failed: {}", e),
    }
}
