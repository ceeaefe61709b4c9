//! Audio codec seam.
//!
//! The real encoder/decoder (Opus on the wearable) is an external
//! collaborator; this trait is the boundary the recorder and the transfer
//! client program against. [`PcmCodec`] is a trivial implementation used in
//! tests and loopback runs.

use crate::defaults;
use crate::error::{PendantError, Result};

/// Opaque-frame audio codec.
///
/// `encode` turns linear samples into one opaque frame; `decode` is the
/// inverse. Frames are the sub-chunk unit stored length-prefixed on the
/// device and reassembled on the host.
pub trait AudioCodec: Send + Sync {
    /// Wire identifier for this codec, carried in chunk metadata.
    fn codec_id(&self) -> u8;

    /// Sample rate of the audio this codec produces, in Hz.
    fn sample_rate(&self) -> u32;

    /// Encodes linear 16-bit PCM samples into one opaque frame.
    fn encode(&self, samples: &[i16]) -> Result<Vec<u8>>;

    /// Decodes one opaque frame back into linear 16-bit PCM samples.
    fn decode(&self, frame: &[u8]) -> Result<Vec<i16>>;
}

/// Wire codec id for raw 16-bit PCM frames.
pub const CODEC_ID_PCM: u8 = 1;

/// Identity codec: frames are raw little-endian 16-bit PCM.
///
/// Useful wherever a real codec is unnecessary — unit tests, loopback
/// integration tests, and development without device hardware.
#[derive(Debug, Clone, Copy)]
pub struct PcmCodec {
    sample_rate: u32,
}

impl PcmCodec {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl Default for PcmCodec {
    fn default() -> Self {
        Self::new(defaults::SAMPLE_RATE)
    }
}

impl AudioCodec for PcmCodec {
    fn codec_id(&self) -> u8 {
        CODEC_ID_PCM
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn encode(&self, samples: &[i16]) -> Result<Vec<u8>> {
        let mut frame = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            frame.extend_from_slice(&s.to_le_bytes());
        }
        Ok(frame)
    }

    fn decode(&self, frame: &[u8]) -> Result<Vec<i16>> {
        if frame.len() % 2 != 0 {
            return Err(PendantError::Codec {
                message: format!("PCM frame of {} bytes is not sample-aligned", frame.len()),
            });
        }
        Ok(frame
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect())
    }
}
