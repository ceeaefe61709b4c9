//! Conversation stitching.
//!
//! Takes the chunks of one conversation, keeps only their speech segments,
//! and concatenates those into a single playable WAV. Silence inside and
//! between chunks is what gets removed; the result is the conversation
//! with the dead air cut out.

use crate::error::{PendantError, Result};
use crate::host::receiver::AudioChunk;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of stitching one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchResult {
    pub path: PathBuf,
    /// Speech retained in the output.
    pub speech_ms: u64,
    /// Silence cut from the conversation's total runtime.
    pub removed_silence_ms: u64,
}

/// Stitches the speech segments of `chunks` (chronological order) into one
/// WAV at `out_path`.
///
/// Returns [`PendantError::NoSpeech`] without creating a file when no chunk
/// in the conversation has any speech.
pub fn stitch(chunks: &[AudioChunk], out_path: &Path) -> Result<StitchResult> {
    if !chunks.iter().any(|c| c.analysis.has_speech()) {
        return Err(PendantError::NoSpeech);
    }

    // First speech-bearing chunk fixes the output format.
    let sample_rate = chunks
        .iter()
        .find(|c| c.analysis.has_speech())
        .map(|c| c.sample_rate)
        .unwrap_or_default();

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(out_path, spec).map_err(wav_err)?;

    let mut retained_samples = 0u64;
    let mut total_ms = 0u64;
    for chunk in chunks {
        total_ms += chunk.duration_ms;
        if !chunk.analysis.has_speech() {
            continue;
        }
        if chunk.sample_rate != sample_rate {
            warn!(
                ts = chunk.timestamp,
                rate = chunk.sample_rate,
                "chunk sample rate differs from conversation, skipping"
            );
            continue;
        }

        let samples = read_wav(&chunk.wav_path)?;
        for seg in chunk.analysis.segments.iter().filter(|s| s.is_speech) {
            // A file shorter than its analysis clamps the range; count
            // only what actually lands in the output.
            let start = (seg.start_ms * sample_rate as u64 / 1000) as usize;
            let end = ((seg.end_ms * sample_rate as u64 / 1000) as usize).min(samples.len());
            let start = start.min(end);
            for &s in &samples[start..end] {
                writer.write_sample(s).map_err(wav_err)?;
            }
            retained_samples += (end - start) as u64;
        }
    }
    writer.finalize().map_err(wav_err)?;
    let speech_ms = retained_samples * 1000 / u64::from(sample_rate.max(1));

    let removed_silence_ms = total_ms.saturating_sub(speech_ms);
    info!(
        path = %out_path.display(),
        speech_ms,
        removed_silence_ms,
        "conversation stitched"
    );
    Ok(StitchResult {
        path: out_path.to_path_buf(),
        speech_ms,
        removed_silence_ms,
    })
}

fn read_wav(path: &Path) -> Result<Vec<i16>> {
    let reader = hound::WavReader::open(path).map_err(wav_err)?;
    reader
        .into_samples::<i16>()
        .collect::<std::result::Result<_, _>>()
        .map_err(wav_err)
}

fn wav_err(e: hound::Error) -> PendantError {
    PendantError::Audio {
        message: format!("wav read/write failed: {}", e),
    }
}
