//! Silence analysis over decoded chunk audio.
//!
//! Audio is scored in 100 ms windows by RMS level in dBFS. Windows at or
//! below the threshold are silent; adjacent same-class windows merge into
//! segments. The per-chunk analysis feeds conversation boundary detection:
//! enough accumulated trailing silence across recent chunks means the
//! conversation has ended.

use crate::defaults;

/// One run of same-class windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub is_speech: bool,
}

impl Segment {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Per-chunk silence analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct SilenceAnalysis {
    /// Merged segments in chronological order.
    pub segments: Vec<Segment>,
    pub speech_ms: u64,
    pub silence_ms: u64,
    pub longest_silence_ms: u64,
}

impl SilenceAnalysis {
    pub fn total_ms(&self) -> u64 {
        self.speech_ms + self.silence_ms
    }

    pub fn has_speech(&self) -> bool {
        self.speech_ms > 0
    }

    /// Silence at the very end of the chunk; 0 when it ends in speech.
    pub fn trailing_silence_ms(&self) -> u64 {
        match self.segments.last() {
            Some(seg) if !seg.is_speech => seg.duration_ms(),
            _ => 0,
        }
    }
}

/// RMS level of a sample window in dBFS, floored at −100 dB for silence.
pub fn rms_dbfs(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return defaults::SILENCE_FLOOR_DB;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt() / f64::from(i16::MAX);
    if rms <= 0.0 {
        return defaults::SILENCE_FLOOR_DB;
    }
    let db = 20.0 * rms.log10() as f32;
    db.max(defaults::SILENCE_FLOOR_DB)
}

/// Classifies a chunk's samples into speech and silence segments.
///
/// A trailing partial window is analyzed like any full window; its duration
/// reflects the samples it actually covers.
pub fn analyze(samples: &[i16], sample_rate: u32, threshold_db: f32) -> SilenceAnalysis {
    let window_len =
        (sample_rate as u64 * defaults::SILENCE_WINDOW_MS as u64 / 1000).max(1) as usize;

    let mut segments: Vec<Segment> = Vec::new();
    let mut cursor_ms = 0u64;
    for window in samples.chunks(window_len) {
        let is_speech = rms_dbfs(window) > threshold_db;
        let duration_ms = window.len() as u64 * 1000 / sample_rate as u64;
        let end_ms = cursor_ms + duration_ms;

        match segments.last_mut() {
            Some(last) if last.is_speech == is_speech => last.end_ms = end_ms,
            _ => segments.push(Segment {
                start_ms: cursor_ms,
                end_ms,
                is_speech,
            }),
        }
        cursor_ms = end_ms;
    }

    let mut speech_ms = 0;
    let mut silence_ms = 0;
    let mut longest_silence_ms = 0;
    for seg in &segments {
        if seg.is_speech {
            speech_ms += seg.duration_ms();
        } else {
            silence_ms += seg.duration_ms();
            longest_silence_ms = longest_silence_ms.max(seg.duration_ms());
        }
    }

    SilenceAnalysis {
        segments,
        speech_ms,
        silence_ms,
        longest_silence_ms,
    }
}

/// Decides whether the conversation ended, given per-chunk analyses in
/// chronological order.
///
/// Walks newest to oldest accumulating trailing silence: an entirely silent
/// chunk contributes its whole duration and the walk continues; a chunk
/// with speech contributes only its trailing silent segment and stops the
/// walk. Boundary once the accumulated silence reaches `gap_ms`.
pub fn is_conversation_boundary(analyses: &[SilenceAnalysis], gap_ms: u64) -> bool {
    let mut accumulated_ms = 0u64;
    for analysis in analyses.iter().rev() {
        if analysis.has_speech() {
            accumulated_ms += analysis.trailing_silence_ms();
            break;
        }
        accumulated_ms += analysis.total_ms();
        if accumulated_ms >= gap_ms {
            return true;
        }
    }
    accumulated_ms >= gap_ms
}
