//! Core types for the pulsetrace detection pipeline
//!
//! This module defines the data that flows out of the detection core:
//! accepted peak records, diagnostic snapshots, and end-of-session
//! summaries handed to the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which detection strategy drives the peak decision in `process_sample`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Full cascaded-filter path with adaptive dual thresholding.
    Adaptive,
    /// Running-statistics path on the smoothed raw signal. Cheaper, works
    /// without warm-up calibration, less selective.
    Fast,
}

/// An accepted R-peak. Created once at acceptance time, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RPeak {
    /// Ordinal index of the sample at which the peak was accepted.
    pub sample_index: u64,
    /// Wall-clock time of the peak: session start + index / sampling rate.
    pub timestamp: DateTime<Utc>,
    /// Interval since the previous peak (ms). `None` for the first peak.
    pub rr_interval_ms: Option<f64>,
    /// Instantaneous rate derived from `rr_interval_ms` (bpm).
    pub instantaneous_bpm: Option<f64>,
    /// Raw signal amplitude at acceptance.
    pub amplitude: f64,
}

/// Diagnostic snapshot of the running session. Read-only, no side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Samples processed since construction or the last reset.
    pub total_samples: u64,
    /// Peaks accepted since construction or the last reset.
    pub total_peaks: usize,
    /// Windowed-average heart rate (bpm); 0 until the RR window has data.
    pub current_bpm: f64,
    /// Adaptive detector signal level estimate.
    pub signal_peak: f64,
    /// Adaptive detector noise level estimate.
    pub noise_peak: f64,
    /// Primary detection threshold (I1).
    pub threshold: f64,
}

/// End-of-session summary for the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Unique id for this monitoring session.
    pub session_id: String,
    /// When the first sample was processed, if any.
    pub started_at: Option<DateTime<Utc>>,
    /// Session length in seconds (sample count / sampling rate).
    pub duration_secs: f64,
    /// Samples processed.
    pub total_samples: u64,
    /// Peaks accepted.
    pub r_peak_count: usize,
    /// Windowed-average heart rate at summary time (bpm).
    pub average_bpm: f64,
    /// Lowest instantaneous rate observed (bpm).
    pub min_bpm: Option<f64>,
    /// Highest instantaneous rate observed (bpm).
    pub max_bpm: Option<f64>,
    /// Standard deviation of RR intervals (ms).
    pub sdnn_ms: Option<f64>,
    /// Root mean square of successive RR differences (ms).
    pub rmssd_ms: Option<f64>,
}
