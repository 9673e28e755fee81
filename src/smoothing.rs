//! Raw-signal smoothing and the calibration-free fast detection path
//!
//! The smoother produces the display-quality value returned from every
//! `process_sample` call: a trailing mean of the last five raw samples.
//!
//! The fast-path detector operates on that smoothed signal with running
//! mean/min/max statistics under slow exponential decay. It needs no warm-up
//! calibration, which makes it usable from the first samples of a session,
//! at the cost of selectivity compared to the adaptive cascade path.

use std::collections::VecDeque;

/// Trailing-mean window width for display smoothing.
pub const SMOOTHING_WINDOW: usize = 5;

/// Trailing moving average over the last [`SMOOTHING_WINDOW`] raw samples.
#[derive(Debug, Clone, Default)]
pub struct MovingAverageSmoother {
    buffer: VecDeque<f64>,
}

impl MovingAverageSmoother {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(SMOOTHING_WINDOW),
        }
    }

    /// Smooth one sample: mean of the samples seen so far, up to the
    /// window width.
    pub fn update(&mut self, x: f64) -> f64 {
        if self.buffer.len() == SMOOTHING_WINDOW {
            self.buffer.pop_front();
        }
        self.buffer.push_back(x);

        self.buffer.iter().sum::<f64>() / self.buffer.len() as f64
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Learning rate for the running mean.
const MEAN_ALPHA: f64 = 0.01;

/// Per-sample decay pulling the running extremes back toward the mean.
const EXTREME_DECAY: f64 = 0.999;

/// Fraction of the mean-to-max span a sample must clear to be a candidate.
const THRESHOLD_FRACTION: f64 = 0.5;

/// Minimum mean-to-max span before detection engages, rejecting flat or
/// near-flat signals.
const MIN_SPAN: f64 = 1e-6;

/// Running-statistics peak detector on the smoothed signal.
///
/// Tracks an exponential running mean and slowly decaying running extremes;
/// a sample is a peak candidate when it exceeds the mean plus half the
/// mean-to-max span while the signal is still rising into a local maximum.
#[derive(Debug, Clone)]
pub struct RunningStatsDetector {
    mean: f64,
    min: f64,
    max: f64,
    prev: f64,
    prev2: f64,
    seen: u64,
}

impl Default for RunningStatsDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningStatsDetector {
    pub fn new() -> Self {
        Self {
            mean: 0.0,
            min: 0.0,
            max: 0.0,
            prev: 0.0,
            prev2: 0.0,
            seen: 0,
        }
    }

    /// Feed one smoothed sample; returns `true` on a peak candidate.
    ///
    /// Refractory enforcement is the session controller's job; this only
    /// answers whether the sample looks like a local maximum over the
    /// running threshold.
    pub fn update(&mut self, smoothed: f64) -> bool {
        if self.seen == 0 {
            self.mean = smoothed;
            self.min = smoothed;
            self.max = smoothed;
        } else {
            self.mean += MEAN_ALPHA * (smoothed - self.mean);
            // Extremes track instantly outward, decay slowly back inward
            self.max = smoothed.max(self.max * EXTREME_DECAY + self.mean * (1.0 - EXTREME_DECAY));
            self.min = smoothed.min(self.min * EXTREME_DECAY + self.mean * (1.0 - EXTREME_DECAY));
        }

        let span = self.max - self.mean;
        let threshold = self.mean + THRESHOLD_FRACTION * span;

        let is_candidate = self.seen >= 2
            && span > MIN_SPAN
            && smoothed > threshold
            && smoothed >= self.prev
            && self.prev > self.prev2;

        self.prev2 = self.prev;
        self.prev = smoothed;
        self.seen += 1;

        is_candidate
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}
