//! Adaptive dual-threshold peak detector
//!
//! Consumes the integrated output of the filter cascade and decides, per
//! sample, whether an R-peak occurred. The detector warms up for a fixed
//! number of samples while tracking the running signal maximum, then runs
//! calibrated: refractory gating, amplitude-shock recalibration, missed-beat
//! threshold relaxation, and the dual-threshold local-maximum decision.
//!
//! There are no error states. Persistent non-detection is recovered through
//! threshold relaxation rather than surfaced as a fault, which keeps the
//! detector robust against a jittery, garbage-prone data line.

/// Warm-up length in samples, independent of sampling rate.
pub const WARMUP_SAMPLES: u64 = 400;

/// Refractory period as a fraction of the sampling rate (250 ms).
pub const REFRACTORY_SECS: f64 = 0.25;

/// Seconds without a peak before thresholds start relaxing.
const MISSED_BEAT_SECS: f64 = 2.0;

/// EMA learning rate for signal/noise level updates.
const LEARNING_RATE: f64 = 0.2;

/// Per-sample threshold decay once the missed-beat window is exceeded.
const RELAXATION_DECAY: f64 = 0.9;

/// Fraction of the signal level an accepted peak must exceed.
const PEAK_FLOOR_FRACTION: f64 = 0.4;

/// Multiple of the signal level treated as an amplitude/gain change.
const SHOCK_FACTOR: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    WarmingUp { remaining: u64, observed_max: f64 },
    Calibrated,
}

/// Stateful signal/noise level estimator with adaptive thresholds I1/I2.
///
/// Invariant once initialized: `threshold_i1 >= threshold_i2 >= 0`. Both
/// start at zero, meaning uncalibrated.
#[derive(Debug, Clone)]
pub struct AdaptiveThresholdDetector {
    phase: Phase,
    signal_peak: f64,
    noise_peak: f64,
    threshold_i1: f64,
    threshold_i2: f64,
    last_peak_index: Option<u64>,
    calibrated_at: u64,
    prev: f64,
    prev2: f64,
    refractory_samples: u64,
    missed_beat_samples: u64,
}

impl AdaptiveThresholdDetector {
    pub fn new(sampling_rate: f64) -> Self {
        Self {
            phase: Phase::WarmingUp {
                remaining: WARMUP_SAMPLES,
                observed_max: 0.0,
            },
            signal_peak: 0.0,
            noise_peak: 0.0,
            threshold_i1: 0.0,
            threshold_i2: 0.0,
            last_peak_index: None,
            calibrated_at: 0,
            prev: 0.0,
            prev2: 0.0,
            refractory_samples: (REFRACTORY_SECS * sampling_rate).round() as u64,
            missed_beat_samples: (MISSED_BEAT_SECS * sampling_rate) as u64,
        }
    }

    /// Feed the integrated value for sample `index`; returns `true` when the
    /// sample is accepted as an R-peak.
    pub fn update(&mut self, integrated: f64, index: u64) -> bool {
        let accepted = match self.phase {
            Phase::WarmingUp {
                remaining,
                observed_max,
            } => {
                let observed_max = observed_max.max(integrated);
                if remaining <= 1 {
                    if observed_max > 0.0 {
                        self.signal_peak = 0.8 * observed_max;
                        self.noise_peak = 0.2 * observed_max;
                        self.recompute_thresholds();
                    }
                    self.phase = Phase::Calibrated;
                    self.calibrated_at = index;
                } else {
                    self.phase = Phase::WarmingUp {
                        remaining: remaining - 1,
                        observed_max,
                    };
                }
                false
            }
            Phase::Calibrated => self.update_calibrated(integrated, index),
        };

        self.prev2 = self.prev;
        self.prev = integrated;

        accepted
    }

    fn update_calibrated(&mut self, v: f64, n: u64) -> bool {
        // Lazy fallback: warm-up saw no positive signal, so seed thresholds
        // from the first usable sample instead
        if self.threshold_i1 == 0.0 && v > 0.0 {
            self.threshold_i1 = 0.3 * v;
            self.threshold_i2 = 0.5 * self.threshold_i1;
        }

        // Refractory gate
        if let Some(last) = self.last_peak_index {
            if n - last < self.refractory_samples {
                return false;
            }
        }

        // Sudden amplitude/gain change: re-center the signal level on it
        if self.signal_peak > 0.0 && v > SHOCK_FACTOR * self.signal_peak {
            self.signal_peak = 0.5 * v;
            self.recompute_thresholds();
        }

        // Missed-beat relaxation to recover sensitivity. The decay is
        // applied to the levels rather than the thresholds directly, so it
        // survives the recomputation in the decision step below; the
        // thresholds still shrink by exactly the decay factor.
        let since_event = n - self.last_peak_index.unwrap_or(self.calibrated_at);
        if since_event > self.missed_beat_samples && self.threshold_i1 > 0.0 {
            self.signal_peak *= RELAXATION_DECAY;
            self.noise_peak *= RELAXATION_DECAY;
            self.recompute_thresholds();
        }

        let is_local_max = v >= self.prev && self.prev > self.prev2;
        let above_floor = v > PEAK_FLOOR_FRACTION * self.signal_peak;

        if v > self.threshold_i1 && is_local_max && above_floor {
            self.signal_peak = LEARNING_RATE * v + (1.0 - LEARNING_RATE) * self.signal_peak;
            self.recompute_thresholds();
            self.last_peak_index = Some(n);
            true
        } else {
            self.noise_peak = LEARNING_RATE * v + (1.0 - LEARNING_RATE) * self.noise_peak;
            self.recompute_thresholds();
            false
        }
    }

    fn recompute_thresholds(&mut self) {
        self.threshold_i1 = self.noise_peak + 0.25 * (self.signal_peak - self.noise_peak);
        self.threshold_i2 = 0.5 * self.threshold_i1;
    }

    pub fn is_calibrated(&self) -> bool {
        self.phase == Phase::Calibrated
    }

    pub fn signal_peak(&self) -> f64 {
        self.signal_peak
    }

    pub fn noise_peak(&self) -> f64 {
        self.noise_peak
    }

    pub fn threshold_i1(&self) -> f64 {
        self.threshold_i1
    }

    pub fn threshold_i2(&self) -> f64 {
        self.threshold_i2
    }

    pub fn last_peak_index(&self) -> Option<u64> {
        self.last_peak_index
    }

    pub fn refractory_samples(&self) -> u64 {
        self.refractory_samples
    }

    pub fn clear(&mut self, sampling_rate: f64) {
        *self = Self::new(sampling_rate);
    }
}
