//! Session controller
//!
//! [`EcgProcessor`] owns all per-session state: the filter cascade, the
//! display smoother, the adaptive detector, and the peak registry. Samples
//! are processed strictly one at a time; nothing inside is synchronized, so
//! a session must be driven from a single thread and `reset` must not race
//! `process_sample`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::detector::AdaptiveThresholdDetector;
use crate::error::ProcessorError;
use crate::filters::FilterCascade;
use crate::registry::PeakRegistry;
use crate::smoothing::{MovingAverageSmoother, RunningStatsDetector};
use crate::types::{DetectionMode, RPeak, SessionStats, SessionSummary};

/// Real-time single-lead ECG processor for one monitoring session.
///
/// Feed raw samples in temporal order via [`process_sample`]; each call
/// returns the display-quality smoothed value and the peak decision for that
/// sample. Rate and peak-history accessors are read-only and reflect the
/// session at call time.
///
/// [`process_sample`]: EcgProcessor::process_sample
#[derive(Debug, Clone)]
pub struct EcgProcessor {
    sampling_rate: f64,
    mode: DetectionMode,
    session_id: Uuid,
    session_start: Option<DateTime<Utc>>,
    total_samples: u64,
    cascade: FilterCascade,
    smoother: MovingAverageSmoother,
    detector: AdaptiveThresholdDetector,
    fast_detector: RunningStatsDetector,
    registry: PeakRegistry,
}

impl EcgProcessor {
    /// Create a processor for signals sampled at `sampling_rate` Hz.
    ///
    /// The rate drives every delay tap, the integration window, and the
    /// refractory period, so it must be positive and must not change for
    /// the lifetime of the session.
    pub fn new(sampling_rate: f64) -> Result<Self, ProcessorError> {
        Self::with_mode(sampling_rate, DetectionMode::Adaptive)
    }

    /// Create a processor with an explicit detection mode.
    ///
    /// [`DetectionMode::Fast`] skips the filter cascade entirely and decides
    /// on the smoothed raw signal; the adaptive level fields of
    /// [`session_stats`] stay at zero in that mode.
    ///
    /// [`session_stats`]: EcgProcessor::session_stats
    pub fn with_mode(sampling_rate: f64, mode: DetectionMode) -> Result<Self, ProcessorError> {
        if sampling_rate <= 0.0 || !sampling_rate.is_finite() {
            return Err(ProcessorError::InvalidSamplingRate(sampling_rate));
        }
        Ok(Self {
            sampling_rate,
            mode,
            session_id: Uuid::new_v4(),
            session_start: None,
            total_samples: 0,
            cascade: FilterCascade::new(sampling_rate),
            smoother: MovingAverageSmoother::new(),
            detector: AdaptiveThresholdDetector::new(sampling_rate),
            fast_detector: RunningStatsDetector::new(),
            registry: PeakRegistry::new(sampling_rate),
        })
    }

    /// Process one raw sample; returns `(smoothed_value, is_peak)`.
    ///
    /// Never fails: malformed or out-of-range values are numerically
    /// absorbed by the filters and thresholds rather than rejected.
    pub fn process_sample(&mut self, raw: f64) -> (f64, bool) {
        let session_start = *self.session_start.get_or_insert_with(Utc::now);
        let index = self.total_samples;
        self.total_samples += 1;

        let smoothed = self.smoother.update(raw);

        let accepted = match self.mode {
            DetectionMode::Adaptive => {
                let integrated = self.cascade.update(raw);
                self.detector.update(integrated, index)
            }
            DetectionMode::Fast => {
                if self.in_refractory(index) {
                    false
                } else {
                    self.fast_detector.update(smoothed)
                }
            }
        };

        if accepted {
            self.registry.record_peak(index, raw, session_start);
        }

        (smoothed, accepted)
    }

    /// Averaged heart rate over the recent RR window (bpm); 0 while empty.
    pub fn calculate_bpm(&self) -> f64 {
        self.registry.average_bpm()
    }

    /// Full peak history, read-only.
    pub fn detected_peaks(&self) -> &[RPeak] {
        self.registry.peaks()
    }

    /// The most recent `count` peaks, read-only.
    pub fn recent_peaks(&self, count: usize) -> &[RPeak] {
        self.registry.recent_peaks(count)
    }

    /// Diagnostic snapshot of the running session.
    pub fn session_stats(&self) -> SessionStats {
        SessionStats {
            total_samples: self.total_samples,
            total_peaks: self.registry.len(),
            current_bpm: self.registry.average_bpm(),
            signal_peak: self.detector.signal_peak(),
            noise_peak: self.detector.noise_peak(),
            threshold: self.detector.threshold_i1(),
        }
    }

    /// End-of-session summary for the persistence layer.
    pub fn session_summary(&self) -> SessionSummary {
        let (min_bpm, max_bpm) = self.registry.bpm_range();
        SessionSummary {
            session_id: self.session_id.to_string(),
            started_at: self.session_start,
            duration_secs: self.total_samples as f64 / self.sampling_rate,
            total_samples: self.total_samples,
            r_peak_count: self.registry.len(),
            average_bpm: self.registry.average_bpm(),
            min_bpm,
            max_bpm,
            sdnn_ms: self.registry.sdnn(),
            rmssd_ms: self.registry.rmssd(),
        }
    }

    /// Standard deviation of the session's RR intervals (ms).
    pub fn sdnn(&self) -> Option<f64> {
        self.registry.sdnn()
    }

    /// Root mean square of successive RR differences (ms).
    pub fn rmssd(&self) -> Option<f64> {
        self.registry.rmssd()
    }

    /// Clear every buffer, the peak history, and all threshold and warm-up
    /// state, starting a fresh session on the same configuration.
    pub fn reset(&mut self) {
        self.session_id = Uuid::new_v4();
        self.session_start = None;
        self.total_samples = 0;
        self.cascade.clear();
        self.smoother.clear();
        self.detector.clear(self.sampling_rate);
        self.fast_detector.clear();
        self.registry.clear();
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn mode(&self) -> DetectionMode {
        self.mode
    }

    /// Refractory period in samples, derived from the sampling rate.
    pub fn refractory_samples(&self) -> u64 {
        self.detector.refractory_samples()
    }

    fn in_refractory(&self, index: u64) -> bool {
        self.registry
            .peaks()
            .last()
            .map(|p| index - p.sample_index < self.detector.refractory_samples())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::WARMUP_SAMPLES;

    /// Triangular pulse train: one `width`-sample pulse per `period`.
    fn pulse_train_sample(i: u64, period: u64, width: u64, amplitude: f64) -> f64 {
        let phase = i % period;
        if phase < width / 2 {
            amplitude * phase as f64 / (width / 2) as f64
        } else if phase < width {
            amplitude * (width - phase) as f64 / (width / 2) as f64
        } else {
            0.0
        }
    }

    #[test]
    fn test_rejects_non_positive_sampling_rate() {
        assert!(EcgProcessor::new(0.0).is_err());
        assert!(EcgProcessor::new(-250.0).is_err());
        assert!(EcgProcessor::new(f64::NAN).is_err());
        assert!(EcgProcessor::new(860.0).is_ok());
    }

    #[test]
    fn test_flat_line_yields_no_peaks() {
        let mut p = EcgProcessor::new(860.0).unwrap();
        for _ in 0..2000 {
            let (filtered, is_peak) = p.process_sample(0.0);
            assert_eq!(filtered, 0.0);
            assert!(!is_peak);
            assert_eq!(p.calculate_bpm(), 0.0);
        }
        assert!(p.detected_peaks().is_empty());
    }

    #[test]
    fn test_accessors_before_any_peak() {
        let p = EcgProcessor::new(860.0).unwrap();
        assert!(p.detected_peaks().is_empty());
        assert!(p.recent_peaks(5).is_empty());
        assert_eq!(p.calculate_bpm(), 0.0);
        assert_eq!(p.sdnn(), None);
        let stats = p.session_stats();
        assert_eq!(stats.total_samples, 0);
        assert_eq!(stats.total_peaks, 0);
    }

    #[test]
    fn test_detects_75_bpm_pulse_train() {
        let fs = 860.0;
        let period = 688; // 800 ms at 860 Hz = 75 bpm
        let mut p = EcgProcessor::new(fs).unwrap();

        let total = WARMUP_SAMPLES + 30 * period;
        for i in 0..total {
            p.process_sample(pulse_train_sample(i, period, 26, 100.0));
        }

        let peaks = p.detected_peaks();
        assert!(peaks.len() >= 10, "expected a peak per beat, got {}", peaks.len());

        // Skip the earliest peaks while thresholds converge
        let rates: Vec<f64> = peaks
            .iter()
            .skip(3)
            .filter_map(|p| p.instantaneous_bpm)
            .collect();
        let mean = rates.iter().sum::<f64>() / rates.len() as f64;
        assert!(
            (mean - 75.0).abs() <= 1.5,
            "mean instantaneous bpm {mean} outside 75 ± 2%"
        );
        assert!((p.calculate_bpm() - 75.0).abs() <= 1.5);
    }

    #[test]
    fn test_consecutive_peaks_respect_refractory() {
        let fs = 860.0;
        let mut p = EcgProcessor::new(fs).unwrap();
        for i in 0..WARMUP_SAMPLES + 20 * 688 {
            p.process_sample(pulse_train_sample(i, 688, 26, 100.0));
        }
        let refractory = p.refractory_samples();
        for pair in p.detected_peaks().windows(2) {
            assert!(pair[1].sample_index - pair[0].sample_index >= refractory);
        }
    }

    #[test]
    fn test_noise_input_stays_finite() {
        let mut p = EcgProcessor::new(860.0).unwrap();
        let mut state = 0x2545F491_u32;
        for _ in 0..WARMUP_SAMPLES + 8600 {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            let x = (state >> 16) as f64 / 65536.0 * 0.2 - 0.1;
            let (filtered, _) = p.process_sample(x);
            assert!(filtered.is_finite());
        }
        let stats = p.session_stats();
        assert!(stats.current_bpm.is_finite());
        assert!(stats.signal_peak.is_finite());
        assert!(stats.threshold.is_finite());
        for peak in p.detected_peaks() {
            assert!(peak.amplitude.is_finite());
        }
    }

    #[test]
    fn test_reset_matches_fresh_instance() {
        let mut p = EcgProcessor::new(860.0).unwrap();
        for i in 0..WARMUP_SAMPLES + 10 * 688 {
            p.process_sample(pulse_train_sample(i, 688, 26, 100.0));
        }
        assert!(!p.detected_peaks().is_empty());

        p.reset();

        assert!(p.detected_peaks().is_empty());
        assert_eq!(p.calculate_bpm(), 0.0);
        let stats = p.session_stats();
        assert_eq!(stats.total_samples, 0);
        assert_eq!(stats.total_peaks, 0);
        assert_eq!(stats.signal_peak, 0.0);
        assert_eq!(stats.noise_peak, 0.0);
        assert_eq!(stats.threshold, 0.0);

        // Behaves like a fresh instance on a flat line
        for _ in 0..2000 {
            let (filtered, is_peak) = p.process_sample(0.0);
            assert_eq!(filtered, 0.0);
            assert!(!is_peak);
        }
    }

    #[test]
    fn test_accessors_are_idempotent() {
        let mut p = EcgProcessor::new(860.0).unwrap();
        for i in 0..WARMUP_SAMPLES + 5 * 688 {
            p.process_sample(pulse_train_sample(i, 688, 26, 100.0));
        }
        let stats1 = p.session_stats();
        let stats2 = p.session_stats();
        assert_eq!(stats1, stats2);
        assert_eq!(p.detected_peaks(), p.detected_peaks());
        assert_eq!(p.calculate_bpm(), p.calculate_bpm());
    }

    #[test]
    fn test_fast_mode_detects_without_warmup() {
        let mut p = EcgProcessor::with_mode(860.0, DetectionMode::Fast).unwrap();
        // Pulses are visible to the fast path well before the adaptive
        // warm-up would have completed
        for i in 0..10 * 688 {
            p.process_sample(pulse_train_sample(i, 688, 26, 100.0));
        }
        assert!(!p.detected_peaks().is_empty());

        let refractory = p.refractory_samples();
        for pair in p.detected_peaks().windows(2) {
            assert!(pair[1].sample_index - pair[0].sample_index >= refractory);
        }
    }

    #[test]
    fn test_summary_round_trips_through_json() {
        let mut p = EcgProcessor::new(860.0).unwrap();
        for i in 0..WARMUP_SAMPLES + 10 * 688 {
            p.process_sample(pulse_train_sample(i, 688, 26, 100.0));
        }
        let summary = p.session_summary();
        let json = serde_json::to_string(&summary).unwrap();
        let back: SessionSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(summary, back);
        assert_eq!(back.r_peak_count, p.detected_peaks().len());
        assert!(back.duration_secs > 0.0);
    }

    #[test]
    fn test_derived_constants_scale_with_rate() {
        let p_860 = EcgProcessor::new(860.0).unwrap();
        let p_430 = EcgProcessor::new(430.0).unwrap();
        assert_eq!(p_860.refractory_samples(), 215);
        assert_eq!(p_430.refractory_samples(), 108);
    }
}
