//! Peak registry and heart-rate estimation
//!
//! Records every accepted R-peak in an append-only sequence, maintains a
//! bounded window of recent RR intervals for the averaged rate, and derives
//! the session HRV metrics (SDNN, RMSSD) from the full interval history.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use crate::types::RPeak;

/// Bounded RR window used for the averaged rate.
pub const RR_WINDOW_CAPACITY: usize = 8;

/// Physiological sanity bounds for the averaged rate (bpm).
pub const BPM_MIN: f64 = 30.0;
pub const BPM_MAX: f64 = 200.0;

/// Append-only registry of accepted peaks plus the recent-RR window.
#[derive(Debug, Clone)]
pub struct PeakRegistry {
    sampling_rate: f64,
    peaks: Vec<RPeak>,
    rr_window: VecDeque<f64>,
}

impl PeakRegistry {
    pub fn new(sampling_rate: f64) -> Self {
        Self {
            sampling_rate,
            peaks: Vec::new(),
            rr_window: VecDeque::with_capacity(RR_WINDOW_CAPACITY),
        }
    }

    /// Record an accepted peak at `sample_index` with the raw amplitude.
    ///
    /// The RR interval and instantaneous rate are derived from the previous
    /// peak; the first peak of a session carries neither.
    pub fn record_peak(
        &mut self,
        sample_index: u64,
        amplitude: f64,
        session_start: DateTime<Utc>,
    ) -> RPeak {
        let rr_interval_ms = self.peaks.last().map(|prev| {
            (sample_index - prev.sample_index) as f64 / self.sampling_rate * 1000.0
        });
        let instantaneous_bpm = rr_interval_ms.map(|rr| 60_000.0 / rr);

        if let Some(rr) = rr_interval_ms {
            if self.rr_window.len() == RR_WINDOW_CAPACITY {
                self.rr_window.pop_front();
            }
            self.rr_window.push_back(rr);
        }

        let offset_us = (sample_index as f64 / self.sampling_rate * 1_000_000.0).round() as i64;
        let timestamp = session_start + Duration::microseconds(offset_us);

        let peak = RPeak {
            sample_index,
            timestamp,
            rr_interval_ms,
            instantaneous_bpm,
            amplitude,
        };
        self.peaks.push(peak.clone());
        peak
    }

    /// Averaged rate over the RR window, clamped to physiological bounds.
    /// Returns 0 while the window is empty.
    pub fn average_bpm(&self) -> f64 {
        if self.rr_window.is_empty() {
            return 0.0;
        }
        let mean_rr = self.rr_window.iter().sum::<f64>() / self.rr_window.len() as f64;
        (60_000.0 / mean_rr).clamp(BPM_MIN, BPM_MAX)
    }

    /// Standard deviation of the session's RR intervals (ms).
    pub fn sdnn(&self) -> Option<f64> {
        let rr: Vec<f64> = self.rr_intervals().collect();
        if rr.len() < 2 {
            return None;
        }
        let mean = rr.iter().sum::<f64>() / rr.len() as f64;
        let variance = rr.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (rr.len() - 1) as f64;
        Some(variance.sqrt())
    }

    /// Root mean square of successive RR differences (ms).
    pub fn rmssd(&self) -> Option<f64> {
        let rr: Vec<f64> = self.rr_intervals().collect();
        if rr.len() < 2 {
            return None;
        }
        let sum_sq: f64 = rr.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
        Some((sum_sq / (rr.len() - 1) as f64).sqrt())
    }

    /// Lowest and highest instantaneous rates observed, if any.
    pub fn bpm_range(&self) -> (Option<f64>, Option<f64>) {
        let mut min = None::<f64>;
        let mut max = None::<f64>;
        for bpm in self.peaks.iter().filter_map(|p| p.instantaneous_bpm) {
            min = Some(min.map_or(bpm, |m| m.min(bpm)));
            max = Some(max.map_or(bpm, |m| m.max(bpm)));
        }
        (min, max)
    }

    /// Full peak history, insertion-ordered.
    pub fn peaks(&self) -> &[RPeak] {
        &self.peaks
    }

    /// The most recent `count` peaks.
    pub fn recent_peaks(&self, count: usize) -> &[RPeak] {
        let start = self.peaks.len().saturating_sub(count);
        &self.peaks[start..]
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn clear(&mut self) {
        self.peaks.clear();
        self.rr_window.clear();
    }

    fn rr_intervals(&self) -> impl Iterator<Item = f64> + '_ {
        self.peaks.iter().filter_map(|p| p.rr_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn start() -> DateTime<Utc> {
        "2024-01-15T08:00:00Z".parse().unwrap()
    }

    /// Record peaks at a fixed spacing (in samples).
    fn record_spaced(registry: &mut PeakRegistry, count: usize, spacing: u64) {
        for i in 0..count {
            registry.record_peak(1000 + i as u64 * spacing, 1.0, start());
        }
    }

    #[test]
    fn test_first_peak_has_no_rr() {
        let mut registry = PeakRegistry::new(860.0);
        let peak = registry.record_peak(1000, 0.8, start());
        assert_eq!(peak.rr_interval_ms, None);
        assert_eq!(peak.instantaneous_bpm, None);
        assert_eq!(registry.average_bpm(), 0.0);
    }

    #[test]
    fn test_rr_and_instantaneous_bpm() {
        let mut registry = PeakRegistry::new(860.0);
        registry.record_peak(0, 1.0, start());
        // 688 samples at 860 Hz = 800 ms = 75 bpm
        let peak = registry.record_peak(688, 1.0, start());
        let rr = peak.rr_interval_ms.unwrap();
        assert!((rr - 800.0).abs() < 0.01);
        assert!((peak.instantaneous_bpm.unwrap() - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_timestamp_microsecond_precision() {
        let mut registry = PeakRegistry::new(860.0);
        let peak = registry.record_peak(430, 1.0, start());
        // 430 / 860 s = exactly 500 ms
        assert_eq!(peak.timestamp, start() + Duration::milliseconds(500));
    }

    #[test]
    fn test_rr_window_eviction() {
        let mut registry = PeakRegistry::new(860.0);
        record_spaced(&mut registry, 12, 860);
        assert_eq!(registry.len(), 12);
        // 11 RR intervals produced, window holds the last 8; all are
        // 1000 ms, so the average is 60 bpm
        assert!((registry.average_bpm() - 60.0).abs() < 0.001);
    }

    #[test]
    fn test_average_bpm_clamped() {
        let mut registry = PeakRegistry::new(860.0);
        // 100 ms spacing = 600 bpm raw, clamped to 200
        record_spaced(&mut registry, 4, 86);
        assert_eq!(registry.average_bpm(), BPM_MAX);

        let mut slow = PeakRegistry::new(860.0);
        // 4 s spacing = 15 bpm raw, clamped to 30
        record_spaced(&mut slow, 3, 4 * 860);
        assert_eq!(slow.average_bpm(), BPM_MIN);
    }

    #[test]
    fn test_hrv_requires_two_intervals() {
        let mut registry = PeakRegistry::new(860.0);
        assert_eq!(registry.sdnn(), None);
        assert_eq!(registry.rmssd(), None);

        record_spaced(&mut registry, 2, 860);
        // One RR interval: still not enough
        assert_eq!(registry.sdnn(), None);
        assert_eq!(registry.rmssd(), None);
    }

    #[test]
    fn test_hrv_zero_for_constant_rr() {
        let mut registry = PeakRegistry::new(860.0);
        record_spaced(&mut registry, 6, 860);
        assert!(registry.sdnn().unwrap().abs() < 1e-9);
        assert!(registry.rmssd().unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_hrv_known_values() {
        let mut registry = PeakRegistry::new(1000.0);
        // RR intervals: 800, 1000, 800, 1000 ms
        for index in [0_u64, 800, 1800, 2600, 3600] {
            registry.record_peak(index, 1.0, start());
        }
        // Sample stdev of [800, 1000, 800, 1000] = sqrt(40000/3)
        let sdnn = registry.sdnn().unwrap();
        assert!((sdnn - (40_000.0_f64 / 3.0).sqrt()).abs() < 0.01);
        // Successive diffs all 200 ms, so RMSSD = 200
        let rmssd = registry.rmssd().unwrap();
        assert!((rmssd - 200.0).abs() < 0.01);
    }

    #[test]
    fn test_recent_peaks_tail() {
        let mut registry = PeakRegistry::new(860.0);
        record_spaced(&mut registry, 5, 860);
        assert_eq!(registry.recent_peaks(2).len(), 2);
        assert_eq!(registry.recent_peaks(2)[0].sample_index, 1000 + 3 * 860);
        // Asking for more than exist returns everything
        assert_eq!(registry.recent_peaks(100).len(), 5);
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut registry = PeakRegistry::new(860.0);
        record_spaced(&mut registry, 5, 860);
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.average_bpm(), 0.0);
        assert_eq!(registry.peaks().len(), 0);
    }
}
