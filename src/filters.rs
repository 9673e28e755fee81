//! Cascaded digital filter bank
//!
//! Shapes the raw ECG signal into a QRS-energy envelope through a cascade of
//! stages: low-pass → high-pass → derivative → squaring → moving-window
//! integration. Delay-tap offsets are designed for an 860 Hz reference rate
//! and scale linearly with the configured sampling rate, so the cutoff
//! frequencies (≈15 Hz low-pass, ≈5 Hz high-pass) stay invariant.
//!
//! Every stage consumes exactly one input and produces exactly one output.
//! While a delay line is still filling, the low-pass and high-pass stages
//! pass the input through unchanged and the derivative returns 0; transiently
//! inaccurate output during this cold-start period is expected, not a fault.

use std::collections::VecDeque;

/// Reference sampling rate the delay taps were designed for (Hz).
pub const REFERENCE_RATE_HZ: f64 = 860.0;

/// Moving-window integrator width as a fraction of the sampling rate (150 ms).
pub const INTEGRATION_WINDOW_SECS: f64 = 0.15;

/// Scale an 860 Hz reference tap offset to the configured rate.
fn scaled_tap(reference: usize, sampling_rate: f64) -> usize {
    let tap = (reference as f64 * sampling_rate / REFERENCE_RATE_HZ).round() as usize;
    tap.max(1)
}

/// Low-pass stage, ≈15 Hz cutoff at the reference rate.
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    buffer: VecDeque<f64>,
    capacity: usize,
    d1: usize,
    d2: usize,
}

impl LowPassFilter {
    pub fn new(sampling_rate: f64) -> Self {
        let d1 = scaled_tap(26, sampling_rate);
        let d2 = 2 * d1;
        Self {
            buffer: VecDeque::with_capacity(d2 + 1),
            capacity: d2 + 1,
            d1,
            d2,
        }
    }

    /// Filter one sample. Passes the input through until the delay line
    /// holds `capacity` samples.
    pub fn update(&mut self, x: f64) -> f64 {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(x);

        if self.buffer.len() < self.capacity {
            return x;
        }

        let tail = self.capacity - 1;
        (2.0 * self.buffer[tail - 1] - self.buffer[tail - 2] + self.buffer[tail]
            - 2.0 * self.buffer[tail - self.d1]
            + self.buffer[tail - self.d2])
            / 32.0
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// High-pass stage, ≈5 Hz cutoff at the reference rate.
#[derive(Debug, Clone)]
pub struct HighPassFilter {
    buffer: VecDeque<f64>,
    capacity: usize,
    d1: usize,
    d2: usize,
    d3: usize,
}

impl HighPassFilter {
    pub fn new(sampling_rate: f64) -> Self {
        let d1 = scaled_tap(69, sampling_rate);
        let d2 = scaled_tap(73, sampling_rate).max(d1 + 1);
        let d3 = scaled_tap(138, sampling_rate).max(d2 + 1);
        Self {
            buffer: VecDeque::with_capacity(d3 + 1),
            capacity: d3 + 1,
            d1,
            d2,
            d3,
        }
    }

    /// Filter one sample. Passes the input through until the delay line
    /// holds `capacity` samples.
    pub fn update(&mut self, x: f64) -> f64 {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(x);

        if self.buffer.len() < self.capacity {
            return x;
        }

        let tail = self.capacity - 1;
        self.buffer[tail - 1] - self.buffer[tail] / 32.0 + self.buffer[tail - self.d1]
            - self.buffer[tail - self.d2]
            + self.buffer[tail - self.d3] / 32.0
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Five-point derivative stage emphasizing the steep QRS slope.
#[derive(Debug, Clone, Default)]
pub struct DerivativeFilter {
    buffer: VecDeque<f64>,
}

/// Window length of the derivative stage, rate-independent.
const DERIVATIVE_WINDOW: usize = 5;

impl DerivativeFilter {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(DERIVATIVE_WINDOW),
        }
    }

    /// Filter one sample. Returns 0 until five samples have been seen.
    pub fn update(&mut self, x: f64) -> f64 {
        if self.buffer.len() == DERIVATIVE_WINDOW {
            self.buffer.pop_front();
        }
        self.buffer.push_back(x);

        if self.buffer.len() < DERIVATIVE_WINDOW {
            return 0.0;
        }

        // Window indices 0..4, oldest to newest
        (2.0 * self.buffer[4] + self.buffer[3] - self.buffer[1] - 2.0 * self.buffer[0]) / 8.0
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Moving-window integrator over ≈150 ms of squared derivative output.
#[derive(Debug, Clone)]
pub struct MovingWindowIntegrator {
    buffer: VecDeque<f64>,
    capacity: usize,
}

impl MovingWindowIntegrator {
    pub fn new(sampling_rate: f64) -> Self {
        let capacity = ((INTEGRATION_WINDOW_SECS * sampling_rate).round() as usize).max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Integrate one sample: arithmetic mean of the window, zero-padded
    /// while the window is still filling.
    pub fn update(&mut self, x: f64) -> f64 {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(x);

        self.buffer.iter().sum::<f64>() / self.capacity as f64
    }

    pub fn window_len(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// The full filter cascade: raw sample in, integrated QRS energy out.
#[derive(Debug, Clone)]
pub struct FilterCascade {
    low_pass: LowPassFilter,
    high_pass: HighPassFilter,
    derivative: DerivativeFilter,
    integrator: MovingWindowIntegrator,
}

impl FilterCascade {
    pub fn new(sampling_rate: f64) -> Self {
        Self {
            low_pass: LowPassFilter::new(sampling_rate),
            high_pass: HighPassFilter::new(sampling_rate),
            derivative: DerivativeFilter::new(),
            integrator: MovingWindowIntegrator::new(sampling_rate),
        }
    }

    /// Run one raw sample through every stage.
    ///
    /// The derivative output is squared before integration so that both
    /// slopes of the QRS complex contribute positive energy.
    pub fn update(&mut self, raw: f64) -> f64 {
        let lp = self.low_pass.update(raw);
        let hp = self.high_pass.update(lp);
        let slope = self.derivative.update(hp);
        self.integrator.update(slope * slope)
    }

    pub fn integration_window(&self) -> usize {
        self.integrator.window_len()
    }

    pub fn clear(&mut self) {
        self.low_pass.clear();
        self.high_pass.clear();
        self.derivative.clear();
        self.integrator.clear();
    }
}
