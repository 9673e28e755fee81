//! Pulsetrace - on-device real-time ECG QRS detection and heart-rate derivation
//!
//! Pulsetrace turns a noisy, streaming single-lead ECG sample sequence into
//! heartbeats and heart rate through a deterministic per-sample pipeline:
//! cascaded filtering → adaptive dual-threshold peak detection → peak
//! registration and rate estimation.
//!
//! ## Modules
//!
//! - **Filters**: low-pass, high-pass, derivative, and moving-window
//!   integration stages shaping raw samples into a QRS-energy envelope
//! - **Detector**: adaptive signal/noise threshold state machine with
//!   warm-up calibration, refractory gating, and drift recovery
//! - **Registry**: append-only peak history, RR window, BPM and HRV metrics
//! - **Processor**: the session controller tying the stages together
//!
//! The transport layer feeding samples, waveform rendering, and session
//! persistence are external collaborators; this crate only assumes samples
//! arrive strictly in order at a fixed, known sampling rate.

pub mod detector;
pub mod error;
pub mod filters;
pub mod processor;
pub mod registry;
pub mod smoothing;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use detector::AdaptiveThresholdDetector;
pub use error::ProcessorError;
pub use filters::FilterCascade;
pub use processor::EcgProcessor;
pub use registry::PeakRegistry;
pub use types::{DetectionMode, RPeak, SessionStats, SessionSummary};

/// Pulsetrace version embedded in session summaries and CLI output
pub const PULSETRACE_VERSION: &str = env!("CARGO_PKG_VERSION");
