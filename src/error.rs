//! Error types for pulsetrace

use thiserror::Error;

/// Errors surfaced to the caller.
///
/// The per-sample path is deliberately infallible: every raw value, however
/// noisy, yields a `(filtered, is_peak)` pair. Only misconfiguration at
/// construction time is reported as an error.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Invalid sampling rate: {0} Hz (must be positive)")]
    InvalidSamplingRate(f64),

    #[error("Invalid window capacity: {0}")]
    InvalidWindowCapacity(usize),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
