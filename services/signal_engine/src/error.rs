//! Error types for the signal engine
//!
//! Insufficient indicator history and duplicate-suppressed dispatches are normal
//! outcomes, not errors; they live in [`crate::engine::CycleOutcome`] and
//! [`crate::dispatch::DispatchOutcome`] respectively. `EngineError` covers the
//! conditions the orchestration layer must react to.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or invalid configuration; fail fast, never retried.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Bar source unreachable after bounded retries.
    #[error("Upstream unavailable: {message}")]
    Upstream { message: String },

    /// Bar cache file could not be read or parsed.
    #[error("Bar cache error: {message}")]
    Cache { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
