// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for candle-interp.

/// Errors that can occur during interpretability operations.
#[derive(Debug, thiserror::Error)]
pub enum InterpError {
    /// Tensor operation error (wraps candle).
    #[error("model error: {0}")]
    Model(#[from] candle_core::Error),

    /// Error reported by a hook body.
    #[error("hook error: {0}")]
    Hook(String),

    /// Model configuration parsing error.
    #[error("config error: {0}")]
    Config(String),

    /// Operation not supported for the given model architecture.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for candle-interp operations.
pub type Result<T> = std::result::Result<T, InterpError>;
