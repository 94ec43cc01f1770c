//! Dialog error types.

use scopeweave_core::ReactiveError;
use scopeweave_core::config::ConfigError;
use thiserror::Error;

/// Top-level error type for the dialog layer.
#[derive(Debug, Error)]
pub enum DialogError {
    /// A scope, channel or scheduler operation failed.
    #[error(transparent)]
    Reactive(#[from] ReactiveError),

    /// Configuration could not be read.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No choice carries the requested label.
    #[error("unknown choice: {0}")]
    UnknownChoice(String),

    /// The transcript could not be serialized.
    #[error("transcript serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
