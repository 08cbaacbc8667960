//! Error types for the strip viewer.

use efm_config::ConfigError;
use efm_reactive::ReactiveError;
use thiserror::Error;

/// Result type for viewer operations.
pub type Result<T> = std::result::Result<T, ViewerError>;

#[derive(Error, Debug)]
pub enum ViewerError {
    /// Store, component or render failure from the reactive core.
    #[error(transparent)]
    Reactive(#[from] ReactiveError),

    /// Viewer settings failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Strip configuration could not be read.
    #[error("failed to read strip configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Strip configuration is not valid JSON for the expected shape.
    #[error("failed to parse strip configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A strip's time range is unusable.
    #[error("strip '{id}' is invalid: {reason}")]
    InvalidStrip { id: String, reason: String },

    /// No strip with this id is configured.
    #[error("unknown strip: {0}")]
    UnknownStrip(String),

    /// State machine references an undeclared state.
    #[error("state machine: {0}")]
    InvalidMachine(String),

    /// An element the viewer needs has not been rendered.
    #[error("element not rendered: {0}")]
    MissingElement(String),

    /// Operation on a viewer that was torn down.
    #[error("viewer has been destroyed")]
    Destroyed,
}
