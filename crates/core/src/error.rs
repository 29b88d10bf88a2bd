//! # Errors
//!
//! Error type shared by the platform registry, the Core/Unit contracts and the bots.

use thiserror::Error;

/// The main error type for Legionn operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Registry Errors ===
    /// A Unit with this name is already registered in the Core.
    #[error("Unit \"{unit}\" is already in Core \"{core}\"")]
    DuplicateUnit { core: String, unit: String },

    /// A Core with this name is already registered in the platform.
    #[error("Core \"{0}\" is already placed in Legionn")]
    DuplicateCore(String),

    #[error("Core {0} not found")]
    CoreNotFound(String),

    #[error("Unit {unit} not found in Core {core}")]
    UnitNotFound { core: String, unit: String },

    // === Request Errors ===
    /// The Core or Unit does not implement the requested operation.
    #[error("{0} is not implemented")]
    Unsupported(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // === Upstream Errors ===
    /// The conversational-AI service failed or answered garbage.
    #[error("chatbot error: {0}")]
    Chatbot(String),

    /// The XMPP session failed.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Configuration / IO ===
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used across `legionn_core`.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported(operation.into())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn chatbot(message: impl Into<String>) -> Self {
        Self::Chatbot(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// True for lookups that missed (unknown core or unit).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CoreNotFound(_) | Self::UnitNotFound { .. })
    }
}
