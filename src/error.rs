//! Error types for the game

use thiserror::Error;

use crate::game::Phase;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Game runtime stopped")]
    Stopped,
}

/// Catalog loading errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Failed to read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Malformed catalog file {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("Catalog is empty")]
    Empty,
}

/// Metadata lookup errors
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("No preview found for {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Playback controller errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Retry is only possible while playback is blocked")]
    NotBlocked,

    #[error("No candidate is loaded")]
    NothingLoaded,
}

/// Session-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Not enough candidates: need {needed}, only {available} left")]
    InsufficientCandidates { needed: usize, available: usize },

    #[error("Session halted: {0}")]
    Halted(String),

    #[error("{action} is not accepted while {phase:?}")]
    InvalidAction { action: &'static str, phase: Phase },

    #[error("Candidate {0} is not a revealed candidate of this round")]
    UnknownCandidate(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
