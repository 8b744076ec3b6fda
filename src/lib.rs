//! editgate - Approval-gated file editing for AI agents and humans.
//!
//! This library provides the core functionality for the `eg` CLI tool:
//! edits are planned against a fingerprinted version of a file, staged
//! behind an approval token, and only written once the caller confirms
//! and the file is verified unchanged.

pub mod action_log;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod committer;
pub mod config;
pub mod fileio;
pub mod gate;
pub mod lines;
pub mod mcp;
pub mod models;
pub mod planner;
pub mod service;
pub mod store;
pub mod version;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;


/// Stable, serializable classification of every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidRange,
    VersionConflict,
    TokenExpiredOrInvalid,
    ConfirmationMismatch,
    InvalidPattern,
    IoFailure,
    AccessDenied,
    InvalidInput,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidRange => "invalid_range",
            ErrorKind::VersionConflict => "version_conflict",
            ErrorKind::TokenExpiredOrInvalid => "token_expired_or_invalid",
            ErrorKind::ConfirmationMismatch => "confirmation_mismatch",
            ErrorKind::InvalidPattern => "invalid_pattern",
            ErrorKind::IoFailure => "io_failure",
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::InvalidInput => "invalid_input",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Library-level error type for editgate operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid line range: {0}")]
    InvalidRange(String),

    #[error(
        "Version conflict on {}: expected {expected}, found {actual}. Re-read the file and prepare the edit again.",
        .path.display()
    )]
    VersionConflict {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error(
        "Approval token is unknown or has expired. Prepare the edit again to obtain a fresh token."
    )]
    TokenExpiredOrInvalid,

    #[error("Confirmation mismatch: pass \"{expected}\" exactly to apply the edit")]
    ConfirmationMismatch { expected: &'static str },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Access denied: {} is outside the allowed roots", .0.display())]
    AccessDenied(PathBuf),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidRange(_) => ErrorKind::InvalidRange,
            Error::VersionConflict { .. } => ErrorKind::VersionConflict,
            Error::TokenExpiredOrInvalid => ErrorKind::TokenExpiredOrInvalid,
            Error::ConfirmationMismatch { .. } => ErrorKind::ConfirmationMismatch,
            Error::InvalidPattern(_) => ErrorKind::InvalidPattern,
            Error::Io(_) => ErrorKind::IoFailure,
            Error::AccessDenied(_) => ErrorKind::AccessDenied,
            Error::InvalidInput(_) | Error::Json(_) | Error::Config(_) => ErrorKind::InvalidInput,
        }
    }

    /// Map an IO error on `path`, turning `NotFound` into the domain variant.
    pub fn from_io(err: std::io::Error, path: &std::path::Path) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.to_path_buf())
        } else {
            Error::Io(err)
        }
    }
}

/// Result type alias for editgate operations.
pub type Result<T> = std::result::Result<T, Error>;
