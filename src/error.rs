// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for the companion server

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for companion operations
pub type Result<T> = std::result::Result<T, CompanionError>;

/// Companion error types
#[derive(Error, Debug)]
pub enum CompanionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Resource root is not a readable directory: {}", .0.display())]
    ResourceRoot(PathBuf),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Sidecar cleanup already running (lock: {})", .0.display())]
    CleanupInProgress(PathBuf),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Invalid game settings: {0}")]
    InvalidSettings(String),
}
