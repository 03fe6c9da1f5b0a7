// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for the companion server

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::sidecar::SidecarMatcher;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Where the triaged resource tree lives
    #[serde(default)]
    pub resources: ResourceConfig,

    /// Packaged mobile application served at `/app.apk`
    #[serde(default)]
    pub apk: ApkConfig,

    /// Sidecar cleanup triggers
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResourceConfig {
    #[serde(default = "default_resource_root")]
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ApkConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CleanupConfig {
    /// Purge once before the listener starts
    #[serde(default = "default_true")]
    pub on_startup: bool,
    /// Purge periodically; `None` disables the timer
    #[serde(default)]
    pub interval_secs: Option<u64>,
    /// Purge whenever the watcher sees a new sidecar
    #[serde(default)]
    pub watch: bool,
    /// Glob patterns matched against single path components
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Also write JSON lines to daily-rotated `<dir>/server.<date>.log`
    #[serde(default)]
    pub file: bool,
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    /// Rotated files kept before the oldest is deleted
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_resource_root() -> PathBuf { PathBuf::from("resources") }
fn default_true() -> bool { true }
fn default_patterns() -> Vec<String> { vec![crate::sidecar::ZONE_IDENTIFIER_PATTERN.to_string()] }
fn default_log_dir() -> PathBuf { PathBuf::from("logs") }
fn default_max_log_files() -> usize { 5 }

impl ServerConfig {
    /// Port used by the earlier TLS WebSocket-only deployment
    pub const LEGACY_PORT: u16 = 8081;

    /// `host:port` as handed to the listener
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ResourceConfig {
    /// `<root>/triaged_images`
    pub fn triaged_dir(&self) -> PathBuf {
        self.root.join(crate::sidecar::TRIAGED_DIR)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            root: default_resource_root(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            on_startup: true,
            interval_secs: None,
            watch: false,
            patterns: default_patterns(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: false,
            dir: default_log_dir(),
            max_files: default_max_log_files(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file; a missing file gives the
    /// defaults. Runs before logging is up, so callers report the fallback.
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::CompanionError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `--host` / `--port` overrides from the command line
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }

    /// Check the parts of the config that can be wrong without failing to parse
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(crate::CompanionError::Config("server.host must not be empty".to_string()));
        }
        if self.cleanup.interval_secs == Some(0) {
            return Err(crate::CompanionError::Config(
                "cleanup.interval_secs must be greater than zero".to_string(),
            ));
        }
        SidecarMatcher::from_patterns(&self.cleanup.patterns)?;
        Ok(())
    }
}
