// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Companion: local-network server for the Arkham Horror companion app
//!
//! Serves the triaged image resources and the app package over HTTP, hosts
//! the shared game session on the `/game` WebSocket, and purges the
//! `Zone.Identifier` sidecars that Windows copies leave in the resource tree.

pub mod config;
pub mod error;
pub mod fs;
pub mod game;
pub mod logging;
pub mod maintenance;
pub mod resources;
pub mod sidecar;
pub mod watcher;
pub mod web;

pub use config::AppConfig;
pub use error::{CompanionError, Result};
