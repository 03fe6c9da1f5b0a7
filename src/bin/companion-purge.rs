// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Companion Purge Utility
//!
//! Removes `Zone.Identifier` sidecars from the triaged resource tree once,
//! without starting the server.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use companion::config::AppConfig;
use companion::fs::OsFileSystem;
use companion::logging;
use companion::sidecar::{Purger, SidecarMatcher};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "companion-purge")]
#[command(version)]
#[command(about = "Remove Zone.Identifier sidecars from the companion resources")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "COMPANION_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Resources root (overrides config)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Dry run - list the sidecars without deleting them
    #[arg(long)]
    dry_run: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(&args.config)
        .with_context(|| format!("Failed to load {:?}", args.config))?;
    let _log_guard = logging::init(logging::level_for(args.verbose, false, false), &config.logging)?;
    if !args.config.exists() {
        info!("Config file not found at {:?}, using defaults", args.config);
    }
    let root = args.root.unwrap_or(config.resources.root);
    let matcher = SidecarMatcher::from_patterns(&config.cleanup.patterns)?;
    let purger = Purger::new(Arc::new(OsFileSystem), &root, matcher);

    if args.dry_run {
        let scan = purger.dry_run()?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&scan)?);
        } else {
            println!("[DRY RUN] {} sidecar(s) under {:?}", scan.sidecars.len(), root);
            for sidecar in &scan.sidecars {
                println!("  {}", sidecar.path.display());
            }
            for failure in &scan.failures {
                eprintln!("  unreadable: {} ({})", failure.path.display(), failure.error);
            }
        }
        return Ok(());
    }

    let report = purger
        .run()
        .with_context(|| format!("Purge of {:?} did not run", root))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for path in &report.removed {
            println!("  removed {}", path.display());
        }
        for failure in &report.failures {
            eprintln!("  FAILED {}: {}", failure.path.display(), failure.error);
        }
        println!("{}", report.summary());
    }

    if !report.is_clean() {
        bail!("{} sidecar(s) could not be removed", report.failures.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purge_flags() {
        let args = Args::try_parse_from(["companion-purge", "--root", "res", "--dry-run", "--json", "-v"]).unwrap();
        assert_eq!(args.root, Some(PathBuf::from("res")));
        assert!(args.dry_run && args.json && args.verbose);
    }
}
