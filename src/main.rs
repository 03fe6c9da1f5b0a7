// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Companion: local-network server for the Arkham Horror companion app
//!
//! Serves the triaged card images, the app package and the shared game
//! session, and keeps the resource tree free of `Zone.Identifier` sidecars.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use companion::config::AppConfig;
use companion::fs::OsFileSystem;
use companion::maintenance;
use companion::sidecar::{Purger, SidecarMatcher};
use companion::web::{self, AppState};
use companion::{logging, Result};

/// Companion CLI - Arkham Horror companion server
#[derive(Parser, Debug)]
#[command(name = "companion")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Local-network server for the Arkham Horror companion app", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, env = "COMPANION_CONFIG", default_value = "config.json", global = true)]
    config: PathBuf,

    /// Host to bind to (overrides config)
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the server (default)
    Serve {
        /// Skip the sidecar purge before the listener starts
        #[arg(long)]
        no_startup_purge: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("companion: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(&cli.config)?.with_overrides(cli.host, cli.port);

    let level = logging::level_for(cli.verbose, cli.trace, cli.quiet);
    let _log_guard = logging::init(level, &config.logging)?;
    if !cli.config.exists() {
        info!("Config file not found at {:?}, using defaults", cli.config);
    }

    match cli.command {
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::Serve { no_startup_purge }) => run_serve(config, no_startup_purge).await,
        None => run_serve(config, false).await,
    }
}

/// Startup purge, background triggers, then the listener until a signal
async fn run_serve(config: AppConfig, no_startup_purge: bool) -> Result<()> {
    config.validate()?;
    info!("Companion v{}", env!("CARGO_PKG_VERSION"));

    let state = Arc::new(AppState::new(config.clone())?);
    let listener = web::bind(&config.server).await?;

    let matcher = SidecarMatcher::from_patterns(&config.cleanup.patterns)?;
    let purger = Arc::new(Purger::new(Arc::new(OsFileSystem), &config.resources.root, matcher));

    if config.cleanup.on_startup && !no_startup_purge {
        match maintenance::purge_now(purger.clone()).await {
            Ok(report) if report.is_clean() => info!("Startup purge: {}", report.summary()),
            Ok(report) => warn!("Startup purge: {}", report.summary()),
            Err(e) => warn!("Startup purge skipped: {}", e),
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let triggers = maintenance::spawn_triggers(purger, &config.cleanup, shutdown_rx.clone())?;

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutting down...");
        let _ = shutdown_tx.send(true);
    });

    let served = web::serve(listener, web::create_router(state), shutdown_rx).await;

    for trigger in triggers {
        if let Err(e) = trigger.await {
            warn!("Cleanup trigger ended abnormally: {}", e);
        }
    }

    served
}

#[cfg(unix)]
async fn wait_for_signal() {
    let mut terminate = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            let _ = signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = signal::ctrl_c().await;
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Listen address: {}", config.server.address());
            println!("  Resources: {:?}", config.resources.triaged_dir());
            match &config.apk.path {
                Some(apk) => println!("  APK: {:?}", apk),
                None => println!("  APK: not configured"),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_entrypoint_flags() {
        let cli = Cli::try_parse_from(["companion", "--host", "0.0.0.0", "--port", "8000"]).unwrap();
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(cli.port, Some(8000));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_serve_subcommand_with_global_flags() {
        let cli = Cli::try_parse_from(["companion", "serve", "--no-startup-purge", "-p", "8081", "-v"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve { no_startup_purge: true })));
        assert_eq!(cli.port, Some(8081));
        assert!(cli.verbose);
    }

    #[test]
    fn test_config_generate_output() {
        let cli = Cli::try_parse_from(["companion", "config", "generate", "-o", "out.json"]).unwrap();
        match cli.command {
            Some(Commands::Config { action: ConfigCommands::Generate { output } }) => {
                assert_eq!(output, PathBuf::from("out.json"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_bad_port_rejected() {
        assert!(Cli::try_parse_from(["companion", "--port", "70000"]).is_err());
        assert!(Cli::try_parse_from(["companion", "--port", "http"]).is_err());
    }
}
