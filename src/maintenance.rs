// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Triggers that run the sidecar purge while the server is up

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::CleanupConfig;
use crate::sidecar::{PurgeReport, Purger, TRIAGED_DIR};
use crate::watcher::{FileWatcher, WatchEvent};
use crate::{CompanionError, Result};

/// Delay between a sidecar appearing and the purge, so a burst of copies is
/// handled in one pass
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Run one purge on the blocking pool
pub async fn purge_now(purger: Arc<Purger>) -> Result<PurgeReport> {
    tokio::task::spawn_blocking(move || purger.run())
        .await
        .map_err(|e| CompanionError::Server(format!("Purge task failed: {}", e)))?
}

/// Log the outcome of a triggered purge; overlap is expected and not an error
fn log_outcome(trigger: &str, outcome: Result<PurgeReport>) {
    match outcome {
        Ok(report) if !report.is_clean() => {
            warn!("{} purge finished with failures: {}", trigger, report.summary());
        }
        Ok(_) => {}
        Err(CompanionError::CleanupInProgress(lock)) => {
            debug!("{} purge skipped, another run holds {:?}", trigger, lock);
        }
        Err(e) => error!("{} purge failed: {}", trigger, e),
    }
}

/// Start the configured background triggers. They stop when `shutdown`
/// flips to `true`.
pub fn spawn_triggers(
    purger: Arc<Purger>,
    config: &CleanupConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::new();

    if let Some(secs) = config.interval_secs {
        handles.push(spawn_interval(purger.clone(), Duration::from_secs(secs), shutdown.clone()));
    }

    if config.watch {
        handles.extend(spawn_watch(purger, shutdown)?);
    }

    Ok(handles)
}

fn spawn_interval(
    purger: Arc<Purger>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    info!("Sidecar purge scheduled every {:?}", period);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // the first tick fires immediately; startup purge already covers it
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    log_outcome("Scheduled", purge_now(purger.clone()).await);
                }
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
        }
        debug!("Interval purge trigger stopped");
    })
}

/// Watch `<root>/triaged_images` for new sidecars. A missing tree is not
/// created; the trigger is skipped until the next start.
fn spawn_watch(purger: Arc<Purger>, shutdown: watch::Receiver<bool>) -> Result<Option<JoinHandle<()>>> {
    let triaged = purger.root().join(TRIAGED_DIR);
    if !triaged.is_dir() {
        info!("Not watching for sidecars: {:?} does not exist", triaged);
        return Ok(None);
    }

    let mut watcher = FileWatcher::new()?;
    watcher.watch(&triaged)?;

    Ok(Some(tokio::task::spawn_blocking(move || {
        watch_loop(|timeout| watcher.next_event(timeout), &purger, &shutdown);
        debug!("Watch purge trigger stopped");
    })))
}

/// Pull events until shutdown or until the event source closes
fn watch_loop(
    mut next_event: impl FnMut(Duration) -> Option<WatchEvent>,
    purger: &Purger,
    shutdown: &watch::Receiver<bool>,
) {
    while !*shutdown.borrow() {
        match next_event(Duration::from_millis(200)) {
            Some(event) if event.is_new_sidecar(purger.matcher()) => {
                debug!("Sidecar appeared: {:?}", event);
                std::thread::sleep(SETTLE_DELAY);
                // drain whatever the burst queued up
                let mut closed = false;
                while let Some(queued) = next_event(Duration::from_millis(10)) {
                    if queued == WatchEvent::Closed {
                        closed = true;
                        break;
                    }
                }
                log_outcome("Watch", purger.run());
                if closed {
                    error!("File watcher closed, watch trigger stopping");
                    break;
                }
            }
            Some(WatchEvent::Closed) => {
                error!("File watcher closed, watch trigger stopping");
                break;
            }
            Some(WatchEvent::Error(e)) => warn!("Watch error: {}", e),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileSystem, MemoryFileSystem, OsFileSystem};
    use crate::sidecar::SidecarMatcher;
    use std::time::Instant;
    use std::path::Path;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_purge_now_runs_on_blocking_pool() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("res/triaged_images/a/b/x.png", b"");
        fs.add_file("res/triaged_images/a/b/x.png:Zone.Identifier", b"");
        let purger = Arc::new(Purger::new(fs.clone(), "res", SidecarMatcher::default()));

        let report = purge_now(purger).await.unwrap();
        assert_eq!(report.removed.len(), 1);
        assert!(!fs.exists(Path::new("res/triaged_images/a/b/x.png:Zone.Identifier")));
    }

    #[tokio::test]
    async fn test_interval_trigger_purges_and_stops() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_dir("res/triaged_images/a/b");
        let purger = Arc::new(Purger::new(fs.clone(), "res", SidecarMatcher::default()));
        let (tx, rx) = watch::channel(false);

        let config = CleanupConfig {
            interval_secs: Some(1),
            ..CleanupConfig::default()
        };
        let handles = spawn_triggers(purger, &config, rx).unwrap();
        assert_eq!(handles.len(), 1);

        let sidecar = Path::new("res/triaged_images/a/b/y.png:Zone.Identifier");
        fs.add_file(sidecar, b"");
        for _ in 0..40 {
            if !fs.exists(sidecar) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(!fs.exists(sidecar));

        tx.send(true).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_watch_trigger_stops_on_shutdown() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("triaged_images")).unwrap();
        let purger = Arc::new(Purger::new(Arc::new(OsFileSystem), temp.path(), SidecarMatcher::default()));
        let (tx, rx) = watch::channel(false);

        let config = CleanupConfig {
            watch: true,
            ..CleanupConfig::default()
        };
        let handles = spawn_triggers(purger, &config, rx).unwrap();
        assert_eq!(handles.len(), 1);

        tx.send(true).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[test]
    fn test_watch_skipped_when_triaged_dir_missing() {
        let temp = TempDir::new().unwrap();
        let purger = Arc::new(Purger::new(Arc::new(OsFileSystem), temp.path(), SidecarMatcher::default()));
        let (_tx, rx) = watch::channel(false);

        let config = CleanupConfig {
            watch: true,
            ..CleanupConfig::default()
        };
        let handles = spawn_triggers(purger, &config, rx).unwrap();
        assert!(handles.is_empty());
        assert!(!temp.path().join("triaged_images").exists());
    }

    #[test]
    fn test_watch_loop_ends_when_watcher_closes() {
        let purger = Purger::new(Arc::new(MemoryFileSystem::new()), "res", SidecarMatcher::default());
        let (_tx, rx) = watch::channel(false);

        let mut calls = 0;
        let started = Instant::now();
        watch_loop(
            |_| {
                calls += 1;
                Some(WatchEvent::Closed)
            },
            &purger,
            &rx,
        );
        assert_eq!(calls, 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_watch_loop_purges_after_sidecar_event() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("res/triaged_images/a/b/x.png:Zone.Identifier", b"");
        let purger = Purger::new(fs.clone(), "res", SidecarMatcher::default());
        let (_tx, rx) = watch::channel(false);

        let mut events = vec![
            WatchEvent::Closed,
            WatchEvent::Created("res/triaged_images/a/b/x.png:Zone.Identifier".into()),
        ];
        watch_loop(|_| events.pop(), &purger, &rx);
        assert!(!fs.exists(Path::new("res/triaged_images/a/b/x.png:Zone.Identifier")));
    }

    #[test]
    fn test_no_triggers_by_default() {
        let purger = Arc::new(Purger::new(Arc::new(MemoryFileSystem::new()), "res", SidecarMatcher::default()));
        let (_tx, rx) = watch::channel(false);
        let handles = spawn_triggers(purger, &CleanupConfig::default(), rx).unwrap();
        assert!(handles.is_empty());
    }
}
