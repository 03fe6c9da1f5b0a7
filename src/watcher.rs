// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! File system watcher over the resource tree

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;
use tracing::info;

use crate::sidecar::SidecarMatcher;
use crate::Result;

/// Events emitted by the watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A new file or directory appeared
    Created(PathBuf),
    /// An entry was modified or renamed
    Modified(PathBuf),
    /// Watcher error
    Error(String),
    /// The notify backend is gone; no further events will arrive
    Closed,
}

impl WatchEvent {
    /// True if the event means a sidecar may now exist
    pub fn is_new_sidecar(&self, matcher: &SidecarMatcher) -> bool {
        let path = match self {
            WatchEvent::Created(p) | WatchEvent::Modified(p) => p,
            _ => return false,
        };
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| matcher.matches(name))
    }
}

/// Recursive watcher on one directory tree
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: Receiver<notify::Result<Event>>,
}

impl FileWatcher {
    /// Create a new file watcher
    pub fn new() -> Result<Self> {
        let (tx, rx) = channel();

        let config = Config::default()
            .with_poll_interval(Duration::from_secs(2));

        let watcher = RecommendedWatcher::new(tx, config)?;

        Ok(Self {
            watcher,
            event_rx: rx,
        })
    }

    /// Watch an existing tree recursively
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        self.watcher.watch(path, RecursiveMode::Recursive)?;
        info!("Watching for sidecars: {:?}", path);

        Ok(())
    }

    /// Get the next event (blocking with timeout)
    pub fn next_event(&self, timeout: Duration) -> Option<WatchEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(Ok(event)) => Self::convert_event(event),
            Ok(Err(e)) => Some(WatchEvent::Error(e.to_string())),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => None,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => Some(WatchEvent::Closed),
        }
    }

    /// Convert notify event to our event type
    fn convert_event(event: Event) -> Option<WatchEvent> {
        match event.kind {
            EventKind::Create(_) => {
                event.paths.last().map(|p| WatchEvent::Created(p.clone()))
            }
            // renames report [from, to]; the destination is what matters
            EventKind::Modify(_) => {
                event.paths.last().map(|p| WatchEvent::Modified(p.clone()))
            }
            // removals never create a sidecar
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};

    #[test]
    fn test_convert_create_event() {
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/r/triaged_images/a/b/x.png:Zone.Identifier"));
        let converted = FileWatcher::convert_event(event).unwrap();
        assert!(converted.is_new_sidecar(&SidecarMatcher::default()));
    }

    #[test]
    fn test_rename_uses_destination() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/r/tmp123"))
            .add_path(PathBuf::from("/r/x.png:Zone.Identifier"));
        assert_eq!(
            FileWatcher::convert_event(event),
            Some(WatchEvent::Modified(PathBuf::from("/r/x.png:Zone.Identifier")))
        );
    }

    #[test]
    fn test_removal_is_not_a_new_sidecar() {
        let event = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/r/x.png:Zone.Identifier"));
        assert_eq!(FileWatcher::convert_event(event), None);

        let plain = WatchEvent::Created(PathBuf::from("/r/x.png"));
        assert!(!plain.is_new_sidecar(&SidecarMatcher::default()));
    }

    #[test]
    fn test_watch_leaves_missing_tree_alone() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("triaged_images");
        let mut watcher = FileWatcher::new().unwrap();

        assert!(watcher.watch(&missing).is_err());
        assert!(!missing.exists());
    }
}
