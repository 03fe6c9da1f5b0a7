// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Cleanup of `Zone.Identifier` sidecar files
//!
//! Copying files off a Windows host (for example into WSL or over a shared
//! drive) leaves an alternate-data-stream shadow next to every downloaded
//! file: `a.png:Zone.Identifier`, or `a.png%3AZone.Identifier` depending on
//! the tool. They carry no image data. The purge walks
//! `<root>/triaged_images/` and deletes every entry whose name matches one of
//! the configured patterns, leaving all other files alone.

use chrono::{DateTime, Utc};
use glob::Pattern;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::fs::FileSystem;
use crate::{CompanionError, Result};

/// Directory under the resource root holding `<category>/<item>/<file>`
pub const TRIAGED_DIR: &str = "triaged_images";

/// Pattern for the Windows mark-of-the-web sidecar
pub const ZONE_IDENTIFIER_PATTERN: &str = "*Zone.Identifier*";

/// Lock file created in the resource root while a purge runs
pub const LOCK_FILE: &str = ".companion-purge.lock";

/// A lock older than this is taken over whatever its owner
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
enum Rule {
    /// The stock `*Zone.Identifier*` pattern, matched without glob
    ZoneIdentifier,
    Glob(Pattern),
}

/// Decides whether a single path component is a sidecar
#[derive(Debug, Clone)]
pub struct SidecarMatcher {
    rules: Vec<Rule>,
}

impl SidecarMatcher {
    /// Build from glob patterns; an invalid pattern is a configuration error
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        if patterns.is_empty() {
            return Err(CompanionError::Config(
                "at least one sidecar pattern is required".to_string(),
            ));
        }
        let rules = patterns
            .iter()
            .map(|p| match p.as_ref() {
                ZONE_IDENTIFIER_PATTERN => Ok(Rule::ZoneIdentifier),
                other => Pattern::new(other).map(Rule::Glob).map_err(|e| {
                    CompanionError::Config(format!("Invalid sidecar pattern {:?}: {}", other, e))
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// The built-in `*Zone.Identifier*` matcher
    pub fn zone_identifier() -> Self {
        Self {
            rules: vec![Rule::ZoneIdentifier],
        }
    }

    /// True if `name` (one path component) is a sidecar
    pub fn matches(&self, name: &str) -> bool {
        self.rules.iter().any(|rule| match rule {
            Rule::ZoneIdentifier => is_sidecar(name),
            Rule::Glob(pattern) => pattern.matches(name),
        })
    }

    /// True if any component of `path` is a sidecar
    pub fn matches_path(&self, path: &str) -> bool {
        path.split(['/', '\\'])
            .filter(|segment| !segment.is_empty())
            .any(|segment| self.matches(segment))
    }
}

/// True if the path component is a `Zone.Identifier` sidecar
pub fn is_sidecar(name: &str) -> bool {
    name.contains("Zone.Identifier")
}

impl Default for SidecarMatcher {
    fn default() -> Self {
        Self::zone_identifier()
    }
}

/// A sidecar found by [`find_sidecars`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sidecar {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// An entry that could not be listed or removed
#[derive(Debug, Clone, Serialize)]
pub struct PurgeFailure {
    pub path: PathBuf,
    pub error: String,
}

/// What a scan saw, before anything is deleted
#[derive(Debug, Clone, Default, Serialize)]
pub struct SidecarScan {
    pub scanned: usize,
    pub sidecars: Vec<Sidecar>,
    pub failures: Vec<PurgeFailure>,
}

/// Outcome of a purge
#[derive(Debug, Clone, Serialize)]
pub struct PurgeReport {
    pub root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub scanned: usize,
    pub removed: Vec<PathBuf>,
    pub failures: Vec<PurgeFailure>,
}

impl PurgeReport {
    fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            started_at: Utc::now(),
            scanned: 0,
            removed: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// True when nothing failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line summary for logs and the CLI
    pub fn summary(&self) -> String {
        format!(
            "scanned {} entries under {}, removed {} sidecar(s), {} failure(s)",
            self.scanned,
            self.root.display(),
            self.removed.len(),
            self.failures.len()
        )
    }
}

/// List the sidecars under `<root>/triaged_images` without touching them.
///
/// A missing root yields an empty scan. Directories that cannot be listed are
/// recorded as failures and skipped.
pub fn find_sidecars(fs: &dyn FileSystem, root: &Path, matcher: &SidecarMatcher) -> SidecarScan {
    let mut scan = SidecarScan::default();
    let triaged = root.join(TRIAGED_DIR);
    if !fs.is_dir(&triaged) {
        debug!("No resource tree at {:?}, nothing to scan", triaged);
        return scan;
    }
    walk(fs, &triaged, matcher, &mut scan);
    scan
}

fn walk(fs: &dyn FileSystem, dir: &Path, matcher: &SidecarMatcher, scan: &mut SidecarScan) {
    let entries = match fs.read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list {:?}: {}", dir, e);
            scan.failures.push(PurgeFailure {
                path: dir.to_path_buf(),
                error: e.to_string(),
            });
            return;
        }
    };

    for entry in entries {
        scan.scanned += 1;
        if matcher.matches(&entry.name()) {
            scan.sidecars.push(Sidecar {
                path: entry.path,
                is_dir: entry.is_dir,
            });
        } else if entry.is_dir {
            walk(fs, &entry.path, matcher, scan);
        }
    }
}

/// Delete every sidecar under `<root>/triaged_images`.
///
/// Never aborts half way: each failed removal is logged and recorded in the
/// report, and the remaining sidecars are still removed. Running it again
/// with no new sidecars removes nothing.
pub fn purge_sidecars(fs: &dyn FileSystem, root: &Path, matcher: &SidecarMatcher) -> PurgeReport {
    let mut report = PurgeReport::empty(root);
    let scan = find_sidecars(fs, root, matcher);
    report.scanned = scan.scanned;
    report.failures = scan.failures;

    for sidecar in scan.sidecars {
        let removed = if sidecar.is_dir {
            fs.remove_dir_all(&sidecar.path)
        } else {
            fs.remove_file(&sidecar.path)
        };
        match removed {
            Ok(()) => {
                debug!("Removed sidecar {:?}", sidecar.path);
                report.removed.push(sidecar.path);
            }
            Err(e) => {
                warn!("Failed to remove sidecar {:?}: {}", sidecar.path, e);
                report.failures.push(PurgeFailure {
                    path: sidecar.path,
                    error: e.to_string(),
                });
            }
        }
    }

    report
}

/// Runs purges for one resource root, refusing overlapping runs.
///
/// Overlap is detected in-process with a flag and across processes with a
/// lock file in the resource root.
pub struct Purger {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    matcher: SidecarMatcher,
    running: AtomicBool,
}

impl Purger {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>, matcher: SidecarMatcher) -> Self {
        Self {
            fs,
            root: root.into(),
            matcher,
            running: AtomicBool::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn matcher(&self) -> &SidecarMatcher {
        &self.matcher
    }

    /// Path of the cross-process lock file
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Purge once. Fails with [`CompanionError::CleanupInProgress`] if
    /// another run holds the flag or the lock file.
    pub fn run(&self) -> Result<PurgeReport> {
        let _guard = self.acquire()?;
        let report = purge_sidecars(self.fs.as_ref(), &self.root, &self.matcher);
        if report.removed.is_empty() && report.is_clean() {
            debug!("Sidecar purge: {}", report.summary());
        } else {
            info!("Sidecar purge: {}", report.summary());
        }
        Ok(report)
    }

    /// List sidecars without deleting, under the same guard
    pub fn dry_run(&self) -> Result<SidecarScan> {
        let _guard = self.acquire()?;
        Ok(find_sidecars(self.fs.as_ref(), &self.root, &self.matcher))
    }

    fn acquire(&self) -> Result<PurgeGuard<'_>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CompanionError::CleanupInProgress(self.lock_path()));
        }

        match self.take_lock() {
            Ok(holds_lock) => Ok(PurgeGuard {
                purger: self,
                holds_lock,
            }),
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Create the lock file, replacing it once if its owner is gone.
    /// No root means nothing to purge and nowhere to put the lock.
    fn take_lock(&self) -> Result<bool> {
        if !self.fs.is_dir(&self.root) {
            return Ok(false);
        }

        let lock = self.lock_path();
        let stamp = format!("{} {}\n", std::process::id(), Utc::now().to_rfc3339());
        for attempt in 0..2 {
            match self.fs.create_new(&lock, stamp.as_bytes()) {
                Ok(()) => return Ok(true),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let content = self.fs.read_file(&lock).unwrap_or_default();
                    let content = String::from_utf8_lossy(&content);
                    if attempt > 0 || !lock_is_stale(&content, Utc::now()) {
                        return Err(CompanionError::CleanupInProgress(lock));
                    }
                    warn!("Taking over stale purge lock {:?} ({})", lock, content.trim());
                    match self.fs.remove_file(&lock) {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => return Err(CompanionError::FileSystem(e)),
                    }
                }
                Err(e) => return Err(CompanionError::FileSystem(e)),
            }
        }
        Err(CompanionError::CleanupInProgress(lock))
    }
}

/// A lock is stale when its owner process is gone, when it is older than
/// [`STALE_LOCK_AGE`], when it names this process (whose own flag is already
/// held), or when its contents cannot be read back. An empty lock is being
/// written and is left alone.
fn lock_is_stale(content: &str, now: DateTime<Utc>) -> bool {
    if content.trim().is_empty() {
        return false;
    }
    let mut fields = content.split_whitespace();
    let pid = fields.next().and_then(|f| f.parse::<u32>().ok());
    let stamp = fields
        .next()
        .and_then(|f| DateTime::parse_from_rfc3339(f).ok())
        .map(|t| t.with_timezone(&Utc));
    let (Some(pid), Some(stamp)) = (pid, stamp) else {
        return true;
    };

    if pid == std::process::id() {
        return true;
    }
    let age = now.signed_duration_since(stamp).to_std().unwrap_or_default();
    if age > STALE_LOCK_AGE {
        return true;
    }
    process_alive(pid) == Some(false)
}

/// Whether `pid` is running, when the platform can tell cheaply
#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> Option<bool> {
    Some(Path::new("/proc").join(pid.to_string()).exists())
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> Option<bool> {
    None
}

struct PurgeGuard<'a> {
    purger: &'a Purger,
    holds_lock: bool,
}

impl Drop for PurgeGuard<'_> {
    fn drop(&mut self) {
        if self.holds_lock {
            let lock = self.purger.lock_path();
            if let Err(e) = self.purger.fs.remove_file(&lock) {
                warn!("Failed to release purge lock {:?}: {}", lock, e);
            }
        }
        self.purger.running.store(false, Ordering::Release);
    }
}
