//! Full-generation rebuild
//!
//! ```text
//! PortSource::discover ──► parse descriptor ──► reuse? ──yes──► stored files
//!                                                  │
//!                                                  no ──► PortSource::installed_files
//!                                                  ▼
//!                                  GenerationWriter (fresh id from 1)
//!                                                  │
//!                                     all lines consumed, not interrupted
//!                                                  ▼
//!                                            Store::commit
//! ```
//!
//! Any failure returns before the commit, leaving the current generation in
//! place. The half-written new generation is removed by the next
//! [`Store::cleanup_stale`] or overwritten by the next rebuild.

use crate::error::{Result, SearchError, SourceResult};
use crate::port::{Descriptor, Port};
use crate::rebuild::source::{is_file_entry, PortSource};
use crate::store::codec::parse_descriptor;
use crate::store::{GenerationWriter, PlistTable, PortTable, Snapshot, Store};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// When stored files of a port may be carried into the new generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReusePolicy {
    /// Reuse when the stored package name (which embeds the version) is
    /// unchanged
    #[default]
    Version,
    /// Reuse when every file defining the port is older than the moment the
    /// stored generation started being written
    Mtime,
    /// Always regenerate
    Never,
}

impl ReusePolicy {
    pub fn name(self) -> &'static str {
        match self {
            ReusePolicy::Version => "version",
            ReusePolicy::Mtime => "mtime",
            ReusePolicy::Never => "never",
        }
    }
}

impl fmt::Display for ReusePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReusePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "version" => Ok(ReusePolicy::Version),
            "mtime" => Ok(ReusePolicy::Mtime),
            "never" => Ok(ReusePolicy::Never),
            other => Err(format!("unknown reuse policy '{other}'")),
        }
    }
}

/// Result of a rebuild
#[derive(Debug, Clone, Default)]
pub struct RebuildStats {
    /// Ports written to the new generation
    pub ports: u64,

    /// Ports whose files came from the previous generation
    pub reused: u64,

    /// Ports whose files were extracted afresh
    pub regenerated: u64,

    /// Plist lines written
    pub files: u64,

    /// Whether a previous generation was available for reuse
    pub had_previous: bool,

    pub duration: Duration,
}

/// Progress information for display
#[derive(Debug, Clone, Default)]
pub struct RebuildProgress {
    pub ports: u64,
    pub reused: u64,
    pub regenerated: u64,
    pub files: u64,

    /// `category/port` being processed
    pub current: String,

    pub elapsed: Duration,
}

impl RebuildProgress {
    pub fn ports_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.ports as f64 / secs
        } else {
            0.0
        }
    }
}

/// Why a port's files were or were not reused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    /// No previous generation, or the port is not in it
    NotFound,
    /// Stored copy is stale
    Outdated,
    /// Stored files are still valid; carries the stored id
    Reuse(u32),
}

/// Stored generation opened for reuse decisions
struct Previous<'a> {
    ports: PortTable<'a>,
    plist: PlistTable<'a>,
}

/// Rebuilds a store's generation from a [`PortSource`]
pub struct Rebuilder<'s, S: PortSource> {
    store: &'s Store,
    source: &'s S,
    policy: ReusePolicy,
    shutdown: Arc<AtomicBool>,
}

impl<'s, S: PortSource> Rebuilder<'s, S> {
    pub fn new(store: &'s Store, source: &'s S) -> Self {
        Self {
            store,
            source,
            policy: ReusePolicy::default(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_policy(mut self, policy: ReusePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use an externally owned shutdown flag (e.g. set by a signal handler)
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn run(&self) -> Result<RebuildStats> {
        self.run_with_progress(|_| {})
    }

    /// Rebuild and commit, reporting after every port
    pub fn run_with_progress<F>(&self, mut on_progress: F) -> Result<RebuildStats>
    where
        F: FnMut(&RebuildProgress),
    {
        let start = Instant::now();

        let snapshot = if self.store.exists() {
            info!(dir = %self.store.current_dir().display(), "Using data from existing database");
            Some(self.store.snapshot()?)
        } else {
            info!("Previous database does not exist, creating from scratch");
            None
        };

        let previous = match &snapshot {
            Some(snap) => Some(open_previous(snap)?),
            None => None,
        };

        let mut writer = self.store.begin_generation()?;
        let mut progress = RebuildProgress::default();
        let mut next_id: u32 = 1;

        for (n, line) in self.source.discover()?.enumerate() {
            if self.shutdown.load(Ordering::Relaxed) {
                warn!(ports = progress.ports, "Rebuild interrupted before commit");
                return Err(SearchError::Interrupted);
            }

            let line = line?;
            if line.is_empty() {
                trace!(line = n + 1, "Skipping blank INDEX line");
                continue;
            }

            let descr = parse_descriptor(&line).map_err(|e| e.at(self.source.origin(), n + 1))?;

            let id = next_id;
            next_id += 1;

            let reused = self.add_port(&mut writer, id, &descr, previous.as_ref())?;

            progress.ports += 1;
            if reused {
                progress.reused += 1;
            } else {
                progress.regenerated += 1;
            }
            progress.files = writer.files_written();
            progress.current.clear();
            progress.current.push_str(descr.short_path());
            progress.elapsed = start.elapsed();
            on_progress(&progress);
        }

        if self.shutdown.load(Ordering::Relaxed) {
            warn!(ports = progress.ports, "Rebuild interrupted before commit");
            return Err(SearchError::Interrupted);
        }

        let had_previous = snapshot.is_some();
        drop(previous);
        drop(snapshot);

        self.store.commit(writer)?;

        Ok(RebuildStats {
            ports: progress.ports,
            reused: progress.reused,
            regenerated: progress.regenerated,
            files: progress.files,
            had_previous,
            duration: start.elapsed(),
        })
    }

    /// Write one port and its files; returns true if the files were reused
    fn add_port(
        &self,
        writer: &mut GenerationWriter,
        id: u32,
        descr: &Descriptor<'_>,
        previous: Option<&Previous<'_>>,
    ) -> Result<bool> {
        let spath = descr.short_path();
        info!("==> {spath}");
        debug!("===> {spath} INDEX version: {}", descr.pkgname);

        writer.add_port(id, descr)?;

        let decision = match previous {
            Some(prev) => match prev.ports.find_by_path(descr.path) {
                Some(stored) => self.decide(descr, stored)?,
                None => Decision::NotFound,
            },
            None => Decision::NotFound,
        };

        match (decision, previous) {
            (Decision::Reuse(stored_id), Some(prev)) => {
                debug!("===> {spath} using stored data");
                for file in prev.plist.files_for_port(stored_id) {
                    writer.add_file(id, file)?;
                }
                Ok(true)
            }
            (decision, _) => {
                match decision {
                    Decision::Outdated => debug!("===> {spath} outdated, recreating data"),
                    _ => debug!("===> {spath} not found in database, recreating data"),
                }
                let files = self.source.installed_files(descr.path).map_err(|e| {
                    // A signal to the whole process group also kills the child
                    if self.shutdown.load(Ordering::Relaxed) {
                        warn!(port = spath, error = %e, "Packing list extraction interrupted");
                        SearchError::Interrupted
                    } else {
                        SearchError::from(e)
                    }
                })?;
                for file in files {
                    if is_file_entry(&file) {
                        writer.add_file(id, &file)?;
                    }
                }
                Ok(false)
            }
        }
    }

    fn decide(&self, descr: &Descriptor<'_>, stored: &Port<'_>) -> SourceResult<Decision> {
        let spath = descr.short_path();
        debug!("===> {spath} database version: {}", stored.pkgname());

        let current = match self.policy {
            ReusePolicy::Version => stored.pkgname() == descr.pkgname,
            ReusePolicy::Mtime => {
                let mtime = self.source.port_mtime(descr.path)?;
                trace!(port = spath, mtime, stored = stored.mtime, "Comparing mtimes");
                // Same second as the stamp may postdate the extraction
                mtime < stored.mtime
            }
            ReusePolicy::Never => false,
        };

        Ok(if current {
            Decision::Reuse(stored.id)
        } else {
            Decision::Outdated
        })
    }
}

fn open_previous(snap: &Snapshot) -> Result<Previous<'_>> {
    Ok(Previous {
        ports: snap.ports()?,
        plist: snap.plist_lines()?,
    })
}
