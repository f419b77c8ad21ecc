//! Flat-file store for the ports index
//!
//! The store lives under one database directory, with one generation
//! directory per platform scheme:
//!
//! ```text
//! /var/db/portsearch/
//! ├── 14-amd64/          current generation
//! │   ├── index          id|pkgname|path|...|fdep
//! │   └── plist          id|file
//! ├── 14-amd64.new/      being built (only during a rebuild)
//! └── 14-amd64.old/      previous generation (only during a commit)
//! ```
//!
//! # Module Structure
//!
//! - `codec`: line encoding of index and plist records
//! - `files`: whole-file loads, generation writer, rename commit
//! - `loader`: in-memory images and the id-sorted tables built from them
//! - `lookup`: by-path, by-id and files-of-port lookups
//! - `scheme`: platform key naming the generation directory
//!
//! [`Store`] names the directories and drives a commit; [`Snapshot`] owns one
//! loaded generation.
//!
//! Only one writer is supported. Two concurrent rebuilds are not coordinated
//! and must be serialised by the caller.

pub mod codec;
pub mod files;
pub mod loader;
pub mod lookup;
pub mod scheme;

pub use files::{load_whole, GenerationWriter, INDEX_FILE, PLIST_FILE};
pub use loader::{PlistTable, PortTable, StoreImage};
pub use scheme::Scheme;

use crate::error::{IoOp, StoreError, StoreResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Handle on the generations of one platform scheme under a database directory
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    scheme: Scheme,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>, scheme: Scheme) -> Self {
        Self {
            root: root.into(),
            scheme,
        }
    }

    /// Database directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// Directory of the committed generation
    pub fn current_dir(&self) -> PathBuf {
        self.root.join(self.scheme.to_string())
    }

    /// Directory a rebuild writes into
    pub fn new_dir(&self) -> PathBuf {
        self.root.join(format!("{}.new", self.scheme))
    }

    /// Directory the current generation is moved to while committing
    pub fn old_dir(&self) -> PathBuf {
        self.root.join(format!("{}.old", self.scheme))
    }

    pub fn index_path(&self) -> PathBuf {
        self.current_dir().join(INDEX_FILE)
    }

    pub fn plist_path(&self) -> PathBuf {
        self.current_dir().join(PLIST_FILE)
    }

    /// True iff both files of the current generation exist
    pub fn exists(&self) -> bool {
        self.index_path().is_file() && self.plist_path().is_file()
    }

    /// Start writing a new generation
    ///
    /// Creates the database directory if needed and truncates any files left
    /// in the new-generation directory by an earlier, unfinished rebuild. The
    /// current generation is not touched until [`Store::commit`].
    pub fn begin_generation(&self) -> StoreResult<GenerationWriter> {
        let dir = self.new_dir();
        debug!(dir = %dir.display(), "Beginning new generation");
        GenerationWriter::create(&self.root, &dir)
    }

    /// Close the new generation's files and make it current
    pub fn commit(&self, writer: GenerationWriter) -> StoreResult<()> {
        let ports = writer.ports_written();
        let files = writer.files_written();

        let new = writer.finish()?;
        files::swap_generation(&new, &self.current_dir(), &self.old_dir())?;

        info!(
            ports,
            files,
            dir = %self.current_dir().display(),
            "Committed new generation"
        );
        Ok(())
    }

    /// Remove leftover new/old directories from an interrupted run
    ///
    /// Best effort: failures are logged, never returned. Must not run while a
    /// rebuild is in progress.
    pub fn cleanup_stale(&self) -> usize {
        let mut removed = 0;
        for dir in [self.old_dir(), self.new_dir()] {
            match files::remove_generation(&dir) {
                Ok(true) => {
                    info!(dir = %dir.display(), "Removed stale generation");
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Failed to remove stale generation"),
            }
        }
        removed
    }

    /// Time the current generation started being written (index file mtime)
    pub fn generation_mtime(&self) -> StoreResult<i64> {
        let path = self.index_path();
        let meta = fs::metadata(&path).map_err(|e| StoreError::io(IoOp::Stat, &path, e))?;
        Ok(files::mtime_secs(&meta))
    }

    /// Load both files of the current generation
    pub fn snapshot(&self) -> StoreResult<Snapshot> {
        Ok(Snapshot {
            index: self.load_index()?,
            plist: self.load_plist()?,
        })
    }

    /// Load the current index file whole
    pub fn load_index(&self) -> StoreResult<StoreImage> {
        StoreImage::load(&self.index_path())
    }

    /// Load the current plist file whole
    pub fn load_plist(&self) -> StoreResult<StoreImage> {
        StoreImage::load(&self.plist_path())
    }

    /// Bytes used by the current generation, if it exists
    pub fn size_on_disk(&self) -> Option<u64> {
        files::dir_size(&self.current_dir()).ok()
    }
}

/// One loaded generation
///
/// Owns both file images; the tables it hands out borrow from it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    index: StoreImage,
    plist: StoreImage,
}

impl Snapshot {
    pub fn new(index: StoreImage, plist: StoreImage) -> Self {
        Self { index, plist }
    }

    pub fn index(&self) -> &StoreImage {
        &self.index
    }

    pub fn plist(&self) -> &StoreImage {
        &self.plist
    }

    /// Decode the index into an id-sorted port table
    pub fn ports(&self) -> StoreResult<PortTable<'_>> {
        PortTable::parse(&self.index)
    }

    /// Decode the plist into an id-sorted line table
    pub fn plist_lines(&self) -> StoreResult<PlistTable<'_>> {
        PlistTable::parse(&self.plist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::codec::parse_descriptor;
    use tempfile::tempdir;

    const LINE: &str = "p1-1.0|/usr/ports/a/p1|/usr/local|first|/usr/ports/a/p1/pkg-descr|me@example.org|a|||https://example.org/|||";

    fn store(root: &Path) -> Store {
        Store::new(root.join("db"), Scheme::new("14", "amd64"))
    }

    #[test]
    fn test_layout() {
        let s = Store::new("/var/db/portsearch", Scheme::new("14", "amd64"));
        assert_eq!(s.current_dir(), PathBuf::from("/var/db/portsearch/14-amd64"));
        assert_eq!(s.new_dir(), PathBuf::from("/var/db/portsearch/14-amd64.new"));
        assert_eq!(s.old_dir(), PathBuf::from("/var/db/portsearch/14-amd64.old"));
        assert_eq!(s.index_path(), PathBuf::from("/var/db/portsearch/14-amd64/index"));
        assert_eq!(s.plist_path(), PathBuf::from("/var/db/portsearch/14-amd64/plist"));
    }

    #[test]
    fn test_begin_commit_load() {
        let tmp = tempdir().unwrap();
        let s = store(tmp.path());
        assert!(!s.exists());

        let descr = parse_descriptor(LINE).unwrap();
        let mut w = s.begin_generation().unwrap();
        w.add_port(1, &descr).unwrap();
        w.add_file(1, "bin/p1").unwrap();
        s.commit(w).unwrap();

        assert!(s.exists());
        assert!(!s.new_dir().exists());
        assert!(!s.old_dir().exists());

        let snap = s.snapshot().unwrap();
        let ports = snap.ports().unwrap();
        assert_eq!(ports.find_by_id(1).unwrap().descr, descr);

        let lines = snap.plist_lines().unwrap();
        assert_eq!(lines.files_for_port(1), vec!["bin/p1"]);

        assert!(s.generation_mtime().unwrap() > 0);
        assert!(s.size_on_disk().unwrap() > 0);
    }

    #[test]
    fn test_uncommitted_generation_leaves_current() {
        let tmp = tempdir().unwrap();
        let s = store(tmp.path());

        let descr = parse_descriptor(LINE).unwrap();
        let mut w = s.begin_generation().unwrap();
        w.add_port(1, &descr).unwrap();
        s.commit(w).unwrap();
        let before = fs::read(s.index_path()).unwrap();

        // Simulate a crash between begin and commit
        let mut w = s.begin_generation().unwrap();
        w.add_port(1, &descr).unwrap();
        w.add_port(2, &descr).unwrap();
        drop(w);

        assert!(s.exists());
        assert_eq!(fs::read(s.index_path()).unwrap(), before);
        assert!(s.new_dir().exists());

        assert_eq!(s.cleanup_stale(), 1);
        assert!(!s.new_dir().exists());
        assert!(s.exists());
    }

    #[test]
    fn test_schemes_do_not_collide() {
        let tmp = tempdir().unwrap();
        let amd64 = Store::new(tmp.path(), Scheme::new("14", "amd64"));
        let arm64 = Store::new(tmp.path(), Scheme::new("14", "arm64"));

        let w = amd64.begin_generation().unwrap();
        amd64.commit(w).unwrap();

        assert!(amd64.exists());
        assert!(!arm64.exists());
    }

    #[test]
    fn test_half_present_generation() {
        let tmp = tempdir().unwrap();
        let s = store(tmp.path());

        let w = s.begin_generation().unwrap();
        s.commit(w).unwrap();
        fs::remove_file(s.plist_path()).unwrap();

        // Index alone is not a generation
        assert!(s.index_path().is_file());
        assert!(!s.exists());

        let err = s.snapshot().unwrap_err();
        assert!(matches!(err, StoreError::Io { op: IoOp::Open, .. }));
        assert_eq!(crate::error::SearchError::from(err).exit_code(), crate::error::exit::NOINPUT);
    }
}
