//! File I/O primitives for the store
//!
//! - Whole-file loads with a size check against the file's metadata
//! - The writer for a new generation directory
//! - The directory-rename commit that promotes a new generation
//!
//! A generation is one directory holding an `index` and a `plist` file.
//! Directory rename is the only atomicity primitive used: readers see the old
//! generation or the new one, never a mix of the two.

use crate::error::{IoOp, StoreError, StoreResult};
use crate::port::Descriptor;
use crate::store::codec;
use std::fs::{self, File, Metadata};
use std::io::{self, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Index file name inside a generation directory
pub const INDEX_FILE: &str = "index";

/// Plist file name inside a generation directory
pub const PLIST_FILE: &str = "plist";

/// Buffer size for generation writers
const WRITE_BUFFER_SIZE: usize = 256 * 1024;

/// Read a whole file into memory
///
/// Fails if the number of bytes read differs from the size the file reported
/// when it was opened, which catches truncation or a concurrent writer.
pub fn load_whole(path: &Path) -> StoreResult<Vec<u8>> {
    load_whole_with_metadata(path).map(|(bytes, _)| bytes)
}

/// Like [`load_whole`], also returning the metadata the size was checked against
pub fn load_whole_with_metadata(path: &Path) -> StoreResult<(Vec<u8>, Metadata)> {
    let mut file = File::open(path).map_err(|e| StoreError::io(IoOp::Open, path, e))?;
    let meta = file.metadata().map_err(|e| StoreError::io(IoOp::Stat, path, e))?;
    let bytes = check_full_read(&mut file, &meta, path)?;
    Ok((bytes, meta))
}

/// Read `file` to the end, failing unless exactly `meta.len()` bytes arrive
fn check_full_read(file: &mut File, meta: &Metadata, path: &Path) -> StoreResult<Vec<u8>> {
    let expected = meta.len();
    let mut bytes = Vec::with_capacity(expected as usize);
    file.read_to_end(&mut bytes)
        .map_err(|e| StoreError::io(IoOp::Read, path, e))?;

    if bytes.len() as u64 != expected {
        return Err(StoreError::ShortRead {
            path: path.to_path_buf(),
            expected,
            actual: bytes.len() as u64,
        });
    }

    Ok(bytes)
}

/// Modification time of a file's metadata, in seconds since the epoch
pub fn mtime_secs(meta: &Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Writer for the index and plist files of a new generation
///
/// The index file is stamped with the time the writer was created, so a port
/// edited while the generation was being written compares newer than it.
pub struct GenerationWriter {
    dir: PathBuf,
    started: SystemTime,
    index_path: PathBuf,
    plist_path: PathBuf,
    index: BufWriter<File>,
    plist: BufWriter<File>,
    ports_written: u64,
    files_written: u64,
}

impl GenerationWriter {
    /// Create `dir` (tolerating an existing one) and truncate its files
    pub(crate) fn create(root: &Path, dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(root).map_err(|e| StoreError::io(IoOp::Create, root, e))?;

        match fs::create_dir(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(dir = %dir.display(), "Reusing stale new-generation directory");
            }
            Err(e) => return Err(StoreError::io(IoOp::Create, dir, e)),
        }

        let started = SystemTime::now();
        let index_path = dir.join(INDEX_FILE);
        let plist_path = dir.join(PLIST_FILE);

        let index = create_truncated(&index_path)?;
        let plist = create_truncated(&plist_path)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            started,
            index_path,
            plist_path,
            index,
            plist,
            ports_written: 0,
            files_written: 0,
        })
    }

    /// Append one port record
    pub fn add_port(&mut self, id: u32, descr: &Descriptor<'_>) -> StoreResult<()> {
        codec::write_index_record(&mut self.index, id, descr)
            .map_err(|e| StoreError::io(IoOp::Write, &self.index_path, e))?;
        self.ports_written += 1;
        Ok(())
    }

    /// Append one installed file of port `id`
    pub fn add_file(&mut self, id: u32, file: &str) -> StoreResult<()> {
        codec::write_plist_line(&mut self.plist, id, file)
            .map_err(|e| StoreError::io(IoOp::Write, &self.plist_path, e))?;
        self.files_written += 1;
        Ok(())
    }

    pub fn ports_written(&self) -> u64 {
        self.ports_written
    }

    pub fn files_written(&self) -> u64 {
        self.files_written
    }

    /// Directory this generation is being written into
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// When this generation started being written
    pub fn started(&self) -> SystemTime {
        self.started
    }

    /// Flush and sync both files, closing them
    pub(crate) fn finish(self) -> StoreResult<PathBuf> {
        close_synced(self.index, &self.index_path, Some(self.started))?;
        close_synced(self.plist, &self.plist_path, None)?;
        Ok(self.dir)
    }
}

fn create_truncated(path: &Path) -> StoreResult<BufWriter<File>> {
    let file = File::create(path).map_err(|e| StoreError::io(IoOp::Create, path, e))?;
    Ok(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file))
}

fn close_synced(writer: BufWriter<File>, path: &Path, stamp: Option<SystemTime>) -> StoreResult<()> {
    let file = writer
        .into_inner()
        .map_err(|e| StoreError::io(IoOp::Write, path, e.into_error()))?;
    if let Some(time) = stamp {
        file.set_modified(time)
            .map_err(|e| StoreError::io(IoOp::Write, path, e))?;
    }
    file.sync_all().map_err(|e| StoreError::io(IoOp::Sync, path, e))
}

/// Promote `new` to `current`, keeping `old` only for the duration of the swap
///
/// `current` may be absent on the first ever build. A leftover `old` from an
/// earlier crash is removed first.
pub(crate) fn swap_generation(new: &Path, current: &Path, old: &Path) -> StoreResult<()> {
    remove_generation(old)?;

    match fs::rename(current, old) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(dir = %current.display(), "No current generation to retire");
        }
        Err(e) => return Err(StoreError::io(IoOp::Rename, current, e)),
    }

    fs::rename(new, current).map_err(|e| StoreError::io(IoOp::Rename, new, e))?;

    if let Some(parent) = current.parent() {
        sync_dir(parent);
    }

    retire_generation(old);
    Ok(())
}

/// Remove the generation a commit just replaced
///
/// The new generation is already current, so a failure only leaves a stray
/// directory for the next update to clear.
fn retire_generation(old: &Path) {
    if let Err(e) = remove_generation(old) {
        warn!(error = %e, "Failed to remove retired generation");
    }
}

/// Remove a generation directory, returning whether it existed
pub(crate) fn remove_generation(dir: &Path) -> StoreResult<bool> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(IoOp::Remove, dir, e)),
    }
}

/// Total size of the files in a directory (non-recursive)
pub(crate) fn dir_size(dir: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let meta = entry?.metadata()?;
        if meta.is_file() {
            total += meta.len();
        }
    }
    Ok(total)
}

/// Best-effort fsync of a directory so renames inside it are durable
fn sync_dir(dir: &Path) {
    let result = File::open(dir).and_then(|d| d.sync_all());
    if let Err(e) = result {
        warn!(dir = %dir.display(), error = %e, "Failed to sync directory");
    }
}
