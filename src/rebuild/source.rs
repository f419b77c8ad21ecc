//! Where fresh port data comes from
//!
//! A rebuild needs three things from the outside world: the raw INDEX lines
//! describing every port, the packing list of a port, and (for the mtime
//! reuse policy) when a port's definition last changed. [`PortSource`] is
//! that seam; [`PortsTree`] implements it against a checked-out ports tree
//! by running `make`.

use crate::error::{SourceError, SourceResult};
use crate::store::files::mtime_secs;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

/// Packing-list lines starting with this byte are directives, not files
pub const DIRECTIVE_MARKER: char = '@';

/// Globs, relative to a port directory, of the files that define a port
const CRUCIAL_FILES: [&str; 3] = ["Makefile*", "pkg-plist*", "files*"];

/// Supplier of fresh port data for a rebuild
pub trait PortSource {
    /// Where the descriptor lines come from, for diagnostics
    fn origin(&self) -> &Path;

    /// Every raw descriptor line, in INDEX order, without the newline
    fn discover(&self) -> SourceResult<Box<dyn Iterator<Item = SourceResult<String>> + '_>>;

    /// Packing list of the port at `path`, directives included
    fn installed_files(&self, path: &str) -> SourceResult<Vec<String>>;

    /// Newest modification time (seconds since the epoch) among the files
    /// defining the port at `path`
    fn port_mtime(&self, path: &str) -> SourceResult<i64>;
}

/// True if a packing-list line is a plain file name
pub fn is_file_entry(line: &str) -> bool {
    !line.is_empty() && !line.starts_with(DIRECTIVE_MARKER)
}

/// A ports tree on the local filesystem
#[derive(Debug, Clone)]
pub struct PortsTree {
    portsdir: PathBuf,
    datadir: PathBuf,
    index: PathBuf,
}

impl PortsTree {
    /// Locate the tree's INDEX file with `make -V INDEXFILE`
    pub fn locate(portsdir: impl Into<PathBuf>, datadir: impl Into<PathBuf>) -> SourceResult<Self> {
        let portsdir = portsdir.into();

        let mut cmd = Command::new("make");
        cmd.arg("-C").arg(&portsdir).args(["-V", "INDEXFILE"]);
        let out = run_lines(cmd)?;

        let name = out
            .into_iter()
            .rev()
            .find(|l| !l.is_empty())
            .ok_or_else(|| SourceError::Io {
                path: portsdir.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "make -V INDEXFILE printed nothing",
                ),
            })?;

        let index = portsdir.join(name);
        debug!(index = %index.display(), "Located ports INDEX");
        Ok(Self::with_index(portsdir, datadir, index))
    }

    /// Use an explicit INDEX file
    pub fn with_index(
        portsdir: impl Into<PathBuf>,
        datadir: impl Into<PathBuf>,
        index: impl Into<PathBuf>,
    ) -> Self {
        Self {
            portsdir: portsdir.into(),
            datadir: datadir.into(),
            index: index.into(),
        }
    }

    pub fn portsdir(&self) -> &Path {
        &self.portsdir
    }

    /// Helper makefile with the `show-plist` target
    pub fn helper_makefile(&self) -> PathBuf {
        self.datadir.join("Makefile")
    }
}

impl PortSource for PortsTree {
    fn origin(&self) -> &Path {
        &self.index
    }

    fn discover(&self) -> SourceResult<Box<dyn Iterator<Item = SourceResult<String>> + '_>> {
        let file = File::open(&self.index).map_err(|e| SourceError::Io {
            path: self.index.clone(),
            source: e,
        })?;

        let path = self.index.clone();
        let lines = BufReader::new(file).lines().map(move |line| {
            line.map_err(|e| SourceError::Io {
                path: path.clone(),
                source: e,
            })
        });

        Ok(Box::new(lines))
    }

    fn installed_files(&self, path: &str) -> SourceResult<Vec<String>> {
        let port = Path::new(path);

        let mut cmd = Command::new("make");
        cmd.arg("-C")
            .arg(port)
            .arg("-f")
            .arg(self.helper_makefile())
            .arg("-f")
            .arg(port.join("Makefile"))
            .arg("show-plist");

        let lines = run_lines(cmd)?;
        trace!(port = path, lines = lines.len(), "Extracted packing list");
        Ok(lines)
    }

    fn port_mtime(&self, path: &str) -> SourceResult<i64> {
        newest_mtime(Path::new(path))
    }
}

/// Newest mtime among a port directory's crucial files
pub fn newest_mtime(port: &Path) -> SourceResult<i64> {
    let base = glob::Pattern::escape(&port.to_string_lossy());
    let mut newest = None;

    for pattern in CRUCIAL_FILES {
        let pattern = format!("{base}/{pattern}");
        let entries = glob::glob(&pattern).map_err(|e| SourceError::Io {
            path: port.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e.msg),
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| SourceError::Io {
                path: e.path().to_path_buf(),
                source: e.into_error(),
            })?;
            let meta = fs::metadata(&entry).map_err(|e| SourceError::Io {
                path: entry.clone(),
                source: e,
            })?;
            let mtime = mtime_secs(&meta);
            newest = Some(newest.map_or(mtime, |n: i64| n.max(mtime)));
        }
    }

    newest.ok_or_else(|| SourceError::NoCrucialFiles {
        path: port.to_path_buf(),
    })
}

/// Run a command and collect its stdout lines
///
/// Stderr is passed through. A non-zero exit or death by signal is an error.
fn run_lines(mut cmd: Command) -> SourceResult<Vec<String>> {
    let command = describe(&cmd);
    trace!(command = %command, "Running");

    let output = cmd
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .map_err(|e| SourceError::Spawn {
            command: command.clone(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(match output.status.code() {
            Some(code) => SourceError::Exited { command, code },
            None => SourceError::Signaled { command },
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_owned)
        .collect())
}

fn describe(cmd: &Command) -> String {
    let mut s = cmd.get_program().to_string_lossy().into_owned();
    for arg in cmd.get_args() {
        s.push(' ');
        s.push_str(&arg.to_string_lossy());
    }
    s
}
