//! Error types for portsearch
//!
//! This module defines the error hierarchy that covers:
//! - Store I/O and corruption errors (index and plist files)
//! - Query errors (bad patterns, bad criteria)
//! - Errors from the ports tree (external `make` invocations)
//! - Configuration and CLI errors
//!
//! Nothing in the core recovers from these locally. Every variant maps to a
//! BSD `sysexits(3)` status via [`SearchError::exit_code`] so that the binary
//! exits the way the rest of the base system tools do.

use std::path::PathBuf;
use thiserror::Error;

/// `sysexits(3)` status codes used by the binary
pub mod exit {
    pub const USAGE: u8 = 64;
    pub const DATAERR: u8 = 65;
    pub const NOINPUT: u8 = 66;
    pub const UNAVAILABLE: u8 = 69;
    pub const OSERR: u8 = 71;
    pub const CANTCREAT: u8 = 73;
    pub const IOERR: u8 = 74;
    pub const INTERRUPTED: u8 = 130;
}

/// Top-level error type for portsearch
#[derive(Error, Debug)]
pub enum SearchError {
    /// Store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Query errors
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Ports tree errors
    #[error("Ports tree error: {0}")]
    Source(#[from] SourceError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rebuild cancelled before commit
    #[error("Rebuild interrupted by signal, previous database left in place")]
    Interrupted,
}

impl SearchError {
    /// Exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            SearchError::Store(e) => e.exit_code(),
            SearchError::Query(_) | SearchError::Config(_) => exit::USAGE,
            SearchError::Source(e) => e.exit_code(),
            SearchError::Interrupted => exit::INTERRUPTED,
        }
    }
}

/// What a store I/O operation was doing when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Open,
    Read,
    Create,
    Write,
    Sync,
    Rename,
    Remove,
    Stat,
}

impl std::fmt::Display for IoOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IoOp::Open => "open",
            IoOp::Read => "read",
            IoOp::Create => "create",
            IoOp::Write => "write",
            IoOp::Sync => "sync",
            IoOp::Rename => "rename",
            IoOp::Remove => "remove",
            IoOp::Stat => "stat",
        };
        f.write_str(s)
    }
}

/// Errors from the on-disk store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("Failed to {op} '{path}': {source}")]
    Io {
        op: IoOp,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Fewer (or more) bytes read than the file reports
    #[error("Short read on '{path}': expected {expected} bytes, got {actual}")]
    ShortRead {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Store file is not valid UTF-8
    #[error("'{path}' is not valid UTF-8 near byte {offset}")]
    InvalidUtf8 { path: PathBuf, offset: usize },

    /// Last record of a file without its terminating newline
    #[error("{path}:{line}: record not terminated")]
    Unterminated { path: PathBuf, line: usize },

    /// Record without the id/descriptor separator
    #[error("{path}:{line}: record separator missing")]
    MissingSeparator { path: PathBuf, line: usize },

    /// Record id is not an unsigned integer
    #[error("{path}:{line}: invalid port id '{id}'")]
    InvalidId {
        path: PathBuf,
        line: usize,
        id: String,
    },

    /// Descriptor with the wrong number of fields
    #[error("{path}:{line}: cannot parse INDEX line for {pkgname}: expected {expected} fields, found {found}")]
    FieldCount {
        path: PathBuf,
        line: usize,
        pkgname: String,
        expected: usize,
        found: usize,
    },

    /// Plist references an id the index does not contain
    #[error("Port id {id} referenced from the plist is missing from the index")]
    UnknownPortId { id: u32 },
}

impl StoreError {
    /// Build an I/O error with path context
    pub fn io(op: IoOp, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// True if this error means the store contents cannot be trusted
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidUtf8 { .. }
                | StoreError::Unterminated { .. }
                | StoreError::MissingSeparator { .. }
                | StoreError::InvalidId { .. }
                | StoreError::FieldCount { .. }
                | StoreError::UnknownPortId { .. }
        )
    }

    /// Attach file and line context to a codec error that was raised without it
    pub(crate) fn at(self, path: &std::path::Path, line: usize) -> Self {
        match self {
            StoreError::MissingSeparator { .. } => StoreError::MissingSeparator {
                path: path.to_path_buf(),
                line,
            },
            StoreError::InvalidId { id, .. } => StoreError::InvalidId {
                path: path.to_path_buf(),
                line,
                id,
            },
            StoreError::FieldCount {
                pkgname,
                expected,
                found,
                ..
            } => StoreError::FieldCount {
                path: path.to_path_buf(),
                line,
                pkgname,
                expected,
                found,
            },
            other => other,
        }
    }

    fn exit_code(&self) -> u8 {
        match self {
            StoreError::Io { op, .. } => match op {
                IoOp::Open | IoOp::Stat => exit::NOINPUT,
                IoOp::Create | IoOp::Rename => exit::CANTCREAT,
                _ => exit::IOERR,
            },
            StoreError::ShortRead { .. } => exit::IOERR,
            _ => exit::DATAERR,
        }
    }
}

/// Errors from the ports tree collaborator
#[derive(Error, Debug)]
pub enum SourceError {
    /// Could not start an external command
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// External command exited with a non-zero status
    #[error("{command}: exited with error {code}")]
    Exited { command: String, code: i32 },

    /// External command was killed by a signal
    #[error("{command}: exited on signal")]
    Signaled { command: String },

    /// Port directory has none of the files that define it
    #[error("No crucial files found in {path}")]
    NoCrucialFiles { path: PathBuf },

    /// Reading ports tree files failed
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    fn exit_code(&self) -> u8 {
        match self {
            SourceError::Spawn { .. } => exit::UNAVAILABLE,
            SourceError::Exited { code, .. } => u8::try_from(*code).unwrap_or(exit::OSERR),
            SourceError::Signaled { .. } => exit::OSERR,
            SourceError::NoCrucialFiles { .. } => exit::NOINPUT,
            SourceError::Io { .. } => exit::IOERR,
        }
    }
}

/// Query construction errors
#[derive(Error, Debug)]
pub enum QueryError {
    /// Pattern failed to compile
    #[error("Invalid {field} pattern '{pattern}': {reason}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        reason: String,
    },

    /// The same field was given twice
    #[error("Search criterion '{field}' given more than once")]
    DuplicateCriterion { field: &'static str },

    /// Nothing to search for
    #[error("No search criteria given")]
    NoCriteria,

    /// Unknown output field name
    #[error("Unknown output field '{name}'")]
    UnknownOutputField { name: String },

    /// File criterion evaluated without the plist loaded
    #[error("File search needs the plist, but none was loaded")]
    PlistRequired,
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Update requested together with search criteria
    #[error("Cannot update the database and search at the same time")]
    ConflictingModes,

    /// Neither update nor search requested
    #[error("Nothing to do: give -u to update the database or a search criterion")]
    NoMode,

    /// Scheme override is malformed
    #[error("Invalid scheme '{scheme}': expected <release-major>-<machine>")]
    InvalidScheme { scheme: String },

    /// Platform detection failed
    #[error("Cannot determine platform scheme: {reason}")]
    SchemeDetection { reason: String },
}

/// Result type alias for SearchError
pub type Result<T> = std::result::Result<T, SearchError>;

/// Result type alias for StoreError
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for SourceError
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Result type alias for QueryError
pub type QueryResult<T> = std::result::Result<T, QueryError>;
