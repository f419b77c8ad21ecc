//! Platform scheme key
//!
//! Store generations are kept apart per OS release major version and machine
//! architecture, e.g. `14-amd64`, so a shared database directory can serve
//! several platforms without their index/plist pairs colliding.

use crate::error::ConfigError;
use std::ffi::CStr;
use std::fmt;
use std::str::FromStr;

/// `<release-major>-<machine>` key naming one platform's generation directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scheme {
    release_major: String,
    machine: String,
}

impl Scheme {
    pub fn new(release_major: impl Into<String>, machine: impl Into<String>) -> Self {
        Self {
            release_major: release_major.into(),
            machine: machine.into(),
        }
    }

    /// Detect the running platform using `uname(2)`
    pub fn detect() -> Result<Self, ConfigError> {
        let mut un: libc::utsname = unsafe { std::mem::zeroed() };

        // SAFETY: `un` is a valid, writable utsname and uname only writes into it
        if unsafe { libc::uname(&mut un) } == -1 {
            return Err(ConfigError::SchemeDetection {
                reason: std::io::Error::last_os_error().to_string(),
            });
        }

        // SAFETY: uname NUL-terminates every field it fills
        let release = unsafe { CStr::from_ptr(un.release.as_ptr()) }.to_string_lossy();
        let machine = unsafe { CStr::from_ptr(un.machine.as_ptr()) }.to_string_lossy();

        Ok(Self::from_uname(&release, &machine))
    }

    /// Build from `uname -r` / `uname -m` style strings
    pub fn from_uname(release: &str, machine: &str) -> Self {
        let major: String = release.chars().take_while(|c| c.is_ascii_digit()).collect();
        Self::new(major, machine.trim())
    }

    pub fn release_major(&self) -> &str {
        &self.release_major
    }

    pub fn machine(&self) -> &str {
        &self.machine
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.release_major, self.machine)
    }
}

impl FromStr for Scheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidScheme { scheme: s.to_string() };

        let (major, machine) = s.split_once('-').ok_or_else(invalid)?;
        if major.is_empty()
            || !major.chars().all(|c| c.is_ascii_digit())
            || machine.is_empty()
            || machine.contains('/')
        {
            return Err(invalid());
        }

        Ok(Self::new(major, machine))
    }
}
