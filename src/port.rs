//! Port records and plist lines
//!
//! Every string in these types borrows from one owned buffer: either a store
//! file loaded whole into memory, or a single INDEX line read from the ports
//! tree during a rebuild. Records are cheap views and never copy field text.

use crate::query::Criteria;
use std::borrow::Cow;

/// Number of `|`-separated fields in a ports INDEX descriptor
pub const DESCRIPTOR_FIELDS: usize = 13;

/// Separator between descriptor fields, and between id and payload
pub const FIELD_SEPARATOR: u8 = b'|';

/// Record terminator in both store files
pub const RECORD_SEPARATOR: u8 = b'\n';

/// One INDEX line split into its fields, in on-disk order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor<'a> {
    pub pkgname: &'a str,
    pub path: &'a str,
    pub prefix: &'a str,
    pub comment: &'a str,
    pub pkgdescr: &'a str,
    pub maintainer: &'a str,
    pub categories: &'a str,
    pub bdep: &'a str,
    pub rdep: &'a str,
    pub www: &'a str,
    pub edep: &'a str,
    pub pdep: &'a str,
    pub fdep: &'a str,
}

impl<'a> Descriptor<'a> {
    /// Fields in on-disk order
    pub fn fields(&self) -> [&'a str; DESCRIPTOR_FIELDS] {
        [
            self.pkgname,
            self.path,
            self.prefix,
            self.comment,
            self.pkgdescr,
            self.maintainer,
            self.categories,
            self.bdep,
            self.rdep,
            self.www,
            self.edep,
            self.pdep,
            self.fdep,
        ]
    }

    /// Build from fields in on-disk order
    pub fn from_fields(f: [&'a str; DESCRIPTOR_FIELDS]) -> Self {
        Self {
            pkgname: f[0],
            path: f[1],
            prefix: f[2],
            comment: f[3],
            pkgdescr: f[4],
            maintainer: f[5],
            categories: f[6],
            bdep: f[7],
            rdep: f[8],
            www: f[9],
            edep: f[10],
            pdep: f[11],
            fdep: f[12],
        }
    }

    /// All dependency fields: fetch, extract, patch, build, run
    pub fn dependencies(&self) -> [&'a str; 5] {
        [self.fdep, self.edep, self.pdep, self.bdep, self.rdep]
    }

    /// Whitespace-separated category list
    pub fn category_list(&self) -> impl Iterator<Item = &'a str> {
        self.categories.split_ascii_whitespace()
    }

    /// `category/port` part of the path, as shown in logs
    pub fn short_path(&self) -> &'a str {
        let mut slashes = self.path.rmatch_indices('/');
        match (slashes.next(), slashes.next()) {
            (Some(_), Some((idx, _))) => &self.path[idx + 1..],
            _ => self.path,
        }
    }
}

/// One indexed port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port<'a> {
    /// Dense id, unique within one generation
    pub id: u32,

    /// Last modification of the port definition (seconds since the epoch)
    pub mtime: i64,

    /// Descriptor fields
    pub descr: Descriptor<'a>,

    /// Criteria this port satisfied in the current query; never persisted
    pub matched: Criteria,

    /// Installed files, in packing-list order
    pub files: Vec<Cow<'a, str>>,
}

impl<'a> Port<'a> {
    pub fn new(id: u32, descr: Descriptor<'a>) -> Self {
        Self {
            id,
            mtime: 0,
            descr,
            matched: Criteria::empty(),
            files: Vec::new(),
        }
    }

    /// Stable identifying key across generations
    pub fn path(&self) -> &'a str {
        self.descr.path
    }

    pub fn pkgname(&self) -> &'a str {
        self.descr.pkgname
    }
}

/// One (port id, installed file) pair from the plist file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlistLine<'a> {
    pub port_id: u32,
    pub file: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Descriptor<'static> {
        Descriptor::from_fields([
            "zsh-5.9",
            "/usr/ports/shells/zsh",
            "/usr/local",
            "The Z shell",
            "/usr/ports/shells/zsh/pkg-descr",
            "ports@FreeBSD.org",
            "shells",
            "gmake-4.4",
            "libiconv-1.17",
            "https://www.zsh.org/",
            "",
            "",
            "",
        ])
    }

    #[test]
    fn test_fields_order() {
        let d = sample();
        let f = d.fields();
        assert_eq!(f[0], "zsh-5.9");
        assert_eq!(f[6], "shells");
        assert_eq!(Descriptor::from_fields(f), d);
    }

    #[test]
    fn test_short_path() {
        assert_eq!(sample().short_path(), "shells/zsh");

        let mut d = sample();
        d.path = "zsh";
        assert_eq!(d.short_path(), "zsh");
    }

    #[test]
    fn test_category_list() {
        let mut d = sample();
        d.categories = "shells  lang";
        let cats: Vec<_> = d.category_list().collect();
        assert_eq!(cats, vec!["shells", "lang"]);
    }
}
