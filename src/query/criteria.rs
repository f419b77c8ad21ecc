//! Search fields and the per-port criteria bitmask

use crate::error::{QueryError, QueryResult};
use crate::port::Descriptor;
use bitflags::bitflags;
use regex::{Regex, RegexBuilder};
use std::fmt;

bitflags! {
    /// Set of search criteria, one bit per [`SearchField`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Criteria: u32 {
        const FILE  = 0o000001;
        const NAME  = 0o000002;
        const KEY   = 0o000004;
        const PATH  = 0o000010;
        const INFO  = 0o000020;
        const MAINT = 0o000040;
        const CAT   = 0o000100;
        const FDEP  = 0o000200;
        const EDEP  = 0o000400;
        const PDEP  = 0o001000;
        const BDEP  = 0o002000;
        const RDEP  = 0o004000;
        const DEP   = 0o010000;
        const WWW   = 0o020000;
    }
}

/// What a single search criterion is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    /// Installed file names
    File,
    /// Package name
    Name,
    /// Name, comment or any dependency
    Key,
    /// Port path
    Path,
    /// One-line comment
    Info,
    /// Maintainer
    Maint,
    /// Categories
    Cat,
    /// Fetch dependencies
    Fdep,
    /// Extract dependencies
    Edep,
    /// Patch dependencies
    Pdep,
    /// Build dependencies
    Bdep,
    /// Run dependencies
    Rdep,
    /// Any dependency
    Dep,
    /// Website
    Www,
}

impl SearchField {
    pub const ALL: [SearchField; 14] = [
        SearchField::File,
        SearchField::Name,
        SearchField::Key,
        SearchField::Path,
        SearchField::Info,
        SearchField::Maint,
        SearchField::Cat,
        SearchField::Fdep,
        SearchField::Edep,
        SearchField::Pdep,
        SearchField::Bdep,
        SearchField::Rdep,
        SearchField::Dep,
        SearchField::Www,
    ];

    /// Bit this field sets in a port's matched mask
    pub fn flag(self) -> Criteria {
        match self {
            SearchField::File => Criteria::FILE,
            SearchField::Name => Criteria::NAME,
            SearchField::Key => Criteria::KEY,
            SearchField::Path => Criteria::PATH,
            SearchField::Info => Criteria::INFO,
            SearchField::Maint => Criteria::MAINT,
            SearchField::Cat => Criteria::CAT,
            SearchField::Fdep => Criteria::FDEP,
            SearchField::Edep => Criteria::EDEP,
            SearchField::Pdep => Criteria::PDEP,
            SearchField::Bdep => Criteria::BDEP,
            SearchField::Rdep => Criteria::RDEP,
            SearchField::Dep => Criteria::DEP,
            SearchField::Www => Criteria::WWW,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SearchField::File => "file",
            SearchField::Name => "name",
            SearchField::Key => "key",
            SearchField::Path => "path",
            SearchField::Info => "info",
            SearchField::Maint => "maint",
            SearchField::Cat => "cat",
            SearchField::Fdep => "fdep",
            SearchField::Edep => "edep",
            SearchField::Pdep => "pdep",
            SearchField::Bdep => "bdep",
            SearchField::Rdep => "rdep",
            SearchField::Dep => "dep",
            SearchField::Www => "www",
        }
    }

    /// True if `re` matches this field (or any of its fields) of `d`
    ///
    /// Always false for [`SearchField::File`], which is matched against the
    /// plist instead.
    pub fn is_match(self, re: &Regex, d: &Descriptor<'_>) -> bool {
        match self {
            SearchField::File => false,
            SearchField::Name => re.is_match(d.pkgname),
            SearchField::Key => {
                re.is_match(d.pkgname)
                    || re.is_match(d.comment)
                    || d.dependencies().iter().any(|f| re.is_match(f))
            }
            SearchField::Path => re.is_match(d.path),
            SearchField::Info => re.is_match(d.comment),
            SearchField::Maint => re.is_match(d.maintainer),
            SearchField::Cat => re.is_match(d.categories),
            SearchField::Fdep => re.is_match(d.fdep),
            SearchField::Edep => re.is_match(d.edep),
            SearchField::Pdep => re.is_match(d.pdep),
            SearchField::Bdep => re.is_match(d.bdep),
            SearchField::Rdep => re.is_match(d.rdep),
            SearchField::Dep => d.dependencies().iter().any(|f| re.is_match(f)),
            SearchField::Www => re.is_match(d.www),
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compile the pattern of one criterion
pub fn compile_pattern(field: SearchField, pattern: &str, icase: bool) -> QueryResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(icase)
        .build()
        .map_err(|e| QueryError::InvalidPattern {
            field: field.name(),
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}
