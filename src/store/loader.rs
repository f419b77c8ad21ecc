//! Loading store files into memory
//!
//! Each file is read whole into one [`StoreImage`]. The tables built from it
//! hold `&str` views into that image, so the image must outlive them; the
//! borrow checker enforces this through the `'a` lifetime on every table.

use crate::error::{StoreError, StoreResult};
use crate::port::{PlistLine, Port, RECORD_SEPARATOR};
use crate::store::codec;
use crate::store::files::{load_whole_with_metadata, mtime_secs};
use memchr::memchr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One store file loaded whole into memory
#[derive(Debug, Clone)]
pub struct StoreImage {
    path: PathBuf,
    text: String,
    mtime: i64,
}

impl StoreImage {
    /// Read `path` whole and validate it as UTF-8
    pub fn load(path: &Path) -> StoreResult<Self> {
        let (bytes, meta) = load_whole_with_metadata(path)?;
        let text = String::from_utf8(bytes).map_err(|e| StoreError::InvalidUtf8 {
            path: path.to_path_buf(),
            offset: e.utf8_error().valid_up_to(),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            text,
            mtime: mtime_secs(&meta),
        })
    }

    /// Wrap text that did not come from disk
    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>, mtime: i64) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            mtime,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Modification time of the file when it was loaded
    pub fn mtime(&self) -> i64 {
        self.mtime
    }

    /// Newline-terminated records with their 1-based line numbers
    pub fn records(&self) -> Records<'_> {
        Records {
            text: &self.text,
            path: &self.path,
            pos: 0,
            line: 0,
        }
    }
}

/// Iterator over the records of a [`StoreImage`]
pub struct Records<'a> {
    text: &'a str,
    path: &'a Path,
    pos: usize,
    line: usize,
}

impl<'a> Iterator for Records<'a> {
    type Item = StoreResult<(usize, &'a str)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.text.len() {
            return None;
        }

        self.line += 1;
        let rest = &self.text.as_bytes()[self.pos..];

        match memchr(RECORD_SEPARATOR, rest) {
            Some(len) => {
                let record = &self.text[self.pos..self.pos + len];
                self.pos += len + 1;
                Some(Ok((self.line, record)))
            }
            None => {
                self.pos = self.text.len();
                Some(Err(StoreError::Unterminated {
                    path: self.path.to_path_buf(),
                    line: self.line,
                }))
            }
        }
    }
}

/// All ports of one generation, sorted by id
///
/// Slots may be empty (`None`); empty slots sort before every port and are
/// skipped by every accessor.
#[derive(Debug, Clone, Default)]
pub struct PortTable<'a> {
    pub(crate) slots: Vec<Option<Port<'a>>>,
}

impl<'a> PortTable<'a> {
    /// Decode every record of an index image
    ///
    /// A blank line leaves an empty slot. Loaded ports take the image's
    /// modification time as their `mtime`.
    pub fn parse(image: &'a StoreImage) -> StoreResult<Self> {
        let mut slots = Vec::new();

        for record in image.records() {
            let (line, text) = record?;
            if text.is_empty() {
                slots.push(None);
                continue;
            }

            let mut port = codec::decode_index_record(text).map_err(|e| e.at(image.path(), line))?;
            port.mtime = image.mtime();
            slots.push(Some(port));
        }

        let mut table = Self { slots };
        table.sort();
        debug!(path = %image.path().display(), ports = table.len(), "Loaded index");
        Ok(table)
    }

    /// Build from ports already in memory
    pub fn from_ports(ports: impl IntoIterator<Item = Port<'a>>) -> Self {
        let mut table = Self {
            slots: ports.into_iter().map(Some).collect(),
        };
        table.sort();
        table
    }

    /// Stable sort by id, empty slots first
    fn sort(&mut self) {
        self.slots.sort_by_key(|slot| slot.as_ref().map(|p| p.id));
    }

    /// Number of ports present
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Ports in id order
    pub fn iter(&self) -> impl Iterator<Item = &Port<'a>> {
        self.slots.iter().flatten()
    }

    /// Mutable ports in id order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Port<'a>> {
        self.slots.iter_mut().flatten()
    }

    /// Consume the table, yielding ports in id order
    pub fn into_ports(self) -> impl Iterator<Item = Port<'a>> {
        self.slots.into_iter().flatten()
    }
}

/// All plist lines of one generation, sorted by port id
#[derive(Debug, Clone, Default)]
pub struct PlistTable<'a> {
    pub(crate) lines: Vec<PlistLine<'a>>,
}

impl<'a> PlistTable<'a> {
    /// Decode every record of a plist image
    ///
    /// The sort is stable, so files of one port keep their packing-list order.
    pub fn parse(image: &'a StoreImage) -> StoreResult<Self> {
        let mut lines = Vec::new();

        for record in image.records() {
            let (line, text) = record?;
            lines.push(codec::decode_plist_line(text).map_err(|e| e.at(image.path(), line))?);
        }

        lines.sort_by_key(|l: &PlistLine<'a>| l.port_id);
        debug!(path = %image.path().display(), lines = lines.len(), "Loaded plist");
        Ok(Self { lines })
    }

    /// Build from lines already in memory
    pub fn from_lines(lines: impl IntoIterator<Item = PlistLine<'a>>) -> Self {
        let mut lines: Vec<_> = lines.into_iter().collect();
        lines.sort_by_key(|l| l.port_id);
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines in port id order
    pub fn lines(&self) -> &[PlistLine<'a>] {
        &self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn index_line(id: u32, name: &str) -> String {
        format!("{id}|{name}-1.0|/usr/ports/cat/{name}|/usr/local|c|d|m|cat|||w|||\n")
    }

    #[test]
    fn test_records() {
        let image = StoreImage::from_text("plist", "1|a\n\n2|b\n", 0);
        let records: Vec<_> = image.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(records, vec![(1, "1|a"), (2, ""), (3, "2|b")]);
    }

    #[test]
    fn test_records_unterminated() {
        let image = StoreImage::from_text("plist", "1|a\n2|b", 0);
        let mut records = image.records();
        assert!(records.next().unwrap().is_ok());
        let err = records.next().unwrap().unwrap_err();
        assert!(matches!(err, StoreError::Unterminated { line: 2, .. }));
        assert!(records.next().is_none());
    }

    #[test]
    fn test_parse_index_sorts_and_keeps_holes() {
        let text = format!("{}\n{}{}", index_line(3, "c"), index_line(1, "a"), index_line(2, "b"));
        let image = StoreImage::from_text("index", text, 1700000000);
        let table = PortTable::parse(&image).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.slots.len(), 4);
        assert!(table.slots[0].is_none());

        let ids: Vec<_> = table.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(table.iter().all(|p| p.mtime == 1700000000));
    }

    #[test]
    fn test_parse_index_reports_line() {
        let text = format!("{}2|broken|line\n", index_line(1, "a"));
        let image = StoreImage::from_text("/db/index", text, 0);
        let err = PortTable::parse(&image).unwrap_err();

        match err {
            StoreError::FieldCount { line, pkgname, path, .. } => {
                assert_eq!(line, 2);
                assert_eq!(pkgname, "broken");
                assert_eq!(path, PathBuf::from("/db/index"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_plist_stable_by_id() {
        let image = StoreImage::from_text("plist", "2|x\n1|b\n2|y\n1|a\n", 0);
        let table = PlistTable::parse(&image).unwrap();

        let lines: Vec<_> = table.lines().iter().map(|l| (l.port_id, l.file)).collect();
        assert_eq!(lines, vec![(1, "b"), (1, "a"), (2, "x"), (2, "y")]);
    }

    #[test]
    fn test_parse_plist_corrupt() {
        let image = StoreImage::from_text("plist", "1|a\nnoseparator\n", 0);
        let err = PlistTable::parse(&image).unwrap_err();
        assert!(matches!(err, StoreError::MissingSeparator { line: 2, .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index");
        fs::write(&path, index_line(1, "a")).unwrap();

        let image = StoreImage::load(&path).unwrap();
        assert!(image.mtime() > 0);
        let table = PortTable::parse(&image).unwrap();
        assert_eq!(table.iter().next().unwrap().pkgname(), "a-1.0");
    }

    #[test]
    fn test_load_invalid_utf8() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plist");
        fs::write(&path, b"1|\xff\xfe\n").unwrap();

        let err = StoreImage::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::InvalidUtf8 { offset: 2, .. }));
    }
}
