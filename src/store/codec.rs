//! Line codec for the index and plist files
//!
//! Index record: `id|pkgname|path|prefix|comment|pkgdescr|maintainer|categories|bdep|rdep|www|edep|pdep|fdep\n`
//!
//! Plist record: `id|file\n`
//!
//! Everything after the id of an index record is an unmodified ports INDEX
//! line, so the same descriptor parser reads both the ports tree and the
//! store. Decoders borrow from the input and never allocate field text.
//! Errors are raised without file/line context; the loader attaches it.

use crate::error::{StoreError, StoreResult};
use crate::port::{Descriptor, PlistLine, Port, DESCRIPTOR_FIELDS, FIELD_SEPARATOR, RECORD_SEPARATOR};
use std::io::{self, Write};
use std::path::PathBuf;

const FS: char = FIELD_SEPARATOR as char;

/// Parse one ports INDEX line into its fields
///
/// Exactly [`DESCRIPTOR_FIELDS`] fields must be present.
pub fn parse_descriptor(raw: &str) -> StoreResult<Descriptor<'_>> {
    let mut fields = [""; DESCRIPTOR_FIELDS];
    let mut found = 0;

    for field in raw.split(FS) {
        if found < DESCRIPTOR_FIELDS {
            fields[found] = field;
        }
        found += 1;
    }

    if found != DESCRIPTOR_FIELDS {
        return Err(StoreError::FieldCount {
            path: PathBuf::new(),
            line: 0,
            pkgname: fields[0].to_string(),
            expected: DESCRIPTOR_FIELDS,
            found,
        });
    }

    Ok(Descriptor::from_fields(fields))
}

/// Write one index record, terminator included
pub fn write_index_record<W: Write>(out: &mut W, id: u32, descr: &Descriptor<'_>) -> io::Result<()> {
    write!(out, "{id}")?;
    for field in descr.fields() {
        out.write_all(&[FIELD_SEPARATOR])?;
        out.write_all(field.as_bytes())?;
    }
    out.write_all(&[RECORD_SEPARATOR])
}

/// Encode one index record as a string, terminator included
pub fn encode_index_record(id: u32, descr: &Descriptor<'_>) -> String {
    let mut line = id.to_string();
    for field in descr.fields() {
        line.push(FS);
        line.push_str(field);
    }
    line.push(RECORD_SEPARATOR as char);
    line
}

/// Decode one index record (without its terminator)
pub fn decode_index_record(line: &str) -> StoreResult<Port<'_>> {
    let (id, raw) = line.split_once(FS).ok_or(StoreError::MissingSeparator {
        path: PathBuf::new(),
        line: 0,
    })?;

    let id = parse_id(id)?;
    let descr = parse_descriptor(raw)?;

    Ok(Port::new(id, descr))
}

/// Write one plist record, terminator included
pub fn write_plist_line<W: Write>(out: &mut W, port_id: u32, file: &str) -> io::Result<()> {
    write!(out, "{port_id}")?;
    out.write_all(&[FIELD_SEPARATOR])?;
    out.write_all(file.as_bytes())?;
    out.write_all(&[RECORD_SEPARATOR])
}

/// Encode one plist record as a string, terminator included
pub fn encode_plist_line(port_id: u32, file: &str) -> String {
    format!("{port_id}{FS}{file}\n")
}

/// Decode one plist record (without its terminator)
///
/// The file name is everything after the first separator, so names that
/// contain `|` survive.
pub fn decode_plist_line(line: &str) -> StoreResult<PlistLine<'_>> {
    let (id, file) = line.split_once(FS).ok_or(StoreError::MissingSeparator {
        path: PathBuf::new(),
        line: 0,
    })?;

    Ok(PlistLine {
        port_id: parse_id(id)?,
        file,
    })
}

fn parse_id(id: &str) -> StoreResult<u32> {
    id.parse::<u32>().map_err(|_| StoreError::InvalidId {
        path: PathBuf::new(),
        line: 0,
        id: id.to_string(),
    })
}
