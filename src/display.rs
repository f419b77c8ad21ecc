//! Printing query results
//!
//! Each selected port is printed as a block of `Label:\tvalue` lines, one per
//! requested output field, followed by a blank line. A final count line
//! reports how many ports (and, when files are shown, how many files) were
//! printed.
//!
//! ```text
//! Port:   zsh-5.9
//! Path:   /usr/ports/shells/zsh
//! Info:   The Z shell
//! Files:  bin/zsh, bin/zsh-5.9
//!
//! 1 ports, 2 files
//! ```

use crate::error::{QueryError, QueryResult};
use crate::port::Port;
use console::style;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

/// Output fields used when none are requested
pub const DEFAULT_OUTPUT_FIELDS: &str = "name,path,info,maint,bdep,rdep,www";

/// One line of a printed port block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputField {
    Name,
    Path,
    Prefix,
    Info,
    Descr,
    Maint,
    Cat,
    Fdep,
    Edep,
    Pdep,
    Bdep,
    Rdep,
    Www,
    Files,
}

impl OutputField {
    pub const ALL: [OutputField; 14] = [
        OutputField::Name,
        OutputField::Path,
        OutputField::Prefix,
        OutputField::Info,
        OutputField::Descr,
        OutputField::Maint,
        OutputField::Cat,
        OutputField::Fdep,
        OutputField::Edep,
        OutputField::Pdep,
        OutputField::Bdep,
        OutputField::Rdep,
        OutputField::Www,
        OutputField::Files,
    ];

    /// Name accepted in an output field list
    pub fn name(self) -> &'static str {
        match self {
            OutputField::Name => "name",
            OutputField::Path => "path",
            OutputField::Prefix => "prefix",
            OutputField::Info => "info",
            OutputField::Descr => "descr",
            OutputField::Maint => "maint",
            OutputField::Cat => "cat",
            OutputField::Fdep => "fdep",
            OutputField::Edep => "edep",
            OutputField::Pdep => "pdep",
            OutputField::Bdep => "bdep",
            OutputField::Rdep => "rdep",
            OutputField::Www => "www",
            OutputField::Files => "files",
        }
    }

    /// Label printed before the value
    pub fn label(self) -> &'static str {
        match self {
            OutputField::Name => "Port:",
            OutputField::Path => "Path:",
            OutputField::Prefix => "Prefix:",
            OutputField::Info => "Info:",
            OutputField::Descr => "Descr:",
            OutputField::Maint => "Maint:",
            OutputField::Cat => "Cat:",
            OutputField::Fdep => "F-deps:",
            OutputField::Edep => "E-deps:",
            OutputField::Pdep => "P-deps:",
            OutputField::Bdep => "B-deps:",
            OutputField::Rdep => "R-deps:",
            OutputField::Www => "WWW:",
            OutputField::Files => "Files:",
        }
    }

    /// Descriptor value of this field; `None` for [`OutputField::Files`]
    fn value<'a>(self, port: &Port<'a>) -> Option<&'a str> {
        let d = &port.descr;
        Some(match self {
            OutputField::Name => d.pkgname,
            OutputField::Path => d.path,
            OutputField::Prefix => d.prefix,
            OutputField::Info => d.comment,
            OutputField::Descr => d.pkgdescr,
            OutputField::Maint => d.maintainer,
            OutputField::Cat => d.categories,
            OutputField::Fdep => d.fdep,
            OutputField::Edep => d.edep,
            OutputField::Pdep => d.pdep,
            OutputField::Bdep => d.bdep,
            OutputField::Rdep => d.rdep,
            OutputField::Www => d.www,
            OutputField::Files => return None,
        })
    }
}

impl fmt::Display for OutputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputField {
    type Err = QueryError;

    fn from_str(s: &str) -> QueryResult<Self> {
        OutputField::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| QueryError::UnknownOutputField { name: s.to_string() })
    }
}

/// Parse a comma-separated output field list
///
/// Empty items are ignored; a field named twice is printed once.
pub fn parse_output_fields(list: &str) -> QueryResult<Vec<OutputField>> {
    let mut fields = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let field: OutputField = item.parse()?;
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    Ok(fields)
}

/// Counts reported on the final line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplaySummary {
    pub ports: usize,
    pub files: usize,
}

/// Writes port blocks and the count line
pub struct ResultPrinter<W: Write> {
    out: W,
    fields: Vec<OutputField>,
    styled: bool,
    summary: DisplaySummary,
}

impl<W: Write> ResultPrinter<W> {
    pub fn new(out: W, fields: Vec<OutputField>) -> Self {
        Self {
            out,
            fields,
            styled: false,
            summary: DisplaySummary::default(),
        }
    }

    /// Bold labels (for terminals)
    pub fn styled(mut self, styled: bool) -> Self {
        self.styled = styled;
        self
    }

    /// True if the files field is printed
    pub fn shows_files(&self) -> bool {
        self.fields.contains(&OutputField::Files)
    }

    pub fn write_port(&mut self, port: &Port<'_>) -> io::Result<()> {
        for field in &self.fields {
            let label = field.label();
            if self.styled {
                write!(self.out, "{}\t", style(label).bold())?;
            } else {
                write!(self.out, "{label}\t")?;
            }

            match field.value(port) {
                Some(value) => writeln!(self.out, "{value}")?,
                None => {
                    let mut first = true;
                    for file in &port.files {
                        if !first {
                            self.out.write_all(b", ")?;
                        }
                        self.out.write_all(file.as_bytes())?;
                        first = false;
                    }
                    writeln!(self.out)?;
                    self.summary.files += port.files.len();
                }
            }
        }

        writeln!(self.out)?;
        self.summary.ports += 1;
        Ok(())
    }

    /// Write the count line and return the totals
    pub fn finish(mut self) -> io::Result<DisplaySummary> {
        write!(self.out, "{} ports", self.summary.ports)?;
        if self.shows_files() {
            write!(self.out, ", {} files", self.summary.files)?;
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(self.summary)
    }
}

/// Print every port followed by the count line
pub fn display_ports<W: Write>(
    out: W,
    ports: &[Port<'_>],
    fields: &[OutputField],
    styled: bool,
) -> io::Result<DisplaySummary> {
    let mut printer = ResultPrinter::new(out, fields.to_vec()).styled(styled);
    for port in ports {
        printer.write_port(port)?;
    }
    printer.finish()
}
