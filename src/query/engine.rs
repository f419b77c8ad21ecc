//! Query evaluation
//!
//! Two passes over a loaded generation:
//!
//! 1. Every port is checked against every field criterion; each hit ORs the
//!    criterion's bit into the port's `matched` mask.
//! 2. If a file criterion is present, the plist is scanned on its own. For
//!    each matching file the owning port is found by id, gets the file bit,
//!    and has the file appended to its `files`. With file restriction on,
//!    ports that matched nothing in pass 1 are skipped.
//!
//! A port is selected when its mask equals the full set of requested bits.

use crate::error::{QueryError, QueryResult, Result, StoreResult};
use crate::port::Port;
use crate::query::criteria::{compile_pattern, Criteria, SearchField};
use crate::store::{PlistTable, PortTable, StoreImage};
use regex::Regex;
use tracing::debug;

/// Uncompiled search request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySpec {
    /// One pattern per field; each field at most once
    pub criteria: Vec<(SearchField, String)>,

    /// Case-insensitive matching for every field criterion
    pub icase: bool,

    /// Case-insensitive matching for the file criterion
    pub file_icase: bool,
}

impl QuerySpec {
    /// Add a criterion
    pub fn with(mut self, field: SearchField, pattern: impl Into<String>) -> Self {
        self.criteria.push((field, pattern.into()));
        self
    }

    pub fn icase(mut self, icase: bool) -> Self {
        self.icase = icase;
        self
    }

    pub fn file_icase(mut self, icase: bool) -> Self {
        self.file_icase = icase;
        self
    }
}

#[derive(Debug, Clone)]
struct FieldCriterion {
    field: SearchField,
    regex: Regex,
}

/// Compiled query
#[derive(Debug, Clone)]
pub struct Query {
    fields: Vec<FieldCriterion>,
    file: Option<Regex>,
    required: Criteria,
    restrict_files: bool,
}

impl Query {
    /// Compile every pattern once
    ///
    /// File restriction defaults to on whenever a field criterion is present,
    /// because such a query can only select ports that matched it.
    pub fn compile(spec: &QuerySpec) -> QueryResult<Self> {
        if spec.criteria.is_empty() {
            return Err(QueryError::NoCriteria);
        }

        let mut fields = Vec::new();
        let mut file = None;
        let mut required = Criteria::empty();

        for (field, pattern) in &spec.criteria {
            if required.contains(field.flag()) {
                return Err(QueryError::DuplicateCriterion { field: field.name() });
            }
            required |= field.flag();

            if *field == SearchField::File {
                file = Some(compile_pattern(*field, pattern, spec.file_icase)?);
            } else {
                fields.push(FieldCriterion {
                    field: *field,
                    regex: compile_pattern(*field, pattern, spec.icase)?,
                });
            }
        }

        let restrict_files = !fields.is_empty();

        Ok(Self {
            fields,
            file,
            required,
            restrict_files,
        })
    }

    /// Override whether the file pass skips ports that matched nothing
    pub fn with_file_restriction(mut self, restrict: bool) -> Self {
        self.restrict_files = restrict;
        self
    }

    /// Bits a port must have to be selected
    pub fn required(&self) -> Criteria {
        self.required
    }

    /// True if evaluation needs the plist file
    pub fn needs_plist(&self) -> bool {
        self.file.is_some()
    }

    /// Run both passes over `ports`
    ///
    /// `plist` is only consulted when the query has a file criterion, and
    /// such a query fails with [`QueryError::PlistRequired`] without one.
    pub fn evaluate<'a>(
        &self,
        ports: &mut PortTable<'a>,
        plist: Option<&PlistTable<'a>>,
    ) -> Result<()> {
        for port in ports.iter_mut() {
            port.matched = Criteria::empty();
        }

        self.match_fields(ports);

        if let Some(re) = &self.file {
            let plist = plist.ok_or(QueryError::PlistRequired)?;
            self.match_files(re, ports, plist)?;
        }

        Ok(())
    }

    fn match_fields(&self, ports: &mut PortTable<'_>) {
        if self.fields.is_empty() {
            return;
        }

        for port in ports.iter_mut() {
            for criterion in &self.fields {
                if criterion.field.is_match(&criterion.regex, &port.descr) {
                    port.matched |= criterion.field.flag();
                }
            }
        }
    }

    fn match_files<'a>(
        &self,
        re: &Regex,
        ports: &mut PortTable<'a>,
        plist: &PlistTable<'a>,
    ) -> StoreResult<()> {
        let mut hits = 0usize;

        for line in plist.lines() {
            if !re.is_match(line.file) {
                continue;
            }

            let port = ports.find_by_id_mut(line.port_id)?;
            if self.restrict_files && port.matched.is_empty() {
                continue;
            }

            port.matched |= Criteria::FILE;
            port.files.push(line.file.into());
            hits += 1;
        }

        debug!(hits, restricted = self.restrict_files, "File pass done");
        Ok(())
    }

    /// True if `port` satisfied every requested criterion
    pub fn is_selected(&self, port: &Port<'_>) -> bool {
        port.matched == self.required
    }

    /// Selected ports, in id order
    pub fn select<'a>(&self, ports: PortTable<'a>) -> Vec<Port<'a>> {
        ports.into_ports().filter(|p| self.is_selected(p)).collect()
    }
}

/// Evaluate `query` against loaded store images
///
/// Returns every selected port with its matched mask and, for file queries,
/// the files that matched.
pub fn run_query<'a>(
    query: &Query,
    index: &'a StoreImage,
    plist: Option<&'a StoreImage>,
) -> Result<Vec<Port<'a>>> {
    let mut ports = PortTable::parse(index)?;

    let plist = match plist {
        Some(image) if query.needs_plist() => Some(PlistTable::parse(image)?),
        _ => None,
    };

    query.evaluate(&mut ports, plist.as_ref())?;
    let selected = query.select(ports);

    debug!(selected = selected.len(), "Query evaluated");
    Ok(selected)
}

/// Attach every installed file to each port, replacing what is there
pub fn attach_all_files<'a>(ports: &mut [Port<'a>], plist: &PlistTable<'a>) {
    for port in ports {
        port.files = plist
            .files_for_port(port.id)
            .into_iter()
            .map(Into::into)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SearchError, StoreError};
    use crate::port::PlistLine;
    use crate::store::codec::parse_descriptor;

    const P1: &str = "foo-1.0|/usr/ports/a/p1|/usr/local|first port|d|me@example.org|a|||https://p1.example.org/|||";
    const P2: &str = "bar-2.0|/usr/ports/a/p2|/usr/local|second port|d|you@example.org|a|||https://p2.example.org/|||";
    const P3: &str = "foobar-3.0|/usr/ports/b/p3|/usr/local|third port|d|me@example.org|b|||https://p3.example.org/|||";

    fn ports() -> PortTable<'static> {
        PortTable::from_ports(
            [P1, P2, P3]
                .into_iter()
                .enumerate()
                .map(|(i, line)| Port::new(i as u32 + 1, parse_descriptor(line).unwrap())),
        )
    }

    fn plist() -> PlistTable<'static> {
        PlistTable::from_lines(vec![
            PlistLine { port_id: 1, file: "bin/foo" },
            PlistLine { port_id: 2, file: "bin/bar" },
            PlistLine { port_id: 2, file: "lib/libshared.so" },
            PlistLine { port_id: 3, file: "bin/foobar" },
            PlistLine { port_id: 3, file: "lib/libshared.so" },
        ])
    }

    fn names<'a>(ports: &[Port<'a>]) -> Vec<&'a str> {
        ports.iter().map(|p| p.pkgname()).collect()
    }

    fn run(spec: &QuerySpec) -> Vec<Port<'static>> {
        let query = Query::compile(spec).unwrap();
        let mut table = ports();
        let pl = plist();
        query.evaluate(&mut table, Some(&pl)).unwrap();
        query.select(table)
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(Query::compile(&QuerySpec::default()), Err(QueryError::NoCriteria)));

        let dup = QuerySpec::default()
            .with(SearchField::Name, "a")
            .with(SearchField::Name, "b");
        assert!(matches!(
            Query::compile(&dup),
            Err(QueryError::DuplicateCriterion { field: "name" })
        ));

        let bad = QuerySpec::default().with(SearchField::File, "[unclosed");
        assert!(matches!(
            Query::compile(&bad),
            Err(QueryError::InvalidPattern { field: "file", .. })
        ));
    }

    #[test]
    fn test_required_bits() {
        let q = Query::compile(
            &QuerySpec::default()
                .with(SearchField::Cat, "a")
                .with(SearchField::File, "bin"),
        )
        .unwrap();
        assert_eq!(q.required(), Criteria::CAT | Criteria::FILE);
        assert!(q.needs_plist());
    }

    #[test]
    fn test_single_field() {
        let hits = run(&QuerySpec::default().with(SearchField::Cat, "^a$"));
        assert_eq!(names(&hits), vec!["foo-1.0", "bar-2.0"]);
        assert!(hits.iter().all(|p| p.matched == Criteria::CAT));
    }

    #[test]
    fn test_name_and_file() {
        // P1: name matches, file does not. P2: file only. P3: both.
        let name = || QuerySpec::default().with(SearchField::Name, "^foo");
        let file = || QuerySpec::default().with(SearchField::File, "libshared");

        assert_eq!(names(&run(&name())), vec!["foo-1.0", "foobar-3.0"]);
        assert_eq!(names(&run(&file())), vec!["bar-2.0", "foobar-3.0"]);

        let both = run(&name().with(SearchField::File, "libshared"));
        assert_eq!(names(&both), vec!["foobar-3.0"]);
        assert_eq!(both[0].files, vec!["lib/libshared.so"]);
        assert_eq!(both[0].matched, Criteria::NAME | Criteria::FILE);
    }

    #[test]
    fn test_file_restriction() {
        let spec = QuerySpec::default()
            .with(SearchField::Name, "^foo")
            .with(SearchField::File, "libshared");

        let restricted = Query::compile(&spec).unwrap();
        let mut table = ports();
        restricted.evaluate(&mut table, Some(&plist())).unwrap();
        assert!(table.find_by_id(2).unwrap().files.is_empty());
        assert!(table.find_by_id(2).unwrap().matched.is_empty());

        let open = Query::compile(&spec).unwrap().with_file_restriction(false);
        let mut table = ports();
        open.evaluate(&mut table, Some(&plist())).unwrap();
        assert_eq!(table.find_by_id(2).unwrap().files, vec!["lib/libshared.so"]);
        assert_eq!(table.find_by_id(2).unwrap().matched, Criteria::FILE);

        // Selection is the same either way
        assert_eq!(names(&restricted.select(ports_evaluated(&restricted))), vec!["foobar-3.0"]);
        assert_eq!(names(&open.select(ports_evaluated(&open))), vec!["foobar-3.0"]);
    }

    fn ports_evaluated(q: &Query) -> PortTable<'static> {
        let mut table = ports();
        q.evaluate(&mut table, Some(&plist())).unwrap();
        table
    }

    #[test]
    fn test_file_matches_accumulate() {
        let hits = run(&QuerySpec::default().with(SearchField::File, "^(bin|lib)/"));
        let p2 = hits.iter().find(|p| p.id == 2).unwrap();
        assert_eq!(p2.files, vec!["bin/bar", "lib/libshared.so"]);
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_independent_case_flags() {
        let spec = QuerySpec::default()
            .with(SearchField::Name, "^FOO")
            .with(SearchField::File, "BIN/")
            .icase(true);
        assert!(run(&spec).is_empty());

        let hits = run(&spec.clone().file_icase(true));
        assert_eq!(names(&hits), vec!["foo-1.0", "foobar-3.0"]);
    }

    #[test]
    fn test_unknown_port_in_plist() {
        let q = Query::compile(&QuerySpec::default().with(SearchField::File, "orphan")).unwrap();
        let mut table = ports();
        let pl = PlistTable::from_lines(vec![PlistLine { port_id: 9, file: "bin/orphan" }]);

        let err = q.evaluate(&mut table, Some(&pl)).unwrap_err();
        assert!(matches!(err, SearchError::Store(StoreError::UnknownPortId { id: 9 })));
    }

    #[test]
    fn test_file_query_without_plist() {
        let q = Query::compile(
            &QuerySpec::default()
                .with(SearchField::Name, "^foo")
                .with(SearchField::File, "bin/"),
        )
        .unwrap();
        let mut table = ports();

        let err = q.evaluate(&mut table, None).unwrap_err();
        assert!(matches!(err, SearchError::Query(QueryError::PlistRequired)));

        let index = StoreImage::from_text("index", format!("1|{P1}\n"), 0);
        let err = run_query(&q, &index, None).unwrap_err();
        assert!(matches!(err, SearchError::Query(QueryError::PlistRequired)));
    }

    #[test]
    fn test_reevaluation_resets_mask() {
        let mut table = ports();
        let pl = plist();

        let q = Query::compile(&QuerySpec::default().with(SearchField::Cat, "^b$")).unwrap();
        q.evaluate(&mut table, Some(&pl)).unwrap();
        let q = Query::compile(&QuerySpec::default().with(SearchField::Cat, "^a$")).unwrap();
        q.evaluate(&mut table, Some(&pl)).unwrap();

        assert!(table.find_by_id(3).unwrap().matched.is_empty());
    }

    #[test]
    fn test_attach_all_files() {
        let mut hits = run(&QuerySpec::default().with(SearchField::Name, "^bar"));
        attach_all_files(&mut hits, &plist());
        assert_eq!(hits[0].files, vec!["bin/bar", "lib/libshared.so"]);
    }

    #[test]
    fn test_run_query_on_images() {
        let index = StoreImage::from_text("index", format!("1|{P1}\n2|{P2}\n3|{P3}\n"), 0);
        let plist = StoreImage::from_text("plist", "3|bin/foobar\n1|bin/foo\n", 0);

        let q = Query::compile(&QuerySpec::default().with(SearchField::File, "foobar$")).unwrap();
        let hits = run_query(&q, &index, Some(&plist)).unwrap();
        assert_eq!(names(&hits), vec!["foobar-3.0"]);
        assert_eq!(hits[0].files, vec!["bin/foobar"]);

        // Field-only queries never touch the plist
        let q = Query::compile(&QuerySpec::default().with(SearchField::Maint, "^me@")).unwrap();
        let hits = run_query(&q, &index, None).unwrap();
        assert_eq!(names(&hits), vec!["foo-1.0", "foobar-3.0"]);
    }
}
