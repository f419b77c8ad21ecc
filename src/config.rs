//! Configuration types for portsearch
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation (update or search mode)

use crate::display::{parse_output_fields, OutputField, DEFAULT_OUTPUT_FIELDS};
use crate::error::{ConfigError, Result};
use crate::query::{Query, QuerySpec, SearchField};
use crate::rebuild::ReusePolicy;
use crate::store::Scheme;
use clap::Parser;
use std::path::PathBuf;

/// Search the FreeBSD ports collection by name, dependency or installed file
#[derive(Parser, Debug, Clone)]
#[command(
    name = "portsearch",
    version,
    about = "Search the ports collection by name, description, dependency or installed file",
    long_about = "Keeps a flat-file database of every port's INDEX entry and packing list, \
                  and answers regular expression queries against it.\n\n\
                  Run with -u to create or update the database, then search with one or more \
                  criteria. A port is shown only if it matches every criterion given.",
    after_help = "EXAMPLES:\n    \
        portsearch -u -v                      # build or refresh the database\n    \
        portsearch -f 'bin/zsh$'              # which port installs bin/zsh\n    \
        portsearch -n '^py3' -c devel         # python packages in devel\n    \
        portsearch -d gmake -o name,path      # everything that depends on gmake\n    \
        portsearch -k ssl -I                  # name, comment or deps mention ssl"
)]
pub struct CliArgs {
    /// Create or update the database
    #[arg(short = 'u', long)]
    pub update: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Ports tree root
    #[arg(long, env = "PORTSDIR", default_value = "/usr/ports", value_name = "DIR")]
    pub portsdir: PathBuf,

    /// Database directory
    #[arg(
        long,
        env = "PORTSEARCH_DBDIR",
        default_value = "/var/db/portsearch",
        value_name = "DIR"
    )]
    pub dbdir: PathBuf,

    /// Directory holding the helper Makefile used to extract packing lists
    #[arg(
        long,
        env = "PORTSEARCH_DATADIR",
        default_value = "/usr/local/share/portsearch",
        value_name = "DIR"
    )]
    pub datadir: PathBuf,

    /// Ports INDEX file (default: asked from the ports tree)
    #[arg(long, value_name = "FILE")]
    pub index: Option<PathBuf>,

    /// When stored packing lists are reused during an update
    #[arg(long, value_enum, default_value_t = ReusePolicy::Version)]
    pub reuse: ReusePolicy,

    /// Platform scheme naming the database generation (e.g. 14-amd64)
    #[arg(long, value_name = "SCHEME")]
    pub scheme: Option<String>,

    /// Installed file
    #[arg(short = 'f', long, value_name = "REGEX")]
    pub file: Option<String>,

    /// Package name
    #[arg(short = 'n', long, value_name = "REGEX")]
    pub name: Option<String>,

    /// Name, comment or any dependency
    #[arg(short = 'k', long, value_name = "REGEX")]
    pub key: Option<String>,

    /// Port path
    #[arg(short = 'p', long, value_name = "REGEX")]
    pub path: Option<String>,

    /// One-line comment
    #[arg(short = 'i', long, value_name = "REGEX")]
    pub info: Option<String>,

    /// Maintainer
    #[arg(short = 'm', long, value_name = "REGEX")]
    pub maint: Option<String>,

    /// Categories
    #[arg(short = 'c', long, value_name = "REGEX")]
    pub cat: Option<String>,

    /// Fetch dependencies
    #[arg(long, value_name = "REGEX")]
    pub fdep: Option<String>,

    /// Extract dependencies
    #[arg(long, value_name = "REGEX")]
    pub edep: Option<String>,

    /// Patch dependencies
    #[arg(long, value_name = "REGEX")]
    pub pdep: Option<String>,

    /// Build dependencies
    #[arg(long, value_name = "REGEX")]
    pub bdep: Option<String>,

    /// Run dependencies
    #[arg(long, value_name = "REGEX")]
    pub rdep: Option<String>,

    /// Any dependency
    #[arg(short = 'd', long, value_name = "REGEX")]
    pub dep: Option<String>,

    /// Website
    #[arg(short = 'w', long, value_name = "REGEX")]
    pub www: Option<String>,

    /// Case-insensitive matching for every criterion except --file
    #[arg(short = 'I', long)]
    pub icase: bool,

    /// Case-insensitive matching for --file
    #[arg(long)]
    pub file_icase: bool,

    /// Comma-separated output fields
    #[arg(
        short = 'o',
        long = "outflds",
        default_value = DEFAULT_OUTPUT_FIELDS,
        value_name = "FIELDS"
    )]
    pub outflds: String,
}

impl CliArgs {
    /// Search criteria given on the command line, in field order
    pub fn criteria(&self) -> Vec<(SearchField, String)> {
        let given = [
            (SearchField::File, &self.file),
            (SearchField::Name, &self.name),
            (SearchField::Key, &self.key),
            (SearchField::Path, &self.path),
            (SearchField::Info, &self.info),
            (SearchField::Maint, &self.maint),
            (SearchField::Cat, &self.cat),
            (SearchField::Fdep, &self.fdep),
            (SearchField::Edep, &self.edep),
            (SearchField::Pdep, &self.pdep),
            (SearchField::Bdep, &self.bdep),
            (SearchField::Rdep, &self.rdep),
            (SearchField::Dep, &self.dep),
            (SearchField::Www, &self.www),
        ];

        given
            .into_iter()
            .filter_map(|(field, pattern)| pattern.clone().map(|p| (field, p)))
            .collect()
    }
}

/// Settings for a database update
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    pub portsdir: PathBuf,
    pub datadir: PathBuf,

    /// Explicit INDEX file; located through the ports tree when unset
    pub index: Option<PathBuf>,

    pub reuse: ReusePolicy,
}

/// Settings for a search
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Criteria as given
    pub spec: QuerySpec,

    /// Compiled criteria
    pub query: Query,

    /// Fields printed for every selected port
    pub output: Vec<OutputField>,
}

impl SearchConfig {
    /// True if the full file list of every selected port must be loaded
    pub fn needs_all_files(&self) -> bool {
        self.output.contains(&OutputField::Files) && !self.query.needs_plist()
    }
}

/// What this invocation does
#[derive(Debug, Clone)]
pub enum Mode {
    Update(UpdateConfig),
    Search(SearchConfig),
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Database directory
    pub dbdir: PathBuf,

    /// Platform scheme override; detected at run time when unset
    pub scheme: Option<Scheme>,

    /// Number of -v flags
    pub verbosity: u8,

    /// Show progress indicator
    pub show_progress: bool,

    pub mode: Mode,
}

impl RunConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let criteria = args.criteria();

        let mode = match (args.update, criteria.is_empty()) {
            (true, false) => return Err(ConfigError::ConflictingModes.into()),
            (false, true) => return Err(ConfigError::NoMode.into()),
            (true, true) => Mode::Update(UpdateConfig {
                portsdir: args.portsdir,
                datadir: args.datadir,
                index: args.index,
                reuse: args.reuse,
            }),
            (false, false) => {
                let spec = QuerySpec {
                    criteria,
                    icase: args.icase,
                    file_icase: args.file_icase,
                };
                let query = Query::compile(&spec)?;
                let output = parse_output_fields(&args.outflds)?;
                Mode::Search(SearchConfig {
                    spec,
                    query,
                    output,
                })
            }
        };

        let scheme: Option<Scheme> = args.scheme.as_deref().map(str::parse).transpose()?;

        Ok(Self {
            dbdir: args.dbdir,
            scheme,
            verbosity: args.verbose,
            show_progress: !args.quiet,
            mode,
        })
    }

    /// Scheme override, or the running platform's
    pub fn resolve_scheme(&self) -> Result<Scheme> {
        match &self.scheme {
            Some(scheme) => Ok(scheme.clone()),
            None => Ok(Scheme::detect()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{QueryError, SearchError};

    fn parse(args: &[&str]) -> Result<RunConfig> {
        let mut argv = vec!["portsearch"];
        argv.extend_from_slice(args);
        RunConfig::from_args(CliArgs::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_update_mode() {
        let config = parse(&["-u", "-vv", "--reuse", "mtime", "--portsdir", "/tmp/ports"]).unwrap();
        assert_eq!(config.verbosity, 2);
        assert!(config.show_progress);

        match config.mode {
            Mode::Update(update) => {
                assert_eq!(update.reuse, ReusePolicy::Mtime);
                assert_eq!(update.portsdir, PathBuf::from("/tmp/ports"));
                assert!(update.index.is_none());
            }
            Mode::Search(_) => panic!("expected update mode"),
        }
    }

    #[test]
    fn test_search_mode() {
        let config = parse(&["-n", "^zsh", "-f", "bin/zsh$", "--file-icase", "-o", "name,files"]).unwrap();

        match config.mode {
            Mode::Search(search) => {
                assert_eq!(
                    search.spec.criteria,
                    vec![
                        (SearchField::File, "bin/zsh$".to_string()),
                        (SearchField::Name, "^zsh".to_string()),
                    ]
                );
                assert!(!search.spec.icase);
                assert!(search.spec.file_icase);
                assert_eq!(search.output, vec![OutputField::Name, OutputField::Files]);
                assert!(search.query.needs_plist());
                assert!(!search.needs_all_files());
            }
            Mode::Update(_) => panic!("expected search mode"),
        }
    }

    #[test]
    fn test_files_output_without_file_criterion() {
        let config = parse(&["-c", "shells", "-o", "name,files"]).unwrap();
        let Mode::Search(search) = config.mode else {
            panic!("expected search mode");
        };
        assert!(search.needs_all_files());
    }

    #[test]
    fn test_mode_validation() {
        assert!(matches!(
            parse(&["-u", "-n", "zsh"]),
            Err(SearchError::Config(ConfigError::ConflictingModes))
        ));
        assert!(matches!(parse(&[]), Err(SearchError::Config(ConfigError::NoMode))));
        assert!(matches!(parse(&["-v"]), Err(SearchError::Config(ConfigError::NoMode))));
    }

    #[test]
    fn test_usage_errors_exit_64() {
        let err = parse(&["-n", "zsh("]).unwrap_err();
        assert!(matches!(err, SearchError::Query(QueryError::InvalidPattern { field: "name", .. })));
        assert_eq!(err.exit_code(), crate::error::exit::USAGE);

        let err = parse(&["-n", "zsh", "-o", "name,colour"]).unwrap_err();
        assert!(matches!(err, SearchError::Query(QueryError::UnknownOutputField { .. })));
        assert_eq!(err.exit_code(), crate::error::exit::USAGE);
    }

    #[test]
    fn test_scheme_override() {
        let config = parse(&["-u", "--scheme", "13-arm64"]).unwrap();
        assert_eq!(config.resolve_scheme().unwrap(), Scheme::new("13", "arm64"));

        assert!(matches!(
            parse(&["-u", "--scheme", "arm64"]),
            Err(SearchError::Config(ConfigError::InvalidScheme { .. }))
        ));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }
}
