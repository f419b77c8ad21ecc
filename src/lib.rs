//! portsearch - Search the FreeBSD ports collection
//!
//! Keeps a flat-file database of every port's INDEX descriptor and packing
//! list, and answers regular expression queries against it: which port
//! installs a given file, which ports depend on a library, which ports a
//! maintainer owns.
//!
//! # Features
//!
//! - **Flat-file store**: two newline-delimited text files per platform,
//!   loaded whole and parsed into borrowed views with no per-field copies.
//!
//! - **Atomic updates**: a rebuild writes a complete new generation next to
//!   the current one and swaps it in with directory renames. Readers see
//!   either the old or the new generation, never a mix.
//!
//! - **Incremental rebuilds**: packing lists of unchanged ports are carried
//!   over from the previous generation instead of being regenerated.
//!
//! - **Multi-criterion search**: up to fourteen fields, each with its own
//!   regex, combined with AND.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────┐        ┌───────────────────────────────┐
//! │      Ports tree       │        │        Query (CLI flags)      │
//! │  INDEX + make plists  │        │   -n name  -f file  -c cat …  │
//! └───────────┬───────────┘        └───────────────┬───────────────┘
//!             │ PortSource                         │ Query::compile
//!             ▼                                    ▼
//! ┌───────────────────────┐        ┌───────────────────────────────┐
//! │       Rebuilder       │        │          Query engine         │
//! │  reuse or regenerate  │        │  field pass, then file pass   │
//! └───────────┬───────────┘        └───────────────▲───────────────┘
//!             │ GenerationWriter                   │ PortTable / PlistTable
//!             ▼                                    │
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                              Store                               │
//! │   <dbdir>/<scheme>.new  ──commit──►  <dbdir>/<scheme>/{index,plist}│
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Build or refresh the database
//! portsearch -u -v
//!
//! # Which port installs bin/zsh?
//! portsearch -f 'bin/zsh$'
//!
//! # Python packages in devel that depend on gmake
//! portsearch -n '^py3' -c devel -d gmake
//! ```

pub mod config;
pub mod display;
pub mod error;
pub mod port;
pub mod progress;
pub mod query;
pub mod rebuild;
pub mod store;

pub use config::{CliArgs, Mode, RunConfig};
pub use error::{Result, SearchError};
pub use port::{Descriptor, PlistLine, Port};
pub use query::{run_query, Criteria, Query, QuerySpec, SearchField};
pub use rebuild::{PortSource, PortsTree, RebuildStats, Rebuilder, ReusePolicy};
pub use store::{Scheme, Snapshot, Store};
