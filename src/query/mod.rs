//! Regex queries over a loaded generation
//!
//! A query is a set of (field, pattern) criteria. Each criterion owns one
//! bit of [`Criteria`]; a port is selected when every bit is set.
//!
//! ```text
//!  index image ──► PortTable ──► field pass ──┐
//!                                             ├──► select (mask == required)
//!  plist image ──► PlistTable ──► file pass ──┘
//! ```
//!
//! # Module Structure
//!
//! - `criteria`: the bitmask, the searchable fields and pattern compilation
//! - `engine`: compiled queries and the two evaluation passes

pub mod criteria;
pub mod engine;

pub use criteria::{compile_pattern, Criteria, SearchField};
pub use engine::{attach_all_files, run_query, Query, QuerySpec};
