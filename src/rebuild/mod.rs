//! Rebuilding the store from a ports tree
//!
//! # Module Structure
//!
//! - `source`: the [`PortSource`] seam and the `make`-driven [`PortsTree`]
//! - `pipeline`: the [`Rebuilder`], reuse policies and rebuild statistics

pub mod pipeline;
pub mod source;

pub use pipeline::{RebuildProgress, RebuildStats, Rebuilder, ReusePolicy};
pub use source::{is_file_entry, newest_mtime, PortSource, PortsTree};
