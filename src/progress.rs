//! Progress reporting for database rebuilds
//!
//! Provides a live spinner using indicatif and the summary printed once the
//! new generation is committed.

use crate::rebuild::{RebuildProgress, RebuildStats};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Spinner showing rebuild status on stderr
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        if let Ok(spinner) = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            bar.set_style(spinner.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// A reporter that draws nothing (quiet mode)
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Update the progress display
    pub fn update(&self, progress: &RebuildProgress) {
        let msg = format!(
            "Ports: {} | Reused: {} | Regenerated: {} | Files: {} | Rate: {:.0}/s | {}",
            format_number(progress.ports),
            format_number(progress.reused),
            format_number(progress.regenerated),
            format_number(progress.files),
            progress.ports_per_second(),
            progress.current,
        );

        self.bar.set_message(msg);
    }

    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);

    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}

/// Print the result of a committed rebuild
pub fn print_summary(stats: &RebuildStats, db_path: &Path, db_size: Option<u64>) {
    let secs = stats.duration.as_secs_f64();
    let rate = if secs > 0.0 {
        stats.ports as f64 / secs
    } else {
        0.0
    };

    eprintln!();
    eprintln!("{}", style("Database Updated").green().bold());
    eprintln!("{}", style("─".repeat(50)).dim());
    eprintln!("  {} {}", style("Ports:").bold(), format_number(stats.ports));
    eprintln!(
        "  {} {} reused, {} regenerated",
        style("Packing lists:").bold(),
        format_number(stats.reused),
        format_number(stats.regenerated)
    );
    eprintln!("  {} {}", style("Files:").bold(), format_number(stats.files));
    eprintln!(
        "  {} {:.1}s ({:.0} ports/sec)",
        style("Duration:").bold(),
        secs,
        rate
    );
    if !stats.had_previous {
        eprintln!("  {} created from scratch", style("Previous:").bold());
    }
    match db_size {
        Some(size) => eprintln!(
            "  {} {} ({})",
            style("Database:").bold(),
            db_path.display(),
            format_size(size, BINARY)
        ),
        None => eprintln!("  {} {}", style("Database:").bold(), db_path.display()),
    }
    eprintln!();
}

/// Print a header at the start of a rebuild
pub fn print_header(index: &Path, db_path: &Path, policy: &str) {
    eprintln!();
    eprintln!(
        "{} {}",
        style("portsearch").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("{}", style("─".repeat(50)).dim());
    eprintln!("  {} {}", style("INDEX:").bold(), index.display());
    eprintln!("  {} {}", style("Database:").bold(), db_path.display());
    eprintln!("  {} {}", style("Reuse:").bold(), policy);
    eprintln!();
}
