//! portsearch - Search the FreeBSD ports collection
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use console::Term;
use portsearch::config::{CliArgs, Mode, RunConfig, SearchConfig, UpdateConfig};
use portsearch::display::display_ports;
use portsearch::progress::{print_header, print_summary, ProgressReporter};
use portsearch::query::attach_all_files;
use portsearch::rebuild::{PortSource, PortsTree, Rebuilder};
use portsearch::store::{PlistTable, PortTable, Store};
use portsearch::error::exit;
use portsearch::SearchError;
use std::io::{self, BufWriter};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Exit status for an error chain
///
/// Library errors carry their own status, bare I/O errors map to `EX_IOERR`,
/// anything else is an OS error.
fn exit_code(e: &anyhow::Error) -> u8 {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<SearchError>())
        .map(SearchError::exit_code)
        .or_else(|| e.chain().any(|cause| cause.is::<io::Error>()).then_some(exit::IOERR))
        .unwrap_or(exit::OSERR)
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = RunConfig::from_args(args).context("Invalid arguments")?;

    let scheme = config.resolve_scheme()?;
    let store = Store::new(&config.dbdir, scheme);
    debug!(dir = %store.current_dir().display(), "Using database");

    match &config.mode {
        Mode::Update(update) => run_update(&config, update, &store),
        Mode::Search(search) => run_search(search, &store),
    }
}

/// Build a new generation from the ports tree and commit it
fn run_update(config: &RunConfig, update: &UpdateConfig, store: &Store) -> Result<()> {
    let tree = match &update.index {
        Some(index) => PortsTree::with_index(&update.portsdir, &update.datadir, index),
        None => PortsTree::locate(&update.portsdir, &update.datadir).map_err(SearchError::from)?,
    };

    let removed = store.cleanup_stale();
    if removed > 0 {
        info!(removed, "Cleaned up leftovers of an interrupted update");
    }

    if config.show_progress {
        print_header(tree.origin(), &store.current_dir(), update.reuse.name());
    }

    // Setup signal handler for graceful shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, stopping before commit...");
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let progress = if config.show_progress {
        ProgressReporter::new()
    } else {
        ProgressReporter::hidden()
    };
    progress.set_status("Reading ports INDEX...");

    let rebuilder = Rebuilder::new(store, &tree)
        .with_policy(update.reuse)
        .with_shutdown(shutdown);

    let stats = match rebuilder.run_with_progress(|p| progress.update(p)) {
        Ok(stats) => stats,
        Err(e) => {
            progress.finish_and_clear();
            return Err(e).context("Database update failed");
        }
    };
    progress.finish("Database updated");

    if config.show_progress {
        print_summary(&stats, &store.current_dir(), store.size_on_disk());
    }

    info!(
        ports = stats.ports,
        reused = stats.reused,
        regenerated = stats.regenerated,
        "Update complete"
    );
    Ok(())
}

/// Evaluate the query against the current generation and print the result
fn run_search(search: &SearchConfig, store: &Store) -> Result<()> {
    let snapshot = store
        .snapshot()
        .map_err(SearchError::from)
        .with_context(|| format!("Cannot open database {} (run with -u first?)", store.current_dir().display()))?;

    let mut ports = PortTable::parse(snapshot.index()).map_err(SearchError::from)?;

    let plist = if search.query.needs_plist() || search.needs_all_files() {
        Some(PlistTable::parse(snapshot.plist()).map_err(SearchError::from)?)
    } else {
        None
    };

    search.query.evaluate(&mut ports, plist.as_ref())?;
    let mut selected = search.query.select(ports);

    if search.needs_all_files() {
        if let Some(plist) = &plist {
            attach_all_files(&mut selected, plist);
        }
    }

    let stdout = io::stdout();
    let styled = Term::stdout().features().colors_supported();
    let out = BufWriter::new(stdout.lock());
    let summary = display_ports(out, &selected, &search.output, styled).or_else(|e| {
        // A closed pipe (e.g. `| head`) is not an error
        if e.kind() == io::ErrorKind::BrokenPipe {
            Ok(Default::default())
        } else {
            Err(e)
        }
    })
    .context("Failed to write results")?;

    debug!(ports = summary.ports, files = summary.files, "Printed results");
    Ok(())
}

fn setup_logging(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("portsearch={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portsearch::error::StoreError;

    #[test]
    fn test_exit_code_for_output_error() {
        let err = anyhow::Error::from(io::Error::new(io::ErrorKind::Other, "disk full"))
            .context("Failed to write results");
        assert_eq!(exit_code(&err), exit::IOERR);
    }

    #[test]
    fn test_exit_code_prefers_library_status() {
        let err = anyhow::Error::from(SearchError::Interrupted).context("Database update failed");
        assert_eq!(exit_code(&err), exit::INTERRUPTED);

        let missing = StoreError::io(
            portsearch::error::IoOp::Open,
            "/var/db/portsearch/index",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert_eq!(exit_code(&SearchError::from(missing).into()), exit::NOINPUT);
    }

    #[test]
    fn test_exit_code_fallback() {
        assert_eq!(exit_code(&anyhow::anyhow!("no scheme")), exit::OSERR);
    }
}
