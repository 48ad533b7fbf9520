//! stackcache - content-hash keyed result cache
//!
//! Memoises the output of expensive, idempotent computations run against a
//! directory (terraform outputs and state lookups, typically), reusing the
//! stored value until the directory's content fingerprint changes.
//!
//! # Modules
//!
//! - [`store`]: SQLite-backed key/value store, one connection per call
//! - [`fingerprint`]: content hash of a directory tree
//! - [`cache`]: the coordinator tying the two together
//! - [`producer`]: external commands as value producers for the CLI
//!
//! # Example
//!
//! ```no_run
//! use stackcache::config::Config;
//! use std::convert::Infallible;
//! use std::path::Path;
//!
//! let cache = Config::default().coordinator()?;
//! let lookup = cache.get_or_compute(Path::new("stacks/vpc"), "vpc_id", || {
//!     Ok::<_, Infallible>(Some("vpc-0abc".to_string()))
//! })?;
//! assert!(lookup.value.is_some());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod producer;
pub mod store;

use anyhow::{Context, Result};
use std::io::Write;

use crate::cache::CacheCoordinator;
use crate::cli::{Cli, Commands, PeekArgs, RunArgs, WalkArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::fingerprint::{FingerprintConfig, Fingerprinter};
use crate::producer::CommandProducer;

/// Run the command described by `cli`.
///
/// Logging must already be initialised. Values are written to stdout.
///
/// # Errors
///
/// Any failure of the selected command, with context.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    // An explicit --config must parse; only the default file may fall back.
    let mut config =
        Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    // --store beats every configured location.
    if let Some(store) = cli.store {
        config.store_path = Some(store);
    }

    // Values go to stdout unadorned so they can be captured by the shell.
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Fingerprint(args) => {
            let fingerprinter = Fingerprinter::new(walk_config(&config, &args.walk));
            let fingerprint = fingerprinter
                .fingerprint(&args.path)
                .with_context(|| format!("Failed to fingerprint {}", args.path.display()))?;
            writeln!(out, "{fingerprint}")?;
            Ok(ExitCode::Success)
        }
        Commands::Run(args) => run_command(&config, args, &mut out),
        Commands::Peek(args) => peek_command(&config, &args, &mut out),
        Commands::Get(args) => {
            let store = config.open_store()?;
            match store.get(&args.key)? {
                Some(value) => {
                    write_value(&mut out, &value)?;
                    Ok(ExitCode::Success)
                }
                None => {
                    log::info!("No value stored under {}", args.key);
                    Ok(ExitCode::NoResult)
                }
            }
        }
        Commands::Set(args) => {
            config.open_store()?.set(&args.key, &args.value)?;
            Ok(ExitCode::Success)
        }
        Commands::Delete(args) => {
            config.open_store()?.delete(&args.key)?;
            Ok(ExitCode::Success)
        }
        Commands::Keys => {
            // The store returns keys unordered; sort for stable output.
            let mut keys = config.open_store()?.keys()?;
            keys.sort();
            for key in keys {
                writeln!(out, "{key}")?;
            }
            Ok(ExitCode::Success)
        }
        Commands::Clear => {
            let store = config.open_store()?;
            store.clear()?;
            log::info!("Cleared {}", store.path().display());
            Ok(ExitCode::Success)
        }
        Commands::Sweep => {
            let removed = config.coordinator()?.sweep_orphans()?;
            writeln!(out, "{removed}")?;
            Ok(ExitCode::Success)
        }
    }
}

fn run_command(config: &Config, args: RunArgs, out: &mut impl Write) -> Result<ExitCode> {
    // clap guarantees at least one element; the check only guards direct callers.
    let (program, program_args) = args
        .command
        .split_first()
        .context("No command given to produce the value")?;

    // The command runs in the fingerprinted directory unless told otherwise.
    let producer = CommandProducer::new(program.clone(), program_args.iter().cloned())
        .current_dir(args.workdir.as_deref().unwrap_or(&args.path))
        .normalize_json(args.json)
        .ignore_errors(args.ignore_errors);

    let coordinator = CacheCoordinator::new(
        config.open_store()?,
        Fingerprinter::new(walk_config(config, &args.walk)),
    );
    let lookup = coordinator
        .get_or_compute(&args.path, &args.key, || producer.produce())
        .with_context(|| {
            format!(
                "Failed to compute {} for {}",
                args.key,
                args.path.display()
            )
        })?;

    log::debug!("{} [{}]: {}", args.path.display(), args.key, lookup.outcome);
    match lookup.into_value() {
        Some(value) => {
            write_value(out, &value)?;
            Ok(ExitCode::Success)
        }
        // The producer had nothing to return; nothing was cached.
        None => Ok(ExitCode::NoResult),
    }
}

fn peek_command(config: &Config, args: &PeekArgs, out: &mut impl Write) -> Result<ExitCode> {
    let coordinator = CacheCoordinator::new(
        config.open_store()?,
        Fingerprinter::new(walk_config(config, &args.walk)),
    );
    let value = coordinator
        .peek(&args.path, &args.key)
        .with_context(|| {
            format!(
                "Failed to read {} for {}",
                args.key,
                args.path.display()
            )
        })?;

    match value {
        Some(value) => {
            write_value(out, &value)?;
            Ok(ExitCode::Success)
        }
        None => {
            log::info!("Nothing cached for {} [{}]", args.path.display(), args.key);
            Ok(ExitCode::NoResult)
        }
    }
}

/// Command-line walk options replace the configured ones field by field.
fn walk_config(config: &Config, args: &WalkArgs) -> FingerprintConfig {
    let mut walk = config.fingerprint_config();
    // Exclusions given on the command line replace the list, not extend it.
    if !args.exclude.is_empty() {
        walk.exclude_names = args.exclude.iter().cloned().collect();
    }
    if args.follow_symlinks {
        walk.follow_symlinks = true;
    }
    if let Some(threads) = args.io_threads {
        walk.io_threads = threads;
    }
    walk
}

fn write_value(out: &mut impl Write, value: &str) -> Result<()> {
    out.write_all(value.as_bytes())?;
    if !value.ends_with('\n') {
        writeln!(out)?;
    }
    Ok(())
}
