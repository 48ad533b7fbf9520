//! Logging infrastructure for stackcache.
//!
//! Uses the `log` facade with an `env_logger` backend. The level comes from,
//! in priority order:
//!
//! 1. `RUST_LOG` environment variable (if set)
//! 2. CLI flags: `--quiet` (error only) or `--verbose` (debug/trace)
//! 3. Default: info level
//!
//! Logs go to stderr so that cached values printed on stdout stay clean
//! for shell substitution.

use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Initialize the logging subsystem based on CLI verbosity flags.
///
/// Call once at startup, before any logging calls are made.
///
/// # Arguments
///
/// * `verbose` - Verbosity count from CLI (0=normal, 1=debug, 2+=trace)
/// * `quiet` - If true, only show errors (overridden by RUST_LOG)
///
/// # Panics
///
/// Panics if called more than once, as `env_logger` can only be
/// initialized once per process.
pub fn init_logging(verbose: u8, quiet: bool) {
    let use_env = env::var("RUST_LOG").is_ok();

    let mut builder = Builder::new();
    builder.target(Target::Stderr);

    if use_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    configure_format(&mut builder, verbose);
    builder.init();

    if use_env {
        log::debug!(
            "Logging initialized from RUST_LOG: {:?}",
            env::var("RUST_LOG").ok()
        );
    } else {
        log::debug!(
            "Logging initialized at level: {:?}",
            determine_level(verbose, quiet)
        );
    }
}

/// Determine the log level from CLI flags.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Debug builds and `-v` get timestamps and module paths; otherwise
/// level and message only.
fn configure_format(builder: &mut Builder, verbose: u8) {
    let detailed = cfg!(debug_assertions) || verbose >= 1;

    builder.format(move |buf, record| {
        let level = record.level();
        let level_style = buf.default_level_style(level);

        if detailed {
            writeln!(
                buf,
                "{} {level_style}{:<5}{level_style:#} [{}] {}",
                buf.timestamp_seconds(),
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(
                buf,
                "{level_style}{:<5}{level_style:#} {}",
                level,
                record.args()
            )
        }
    });
}
