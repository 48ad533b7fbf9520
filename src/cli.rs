//! Command-line interface definitions for stackcache.
//!
//! # Example
//!
//! ```bash
//! # Print the fingerprint of a stack directory
//! stackcache fingerprint stacks/vpc/layers/production
//!
//! # Memoise a terraform output until the stack changes
//! stackcache run stacks/vpc/layers/production --key vpc_id --json -- \
//!     terraform output -json vpc_id
//!
//! # Read a cached value without running anything
//! stackcache peek stacks/vpc/layers/production --key vpc_id
//!
//! # Inspect or reset the store
//! stackcache keys
//! stackcache sweep
//! stackcache clear
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Content-hash keyed cache for expensive per-directory computations.
///
/// Results are reused until any non-hidden file under the directory
/// changes. The store is a single SQLite file shared by all invocations.
#[derive(Debug, Parser)]
#[command(name = "stackcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH", global = true, env = "STACKCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Store file, overriding the configured location
    #[arg(long, value_name = "PATH", global = true)]
    pub store: Option<PathBuf>,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the content fingerprint of a directory
    Fingerprint(FingerprintArgs),
    /// Return the cached output of a command, running it only when needed
    Run(RunArgs),
    /// Print the cached value for a directory without running anything
    Peek(PeekArgs),
    /// Print the value stored under a raw store key
    Get(KeyArgs),
    /// Store a value under a raw store key
    Set(SetArgs),
    /// Delete a raw store key
    Delete(KeyArgs),
    /// List every key in the store
    Keys,
    /// Remove every entry from the store
    Clear,
    /// Delete cached results no directory refers to any more
    Sweep,
}

/// Options shared by commands that fingerprint a directory.
#[derive(Debug, Args, Clone, Default)]
pub struct WalkArgs {
    /// Directory name to leave out of the fingerprint (repeatable)
    ///
    /// Replaces the configured exclusions when given.
    #[arg(short, long = "exclude", value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Follow symbolic links to directories
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Number of threads used to digest files
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,
}

/// Arguments for the fingerprint subcommand.
#[derive(Debug, Args)]
pub struct FingerprintArgs {
    /// Directory to fingerprint
    #[arg(value_name = "DIR")]
    pub path: PathBuf,

    #[command(flatten)]
    pub walk: WalkArgs,
}

/// Arguments for the run subcommand.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory whose content decides whether the cache is still valid
    #[arg(value_name = "DIR")]
    pub path: PathBuf,

    /// Logical key of the result within the directory (e.g. an output name)
    #[arg(short, long, value_name = "KEY")]
    pub key: String,

    /// Normalise the command's output as compact JSON before caching
    #[arg(long)]
    pub json: bool,

    /// Treat a failing command as "no result" instead of an error
    #[arg(long)]
    pub ignore_errors: bool,

    /// Run the command from this directory instead of DIR
    #[arg(long, value_name = "PATH")]
    pub workdir: Option<PathBuf>,

    #[command(flatten)]
    pub walk: WalkArgs,

    /// Program and arguments that produce the value
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Arguments for the peek subcommand.
#[derive(Debug, Args)]
pub struct PeekArgs {
    /// Directory whose current content the value must belong to
    #[arg(value_name = "DIR")]
    pub path: PathBuf,

    /// Logical key of the result within the directory
    #[arg(short, long, value_name = "KEY")]
    pub key: String,

    #[command(flatten)]
    pub walk: WalkArgs,
}

/// Arguments naming a single store key.
#[derive(Debug, Args)]
pub struct KeyArgs {
    /// Raw store key
    #[arg(value_name = "KEY")]
    pub key: String,
}

/// Arguments for the set subcommand.
#[derive(Debug, Args)]
pub struct SetArgs {
    /// Raw store key
    #[arg(value_name = "KEY")]
    pub key: String,

    /// Value to store
    #[arg(value_name = "VALUE")]
    pub value: String,
}
