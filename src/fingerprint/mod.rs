//! Directory content fingerprinting.
//!
//! A fingerprint is a single SHA-512 hex digest summarising every file
//! under a directory. It depends only on file contents; paths, mtimes and
//! the order in which the filesystem returns entries do not affect it.
//!
//! # Architecture
//!
//! - [`walker`]: sorted top-down traversal with excluded directories pruned
//! - [`hasher`]: streaming per-file digests and the digest-of-digests reduction
//!
//! # Example
//!
//! ```no_run
//! use stackcache::fingerprint::{FingerprintConfig, Fingerprinter};
//! use std::path::Path;
//!
//! let config = FingerprintConfig::default().exclude("outputs");
//! let fingerprinter = Fingerprinter::new(config);
//! let fingerprint = fingerprinter.fingerprint(Path::new("stacks/vpc")).unwrap();
//! println!("{fingerprint}");
//! ```

pub mod hasher;
pub mod walker;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

pub use hasher::{digest_file, reduce_digests, DIGEST_HEX_LEN, READ_CHUNK_SIZE};
pub use walker::Fingerprinter;

/// Hex digest identifying one exact state of a directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Validate a stored hex string as a fingerprint.
    ///
    /// Returns `None` unless `s` is exactly [`DIGEST_HEX_LEN`] lowercase hex digits.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let valid = s.len() == DIGEST_HEX_LEN
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        valid.then(|| Self(s.to_string()))
    }

    /// The hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn from_hex(hex: String) -> Self {
        Self(hex)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Options controlling which parts of a tree contribute to the fingerprint.
#[derive(Debug, Clone)]
pub struct FingerprintConfig {
    /// Directory names pruned from the walk at any depth.
    pub exclude_names: BTreeSet<String>,

    /// Descend into symbolic links that point at directories.
    /// Warning: symlink cycles are reported and skipped, not followed.
    pub follow_symlinks: bool,

    /// Number of threads used to digest file contents.
    pub io_threads: usize,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            exclude_names: BTreeSet::new(),
            follow_symlinks: false,
            io_threads: 4,
        }
    }
}

impl FingerprintConfig {
    /// Build a configuration from explicit settings.
    #[must_use]
    pub fn new<I, S>(exclude_names: I, follow_symlinks: bool, io_threads: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclude_names: exclude_names.into_iter().map(Into::into).collect(),
            follow_symlinks,
            io_threads,
        }
    }

    /// Add one excluded directory name.
    #[must_use]
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.exclude_names.insert(name.into());
        self
    }

    /// Whether a directory with this name is pruned.
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude_names.contains(name)
    }
}

/// Errors that can occur while fingerprinting a directory.
#[derive(thiserror::Error, Debug)]
pub enum FingerprintError {
    /// The directory to fingerprint does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The path exists but is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A listed file exists but could not be read.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The digest thread pool could not be created.
    #[error("Failed to start digest workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
