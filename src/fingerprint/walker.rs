//! Directory walk feeding the fingerprint.
//!
//! # Overview
//!
//! [`Fingerprinter`] walks a tree with `walkdir`, top-down and sorted by
//! file name, pruning excluded directory names before descending into
//! them. Every remaining file whose name does not start with `.` is
//! digested, and the digests are reduced into a single [`Fingerprint`].
//!
//! Directory listing problems below the root (permission denied, symlink
//! loops) are logged and skipped, matching how the rest of the stacks
//! tooling treats unreadable subtrees. A file that cannot be read once
//! listed is a hard error.
//!
//! # Example
//!
//! ```no_run
//! use stackcache::fingerprint::{FingerprintConfig, Fingerprinter};
//! use std::path::Path;
//!
//! let fingerprinter = Fingerprinter::new(FingerprintConfig::default().exclude("outputs"));
//! let files = fingerprinter.collect_files(Path::new("stacks/vpc")).unwrap();
//! println!("{} files contribute to the fingerprint", files.len());
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use rayon::prelude::*;
use rayon::ThreadPool;
use walkdir::{DirEntry, WalkDir};

use super::hasher::{digest_file, reduce_digests};
use super::{Fingerprint, FingerprintConfig, FingerprintError};

/// Computes content fingerprints of directory trees.
///
/// The digest thread pool is built on first use and shared by clones, so
/// repeated lookups reuse the same worker threads.
#[derive(Debug, Clone, Default)]
pub struct Fingerprinter {
    config: FingerprintConfig,
    pool: Arc<OnceLock<ThreadPool>>,
}

impl Fingerprinter {
    /// Create a fingerprinter with the given configuration.
    #[must_use]
    pub fn new(config: FingerprintConfig) -> Self {
        Self {
            config,
            pool: Arc::default(),
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &FingerprintConfig {
        &self.config
    }

    /// Fingerprint the tree rooted at `root`.
    ///
    /// # Errors
    ///
    /// - [`FingerprintError::PathNotFound`] if `root` does not exist
    /// - [`FingerprintError::NotADirectory`] if `root` is not a directory
    /// - [`FingerprintError::Io`] if a listed file cannot be read
    pub fn fingerprint(&self, root: &Path) -> Result<Fingerprint, FingerprintError> {
        let files = self.collect_files(root)?;
        log::debug!(
            "Fingerprinting {} files under {}",
            files.len(),
            root.display()
        );

        let pool = self.pool()?;
        let mut digests = pool.install(|| {
            files
                .par_iter()
                .map(|path| -> Result<String, FingerprintError> {
                    let digest = digest_file(path)?;
                    log::trace!("{} {}", digest, path.display());
                    Ok(digest)
                })
                .collect::<Result<Vec<String>, FingerprintError>>()
        })?;

        let fingerprint = Fingerprint::from_hex(reduce_digests(&mut digests));
        log::debug!("Fingerprint of {}: {}", root.display(), fingerprint);
        Ok(fingerprint)
    }

    /// List the files that contribute to the fingerprint of `root`, in walk order.
    ///
    /// # Errors
    ///
    /// Fails if `root` is missing or not a directory.
    pub fn collect_files(&self, root: &Path) -> Result<Vec<PathBuf>, FingerprintError> {
        let metadata = match std::fs::metadata(root) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FingerprintError::PathNotFound(root.to_path_buf()));
            }
            Err(source) => {
                return Err(FingerprintError::Io {
                    path: root.to_path_buf(),
                    source,
                });
            }
        };
        if !metadata.is_dir() {
            return Err(FingerprintError::NotADirectory(root.to_path_buf()));
        }

        let walk = WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_pruned(entry));

        let mut files = Vec::new();
        for entry in walk {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                    if e.loop_ancestor().is_some() {
                        log::warn!("Skipping symlink loop at {}", path.display());
                    } else {
                        log::warn!("Skipping unreadable entry {}: {}", path.display(), e);
                    }
                    continue;
                }
            };

            if entry.depth() == 0 || !self.is_content_file(&entry) {
                continue;
            }
            files.push(entry.into_path());
        }

        Ok(files)
    }

    /// The digest pool, built with `io_threads` workers on first call.
    fn pool(&self) -> Result<&ThreadPool, FingerprintError> {
        if let Some(pool) = self.pool.get() {
            return Ok(pool);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads.max(1))
            .build()?;
        // A racing caller may have won; its pool is kept and ours dropped.
        Ok(self.pool.get_or_init(|| pool))
    }

    /// Excluded directories are pruned before the walk descends into them.
    fn is_pruned(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && is_directory(entry)
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.config.is_excluded(name))
    }

    fn is_content_file(&self, entry: &DirEntry) -> bool {
        if is_directory(entry) {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        !name.is_empty() && !name.starts_with('.')
    }
}

/// Whether the entry is, or links to, a directory.
///
/// When links are not followed, walkdir reports a symlinked directory as a
/// symlink; it is neither descended nor digested. Links to files and
/// dangling links count as files.
fn is_directory(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_dir() {
        return true;
    }
    file_type.is_symlink() && std::fs::metadata(entry.path()).is_ok_and(|m| m.is_dir())
}
