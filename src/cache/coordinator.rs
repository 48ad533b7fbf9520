//! Fingerprint-checked memoisation of expensive per-directory results.
//!
//! # Example
//!
//! ```no_run
//! use stackcache::cache::CacheCoordinator;
//! use stackcache::fingerprint::{FingerprintConfig, Fingerprinter};
//! use stackcache::store::KeyValueStore;
//! use std::convert::Infallible;
//! use std::path::Path;
//!
//! let cache = CacheCoordinator::new(
//!     KeyValueStore::open("/tmp/stackcache/cache.db"),
//!     Fingerprinter::new(FingerprintConfig::default().exclude("outputs")),
//! );
//! let lookup = cache
//!     .get_or_compute(Path::new("stacks/vpc"), "vpc_id", || {
//!         Ok::<_, Infallible>(Some("vpc-0abc".to_string()))
//!     })
//!     .unwrap();
//! println!("{:?} ({})", lookup.value, lookup.outcome);
//! ```

use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::fingerprint::{Fingerprint, FingerprintError, Fingerprinter};
use crate::store::{KeyValueStore, StoreError};

use super::key::{directory_key, CompositeKey};

/// Errors returned by [`CacheCoordinator::get_or_compute`].
///
/// `E` is the producer's own error type, returned untouched.
#[derive(thiserror::Error, Debug)]
pub enum ComputeError<E>
where
    E: std::error::Error + 'static,
{
    /// The directory could not be fingerprinted.
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The canonical directory path is not valid UTF-8 and cannot be
    /// used as a store key without colliding with other paths.
    #[error("Directory path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    /// The producer failed; nothing was written.
    #[error(transparent)]
    Producer(E),
}

/// How a lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Returned from the store; the producer was not called.
    Hit,
    /// The producer ran and its value was stored.
    Stored,
    /// The producer ran and had nothing to return; nothing was stored.
    Absent,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Hit => write!(f, "hit"),
            Outcome::Stored => write!(f, "stored"),
            Outcome::Absent => write!(f, "absent"),
        }
    }
}

/// Result of [`CacheCoordinator::get_or_compute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    /// The cached or freshly produced value.
    pub value: Option<String>,
    /// Whether the value came from the store.
    pub outcome: Outcome,
    /// Fingerprint the value is keyed under.
    pub fingerprint: Fingerprint,
}

impl Lookup {
    /// Consume the lookup, keeping only the value.
    #[must_use]
    pub fn into_value(self) -> Option<String> {
        self.value
    }

    /// Whether the producer was skipped.
    #[must_use]
    pub fn is_hit(&self) -> bool {
        self.outcome == Outcome::Hit
    }
}

/// Ties a [`Fingerprinter`] to a [`KeyValueStore`].
///
/// Each store call opens and closes the file on its own; a lookup is a
/// sequence of such calls and may interleave with other processes doing
/// the same. The worst case is duplicate producer work, never a stale hit.
#[derive(Debug, Clone)]
pub struct CacheCoordinator {
    store: KeyValueStore,
    fingerprinter: Fingerprinter,
}

impl CacheCoordinator {
    /// Create a coordinator over `store`.
    #[must_use]
    pub fn new(store: KeyValueStore, fingerprinter: Fingerprinter) -> Self {
        Self {
            store,
            fingerprinter,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &KeyValueStore {
        &self.store
    }

    /// The fingerprinter used for directories.
    #[must_use]
    pub fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    /// Return the value cached for `sub_key` under the current state of
    /// `dir`, calling `producer` only when there is none.
    ///
    /// A produced `Some` value replaces the directory's fingerprint pointer
    /// and is stored under the new composite key. A produced `None` is
    /// returned without touching the store, so the next call asks again.
    ///
    /// # Errors
    ///
    /// Fingerprinting and store failures are returned as-is, and so is a
    /// producer error, in which case nothing is written. A directory whose
    /// canonical path is not valid UTF-8 is rejected with
    /// [`ComputeError::NonUtf8Path`] before anything runs.
    pub fn get_or_compute<F, E>(
        &self,
        dir: &Path,
        sub_key: &str,
        producer: F,
    ) -> Result<Lookup, ComputeError<E>>
    where
        F: FnOnce() -> Result<Option<String>, E>,
        E: std::error::Error + 'static,
    {
        let (dir, pointer_key) = locate(dir)?;
        let current = self.fingerprinter.fingerprint(&dir)?;
        let stored = self.store.get(&pointer_key)?;
        let composite = CompositeKey::new(current.clone(), sub_key).to_string();

        // A hit needs both the pointer at the current fingerprint and a result
        // under it; a missing result falls through to the producer.
        if stored.as_deref() == Some(current.as_str()) {
            if let Some(value) = self.store.get(&composite)? {
                log::debug!("Cache hit for {} [{}]", dir.display(), sub_key);
                return Ok(Lookup {
                    value: Some(value),
                    outcome: Outcome::Hit,
                    fingerprint: current,
                });
            }
        }

        log::debug!(
            "Cache miss for {} [{}] ({})",
            dir.display(),
            sub_key,
            if stored.is_some() {
                "sub-key not cached or directory changed"
            } else {
                "directory not seen before"
            }
        );

        // Producer errors leave the store untouched.
        let Some(value) = producer().map_err(ComputeError::Producer)? else {
            // "No result" is never cached, so the next call asks again.
            log::debug!("Producer returned no result for {} [{}]", dir.display(), sub_key);
            return Ok(Lookup {
                value: None,
                outcome: Outcome::Absent,
                fingerprint: current,
            });
        };

        // Pointer first, then the result. Results keyed under the previous
        // fingerprint are left behind as orphans.
        self.store.delete(&pointer_key)?;
        self.store.set(&pointer_key, current.as_str())?;
        self.store.set(&composite, &value)?;
        log::debug!("Stored result for {} [{}]", dir.display(), sub_key);

        Ok(Lookup {
            value: Some(value),
            outcome: Outcome::Stored,
            fingerprint: current,
        })
    }

    /// Read the cached value for `sub_key` without ever producing one.
    ///
    /// Returns `None` when [`get_or_compute`](Self::get_or_compute) would
    /// have to call its producer.
    ///
    /// # Errors
    ///
    /// Fingerprinting and store failures.
    pub fn peek(
        &self,
        dir: &Path,
        sub_key: &str,
    ) -> Result<Option<String>, ComputeError<Infallible>> {
        let (dir, pointer_key) = locate(dir)?;
        let current = self.fingerprinter.fingerprint(&dir)?;
        if self.store.get(&pointer_key)?.as_deref() != Some(current.as_str()) {
            return Ok(None);
        }
        Ok(self.store.get(&CompositeKey::new(current, sub_key).to_string())?)
    }

    /// Drop the fingerprint pointer for `dir`.
    ///
    /// Every result cached for the directory becomes unreachable; the
    /// entries themselves stay until [`sweep_orphans`](Self::sweep_orphans).
    ///
    /// # Errors
    ///
    /// Fails if the directory does not exist or the store fails.
    pub fn invalidate(&self, dir: &Path) -> Result<(), ComputeError<Infallible>> {
        let (dir, pointer_key) = locate(dir)?;
        self.store.delete(&pointer_key)?;
        log::debug!("Invalidated {}", dir.display());
        Ok(())
    }

    /// Delete cached results whose fingerprint no directory pointer holds.
    ///
    /// This is never done implicitly: lookups leave superseded entries in
    /// place. Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn sweep_orphans(&self) -> Result<usize, StoreError> {
        let keys = self.store.keys()?;

        // Split keys into results and pointers; a pointer's value is a live
        // fingerprint.
        let mut live = HashSet::new();
        let mut results = Vec::new();
        for key in keys {
            match CompositeKey::parse(&key) {
                Some(composite) => results.push((key, composite.fingerprint)),
                None => {
                    if let Some(fingerprint) = self
                        .store
                        .get(&key)?
                        .as_deref()
                        .and_then(Fingerprint::parse)
                    {
                        live.insert(fingerprint);
                    }
                }
            }
        }

        let mut removed = 0;
        for (key, fingerprint) in results {
            if !live.contains(&fingerprint) {
                self.store.delete(&key)?;
                removed += 1;
            }
        }

        log::info!("Swept {} orphaned entries", removed);
        Ok(removed)
    }

    /// Remove every entry from the store.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.clear()
    }
}

/// Canonical directory path and its pointer key.
fn locate<E>(dir: &Path) -> Result<(PathBuf, String), ComputeError<E>>
where
    E: std::error::Error + 'static,
{
    let dir = canonical_dir(dir)?;
    match directory_key(&dir).map(str::to_owned) {
        Some(key) => Ok((dir, key)),
        None => Err(ComputeError::NonUtf8Path(dir)),
    }
}

fn canonical_dir(dir: &Path) -> Result<PathBuf, FingerprintError> {
    std::fs::canonicalize(dir).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            FingerprintError::PathNotFound(dir.to_path_buf())
        } else {
            FingerprintError::Io {
                path: dir.to_path_buf(),
                source,
            }
        }
    })
}
