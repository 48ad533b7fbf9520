//! Store key layout.
//!
//! Two kinds of key share the store:
//!
//! - a directory pointer, keyed by the canonical absolute directory path,
//!   holding that directory's latest fingerprint
//! - a cached result, keyed by `"<fingerprint>:<sub_key>"`
//!
//! A result is reachable only while its directory pointer holds the
//! fingerprint embedded in its key.

use std::fmt;
use std::path::Path;

use crate::fingerprint::Fingerprint;

/// Separator between the fingerprint and the sub-key.
pub const KEY_SEPARATOR: char = ':';

/// Key of a cached result for one directory state and one sub-key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeKey {
    /// Fingerprint of the directory state the result belongs to.
    pub fingerprint: Fingerprint,
    /// Caller-chosen logical key, e.g. an output name.
    pub sub_key: String,
}

impl CompositeKey {
    /// Build the key for `sub_key` under `fingerprint`.
    #[must_use]
    pub fn new(fingerprint: Fingerprint, sub_key: impl Into<String>) -> Self {
        Self {
            fingerprint,
            sub_key: sub_key.into(),
        }
    }

    /// Recognise a store key as a composite key.
    ///
    /// Returns `None` for directory pointers and anything else whose prefix
    /// before the first separator is not a fingerprint.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        let (prefix, sub_key) = key.split_once(KEY_SEPARATOR)?;
        let fingerprint = Fingerprint::parse(prefix)?;
        Some(Self::new(fingerprint, sub_key))
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.fingerprint, KEY_SEPARATOR, self.sub_key)
    }
}

/// Store key of the fingerprint pointer for `dir`.
///
/// `dir` should already be canonical so that every spelling of the same
/// directory maps to one pointer. Returns `None` for paths that are not
/// valid UTF-8: a lossy conversion would let distinct directories share a
/// pointer.
#[must_use]
pub fn directory_key(dir: &Path) -> Option<&str> {
    dir.to_str()
}
