//! Content-hash keyed result caching for stackcache.
//!
//! This module memoises the output of an expensive, idempotent computation
//! run against a directory (typically a terraform stack), re-running it only
//! when the directory's content changes.
//!
//! # Architecture
//!
//! * [`key`]: how directory pointers and cached results are laid out in the store.
//! * [`coordinator`]: the lookup / produce / store protocol.
//!
//! # Cache Invalidation
//!
//! Each directory has one pointer entry holding its last fingerprint. Results
//! are keyed by `"<fingerprint>:<sub_key>"`, so a single pointer mismatch
//! makes every result for the old state unreachable at once. Those entries
//! are not deleted; [`CacheCoordinator::sweep_orphans`] removes them on
//! request.

pub mod coordinator;
pub mod key;

pub use coordinator::{CacheCoordinator, ComputeError, Lookup, Outcome};
pub use key::{directory_key, CompositeKey, KEY_SEPARATOR};
