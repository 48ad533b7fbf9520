//! Persistent key/value storage for cached results.
//!
//! The store is a plain string-to-string mapping kept in a single SQLite
//! file. It knows nothing about fingerprints or directories; the
//! [`crate::cache`] module layers that meaning on top.
//!
//! # Access discipline
//!
//! No connection is held between calls. Every operation opens the file,
//! runs one statement and closes it again, so:
//!
//! * a crash between two calls never leaves a half-applied statement behind
//! * several processes can share one store file, with SQLite serialising
//!   individual calls (a busy timeout absorbs short lock contention)
//! * there is no atomicity across calls; callers must tolerate interleaving

pub mod database;

pub use database::{KeyValueStore, StoreError, StoreResult, DEFAULT_BUSY_TIMEOUT};
