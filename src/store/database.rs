//! SQLite-backed key/value store.
//!
//! # Example
//!
//! ```no_run
//! use stackcache::store::KeyValueStore;
//!
//! let store = KeyValueStore::open("/tmp/stackcache/cache.db");
//! store.set("greeting", "hello")?;
//! assert_eq!(store.get("greeting")?.as_deref(), Some("hello"));
//! store.delete("greeting")?;
//! # Ok::<(), stackcache::store::StoreError>(())
//! ```

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a call waits on a lock held by another process before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS entries (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)";

/// Errors raised by [`KeyValueStore`].
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The directory that should contain the store file could not be created.
    #[error("Failed to create store directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The store file could not be created or opened.
    #[error("Failed to open store {path}: {source}")]
    Open {
        /// Path of the store file
        path: PathBuf,
        /// The underlying SQLite error
        #[source]
        source: rusqlite::Error,
    },

    /// A statement against an opened store failed.
    #[error("Store query failed on {path}: {source}")]
    Query {
        /// Path of the store file
        path: PathBuf,
        /// The underlying SQLite error
        #[source]
        source: rusqlite::Error,
    },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable string-to-string mapping backed by a single SQLite file.
///
/// The value is only a path plus settings; no connection is kept open.
/// Cloning it is cheap and every clone addresses the same file.
#[derive(Debug, Clone)]
pub struct KeyValueStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl KeyValueStore {
    /// Prepares a store at `path`.
    ///
    /// Nothing touches the filesystem until the first operation; the file
    /// (and its parent directory) is created on demand.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Override how long a call waits for a lock held by another process.
    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or overwrite `key`.
    pub fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        // Upsert: an existing key is overwritten in place.
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO entries (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map(|_| ())
        })
    }

    /// Fetch the value stored under `key`, or `None` if there is none.
    pub fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT value FROM entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            // QueryReturnedNoRows becomes None
            .optional()
        })
    }

    /// Whether `key` is present.
    pub fn has(&self, key: &str) -> StoreResult<bool> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM entries WHERE key = ?1)",
                params![key],
                |row| row.get(0),
            )
        })
    }

    /// Remove `key`. Removing a missing key is not an error.
    pub fn delete(&self, key: &str) -> StoreResult<()> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM entries WHERE key = ?1", params![key])
                .map(|_| ())
        })
    }

    /// All keys currently present, in no particular order.
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM entries")?;
            let keys = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>();
            keys
        })
    }

    /// Number of stored entries.
    pub fn len(&self) -> StoreResult<usize> {
        self.with_connection(|conn| {
            conn.query_row("SELECT COUNT(*) FROM entries", [], |row| {
                row.get::<_, i64>(0)
            })
        })
        // COUNT(*) is never negative
        .map(|n| usize::try_from(n).unwrap_or(0))
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove every entry unconditionally.
    pub fn clear(&self) -> StoreResult<()> {
        self.with_connection(|conn| conn.execute("DELETE FROM entries", []).map(|_| ()))?;
        log::debug!("Cleared store {}", self.path.display());
        Ok(())
    }

    /// Open the file, ensure the schema, run `op`, close.
    fn with_connection<T>(
        &self,
        op: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> StoreResult<T> {
        let conn = self.connect()?;
        let result = op(&conn).map_err(|source| StoreError::Query {
            path: self.path.clone(),
            source,
        });

        // Close errors are only logged; the operation's result is returned.
        if let Err((_, e)) = conn.close() {
            log::warn!("Failed to close store {}: {}", self.path.display(), e);
        }
        result
    }

    fn connect(&self) -> StoreResult<Connection> {
        // A bare file name has an empty parent; nothing to create then.
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let open_err = |source| StoreError::Open {
            path: self.path.clone(),
            source,
        };

        // Connections never cross threads.
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(open_err)?;
        // Wait for other processes' locks instead of failing with SQLITE_BUSY.
        conn.busy_timeout(self.busy_timeout).map_err(open_err)?;

        // Create-if-missing; also where a corrupt file is first detected.
        conn.execute_batch(SCHEMA).map_err(open_err)?;
        Ok(conn)
    }
}
