use stackcache::store::{KeyValueStore, StoreError};
use std::fs;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

#[test]
fn test_open_corrupted_store() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();

    // Write garbage to the file
    {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(b"not a sqlite database, just some bytes").unwrap();
    }

    let store = KeyValueStore::open(path);
    assert!(matches!(store.keys(), Err(StoreError::Open { .. })));
    assert!(matches!(store.set("k", "v"), Err(StoreError::Open { .. })));
}

#[test]
fn test_recovery_by_removing_corrupted_file() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();
    fs::write(&path, b"corrupted garbage").unwrap();

    let store = KeyValueStore::open(&path);
    assert!(store.get("k").is_err());

    fs::remove_file(&path).unwrap();
    store.set("k", "v").unwrap();
    assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
}

#[test]
fn test_empty_existing_file_is_initialised() {
    // SQLite treats a zero-length file as a fresh database.
    let temp_file = NamedTempFile::new().unwrap();
    let store = KeyValueStore::open(temp_file.path());

    assert!(store.is_empty().unwrap());
    store.set("k", "v").unwrap();
    assert_eq!(store.len().unwrap(), 1);
}

#[cfg(unix)]
#[test]
fn test_readonly_store_rejects_writes() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let store = KeyValueStore::open(&path);
    store.set("k", "v").unwrap();

    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o444);
    fs::set_permissions(&path, perms).unwrap();

    // Running as root bypasses file permissions; nothing to check then.
    if fs::OpenOptions::new().write(true).open(&path).is_ok() {
        return;
    }

    assert!(store.set("k2", "v2").is_err());
}

#[cfg(unix)]
#[test]
fn test_uncreatable_directory_is_error() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let locked = dir.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();

    if fs::create_dir(locked.join("probe")).is_ok() {
        return;
    }

    let store = KeyValueStore::open(locked.join(".stacks").join("cache"));
    let err = store.set("k", "v").unwrap_err();
    assert!(matches!(err, StoreError::CreateDir { .. }), "got {err:?}");

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).unwrap();
}
