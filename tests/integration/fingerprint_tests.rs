use filetime::{set_file_mtime, FileTime};
use stackcache::fingerprint::{FingerprintConfig, FingerprintError, Fingerprinter};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn fingerprint(dir: &Path) -> String {
    Fingerprinter::new(FingerprintConfig::default().exclude("outputs"))
        .fingerprint(dir)
        .unwrap()
        .to_string()
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_repeated_calls_agree() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.tf", "resource \"null_resource\" \"a\" {}");
    write(dir.path(), "env/prod.tfvars", "region = \"eu-west-1\"");

    assert_eq!(fingerprint(dir.path()), fingerprint(dir.path()));
}

#[test]
fn test_creation_order_does_not_matter() {
    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    let files = [
        ("z.tf", "z"),
        ("a.tf", "a"),
        ("mod/m.tf", "m"),
        ("mod/deep/d.tf", "d"),
        ("b.tfvars", "b"),
    ];

    for (rel, content) in files {
        write(a.path(), rel, content);
    }
    for (rel, content) in files.iter().rev() {
        write(b.path(), rel, content);
    }

    assert_eq!(fingerprint(a.path()), fingerprint(b.path()));
}

#[test]
fn test_modification_time_is_ignored() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.tf", "x");
    let before = fingerprint(dir.path());

    set_file_mtime(dir.path().join("main.tf"), FileTime::from_unix_time(0, 0)).unwrap();
    assert_eq!(fingerprint(dir.path()), before);
}

#[test]
fn test_single_byte_change_is_detected() {
    let dir = tempdir().unwrap();
    write(dir.path(), "mod/main.tf", "count = 1");
    let before = fingerprint(dir.path());

    write(dir.path(), "mod/main.tf", "count = 2");
    assert_ne!(fingerprint(dir.path()), before);
}

#[test]
fn test_new_and_removed_files_are_detected() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.tf", "x");
    let before = fingerprint(dir.path());

    write(dir.path(), "extra.tf", "y");
    let with_extra = fingerprint(dir.path());
    assert_ne!(with_extra, before);

    fs::remove_file(dir.path().join("extra.tf")).unwrap();
    assert_eq!(fingerprint(dir.path()), before);
}

#[test]
fn test_excluded_subtree_is_ignored_at_any_depth() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.tf", "x");
    write(dir.path(), "layers/prod/main.tf", "y");
    let before = fingerprint(dir.path());

    write(dir.path(), "outputs/plan.json", "{}");
    write(dir.path(), "layers/prod/outputs/state.json", "{\"v\":1}");
    assert_eq!(fingerprint(dir.path()), before);

    write(dir.path(), "outputs/plan.json", "{\"changed\":true}");
    assert_eq!(fingerprint(dir.path()), before);
}

#[test]
fn test_dotfiles_are_ignored_but_dot_directories_are_not() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.tf", "x");
    let before = fingerprint(dir.path());

    write(dir.path(), ".terraform.lock.hcl", "lock");
    write(dir.path(), "mod/.hidden", "h");
    assert_eq!(fingerprint(dir.path()), before);

    write(dir.path(), ".terraform/providers.txt", "aws");
    assert_ne!(fingerprint(dir.path()), before);
}

#[test]
fn test_content_moves_are_not_detected() {
    // Only contents are digested; renaming a file keeps the fingerprint.
    let dir = tempdir().unwrap();
    write(dir.path(), "a.tf", "x");
    let before = fingerprint(dir.path());

    fs::rename(dir.path().join("a.tf"), dir.path().join("b.tf")).unwrap();
    assert_eq!(fingerprint(dir.path()), before);
}

#[test]
fn test_checkout_and_copy_agree() {
    let original = tempdir().unwrap();
    write(original.path(), "main.tf", "x");
    write(original.path(), "modules/net/main.tf", "net");
    write(original.path(), "modules/net/vars.tf", "vars");

    let copy = tempdir().unwrap();
    for rel in ["modules/net/vars.tf", "main.tf", "modules/net/main.tf"] {
        let content = fs::read_to_string(original.path().join(rel)).unwrap();
        write(copy.path(), rel, &content);
    }

    assert_eq!(fingerprint(original.path()), fingerprint(copy.path()));
}

#[test]
fn test_missing_directory_fails_fast() {
    let dir = tempdir().unwrap();
    let result = Fingerprinter::default().fingerprint(&dir.path().join("missing"));

    match result {
        Err(FingerprintError::PathNotFound(path)) => {
            assert!(path.ends_with("missing"));
        }
        other => panic!("Expected PathNotFound error, got {:?}", other),
    }
}

#[test]
fn test_empty_directory_is_stable() {
    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    write(b.path(), "outputs/only_excluded.json", "{}");
    write(b.path(), ".only_hidden", "x");

    assert_eq!(fingerprint(a.path()), fingerprint(b.path()));
    assert_eq!(fingerprint(a.path()).len(), 128);
}
