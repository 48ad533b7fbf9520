use clap::Parser;
use stackcache::cli::Cli;
use stackcache::error::ExitCode;
use stackcache::run_app;
use stackcache::store::KeyValueStore;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn run(store: &Path, args: &[&str]) -> anyhow::Result<ExitCode> {
    let store = store.to_string_lossy().into_owned();
    let config = store.clone() + ".toml";
    let mut argv = vec!["stackcache", "--store", &store, "--config", &config];
    argv.extend_from_slice(args);
    run_app(Cli::parse_from(argv))
}

#[test]
fn test_set_get_delete_keys() {
    let state = tempdir().unwrap();
    let store_path = state.path().join("cache.db");

    assert_eq!(run(&store_path, &["set", "k", "v"]).unwrap(), ExitCode::Success);
    assert_eq!(run(&store_path, &["get", "k"]).unwrap(), ExitCode::Success);
    assert_eq!(run(&store_path, &["keys"]).unwrap(), ExitCode::Success);
    assert_eq!(run(&store_path, &["delete", "k"]).unwrap(), ExitCode::Success);
    assert_eq!(run(&store_path, &["get", "k"]).unwrap(), ExitCode::NoResult);
}

#[test]
fn test_clear() {
    let state = tempdir().unwrap();
    let store_path = state.path().join("cache.db");
    run(&store_path, &["set", "a", "1"]).unwrap();
    run(&store_path, &["set", "b", "2"]).unwrap();

    assert_eq!(run(&store_path, &["clear"]).unwrap(), ExitCode::Success);
    assert!(KeyValueStore::open(&store_path).is_empty().unwrap());
}

#[test]
fn test_fingerprint_missing_directory_is_error() {
    let state = tempdir().unwrap();
    let missing = state.path().join("missing");
    let missing = missing.to_string_lossy();

    let err = run(&state.path().join("cache.db"), &["fingerprint", &missing]).unwrap_err();
    assert!(format!("{:#}", err).contains("Path not found"));
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
}

#[cfg(unix)]
#[test]
fn test_run_caches_command_output() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("main.tf"), "x").unwrap();
    let state = tempdir().unwrap();
    let store_path = state.path().join("cache.db");
    let counter = state.path().join("runs");
    let dir_arg = dir.path().to_string_lossy().into_owned();
    let script = format!("echo run >> '{}'; printf '{{ \"id\": 1 }}'", counter.display());

    for _ in 0..2 {
        let code = run(
            &store_path,
            &["run", &dir_arg, "--key", "id", "--json", "--", "sh", "-c", &script],
        )
        .unwrap();
        assert_eq!(code, ExitCode::Success);
    }

    assert_eq!(fs::read_to_string(&counter).unwrap().lines().count(), 1);

    let store = KeyValueStore::open(&store_path);
    let mut values: Vec<String> = store
        .keys()
        .unwrap()
        .iter()
        .filter_map(|k| store.get(k).unwrap())
        .collect();
    values.sort();
    assert!(values.contains(&r#"{"id":1}"#.to_string()));
}

#[cfg(unix)]
#[test]
fn test_run_empty_output_is_no_result() {
    let dir = tempdir().unwrap();
    let state = tempdir().unwrap();
    let store_path = state.path().join("cache.db");
    let dir_arg = dir.path().to_string_lossy().into_owned();

    let code = run(&store_path, &["run", &dir_arg, "--key", "k", "--", "true"]).unwrap();
    assert_eq!(code, ExitCode::NoResult);
    assert!(KeyValueStore::open(&store_path).is_empty().unwrap());
}

#[cfg(unix)]
#[test]
fn test_run_failure_exit_codes() {
    let dir = tempdir().unwrap();
    let state = tempdir().unwrap();
    let store_path = state.path().join("cache.db");
    let dir_arg = dir.path().to_string_lossy().into_owned();

    let err = run(&store_path, &["run", &dir_arg, "--key", "k", "--", "false"]).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::ProducerFailed);

    let code = run(
        &store_path,
        &["run", &dir_arg, "--key", "k", "--ignore-errors", "--", "false"],
    )
    .unwrap();
    assert_eq!(code, ExitCode::NoResult);
}

#[cfg(unix)]
#[test]
fn test_sweep_after_change() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("main.tf"), "x").unwrap();
    let state = tempdir().unwrap();
    let store_path = state.path().join("cache.db");
    let dir_arg = dir.path().to_string_lossy().into_owned();

    run(&store_path, &["run", &dir_arg, "--key", "k", "--", "echo", "one"]).unwrap();
    fs::write(dir.path().join("main.tf"), "y").unwrap();
    run(&store_path, &["run", &dir_arg, "--key", "k", "--", "echo", "two"]).unwrap();
    assert_eq!(KeyValueStore::open(&store_path).len().unwrap(), 3);

    assert_eq!(run(&store_path, &["sweep"]).unwrap(), ExitCode::Success);
    assert_eq!(KeyValueStore::open(&store_path).len().unwrap(), 2);
}

#[cfg(unix)]
#[test]
fn test_peek_never_runs_anything() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("main.tf"), "x").unwrap();
    let state = tempdir().unwrap();
    let store_path = state.path().join("cache.db");
    let dir_arg = dir.path().to_string_lossy().into_owned();

    let code = run(&store_path, &["peek", &dir_arg, "--key", "k"]).unwrap();
    assert_eq!(code, ExitCode::NoResult);

    run(&store_path, &["run", &dir_arg, "--key", "k", "--", "echo", "one"]).unwrap();
    let code = run(&store_path, &["peek", &dir_arg, "--key", "k"]).unwrap();
    assert_eq!(code, ExitCode::Success);

    // A changed directory no longer matches the cached fingerprint.
    fs::write(dir.path().join("main.tf"), "y").unwrap();
    let code = run(&store_path, &["peek", &dir_arg, "--key", "k"]).unwrap();
    assert_eq!(code, ExitCode::NoResult);
}

#[test]
fn test_malformed_config_is_error() {
    let state = tempdir().unwrap();
    let store_path = state.path().join("cache.db");
    let config_path = state.path().join("broken.toml");
    fs::write(
        &config_path,
        "store_path = \"/work/infra/.stacks/cache\"\nio_threads = \"four\"\n",
    )
    .unwrap();
    let store_arg = store_path.to_string_lossy().into_owned();
    let config_arg = config_path.to_string_lossy().into_owned();

    let result = run_app(Cli::parse_from([
        "stackcache",
        "--store",
        &store_arg,
        "--config",
        &config_arg,
        "set",
        "k",
        "v",
    ]));

    let err = result.unwrap_err();
    assert!(format!("{:#}", err).contains("broken.toml"));
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
    // Nothing was written to any store.
    assert!(!store_path.exists());
}
