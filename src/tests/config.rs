use crate::config::Config;
use crate::storage::{BackendLocal, StorageManager};

fn temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

/// Fresh start: no config.yaml → defaults written to disk
#[test]
fn test_fresh_start_creates_defaults() {
    let dir = temp_dir();
    let base_path = dir.path().to_str().unwrap();
    let store = BackendLocal::new(base_path).unwrap();

    let config = Config::load_with(base_path).unwrap();

    assert!(store.exists("config.yaml"));
    assert_eq!(config.retrieval.model, "all-MiniLM-L6-v2");
    assert_eq!(config.retrieval.similarity_threshold, 0.0);
    assert_eq!(config.retrieval.default_top_n, 3);
    assert_eq!(config.retrieval.search_k, 10);
}

/// Partial config: missing keys get defaults, file is upgraded on disk
#[test]
fn test_partial_config_fills_defaults() {
    let dir = temp_dir();
    let base_path = dir.path().to_str().unwrap();
    let store = BackendLocal::new(base_path).unwrap();

    let config_content = "retrieval:\n  similarity_threshold: 0.5\n";
    store
        .write("config.yaml", config_content.as_bytes())
        .unwrap();

    let config = Config::load_with(base_path).unwrap();

    assert_eq!(config.retrieval.similarity_threshold, 0.5);
    assert_eq!(config.retrieval.default_top_n, 3);
    assert_eq!(config.retrieval.model, "all-MiniLM-L6-v2");

    // upgraded file now carries every key
    let on_disk = String::from_utf8(store.read("config.yaml").unwrap()).unwrap();
    assert!(on_disk.contains("default_top_n"));
    assert!(on_disk.contains("model"));
}

/// Second load must not rewrite the file again
#[test]
fn test_no_resave_on_second_load() {
    let dir = temp_dir();
    let base_path = dir.path().to_str().unwrap();
    let store = BackendLocal::new(base_path).unwrap();

    let _config = Config::load_with(base_path).unwrap();
    let after = String::from_utf8(store.read("config.yaml").unwrap()).unwrap();

    let _config2 = Config::load_with(base_path).unwrap();
    let after2 = String::from_utf8(store.read("config.yaml").unwrap()).unwrap();
    assert_eq!(after, after2, "second load should not trigger another resave");
}

/// Out-of-range values are rejected at load time, not clamped
#[test]
fn test_invalid_config_rejected() {
    let dir = temp_dir();
    let base_path = dir.path().to_str().unwrap();
    let store = BackendLocal::new(base_path).unwrap();

    store
        .write("config.yaml", b"retrieval:\n  similarity_threshold: 1.5\n")
        .unwrap();
    assert!(Config::load_with(base_path).is_err());

    store
        .write("config.yaml", b"retrieval:\n  default_top_n: 0\n")
        .unwrap();
    assert!(Config::load_with(base_path).is_err());

    store
        .write("config.yaml", b"retrieval:\n  model: \"\"\n")
        .unwrap();
    assert!(Config::load_with(base_path).is_err());
}

/// load → modify → save → reload → verify persistence
#[test]
fn test_save_roundtrip() {
    let dir = temp_dir();
    let base_path = dir.path().to_str().unwrap();

    let mut config = Config::load_with(base_path).unwrap();
    config.retrieval.default_top_n = 5;
    config.retrieval.similarity_threshold = 0.25;
    config.save().unwrap();

    let reloaded = Config::load_with(base_path).unwrap();
    assert_eq!(reloaded.retrieval.default_top_n, 5);
    assert_eq!(reloaded.retrieval.similarity_threshold, 0.25);
}
