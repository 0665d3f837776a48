//! Integration tests for ConfigManager and the YAML path store
//!
//! These tests verify:
//! - Settings loading, saving and defaults
//! - Path store resolution from settings
//! - Loading stored paths into the editor state and saving them back

use camino::Utf8PathBuf;
use pathedit::config::DiscoverySettings;
use pathedit::store::{YamlPathStore, join_path_list};
use pathedit::{ConfigManager, Partition, PathEditorState, PathEntry, PathStore, Settings};
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
}

#[test]
fn test_settings_round_trip() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let settings = Settings {
        extensions: vec![".exe".to_string()],
        cache_ttl_secs: Some(120),
        discovery: DiscoverySettings {
            max_depth: 6,
            skip_dirs: vec![Utf8PathBuf::from("/opt/vendor")],
        },
        store_file: Utf8PathBuf::from("stored/paths.yaml"),
        debug_mode: false,
    };
    manager.save_settings(&settings).unwrap();

    assert_eq!(manager.load_settings().unwrap(), settings);
}

#[test]
fn test_invalid_settings_file_is_an_error() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    fs::write(manager.settings_path(), "discovery:\n  max_depth: deep\n").unwrap();

    assert!(manager.load_settings().is_err());
}

#[test]
fn test_store_file_nested_under_config_dir() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    let settings = Settings {
        store_file: Utf8PathBuf::from("stored/paths.yaml"),
        ..Settings::default()
    };

    let store = manager.path_store(&settings);
    store
        .write(Partition::User, &[PathEntry::new("/home/me/bin")])
        .unwrap();

    assert!(config_path.join("stored/paths.yaml").exists());
}

#[test]
fn test_editor_state_through_yaml_store() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let file = config_path.join("paths.yaml");
    fs::write(
        &file,
        "system:\n- /usr/local/bin\n- /usr/bin\nuser:\n- /home/me/bin\n",
    )
    .unwrap();
    let store = YamlPathStore::new(file);

    let state = PathEditorState::new();
    state.load_from(&store).unwrap();
    assert_eq!(
        join_path_list(&state.entries(Partition::System)),
        "/usr/local/bin;/usr/bin"
    );

    state.move_entry(Partition::System, 1, 0);
    state.add_entries(Partition::User, vec![PathEntry::new("/opt/tools/bin")]);
    assert!(state.is_dirty());

    state.save_to(&store).unwrap();
    assert!(!state.is_dirty());

    let reloaded = PathEditorState::new();
    reloaded.load_from(&store).unwrap();
    assert_eq!(
        join_path_list(&reloaded.entries(Partition::System)),
        "/usr/bin;/usr/local/bin"
    );
    assert_eq!(
        join_path_list(&reloaded.entries(Partition::User)),
        "/home/me/bin;/opt/tools/bin"
    );
}
