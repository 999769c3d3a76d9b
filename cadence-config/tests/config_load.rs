use cadence_config::CadenceConfigLoader;
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
#[serial]
fn test_config_load() {
    let tmp = TempDir::new().unwrap();

    let file_yaml = r#"
version: "0.1"
behavior:
  enabled: true
  humanize_actions: true
  randomize_delays: false
  break_policy:
    enabled: true
    min_actions: 10
    max_actions: 20
    break_duration_minutes: 5
  session_policy:
    enabled: false
    max_session_minutes: 90
"#;
    let p = write_yaml(&tmp, "cadence.yaml", file_yaml);

    let config = CadenceConfigLoader::new()
        .with_file(p)
        .load()
        .expect("load behavior config");

    assert!(config.behavior.enabled);
    assert!(!config.behavior.randomize_delays);
    assert_eq!(config.behavior.break_policy.min_actions, 10);
    assert_eq!(config.behavior.break_policy.max_actions, 20);
    assert_eq!(config.behavior.break_policy.break_duration_minutes, 5);
    assert!(!config.behavior.session_policy.enabled);
    assert_eq!(config.behavior.session_policy.max_session_minutes, 90);
    // Keys absent from the file keep their defaults.
    assert!(config.behavior.simulate_pointer_movement);
    assert!(config.behavior.simulate_scrolling);
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("does-not-exist.yaml");

    let config = CadenceConfigLoader::new()
        .with_file(missing)
        .load_or_default();

    assert!(config.behavior.enabled);
    assert_eq!(config.behavior.break_policy.min_actions, 15);
}

#[test]
#[serial]
fn test_malformed_file_falls_back_to_defaults() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "cadence.yaml", "behavior: [this, is, not, a, map]");

    let config = CadenceConfigLoader::new().with_file(p).load_or_default();

    assert!(config.behavior.humanize_actions);
    assert_eq!(config.behavior.session_policy.max_session_minutes, 45);
}
