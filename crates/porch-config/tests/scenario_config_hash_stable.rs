//! Config hash stability.
//!
//! GREEN when:
//! - Loading the same YAML twice yields an identical `config_hash`.
//! - Reordering keys within YAML does not change the hash.
//! - A different value produces a different hash.
//! - Layer order matters: later documents override earlier ones.

use porch_config::{load_layered_yaml_from_strings, DaemonConfig};

const BASE_YAML: &str = r#"
server:
  bind_addr: "0.0.0.0:5000"
notifier:
  delay_ms: 5000
  otp_min: 1000
  otp_max: 9999
extraction:
  api_key_env: "GEMINI_API_KEY"
"#;

const BASE_YAML_REORDERED: &str = r#"
extraction:
  api_key_env: "GEMINI_API_KEY"
notifier:
  otp_max: 9999
  otp_min: 1000
  delay_ms: 5000
server:
  bind_addr: "0.0.0.0:5000"
"#;

const OVERLAY_YAML: &str = r#"
notifier:
  delay_ms: 250
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64, "sha256 hex digest");
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();

    assert_eq!(
        a.config_hash, b.config_hash,
        "canonicalization must make key order irrelevant"
    );
}

#[test]
fn overlay_changes_hash_and_overrides_value() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(base.config_hash, layered.config_hash);

    let cfg = DaemonConfig::from_loaded(&layered).unwrap();
    assert_eq!(cfg.notifier.delay_ms, 250);
    // untouched siblings survive the merge
    assert_eq!(cfg.notifier.otp_min, 1000);
    assert_eq!(cfg.server.bind_addr, "0.0.0.0:5000");
}

#[test]
fn reversed_layer_order_is_a_different_config() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[OVERLAY_YAML, BASE_YAML]).unwrap();

    assert_ne!(a.config_hash, b.config_hash);
    assert_eq!(DaemonConfig::from_loaded(&b).unwrap().notifier.delay_ms, 5000);
}
