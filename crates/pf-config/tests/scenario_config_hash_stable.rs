use pf_config::load_layered_yaml_from_strings;

/// scenario_config_hash_stable
///
/// Validates:
/// 1) Reordering keys inside a document does not change the hash.
/// 2) Changing a value changes the hash.
/// 3) The hash is a 64-char lowercase hex digest.

#[test]
fn key_order_does_not_change_hash() {
    let a = r#"
packing:
  pallet_capacity: 12
queue:
  window_hours: 4
"#;
    let b = r#"
queue:
  window_hours: 4
packing:
  pallet_capacity: 12
"#;

    let la = load_layered_yaml_from_strings(&[a]).expect("a loads");
    let lb = load_layered_yaml_from_strings(&[b]).expect("b loads");
    assert_eq!(la.config_hash, lb.config_hash);
    assert_eq!(la.canonical_json, lb.canonical_json);
}

#[test]
fn value_change_changes_hash() {
    let a = load_layered_yaml_from_strings(&["packing:\n  pallet_capacity: 12\n"]).unwrap();
    let b = load_layered_yaml_from_strings(&["packing:\n  pallet_capacity: 10\n"]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn hash_is_hex_sha256() {
    let loaded = load_layered_yaml_from_strings(&["cache:\n  dir: .cache\n"]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded
        .config_hash
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn layered_files_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let site = dir.path().join("site.yaml");
    std::fs::write(&base, "packing:\n  pallet_capacity: 12\n").unwrap();
    std::fs::write(&site, "packing:\n  pallet_capacity: 8\n").unwrap();

    let loaded = pf_config::load_layered_yaml(&[&base, &site]).unwrap();
    let cfg = pf_config::PickingConfig::from_loaded(&loaded).unwrap();
    assert_eq!(cfg.pallet_capacity, 8);
}
