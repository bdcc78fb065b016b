use std::{env, fs};

use dicomstore_config::config::loader::load_config;
use dicomstore_config::ConfigError;
use dicomstore_core::Level;
use dicomstore_search::{ColumnNaming, Dialect};

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("dicomstore.toml");

    let toml_content = r#"
[storage]
dialect = "sqlserver"
column_naming = "legacy"
device_id = 3

[query]
default_max_records = 25
max_records = 100

[logging]
level = "debug"

[[queryable]]
level = "patient"
tag = "00100010"
vr = "PN"
name = "PatientName"
storable = true

[[queryable]]
level = "study"
tag = "00080020"
vr = "DA"
name = "StudyDate"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 0) A missing file falls back to defaults
    let absent = dir.path().join("absent.toml");
    let defaults = load_config(absent.to_str()).expect("defaults");
    assert!(defaults.queryable.is_empty());
    assert_eq!(defaults.query.max_records, 1000);

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.storage.dialect, Dialect::SqlServer);
    assert_eq!(cfg.storage.device_id, 3);
    assert_eq!(cfg.query.default_max_records, 25);
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.queryable.len(), 2);

    let registry = cfg.build_registry().expect("registry");
    assert_eq!(registry.count_for_level(Level::Patient), 1);

    // 2) Env overrides win over the file
    unsafe {
        env::set_var("DICOMSTORE__STORAGE__DIALECT", "sqlite");
        env::set_var("DICOMSTORE__QUERY__DEFAULT_MAX_RECORDS", "40");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.storage.dialect, Dialect::Sqlite);
    assert_eq!(cfg_env.storage.column_naming, ColumnNaming::Legacy);
    assert_eq!(cfg_env.query.default_max_records, 40);

    // 3) An override that breaks validation is rejected
    unsafe {
        env::set_var("DICOMSTORE__QUERY__DEFAULT_MAX_RECORDS", "500");
    }
    let err = load_config(path.to_str()).expect_err("default above max must fail");
    assert!(matches!(err, ConfigError::Validation(_)));

    unsafe {
        env::remove_var("DICOMSTORE__STORAGE__DIALECT");
        env::remove_var("DICOMSTORE__QUERY__DEFAULT_MAX_RECORDS");
    }

    // 4) Malformed tag entry in the file
    let bad = toml_content.replace("tag = \"00080020\"", "tag = \"0008XX20\"");
    fs::write(&path, bad).expect("write toml");
    let err = load_config(path.to_str()).expect_err("bad tag must fail");
    assert!(matches!(err, ConfigError::InvalidTag { index: 1, .. }));
}

