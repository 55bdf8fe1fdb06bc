use std::fs;

use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::TempDir;
use zipsync_core::{
    Compression, CompressionMethod, Container, ErrorKind, OrphanPolicy, OverwritePolicy, SyncConfig,
    SyncEngine, SyncOptions,
};

#[test]
fn test_load_toml() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("zipsync.toml");
    fs::write(
        &path,
        "[sync]\noverwrite = \"if-older-and-size-mismatch\"\norphan = \"delete\"\n\n[compression]\nmethod = \"zstd\"\nlevel = 5\n",
    )
    .unwrap();

    let config = SyncConfig::load(&path).unwrap();
    assert_eq!(
        config.sync,
        SyncOptions::new(OverwritePolicy::IfOlderAndSizeMismatch, OrphanPolicy::Delete)
    );
    assert_eq!(config.compression, Compression::new(CompressionMethod::Zstd, Some(5)));
}

#[test]
fn test_load_json_with_missing_fields() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("zipsync.json");
    fs::write(&path, r#"{"sync": {"orphan": "delete"}}"#).unwrap();

    let config = SyncConfig::load(&path).unwrap();
    assert_eq!(config.sync.overwrite, OverwritePolicy::Always);
    assert_eq!(config.sync.orphan, OrphanPolicy::Delete);
    assert_eq!(config.compression, Compression::default());
}

#[test]
fn test_empty_toml_is_default() {
    assert_eq!(SyncConfig::from_toml_str("").unwrap(), SyncConfig::default());
}

#[test]
fn test_unknown_policy_is_rejected() {
    let err = SyncConfig::from_toml_str("[sync]\noverwrite = \"sometimes\"\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[rstest]
#[case::stored_with_level("stored", 3)]
#[case::deflate_too_high("deflated", 10)]
#[case::deflate_negative("deflated", -1)]
#[case::zstd_too_high("zstd", 23)]
fn test_unsupported_compression_level_is_rejected(#[case] method: &str, #[case] level: i32) {
    let content = format!("[compression]\nmethod = \"{}\"\nlevel = {}\n", method, level);
    let err = SyncConfig::from_toml_str(&content).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[test]
fn test_load_rejects_unsupported_compression_level() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("zipsync.json");
    fs::write(&path, r#"{"compression": {"method": "deflated", "level": 12}}"#).unwrap();

    let err = SyncConfig::load(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert!(err.to_string().contains("0..=9"), "{err}");
}

#[test]
fn test_boundary_compression_levels_are_accepted() {
    let config = SyncConfig::from_toml_str("[compression]\nmethod = \"deflated\"\nlevel = 9\n").unwrap();
    assert_eq!(config.compression, Compression::new(CompressionMethod::Deflated, Some(9)));
    assert!(SyncConfig::from_toml_str("[compression]\nmethod = \"stored\"\n").is_ok());
}

#[test]
fn test_unsupported_extension() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("zipsync.yaml");
    fs::write(&path, "sync: {}").unwrap();

    assert!(SyncConfig::load(&path).is_err());
}

#[test]
fn test_save_then_load() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("zipsync.toml");
    let config = SyncConfig {
        sync: SyncOptions::new(OverwritePolicy::IfSizeMismatch, OrphanPolicy::Keep),
        compression: Compression::new(CompressionMethod::Stored, None),
    };

    config.save(&path).unwrap();
    assert_eq!(SyncConfig::load(&path).unwrap(), config);
}

#[test]
fn test_engine_applies_config() {
    let config = SyncConfig {
        sync: SyncOptions::new(OverwritePolicy::Never, OrphanPolicy::Delete),
        compression: Compression::new(CompressionMethod::Stored, None),
    };

    let engine = SyncEngine::local(Container::new()).with_config(&config);
    assert_eq!(engine.options(), config.sync);
    assert_eq!(engine.container().compression(), config.compression);
}
