use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rstest::rstest;
use zipsync_fs::AbsolutePath;
use zipsync_store::{Compression, CompressionMethod, Container, Error, Transform, WriteMode};

fn p(s: &str) -> AbsolutePath {
    AbsolutePath::new(s).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn names(paths: Vec<AbsolutePath>) -> Vec<String> {
    paths.into_iter().map(String::from).collect()
}

#[test]
fn test_new_container_is_empty() {
    let mut container = Container::new();
    assert!(container.image().is_empty());
    assert_eq!(container.num_entries().unwrap(), 0);
    assert!(container.exists(&AbsolutePath::root()).unwrap());
    assert!(container.stat(&AbsolutePath::root()).unwrap().is_none());
}

#[test]
fn test_file_add_creates_parents_and_reads_back() {
    let mut container = Container::new();
    container.file_add(&p("/a/b/c.txt"), b"hello").unwrap();

    assert_eq!(
        names(container.ls(&AbsolutePath::root()).unwrap()),
        vec!["/a/", "/a/b/", "/a/b/c.txt"]
    );
    assert_eq!(container.cat(&p("/a/b/c.txt")).unwrap(), b"hello");
}

#[test]
fn test_image_survives_reload() {
    let mut container = Container::new();
    container.dir_add(&p("/docs/")).unwrap();
    container
        .write_file(&p("/docs/readme.md"), b"# hi", at(0), WriteMode::Create)
        .unwrap();

    let mut reloaded = Container::from_image(container.into_image()).unwrap();
    assert_eq!(reloaded.cat(&p("/docs/readme.md")).unwrap(), b"# hi");
    let stat = reloaded.stat(&p("/docs/readme.md")).unwrap().unwrap();
    assert_eq!(stat.size, 4);
    assert_eq!(stat.mtime, at(0));
}

#[test]
fn test_garbage_image_is_rejected() {
    let result = Container::from_image(b"definitely not a zip".to_vec());
    assert!(matches!(result, Err(Error::Codec { .. })));
}

#[rstest]
#[case::create_existing("/f", WriteMode::Create)]
#[case::replace_missing("/g", WriteMode::Replace)]
fn test_write_mode_preconditions(#[case] path: &str, #[case] mode: WriteMode) {
    let mut container = Container::new();
    container.file_add(&p("/f"), b"1").unwrap();
    let before = container.image().to_vec();

    let err = container.write_file(&p(path), b"2", at(0), mode).unwrap_err();
    assert!(matches!(err, Error::Usage { .. }));
    assert_eq!(container.image(), before.as_slice());
}

#[test]
fn test_replace_updates_content_and_mtime() {
    let mut container = Container::new();
    container.write_file(&p("/f"), b"old", at(0), WriteMode::Create).unwrap();
    container.write_file(&p("/f"), b"newer", at(10), WriteMode::Replace).unwrap();

    assert_eq!(container.cat(&p("/f")).unwrap(), b"newer");
    let stat = container.stat(&p("/f")).unwrap().unwrap();
    assert_eq!(stat.size, 5);
    assert_eq!(stat.mtime, at(10));
    assert_eq!(container.num_entries().unwrap(), 1);
}

#[test]
fn test_file_add_replace_handles_both_cases() {
    let mut container = Container::new();
    container.file_add_replace(&p("/f"), b"1").unwrap();
    container.file_add_replace(&p("/f"), b"2").unwrap();
    assert_eq!(container.cat(&p("/f")).unwrap(), b"2");
}

#[test]
fn test_file_operations_reject_directory_paths() {
    let mut container = Container::new();
    container.dir_add(&p("/d/")).unwrap();
    assert!(matches!(container.cat(&p("/d/")), Err(Error::Usage { .. })));
    assert!(matches!(container.file_delete(&p("/d/")), Err(Error::Usage { .. })));
    assert!(matches!(container.file_add(&p("/d/"), b"x"), Err(Error::Usage { .. })));
}

#[test]
fn test_directory_operations_reject_file_paths() {
    let mut container = Container::new();
    assert!(matches!(container.dir_add(&p("/f")), Err(Error::Usage { .. })));
    assert!(matches!(container.ls(&p("/f")), Err(Error::Usage { .. })));
    assert!(matches!(container.dir_delete(&p("/f")), Err(Error::Usage { .. })));
}

#[test]
fn test_dir_add_is_idempotent() {
    let mut container = Container::new();
    container.dir_add(&p("/a/b/")).unwrap();
    container.dir_add(&p("/a/b/")).unwrap();
    container.dir_add(&p("/a/")).unwrap();
    assert_eq!(container.num_entries().unwrap(), 2);
}

#[test]
fn test_dir_delete_removes_subtree_only() {
    let mut container = Container::new();
    container.file_add(&p("/a/x"), b"").unwrap();
    container.file_add(&p("/a/y/z"), b"").unwrap();
    container.file_add(&p("/ab"), b"").unwrap();

    assert_eq!(container.dir_delete(&p("/a/")).unwrap(), 4);
    assert_eq!(names(container.ls(&AbsolutePath::root()).unwrap()), vec!["/ab"]);
}

#[test]
fn test_dir_delete_on_root_empties_container() {
    let mut container = Container::new();
    container.file_add(&p("/a/x"), b"1").unwrap();
    assert_eq!(container.dir_delete(&AbsolutePath::root()).unwrap(), 2);
    assert!(container.image().is_empty());
}

#[test]
fn test_file_rename_moves_entry() {
    let mut container = Container::new();
    container.file_add(&p("/a.txt"), b"data").unwrap();
    container.file_rename(&p("/a.txt"), &p("/sub/b.txt")).unwrap();

    assert!(!container.exists(&p("/a.txt")).unwrap());
    assert_eq!(container.cat(&p("/sub/b.txt")).unwrap(), b"data");
    assert!(container.exists(&p("/sub/")).unwrap());
}

#[test]
fn test_file_rename_refuses_to_clobber() {
    let mut container = Container::new();
    container.file_add(&p("/a"), b"1").unwrap();
    container.file_add(&p("/b"), b"2").unwrap();
    assert!(matches!(
        container.file_rename(&p("/a"), &p("/b")),
        Err(Error::Usage { .. })
    ));
    assert!(matches!(
        container.file_rename(&p("/missing"), &p("/c")),
        Err(Error::Usage { .. })
    ));
}

#[test]
fn test_dir_rename_moves_subtree() {
    let mut container = Container::new();
    container.file_add(&p("/src/lib.rs"), b"lib").unwrap();
    container.file_add(&p("/src/bin/main.rs"), b"main").unwrap();

    container.dir_rename(&p("/src/"), &p("/pkg/code/")).unwrap();

    assert_eq!(
        names(container.ls(&AbsolutePath::root()).unwrap()),
        vec!["/pkg/", "/pkg/code/", "/pkg/code/bin/", "/pkg/code/bin/main.rs", "/pkg/code/lib.rs"]
    );
    assert_eq!(container.cat(&p("/pkg/code/bin/main.rs")).unwrap(), b"main");
}

#[test]
fn test_dir_rename_into_itself_is_rejected() {
    let mut container = Container::new();
    container.dir_add(&p("/a/")).unwrap();
    assert!(matches!(
        container.dir_rename(&p("/a/"), &p("/a/b/")),
        Err(Error::Usage { .. })
    ));
}

#[test]
fn test_list_reports_stats_under_directory() {
    let mut container = Container::new();
    container.write_file(&p("/d/one"), b"1", at(0), WriteMode::Create).unwrap();
    container.write_file(&p("/d/two"), b"22", at(2), WriteMode::Create).unwrap();
    container.write_file(&p("/other"), b"333", at(4), WriteMode::Create).unwrap();

    let listing = container.list(&p("/d/")).unwrap();
    let summary: Vec<(String, u64)> = listing
        .into_iter()
        .map(|(path, stat)| (path.to_string(), stat.size))
        .collect();
    assert_eq!(
        summary,
        vec![("/d/".to_string(), 0), ("/d/one".to_string(), 1), ("/d/two".to_string(), 2)]
    );
}

#[test]
fn test_set_mtime_changes_entry_time() {
    let mut container = Container::new();
    container.write_file(&p("/f"), b"x", at(0), WriteMode::Create).unwrap();
    container.set_mtime(&p("/f"), at(100)).unwrap();
    assert_eq!(container.stat(&p("/f")).unwrap().unwrap().mtime, at(100));
}

#[rstest]
#[case(CompressionMethod::Stored)]
#[case(CompressionMethod::Deflated)]
#[case(CompressionMethod::Zstd)]
fn test_compression_setting_applies_to_new_entries(#[case] method: CompressionMethod) {
    let mut container = Container::new();
    container.set_compression(Compression::new(method, None));
    container.file_add(&p("/data.bin"), &[7u8; 4096]).unwrap();

    let mut reloaded = Container::from_image(container.into_image()).unwrap();
    let stat = reloaded.stat(&p("/data.bin")).unwrap().unwrap();
    assert_eq!(stat.compression, method);
    assert_eq!(reloaded.cat(&p("/data.bin")).unwrap(), vec![7u8; 4096]);
}

#[test]
fn test_transforms_round_trip_when_both_enabled() {
    let xor: Transform =
        Arc::new(|_: &AbsolutePath, data: &[u8]| data.iter().map(|b| b ^ 0xa5).collect());
    let mut container = Container::new();
    container.set_encrypt_fn(Some(xor.clone()));
    container.set_decrypt_fn(Some(xor));
    container.set_encrypt(true);

    container.file_add(&p("/s"), b"secret").unwrap();
    assert_ne!(container.cat(&p("/s")).unwrap(), b"secret");

    container.set_decrypt(true);
    assert_eq!(container.cat(&p("/s")).unwrap(), b"secret");
}

#[test]
fn test_checkpoint_tracks_and_reverts_modifications() {
    let mut container = Container::new();
    container.file_add(&p("/keep"), b"1").unwrap();
    container.image_update().unwrap();
    assert!(!container.has_modifications());

    container.file_add(&p("/drop"), b"2").unwrap();
    assert!(container.has_modifications());

    container.revert_to_image();
    assert!(!container.has_modifications());
    assert_eq!(names(container.ls(&AbsolutePath::root()).unwrap()), vec!["/keep"]);
}

#[test]
fn test_snapshot_restore_round_trip() {
    let mut container = Container::new();
    container.file_add(&p("/a"), b"1").unwrap();
    let snapshot = container.snapshot().unwrap();

    container.file_delete(&p("/a")).unwrap();
    container.file_add(&p("/b"), b"2").unwrap();
    container.restore(snapshot.clone());

    assert_eq!(container.image(), snapshot.image());
    assert_eq!(container.cat(&p("/a")).unwrap(), b"1");
}

#[test]
fn test_store_errors_carry_container_path() {
    let mut container = Container::new();
    container.file_add(&p("/a"), b"1").unwrap();
    let err = container.file_delete(&p("/nope")).unwrap_err();
    assert_eq!(err.container_path(), Some(&p("/nope")));
}
