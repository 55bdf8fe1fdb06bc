use std::fs;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use zipsync_fs::{EntryKind, Error, FileSystem, LocalFileSystem};

fn fixture() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("b/inner")).unwrap();
    fs::write(temp.path().join("b/inner/deep.txt"), "deep").unwrap();
    fs::write(temp.path().join("b/one.txt"), "1").unwrap();
    fs::write(temp.path().join("a.txt"), "hello").unwrap();
    fs::create_dir(temp.path().join("c")).unwrap();
    temp
}

#[test]
fn test_walk_is_depth_first_in_name_order() {
    let temp = fixture();
    let fs_ = LocalFileSystem::new();

    let walked: Vec<PathBuf> = fs_
        .walk(temp.path())
        .unwrap()
        .map(|e| e.unwrap().path.strip_prefix(temp.path()).unwrap().to_path_buf())
        .collect();

    let expected: Vec<PathBuf> = ["a.txt", "b", "b/inner", "b/inner/deep.txt", "b/one.txt", "c"]
        .iter()
        .map(PathBuf::from)
        .collect();
    assert_eq!(walked, expected);
}

#[test]
fn test_walk_reports_kinds_and_sizes() {
    let temp = fixture();
    let fs_ = LocalFileSystem::new();

    for entry in fs_.walk(temp.path()).unwrap() {
        let entry = entry.unwrap();
        if entry.path.ends_with("a.txt") {
            assert_eq!(entry.metadata.kind, EntryKind::File);
            assert_eq!(entry.metadata.size, 5);
        }
        if entry.path.ends_with("c") {
            assert_eq!(entry.metadata.kind, EntryKind::Directory);
            assert_eq!(entry.metadata.size, 0);
        }
    }
}

#[test]
fn test_walk_of_missing_root_fails() {
    let temp = TempDir::new().unwrap();
    let fs = LocalFileSystem::new();
    let result = fs.walk(&temp.path().join("missing"));
    assert!(matches!(result, Err(Error::NotADirectory { .. })));
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_not_followed() {
    let temp = fixture();
    std::os::unix::fs::symlink(temp.path().join("b"), temp.path().join("link")).unwrap();
    let fs_ = LocalFileSystem::new();

    let meta = fs_.stat(&temp.path().join("link")).unwrap().unwrap();
    assert_eq!(meta.kind, EntryKind::Other);

    let walked = fs_.walk(temp.path()).unwrap().count();
    // a.txt, b, b/inner, b/inner/deep.txt, b/one.txt, c, link
    assert_eq!(walked, 7);
}

#[test]
fn test_write_all_without_truncate_refuses_existing() {
    let temp = fixture();
    let fs_ = LocalFileSystem::new();

    let err = fs_.write_all(&temp.path().join("a.txt"), b"x", false).unwrap_err();
    assert!(matches!(err, Error::AlreadyExists { .. }));
    assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "hello");
}

#[test]
fn test_write_all_with_truncate_replaces_content() {
    let temp = fixture();
    let fs_ = LocalFileSystem::new();

    fs_.write_all(&temp.path().join("a.txt"), b"bye", true).unwrap();
    assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "bye");
}

#[test]
fn test_write_all_creates_parents() {
    let temp = TempDir::new().unwrap();
    let fs_ = LocalFileSystem::new();
    let target = temp.path().join("x/y/z.bin");

    fs_.write_all(&target, &[1, 2, 3], false).unwrap();
    assert_eq!(fs_.read_all(&target).unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_set_mtime_round_trips_whole_seconds() {
    let temp = fixture();
    let fs_ = LocalFileSystem::new();
    let when = Utc.with_ymd_and_hms(2020, 5, 17, 8, 30, 15).unwrap();

    fs_.set_mtime(&temp.path().join("a.txt"), when).unwrap();
    fs_.set_mtime(&temp.path().join("c"), when).unwrap();

    assert_eq!(fs_.stat(&temp.path().join("a.txt")).unwrap().unwrap().mtime, when);
    assert_eq!(fs_.stat(&temp.path().join("c")).unwrap().unwrap().mtime, when);
}

#[test]
fn test_delete_directory_fails_when_not_empty() {
    let temp = fixture();
    let fs_ = LocalFileSystem::new();

    assert!(fs_.delete_directory(&temp.path().join("b")).is_err());
    fs_.delete_directory(&temp.path().join("c")).unwrap();
    assert!(!fs_.exists(&temp.path().join("c")));
}

#[test]
fn test_stat_missing_is_none() {
    let temp = TempDir::new().unwrap();
    assert!(LocalFileSystem::new().stat(&temp.path().join("nope")).unwrap().is_none());
}
