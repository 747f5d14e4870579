//! End-to-end synchronization of real directory trees

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use super::*;
use crate::SYNC_DB_FILE_NAME;
use crate::comparison::{CompareOptions, CompareProcess, FolderPair};
use crate::direction::{PairDirection, redetermine_all};
use crate::hierarchy::{
    CategoryDirections, CompareResult, DirectionConfig, ItemDescriptor, SyncDirection, SyncOperation,
    all_elements_equal,
};
use crate::native::{from_unix_time, set_mtime};
use crate::status::{AbortFlag, CollectingCallback};

fn create_test_file(dir: &Path, rel_path: &str, content: &str, mtime: i64) {
    let path = dir.join(rel_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    set_mtime(&path, from_unix_time(mtime)).unwrap();
}

fn mirror() -> DirectionConfig {
    DirectionConfig::ByCategory(CategoryDirections::mirror())
}

fn two_way() -> DirectionConfig {
    DirectionConfig::ByCategory(CategoryDirections::two_way())
}

fn plan(left: &Path, right: &Path, config: DirectionConfig) -> FolderComparison {
    let mut callback = CollectingCallback::new();
    let mut cmp = CompareProcess::new(CompareOptions::default())
        .start_compare_process(&[FolderPair::new(left, right)], &mut callback)
        .unwrap();
    redetermine_all(&mut cmp, &[PairDirection::new(config)], &mut callback).unwrap();
    cmp
}

fn permanent() -> FolderPairSyncCfg {
    FolderPairSyncCfg {
        deletion: DeletionPolicy::Permanent,
        ..FolderPairSyncCfg::default()
    }
}

fn automatic() -> FolderPairSyncCfg {
    FolderPairSyncCfg {
        automatic_mode: true,
        ..permanent()
    }
}

fn run(cmp: &mut FolderComparison, cfg: &FolderPairSyncCfg) -> (Result<SyncResult>, CollectingCallback) {
    let mut callback = CollectingCallback::new();
    let result = SyncProcess::new(SyncOptions::default(), &mut callback).start_synchronization(cmp, &[cfg.clone()]);
    (result, callback)
}

#[test]
fn test_mirror_copies_left_only_file() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    create_test_file(left.path(), "a.txt", &"x".repeat(100), 1000);

    let mut cmp = plan(left.path(), right.path(), mirror());
    let (result, callback) = run(&mut cmp, &permanent());
    let result = result.unwrap();

    assert_eq!(result.created, 1);
    assert!(result.is_success());
    let meta = fs::metadata(right.path().join("a.txt")).unwrap();
    assert_eq!(meta.len(), 100);
    assert_eq!(crate::native::to_unix_time(meta.modified().unwrap()), 1000);

    // the model reflects the new state
    let h = cmp[0].hierarchy();
    let id = h.ids()[0];
    assert_eq!(h.node(id).category(), CompareResult::Equal);
    assert_eq!(h.node(id).sync_operation(), SyncOperation::Equal);
    assert_eq!(callback.items_processed, 1);
    assert_eq!(callback.bytes_processed, 100);
}

#[test]
fn test_second_comparison_is_equal() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    create_test_file(left.path(), "a.txt", "alpha", 1000);
    create_test_file(left.path(), "docs/b.txt", "beta", 1000);
    create_test_file(left.path(), "docs/deep/c.txt", "gamma", 1000);
    create_test_file(right.path(), "stale/old.txt", "old", 1000);
    create_test_file(right.path(), "a.txt", "outdated", 500);

    let mut cmp = plan(left.path(), right.path(), mirror());
    let (result, callback) = run(&mut cmp, &permanent());
    let result = result.unwrap();

    assert_eq!(result.overwritten, 1);
    assert_eq!(result.deleted, 1);
    assert!(!right.path().join("stale").exists());
    assert_eq!(fs::read_to_string(right.path().join("a.txt")).unwrap(), "alpha");
    assert_eq!(fs::read_to_string(right.path().join("docs/deep/c.txt")).unwrap(), "gamma");
    assert!(all_elements_equal(&cmp));

    // deleting "stale" also accounts for the file inside it
    let planned = 1 + 4 + 2;
    assert_eq!(callback.items_processed, planned);

    let again = plan(left.path(), right.path(), mirror());
    assert!(all_elements_equal(&again));
    assert!(!SyncStatistics::new(&again).synchronization_needed());
}

#[test]
fn test_two_way_newer_file_wins() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    create_test_file(left.path(), "shared.txt", "old", 1000);
    create_test_file(right.path(), "shared.txt", "new content", 2000);
    create_test_file(right.path(), "right-only.txt", "r", 1000);

    let mut cmp = plan(left.path(), right.path(), two_way());
    let (result, _) = run(&mut cmp, &permanent());
    let result = result.unwrap();

    assert_eq!(result.overwritten, 1);
    assert_eq!(result.created, 1);
    assert_eq!(fs::read_to_string(left.path().join("shared.txt")).unwrap(), "new content");
    assert!(left.path().join("right-only.txt").exists());
}

#[test]
fn test_abort_before_execution() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    create_test_file(left.path(), "a.txt", "a", 1000);

    let mut cmp = plan(left.path(), right.path(), mirror());
    let abort = AbortFlag::new();
    abort.request();
    let mut callback = CollectingCallback::with_abort(abort);
    let result = SyncProcess::new(SyncOptions::default(), &mut callback).start_synchronization(&mut cmp, &[permanent()]);

    assert!(result.unwrap_err().is_abort());
    assert!(!right.path().join("a.txt").exists());
}

#[test]
fn test_custom_deletion_directory() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    let trash = TempDir::new().unwrap();
    create_test_file(right.path(), "sub/old.txt", "keep me", 1000);
    create_test_file(left.path(), "sub/new.txt", "n", 1000);

    let mut cmp = plan(left.path(), right.path(), mirror());
    let cfg = FolderPairSyncCfg {
        deletion: DeletionPolicy::CustomDirectory(trash.path().to_path_buf()),
        ..FolderPairSyncCfg::default()
    };
    let (result, _) = run(&mut cmp, &cfg);
    result.unwrap();

    assert!(!right.path().join("sub/old.txt").exists());
    let sessions: Vec<_> = fs::read_dir(trash.path()).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(sessions.len(), 1);
    assert_eq!(fs::read_to_string(sessions[0].join("sub/old.txt")).unwrap(), "keep me");
}

#[test]
fn test_unspecified_deletion_directory_is_fatal() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    create_test_file(left.path(), "a.txt", "a", 1000);
    create_test_file(right.path(), "b.txt", "b", 1000);

    let mut cmp = plan(left.path(), right.path(), mirror());
    let cfg = FolderPairSyncCfg {
        deletion: DeletionPolicy::CustomDirectory(PathBuf::new()),
        ..FolderPairSyncCfg::default()
    };
    let (result, _) = run(&mut cmp, &cfg);

    match result {
        Err(SyncError::Fatal(text)) => assert!(text.contains("directory for deletion was not specified")),
        other => panic!("unexpected result {other:?}"),
    }
    assert!(right.path().join("b.txt").exists());
}

#[test]
fn test_verify_copied_files() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    create_test_file(left.path(), "data.bin", &"0123456789".repeat(1000), 1000);

    let mut cmp = plan(left.path(), right.path(), mirror());
    let cfg = FolderPairSyncCfg {
        verify_copied_files: true,
        ..permanent()
    };
    let (result, callback) = run(&mut cmp, &cfg);

    assert!(result.unwrap().is_success());
    assert!(callback.infos.iter().any(|line| line.starts_with("Verifying file")));
    assert_eq!(
        fs::read(right.path().join("data.bin")).unwrap(),
        fs::read(left.path().join("data.bin")).unwrap()
    );
}

#[test]
fn test_automatic_mode_saves_database() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    create_test_file(left.path(), "a.txt", "a", 1000);
    create_test_file(left.path(), "b.txt", "b", 1000);

    // first run without database: two-way
    let mut cmp = plan(left.path(), right.path(), DirectionConfig::Automatic);
    let (result, _) = run(&mut cmp, &automatic());
    assert_eq!(result.unwrap().created, 2);
    assert!(left.path().join(SYNC_DB_FILE_NAME).exists());

    // a deletion on the right is now propagated instead of copied back
    fs::remove_file(right.path().join("a.txt")).unwrap();
    let mut cmp = plan(left.path(), right.path(), DirectionConfig::Automatic);
    let (result, _) = run(&mut cmp, &automatic());

    assert_eq!(result.unwrap().deleted, 1);
    assert!(!left.path().join("a.txt").exists());
    assert!(left.path().join("b.txt").exists());
}

#[cfg(unix)]
#[test]
fn test_rename_is_propagated_as_rename() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    create_test_file(left.path(), "report.txt", &"r".repeat(64), 1000);

    let mut cmp = plan(left.path(), right.path(), DirectionConfig::Automatic);
    run(&mut cmp, &automatic()).0.unwrap();

    fs::rename(left.path().join("report.txt"), left.path().join("final.txt")).unwrap();
    let mut cmp = plan(left.path(), right.path(), DirectionConfig::Automatic);
    let (result, callback) = run(&mut cmp, &automatic());
    let result = result.unwrap();

    assert_eq!(result.renamed, 1);
    assert_eq!(result.created + result.deleted, 0);
    assert!(!right.path().join("report.txt").exists());
    assert_eq!(fs::read_to_string(right.path().join("final.txt")).unwrap(), "r".repeat(64));
    assert!(callback.infos.iter().any(|line| line.starts_with("Renaming file")));
}

#[test]
fn test_missing_target_base_is_created() {
    let left = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let right = root.path().join("not/yet/there");
    create_test_file(left.path(), "dir/a.txt", "a", 1000);

    let mut cmp = plan(left.path(), &right, mirror());
    let (result, _) = run(&mut cmp, &permanent());

    assert_eq!(result.unwrap().created, 2);
    assert_eq!(fs::read_to_string(right.join("dir/a.txt")).unwrap(), "a");
}

#[test]
fn test_vanished_source_is_fatal() {
    let root = TempDir::new().unwrap();
    let left = root.path().join("unplugged");
    let right = TempDir::new().unwrap();
    create_test_file(right.path(), "precious.txt", "p", 1000);

    let mut cmp = plan(&left, right.path(), mirror());
    let (result, _) = run(&mut cmp, &permanent());

    match result {
        Err(SyncError::Fatal(text)) => assert!(text.starts_with("Source directory does not exist anymore")),
        other => panic!("unexpected result {other:?}"),
    }
    assert!(right.path().join("precious.txt").exists());
}

#[test]
fn test_significant_difference_warning() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    create_test_file(left.path(), "keep.txt", "k", 1000);
    for n in 0..10 {
        create_test_file(right.path(), &format!("extra{n}.txt"), "e", 1000);
    }

    let mut cmp = plan(left.path(), right.path(), mirror());
    let (result, callback) = run(&mut cmp, &permanent());

    assert_eq!(result.unwrap().deleted, 10);
    assert!(
        callback
            .warnings
            .iter()
            .any(|w| w.starts_with("Significant difference detected"))
    );
}

#[test]
fn test_conflicts_are_reported_and_left_alone() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    create_test_file(left.path(), "c.txt", "left", 1000);
    create_test_file(right.path(), "c.txt", "right side", 2000);

    let mut cmp = plan(left.path(), right.path(), two_way());
    let h = cmp[0].hierarchy_mut();
    let id = h.ids()[0];
    h.set_direction(id, SyncDirection::Conflict("Both sides have changed since last synchronization".into()));
    let (result, callback) = run(&mut cmp, &permanent());

    assert_eq!(result.unwrap().conflicts, 1);
    assert!(callback.warnings.iter().any(|w| w.starts_with("Unresolved conflicts existing! (1)")));
    assert_eq!(fs::read_to_string(left.path().join("c.txt")).unwrap(), "left");
    assert_eq!(fs::read_to_string(right.path().join("c.txt")).unwrap(), "right side");
}

#[test]
fn test_identical_base_directories_are_skipped() {
    let dir = TempDir::new().unwrap();
    let mut mapping = BaseDirMapping::new(dir.path(), dir.path(), crate::hierarchy::CompareVariant::ByTimeSize, 2);
    let id = mapping
        .hierarchy_mut()
        .add_file(None, Some(ItemDescriptor::file("ghost.txt", 1, 1)), None);
    mapping.hierarchy_mut().set_direction(id, SyncDirection::Right);
    let mut cmp = vec![mapping];

    let (result, _) = run(&mut cmp, &permanent());

    assert_eq!(result.unwrap().total_operations(), 0);
    assert!(!dir.path().join("ghost.txt").exists());
}

#[test]
fn test_same_directory_through_other_path_is_skipped() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    let same = dir.path().join("sub").join("..");
    let mut mapping = BaseDirMapping::new(dir.path(), &same, crate::hierarchy::CompareVariant::ByTimeSize, 2);
    let id = mapping
        .hierarchy_mut()
        .add_file(None, None, Some(ItemDescriptor::file("ghost.txt", 1, 1)));
    mapping.hierarchy_mut().set_direction(id, SyncDirection::Left);
    let mut cmp = vec![mapping];

    let (result, _) = run(&mut cmp, &permanent());

    assert_eq!(result.unwrap().total_operations(), 0);
    assert!(!dir.path().join("ghost.txt").exists());
}

#[test]
fn test_mismatched_configs_are_rejected() {
    let mut cmp = FolderComparison::new();
    let mut callback = CollectingCallback::new();

    let result = SyncProcess::new(SyncOptions::default(), &mut callback).start_synchronization(&mut cmp, &[permanent()]);

    assert!(matches!(result, Err(SyncError::Internal(_))));
}
