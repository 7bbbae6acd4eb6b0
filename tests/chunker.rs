//! Split and merge behavior against real files.

mod common;

use common::{dir_listing, patterned_bytes, quiet, write_file};
use splitzip::chunk::{MergeOutcome, find_parts, merge_files, part_path, split_file};
use std::fs;
use tempfile::TempDir;

const KIB: u64 = 1024;

#[tokio::test]
async fn split_produces_padded_parts_of_expected_sizes() {
    let dir = TempDir::new().unwrap();
    let data = patterned_bytes(100 * KIB as usize, 1);
    let source = write_file(dir.path(), "big.bin", &data);

    let parts = split_file(&source, 40 * KIB, &quiet()).await.unwrap();

    let names: Vec<_> = parts
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["big.bin.part001", "big.bin.part002", "big.bin.part003"]);

    let sizes: Vec<_> = parts.iter().map(|p| fs::metadata(p).unwrap().len()).collect();
    assert_eq!(sizes, [40 * KIB, 40 * KIB, 20 * KIB]);

    // The source is left untouched and no temporary files linger
    assert_eq!(fs::read(&source).unwrap(), data);
    assert_eq!(
        dir_listing(dir.path()),
        ["big.bin", "big.bin.part001", "big.bin.part002", "big.bin.part003"]
    );
}

#[tokio::test]
async fn exact_multiple_has_no_short_part() {
    let dir = TempDir::new().unwrap();
    let source = write_file(dir.path(), "even.bin", &patterned_bytes(8 * KIB as usize, 2));

    let parts = split_file(&source, 4 * KIB, &quiet()).await.unwrap();

    assert_eq!(parts.len(), 2);
    for part in &parts {
        assert_eq!(fs::metadata(part).unwrap().len(), 4 * KIB);
    }
}

#[tokio::test]
async fn split_then_merge_reproduces_source() {
    let dir = TempDir::new().unwrap();
    let data = patterned_bytes(100 * KIB as usize, 3);
    let source = write_file(dir.path(), "video.mp4", &data);

    split_file(&source, 40 * KIB, &quiet()).await.unwrap();
    let output = dir.path().join("video.mp4.merged");
    let outcome = merge_files(&source, &output, &quiet()).await.unwrap();

    match outcome {
        MergeOutcome::Merged { parts, bytes, .. } => {
            assert_eq!(parts.len(), 3);
            assert_eq!(bytes, data.len() as u64);
        }
        MergeOutcome::NoParts => panic!("parts were not found"),
    }
    assert_eq!(fs::read(&output).unwrap(), data);
}

#[tokio::test]
async fn empty_source_produces_no_parts() {
    let dir = TempDir::new().unwrap();
    let source = write_file(dir.path(), "empty.bin", b"");

    let parts = split_file(&source, KIB, &quiet()).await.unwrap();

    assert!(parts.is_empty());
    assert_eq!(dir_listing(dir.path()), ["empty.bin"]);
}

#[tokio::test]
async fn merge_orders_parts_numerically() {
    let dir = TempDir::new().unwrap();
    let prefix = dir.path().join("data");
    // Write out of order so directory order cannot be relied on
    for index in (1..=11u64).rev() {
        fs::write(part_path(&prefix, index), format!("[{index}]")).unwrap();
    }

    let output = dir.path().join("joined");
    merge_files(&prefix, &output, &quiet()).await.unwrap();

    let expected: String = (1..=11).map(|i| format!("[{i}]")).collect();
    assert_eq!(fs::read_to_string(&output).unwrap(), expected);
}

#[tokio::test]
async fn merge_without_parts_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let prefix = dir.path().join("missing");
    let output = dir.path().join("missing.merged");

    let outcome = merge_files(&prefix, &output, &quiet()).await.unwrap();

    assert_eq!(outcome, MergeOutcome::NoParts);
    assert!(!output.exists());
    assert!(dir_listing(dir.path()).is_empty());
}

#[tokio::test]
async fn merge_replaces_existing_output() {
    let dir = TempDir::new().unwrap();
    let prefix = dir.path().join("doc");
    fs::write(part_path(&prefix, 1), b"new ").unwrap();
    fs::write(part_path(&prefix, 2), b"content").unwrap();
    let output = write_file(dir.path(), "doc.merged", b"stale content that is longer");

    merge_files(&prefix, &output, &quiet()).await.unwrap();

    assert_eq!(fs::read(&output).unwrap(), b"new content");
}

#[tokio::test]
async fn merge_output_matching_the_pattern_is_not_an_input() {
    let dir = TempDir::new().unwrap();
    let prefix = dir.path().join("log");
    fs::write(part_path(&prefix, 1), b"one").unwrap();
    let output = write_file(dir.path(), "log.part-all", b"old");

    merge_files(&prefix, &output, &quiet()).await.unwrap();

    assert_eq!(fs::read(&output).unwrap(), b"one");
}

#[test]
fn prefix_is_matched_literally() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a[1].bin.part001", b"x");
    write_file(dir.path(), "a1.bin.part001", b"y");

    let parts = find_parts(&dir.path().join("a[1].bin"), None).unwrap();

    assert_eq!(parts, [dir.path().join("a[1].bin.part001")]);
}

#[tokio::test]
async fn missing_source_is_an_error() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("nope.bin");

    let err = split_file(&source, KIB, &quiet()).await.unwrap_err();

    assert!(format!("{err:#}").contains("nope.bin"));
    assert!(dir_listing(dir.path()).is_empty());
}

#[tokio::test]
async fn too_many_parts_is_rejected_before_writing() {
    let dir = TempDir::new().unwrap();
    let source = write_file(dir.path(), "wide.bin", &patterned_bytes(1000, 4));

    let err = split_file(&source, 1, &quiet()).await.unwrap_err();

    assert!(format!("{err:#}").contains("999"));
    assert_eq!(dir_listing(dir.path()), ["wide.bin"]);
}
