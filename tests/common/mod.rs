//! Shared helpers for the integration tests.
//!
//! `#![allow(dead_code)]` because each test file compiles as its own crate
//! and uses only some of these.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use splitzip::Reporter;

/// Deterministic, poorly compressible bytes.
pub fn patterned_bytes(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

/// Write `data` to `dir/relative`, creating parent directories.
pub fn write_file(dir: &Path, relative: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, data).unwrap();
    path
}

/// Names of the entries directly inside `dir`, sorted.
pub fn dir_listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn quiet() -> Reporter {
    Reporter::silent()
}
