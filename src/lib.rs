//! # splitzip
//!
//! Two small file utilities sharing one library:
//!
//! - `chunker` splits a large file into fixed-size numbered parts
//!   (`<file>.part001`, `<file>.part002`, ...) and concatenates them back.
//! - `archiver` compresses a file or a directory tree into a ZIP archive
//!   and extracts ZIP archives.
//!
//! Every output (each part, the merged file, the archive) is written to a
//! temporary file next to its destination and renamed into place once
//! complete, so an interrupted run never leaves a truncated result behind.
//!
//! ## Features
//!
//! - Split/merge with zero-padded part indices that sort numerically
//! - Deflate-compressed archives with ZIP64 support for large inputs
//! - Extraction of STORED and DEFLATE entries with CRC-32 verification
//! - Rejection of entry names that would escape the extraction directory
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use splitzip::{Reporter, merge_files, split_file};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let reporter = Reporter::new(false);
//!     let parts = split_file(Path::new("big.iso"), 40 * 1024 * 1024, &reporter).await?;
//!     println!("{} parts", parts.len());
//!
//!     merge_files(Path::new("big.iso"), Path::new("big.iso.merged"), &reporter).await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod chunk;
pub mod cli;
pub mod io;
pub mod report;
pub mod zip;

pub use archive::{UnzipSummary, ZipSummary, list_entries, unzip_archive, zip_path};
pub use chunk::{MergeOutcome, merge_files, split_file};
pub use io::{LocalFileReader, ReadAt};
pub use report::Reporter;
pub use zip::{ZipExtractor, ZipFileEntry, ZipWriter};
