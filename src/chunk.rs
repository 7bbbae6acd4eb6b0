//! Splitting a file into numbered parts and merging them back.
//!
//! Parts are named `<source>.partNNN` with a 1-based, zero-padded index of
//! [`PART_INDEX_WIDTH`] digits, so sorting the names lexicographically gives
//! the original order. A split that would need more parts than the width
//! can express is refused before anything is written.

use anyhow::{Context, Result, bail};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

use crate::io::AtomicOutput;
use crate::report::Reporter;

/// Default maximum part size, in MiB.
pub const DEFAULT_CHUNK_MB: u64 = 40;

/// Number of digits in a part index.
pub const PART_INDEX_WIDTH: usize = 3;

/// Largest index that fits in [`PART_INDEX_WIDTH`] digits.
pub const MAX_PARTS: u64 = 999;

const PART_MARKER: &str = ".part";

/// Buffer size for copying between source and parts.
const COPY_BUFFER: usize = 1 << 20;

/// Result of [`merge_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No `<prefix>.part*` files exist; nothing was written.
    NoParts,
    Merged {
        output: PathBuf,
        parts: Vec<PathBuf>,
        bytes: u64,
    },
}

/// Convert a `--size` value in MiB to bytes.
pub fn chunk_size_from_mib(mb: u64) -> Result<u64> {
    if mb == 0 {
        bail!("Chunk size must be at least 1 MB");
    }
    mb.checked_mul(1024 * 1024)
        .with_context(|| format!("Chunk size of {mb} MB is too large"))
}

/// Path of part number `index` (1-based) for `source`.
pub fn part_path(source: &Path, index: u64) -> PathBuf {
    let mut name = OsString::from(source.as_os_str());
    name.push(format!("{PART_MARKER}{index:0width$}", width = PART_INDEX_WIDTH));
    PathBuf::from(name)
}

/// Split `source` into parts of at most `chunk_size` bytes.
///
/// Returns the paths of the parts written, in order. An empty source
/// produces no parts. Each part is written atomically.
pub async fn split_file(source: &Path, chunk_size: u64, reporter: &Reporter) -> Result<Vec<PathBuf>> {
    if chunk_size == 0 {
        bail!("Chunk size must be positive");
    }

    let file = File::open(source)
        .await
        .with_context(|| format!("Cannot read '{}'", source.display()))?;
    let metadata = file.metadata().await?;
    if metadata.is_dir() {
        bail!("'{}' is a directory", source.display());
    }

    let expected = metadata.len().div_ceil(chunk_size);
    if expected > MAX_PARTS {
        bail!(
            "Too many chunks: '{}' would need {} parts of {} bytes, at most {} are supported",
            source.display(),
            expected,
            chunk_size,
            MAX_PARTS
        );
    }
    log::info!(
        "splitting {} ({} bytes) into {} part(s)",
        source.display(),
        metadata.len(),
        expected
    );

    let mut reader = BufReader::with_capacity(COPY_BUFFER, file);
    let mut parts = Vec::new();

    for index in 1.. {
        let target = part_path(source, index);
        let mut out = AtomicOutput::create(&target).await?;

        let mut limited = (&mut reader).take(chunk_size);
        let copied = tokio::io::copy_buf(&mut limited, out.file_mut())
            .await
            .with_context(|| format!("Failed to write chunk '{}'", target.display()))?;
        if copied == 0 {
            // Uncommitted output is discarded on drop
            break;
        }
        if index > MAX_PARTS {
            bail!(
                "Too many chunks: '{}' grew past {} parts while being split",
                source.display(),
                MAX_PARTS
            );
        }

        out.commit().await?;
        reporter.line(format_args!("Wrote chunk: {}", target.display()));
        parts.push(target);
    }

    Ok(parts)
}

/// Find the parts belonging to `prefix`, in merge order.
///
/// Matches `<prefix>.part*` with the prefix taken literally. Only regular
/// files are returned; `exclude` (typically the merge output) is skipped.
pub fn find_parts(prefix: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
    let prefix_str = prefix
        .to_str()
        .with_context(|| format!("Prefix is not valid UTF-8: {}", prefix.display()))?;
    let pattern = format!("{}{PART_MARKER}*", glob::Pattern::escape(prefix_str));
    let excluded = exclude.and_then(|p| std::fs::canonicalize(p).ok());

    let mut parts = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry?;
        if !path.is_file() {
            continue;
        }
        if excluded.is_some() && std::fs::canonicalize(&path).ok() == excluded {
            log::debug!("skipping merge output {}", path.display());
            continue;
        }
        parts.push(path);
    }

    parts.sort();
    Ok(parts)
}

/// Concatenate all parts of `prefix` into `output`, replacing it.
///
/// Finding no parts is not an error: it is reported and nothing is written.
/// The output only appears once every part has been copied.
pub async fn merge_files(prefix: &Path, output: &Path, reporter: &Reporter) -> Result<MergeOutcome> {
    let parts = find_parts(prefix, Some(output))?;
    if parts.is_empty() {
        reporter.line(format_args!(
            "No parts found with prefix {}{PART_MARKER}",
            prefix.display()
        ));
        return Ok(MergeOutcome::NoParts);
    }

    let mut out = AtomicOutput::create(output).await?;
    let mut bytes = 0u64;

    for part in &parts {
        reporter.line(format_args!("Appending {}", part.display()));
        let file = File::open(part)
            .await
            .with_context(|| format!("Cannot read '{}'", part.display()))?;
        let mut reader = BufReader::with_capacity(COPY_BUFFER, file);
        bytes += tokio::io::copy_buf(&mut reader, out.file_mut())
            .await
            .with_context(|| format!("Failed to append '{}'", part.display()))?;
    }

    out.commit().await?;
    reporter.line(format_args!("Merged into: {}", output.display()));

    Ok(MergeOutcome::Merged {
        output: output.to_path_buf(),
        parts,
        bytes,
    })
}
