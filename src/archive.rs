//! Packing a file or directory tree into a ZIP archive and extracting it.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::BufReader;
use walkdir::WalkDir;

use crate::io::{AtomicOutput, LocalFileReader};
use crate::report::Reporter;
use crate::zip::{EntryOptions, ZipExtractor, ZipFileEntry, ZipWriter, entry_name, resolve_entry_path};

/// Buffer size for reading source files into the compressor.
const READ_BUFFER: usize = 1 << 20;

/// A regular file scheduled for archiving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub entry_name: String,
}

/// Result of [`zip_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipSummary {
    pub archive: PathBuf,
    pub entries: Vec<String>,
    pub uncompressed_bytes: u64,
    pub compressed_bytes: u64,
}

/// Result of [`unzip_archive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnzipSummary {
    pub destination: PathBuf,
    pub files: usize,
    pub bytes: u64,
}

/// Collect the regular files under `source`, in archive order.
///
/// A directory is walked recursively without following symbolic links;
/// entries are named by their path relative to `source` and ordered by
/// that path. A single file yields one entry named by its base name.
/// `exclude` names a path that must never be archived (the archive being
/// written).
pub fn collect_sources(source: &Path, exclude: Option<&Path>) -> Result<Vec<SourceFile>> {
    let metadata = std::fs::metadata(source)
        .with_context(|| format!("Cannot access '{}'", source.display()))?;

    if metadata.is_file() {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Cannot derive an entry name from '{}'", source.display()))?;
        return Ok(vec![SourceFile {
            path: source.to_path_buf(),
            entry_name: name.to_string(),
        }]);
    }
    if !metadata.is_dir() {
        bail!("'{}' is neither a file nor a directory", source.display());
    }

    let root = std::fs::canonicalize(source)?;
    let excluded = exclude.and_then(resolve_output);

    let mut files = Vec::new();
    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk '{}'", source.display()))?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            log::warn!("skipping symbolic link {}", entry.path().display());
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(source)?;
        if excluded.as_deref() == Some(root.join(relative).as_path()) {
            log::info!("not adding the archive to itself: {}", entry.path().display());
            continue;
        }

        files.push(SourceFile {
            path: entry.path().to_path_buf(),
            entry_name: entry_name(relative)?,
        });
    }

    Ok(files)
}

/// Absolute location `output` will have once written. The file itself
/// need not exist yet, but its directory must.
fn resolve_output(output: &Path) -> Option<PathBuf> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Some(std::fs::canonicalize(parent).ok()?.join(output.file_name()?))
}

/// Compress `source` (a file or a directory tree) into the archive `output`.
///
/// Every entry is deflate-compressed. The archive is written atomically:
/// on failure nothing is left at `output`.
pub async fn zip_path(source: &Path, output: &Path, reporter: &Reporter) -> Result<ZipSummary> {
    let sources = collect_sources(source, Some(output))?;
    log::info!("archiving {} file(s) from {}", sources.len(), source.display());

    let mut out = AtomicOutput::create(output).await?;
    let mut writer = ZipWriter::new(out.file_mut());
    let mut uncompressed_bytes = 0;
    let mut compressed_bytes = 0;

    for item in &sources {
        let file = File::open(&item.path)
            .await
            .with_context(|| format!("Cannot read '{}'", item.path.display()))?;
        let metadata = file.metadata().await?;
        let options = EntryOptions {
            size_hint: metadata.len(),
            modified: metadata.modified().ok(),
            unix_mode: unix_mode(&metadata),
        };

        let mut reader = BufReader::with_capacity(READ_BUFFER, file);
        let entry = writer
            .add_entry(&item.entry_name, &mut reader, &options)
            .await
            .with_context(|| format!("Failed to add '{}'", item.path.display()))?;
        uncompressed_bytes += entry.uncompressed_size;
        compressed_bytes += entry.compressed_size;
    }

    writer
        .finish()
        .await
        .with_context(|| format!("Failed to write '{}'", output.display()))?;
    out.commit().await?;

    reporter.line(format_args!(
        "Zipped '{}' to '{}'",
        source.display(),
        output.display()
    ));

    Ok(ZipSummary {
        archive: output.to_path_buf(),
        entries: sources.into_iter().map(|s| s.entry_name).collect(),
        uncompressed_bytes,
        compressed_bytes,
    })
}

#[cfg(unix)]
fn unix_mode(metadata: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn unix_mode(_metadata: &std::fs::Metadata) -> Option<u32> {
    None
}

async fn open_archive(archive: &Path) -> Result<ZipExtractor<LocalFileReader>> {
    let reader = LocalFileReader::open(archive)
        .await
        .with_context(|| format!("Cannot read archive '{}'", archive.display()))?;
    Ok(ZipExtractor::new(Arc::new(reader)))
}

/// Read the central directory of `archive`.
pub async fn list_entries(archive: &Path) -> Result<Vec<ZipFileEntry>> {
    let extractor = open_archive(archive).await?;
    extractor
        .list_files()
        .await
        .with_context(|| format!("'{}' is not a valid ZIP archive", archive.display()))
}

/// Extract every entry of `archive` under `destination`.
///
/// Existing files are overwritten. Entry names that would resolve outside
/// `destination` are rejected before anything is written.
pub async fn unzip_archive(
    archive: &Path,
    destination: &Path,
    reporter: &Reporter,
) -> Result<UnzipSummary> {
    let extractor = open_archive(archive).await?;
    let entries = extractor
        .list_files()
        .await
        .with_context(|| format!("'{}' is not a valid ZIP archive", archive.display()))?;

    let targets = entries
        .iter()
        .map(|entry| resolve_entry_path(destination, &entry.file_name))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Unsafe entry in '{}'", archive.display()))?;

    fs::create_dir_all(destination)
        .await
        .with_context(|| format!("Cannot create directory '{}'", destination.display()))?;

    let mut files = 0;
    let mut bytes = 0;
    for (entry, target) in entries.iter().zip(&targets) {
        if entry.is_directory {
            fs::create_dir_all(target)
                .await
                .with_context(|| format!("Cannot create directory '{}'", target.display()))?;
            continue;
        }

        reporter.line(format_args!("  extracting: {}", entry.file_name));
        bytes += extractor
            .extract_to_file(entry, target)
            .await
            .with_context(|| format!("Failed to extract '{}'", entry.file_name))?;
        files += 1;
    }

    reporter.line(format_args!(
        "Extracted '{}' to '{}'",
        archive.display(),
        destination.display()
    ));

    Ok(UnzipSummary {
        destination: destination.to_path_buf(),
        files,
        bytes,
    })
}
