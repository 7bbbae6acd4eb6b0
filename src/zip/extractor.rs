use flate2::write::DeflateDecoder;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Compressed bytes read from the archive per step.
const READ_BLOCK: usize = 256 * 1024;

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all entries in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Decompress one entry into `out`, returning the number of bytes written.
    ///
    /// The output is checked against the size and CRC-32 recorded in the
    /// central directory; a mismatch means the archive is corrupt.
    pub async fn extract_to_writer<W>(&self, entry: &ZipFileEntry, out: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let data_offset = self.parser.get_data_offset(entry).await?;
        let data_end = data_offset
            .checked_add(entry.compressed_size)
            .filter(|end| *end <= self.parser.reader().size())
            .with_context(|| format!("Entry '{}' runs past end of archive", entry.file_name))?;

        let mut decoder = match entry.compression_method {
            CompressionMethod::Stored => None,
            CompressionMethod::Deflate => Some(DeflateDecoder::new(Vec::new())),
            CompressionMethod::Unknown(method) => bail!(
                "Unsupported compression method {} for '{}' (only STORED and DEFLATE are supported)",
                method,
                entry.file_name
            ),
        };

        let mut hasher = crc32fast::Hasher::new();
        let mut written = 0u64;
        let mut block = vec![0u8; entry.compressed_size.min(READ_BLOCK as u64) as usize];
        let mut offset = data_offset;

        while offset < data_end {
            let n = (data_end - offset).min(block.len() as u64) as usize;
            self.parser
                .reader()
                .read_exact_at(offset, &mut block[..n])
                .await?;
            offset += n as u64;

            match decoder.as_mut() {
                Some(decoder) => {
                    decoder
                        .write_all(&block[..n])
                        .with_context(|| format!("Corrupt data in '{}'", entry.file_name))?;
                    let decoded = std::mem::take(decoder.get_mut());
                    hasher.update(&decoded);
                    out.write_all(&decoded).await?;
                    written += decoded.len() as u64;
                }
                None => {
                    hasher.update(&block[..n]);
                    out.write_all(&block[..n]).await?;
                    written += n as u64;
                }
            }
        }

        if let Some(decoder) = decoder {
            let tail = decoder
                .finish()
                .with_context(|| format!("Corrupt data in '{}'", entry.file_name))?;
            hasher.update(&tail);
            out.write_all(&tail).await?;
            written += tail.len() as u64;
        }
        out.flush().await?;

        if written != entry.uncompressed_size {
            bail!(
                "Size mismatch for '{}': expected {} bytes, got {}",
                entry.file_name,
                entry.uncompressed_size,
                written
            );
        }
        if hasher.finalize() != entry.crc32 {
            bail!("CRC-32 mismatch for '{}'", entry.file_name);
        }

        Ok(written)
    }

    /// Extract file data to memory
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(entry.uncompressed_size.min(1 << 24) as usize);
        self.extract_to_writer(entry, &mut buf).await?;
        Ok(buf)
    }

    /// Extract file to disk, replacing anything already at `output_path`
    pub async fn extract_to_file(&self, entry: &ZipFileEntry, output_path: &Path) -> Result<u64> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
            }
        }

        let mut file = fs::File::create(output_path)
            .await
            .with_context(|| format!("Cannot write '{}'", output_path.display()))?;
        self.extract_to_writer(entry, &mut file).await
    }
}
