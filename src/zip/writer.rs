//! Streaming ZIP archive writer.
//!
//! Each entry is written as a Local File Header placeholder followed by its
//! deflate-compressed data. Once the data is done the header is rewritten in
//! place with the real CRC-32 and sizes, which requires a seekable sink.
//! [`ZipWriter::finish`] appends the Central Directory and the EOCD record
//! (plus ZIP64 records when the archive outgrows the 32-bit fields).

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::{SeekFrom, Write};
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use anyhow::{Context, Result, bail};

use super::structures::*;

/// Uncompressed bytes read from the source per step.
const READ_BLOCK: usize = 256 * 1024;

/// Metadata recorded alongside an entry's data.
#[derive(Debug, Clone, Default)]
pub struct EntryOptions {
    /// Expected uncompressed size. Decides up front whether the local
    /// header reserves ZIP64 size fields.
    pub size_hint: u64,
    /// Modification time; defaults to now.
    pub modified: Option<SystemTime>,
    /// Unix `st_mode`, stored in the upper half of the external attributes.
    pub unix_mode: Option<u32>,
}

/// ZIP archive writer over a seekable async sink.
///
/// The sink must be positioned at offset 0 when the writer is created.
pub struct ZipWriter<W> {
    inner: W,
    position: u64,
    entries: Vec<ZipFileEntry>,
}

impl<W: AsyncWrite + AsyncSeek + Unpin> ZipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            position: 0,
            entries: Vec::new(),
        }
    }

    /// Entries written so far, in archive order
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// Compress everything `source` yields into a new entry called `name`.
    pub async fn add_entry<R>(
        &mut self,
        name: &str,
        source: &mut R,
        options: &EntryOptions,
    ) -> Result<&ZipFileEntry>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        if name.is_empty() {
            bail!("Entry name must not be empty");
        }

        // Deflate can slightly expand incompressible input
        let zip64 = options.size_hint.saturating_add(options.size_hint / 20)
            >= ZIP64_U32_MARKER as u64;
        let (last_mod_time, last_mod_date) =
            dos_datetime(options.modified.unwrap_or_else(SystemTime::now));

        let mut header = LocalFileHeader {
            file_name: name,
            flags: FLAG_UTF8_NAME,
            compression_method: CompressionMethod::Deflate,
            last_mod_time,
            last_mod_date,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            zip64,
        };
        let lfh_offset = self.position;
        self.write_bytes(&header.to_bytes()?).await?;
        let data_start = self.position;

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        let mut hasher = crc32fast::Hasher::new();
        let mut block = vec![0u8; READ_BLOCK];
        let mut uncompressed = 0u64;

        loop {
            let n = source
                .read(&mut block)
                .await
                .with_context(|| format!("Failed to read '{}'", name))?;
            if n == 0 {
                break;
            }
            hasher.update(&block[..n]);
            encoder.write_all(&block[..n])?;
            uncompressed += n as u64;

            if encoder.get_ref().len() >= READ_BLOCK {
                let compressed = std::mem::take(encoder.get_mut());
                self.write_bytes(&compressed).await?;
            }
        }
        let tail = encoder.finish()?;
        self.write_bytes(&tail).await?;

        let compressed = self.position - data_start;
        if !zip64 && (compressed >= ZIP64_U32_MARKER as u64 || uncompressed >= ZIP64_U32_MARKER as u64)
        {
            bail!(
                "'{}' grew past 4 GiB while being archived (expected {} bytes)",
                name,
                options.size_hint
            );
        }

        header.crc32 = hasher.finalize();
        header.compressed_size = compressed;
        header.uncompressed_size = uncompressed;
        self.overwrite_at(lfh_offset, &header.to_bytes()?).await?;

        log::debug!("deflated {name}: {uncompressed} -> {compressed} bytes");
        self.entries.push(ZipFileEntry {
            file_name: name.to_string(),
            version_made_by: host_version_made_by(),
            flags: FLAG_UTF8_NAME,
            compression_method: CompressionMethod::Deflate,
            compressed_size: compressed,
            uncompressed_size: uncompressed,
            crc32: header.crc32,
            lfh_offset,
            last_mod_time,
            last_mod_date,
            external_attrs: options.unix_mode.map_or(0, |mode| (mode & 0xFFFF) << 16),
            is_directory: name.ends_with('/'),
        });
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Write the Central Directory and end records, returning the sink.
    pub async fn finish(mut self) -> Result<W> {
        let cd_offset = self.position;
        let mut central = Vec::new();
        for entry in &self.entries {
            central.extend_from_slice(&entry.to_central_header()?);
        }
        self.write_bytes(&central).await?;

        let cd_size = central.len() as u64;
        let count = self.entries.len() as u64;
        let eocd = EndOfCentralDirectory::for_directory(count, cd_size, cd_offset);

        if eocd.is_zip64() {
            let eocd64_offset = self.position;
            let record = Zip64EOCD::for_directory(count, cd_size, cd_offset).to_bytes()?;
            self.write_bytes(&record).await?;

            let locator = Zip64EOCDLocator {
                disk_with_eocd64: 0,
                eocd64_offset,
                total_disks: 1,
            };
            self.write_bytes(&locator.to_bytes()?).await?;
        }

        self.write_bytes(&eocd.to_bytes()?).await?;
        self.inner.flush().await?;
        Ok(self.inner)
    }

    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes).await?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Overwrite already-written bytes and return to the end of the archive.
    async fn overwrite_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.inner.flush().await?;
        self.inner.seek(SeekFrom::Start(offset)).await?;
        self.inner.write_all(bytes).await?;
        self.inner.flush().await?;
        self.inner.seek(SeekFrom::Start(self.position)).await?;
        Ok(())
    }
}
