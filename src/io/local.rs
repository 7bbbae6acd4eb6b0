use super::ReadAt;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

/// Local file reader with random access support.
///
/// Reads are serialized through a single handle: each call seeks to the
/// requested offset and reads from there.
pub struct LocalFileReader {
    file: Mutex<File>,
    size: u64,
}

impl LocalFileReader {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .await
            .with_context(|| format!("Cannot open '{}'", path.display()))?;
        let metadata = file.metadata().await?;
        if metadata.is_dir() {
            anyhow::bail!("'{}' is a directory", path.display());
        }

        Ok(Self {
            file: Mutex::new(file),
            size: metadata.len(),
        })
    }
}

#[async_trait]
impl ReadAt for LocalFileReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }

        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset)).await?;
        Ok(file.read(buf).await?)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
