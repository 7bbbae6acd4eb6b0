mod atomic;
mod local;

pub use atomic::AtomicOutput;
pub use local::LocalFileReader;

use anyhow::{Result, bail};
use async_trait::async_trait;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Fill the whole buffer starting at `offset`, failing on a short source.
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let position = offset + filled as u64;
            let n = self.read_at(position, &mut buf[filled..]).await?;
            if n == 0 {
                bail!("Unexpected end of data at offset {}", position);
            }
            filled += n;
        }
        Ok(())
    }
}

/// In-memory [`ReadAt`] source for unit tests.
#[cfg(test)]
pub(crate) struct MemoryReader(pub Vec<u8>);

#[cfg(test)]
#[async_trait]
impl ReadAt for MemoryReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let start = (offset as usize).min(self.0.len());
        let n = buf.len().min(self.0.len() - start);
        buf[..n].copy_from_slice(&self.0[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.0.len() as u64
    }
}
