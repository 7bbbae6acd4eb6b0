use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// An output file assembled under a temporary name in its destination
/// directory and renamed over the target on [`commit`](Self::commit).
///
/// Dropping an uncommitted output removes the temporary file, so a failed
/// operation leaves nothing behind at the target path.
pub struct AtomicOutput {
    target: PathBuf,
    temp: NamedTempFile,
    file: File,
}

impl AtomicOutput {
    pub async fn create(target: &Path) -> Result<Self> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix(".splitzip-").suffix(".tmp");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o644));
        }
        let temp = builder
            .tempfile_in(&dir)
            .with_context(|| format!("Cannot create '{}'", target.display()))?;
        let file = File::from_std(temp.as_file().try_clone()?);

        Ok(Self {
            target: target.to_path_buf(),
            temp,
            file,
        })
    }

    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// Flush everything to disk and move the file into place.
    pub async fn commit(mut self) -> Result<()> {
        self.file.flush().await?;
        self.file
            .sync_all()
            .await
            .with_context(|| format!("Failed to write '{}'", self.target.display()))?;

        let Self { target, temp, file } = self;
        drop(file);
        temp.persist(&target)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to write '{}'", target.display()))?;
        log::debug!("committed {}", target.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn visible_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn commit_replaces_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.bin");
        std::fs::write(&target, b"old contents").unwrap();

        let mut out = AtomicOutput::create(&target).await.unwrap();
        out.file_mut().write_all(b"new").await.unwrap();
        out.commit().await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new");
        assert_eq!(visible_entries(dir.path()), vec!["out.bin"]);
    }

    #[tokio::test]
    async fn dropped_output_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.bin");

        let mut out = AtomicOutput::create(&target).await.unwrap();
        out.file_mut().write_all(b"partial").await.unwrap();
        out.file_mut().flush().await.unwrap();
        drop(out);

        assert!(visible_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn unwritable_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("missing").join("out.bin");
        let err = AtomicOutput::create(&target).await.err().unwrap();
        assert!(err.to_string().contains("out.bin"));
    }
}
