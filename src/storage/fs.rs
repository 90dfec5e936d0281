use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{BlobStore, StorageError, Tier};

/// Blob store backed by a local directory: `<root>/<tier>/<key>`.
///
/// A key names a bundle, which may be a single file or a directory tree.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, tier: Tier, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && !key.split('/').any(str::is_empty)
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(tier.as_str()).join(relative))
    }

    fn not_found(tier: Tier, key: &str) -> StorageError {
        StorageError::NotFound {
            tier,
            key: key.to_string(),
        }
    }

    async fn remove_path(path: &Path) -> Result<(), StorageError> {
        let result = match fs::symlink_metadata(path).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await,
            Ok(_) => fs::remove_file(path).await,
            Err(e) => Err(e),
        };
        match result {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn prepare_destination(path: &Path) -> Result<(), StorageError> {
        Self::remove_path(path).await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn copy_tree(src: &Path, dst: &Path) -> Result<(), StorageError> {
        let mut pending = vec![(src.to_path_buf(), dst.to_path_buf())];
        while let Some((from, to)) = pending.pop() {
            if fs::metadata(&from).await?.is_dir() {
                fs::create_dir_all(&to).await?;
                let mut entries = fs::read_dir(&from).await?;
                while let Some(entry) = entries.next_entry().await? {
                    pending.push((entry.path(), to.join(entry.file_name())));
                }
            } else {
                fs::copy(&from, &to).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn exists(&self, tier: Tier, key: &str) -> Result<bool, StorageError> {
        let path = self.path(tier, key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn move_object(&self, key: &str, from: Tier, to: Tier) -> Result<(), StorageError> {
        let src = self.path(from, key)?;
        let dst = self.path(to, key)?;
        if !fs::try_exists(&src).await? {
            return Err(Self::not_found(from, key));
        }
        Self::prepare_destination(&dst).await?;
        fs::rename(&src, &dst).await?;
        Ok(())
    }

    async fn copy_object(&self, key: &str, from: Tier, to: Tier) -> Result<(), StorageError> {
        let src = self.path(from, key)?;
        let dst = self.path(to, key)?;
        if !fs::try_exists(&src).await? {
            return Err(Self::not_found(from, key));
        }
        Self::prepare_destination(&dst).await?;
        Self::copy_tree(&src, &dst).await
    }

    async fn delete(&self, tier: Tier, key: &str) -> Result<(), StorageError> {
        let path = self.path(tier, key)?;
        Self::remove_path(&path).await
    }

    async fn put_object(
        &self,
        tier: Tier,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StorageError> {
        let path = self.path(tier, key)?;
        Self::prepare_destination(&path).await?;
        fs::write(&path, bytes).await?;
        Ok(())
    }
}
