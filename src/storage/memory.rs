use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{BlobStore, StorageError, Tier};

/// In-process blob store. Each key holds one opaque bundle.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<(Tier, String), Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a bundle.
    pub fn put(&self, tier: Tier, key: &str, bytes: Vec<u8>) {
        self.lock().insert((tier, key.to_string()), bytes);
    }

    pub fn get(&self, tier: Tier, key: &str) -> Option<Vec<u8>> {
        self.lock().get(&(tier, key.to_string())).cloned()
    }

    pub fn contains(&self, tier: Tier, key: &str) -> bool {
        self.lock().contains_key(&(tier, key.to_string()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(Tier, String), Vec<u8>>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transfer(
        &self,
        key: &str,
        from: Tier,
        to: Tier,
        keep_source: bool,
    ) -> Result<(), StorageError> {
        let mut objects = self.lock();
        let source = (from, key.to_string());
        let bytes = if keep_source {
            objects.get(&source).cloned()
        } else {
            objects.remove(&source)
        };
        let bytes = bytes.ok_or_else(|| StorageError::NotFound {
            tier: from,
            key: key.to_string(),
        })?;
        objects.insert((to, key.to_string()), bytes);
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn exists(&self, tier: Tier, key: &str) -> Result<bool, StorageError> {
        Ok(self.contains(tier, key))
    }

    async fn move_object(&self, key: &str, from: Tier, to: Tier) -> Result<(), StorageError> {
        self.transfer(key, from, to, false)
    }

    async fn copy_object(&self, key: &str, from: Tier, to: Tier) -> Result<(), StorageError> {
        self.transfer(key, from, to, true)
    }

    async fn delete(&self, tier: Tier, key: &str) -> Result<(), StorageError> {
        self.lock().remove(&(tier, key.to_string()));
        Ok(())
    }

    async fn put_object(
        &self,
        tier: Tier,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.put(tier, key, bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn move_transfers_bytes() {
        let store = MemoryBlobStore::new();
        store.put(Tier::Public, "k1", b"html".to_vec());

        store.move_object("k1", Tier::Public, Tier::Private).await.unwrap();

        assert!(!store.contains(Tier::Public, "k1"));
        assert_eq!(store.get(Tier::Private, "k1").unwrap(), b"html".to_vec());
    }

    #[tokio::test]
    async fn copy_keeps_source() {
        let store = MemoryBlobStore::new();
        store.put(Tier::Private, "k2", b"pdf".to_vec());

        store.copy_object("k2", Tier::Private, Tier::Public).await.unwrap();

        assert!(store.exists(Tier::Private, "k2").await.unwrap());
        assert!(store.exists(Tier::Public, "k2").await.unwrap());
    }

    #[tokio::test]
    async fn move_overwrites_destination() {
        let store = MemoryBlobStore::new();
        store.put(Tier::Public, "k3", b"new".to_vec());
        store.put(Tier::Private, "k3", b"old".to_vec());

        store.move_object("k3", Tier::Public, Tier::Private).await.unwrap();

        assert_eq!(store.get(Tier::Private, "k3").unwrap(), b"new".to_vec());
    }

    #[tokio::test]
    async fn copy_missing_source_fails() {
        let store = MemoryBlobStore::new();
        let err = store
            .copy_object("nope", Tier::Private, Tier::Public)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { tier: Tier::Private, .. }));
    }
}
