//! Content storage split across a private and a public tier.
//!
//! [`BlobStore`] is the backend seam: existence, store, move, copy and delete
//! of a content bundle addressed by `(tier, key)`. [`StorageTiers`] pairs a backend
//! with the CDN base URLs that identify each tier in stored references.

mod error;
mod fs;
mod memory;
mod tier;

use std::sync::Arc;

use async_trait::async_trait;

pub use error::StorageError;
pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;
pub use tier::{Tier, TierUrls};

/// Primitive operations of an external blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, tier: Tier, key: &str) -> Result<bool, StorageError>;

    /// Move `key` from one tier to another, replacing any existing copy in
    /// the destination. Fails with [`StorageError::NotFound`] if the source
    /// is absent.
    async fn move_object(&self, key: &str, from: Tier, to: Tier) -> Result<(), StorageError>;

    /// Same as [`move_object`](BlobStore::move_object) but keeps the source.
    async fn copy_object(&self, key: &str, from: Tier, to: Tier) -> Result<(), StorageError>;

    /// Remove `key` from `tier`. Deleting an absent key is not an error.
    async fn delete(&self, tier: Tier, key: &str) -> Result<(), StorageError>;

    /// Store `bytes` as the bundle for `key`, replacing any existing copy.
    async fn put_object(
        &self,
        tier: Tier,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StorageError>;
}

/// A blob store handle plus the tier URL mapping.
///
/// Cheap to clone; each transition invocation takes its own handle.
#[derive(Clone)]
pub struct StorageTiers {
    backend: Arc<dyn BlobStore>,
    urls: TierUrls,
}

impl StorageTiers {
    pub fn new(backend: Arc<dyn BlobStore>, urls: TierUrls) -> Self {
        Self { backend, urls }
    }

    pub fn urls(&self) -> &TierUrls {
        &self.urls
    }

    pub fn reference(&self, tier: Tier) -> &str {
        self.urls.reference(tier)
    }

    pub fn tier_from_reference(&self, cdn: &str) -> Result<Tier, StorageError> {
        self.urls.tier_from_reference(cdn)
    }

    pub async fn exists(&self, tier: Tier, key: &str) -> Result<bool, StorageError> {
        let found = self.backend.exists(tier, key).await?;
        tracing::debug!(%tier, key, found, "checked storage");
        Ok(found)
    }

    pub async fn move_object(&self, key: &str, from: Tier, to: Tier) -> Result<(), StorageError> {
        tracing::info!(key, %from, %to, "moving content");
        self.backend.move_object(key, from, to).await
    }

    pub async fn copy_object(&self, key: &str, from: Tier, to: Tier) -> Result<(), StorageError> {
        tracing::info!(key, %from, %to, "copying content");
        self.backend.copy_object(key, from, to).await
    }

    pub async fn delete(&self, tier: Tier, key: &str) -> Result<(), StorageError> {
        tracing::info!(%tier, key, "deleting content");
        self.backend.delete(tier, key).await
    }

    pub async fn put_object(
        &self,
        tier: Tier,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StorageError> {
        tracing::info!(%tier, key, size = bytes.len(), "storing content");
        self.backend.put_object(tier, key, bytes).await
    }
}

impl std::fmt::Debug for StorageTiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageTiers")
            .field("urls", &self.urls)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiers() -> (Arc<MemoryBlobStore>, StorageTiers) {
        let backend = Arc::new(MemoryBlobStore::new());
        let tiers = StorageTiers::new(
            backend.clone(),
            TierUrls::new("https://prv.example.org", "https://pub.example.org"),
        );
        (backend, tiers)
    }

    #[tokio::test]
    async fn delete_twice_is_idempotent() {
        let (backend, tiers) = tiers();
        backend.put(Tier::Public, "k1", b"bundle".to_vec());

        tiers.delete(Tier::Public, "k1").await.unwrap();
        let after_first = tiers.exists(Tier::Public, "k1").await.unwrap();
        tiers.delete(Tier::Public, "k1").await.unwrap();
        let after_second = tiers.exists(Tier::Public, "k1").await.unwrap();

        assert!(!after_first);
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn move_requires_source() {
        let (_, tiers) = tiers();
        let err = tiers
            .move_object("missing", Tier::Public, Tier::Private)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { tier: Tier::Public, .. }));
    }

    #[tokio::test]
    async fn reference_round_trips_through_tier_lookup() {
        let (_, tiers) = tiers();
        for tier in [Tier::Private, Tier::Public] {
            let cdn = tiers.reference(tier).to_string();
            assert_eq!(tiers.tier_from_reference(&cdn).unwrap(), tier);
        }
    }
}
