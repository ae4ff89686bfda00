//! Content store abstraction.
//!
//! Uploaded files and text bodies are stored once and referred to by an
//! opaque [`ContentRef`] afterwards.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::types::{ContentKind, ContentRef, MarketError, MarketResult};

/// Resolved content, ready to hand to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Deliverable {
    pub kind: ContentKind,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a blob and return its handle.
    async fn store(&self, blob: Vec<u8>, kind: ContentKind) -> MarketResult<ContentRef>;

    async fn resolve(&self, content: &ContentRef) -> MarketResult<Deliverable>;

    /// Forget a blob. Removing an unknown handle is not an error.
    async fn remove(&self, content: &ContentRef) -> MarketResult<()>;
}

/// In-memory content store.
#[derive(Debug)]
pub struct MemoryContentStore {
    blobs: DashMap<String, Deliverable>,
    next_handle: AtomicU64,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self {
            blobs: DashMap::new(),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Number of blobs currently held.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn store(&self, blob: Vec<u8>, kind: ContentKind) -> MarketResult<ContentRef> {
        let handle = format!("blob-{}", self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.blobs
            .insert(handle.clone(), Deliverable { kind, data: blob });
        Ok(ContentRef::new(handle, kind))
    }

    async fn resolve(&self, content: &ContentRef) -> MarketResult<Deliverable> {
        self.blobs
            .get(&content.handle)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| MarketError::not_found("content", &content.handle))
    }

    async fn remove(&self, content: &ContentRef) -> MarketResult<()> {
        self.blobs.remove(&content.handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_resolve() {
        let store = MemoryContentStore::new();

        let content = store
            .store(b"integral table".to_vec(), ContentKind::Text)
            .await
            .unwrap();
        let resolved = store.resolve(&content).await.unwrap();

        assert_eq!(content.kind, ContentKind::Text);
        assert_eq!(resolved.data, b"integral table".to_vec());
    }

    #[tokio::test]
    async fn test_handles_are_unique() {
        let store = MemoryContentStore::new();

        let a = store.store(vec![1], ContentKind::Image).await.unwrap();
        let b = store.store(vec![1], ContentKind::Image).await.unwrap();

        assert_ne!(a.handle, b.handle);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_then_resolve_fails() {
        let store = MemoryContentStore::new();
        let content = store.store(vec![9], ContentKind::Document).await.unwrap();

        store.remove(&content).await.unwrap();
        store.remove(&content).await.unwrap();

        assert!(matches!(
            store.resolve(&content).await,
            Err(MarketError::NotFound { .. })
        ));
        assert!(store.is_empty());
    }
}
