//! In-memory metadata store.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{BoxFuture, MetaStore, TransportError};

#[derive(Default)]
struct StoreInner {
    entries: BTreeMap<String, (Vec<u8>, u64)>,
    revision: u64,
}

/// Cloneable handle to an in-memory key/value store.
///
/// Revisions are store-wide and strictly increasing.
#[derive(Clone, Default)]
pub struct MemoryMetaStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryMetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revision of the latest write to `key`.
    pub async fn revision(&self, key: &str) -> Option<u64> {
        self.inner.lock().await.entries.get(key).map(|(_, rev)| *rev)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }
}

impl MetaStore for MemoryMetaStore {
    fn put<'a>(&'a self, key: &'a str, value: Vec<u8>) -> BoxFuture<'a, Result<u64, TransportError>> {
        Box::pin(async move {
            if key.is_empty() {
                return Err(TransportError::Failed("empty key".into()));
            }
            let mut inner = self.inner.lock().await;
            inner.revision += 1;
            let revision = inner.revision;
            inner.entries.insert(key.to_string(), (value, revision));
            Ok(revision)
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, TransportError>> {
        Box::pin(async move {
            let inner = self.inner.lock().await;
            Ok(inner.entries.get(key).map(|(value, _)| value.clone()))
        })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, TransportError>> {
        Box::pin(async move { Ok(self.inner.lock().await.entries.keys().cloned().collect()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let store = MemoryMetaStore::new();
        let rev = store.put("abc", b"{}".to_vec()).await.unwrap();
        assert_eq!(rev, 1);
        assert_eq!(store.get("abc").await.unwrap(), Some(b"{}".to_vec()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn overwrite_bumps_revision() {
        let store = MemoryMetaStore::new();
        store.put("abc", b"1".to_vec()).await.unwrap();
        store.put("other", b"x".to_vec()).await.unwrap();
        let rev = store.put("abc", b"2".to_vec()).await.unwrap();
        assert_eq!(rev, 3);
        assert_eq!(store.revision("abc").await, Some(3));
        assert_eq!(store.get("abc").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn keys_are_sorted() {
        let store = MemoryMetaStore::new();
        store.put("b", Vec::new()).await.unwrap();
        store.put("a", Vec::new()).await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn empty_key_rejected() {
        let store = MemoryMetaStore::new();
        assert!(store.put("", Vec::new()).await.is_err());
        assert!(store.is_empty().await);
    }
}
