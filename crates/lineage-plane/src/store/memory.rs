//! In-memory storage backend
//!
//! Default token store implementation using an in-memory map. Suitable for
//! tests and embedded use. Data is lost on restart; production deployments
//! use [`super::FileStore`].

use async_trait::async_trait;
use lineage_core::Token;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

use super::{id_sequence, StorageError, TokenStore};

/// In-memory token store
#[derive(Debug, Default)]
pub struct MemoryStore {
    tokens: RwLock<HashMap<String, Token>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn put(&self, token: Token) -> Result<(), StorageError> {
        let mut tokens = self.tokens.write().unwrap();
        debug!(id = %token.id, class = %token.class, "Storing token");
        tokens.insert(token.id.clone(), token);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Token>, StorageError> {
        let tokens = self.tokens.read().unwrap();
        Ok(tokens.get(id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Token>, StorageError> {
        let tokens = self.tokens.read().unwrap();
        let mut all: Vec<Token> = tokens.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn remove(&self, id: &str) -> Result<bool, StorageError> {
        let mut tokens = self.tokens.write().unwrap();
        let removed = tokens.remove(id).is_some();
        if removed {
            debug!(id = %id, "Removed token");
        }
        Ok(removed)
    }

    async fn next_sequence(&self) -> Result<u32, StorageError> {
        let tokens = self.tokens.read().unwrap();
        let max = tokens.keys().filter_map(|id| id_sequence(id)).max();
        Ok(max.map_or(1, |m| m + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_core::TokenClass;

    fn token(id: &str) -> Token {
        Token::builder(id, TokenClass::Anchor)
            .explanation("test token")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_get_remove() {
        let store = MemoryStore::new();
        store.put(token("T-0001")).await.unwrap();

        let loaded = store.get("T-0001").await.unwrap();
        assert!(loaded.is_some());
        assert_eq!(loaded.unwrap().id, "T-0001");

        assert!(store.remove("T-0001").await.unwrap());
        assert!(!store.remove("T-0001").await.unwrap());
        assert!(store.get("T-0001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_creation_ordered() {
        let store = MemoryStore::new();

        let mut first = token("T-0001");
        first.created_at = chrono::Utc::now() - chrono::Duration::seconds(10);
        let second = token("T-0002");

        // Insert out of order
        store.put(second).await.unwrap();
        store.put(first).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all[0].id, "T-0001");
        assert_eq!(all[1].id, "T-0002");
    }

    #[tokio::test]
    async fn test_next_sequence_skips_used_ids() {
        let store = MemoryStore::new();
        assert_eq!(store.next_sequence().await.unwrap(), 1);

        store.put(token("T-0007")).await.unwrap();
        assert_eq!(store.next_sequence().await.unwrap(), 8);
    }
}
