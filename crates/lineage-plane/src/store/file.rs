//! Durable file-backed storage backend
//!
//! One JSON document per token under `<data_dir>/tokens/`. Writes go through
//! a temporary file followed by a rename, so a crash mid-write leaves either
//! the old snapshot or the new one, never a torn document. The full directory
//! is loaded into an in-memory cache at open; reads never touch the disk
//! afterwards.

use async_trait::async_trait;
use lineage_core::Token;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

use super::{id_sequence, StorageError, TokenStore};

/// Durable token store
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Token>>,
}

impl FileStore {
    /// Open (or initialize) a store under `<data_dir>/tokens/`
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = data_dir.as_ref().join("tokens");
        fs::create_dir_all(&dir)?;

        let mut cache = HashMap::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = fs::read_to_string(&path)?;
            let token: Token = serde_json::from_str(&contents)?;
            cache.insert(token.id.clone(), token);
        }

        info!(dir = %dir.display(), tokens = cache.len(), "Opened token store");
        Ok(Self {
            dir,
            cache: RwLock::new(cache),
        })
    }

    fn token_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Atomic write: temporary file, then rename over the target
    fn persist(&self, token: &Token) -> Result<(), StorageError> {
        let target = self.token_path(&token.id);
        let tmp = self.dir.join(format!(".{}.tmp", token.id));
        fs::write(&tmp, serde_json::to_vec_pretty(token)?)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileStore {
    async fn put(&self, token: Token) -> Result<(), StorageError> {
        self.persist(&token)?;
        let mut cache = self.cache.write().unwrap();
        debug!(id = %token.id, "Persisted token");
        cache.insert(token.id.clone(), token);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Token>, StorageError> {
        let cache = self.cache.read().unwrap();
        Ok(cache.get(id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Token>, StorageError> {
        let cache = self.cache.read().unwrap();
        let mut all: Vec<Token> = cache.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn remove(&self, id: &str) -> Result<bool, StorageError> {
        let path = self.token_path(id);
        let mut cache = self.cache.write().unwrap();
        let existed = cache.remove(id).is_some();
        if existed {
            fs::remove_file(&path)?;
            debug!(id = %id, "Removed persisted token");
        }
        Ok(existed)
    }

    async fn next_sequence(&self) -> Result<u32, StorageError> {
        let cache = self.cache.read().unwrap();
        let max = cache.keys().filter_map(|id| id_sequence(id)).max();
        Ok(max.map_or(1, |m| m + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_core::TokenClass;

    fn token(id: &str) -> Token {
        Token::builder(id, TokenClass::Warning)
            .explanation("durable test token")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_tokens_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = FileStore::open(dir.path()).unwrap();
            store.put(token("T-0001")).await.unwrap();
            store.put(token("T-0002")).await.unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(store.get("T-0001").await.unwrap().is_some());
        assert_eq!(store.next_sequence().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_remove_deletes_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.put(token("T-0001")).await.unwrap();
        assert!(store.remove("T-0001").await.unwrap());

        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.get("T-0001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.put(token("T-0001")).await.unwrap();
        let mut updated = token("T-0001");
        updated.intensity = 0.9;
        updated.depth = 1;
        store.put(updated).await.unwrap();

        let loaded = store.get("T-0001").await.unwrap().unwrap();
        assert_eq!(loaded.intensity, 0.9);
        assert_eq!(loaded.depth, 1);
    }
}
