//! Storage abstraction for the token store
//!
//! This module provides a trait-based abstraction over token persistence,
//! enabling both in-memory (default) and durable file-backed backends.
//!
//! The token store holds only the mutable half of the system. Anchors never
//! pass through it; they live exclusively in the [`crate::ledger`].

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use lineage_core::Token;
use std::fmt::Debug;

/// Error type for storage operations
///
/// A durability failure is fatal and surfaced immediately; no partially
/// applied mutation is silently retried.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("token not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Storage backend trait for the token store
///
/// Implementations must be thread-safe. Each single-token operation is
/// atomic: a stored snapshot is visible in full or not at all. Ordering of
/// concurrent mutations on one identity is enforced above this trait by the
/// engine's per-identity locks.
#[async_trait]
pub trait TokenStore: Send + Sync + Debug {
    /// Store (or replace) a token snapshot
    async fn put(&self, token: Token) -> Result<(), StorageError>;

    /// Fetch a token by id
    async fn get(&self, id: &str) -> Result<Option<Token>, StorageError>;

    /// All stored tokens, ordered by creation time
    ///
    /// Includes logically dead (expired) tokens; the engine filters and
    /// purges them lazily at read time so each expiry is audited exactly
    /// once.
    async fn list_all(&self) -> Result<Vec<Token>, StorageError>;

    /// Remove a token; returns whether it existed
    async fn remove(&self, id: &str) -> Result<bool, StorageError>;

    /// Next unused numeric id suffix for token id assignment
    async fn next_sequence(&self) -> Result<u32, StorageError>;
}

/// Parse the numeric suffix of a `T-NNNN` token id
pub(crate) fn id_sequence(id: &str) -> Option<u32> {
    id.strip_prefix("T-")?.parse().ok()
}
