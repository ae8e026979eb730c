//! Cache backend trait and types.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// A cached entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached data as bytes.
    pub value: Vec<u8>,
    /// When the entry expires.
    pub expires_at: DateTime<Utc>,
}

/// Generic cache backend trait.
///
/// Provides namespace-isolated key-value storage with TTL support.
pub trait CacheBackend: Send + Sync {
    /// Get cached data by key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. An expired
    /// entry is removed as a side effect.
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set cached data with TTL.
    ///
    /// Overwrites any existing entry with the same key.
    fn set(&self, namespace: &str, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Invalidate (delete) a specific key.
    fn invalidate(&self, namespace: &str, key: &str) -> Result<bool>;

    /// Number of stored entries, expired ones included until they are read.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serialize a normalized query into a cache key.
///
/// Field order of `query` is fixed by its type, so two equal normalized
/// queries always produce the same key.
pub fn cache_key<T: Serialize>(query: &T) -> Result<String> {
    Ok(serde_json::to_string(query)?)
}
