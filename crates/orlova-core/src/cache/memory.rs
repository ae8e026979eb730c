//! In-process cache backend.

use super::clock::{Clock, SystemClock};
use super::traits::{CacheBackend, CacheEntry};
use crate::error::{OrlovaError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Map-backed cache with lazy expiry.
///
/// There is no size bound and no background sweep. Concurrent writers to the
/// same key race and the last write wins.
pub struct MemoryCache<C: Clock = SystemClock> {
    entries: Mutex<HashMap<(String, String), CacheEntry>>,
    clock: Arc<C>,
}

impl MemoryCache<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl Default for MemoryCache<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryCache<C> {
    pub fn with_clock(clock: Arc<C>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), CacheEntry>>> {
        self.entries
            .lock()
            .map_err(|_| OrlovaError::Other("cache lock poisoned".into()))
    }
}

impl<C: Clock> CacheBackend for MemoryCache<C> {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        let id = (namespace.to_string(), key.to_string());

        let expired = match entries.get(&id) {
            Some(entry) if now <= entry.expires_at => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            debug!("Cache entry expired: {}:{}", namespace, key);
            entries.remove(&id);
        }
        Ok(None)
    }

    fn set(&self, namespace: &str, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        // Out-of-range TTLs are capped at a century.
        let ttl = chrono::Duration::from_std(ttl)
            .ok()
            .filter(|t| *t < chrono::Duration::days(36_500))
            .unwrap_or_else(|| chrono::Duration::days(36_500));
        let expires_at = now + ttl;

        self.lock()?.insert(
            (namespace.to_string(), key.to_string()),
            CacheEntry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    fn invalidate(&self, namespace: &str, key: &str) -> Result<bool> {
        Ok(self
            .lock()?
            .remove(&(namespace.to_string(), key.to_string()))
            .is_some())
    }

    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}
