//! Builder for configuring OrlovaApi initialization.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cache::{CacheBackend, MemoryCache};
use crate::config::ConfigStore;
use crate::error::Result;
use crate::ranking::SearchSession;
use crate::registry::RegistryClient;
use crate::OrlovaApi;

/// Builder for configuring OrlovaApi initialization.
///
/// # Example
///
/// ```rust,ignore
/// use orlova_core::OrlovaApi;
///
/// let api = OrlovaApi::builder()
///     .config_path("/tmp/orlova/config.json")
///     .build()?;
/// ```
#[derive(Default)]
pub struct OrlovaApiBuilder {
    config_path: Option<PathBuf>,
    base_urls: Option<(String, String)>,
    cache: Option<Arc<dyn CacheBackend>>,
}

impl OrlovaApiBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a config file other than `<config dir>/llm-controller-orlova/config.json`.
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Send registry API and file requests to another server.
    pub fn registry_base_urls(mut self, api_base: impl Into<String>, hub_base: impl Into<String>) -> Self {
        self.base_urls = Some((api_base.into(), hub_base.into()));
        self
    }

    /// Share a result cache instead of creating an in-memory one.
    pub fn cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Open the config store and create the registry client.
    ///
    /// The registry token and cache TTL come from the effective config, so
    /// `HF_TOKEN` wins over the stored token.
    pub fn build(self) -> Result<OrlovaApi> {
        let config_path = match self.config_path {
            Some(path) => path,
            None => ConfigStore::default_path()?,
        };
        let config = Arc::new(ConfigStore::open(config_path)?);
        let effective = config.effective();

        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCache::new()) as Arc<dyn CacheBackend>);

        let mut registry = RegistryClient::new(cache, effective.cache_ttl())?
            .with_auth_token(effective.hf_token.clone());
        if let Some((api_base, hub_base)) = self.base_urls {
            registry = registry.with_base_urls(api_base, hub_base);
        }

        Ok(OrlovaApi {
            config,
            registry: Arc::new(registry),
            session: RwLock::new(SearchSession::new()),
        })
    }
}
