//! Catalog search and model details with result caching.

use super::types::{DiffusionQuery, SearchQuery};
use super::RegistryClient;
use crate::cache::{cache_key, CacheNamespace};
use crate::error::{OrlovaError, Result};
use crate::extract::{self, quant};
use crate::models::{Candidate, DiffusionResults, SearchResults};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

impl RegistryClient {
    /// Search the GGUF catalog.
    ///
    /// Results are cached per normalized query for the configured TTL.
    /// Candidates without a quantization at or above the query's floor are
    /// left out.
    pub async fn search_models(&self, query: &SearchQuery) -> Result<SearchResults> {
        let normalized = query.normalize();
        let key = cache_key(&normalized)?;
        if let Some(cached) = self.cached::<SearchResults>(CacheNamespace::HF_SEARCH, &key) {
            debug!("Cache hit for search {}", key);
            return Ok(cached);
        }

        let mut url = self.models_url()?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("library", "gguf")
                .append_pair("limit", &normalized.limit.to_string())
                .append_pair("skip", &normalized.offset.to_string())
                .append_pair("sort", normalized.sort.as_str())
                .append_pair("direction", "-1")
                .append_pair("full", "true");
            if let Some(text) = &normalized.query {
                pairs.append_pair("search", text);
            }
            if let Some(author) = &normalized.author {
                pairs.append_pair("author", author);
            }
            for tag in &normalized.tags {
                pairs.append_pair("filter", tag);
            }
        }

        info!("Fetching registry models: {}", url);
        let records = self.fetch_records(url.as_str()).await?;

        let floor = quant::min_quant_level(&normalized.min_quant);
        let models: Vec<Candidate> = extract::extract_batch(records, Utc::now())
            .into_iter()
            .filter(|c| quant::meets_floor(&c.quantizations, floor))
            .collect();

        let result = SearchResults {
            total: models.len(),
            models,
        };
        self.store(CacheNamespace::HF_SEARCH, &key, &result);
        info!("Registry search completed: {} models", result.total);
        Ok(result)
    }

    /// Search the image-generation side of the catalog.
    pub async fn search_diffusion(&self, query: &DiffusionQuery) -> Result<DiffusionResults> {
        let normalized = query.normalize();
        let key = cache_key(&normalized)?;
        if let Some(cached) =
            self.cached::<DiffusionResults>(CacheNamespace::DIFFUSION_SEARCH, &key)
        {
            debug!("Cache hit for diffusion search {}", key);
            return Ok(cached);
        }

        let filter_kind = normalized.model_type.unwrap_or_default();
        let mut url = self.models_url()?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("limit", &normalized.limit.to_string())
                .append_pair("skip", &normalized.offset.to_string())
                .append_pair("sort", normalized.sort.as_str())
                .append_pair("direction", "-1")
                .append_pair("full", "true");
            if let Some(tag) = filter_kind.registry_tags().first() {
                pairs.append_pair("filter", tag);
            }
            if let Some(text) = &normalized.query {
                pairs.append_pair("search", text);
            }
            if let Some(author) = &normalized.author {
                pairs.append_pair("author", author);
            }
        }

        info!("Fetching diffusion models: {}", url);
        let records = self.fetch_records(url.as_str()).await?;
        let models = extract::extract_diffusion_batch(records, normalized.model_type, Utc::now());

        let result = DiffusionResults {
            total: models.len(),
            models,
        };
        self.store(CacheNamespace::DIFFUSION_SEARCH, &key, &result);
        info!("Diffusion search completed: {} models", result.total);
        Ok(result)
    }

    /// Fetch one repository's details. `Ok(None)` when it does not exist.
    pub async fn model_details(&self, model_id: &str) -> Result<Option<Candidate>> {
        if let Some(cached) = self.cached::<Candidate>(CacheNamespace::HF_MODEL, model_id) {
            debug!("Cache hit for model {}", model_id);
            return Ok(Some(cached));
        }

        let url = format!("{}/models/{}", self.api_base, model_id);
        let response = self.get_api(&url, &[404]).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let value: serde_json::Value = response.json().await.map_err(|e| OrlovaError::Json {
            message: format!("Failed to parse registry response: {}", e),
            source: None,
        })?;
        let Some(candidate) = extract::extract_batch(vec![value], Utc::now()).pop() else {
            return Ok(None);
        };

        self.store(CacheNamespace::HF_MODEL, model_id, &candidate);
        Ok(Some(candidate))
    }

    fn models_url(&self) -> Result<Url> {
        let raw = format!("{}/models", self.api_base);
        Url::parse(&raw).map_err(|e| OrlovaError::Config {
            message: format!("Invalid registry URL {}: {}", raw, e),
        })
    }

    async fn fetch_records(&self, url: &str) -> Result<Vec<serde_json::Value>> {
        let response = self.get_api(url, &[]).await?;
        response.json().await.map_err(|e| OrlovaError::Json {
            message: format!("Failed to parse registry response: {}", e),
            source: None,
        })
    }

    fn cached<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        match self.cache.get(namespace, key) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Discarding unreadable cache entry {}:{}: {}", namespace, key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Cache error, falling back to API: {}", e);
                None
            }
        }
    }

    fn store<T: Serialize>(&self, namespace: &str, key: &str, value: &T) {
        let stored = serde_json::to_vec(value)
            .map_err(OrlovaError::from)
            .and_then(|bytes| self.cache.set(namespace, key, &bytes, self.cache_ttl()));
        if let Err(e) = stored {
            warn!("Failed to cache {}:{}: {}", namespace, key, e);
        }
    }
}
