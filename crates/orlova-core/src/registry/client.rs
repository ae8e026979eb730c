//! HTTP plumbing for the registry.

use crate::cache::CacheBackend;
use crate::config::NetworkConfig;
use crate::error::{OrlovaError, Result};
use reqwest::{Client, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Client for registry API and file-resolve requests.
pub struct RegistryClient {
    /// HTTP client for API requests (has total timeout)
    pub(super) client: Client,
    /// HTTP client for downloads (connect timeout only, no total timeout)
    pub(super) download_client: Client,
    /// Base of the JSON API, `https://huggingface.co/api` by default.
    pub(super) api_base: String,
    /// Base for `resolve/main` file URLs, `https://huggingface.co` by default.
    pub(super) hub_base: String,
    pub(super) cache: Arc<dyn CacheBackend>,
    /// TTL for new cache entries. Entries already stored keep their expiry.
    pub(super) cache_ttl: Arc<std::sync::RwLock<Duration>>,
    /// Bearer token for gated/private repositories.
    pub(super) auth_token: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("api_base", &self.api_base)
            .field("hub_base", &self.hub_base)
            .field("cache_ttl", &self.cache_ttl())
            .field("has_auth_token", &"<redacted>")
            .finish()
    }
}

impl RegistryClient {
    /// Create a client against the public Hub.
    pub fn new(cache: Arc<dyn CacheBackend>, cache_ttl: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| OrlovaError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        // Large files take longer than any sensible total timeout; the stream
        // loop owns progress and cancellation instead.
        let download_client = Client::builder()
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| OrlovaError::Network {
                message: format!("Failed to create download HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            download_client,
            api_base: NetworkConfig::HF_API_BASE.to_string(),
            hub_base: NetworkConfig::HF_HUB_BASE.to_string(),
            cache,
            cache_ttl: Arc::new(std::sync::RwLock::new(cache_ttl)),
            auth_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Point the client at another server. Used for mirrors and in tests.
    pub fn with_base_urls(mut self, api_base: impl Into<String>, hub_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.hub_base = hub_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_auth_token(self, token: Option<String>) -> Self {
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self {
            auth_token: Arc::new(RwLock::new(token)),
            ..self
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        match self.cache_ttl.read() {
            Ok(ttl) => *ttl,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Change the TTL applied to results cached from now on.
    pub fn set_cache_ttl(&self, ttl: Duration) {
        match self.cache_ttl.write() {
            Ok(mut current) => *current = ttl,
            Err(poisoned) => *poisoned.into_inner() = ttl,
        }
        info!("Registry cache TTL set to {:?}", ttl);
    }

    // ========================================
    // Authentication
    // ========================================

    /// Replace the in-memory token used by subsequent requests.
    pub async fn set_auth_token(&self, token: Option<String>) {
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let present = token.is_some();
        *self.auth_token.write().await = token;
        info!("Registry auth token {}", if present { "updated" } else { "cleared" });
    }

    pub(super) async fn auth_header_value(&self) -> Option<String> {
        self.auth_token
            .read()
            .await
            .as_ref()
            .map(|token| format!("Bearer {}", token))
    }

    // ========================================
    // Requests
    // ========================================

    /// GET a JSON API path. Non-success statuses other than those listed in
    /// `passthrough` become [`OrlovaError::Registry`].
    pub(super) async fn get_api(&self, url: &str, passthrough: &[u16]) -> Result<Response> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(auth) = self.auth_header_value().await {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }

        let response = request.send().await.map_err(|e| OrlovaError::Network {
            message: format!("Registry request failed: {}", e),
            cause: Some(e.to_string()),
        })?;

        let status = response.status();
        if status.is_success() || passthrough.contains(&status.as_u16()) {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!("Registry API error {}: {}", status, truncate(&body));
        Err(OrlovaError::registry(
            "HF API",
            status.as_u16(),
            &body,
            NetworkConfig::ERROR_BODY_MAX_CHARS,
        ))
    }

    /// URL of a file in a repository's main branch.
    pub fn resolve_url(&self, repo_id: &str, filename: &str) -> String {
        let encoded: Vec<String> = filename
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}/resolve/main/{}", self.hub_base, repo_id, encoded.join("/"))
    }

    /// Open a streaming download of `filename` from `repo_id`.
    ///
    /// Redirects are followed. A non-success status becomes
    /// [`OrlovaError::Registry`] with the body cut to a short excerpt.
    pub async fn open_download(&self, repo_id: &str, filename: &str) -> Result<Response> {
        let url = self.resolve_url(repo_id, filename);
        let mut request = self.download_client.get(&url);
        if let Some(auth) = self.auth_header_value().await {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }

        let response = request.send().await.map_err(|e| OrlovaError::DownloadFailed {
            url: url.clone(),
            message: format!("Download request failed: {}", e),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Download of {} failed with {}: {}", url, status, truncate(&body));
            return Err(OrlovaError::registry(
                "Download",
                status.as_u16(),
                &body,
                NetworkConfig::ERROR_BODY_MAX_CHARS,
            ));
        }

        Ok(response)
    }
}

fn truncate(body: &str) -> String {
    body.chars()
        .take(NetworkConfig::ERROR_BODY_MAX_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn client() -> RegistryClient {
        RegistryClient::new(Arc::new(MemoryCache::new()), Duration::from_secs(60)).unwrap()
    }

    #[test]
    fn test_resolve_url_encodes_segments() {
        let client = client().with_base_urls("http://api.test/api/", "http://hub.test/");
        assert_eq!(
            client.resolve_url("org/repo", "unet/diffusion model.safetensors"),
            "http://hub.test/org/repo/resolve/main/unet/diffusion%20model.safetensors"
        );
    }

    #[tokio::test]
    async fn test_auth_header_and_blank_token() {
        let client = client().with_auth_token(Some("  hf_secret ".into()));
        assert_eq!(client.auth_header_value().await.as_deref(), Some("Bearer hf_secret"));

        client.set_auth_token(Some("   ".into())).await;
        assert_eq!(client.auth_header_value().await, None);
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = client().with_auth_token(Some("hf_secret".into()));
        assert!(!format!("{:?}", client).contains("hf_secret"));
    }
}
