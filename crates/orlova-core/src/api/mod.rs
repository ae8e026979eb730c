//! Entry point wiring configuration, registry, ranking, downloads and disk
//! checks together.

mod builder;

pub use builder::OrlovaApiBuilder;

use crate::cancel::CancellationToken;
use crate::config::{AppConfig, ConfigPatch, ConfigStore};
use crate::disk::{self, DiskReport, SpaceCheck};
use crate::download::{
    DownloadJob, DownloadManager, DownloadOutcome, DownloadProgress, InstalledAsset, ModelStore,
};
use crate::error::Result;
use crate::models::{ActionResult, Candidate, DiffusionResults, SearchResults};
use crate::ollama::{LocalModel, OllamaClient, UpdateCheck};
use crate::ranking::{RankOutcome, RankPreferences, SearchSession};
use crate::registry::{DiffusionQuery, RegistryClient, SearchQuery};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Main API struct.
///
/// Holds the config store, the registry client with its result cache, and
/// the session of the most recent primary-model search. Clients for the
/// model store and the Ollama daemon are created per call from the current
/// config, so settings changes apply to the next operation.
pub struct OrlovaApi {
    pub(crate) config: Arc<ConfigStore>,
    pub(crate) registry: Arc<RegistryClient>,
    pub(crate) session: RwLock<SearchSession>,
}

impl OrlovaApi {
    pub fn builder() -> OrlovaApiBuilder {
        OrlovaApiBuilder::new()
    }

    /// Open the default config and talk to the public registry.
    pub fn new() -> Result<Self> {
        OrlovaApiBuilder::new().build()
    }

    pub fn registry(&self) -> &Arc<RegistryClient> {
        &self.registry
    }

    // ========================================
    // Configuration
    // ========================================

    pub fn config(&self) -> AppConfig {
        self.config.get()
    }

    /// Persist `patch`. A changed token or cache TTL is applied to the
    /// registry client.
    pub async fn update_config(&self, patch: ConfigPatch) -> Result<AppConfig> {
        let token_changed = patch.hf_token.is_some();
        let ttl_changed = patch.cache_ttl_minutes.is_some();
        let updated = self.config.update(patch)?;
        if ttl_changed {
            self.registry.set_cache_ttl(updated.cache_ttl());
        }
        if token_changed {
            self.registry
                .set_auth_token(self.config.effective().hf_token)
                .await;
        }
        Ok(updated)
    }

    // ========================================
    // Search and ranking
    // ========================================

    /// Search the quantized catalog and remember the hits for [`Self::rank_models`].
    pub async fn search_models(&self, query: &SearchQuery) -> Result<SearchResults> {
        let results = self.registry.search_models(query).await?;
        self.session.write().await.replace(results.models.clone());
        Ok(results)
    }

    /// Rank the hits of the last [`Self::search_models`] call.
    pub async fn rank_models(&self, preferences: &RankPreferences) -> RankOutcome {
        self.session.read().await.rank(preferences, Utc::now())
    }

    pub async fn search_diffusion(&self, query: &DiffusionQuery) -> Result<DiffusionResults> {
        self.registry.search_diffusion(query).await
    }

    pub async fn model_details(&self, model_id: &str) -> Result<Option<Candidate>> {
        self.registry.model_details(model_id).await
    }

    // ========================================
    // Auxiliary assets
    // ========================================

    /// The asset store rooted at the configured or detected install.
    pub fn model_store(&self) -> ModelStore {
        ModelStore::resolve(self.config.get().comfyui_path.as_deref())
    }

    /// Download one asset file. See [`DownloadManager::start`].
    pub async fn download_asset<F>(&self, job: &mut DownloadJob, on_progress: F) -> Result<DownloadOutcome>
    where
        F: FnMut(DownloadProgress),
    {
        DownloadManager::new(self.registry.clone(), self.model_store())
            .start(job, on_progress)
            .await
    }

    pub fn list_installed_assets(&self) -> Vec<InstalledAsset> {
        self.model_store().list_installed()
    }

    pub fn delete_installed_asset(&self, path: &Path) -> ActionResult {
        self.model_store().delete_installed(path)
    }

    // ========================================
    // Primary models (Ollama)
    // ========================================

    pub fn ollama(&self) -> Result<OllamaClient> {
        OllamaClient::new(&self.config.effective().ollama_host)
    }

    /// Have the daemon pull `repo_id` at `quantization`.
    ///
    /// Free space under the model store is checked first when `size_bytes`
    /// is known; a predicted shortfall is logged and the pull still starts.
    pub async fn pull_model<F>(
        &self,
        repo_id: &str,
        quantization: &str,
        size_bytes: Option<u64>,
        token: &CancellationToken,
        on_progress: F,
    ) -> Result<DownloadOutcome>
    where
        F: FnMut(DownloadProgress),
    {
        if let Some(size) = size_bytes {
            let models_path = self.models_path();
            match tokio::task::spawn_blocking(move || disk::check_space(size, &models_path)).await {
                Ok(check) if !check.fits => warn!("{}", check.message),
                Ok(_) => {}
                Err(e) => warn!("Space check did not complete: {}", e),
            }
        }
        self.ollama()?
            .pull(repo_id, quantization, token, on_progress)
            .await
    }

    pub async fn list_local_models(&self) -> Result<Vec<LocalModel>> {
        self.ollama()?.list_local_models().await
    }

    pub async fn delete_local_model(&self, name: &str) -> Result<ActionResult> {
        self.ollama()?.delete_model(name).await
    }

    pub async fn check_model_update(&self, name: &str) -> Result<UpdateCheck> {
        self.ollama()?.check_model_update(name, &self.registry).await
    }

    // ========================================
    // Disk
    // ========================================

    /// The primary model store path after environment overrides.
    pub fn models_path(&self) -> PathBuf {
        self.config
            .effective()
            .resolved_models_path()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn disk_report(&self) -> DiskReport {
        disk::disk_report(&self.models_path())
    }

    /// Whether `size_bytes` fits on the volume holding the model store.
    pub fn check_space(&self, size_bytes: u64) -> SpaceCheck {
        disk::check_space(size_bytes, &self.models_path())
    }

    pub fn set_models_path(&self, path: &Path) -> Result<ActionResult> {
        let result = disk::set_models_path(&self.config, path)?;
        info!("{}", result.message);
        Ok(result)
    }
}
