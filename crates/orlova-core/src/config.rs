//! Configuration for Orlova.
//!
//! Two kinds of configuration live here:
//!
//! - constant holders ([`NetworkConfig`], [`PathsConfig`], [`SearchConfig`]) for
//!   values that never change at runtime;
//! - the persisted user configuration ([`AppConfig`]) and its file-backed
//!   [`ConfigStore`].
//!
//! The persisted file is JSON with camelCase keys. Missing keys take their
//! defaults, so older files keep loading after new keys are added.

use crate::error::{OrlovaError, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info};

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const USER_AGENT: &'static str = concat!("orlova/", env!("CARGO_PKG_VERSION"));
    pub const HF_API_BASE: &'static str = "https://huggingface.co/api";
    pub const HF_HUB_BASE: &'static str = "https://huggingface.co";
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    /// Error bodies are cut to this many characters before they reach an error.
    pub const ERROR_BODY_MAX_CHARS: usize = 200;
}

/// Search defaults and limits.
pub struct SearchConfig;

impl SearchConfig {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;
    pub const DEFAULT_MIN_QUANT: &'static str = "Q4";
    pub const DEFAULT_TOP_K: usize = 10;
}

/// Shared directory and path configurations.
pub struct PathsConfig;

impl PathsConfig {
    pub const APP_DIR_NAME: &'static str = "llm-controller-orlova";
    pub const CONFIG_FILE_NAME: &'static str = "config.json";
    /// Default Ollama model store, relative to the home directory.
    pub const DEFAULT_MODELS_DIR: &'static str = ".ollama/models";
}

/// Environment variable names that override persisted settings.
pub struct EnvVars;

impl EnvVars {
    pub const HF_TOKEN: &'static str = "HF_TOKEN";
    pub const OLLAMA_HOST: &'static str = "OLLAMA_HOST";
    pub const OLLAMA_MODELS: &'static str = "OLLAMA_MODELS";
}

/// Persisted user configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub hf_token: Option<String>,
    pub models_path: Option<PathBuf>,
    pub last_models_path: Option<PathBuf>,
    pub cache_ttl_minutes: u64,
    pub default_quant_filters: Vec<String>,
    pub default_task_filters: Vec<String>,
    pub ollama_host: String,
    pub comfyui_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hf_token: None,
            models_path: None,
            last_models_path: None,
            cache_ttl_minutes: 15,
            default_quant_filters: ["Q4_K_M", "Q4_K_S", "Q5_K_M", "Q5_K_S", "Q6_K", "Q8_0"]
                .into_iter()
                .map(String::from)
                .collect(),
            default_task_filters: vec!["text-generation".into(), "text2text-generation".into()],
            ollama_host: "http://127.0.0.1:11434".into(),
            comfyui_path: None,
        }
    }
}

impl AppConfig {
    /// TTL applied to cached registry search results.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes.saturating_mul(60))
    }

    /// Apply environment overrides on top of the persisted values.
    ///
    /// The returned config is for use at runtime; it is never written back.
    pub fn with_overrides(&self, env: &EnvOverrides) -> AppConfig {
        let mut effective = self.clone();
        if let Some(token) = &env.hf_token {
            effective.hf_token = Some(token.clone());
        }
        if let Some(host) = &env.ollama_host {
            effective.ollama_host = host.clone();
        }
        if let Some(models) = &env.ollama_models {
            effective.models_path = Some(models.clone());
        }
        effective
    }

    /// The model store path: configured, then last used, then `~/.ollama/models`.
    pub fn resolved_models_path(&self) -> Option<PathBuf> {
        self.models_path
            .clone()
            .or_else(|| self.last_models_path.clone())
            .or_else(|| dirs::home_dir().map(|home| home.join(PathsConfig::DEFAULT_MODELS_DIR)))
    }
}

/// Values read from the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub hf_token: Option<String>,
    pub ollama_host: Option<String>,
    pub ollama_models: Option<PathBuf>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            hf_token: read(EnvVars::HF_TOKEN),
            ollama_host: read(EnvVars::OLLAMA_HOST),
            ollama_models: read(EnvVars::OLLAMA_MODELS).map(PathBuf::from),
        }
    }
}

/// Partial update applied through [`ConfigStore::update`].
///
/// `None` leaves a field untouched. For the optional settings, `Some(None)`
/// clears the value.
#[derive(Debug, Clone, Default)]
pub struct ConfigPatch {
    pub hf_token: Option<Option<String>>,
    pub models_path: Option<Option<PathBuf>>,
    pub last_models_path: Option<Option<PathBuf>>,
    pub cache_ttl_minutes: Option<u64>,
    pub default_quant_filters: Option<Vec<String>>,
    pub default_task_filters: Option<Vec<String>>,
    pub ollama_host: Option<String>,
    pub comfyui_path: Option<Option<PathBuf>>,
}

impl ConfigPatch {
    fn apply(self, config: &mut AppConfig) {
        if let Some(v) = self.hf_token {
            config.hf_token = v;
        }
        if let Some(v) = self.models_path {
            config.models_path = v;
        }
        if let Some(v) = self.last_models_path {
            config.last_models_path = v;
        }
        if let Some(v) = self.cache_ttl_minutes {
            config.cache_ttl_minutes = v;
        }
        if let Some(v) = self.default_quant_filters {
            config.default_quant_filters = v;
        }
        if let Some(v) = self.default_task_filters {
            config.default_task_filters = v;
        }
        if let Some(v) = self.ollama_host {
            config.ollama_host = v;
        }
        if let Some(v) = self.comfyui_path {
            config.comfyui_path = v;
        }
    }
}

/// File-backed configuration store.
///
/// Reads happen from memory; every update rewrites the whole file through a
/// temp file in the same directory followed by a rename.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<AppConfig>,
}

impl ConfigStore {
    /// `<config dir>/llm-controller-orlova/config.json`.
    ///
    /// On Linux the config dir honours `XDG_CONFIG_HOME` and falls back to
    /// `~/.config`.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| OrlovaError::Config {
            message: "Could not determine the user config directory".into(),
        })?;
        Ok(base
            .join(PathsConfig::APP_DIR_NAME)
            .join(PathsConfig::CONFIG_FILE_NAME))
    }

    /// Load the config at `path`, creating it with defaults if it is missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| OrlovaError::io_with_path(e, &path))?;
            serde_json::from_str::<AppConfig>(&raw).map_err(|e| OrlovaError::Config {
                message: format!("Failed to parse {}: {}", path.display(), e),
            })?
        } else {
            info!("Creating default config at {}", path.display());
            let defaults = AppConfig::default();
            write_json_atomic(&path, &defaults)?;
            defaults
        };

        Ok(Self {
            path,
            current: RwLock::new(config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the persisted configuration (no environment overrides).
    pub fn get(&self) -> AppConfig {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Snapshot with environment overrides applied.
    pub fn effective(&self) -> AppConfig {
        self.get().with_overrides(&EnvOverrides::from_env())
    }

    /// Merge `patch` into the configuration and persist it.
    pub fn update(&self, patch: ConfigPatch) -> Result<AppConfig> {
        let mut guard = self.current.write().map_err(|_| OrlovaError::Config {
            message: "Config lock poisoned".into(),
        })?;
        let mut updated = guard.clone();
        patch.apply(&mut updated);
        write_json_atomic(&self.path, &updated)?;
        debug!("Config updated at {}", self.path.display());
        *guard = updated.clone();
        Ok(updated)
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let parent = path.parent().ok_or_else(|| OrlovaError::Config {
        message: format!("Config path has no parent: {}", path.display()),
    })?;
    std::fs::create_dir_all(parent).map_err(|e| OrlovaError::io_with_path(e, parent))?;

    let serialized = serde_json::to_string_pretty(data)?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| OrlovaError::io_with_path(e, parent))?;
    temp.write_all(serialized.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path)
        .map_err(|e| OrlovaError::io_with_path(e.error, path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_default_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let store = ConfigStore::open(&path).unwrap();

        assert!(path.exists());
        assert_eq!(store.get(), AppConfig::default());
        assert_eq!(store.get().cache_ttl(), Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"cacheTtlMinutes": 5, "hfToken": "hf_abc"}"#).unwrap();

        let config = ConfigStore::open(&path).unwrap().get();

        assert_eq!(config.cache_ttl_minutes, 5);
        assert_eq!(config.hf_token.as_deref(), Some("hf_abc"));
        assert_eq!(config.ollama_host, "http://127.0.0.1:11434");
        assert_eq!(config.default_quant_filters.len(), 6);
    }

    #[test]
    fn test_huge_cache_ttl_saturates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"cacheTtlMinutes": 18446744073709551615}"#).unwrap();

        let config = ConfigStore::open(&path).unwrap().get();

        assert_eq!(config.cache_ttl_minutes, u64::MAX);
        assert_eq!(config.cache_ttl(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = ConfigStore::open(&path).unwrap_err();
        assert!(matches!(err, OrlovaError::Config { .. }));
    }

    #[test]
    fn test_update_persists_and_clears() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        let store = ConfigStore::open(&path).unwrap();

        store
            .update(ConfigPatch {
                models_path: Some(Some(PathBuf::from("/data/models"))),
                comfyui_path: Some(Some(PathBuf::from("/opt/ComfyUI"))),
                ..Default::default()
            })
            .unwrap();
        store
            .update(ConfigPatch {
                comfyui_path: Some(None),
                ..Default::default()
            })
            .unwrap();

        let reloaded = ConfigStore::open(&path).unwrap().get();
        assert_eq!(reloaded.models_path, Some(PathBuf::from("/data/models")));
        assert_eq!(reloaded.comfyui_path, None);
    }

    #[test]
    fn test_env_overrides_win() {
        let config = AppConfig {
            hf_token: Some("from-file".into()),
            ..Default::default()
        };
        let env = EnvOverrides {
            hf_token: Some("from-env".into()),
            ollama_host: Some("http://gpu-box:11434".into()),
            ollama_models: None,
        };

        let effective = config.with_overrides(&env);
        assert_eq!(effective.hf_token.as_deref(), Some("from-env"));
        assert_eq!(effective.ollama_host, "http://gpu-box:11434");
        assert_eq!(effective.models_path, None);
        // Overrides are not written back.
        assert_eq!(config.hf_token.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_resolved_models_path_prefers_configured() {
        let config = AppConfig {
            models_path: None,
            last_models_path: Some(PathBuf::from("/last")),
            ..Default::default()
        };
        assert_eq!(config.resolved_models_path(), Some(PathBuf::from("/last")));
    }
}
