//! Orlova Core - model discovery and acquisition for a local LLM controller.
//!
//! Searches a Hugging Face style registry for quantized chat models and for
//! image-generation assets, ranks the chat models against the caller's
//! hardware and task, and fetches files with progress and cancellation.
//! Quantized chat models are pulled through a local Ollama daemon; assets are
//! streamed straight into a ComfyUI-style model directory.
//!
//! # Example
//!
//! ```rust,ignore
//! use orlova_core::{OrlovaApi, RankPreferences, SearchQuery};
//!
//! #[tokio::main]
//! async fn main() -> orlova_core::Result<()> {
//!     let api = OrlovaApi::new()?;
//!
//!     let query = SearchQuery {
//!         query: Some("qwen coder".into()),
//!         ..Default::default()
//!     };
//!     let results = api.search_models(&query).await?;
//!     println!("Found {} models", results.total);
//!
//!     let ranked = api.rank_models(&RankPreferences::default()).await;
//!     for model in ranked.ranked {
//!         println!("{:.3} {}", model.score, model.model_id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod disk;
pub mod download;
pub mod error;
pub mod extract;
pub mod format;
pub mod models;
pub mod ollama;
pub mod ranking;
pub mod registry;

mod api;

pub use api::{OrlovaApi, OrlovaApiBuilder};
pub use cache::{CacheBackend, CacheEntry, Clock, ManualClock, MemoryCache, SystemClock};
pub use cancel::CancellationToken;
pub use config::{AppConfig, ConfigPatch, ConfigStore};
pub use disk::{DiskInfo, DiskReport, SpaceCheck};
pub use download::{DownloadJob, DownloadManager, DownloadOutcome, DownloadProgress, JobState, ModelStore};
pub use error::{OrlovaError, Result};
pub use models::{
    ActionResult, Candidate, DestinationKind, DiffusionCandidate, DiffusionResults, Quantization,
    SearchResults,
};
pub use ollama::{LocalModel, OllamaClient, UpdateCheck};
pub use ranking::{RankOutcome, RankPreferences, ScoredCandidate, SearchSession, TaskPreference};
pub use registry::{DiffusionQuery, RegistryClient, SearchQuery, SortKey};
