//! Auxiliary asset downloads.
//!
//! - [`types`] - jobs, progress events and outcomes
//! - [`store`] - install root detection and the per-kind directories
//! - `manager` - the streaming download itself

mod manager;
pub mod store;
pub mod types;

pub use manager::DownloadManager;
pub use store::{detect_install_root, InstalledAsset, ModelStore};
pub use types::{DownloadJob, DownloadOutcome, DownloadProgress, JobState};
