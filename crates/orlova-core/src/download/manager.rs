//! Streaming download of a single repository file into the model store.

use super::store::{ModelStore, ROOT_NOT_CONFIGURED};
use super::types::{DownloadJob, DownloadOutcome, DownloadProgress, JobState};
use crate::config::NetworkConfig;
use crate::disk;
use crate::error::{OrlovaError, Result};
use crate::format::format_bytes;
use crate::registry::RegistryClient;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const CANCELLED_MESSAGE: &str = "Download cancelled";

/// How the byte stream ended when it did not fail.
enum StreamEnd {
    Completed,
    Cancelled,
}

/// Downloads files into the model store.
///
/// Bytes go to `<target>.part` and are renamed into place once the stream
/// ends. A cancelled or failed transfer removes the partial file.
#[derive(Debug, Clone)]
pub struct DownloadManager {
    registry: Arc<RegistryClient>,
    store: ModelStore,
}

impl DownloadManager {
    pub fn new(registry: Arc<RegistryClient>, store: ModelStore) -> Self {
        Self { registry, store }
    }

    /// Run `job` to a terminal state.
    ///
    /// `on_progress` is called once per received chunk, in stream order.
    /// Rejections (no install root, existing file) and cancellation come back
    /// as `Ok` with `success == false`. HTTP and I/O failures come back as
    /// `Err` after the partial file is removed.
    pub async fn start<F>(&self, job: &mut DownloadJob, mut on_progress: F) -> Result<DownloadOutcome>
    where
        F: FnMut(DownloadProgress),
    {
        if job.state != JobState::Idle {
            return Err(OrlovaError::Validation {
                field: "job".into(),
                message: format!("Download {} is already {}", job.id, job.state),
            });
        }
        job.state = JobState::Requested;

        let Some(dir) = self.store.destination_dir(job.kind) else {
            return Ok(job.finish(JobState::Failed, DownloadOutcome::rejected(ROOT_NOT_CONFIGURED)));
        };
        let Some(name) = Path::new(&job.filename).file_name().map(|n| n.to_os_string()) else {
            job.state = JobState::Failed;
            return Err(OrlovaError::Validation {
                field: "filename".into(),
                message: format!("No file name in {:?}", job.filename),
            });
        };
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            job.state = JobState::Failed;
            return Err(OrlovaError::io_with_path(e, &dir));
        }

        let target = dir.join(name);
        if target.exists() {
            return Ok(job.finish(
                JobState::Failed,
                DownloadOutcome::rejected(format!("File already exists: {}", target.display())),
            ));
        }
        if job.token().is_cancelled() {
            return Ok(job.finish(JobState::Cancelled, DownloadOutcome::rejected(CANCELLED_MESSAGE)));
        }

        let part = part_path(&target);
        info!(
            "Downloading {}/{} to {}",
            job.repo_id,
            job.filename,
            target.display()
        );

        let streamed = self.stream_to_file(job, &dir, &part, &mut on_progress).await;
        match settle(streamed, job.token().is_cancelled()) {
            Ok(StreamEnd::Completed) => {
                if let Err(e) = tokio::fs::rename(&part, &target).await {
                    remove_partial(&part).await;
                    job.state = JobState::Failed;
                    return Err(OrlovaError::io_with_path(e, &target));
                }
                info!("Downloaded {} ({})", target.display(), format_bytes(job.downloaded_bytes));
                let message = format!("Downloaded to {}", target.display());
                Ok(job.finish(JobState::Completed, DownloadOutcome::completed(target, message)))
            }
            Ok(StreamEnd::Cancelled) => {
                info!("Download cancelled: {}/{}", job.repo_id, job.filename);
                remove_partial(&part).await;
                Ok(job.finish(JobState::Cancelled, DownloadOutcome::rejected(CANCELLED_MESSAGE)))
            }
            Err(e) => {
                warn!("Download failed for {}/{}: {}", job.repo_id, job.filename, e);
                remove_partial(&part).await;
                job.state = JobState::Failed;
                Err(e)
            }
        }
    }

    async fn stream_to_file(
        &self,
        job: &mut DownloadJob,
        dir: &Path,
        part: &Path,
        on_progress: &mut impl FnMut(DownloadProgress),
    ) -> Result<StreamEnd> {
        let token = job.token().clone();

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(StreamEnd::Cancelled),
            response = self.registry.open_download(&job.repo_id, &job.filename) => response?,
        };
        job.state = JobState::Streaming;

        let total = response.content_length().filter(|t| *t > 0);
        job.total_bytes = total;
        if let Some(total) = total {
            let target_dir = dir.to_path_buf();
            match tokio::task::spawn_blocking(move || disk::check_space(total, &target_dir)).await {
                Ok(check) if !check.fits => warn!("{}", check.message),
                Ok(check) if check.low_space_warning => info!("{}", check.message),
                Ok(_) => {}
                Err(e) => warn!("Space check did not complete: {}", e),
            }
        }

        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| OrlovaError::io_with_path(e, part))?;
        let mut stream = response.bytes_stream();

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(StreamEnd::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };

            let chunk = chunk.map_err(|e| OrlovaError::DownloadFailed {
                url: self.registry.resolve_url(&job.repo_id, &job.filename),
                message: format!("Download stream error: {}", e),
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| OrlovaError::io_with_path(e, part))?;

            job.downloaded_bytes += chunk.len() as u64;
            on_progress(progress_event(job.downloaded_bytes, total));
        }

        file.flush()
            .await
            .map_err(|e| OrlovaError::io_with_path(e, part))?;
        Ok(StreamEnd::Completed)
    }
}

/// A failure seen after the token fired is the cancellation surfacing.
fn settle(streamed: Result<StreamEnd>, cancelled: bool) -> Result<StreamEnd> {
    match streamed {
        Err(e) if cancelled => {
            debug!("Error after cancellation treated as cancel: {}", e);
            Ok(StreamEnd::Cancelled)
        }
        other => other,
    }
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(NetworkConfig::DOWNLOAD_TEMP_SUFFIX);
    PathBuf::from(name)
}

async fn remove_partial(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => debug!("Removed partial file {}", part.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial file {}: {}", part.display(), e),
    }
}

fn progress_event(downloaded: u64, total: Option<u64>) -> DownloadProgress {
    let status = match total {
        Some(total) => format!(
            "Downloading: {} / {}",
            format_bytes(downloaded),
            format_bytes(total)
        ),
        None => format!("Downloading: {}", format_bytes(downloaded)),
    };
    DownloadProgress {
        status,
        percent: total.map(|total| {
            ((downloaded as f64 / total as f64) * 100.0)
                .round()
                .clamp(0.0, 100.0) as u8
        }),
        downloaded_bytes: Some(downloaded),
        total_bytes: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/m/models/vae/x.safetensors")),
            PathBuf::from("/m/models/vae/x.safetensors.part")
        );
    }

    #[test]
    fn test_progress_event_with_total() {
        let event = progress_event(512, Some(2048));
        assert_eq!(event.percent, Some(25));
        assert_eq!(event.status, "Downloading: 512.0 B / 2.0 KB");
        assert_eq!(event.total_bytes, Some(2048));
    }

    #[test]
    fn test_progress_event_without_total() {
        let event = progress_event(4096, None);
        assert_eq!(event.percent, None);
        assert_eq!(event.status, "Downloading: 4.0 KB");
        assert_eq!(event.downloaded_bytes, Some(4096));
    }

    fn stream_error() -> OrlovaError {
        OrlovaError::DownloadFailed {
            url: "http://hub.test/org/repo/resolve/main/x.safetensors".into(),
            message: "Download stream error: connection reset".into(),
        }
    }

    #[test]
    fn test_settle_error_after_cancel_is_cancelled() {
        assert!(matches!(settle(Err(stream_error()), true), Ok(StreamEnd::Cancelled)));
    }

    #[test]
    fn test_settle_error_without_cancel_stays_error() {
        assert!(matches!(
            settle(Err(stream_error()), false),
            Err(OrlovaError::DownloadFailed { .. })
        ));
        assert!(matches!(settle(Ok(StreamEnd::Completed), true), Ok(StreamEnd::Completed)));
    }

    #[tokio::test]
    async fn test_remove_partial_ignores_missing_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        remove_partial(&temp_dir.path().join("nothing.part")).await;
    }
}
