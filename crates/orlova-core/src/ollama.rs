//! HTTP client for a running Ollama daemon.
//!
//! Quantized chat models are not downloaded by this crate directly: the
//! daemon pulls `hf.co/<repo>:<quant>` references itself and streams
//! newline-delimited JSON status lines back, which are turned into
//! [`DownloadProgress`] events here.

use crate::cancel::CancellationToken;
use crate::config::NetworkConfig;
use crate::download::{DownloadOutcome, DownloadProgress};
use crate::error::{OrlovaError, Result};
use crate::format::format_bytes;
use crate::models::ActionResult;
use crate::registry::RegistryClient;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Timeout for short API calls (list, delete).
const API_TIMEOUT: Duration = Duration::from_secs(10);

const PULL_CANCELLED_MESSAGE: &str = "Pull cancelled";

static HF_REFERENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"hf\.co/([^:]+)").unwrap());

/// A model installed in the daemon, as listed by `GET /api/tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalModel {
    pub name: String,
    /// First 12 characters of the manifest digest.
    pub id: String,
    pub size: u64,
    pub size_human: String,
    pub modified_at: String,
    pub family: Option<String>,
    pub parameter_size: Option<String>,
    pub quantization_level: Option<String>,
}

/// Result of comparing an installed model against the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheck {
    pub has_update: bool,
    pub local_date: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Option<Vec<TagsModel>>,
}

#[derive(Debug, Deserialize)]
struct TagsModel {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    digest: String,
    #[serde(default)]
    modified_at: String,
    #[serde(default)]
    details: TagsDetails,
}

#[derive(Debug, Default, Deserialize)]
struct TagsDetails {
    family: Option<String>,
    parameter_size: Option<String>,
    quantization_level: Option<String>,
}

/// One line of the streamed `POST /api/pull` response.
#[derive(Debug, Deserialize)]
struct PullLine {
    #[serde(default)]
    status: String,
    total: Option<u64>,
    completed: Option<u64>,
    error: Option<String>,
}

/// Reference the daemon resolves against the registry.
pub fn pull_reference(repo_id: &str, quantization: &str) -> String {
    format!("hf.co/{}:{}", repo_id, quantization.to_lowercase())
}

/// Client for the local Ollama daemon.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: Client,
    /// Pulls stream for as long as the daemon downloads; no total timeout.
    pull_client: Client,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| net_err(format!("Failed to create Ollama HTTP client: {}", e)))?;

        let pull_client = Client::builder()
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| net_err(format!("Failed to create Ollama pull client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            pull_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List models installed in the daemon.
    pub async fn list_local_models(&self) -> Result<Vec<LocalModel>> {
        let url = format!("{}/api/tags", self.base_url);
        info!("Listing local models from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| net_err(format!("Failed to connect to Ollama at {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(daemon_error(status.as_u16(), &body));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| net_err(format!("Failed to parse Ollama tags response: {}", e)))?;

        let models: Vec<LocalModel> = tags
            .models
            .unwrap_or_default()
            .into_iter()
            .map(|m| LocalModel {
                id: m.digest.chars().take(12).collect(),
                size_human: format_bytes(m.size),
                name: m.name,
                size: m.size,
                modified_at: m.modified_at,
                family: m.details.family,
                parameter_size: m.details.parameter_size,
                quantization_level: m.details.quantization_level,
            })
            .collect();

        debug!("Ollama has {} installed models", models.len());
        Ok(models)
    }

    /// Have the daemon pull `repo_id` at `quantization`.
    ///
    /// Progress is reported once per status line. Cancellation returns an
    /// unsuccessful outcome; the daemon keeps whatever it already fetched.
    pub async fn pull<F>(
        &self,
        repo_id: &str,
        quantization: &str,
        token: &CancellationToken,
        mut on_progress: F,
    ) -> Result<DownloadOutcome>
    where
        F: FnMut(DownloadProgress),
    {
        let reference = pull_reference(repo_id, quantization);
        if token.is_cancelled() {
            return Ok(DownloadOutcome::rejected(PULL_CANCELLED_MESSAGE));
        }

        let url = format!("{}/api/pull", self.base_url);
        info!("Starting model pull for {}", reference);
        let request = self
            .pull_client
            .post(&url)
            .json(&serde_json::json!({ "name": reference, "stream": true }))
            .send();

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("Model pull cancelled: {}", reference);
                return Ok(DownloadOutcome::rejected(PULL_CANCELLED_MESSAGE));
            }
            response = request => response
                .map_err(|e| net_err(format!("Failed to send pull request to Ollama: {}", e)))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Pull API error {}: {}", status, body);
            return Err(daemon_error(status.as_u16(), &body));
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut last_error: Option<String> = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                next = stream.next() => Some(next),
            };
            let Some(next) = next else {
                info!("Model pull cancelled: {}", reference);
                return Ok(DownloadOutcome::rejected(PULL_CANCELLED_MESSAGE));
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(_) if token.is_cancelled() => {
                    return Ok(DownloadOutcome::rejected(PULL_CANCELLED_MESSAGE));
                }
                Err(e) => {
                    return Err(net_err(format!("Pull stream from Ollama failed: {}", e)));
                }
            };

            buffer.extend_from_slice(&chunk);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                handle_pull_line(&line, &mut last_error, &mut on_progress);
            }
        }
        // Trailing line without a newline.
        if !buffer.is_empty() {
            handle_pull_line(&buffer, &mut last_error, &mut on_progress);
        }

        if let Some(message) = last_error {
            error!("Pull failed for {}: {}", reference, message);
            return Err(OrlovaError::PullFailed {
                model: reference,
                message,
            });
        }

        info!("Model pull completed: {}", reference);
        Ok(DownloadOutcome {
            success: true,
            message: format!("Model pulled: {}", reference),
            path: None,
        })
    }

    /// Remove an installed model.
    pub async fn delete_model(&self, name: &str) -> Result<ActionResult> {
        let url = format!("{}/api/delete", self.base_url);
        info!("Deleting Ollama model '{}'", name);

        let response = self
            .client
            .delete(&url)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(|e| net_err(format!("Failed to send delete request to Ollama: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Failed to delete {} ({}): {}", name, status, body);
            return Ok(ActionResult::failed(format!(
                "Failed to delete {}: {}",
                name, body
            )));
        }

        info!("Model deleted: {}", name);
        Ok(ActionResult::ok(format!("Deleted {}", name)))
    }

    /// Compare an installed `hf.co/...` model with the registry's last
    /// modification time.
    pub async fn check_model_update(
        &self,
        name: &str,
        registry: &RegistryClient,
    ) -> Result<UpdateCheck> {
        let installed = self.list_local_models().await?;
        let Some(local) = installed.into_iter().find(|m| m.name == name) else {
            return Ok(UpdateCheck {
                has_update: false,
                local_date: None,
                message: format!("Model {} is not installed locally", name),
            });
        };

        let Some(repo_id) = HF_REFERENCE
            .captures(name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
        else {
            return Ok(UpdateCheck {
                has_update: false,
                local_date: Some(local.modified_at),
                message: "Cannot check updates for non-HF models".into(),
            });
        };

        let Some(remote) = registry.model_details(&repo_id).await? else {
            return Ok(UpdateCheck {
                has_update: false,
                local_date: Some(local.modified_at),
                message: format!("Model {} not found on Hugging Face", repo_id),
            });
        };

        let has_update = match DateTime::parse_from_rfc3339(&local.modified_at) {
            Ok(local_date) => remote.last_modified > local_date.with_timezone(&Utc),
            Err(e) => {
                debug!("Unparseable local date {:?}: {}", local.modified_at, e);
                false
            }
        };

        let message = if has_update {
            format!(
                "Update available: remote {} > local {}",
                remote.last_modified.to_rfc3339(),
                local.modified_at
            )
        } else {
            format!("Model is up to date (local: {})", local.modified_at)
        };

        Ok(UpdateCheck {
            has_update,
            local_date: Some(local.modified_at),
            message,
        })
    }
}

fn net_err(message: String) -> OrlovaError {
    OrlovaError::Network {
        message,
        cause: None,
    }
}

fn daemon_error(status: u16, body: &str) -> OrlovaError {
    OrlovaError::registry("Ollama API", status, body, NetworkConfig::ERROR_BODY_MAX_CHARS)
}

fn handle_pull_line(
    raw: &[u8],
    last_error: &mut Option<String>,
    on_progress: &mut impl FnMut(DownloadProgress),
) {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    let line: PullLine = match serde_json::from_str(trimmed) {
        Ok(line) => line,
        Err(e) => {
            debug!("Skipping unparseable pull line: {}", e);
            return;
        }
    };
    if let Some(message) = line.error {
        *last_error = Some(message);
        return;
    }
    on_progress(pull_progress(&line));
}

fn pull_progress(line: &PullLine) -> DownloadProgress {
    let status = humanize_status(&line.status);
    match (line.total, line.completed) {
        (Some(total), Some(completed)) if total > 0 && completed > 0 => DownloadProgress {
            status: format!(
                "{}: {} / {}",
                status,
                format_bytes(completed),
                format_bytes(total)
            ),
            percent: Some(
                ((completed as f64 / total as f64) * 100.0)
                    .round()
                    .clamp(0.0, 100.0) as u8,
            ),
            downloaded_bytes: Some(completed),
            total_bytes: Some(total),
        },
        _ => DownloadProgress {
            status,
            percent: None,
            downloaded_bytes: line.completed,
            total_bytes: line.total,
        },
    }
}

fn humanize_status(raw: &str) -> String {
    if let Some(layer) = raw.strip_prefix("pulling ") {
        return format!("Pulling: {}", layer);
    }
    match raw {
        "verifying sha256 digest" => "Verifying checksum...".into(),
        "writing manifest" => "Writing manifest...".into(),
        "success" => "Done!".into(),
        _ if raw.starts_with("converting") => "Converting...".into(),
        _ => raw.to_string(),
    }
}
