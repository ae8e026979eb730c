//! Download job, progress and outcome types.

use crate::cancel::CancellationToken;
use crate::models::DestinationKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Progress event emitted once per received chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    /// Human-readable status line.
    pub status: String,
    /// 0-100, present only when the total size is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
}

/// Terminal result of a download or pull.
///
/// Cancellation and up-front rejections are reported here with
/// `success == false`; only transfer failures surface as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl DownloadOutcome {
    pub fn completed(path: PathBuf, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            path: Some(path),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            path: None,
        }
    }
}

/// Lifecycle of a job. There is no transition out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Requested,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Idle => "idle",
            JobState::Requested => "requested",
            JobState::Streaming => "streaming",
            JobState::Completed => "completed",
            JobState::Cancelled => "cancelled",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One download of one file from one repository.
///
/// Jobs are single-use: a failed or cancelled job is replaced by a new one.
#[derive(Debug)]
pub struct DownloadJob {
    pub id: Uuid,
    pub repo_id: String,
    /// Path of the file inside the repository.
    pub filename: String,
    pub kind: DestinationKind,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    pub(crate) state: JobState,
    pub(crate) outcome: Option<DownloadOutcome>,
    token: CancellationToken,
}

impl DownloadJob {
    pub fn new(
        repo_id: impl Into<String>,
        filename: impl Into<String>,
        kind: DestinationKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            repo_id: repo_id.into(),
            filename: filename.into(),
            kind,
            downloaded_bytes: 0,
            total_bytes: None,
            state: JobState::Idle,
            outcome: None,
            token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn outcome(&self) -> Option<&DownloadOutcome> {
        self.outcome.as_ref()
    }

    /// A handle that cancels this job from another task.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.token.clone()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn finish(&mut self, state: JobState, outcome: DownloadOutcome) -> DownloadOutcome {
        self.state = state;
        self.outcome = Some(outcome.clone());
        outcome
    }
}
