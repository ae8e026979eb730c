//! Ranking inputs and outputs.

use crate::config::SearchConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the user intends to do with the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPreference {
    #[default]
    Code,
    Chat,
    General,
}

impl TaskPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPreference::Code => "code",
            TaskPreference::Chat => "chat",
            TaskPreference::General => "general",
        }
    }
}

impl std::str::FromStr for TaskPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "code" => Ok(TaskPreference::Code),
            "chat" => Ok(TaskPreference::Chat),
            "general" => Ok(TaskPreference::General),
            other => Err(format!("Unknown task preference: {}", other)),
        }
    }
}

/// Caller constraints for ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankPreferences {
    /// Memory budget in GB. `None` or zero gives every candidate a neutral size score.
    pub available_ram_gb: Option<f64>,
    pub task: TaskPreference,
    pub top_k: usize,
}

impl Default for RankPreferences {
    fn default() -> Self {
        Self {
            available_ram_gb: None,
            task: TaskPreference::default(),
            top_k: SearchConfig::DEFAULT_TOP_K,
        }
    }
}

/// The six sub-scores, each in `[0, 1]` and rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub size_score: f64,
    pub quant_score: f64,
    pub freshness_score: f64,
    pub popularity_score: f64,
    pub task_score: f64,
    pub chat_template_score: f64,
}

/// A candidate with its composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    pub model_id: String,
    pub author: String,
    /// Weighted composite in `[0, 1]`, rounded to three decimals.
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    /// Highest-quality quantization label, or `NONE`.
    pub best_quant: String,
    pub parameter_size: Option<String>,
    pub downloads: u64,
    pub likes: u64,
    pub last_modified: DateTime<Utc>,
}

impl ScoredCandidate {
    /// Reference understood by `ollama pull`, e.g. `hf.co/org/repo:q4_k_m`.
    pub fn pull_reference(&self) -> Option<String> {
        (self.best_quant != super::scorer::NO_QUANT)
            .then(|| crate::ollama::pull_reference(&self.model_id, &self.best_quant))
    }
}

/// Result of ranking a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankOutcome {
    pub ranked: Vec<ScoredCandidate>,
    /// Guidance shown when there was nothing to rank.
    pub message: Option<String>,
}
