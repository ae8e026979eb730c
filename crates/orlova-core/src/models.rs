//! Domain types shared across the search, ranking and download pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One quantization variant found in a model's file manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quantization {
    /// Upper-cased label from the known vocabulary, e.g. `Q4_K_M`.
    pub label: String,
    /// Manifest entry the label was taken from.
    pub filename: String,
    /// The registry listing does not carry file sizes, so this is usually `None`.
    pub size_bytes: Option<u64>,
}

/// A registry record after extraction, ready for scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub author: String,
    pub last_modified: DateTime<Utc>,
    pub tags: Vec<String>,
    pub pipeline_tag: Option<String>,
    pub downloads: u64,
    pub likes: u64,
    pub quantizations: Vec<Quantization>,
    pub is_private: bool,
    pub is_gated: bool,
    /// Derived from tags: the model advertises chat or instruction tuning.
    pub supports_chat: bool,
    /// Bare size tag such as `7B` or `1.5B`.
    pub parameter_size: Option<String>,
}

/// Search response for the primary (GGUF) catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub models: Vec<Candidate>,
    pub total: usize,
}

/// Category of an auxiliary asset. Determines the target subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    #[default]
    Checkpoint,
    Lora,
    Vae,
    #[serde(rename = "controlnet")]
    ControlNet,
    Upscaler,
}

impl DestinationKind {
    pub const ALL: [DestinationKind; 5] = [
        DestinationKind::Checkpoint,
        DestinationKind::Lora,
        DestinationKind::Vae,
        DestinationKind::ControlNet,
        DestinationKind::Upscaler,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::Checkpoint => "checkpoint",
            DestinationKind::Lora => "lora",
            DestinationKind::Vae => "vae",
            DestinationKind::ControlNet => "controlnet",
            DestinationKind::Upscaler => "upscaler",
        }
    }

    /// Subdirectory of the install root that holds this kind.
    pub fn subdir(&self) -> &'static str {
        match self {
            DestinationKind::Checkpoint => "models/checkpoints",
            DestinationKind::Lora => "models/loras",
            DestinationKind::Vae => "models/vae",
            DestinationKind::ControlNet => "models/controlnet",
            DestinationKind::Upscaler => "models/upscale_models",
        }
    }

    /// Registry tags describing this kind. Only the first is sent as a filter.
    pub fn registry_tags(&self) -> &'static [&'static str] {
        match self {
            DestinationKind::Checkpoint => &["text-to-image", "image-to-image"],
            DestinationKind::Lora => &["lora", "text-to-image"],
            DestinationKind::Vae => &["vae"],
            DestinationKind::ControlNet => &["controlnet"],
            DestinationKind::Upscaler => &["image-to-image", "upscaler"],
        }
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DestinationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DestinationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown destination kind: {}", s))
    }
}

/// A weight file of an auxiliary asset repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffusionFile {
    pub filename: String,
    pub size_bytes: Option<u64>,
}

/// A registry record from the image-generation side of the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffusionCandidate {
    pub id: String,
    pub author: String,
    pub last_modified: DateTime<Utc>,
    pub tags: Vec<String>,
    pub pipeline_tag: Option<String>,
    pub downloads: u64,
    pub likes: u64,
    pub files: Vec<DiffusionFile>,
    pub is_private: bool,
    pub is_gated: bool,
    pub model_type: DestinationKind,
}

/// Search response for the auxiliary catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffusionResults {
    pub models: Vec<DiffusionCandidate>,
    pub total: usize,
}

/// Outcome of a user-facing action that can fail without being an error,
/// such as deleting a file that is already gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_kind_parse_and_display() {
        assert_eq!("LoRA".parse::<DestinationKind>(), Ok(DestinationKind::Lora));
        assert_eq!("controlnet".parse::<DestinationKind>(), Ok(DestinationKind::ControlNet));
        assert!("embedding".parse::<DestinationKind>().is_err());
        assert_eq!(DestinationKind::Upscaler.to_string(), "upscaler");
    }

    #[test]
    fn test_destination_kind_serde_names() {
        let json = serde_json::to_string(&DestinationKind::ControlNet).unwrap();
        assert_eq!(json, "\"controlnet\"");
        let kind: DestinationKind = serde_json::from_str("\"vae\"").unwrap();
        assert_eq!(kind, DestinationKind::Vae);
    }

    #[test]
    fn test_first_registry_tag() {
        assert_eq!(DestinationKind::Checkpoint.registry_tags()[0], "text-to-image");
        assert_eq!(DestinationKind::Upscaler.registry_tags()[0], "image-to-image");
    }
}
