//! Turns raw registry records into typed candidates.
//!
//! - [`quant`] - quantization vocabulary, filename matching, tiers
//! - [`tags`] - parameter size, chat support and asset-kind inference
//!
//! Records arrive as untrusted JSON. Each is validated on its own; a record
//! that does not deserialize is logged and skipped while the rest of the
//! batch goes through.

pub mod quant;
pub mod tags;

pub use quant::{extract_quantizations, match_quant_token, min_quant_level, quant_level};
pub use tags::{infer_destination_kind, parameter_size, supports_chat};

use crate::models::{Candidate, DestinationKind, DiffusionCandidate, DiffusionFile};
use crate::registry::types::{RawRecord, RawSibling};
use chrono::{DateTime, Utc};
use tracing::warn;

/// File extensions treated as auxiliary-asset weights.
pub const DIFFUSION_EXTENSIONS: &[&str] = &[".safetensors", ".ckpt", ".pt", ".pth", ".bin"];

/// Build a candidate from a validated record.
///
/// `now` stands in for a missing or unparseable modification time.
pub fn extract_candidate(raw: RawRecord, now: DateTime<Utc>) -> Candidate {
    let is_gated = raw.is_gated();
    Candidate {
        author: author_or_owner(raw.author.as_deref(), &raw.id),
        last_modified: parse_timestamp(raw.last_modified.as_deref()).unwrap_or(now),
        quantizations: extract_quantizations(&raw.siblings),
        supports_chat: supports_chat(&raw.tags),
        parameter_size: parameter_size(&raw.tags),
        is_private: raw.private,
        is_gated,
        id: raw.id,
        tags: raw.tags,
        pipeline_tag: raw.pipeline_tag,
        downloads: raw.downloads,
        likes: raw.likes,
    }
}

/// Extract every well-formed record, skipping the rest.
pub fn extract_batch(values: Vec<serde_json::Value>, now: DateTime<Utc>) -> Vec<Candidate> {
    values
        .into_iter()
        .filter_map(parse_record)
        .map(|raw| extract_candidate(raw, now))
        .collect()
}

/// Build an auxiliary-asset candidate.
///
/// `forced_kind` labels the result; without it the kind is inferred from tags.
pub fn extract_diffusion_candidate(
    raw: RawRecord,
    forced_kind: Option<DestinationKind>,
    now: DateTime<Utc>,
) -> DiffusionCandidate {
    let is_gated = raw.is_gated();
    let model_type = forced_kind
        .unwrap_or_else(|| infer_destination_kind(&raw.tags, raw.pipeline_tag.as_deref()));
    DiffusionCandidate {
        author: author_or_owner(raw.author.as_deref(), &raw.id),
        last_modified: parse_timestamp(raw.last_modified.as_deref()).unwrap_or(now),
        files: weight_files(&raw.siblings),
        is_private: raw.private,
        is_gated,
        model_type,
        id: raw.id,
        tags: raw.tags,
        pipeline_tag: raw.pipeline_tag,
        downloads: raw.downloads,
        likes: raw.likes,
    }
}

/// Extract auxiliary-asset candidates, dropping records without weight files.
pub fn extract_diffusion_batch(
    values: Vec<serde_json::Value>,
    forced_kind: Option<DestinationKind>,
    now: DateTime<Utc>,
) -> Vec<DiffusionCandidate> {
    values
        .into_iter()
        .filter_map(parse_record)
        .map(|raw| extract_diffusion_candidate(raw, forced_kind, now))
        .filter(|candidate| !candidate.files.is_empty())
        .collect()
}

/// Whether a filename carries one of the weight extensions.
pub fn is_weight_file(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    DIFFUSION_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn parse_record(value: serde_json::Value) -> Option<RawRecord> {
    match serde_json::from_value::<RawRecord>(value) {
        Ok(raw) => Some(raw),
        Err(e) => {
            warn!("Skipping malformed registry record: {}", e);
            None
        }
    }
}

fn author_or_owner(author: Option<&str>, id: &str) -> String {
    author
        .filter(|a| !a.is_empty())
        .or_else(|| id.split('/').next().filter(|owner| !owner.is_empty()))
        .unwrap_or("unknown")
        .to_string()
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn weight_files(siblings: &[RawSibling]) -> Vec<DiffusionFile> {
    siblings
        .iter()
        .filter(|s| is_weight_file(&s.rfilename))
        .map(|s| DiffusionFile {
            filename: s.rfilename.clone(),
            size_bytes: None,
        })
        .collect()
}
