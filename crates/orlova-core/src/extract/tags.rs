//! Capability facts derived from tag lists.

use crate::models::DestinationKind;
use regex::Regex;
use std::sync::LazyLock;

static PARAM_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\d+(?:\.\d+)?[BMK]?$").unwrap());

/// Keyword rules for destination kinds, checked in order. The first keyword
/// found as a substring of any tag (or the pipeline tag) decides the kind.
const DESTINATION_RULES: &[(&str, DestinationKind)] = &[
    ("lora", DestinationKind::Lora),
    ("vae", DestinationKind::Vae),
    ("controlnet", DestinationKind::ControlNet),
    ("upscal", DestinationKind::Upscaler),
];

/// First tag that is a bare size token such as `7B`, `1.5B` or `350M`.
pub fn parameter_size(tags: &[String]) -> Option<String> {
    tags.iter().find(|t| PARAM_SIZE.is_match(t)).cloned()
}

/// Whether the tags advertise chat or instruction tuning.
pub fn supports_chat(tags: &[String]) -> bool {
    tags.iter()
        .any(|t| t == "chat_template" || t.contains("chat") || t.contains("instruct"))
}

/// Classify an auxiliary asset from its tags and pipeline tag.
pub fn infer_destination_kind(tags: &[String], pipeline_tag: Option<&str>) -> DestinationKind {
    let haystack: Vec<String> = tags
        .iter()
        .map(String::as_str)
        .chain(pipeline_tag)
        .map(str::to_lowercase)
        .collect();

    DESTINATION_RULES
        .iter()
        .find(|(keyword, _)| haystack.iter().any(|t| t.contains(keyword)))
        .map(|(_, kind)| *kind)
        .unwrap_or_default()
}
