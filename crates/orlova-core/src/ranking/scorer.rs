//! Sub-score functions.
//!
//! Each function maps one aspect of a candidate to `[0, 1]`. All of them are
//! pure; the reference time and batch maxima are passed in.

use super::types::TaskPreference;
use crate::extract::quant_level;
use crate::models::{Candidate, Quantization};
use chrono::{DateTime, Utc};

pub(crate) const NO_QUANT: &str = "NONE";

/// Composite weights. They sum to 1.0.
pub(crate) struct Weights;

impl Weights {
    pub const SIZE: f64 = 0.20;
    pub const QUANT: f64 = 0.15;
    pub const FRESHNESS: f64 = 0.15;
    pub const POPULARITY: f64 = 0.20;
    pub const TASK: f64 = 0.20;
    pub const CHAT: f64 = 0.10;
}

/// Approximate memory needed per parameter-size tag, in GB.
const PARAM_SIZE_GB: &[(&str, f64)] = &[
    ("1B", 0.5),
    ("1.5B", 0.8),
    ("2B", 1.0),
    ("3B", 1.5),
    ("4B", 2.0),
    ("7B", 3.5),
    ("8B", 4.0),
    ("9B", 4.5),
    ("13B", 6.5),
    ("14B", 7.0),
    ("15B", 7.5),
    ("20B", 10.0),
    ("30B", 15.0),
    ("33B", 16.5),
    ("34B", 17.0),
    ("35B", 17.5),
    ("40B", 20.0),
    ("65B", 32.5),
    ("70B", 35.0),
    ("72B", 36.0),
    ("110B", 55.0),
    ("120B", 60.0),
    ("180B", 90.0),
    ("405B", 202.5),
];

const DEFAULT_RAM_ESTIMATE_GB: f64 = 4.0;

/// `(ratio above which, score)` in decreasing ratio order.
const SIZE_STEPS: &[(f64, f64)] = &[(0.95, 0.0), (0.80, 0.2), (0.60, 0.5), (0.40, 0.8)];

/// Curated quality per label. Labels not listed fall back to `tier / 8`.
const QUANT_QUALITY: &[(&str, f64)] = &[
    ("Q2_K", 0.2),
    ("Q2_K_S", 0.2),
    ("Q3_K_S", 0.35),
    ("Q3_K_M", 0.4),
    ("Q3_K_L", 0.45),
    ("IQ3_XS", 0.35),
    ("IQ3_S", 0.35),
    ("IQ3_M", 0.4),
    ("IQ3_XXS", 0.3),
    ("Q4_0", 0.55),
    ("Q4_1", 0.6),
    ("Q4_K_S", 0.65),
    ("Q4_K_M", 0.7),
    ("IQ4_XS", 0.6),
    ("IQ4_NL", 0.65),
    ("Q5_0", 0.75),
    ("Q5_1", 0.78),
    ("Q5_K_S", 0.8),
    ("Q5_K_M", 0.85),
    ("Q6_K", 0.9),
    ("Q8_0", 0.95),
    ("F16", 1.0),
    ("FP16", 1.0),
];

const QUANT_LEVEL_DIVISOR: f64 = 8.0;

/// `(age in days below which, score)`; anything older scores [`STALE_SCORE`].
const FRESHNESS_STEPS: &[(f64, f64)] = &[
    (7.0, 1.0),
    (30.0, 0.9),
    (90.0, 0.7),
    (180.0, 0.5),
    (365.0, 0.3),
];
const STALE_SCORE: f64 = 0.1;

const CODE_TAGS: &[&str] = &["code", "code-generation", "coding"];
const CHAT_TAGS: &[&str] = &["chat", "conversational", "chatqa"];
const TEXT_GENERATION: &str = "text-generation";

pub(crate) fn estimate_ram_gb(parameter_size: Option<&str>) -> f64 {
    parameter_size
        .map(str::to_uppercase)
        .and_then(|size| {
            PARAM_SIZE_GB
                .iter()
                .find(|(tag, _)| *tag == size)
                .map(|(_, gb)| *gb)
        })
        .unwrap_or(DEFAULT_RAM_ESTIMATE_GB)
}

pub(crate) fn size_fit(parameter_size: Option<&str>, available_ram_gb: Option<f64>) -> f64 {
    let available = match available_ram_gb {
        Some(gb) if gb > 0.0 => gb,
        _ => return 0.5,
    };

    let ratio = estimate_ram_gb(parameter_size) / available;
    SIZE_STEPS
        .iter()
        .find(|(threshold, _)| ratio > *threshold)
        .map(|(_, score)| *score)
        .unwrap_or(1.0)
}

fn quant_quality(label: &str) -> f64 {
    QUANT_QUALITY
        .iter()
        .find(|(known, _)| *known == label)
        .map(|(_, q)| *q)
        .unwrap_or_else(|| f64::from(quant_level(label)) / QUANT_LEVEL_DIVISOR)
}

/// Best quality across the quantizations and the label that reached it.
///
/// Ties keep the earlier label.
pub(crate) fn best_quant(quantizations: &[Quantization]) -> (f64, String) {
    let Some(first) = quantizations.first() else {
        return (0.0, NO_QUANT.to_string());
    };

    let mut best_score = 0.0;
    let mut best_label = first.label.as_str();
    for q in quantizations {
        let score = quant_quality(&q.label);
        if score > best_score {
            best_score = score;
            best_label = q.label.as_str();
        }
    }
    (best_score, best_label.to_string())
}

pub(crate) fn freshness(last_modified: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = (now - last_modified).num_milliseconds() as f64 / 86_400_000.0;
    FRESHNESS_STEPS
        .iter()
        .find(|(days, _)| age_days < *days)
        .map(|(_, score)| *score)
        .unwrap_or(STALE_SCORE)
}

/// `0.7 * downloads / max + 0.3 * likes / max`, with each max at least 1.
pub(crate) fn popularity(downloads: u64, likes: u64, max_downloads: u64, max_likes: u64) -> f64 {
    let dl_norm = downloads as f64 / max_downloads.max(1) as f64;
    let like_norm = likes as f64 / max_likes.max(1) as f64;
    0.7 * dl_norm + 0.3 * like_norm
}

pub(crate) fn task_fit(candidate: &Candidate, preference: TaskPreference) -> f64 {
    let tags: Vec<String> = candidate.tags.iter().map(|t| t.to_lowercase()).collect();
    let pipeline = candidate
        .pipeline_tag
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();

    let has_any = |markers: &[&str]| {
        markers
            .iter()
            .any(|m| tags.iter().any(|t| t == m) || pipeline.contains(m))
    };
    let is_text_generation =
        tags.iter().any(|t| t == TEXT_GENERATION) || pipeline == TEXT_GENERATION;

    match preference {
        TaskPreference::Code if has_any(CODE_TAGS) => 1.0,
        TaskPreference::Code if is_text_generation => 0.6,
        TaskPreference::Code => 0.3,
        TaskPreference::Chat if has_any(CHAT_TAGS) => 1.0,
        TaskPreference::Chat if candidate.supports_chat => 0.8,
        TaskPreference::Chat => 0.3,
        TaskPreference::General if is_text_generation => 0.8,
        TaskPreference::General => 0.5,
    }
}

pub(crate) fn chat_support(candidate: &Candidate) -> f64 {
    if candidate.supports_chat {
        1.0
    } else {
        0.0
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
