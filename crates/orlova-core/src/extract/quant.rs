//! Quantization labels: vocabulary, filename matching and quality tiers.

use crate::models::Quantization;
use crate::registry::types::RawSibling;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Known labels and their quality tier, lowest fidelity first.
pub const QUANT_TIERS: &[(&str, u8)] = &[
    ("Q2_K", 1),
    ("Q2_K_S", 1),
    ("IQ3_XXS", 2),
    ("IQ3_XS", 2),
    ("IQ3_S", 2),
    ("IQ3_M", 2),
    ("Q3_K_S", 2),
    ("Q3_K_M", 2),
    ("Q3_K_L", 2),
    ("IQ4_XS", 3),
    ("IQ4_NL", 3),
    ("Q4_0", 3),
    ("Q4_1", 3),
    ("Q4_K_S", 3),
    ("Q4_K_M", 3),
    ("Q5_0", 4),
    ("Q5_1", 4),
    ("Q5_K_S", 4),
    ("Q5_K_M", 4),
    ("Q6_K", 5),
    ("Q8_0", 6),
    ("BF16", 7),
    ("F16", 7),
    ("FP16", 7),
    ("F32", 8),
    ("FP32", 8),
];

/// Short floor names accepted in place of a full label.
const FLOOR_ALIASES: &[(&str, u8)] = &[
    ("Q2", 1),
    ("Q3", 2),
    ("Q4", 3),
    ("Q5", 4),
    ("Q6", 5),
    ("Q8", 6),
    ("F16", 7),
    ("F32", 8),
];

/// Tier used when a floor name is not recognized.
const DEFAULT_FLOOR_TIER: u8 = 3;

// A separator, then an integer-bit code (`Q4`, `IQ3`) with an optional
// `_K`, `_K_S|M|L`, `_<digit>` or importance-matrix (`_XXS`, `_NL`, ...)
// suffix, or a float marker, then a separator or end of string.
static QUANT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[-_.](?P<q>I?Q\d+(?:_K(?:_[SML])?|_\d|_(?:XXS|XS|NL|S|M|L))?|B?FP?(?:16|32))(?:[-_.]|$)",
    )
    .unwrap()
});

/// Tier of a known label, `None` if the label is outside the vocabulary.
pub fn quant_tier(label: &str) -> Option<u8> {
    QUANT_TIERS
        .iter()
        .find(|(known, _)| *known == label)
        .map(|(_, tier)| *tier)
}

/// Tier of a label, 0 for unknown labels.
pub fn quant_level(label: &str) -> u8 {
    quant_tier(label).unwrap_or(0)
}

/// Tier for a minimum-quality floor: alias first, then exact label, else Q4.
pub fn min_quant_level(floor: &str) -> u8 {
    let floor = floor.to_uppercase();
    FLOOR_ALIASES
        .iter()
        .find(|(alias, _)| *alias == floor)
        .map(|(_, tier)| *tier)
        .or_else(|| quant_tier(&floor))
        .unwrap_or(DEFAULT_FLOOR_TIER)
}

/// Match a quantization token in a filename and return it upper-cased.
///
/// This is a pure pattern match: the result is not checked against the
/// vocabulary.
pub fn match_quant_token(filename: &str) -> Option<String> {
    QUANT_TOKEN
        .captures(filename)
        .and_then(|caps| caps.name("q"))
        .map(|m| m.as_str().to_uppercase())
}

/// Collect quantizations from a manifest.
///
/// Only `.gguf` entries are considered. Labels outside the vocabulary are
/// dropped and the first file seen for a label wins.
pub fn extract_quantizations(siblings: &[RawSibling]) -> Vec<Quantization> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for sibling in siblings.iter().filter(|s| s.rfilename.ends_with(".gguf")) {
        let Some(label) = match_quant_token(&sibling.rfilename) else {
            continue;
        };
        if quant_tier(&label).is_none() || !seen.insert(label.clone()) {
            continue;
        }
        found.push(Quantization {
            label,
            filename: sibling.rfilename.clone(),
            size_bytes: None,
        });
    }

    found
}

/// Whether any quantization reaches the floor tier.
pub fn meets_floor(quantizations: &[Quantization], floor_tier: u8) -> bool {
    quantizations
        .iter()
        .any(|q| quant_level(&q.label) >= floor_tier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn siblings(names: &[&str]) -> Vec<RawSibling> {
        names
            .iter()
            .map(|n| RawSibling {
                rfilename: n.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_match_quant_token() {
        assert_eq!(match_quant_token("model-Q4_K_M.gguf").as_deref(), Some("Q4_K_M"));
        assert_eq!(match_quant_token("model.F16.bin").as_deref(), Some("F16"));
        assert_eq!(match_quant_token("llama-3-8b.iq3_xxs.gguf").as_deref(), Some("IQ3_XXS"));
        assert_eq!(match_quant_token("phi-3-IQ4_NL.gguf").as_deref(), Some("IQ4_NL"));
        assert_eq!(match_quant_token("llama-3-8b.IQ3_S.gguf").as_deref(), Some("IQ3_S"));
        assert_eq!(match_quant_token("mistral-7b-instruct-q8_0.gguf").as_deref(), Some("Q8_0"));
        assert_eq!(match_quant_token("model-bf16.gguf").as_deref(), Some("BF16"));
        assert_eq!(match_quant_token("README.md"), None);
    }

    #[test]
    fn test_safetensors_not_scanned() {
        assert!(extract_quantizations(&siblings(&["model-f16.safetensors"])).is_empty());
    }

    #[test]
    fn test_first_match_wins_and_unknown_dropped() {
        let found = extract_quantizations(&siblings(&[
            "a/model-Q4_K_M.gguf",
            "b/model-q4_k_m.gguf",
            "model-Q7_K.gguf",
            "model-Q8_0.gguf",
            "config.json",
        ]));
        let labels: Vec<_> = found.iter().map(|q| q.label.as_str()).collect();
        assert_eq!(labels, vec!["Q4_K_M", "Q8_0"]);
        assert_eq!(found[0].filename, "a/model-Q4_K_M.gguf");
        assert!(found.iter().all(|q| q.size_bytes.is_none()));
    }

    #[test]
    fn test_min_quant_level() {
        assert_eq!(min_quant_level("Q4"), 3);
        assert_eq!(min_quant_level("q5"), 4);
        assert_eq!(min_quant_level("Q6_K"), 5);
        assert_eq!(min_quant_level("BF16"), 7);
        assert_eq!(min_quant_level("nonsense"), 3);
    }

    #[test]
    fn test_meets_floor() {
        let found = extract_quantizations(&siblings(&["m-Q3_K_M.gguf", "m-Q5_K_S.gguf"]));
        assert!(meets_floor(&found, 4));
        assert!(!meets_floor(&found, 5));
        assert!(!meets_floor(&[], 1));
    }

    #[test]
    fn test_vocabulary_labels_are_uppercase() {
        assert!(QUANT_TIERS
            .iter()
            .all(|(label, tier)| label.to_uppercase() == *label && (1..=8).contains(tier)));
    }
}
