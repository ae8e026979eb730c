//! Registry request and response shapes.

use crate::config::SearchConfig;
use crate::models::DestinationKind;
use serde::{Deserialize, Serialize};

/// Sort order accepted by the registry listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    #[serde(rename = "downloads")]
    Downloads,
    #[serde(rename = "likes")]
    Likes,
    #[serde(rename = "lastModified")]
    LastModified,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Downloads => "downloads",
            SortKey::Likes => "likes",
            SortKey::LastModified => "lastModified",
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "downloads" => Ok(SortKey::Downloads),
            "likes" => Ok(SortKey::Likes),
            "lastModified" | "last-modified" | "recent" => Ok(SortKey::LastModified),
            other => Err(format!("Unknown sort key: {}", other)),
        }
    }
}

/// Search parameters for the primary (GGUF) catalog as supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub query: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    /// Minimum quantization floor such as `Q4` or `Q5_K_M`. Defaults to `Q4`.
    pub min_quant: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort: Option<SortKey>,
}

/// A [`SearchQuery`] with every default filled in.
///
/// This is both what goes on the wire and what the cache key is built from,
/// so two queries that mean the same thing normalize to equal values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedSearch {
    pub query: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub min_quant: String,
    pub limit: u32,
    pub offset: u32,
    pub sort: SortKey,
}

impl SearchQuery {
    pub fn normalize(&self) -> NormalizedSearch {
        let mut tags: Vec<String> = self
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        tags.sort();
        tags.dedup();

        NormalizedSearch {
            query: non_empty(&self.query),
            author: non_empty(&self.author),
            tags,
            min_quant: non_empty(&self.min_quant)
                .map(|q| q.to_uppercase())
                .unwrap_or_else(|| SearchConfig::DEFAULT_MIN_QUANT.to_string()),
            limit: clamp_limit(self.limit),
            offset: self.offset.unwrap_or(0),
            sort: self.sort.unwrap_or_default(),
        }
    }
}

/// Search parameters for the image-generation side of the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffusionQuery {
    pub query: Option<String>,
    /// When set, the registry filter uses this kind's tag and every result is
    /// labelled with it. When unset, filtering uses the checkpoint tag and
    /// each result's kind is inferred from its own tags.
    pub model_type: Option<DestinationKind>,
    pub author: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort: Option<SortKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedDiffusionSearch {
    pub query: Option<String>,
    pub model_type: Option<DestinationKind>,
    pub author: Option<String>,
    pub limit: u32,
    pub offset: u32,
    pub sort: SortKey,
}

impl DiffusionQuery {
    pub fn normalize(&self) -> NormalizedDiffusionSearch {
        NormalizedDiffusionSearch {
            query: non_empty(&self.query),
            model_type: self.model_type,
            author: non_empty(&self.author),
            limit: clamp_limit(self.limit),
            offset: self.offset.unwrap_or(0),
            sort: self.sort.unwrap_or_default(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn clamp_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(SearchConfig::DEFAULT_LIMIT)
        .clamp(1, SearchConfig::MAX_LIMIT)
}

/// One manifest entry of a registry record.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSibling {
    pub rfilename: String,
}

/// Registry record as returned by the listing and details endpoints.
///
/// Untrusted input: every optional field has a default, and a record that
/// still fails to deserialize is skipped by the extractor.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, rename = "lastModified")]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub pipeline_tag: Option<String>,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub siblings: Vec<RawSibling>,
    #[serde(default)]
    pub private: bool,
    /// Either a boolean or a gating mode string such as `"auto"`.
    #[serde(default)]
    pub gated: Option<serde_json::Value>,
}

impl RawRecord {
    /// Gated unless the registry explicitly says `false` (or says nothing).
    pub fn is_gated(&self) -> bool {
        match &self.gated {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Bool(gated)) => *gated,
            Some(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_fills_defaults() {
        let normalized = SearchQuery::default().normalize();
        assert_eq!(normalized.limit, 20);
        assert_eq!(normalized.offset, 0);
        assert_eq!(normalized.sort, SortKey::Downloads);
        assert_eq!(normalized.min_quant, "Q4");
        assert_eq!(normalized.query, None);
    }

    #[test]
    fn test_normalize_sorts_tags_and_clamps_limit() {
        let a = SearchQuery {
            tags: vec!["text-generation".into(), "code".into(), "code".into()],
            limit: Some(500),
            ..Default::default()
        };
        let b = SearchQuery {
            tags: vec!["code".into(), "text-generation".into()],
            limit: Some(100),
            ..Default::default()
        };
        assert_eq!(a.normalize(), b.normalize());
        assert_eq!(a.normalize().limit, 100);
    }

    #[test]
    fn test_blank_text_is_treated_as_absent() {
        let query = SearchQuery {
            query: Some("   ".into()),
            min_quant: Some("q5".into()),
            ..Default::default()
        };
        let normalized = query.normalize();
        assert_eq!(normalized.query, None);
        assert_eq!(normalized.min_quant, "Q5");
    }

    #[test]
    fn test_gated_semantics() {
        let parse = |json: &str| serde_json::from_str::<RawRecord>(json).unwrap().is_gated();
        assert!(!parse(r#"{"id":"a/b"}"#));
        assert!(!parse(r#"{"id":"a/b","gated":null}"#));
        assert!(!parse(r#"{"id":"a/b","gated":false}"#));
        assert!(parse(r#"{"id":"a/b","gated":true}"#));
        assert!(parse(r#"{"id":"a/b","gated":"auto"}"#));
        assert!(parse(r#"{"id":"a/b","gated":""}"#));
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!("likes".parse::<SortKey>(), Ok(SortKey::Likes));
        assert_eq!("lastModified".parse::<SortKey>(), Ok(SortKey::LastModified));
        assert!("stars".parse::<SortKey>().is_err());
    }
}
