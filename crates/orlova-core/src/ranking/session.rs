//! Caller-owned holder for the most recent search.

use super::types::{RankOutcome, RankPreferences};
use crate::models::Candidate;
use chrono::{DateTime, Utc};

/// Shown when ranking is requested before any search produced candidates.
pub const EMPTY_SESSION_HINT: &str = "No models to rank. Run a search first.";

/// Single-slot store of the last search's candidates.
///
/// A new search replaces the slot; there is no history.
#[derive(Debug, Clone, Default)]
pub struct SearchSession {
    last_candidates: Vec<Candidate>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored candidates with a new search result.
    pub fn replace(&mut self, candidates: Vec<Candidate>) {
        self.last_candidates = candidates;
    }

    pub fn is_empty(&self) -> bool {
        self.last_candidates.is_empty()
    }

    /// Rank the stored candidates.
    ///
    /// An empty session yields an empty list and a hint, not an error.
    pub fn rank(&self, preferences: &RankPreferences, now: DateTime<Utc>) -> RankOutcome {
        if self.is_empty() {
            return RankOutcome {
                ranked: Vec::new(),
                message: Some(EMPTY_SESSION_HINT.to_string()),
            };
        }

        RankOutcome {
            ranked: super::rank_candidates(&self.last_candidates, preferences, now),
            message: None,
        }
    }
}
