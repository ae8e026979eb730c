//! Candidate ranking.
//!
//! [`rank_candidates`] scores a batch against caller preferences; the result
//! depends only on the candidates, the preferences and the reference time.
//! [`SearchSession`] holds the most recent search so a later ranking call
//! does not need the candidates passed back in.

mod scorer;
mod session;
mod types;

pub use session::{SearchSession, EMPTY_SESSION_HINT};
pub use types::{RankOutcome, RankPreferences, ScoreBreakdown, ScoredCandidate, TaskPreference};

use crate::models::Candidate;
use chrono::{DateTime, Utc};
use scorer::{round_to, Weights};

const SCORE_DECIMALS: i32 = 3;
const BREAKDOWN_DECIMALS: i32 = 2;

/// Score `candidates` and return the best `preferences.top_k`, highest first.
///
/// Equal scores keep their input order.
pub fn rank_candidates(
    candidates: &[Candidate],
    preferences: &RankPreferences,
    now: DateTime<Utc>,
) -> Vec<ScoredCandidate> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let max_downloads = candidates.iter().map(|c| c.downloads).max().unwrap_or(0);
    let max_likes = candidates.iter().map(|c| c.likes).max().unwrap_or(0);

    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .map(|candidate| {
            let size = scorer::size_fit(
                candidate.parameter_size.as_deref(),
                preferences.available_ram_gb,
            );
            let (quant, best_quant) = scorer::best_quant(&candidate.quantizations);
            let freshness = scorer::freshness(candidate.last_modified, now);
            let popularity = scorer::popularity(
                candidate.downloads,
                candidate.likes,
                max_downloads,
                max_likes,
            );
            let task = scorer::task_fit(candidate, preferences.task);
            let chat = scorer::chat_support(candidate);

            let composite = size * Weights::SIZE
                + quant * Weights::QUANT
                + freshness * Weights::FRESHNESS
                + popularity * Weights::POPULARITY
                + task * Weights::TASK
                + chat * Weights::CHAT;

            ScoredCandidate {
                model_id: candidate.id.clone(),
                author: candidate.author.clone(),
                score: round_to(composite, SCORE_DECIMALS),
                breakdown: ScoreBreakdown {
                    size_score: round_to(size, BREAKDOWN_DECIMALS),
                    quant_score: round_to(quant, BREAKDOWN_DECIMALS),
                    freshness_score: round_to(freshness, BREAKDOWN_DECIMALS),
                    popularity_score: round_to(popularity, BREAKDOWN_DECIMALS),
                    task_score: round_to(task, BREAKDOWN_DECIMALS),
                    chat_template_score: round_to(chat, BREAKDOWN_DECIMALS),
                },
                best_quant,
                parameter_size: candidate.parameter_size.clone(),
                downloads: candidate.downloads,
                likes: candidate.likes,
                last_modified: candidate.last_modified,
            }
        })
        .collect();

    // sort_by is stable.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(preferences.top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quantization;
    use chrono::Duration;

    fn candidate(id: &str, downloads: u64, likes: u64) -> Candidate {
        Candidate {
            id: id.into(),
            author: "org".into(),
            last_modified: Utc::now() - Duration::days(3),
            tags: vec!["text-generation".into()],
            pipeline_tag: None,
            downloads,
            likes,
            quantizations: vec![Quantization {
                label: "Q4_K_M".into(),
                filename: "m-Q4_K_M.gguf".into(),
                size_bytes: None,
            }],
            is_private: false,
            is_gated: false,
            supports_chat: false,
            parameter_size: Some("7B".into()),
        }
    }

    #[test]
    fn test_empty_batch() {
        assert!(rank_candidates(&[], &RankPreferences::default(), Utc::now()).is_empty());
    }

    #[test]
    fn test_popularity_extremes() {
        let batch = vec![candidate("a/hot", 1000, 10), candidate("b/cold", 0, 0)];
        let ranked = rank_candidates(&batch, &RankPreferences::default(), Utc::now());

        assert_eq!(ranked[0].model_id, "a/hot");
        assert_eq!(ranked[0].breakdown.popularity_score, 1.0);
        assert_eq!(ranked[1].breakdown.popularity_score, 0.0);
    }

    #[test]
    fn test_sorted_bounded_and_in_range() {
        let batch: Vec<_> = (0..25)
            .map(|i| candidate(&format!("org/m{i}"), (i * 37 % 11) as u64, (i % 4) as u64))
            .collect();
        let prefs = RankPreferences {
            available_ram_gb: Some(8.0),
            task: TaskPreference::General,
            top_k: 7,
        };

        let ranked = rank_candidates(&batch, &prefs, Utc::now());

        assert_eq!(ranked.len(), 7);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(ranked.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let batch = vec![
            candidate("first/x", 5, 5),
            candidate("second/x", 5, 5),
            candidate("third/x", 5, 5),
        ];
        let ranked = rank_candidates(&batch, &RankPreferences::default(), Utc::now());
        let ids: Vec<_> = ranked.iter().map(|r| r.model_id.as_str()).collect();
        assert_eq!(ids, vec!["first/x", "second/x", "third/x"]);
    }

    #[test]
    fn test_deterministic_for_fixed_time() {
        let batch = vec![candidate("a/a", 10, 1), candidate("b/b", 3, 9)];
        let now = Utc::now();
        let prefs = RankPreferences::default();
        assert_eq!(
            rank_candidates(&batch, &prefs, now),
            rank_candidates(&batch, &prefs, now)
        );
    }

    #[test]
    fn test_composite_value() {
        // size 0.5 (no budget), quant 0.7, freshness 1.0, popularity 1.0,
        // task 0.6 (code pref, text-generation), chat 0.0.
        let ranked = rank_candidates(
            &[candidate("a/a", 10, 10)],
            &RankPreferences::default(),
            Utc::now(),
        );
        assert_eq!(ranked[0].score, 0.675);
        assert_eq!(ranked[0].best_quant, "Q4_K_M");
        assert_eq!(ranked[0].pull_reference().as_deref(), Some("hf.co/a/a:q4_k_m"));
    }
}
