//! Homolog recommendation.
//!
//! Pipeline: lookup → combo gate → candidate filter → scoring → threshold →
//! ranking → truncation

mod batch;

pub use batch::*;

use crate::model::TrainedModel;
use crate::models::{
    OriginSummary, QueryParameters, RecommendationError, RecommendationResult, ScoredMatch,
};
use crate::scorer::SimilarityScorer;

/// Number of recommendations returned when the caller does not say.
pub const DEFAULT_RECOMMENDATIONS: usize = 5;

/// Minimum score for a candidate to count as a homolog.
pub const DEFAULT_SCORE_MINIMUM: f64 = 0.85;

/// Read-only query service over a trained model.
///
/// Holds no mutable state, so any number of queries can run concurrently.
pub struct RecommendationService<'a> {
    model: &'a TrainedModel,
    scorer: SimilarityScorer,
}

impl<'a> RecommendationService<'a> {
    pub fn new(model: &'a TrainedModel) -> Self {
        Self {
            model,
            scorer: SimilarityScorer::new(*model.weights()),
        }
    }

    pub fn model(&self) -> &'a TrainedModel {
        self.model
    }

    /// Find up to `n` valid homologs of `cum` scoring at least `score_minimum`.
    pub fn recommend(&self, cum: &str, n: usize, score_minimum: f64) -> RecommendationResult {
        let parameters = QueryParameters { n, score_minimum };

        // 1. Origin lookup
        let Some(origin) = self.model.get(cum) else {
            tracing::debug!(cum, "origin not found");
            return RecommendationResult::failure(
                cum,
                None,
                RecommendationError::NotFound { cum: cum.to_string() },
                parameters,
            );
        };
        let summary = OriginSummary::from(origin);

        // 2. Eligibility gate; a missing ATC or route is never indexed
        let (atc, via) = origin.combo();
        if !self.model.combo_index().contains(atc, via) {
            tracing::debug!(cum, atc, via, "no valid combo");
            return RecommendationResult::failure(
                cum,
                Some(summary),
                RecommendationError::NoValidCombo {
                    atc: atc.to_string(),
                    via: via.to_string(),
                },
                parameters,
            );
        }

        // 3. Candidates: valid, same ATC and route, not the origin itself
        let candidates: Vec<_> = self
            .model
            .valid_records()
            .filter(|c| c.combo() == (atc, via) && c.cum != cum)
            .collect();

        if candidates.is_empty() {
            tracing::debug!(cum, atc, via, "combo has no other candidates");
            return RecommendationResult::failure(
                cum,
                Some(summary),
                RecommendationError::NoCandidates {
                    atc: atc.to_string(),
                    via: via.to_string(),
                },
                parameters,
            );
        }

        // 4-5. Score and threshold
        let mut matches: Vec<ScoredMatch> = candidates
            .iter()
            .filter_map(|candidate| {
                let (score, breakdown) = self.scorer.score(origin, candidate);
                (score >= score_minimum).then(|| ScoredMatch {
                    medication: (*candidate).clone(),
                    score,
                    breakdown,
                })
            })
            .collect();

        // 6-7. Rank (stable) and truncate
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(n);

        tracing::debug!(
            cum,
            candidates = candidates.len(),
            returned = matches.len(),
            "recommendation complete"
        );

        RecommendationResult {
            cum_origen: cum.to_string(),
            origin: Some(summary),
            candidates_evaluated: candidates.len(),
            recomendaciones: matches,
            error: None,
            parameters,
        }
    }

    /// [`recommend`](Self::recommend) with the default count and threshold.
    pub fn recommend_default(&self, cum: &str) -> RecommendationResult {
        self.recommend(cum, DEFAULT_RECOMMENDATIONS, DEFAULT_SCORE_MINIMUM)
    }
}
