//! Homolog recommendation models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::MedicationRecord;

/// Per-query business errors.
///
/// These are returned inside a [`RecommendationResult`], never raised, so that
/// batch callers can keep iterating.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecommendationError {
    #[error("CUM not found in the reference table: {cum}")]
    NotFound { cum: String },

    #[error("No valid medication shares the ATC+route combination: {atc} + {via}")]
    NoValidCombo { atc: String, via: String },

    #[error("No other valid medication with ATC: {atc}, route: {via}")]
    NoCandidates { atc: String, via: String },
}

impl RecommendationError {
    /// Stable classification code.
    pub fn code(&self) -> &'static str {
        match self {
            RecommendationError::NotFound { .. } => "NOT_FOUND",
            RecommendationError::NoValidCombo { .. } => "NO_VALID_COMBO",
            RecommendationError::NoCandidates { .. } => "NO_CANDIDATES",
        }
    }
}

/// Summary of the medication a query started from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OriginSummary {
    pub cum: String,
    pub producto: String,
    pub atc: String,
    pub via_administracion: String,
    pub principio_activo: String,
    pub es_valido: bool,
}

impl From<&MedicationRecord> for OriginSummary {
    fn from(record: &MedicationRecord) -> Self {
        Self {
            cum: record.cum.clone(),
            producto: record.producto.clone(),
            atc: record.atc.clone(),
            via_administracion: record.via_administracion.clone(),
            principio_activo: record.principio_activo.clone(),
            es_valido: record.is_valid(),
        }
    }
}

/// One scored factor of the similarity breakdown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FactorScore {
    /// Whether the attribute matched exactly
    pub matched: bool,
    /// Raw sub-score before weighting (0.0 - 1.0)
    pub score: f64,
    /// Weight applied to the sub-score
    pub weight: f64,
}

impl FactorScore {
    pub fn weighted(&self) -> f64 {
        self.score * self.weight
    }
}

/// How the active ingredients of origin and candidate relate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IngredientMatch {
    Exact,
    Partial,
    Different,
}

/// Quantity factor, carrying the compared quantities for explainability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct QuantityScore {
    pub origin: Option<f64>,
    pub candidate: Option<f64>,
    /// `min/max` ratio when both quantities are strictly positive
    pub ratio: Option<f64>,
    pub factor: FactorScore,
}

/// Breakdown of how a candidate was scored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub atc: FactorScore,
    pub route: FactorScore,
    pub form: FactorScore,
    pub quantity: QuantityScore,
    pub ingredient: IngredientMatch,
    /// Bonus added on top of the weighted sum
    pub ingredient_bonus: f64,
}

impl ScoreBreakdown {
    /// Weighted sum of the four base factors.
    pub fn weighted_score(&self) -> f64 {
        self.atc.weighted() + self.route.weighted() + self.form.weighted() + self.quantity.factor.weighted()
    }

    /// Weighted sum plus the uncapped ingredient bonus.
    pub fn total(&self) -> f64 {
        self.weighted_score() + self.ingredient_bonus
    }
}

/// A valid medication proposed as a homolog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredMatch {
    /// Full candidate attributes
    pub medication: MedicationRecord,
    /// Similarity score (0.0 - 1.15)
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Parameters a query was answered with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct QueryParameters {
    pub n: usize,
    pub score_minimum: f64,
}

/// Output of a single homolog query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResult {
    /// The identifier that was queried
    pub cum_origen: String,
    /// Origin medication, absent when the CUM is unknown
    pub origin: Option<OriginSummary>,
    /// Valid candidates sharing the origin's ATC+route, before thresholding
    pub candidates_evaluated: usize,
    /// Ranked matches, best first, at most `parameters.n`
    pub recomendaciones: Vec<ScoredMatch>,
    /// Business error, if no result could be produced
    pub error: Option<RecommendationError>,
    pub parameters: QueryParameters,
}

impl RecommendationResult {
    /// A failed query with an empty candidate list.
    pub fn failure(cum: &str, origin: Option<OriginSummary>, error: RecommendationError, parameters: QueryParameters) -> Self {
        Self {
            cum_origen: cum.to_string(),
            origin,
            candidates_evaluated: 0,
            recomendaciones: Vec::new(),
            error: Some(error),
            parameters,
        }
    }

    /// The query ran to completion (possibly with zero matches over threshold).
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// At least one homolog cleared the threshold.
    pub fn is_found(&self) -> bool {
        self.is_success() && !self.recomendaciones.is_empty()
    }

    /// Best match, if any.
    pub fn best(&self) -> Option<&ScoredMatch> {
        self.recomendaciones.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factor(matched: bool, score: f64, weight: f64) -> FactorScore {
        FactorScore { matched, score, weight }
    }

    fn breakdown(bonus: f64) -> ScoreBreakdown {
        ScoreBreakdown {
            atc: factor(true, 1.0, 0.40),
            route: factor(true, 1.0, 0.30),
            form: factor(false, 0.5, 0.20),
            quantity: QuantityScore {
                origin: Some(120.0),
                candidate: Some(500.0),
                ratio: Some(0.24),
                factor: factor(false, 0.1, 0.10),
            },
            ingredient: IngredientMatch::Different,
            ingredient_bonus: bonus,
        }
    }

    #[test]
    fn test_breakdown_total() {
        let b = breakdown(0.0);
        assert!((b.weighted_score() - 0.81).abs() < 1e-9);
        assert!((b.total() - 0.81).abs() < 1e-9);

        let b = breakdown(0.15);
        assert!((b.total() - 0.96).abs() < 1e-9);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(RecommendationError::NotFound { cum: "x".into() }.code(), "NOT_FOUND");
        assert_eq!(
            RecommendationError::NoValidCombo { atc: "a".into(), via: "v".into() }.code(),
            "NO_VALID_COMBO"
        );
        assert_eq!(
            RecommendationError::NoCandidates { atc: "a".into(), via: "v".into() }.code(),
            "NO_CANDIDATES"
        );
    }

    #[test]
    fn test_failure_result_is_empty() {
        let params = QueryParameters { n: 5, score_minimum: 0.85 };
        let result = RecommendationResult::failure("404-1", None, RecommendationError::NotFound { cum: "404-1".into() }, params);

        assert!(!result.is_success());
        assert!(!result.is_found());
        assert!(result.recomendaciones.is_empty());
        assert!(result.best().is_none());
    }
}
