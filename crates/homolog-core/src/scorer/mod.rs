//! Multi-factor similarity scoring between an origin medication and a candidate.
//!
//! Scoring weights (defaults):
//! - ATC exact match: 40%
//! - Route of administration exact match: 30%
//! - Pharmaceutical form: 20% (a mismatch still earns half)
//! - Quantity similarity: 10%
//! - Active ingredient: +0.15 exact / +0.10 partial, on top of the weighted sum

mod weights;

pub use weights::*;

use crate::models::{FactorScore, IngredientMatch, MedicationRecord, QuantityScore, ScoreBreakdown};

/// Form sub-score when forms differ.
const FORM_MISMATCH_SCORE: f64 = 0.5;

/// Quantity sub-score when either quantity is missing or zero.
const QUANTITY_DEFAULT_SCORE: f64 = 0.3;

/// Ratio below which quantities are considered far apart.
const QUANTITY_FAR_RATIO: f64 = 0.5;
const QUANTITY_FAR_SCORE: f64 = 0.1;

/// Ratio below which quantities are considered moderately close.
const QUANTITY_NEAR_RATIO: f64 = 0.8;
const QUANTITY_NEAR_SCORE: f64 = 0.4;

/// Bonus when an origin ingredient word occurs in the candidate's ingredients.
const PARTIAL_INGREDIENT_BONUS: f64 = 0.10;

/// Ingredient words this short are ignored for partial matching.
const MIN_INGREDIENT_TOKEN_LEN: usize = 3;

/// Deterministic, stateless similarity scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityScorer {
    weights: SimilarityWeights,
}

impl SimilarityScorer {
    pub fn new(weights: SimilarityWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &SimilarityWeights {
        &self.weights
    }

    /// Score `candidate` as a homolog of `origin`.
    pub fn score(&self, origin: &MedicationRecord, candidate: &MedicationRecord) -> (f64, ScoreBreakdown) {
        let (ingredient, ingredient_bonus) = self.score_ingredient(origin, candidate);
        let breakdown = ScoreBreakdown {
            atc: exact_factor(&origin.atc, &candidate.atc, self.weights.atc),
            route: exact_factor(
                &origin.via_administracion,
                &candidate.via_administracion,
                self.weights.route,
            ),
            form: self.score_form(origin, candidate),
            quantity: self.score_quantity(origin, candidate),
            ingredient,
            ingredient_bonus,
        };
        (breakdown.total(), breakdown)
    }

    fn score_form(&self, origin: &MedicationRecord, candidate: &MedicationRecord) -> FactorScore {
        let matched = same_value(&origin.forma_farmaceutica, &candidate.forma_farmaceutica);
        FactorScore {
            matched,
            score: if matched { 1.0 } else { FORM_MISMATCH_SCORE },
            weight: self.weights.form,
        }
    }

    fn score_quantity(&self, origin: &MedicationRecord, candidate: &MedicationRecord) -> QuantityScore {
        let ratio = match (origin.positive_quantity(), candidate.positive_quantity()) {
            (Some(a), Some(b)) => Some(a.min(b) / a.max(b)),
            _ => None,
        };

        let score = match ratio {
            Some(r) if r < QUANTITY_FAR_RATIO => QUANTITY_FAR_SCORE,
            Some(r) if r < QUANTITY_NEAR_RATIO => QUANTITY_NEAR_SCORE,
            Some(r) => r,
            None => QUANTITY_DEFAULT_SCORE,
        };

        QuantityScore {
            origin: origin.cantidad,
            candidate: candidate.cantidad,
            ratio,
            factor: FactorScore {
                matched: ratio == Some(1.0),
                score,
                weight: self.weights.quantity,
            },
        }
    }

    fn score_ingredient(&self, origin: &MedicationRecord, candidate: &MedicationRecord) -> (IngredientMatch, f64) {
        if same_value(&origin.principio_activo, &candidate.principio_activo) {
            return (IngredientMatch::Exact, self.weights.ingredient_bonus);
        }

        let partial = origin
            .principio_activo
            .split_whitespace()
            .filter(|word| word.chars().count() > MIN_INGREDIENT_TOKEN_LEN)
            .any(|word| candidate.principio_activo.contains(word));

        if partial {
            (
                IngredientMatch::Partial,
                PARTIAL_INGREDIENT_BONUS.min(self.weights.ingredient_bonus),
            )
        } else {
            (IngredientMatch::Different, 0.0)
        }
    }
}

/// Equal and present; a missing value matches nothing.
fn same_value(a: &str, b: &str) -> bool {
    !a.is_empty() && a == b
}

fn exact_factor(a: &str, b: &str, weight: f64) -> FactorScore {
    let matched = same_value(a, b);
    FactorScore {
        matched,
        score: if matched { 1.0 } else { 0.0 },
        weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegistrationStatus;

    fn med(principio: &str, forma: &str, cantidad: Option<f64>) -> MedicationRecord {
        let mut r = MedicationRecord::new("1-1".into(), "Producto".into(), RegistrationStatus::vigente());
        r.atc = "N02BE01".into();
        r.via_administracion = "Oral".into();
        r.principio_activo = principio.into();
        r.forma_farmaceutica = forma.into();
        r.cantidad = cantidad;
        r
    }

    fn scorer() -> SimilarityScorer {
        SimilarityScorer::default()
    }

    #[test]
    fn test_identical_records_reach_maximum() {
        let a = med("Acetaminofen", "Tableta", Some(500.0));
        let (score, breakdown) = scorer().score(&a, &a);

        assert!((score - 1.15).abs() < 1e-9);
        assert_eq!(breakdown.ingredient, IngredientMatch::Exact);
        assert!(breakdown.atc.matched && breakdown.route.matched && breakdown.form.matched);
        assert!(breakdown.quantity.factor.matched);
    }

    #[test]
    fn test_form_mismatch_keeps_half() {
        let a = med("Acetaminofen", "Tableta", Some(500.0));
        let b = med("Acetaminofen", "Jarabe", Some(500.0));
        let (_, breakdown) = scorer().score(&a, &b);

        assert!(!breakdown.form.matched);
        assert_eq!(breakdown.form.score, 0.5);
        assert!((breakdown.form.weighted() - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_quantity_bands() {
        let s = scorer();
        let origin = med("x", "Tableta", Some(100.0));

        let (_, far) = s.score(&origin, &med("x", "Tableta", Some(40.0)));
        assert_eq!(far.quantity.factor.score, 0.1);

        let (_, near) = s.score(&origin, &med("x", "Tableta", Some(60.0)));
        assert_eq!(near.quantity.factor.score, 0.4);

        let (_, close) = s.score(&origin, &med("x", "Tableta", Some(90.0)));
        assert!((close.quantity.factor.score - 0.9).abs() < 1e-12);

        // Boundary: ratio exactly 0.5 is not "far"
        let (_, half) = s.score(&origin, &med("x", "Tableta", Some(50.0)));
        assert_eq!(half.quantity.factor.score, 0.4);

        // Boundary: ratio exactly 0.8 uses the ratio itself
        let (_, edge) = s.score(&origin, &med("x", "Tableta", Some(80.0)));
        assert!((edge.quantity.factor.score - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_missing_or_zero_quantity_uses_default() {
        let s = scorer();
        let origin = med("x", "Tableta", Some(100.0));

        let (_, missing) = s.score(&origin, &med("x", "Tableta", None));
        assert_eq!(missing.quantity.factor.score, 0.3);
        assert_eq!(missing.quantity.ratio, None);

        let (_, zero) = s.score(&origin, &med("x", "Tableta", Some(0.0)));
        assert_eq!(zero.quantity.factor.score, 0.3);
    }

    #[test]
    fn test_partial_ingredient_bonus() {
        let s = scorer();
        let origin = med("Losartan potasico", "Tableta", None);
        let candidate = med("Losartan + hidroclorotiazida", "Tableta", None);
        let (_, breakdown) = s.score(&origin, &candidate);

        assert_eq!(breakdown.ingredient, IngredientMatch::Partial);
        assert_eq!(breakdown.ingredient_bonus, 0.10);
    }

    #[test]
    fn test_short_tokens_ignored_for_partial_match() {
        let s = scorer();
        let origin = med("Sal de zinc", "Tableta", None);
        let candidate = med("Sal compuesta", "Tableta", None);
        let (_, breakdown) = s.score(&origin, &candidate);

        assert_eq!(breakdown.ingredient, IngredientMatch::Different);
        assert_eq!(breakdown.ingredient_bonus, 0.0);
    }

    #[test]
    fn test_partial_match_is_case_sensitive() {
        let s = scorer();
        let (_, breakdown) = s.score(&med("LOSARTAN", "Tableta", None), &med("losartan", "Tableta", None));
        assert_eq!(breakdown.ingredient, IngredientMatch::Different);
    }

    #[test]
    fn test_atc_and_route_mismatch() {
        let s = scorer();
        let origin = med("x", "Tableta", None);
        let mut candidate = med("y", "Jarabe", None);
        candidate.atc = "J01CA04".into();
        candidate.via_administracion = "Intravenosa".into();

        let (score, breakdown) = s.score(&origin, &candidate);
        assert!(!breakdown.atc.matched);
        assert!(!breakdown.route.matched);
        // form 0.5 * 0.2 + quantity 0.3 * 0.1
        assert!((score - 0.13).abs() < 1e-9);
    }

    #[test]
    fn test_missing_values_never_match() {
        let mut blank = med("", "", None);
        blank.atc.clear();
        blank.via_administracion.clear();

        let (score, breakdown) = scorer().score(&blank, &blank);
        assert!(!breakdown.atc.matched && !breakdown.route.matched && !breakdown.form.matched);
        assert_eq!(breakdown.ingredient, IngredientMatch::Different);
        // form 0.5 * 0.2 + quantity 0.3 * 0.1
        assert!((score - 0.13).abs() < 1e-9);
    }

    #[test]
    fn test_infinite_quantities_use_default() {
        let a = med("x", "Tableta", Some(f64::INFINITY));
        let (score, breakdown) = scorer().score(&a, &a);
        assert_eq!(breakdown.quantity.factor.score, 0.3);
        assert!(score.is_finite());
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let s = scorer();
        let a = med("Acetaminofen", "Tableta", Some(120.0));
        let b = med("Paracetamol", "Jarabe", Some(500.0));
        let first = s.score(&a, &b);
        let second = s.score(&a, &b);
        assert_eq!(first.0.to_bits(), second.0.to_bits());
        assert_eq!(first.1, second.1);
    }
}
