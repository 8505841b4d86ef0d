//! Similarity weight configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Weight configuration errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeightsError {
    #[error("Weight {name} must be finite and non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("Base weights must sum to 1.0, got {0}")]
    BadSum(f64),
}

/// Coefficients of the similarity score.
///
/// `atc + route + form + quantity` is the weighted budget (1.0); the
/// ingredient bonus is added on top of it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SimilarityWeights {
    pub atc: f64,
    pub route: f64,
    pub form: f64,
    pub quantity: f64,
    /// Bonus for an exact active-ingredient match
    pub ingredient_bonus: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            atc: 0.40,
            route: 0.30,
            form: 0.20,
            quantity: 0.10,
            ingredient_bonus: 0.15,
        }
    }
}

impl SimilarityWeights {
    pub fn base_sum(&self) -> f64 {
        self.atc + self.route + self.form + self.quantity
    }

    /// Highest score a candidate can reach.
    pub fn max_score(&self) -> f64 {
        self.base_sum() + self.ingredient_bonus
    }

    pub fn validate(&self) -> Result<(), WeightsError> {
        let named = [
            ("atc", self.atc),
            ("route", self.route),
            ("form", self.form),
            ("quantity", self.quantity),
            ("ingredient_bonus", self.ingredient_bonus),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(WeightsError::Negative { name, value });
            }
        }
        let sum = self.base_sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(WeightsError::BadSum(sum));
        }
        Ok(())
    }
}
