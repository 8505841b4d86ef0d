//! Mass homologation over a list of identifiers.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::RecommendationError;

use super::RecommendationService;

/// Score threshold used for mass homologation.
pub const BATCH_SCORE_MINIMUM: f64 = 0.85;

/// Label written in place of a homolog CUM when none was found.
pub const SIN_HOMOLOGO: &str = "SIN HOMÓLOGO";

/// Label written in place of a homolog name when none was found.
pub const NO_ENCONTRADO: &str = "NO ENCONTRADO";

/// Result for a single identifier of a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum BatchOutcome {
    Homolog {
        cum: String,
        producto: String,
        score: f64,
    },
    NoHomolog {
        /// Business error, or `None` if candidates existed but none cleared the bar
        reason: Option<RecommendationError>,
    },
}

impl BatchOutcome {
    /// CUM to write for this outcome.
    pub fn cum_label(&self) -> &str {
        match self {
            BatchOutcome::Homolog { cum, .. } => cum,
            BatchOutcome::NoHomolog { .. } => SIN_HOMOLOGO,
        }
    }

    /// Product name to write for this outcome.
    pub fn producto_label(&self) -> &str {
        match self {
            BatchOutcome::Homolog { producto, .. } => producto,
            BatchOutcome::NoHomolog { .. } => NO_ENCONTRADO,
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            BatchOutcome::Homolog { score, .. } => *score,
            BatchOutcome::NoHomolog { .. } => 0.0,
        }
    }
}

/// One de-duplicated identifier and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchEntry {
    pub cum: String,
    pub outcome: BatchOutcome,
}

/// Outcome of a mass homologation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    /// One entry per unique identifier, in first-seen order
    pub entries: Vec<BatchEntry>,
    pub homologs_found: usize,
}

impl BatchReport {
    pub fn unique_ids(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, cum: &str) -> Option<&BatchOutcome> {
        self.entries.iter().find(|e| e.cum == cum.trim()).map(|e| &e.outcome)
    }
}

/// Homologate every unique identifier with a single best-match query each.
///
/// Blank identifiers are skipped. Failures are recorded per identifier and
/// never stop the run.
pub fn homologate_batch<'i, I>(service: &RecommendationService<'_>, ids: I, score_minimum: f64) -> BatchReport
where
    I: IntoIterator<Item = &'i str>,
{
    let mut seen = HashSet::new();
    let mut report = BatchReport::default();

    for id in ids.into_iter().map(str::trim).filter(|id| !id.is_empty()) {
        if !seen.insert(id) {
            continue;
        }

        let result = service.recommend(id, 1, score_minimum);
        let outcome = match result.best() {
            Some(best) => BatchOutcome::Homolog {
                cum: best.medication.cum.clone(),
                producto: best.medication.producto.clone(),
                score: best.score,
            },
            None => BatchOutcome::NoHomolog {
                reason: result.error.clone(),
            },
        };

        if matches!(outcome, BatchOutcome::Homolog { .. }) {
            report.homologs_found += 1;
        }
        report.entries.push(BatchEntry {
            cum: id.to_string(),
            outcome,
        });
    }

    tracing::info!(
        unique_ids = report.unique_ids(),
        homologs_found = report.homologs_found,
        "batch homologation complete"
    );
    report
}
