//! Trained homologation model: encoder artifacts, combo index, weights and the
//! reference table, frozen after [`train`].

mod bundle;
mod registry;

pub use bundle::*;
pub use registry::*;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cluster::ComboClusterIndex;
use crate::encoder::{EncodedFeatureSet, FeatureEncoder};
use crate::models::MedicationRecord;
use crate::scorer::{SimilarityWeights, WeightsError};

/// Model errors.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("No trained model has been loaded")]
    NotLoaded,

    #[error("Unsupported model format version: {0}")]
    UnsupportedVersion(u32),

    #[error("Checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Corrupt model bundle: {0}")]
    Corrupt(String),

    #[error("Invalid weights: {0}")]
    Weights(#[from] WeightsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Summary counts recorded at training time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainingStats {
    pub total_records: usize,
    pub valid_records: usize,
    pub combo_clusters: usize,
    pub duplicate_cums: usize,
}

/// An immutable, shareable trained model.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    meta: BundleMeta,
    encoder: FeatureEncoder,
    combo_index: ComboClusterIndex,
    weights: SimilarityWeights,
    records: Vec<MedicationRecord>,
    features: Vec<EncodedFeatureSet>,
    // cum -> row of first occurrence
    by_cum: HashMap<String, usize>,
}

/// Train a model over the full medication table.
pub fn train(records: Vec<MedicationRecord>, weights: SimilarityWeights) -> ModelResult<TrainedModel> {
    weights.validate()?;
    tracing::info!(records = records.len(), "training homologation model");

    let (encoder, features) = FeatureEncoder::fit_transform(&records);
    let combo_index = ComboClusterIndex::build(&records);
    let (by_cum, duplicate_cums) = index_by_cum(&records);

    if duplicate_cums > 0 {
        tracing::warn!(duplicate_cums, "reference table has duplicate CUMs; first occurrence wins");
    }

    let stats = TrainingStats {
        total_records: records.len(),
        valid_records: records.iter().filter(|r| r.is_valid()).count(),
        combo_clusters: combo_index.len(),
        duplicate_cums,
    };
    let meta = BundleMeta::new(stats, reference_checksum(&records)?);

    tracing::info!(
        model_id = %meta.model_id,
        valid_records = stats.valid_records,
        combo_clusters = stats.combo_clusters,
        "model trained"
    );

    Ok(TrainedModel {
        meta,
        encoder,
        combo_index,
        weights,
        records,
        features,
        by_cum,
    })
}

impl TrainedModel {
    pub fn meta(&self) -> &BundleMeta {
        &self.meta
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.meta.stats
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn combo_index(&self) -> &ComboClusterIndex {
        &self.combo_index
    }

    pub fn weights(&self) -> &SimilarityWeights {
        &self.weights
    }

    /// The full reference table, in training order.
    pub fn records(&self) -> &[MedicationRecord] {
        &self.records
    }

    /// Valid records, in training order.
    pub fn valid_records(&self) -> impl Iterator<Item = &MedicationRecord> {
        self.records.iter().filter(|r| r.is_valid())
    }

    pub fn get(&self, cum: &str) -> Option<&MedicationRecord> {
        self.by_cum.get(cum).map(|&idx| &self.records[idx])
    }

    /// Encoded features of the record with this CUM.
    pub fn features(&self, cum: &str) -> Option<&EncodedFeatureSet> {
        self.by_cum.get(cum).map(|&idx| &self.features[idx])
    }
}

fn index_by_cum(records: &[MedicationRecord]) -> (HashMap<String, usize>, usize) {
    let mut by_cum = HashMap::with_capacity(records.len());
    let mut duplicates = 0;
    for (idx, record) in records.iter().enumerate() {
        if by_cum.contains_key(&record.cum) {
            duplicates += 1;
        } else {
            by_cum.insert(record.cum.clone(), idx);
        }
    }
    (by_cum, duplicates)
}
