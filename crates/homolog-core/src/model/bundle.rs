//! Serialized model bundle.
//!
//! A bundle is loaded wholesale before any query can be served. It carries a
//! format version, a training timestamp and a SHA-256 checksum of the
//! reference table.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cluster::ComboClusterIndex;
use crate::encoder::{EncodedFeatureSet, FeatureEncoder};
use crate::models::MedicationRecord;
use crate::scorer::SimilarityWeights;

use super::{index_by_cum, ModelError, ModelResult, TrainedModel, TrainingStats};

/// Bundle format written by this build.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Identity and provenance of a trained model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleMeta {
    pub format_version: u32,
    pub model_id: String,
    /// RFC 3339 UTC training timestamp
    pub trained_at: String,
    /// SHA-256 (hex) of the canonical JSON of the reference table
    pub checksum: String,
    pub stats: TrainingStats,
}

impl BundleMeta {
    pub(super) fn new(stats: TrainingStats, checksum: String) -> Self {
        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            model_id: uuid::Uuid::new_v4().to_string(),
            trained_at: chrono::Utc::now().to_rfc3339(),
            checksum,
            stats,
        }
    }
}

#[derive(Serialize)]
struct BundleRef<'a> {
    meta: &'a BundleMeta,
    encoder: &'a FeatureEncoder,
    combo_index: &'a ComboClusterIndex,
    weights: &'a SimilarityWeights,
    records: &'a [MedicationRecord],
    features: &'a [EncodedFeatureSet],
}

/// Owned bundle as read back from storage.
#[derive(Debug, Deserialize)]
pub struct ModelBundle {
    pub meta: BundleMeta,
    pub encoder: FeatureEncoder,
    pub combo_index: ComboClusterIndex,
    pub weights: SimilarityWeights,
    pub records: Vec<MedicationRecord>,
    pub features: Vec<EncodedFeatureSet>,
}

/// Hash arbitrary data to a hex string.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Checksum of the reference table.
pub fn reference_checksum(records: &[MedicationRecord]) -> ModelResult<String> {
    let payload = serde_json::to_vec(records)?;
    Ok(hash_data(&payload))
}

impl TrainedModel {
    /// Serialize the whole model as a single JSON bundle.
    pub fn to_bundle_json(&self) -> ModelResult<String> {
        let bundle = BundleRef {
            meta: &self.meta,
            encoder: &self.encoder,
            combo_index: &self.combo_index,
            weights: &self.weights,
            records: &self.records,
            features: &self.features,
        };
        Ok(serde_json::to_string(&bundle)?)
    }

    /// Restore a model from a JSON bundle, verifying it first.
    pub fn from_bundle_json(json: &str) -> ModelResult<Self> {
        let bundle: ModelBundle = serde_json::from_str(json)?;
        Self::from_bundle(bundle)
    }

    pub fn from_bundle(bundle: ModelBundle) -> ModelResult<Self> {
        let ModelBundle {
            meta,
            encoder,
            combo_index,
            weights,
            records,
            features,
        } = bundle;

        if meta.format_version != BUNDLE_FORMAT_VERSION {
            return Err(ModelError::UnsupportedVersion(meta.format_version));
        }

        let actual = reference_checksum(&records)?;
        if actual != meta.checksum {
            return Err(ModelError::ChecksumMismatch {
                expected: meta.checksum,
                actual,
            });
        }

        if features.len() != records.len() {
            return Err(ModelError::Corrupt(format!(
                "{} feature rows for {} records",
                features.len(),
                records.len()
            )));
        }
        if !combo_index.is_consistent() {
            return Err(ModelError::Corrupt("combo index lookup disagrees with clusters".into()));
        }
        weights.validate()?;

        let (by_cum, _) = index_by_cum(&records);
        tracing::info!(
            model_id = %meta.model_id,
            trained_at = %meta.trained_at,
            records = records.len(),
            "model bundle loaded"
        );

        Ok(Self {
            meta,
            encoder,
            combo_index,
            weights,
            records,
            features,
            by_cum,
        })
    }
}
