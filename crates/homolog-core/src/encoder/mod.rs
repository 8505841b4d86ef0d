//! Feature encoding for medication records.
//!
//! Field tiers:
//! - Critical (ATC, route, active ingredient): label id, presence among valid
//!   records, frequency/probability within the valid subset
//! - Important (pharmaceutical form, unit): label id, frequency/probability
//!   over every record
//! - Numeric (quantities): log transforms, ratio and a 4-level bin
//!
//! Vocabularies are frozen once [`FeatureEncoder::fit`] returns. Refitting
//! builds a new, independent encoder.

mod numeric;
mod vocabulary;

pub use numeric::*;
pub use vocabulary::*;

use serde::{Deserialize, Serialize};

use crate::models::MedicationRecord;

/// Derived, immutable features of a single record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncodedFeatureSet {
    pub atc: CriticalFeature,
    pub via: CriticalFeature,
    pub principio: CriticalFeature,
    pub forma: ImportantFeature,
    pub unidad: ImportantFeature,
    pub numeric: NumericFeatures,
    /// `atc_label + "_" + via_label`
    pub atc_via_combo: String,
    /// Number of critical fields present among valid records (0-3)
    pub score_validez_critica: u8,
    /// Mean of the three critical probabilities
    pub score_prob_critica: f64,
    /// All three critical fields present among valid records
    pub es_ideal_homologacion: bool,
}

/// Encoded rows, aligned index-for-index with the input records.
pub type EncodedTable = Vec<EncodedFeatureSet>;

/// Fitted encoder holding every frozen vocabulary and frequency table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeatureEncoder {
    pub atc: CriticalEncoding,
    pub via: CriticalEncoding,
    pub principio: CriticalEncoding,
    pub forma: ImportantEncoding,
    pub unidad: ImportantEncoding,
}

impl FeatureEncoder {
    /// Fit every vocabulary over the full table.
    pub fn fit(records: &[MedicationRecord]) -> Self {
        let valid = || records.iter().filter(|r| r.is_valid());

        Self {
            atc: CriticalEncoding::fit(
                records.iter().map(|r| r.atc.as_str()),
                valid().map(|r| r.atc.as_str()),
            ),
            via: CriticalEncoding::fit(
                records.iter().map(|r| r.via_administracion.as_str()),
                valid().map(|r| r.via_administracion.as_str()),
            ),
            principio: CriticalEncoding::fit(
                records.iter().map(|r| r.principio_activo.as_str()),
                valid().map(|r| r.principio_activo.as_str()),
            ),
            forma: ImportantEncoding::fit(records.iter().map(|r| r.forma_farmaceutica.as_str())),
            unidad: ImportantEncoding::fit(records.iter().map(|r| r.unidad_medida.as_str())),
        }
    }

    /// Fit over the full table and encode every row.
    pub fn fit_transform(records: &[MedicationRecord]) -> (Self, EncodedTable) {
        let encoder = Self::fit(records);
        let table = encoder.transform(records);
        (encoder, table)
    }

    pub fn transform(&self, records: &[MedicationRecord]) -> EncodedTable {
        records.iter().map(|r| self.encode(r)).collect()
    }

    /// Encode one record with the frozen vocabularies.
    ///
    /// Values outside the vocabularies get label `-1` and zero frequencies.
    pub fn encode(&self, record: &MedicationRecord) -> EncodedFeatureSet {
        let atc = self.atc.encode(&record.atc);
        let via = self.via.encode(&record.via_administracion);
        let principio = self.principio.encode(&record.principio_activo);

        let criticals = [&atc, &via, &principio];
        let score_validez_critica = criticals.iter().filter(|c| c.es_valido).count() as u8;
        let score_prob_critica = criticals.iter().map(|c| c.prob_validos).sum::<f64>() / 3.0;

        EncodedFeatureSet {
            atc_via_combo: format!("{}_{}", atc.label_or_sentinel(), via.label_or_sentinel()),
            score_validez_critica,
            score_prob_critica,
            es_ideal_homologacion: score_validez_critica == 3,
            forma: self.forma.encode(&record.forma_farmaceutica),
            unidad: self.unidad.encode(&record.unidad_medida),
            numeric: NumericFeatures::compute(record.cantidad, record.cantidad_cum),
            atc,
            via,
            principio,
        }
    }
}
