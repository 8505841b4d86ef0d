//! Homolog Core Library
//!
//! Recommends interchangeable ("homolog") medications for a registry entry,
//! restricted to currently valid medications sharing its ATC code and route of
//! administration.
//!
//! # Architecture
//!
//! ```text
//! Raw rows → Ingest → Reference table ──► train ──► TrainedModel (bundle)
//!                                                       │
//!                          FeatureEncoder ◄─────────────┤
//!                          ComboClusterIndex ◄──────────┤
//!                          SimilarityWeights ◄──────────┘
//!
//! recommend(cum) → lookup → combo gate → candidates → score → threshold
//!                                                           → rank → top-n
//! ```
//!
//! Per-query failures (`NOT_FOUND`, `NO_VALID_COMBO`, `NO_CANDIDATES`) are
//! values inside the result. Querying before a model is loaded is an error.
//!
//! # Modules
//!
//! - [`models`]: Medication records, ingestion and recommendation results
//! - [`encoder`]: Label, frequency and numeric feature encoding
//! - [`cluster`]: ATC + route eligibility index
//! - [`scorer`]: Weighted pairwise similarity
//! - [`model`]: Trained model, bundles and the loaded-model registry
//! - [`recommender`]: Query service and batch homologation
//! - [`db`]: SQLite store for the reference table and model bundles

pub mod cluster;
pub mod db;
pub mod encoder;
pub mod model;
pub mod models;
pub mod recommender;
pub mod scorer;

// Re-export commonly used types
pub use cluster::{ComboCluster, ComboClusterIndex};
pub use db::Database;
pub use encoder::{EncodedFeatureSet, FeatureEncoder};
pub use model::{train, ModelRegistry, TrainedModel};
pub use models::{
    MedicationRecord, RawMedication, RecommendationError, RecommendationResult,
    RegistrationStatus, ScoredMatch,
};
pub use recommender::{homologate_batch, BatchOutcome, BatchReport, RecommendationService};
pub use scorer::{SimilarityScorer, SimilarityWeights};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum HomologError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("No trained model has been loaded")]
    ModelNotLoaded,
}

impl From<db::DbError> for HomologError {
    fn from(e: db::DbError) -> Self {
        HomologError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for HomologError {
    fn from(e: serde_json::Error) -> Self {
        HomologError::SerializationError(e.to_string())
    }
}

impl From<model::ModelError> for HomologError {
    fn from(e: model::ModelError) -> Self {
        match e {
            model::ModelError::NotLoaded => HomologError::ModelNotLoaded,
            model::ModelError::Weights(e) => HomologError::InvalidInput(e.to_string()),
            other => HomologError::SerializationError(other.to_string()),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for HomologError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        HomologError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a homologation store at the given path.
#[uniffi::export]
pub fn open_engine(path: String) -> Result<Arc<HomologEngine>, HomologError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(HomologEngine::new(db)))
}

/// Create an in-memory store (for testing).
#[uniffi::export]
pub fn open_engine_in_memory() -> Result<Arc<HomologEngine>, HomologError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(HomologEngine::new(db)))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe store plus the currently loaded model.
#[derive(uniffi::Object)]
pub struct HomologEngine {
    db: Arc<Mutex<Database>>,
    registry: ModelRegistry,
}

impl HomologEngine {
    fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            registry: ModelRegistry::new(),
        }
    }
}

#[uniffi::export]
impl HomologEngine {
    // =========================================================================
    // Reference Table
    // =========================================================================

    /// Import a JSON array of source rows, upserting every row that has a CUM.
    pub fn import_medications(&self, rows_json: String) -> Result<FfiImportReport, HomologError> {
        let rows: Vec<RawMedication> = serde_json::from_str(&rows_json)?;
        let report = models::ingest(rows);

        let db = self.db.lock()?;
        let imported = db.upsert_medications(&report.records)?;
        Ok(FfiImportReport {
            imported: imported as u32,
            rejected: report.rejected.len() as u32,
        })
    }

    pub fn medication_count(&self) -> Result<u64, HomologError> {
        let db = self.db.lock()?;
        Ok(db.count_medications()? as u64)
    }

    // =========================================================================
    // Model Lifecycle
    // =========================================================================

    /// Train on the stored reference table, persist the bundle and load it.
    ///
    /// `weights_json` overrides the default similarity weights.
    pub fn train_model(&self, weights_json: Option<String>) -> Result<FfiModelInfo, HomologError> {
        let weights = match weights_json {
            Some(json) => serde_json::from_str(&json)?,
            None => SimilarityWeights::default(),
        };

        let db = self.db.lock()?;
        let trained = train(db.list_medications()?, weights)?;
        db.save_model_bundle(&trained)?;

        let info = FfiModelInfo::from(&trained);
        self.registry.install(trained);
        Ok(info)
    }

    /// Load the most recently saved bundle.
    pub fn load_latest_model(&self) -> Result<FfiModelInfo, HomologError> {
        let db = self.db.lock()?;
        let trained = db
            .load_latest_model_bundle()?
            .ok_or_else(|| HomologError::NotFound("no saved model bundle".into()))?;

        let info = FfiModelInfo::from(&trained);
        self.registry.install(trained);
        Ok(info)
    }

    /// Metadata of the loaded model.
    pub fn model_info(&self) -> Result<FfiModelInfo, HomologError> {
        let model = self.registry.current()?;
        Ok(FfiModelInfo::from(model.as_ref()))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Find up to `n` homologs of `cum` scoring at least `score_minimum`.
    pub fn recommend(
        &self,
        cum: String,
        n: u32,
        score_minimum: f64,
    ) -> Result<FfiRecommendationResult, HomologError> {
        let model = self.registry.current()?;
        let service = RecommendationService::new(&model);
        Ok(service.recommend(cum.trim(), n as usize, score_minimum).into())
    }

    /// Best homolog for each unique CUM.
    pub fn homologate_batch(
        &self,
        cums: Vec<String>,
        score_minimum: Option<f64>,
    ) -> Result<FfiBatchReport, HomologError> {
        let model = self.registry.current()?;
        let service = RecommendationService::new(&model);
        let report = homologate_batch(
            &service,
            cums.iter().map(String::as_str),
            score_minimum.unwrap_or(recommender::BATCH_SCORE_MINIMUM),
        );
        Ok(report.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe import summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiImportReport {
    pub imported: u32,
    pub rejected: u32,
}

/// FFI-safe model metadata.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiModelInfo {
    pub model_id: String,
    pub format_version: u32,
    pub trained_at: String,
    pub checksum: String,
    pub total_records: u64,
    pub valid_records: u64,
    pub combo_clusters: u64,
    pub duplicate_cums: u64,
}

impl From<&TrainedModel> for FfiModelInfo {
    fn from(model: &TrainedModel) -> Self {
        let meta = model.meta();
        Self {
            model_id: meta.model_id.clone(),
            format_version: meta.format_version,
            trained_at: meta.trained_at.clone(),
            checksum: meta.checksum.clone(),
            total_records: meta.stats.total_records as u64,
            valid_records: meta.stats.valid_records as u64,
            combo_clusters: meta.stats.combo_clusters as u64,
            duplicate_cums: meta.stats.duplicate_cums as u64,
        }
    }
}

/// FFI-safe scored homolog.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiScoredMatch {
    pub cum: String,
    pub producto: String,
    pub atc: String,
    pub via_administracion: String,
    pub principio_activo: String,
    pub forma_farmaceutica: String,
    pub cantidad: Option<f64>,
    pub unidad_medida: String,
    pub score: f64,
}

impl From<ScoredMatch> for FfiScoredMatch {
    fn from(m: ScoredMatch) -> Self {
        let med = m.medication;
        Self {
            cum: med.cum,
            producto: med.producto,
            atc: med.atc,
            via_administracion: med.via_administracion,
            principio_activo: med.principio_activo,
            forma_farmaceutica: med.forma_farmaceutica,
            cantidad: med.cantidad,
            unidad_medida: med.unidad_medida,
            score: m.score,
        }
    }
}

/// FFI-safe query result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecommendationResult {
    pub cum_origen: String,
    pub origin_producto: Option<String>,
    pub origin_valido: Option<bool>,
    pub candidates_evaluated: u32,
    pub recomendaciones: Vec<FfiScoredMatch>,
    /// `NOT_FOUND`, `NO_VALID_COMBO` or `NO_CANDIDATES`
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl From<RecommendationResult> for FfiRecommendationResult {
    fn from(result: RecommendationResult) -> Self {
        Self {
            cum_origen: result.cum_origen,
            origin_producto: result.origin.as_ref().map(|o| o.producto.clone()),
            origin_valido: result.origin.as_ref().map(|o| o.es_valido),
            candidates_evaluated: result.candidates_evaluated as u32,
            recomendaciones: result.recomendaciones.into_iter().map(|m| m.into()).collect(),
            error_code: result.error.as_ref().map(|e| e.code().to_string()),
            error_message: result.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// FFI-safe batch row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBatchEntry {
    pub cum: String,
    /// Homolog CUM, or the "SIN HOMÓLOGO" label
    pub homolog_cum: String,
    /// Homolog name, or the "NO ENCONTRADO" label
    pub homolog_producto: String,
    pub score: f64,
    pub error_code: Option<String>,
}

/// FFI-safe batch summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBatchReport {
    pub entries: Vec<FfiBatchEntry>,
    pub unique_ids: u32,
    pub homologs_found: u32,
}

impl From<BatchReport> for FfiBatchReport {
    fn from(report: BatchReport) -> Self {
        let unique_ids = report.unique_ids() as u32;
        let entries = report
            .entries
            .into_iter()
            .map(|entry| {
                let error_code = match &entry.outcome {
                    BatchOutcome::NoHomolog { reason: Some(e) } => Some(e.code().to_string()),
                    _ => None,
                };
                FfiBatchEntry {
                    homolog_cum: entry.outcome.cum_label().to_string(),
                    homolog_producto: entry.outcome.producto_label().to_string(),
                    score: entry.outcome.score(),
                    error_code,
                    cum: entry.cum,
                }
            })
            .collect();

        Self {
            entries,
            unique_ids,
            homologs_found: report.homologs_found as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROWS: &str = r#"[
        {"CUM": "A-1", "PRODUCTO": "Dolex", "ATC": "N02BE01", "VÍA ADMINISTRACIÓN": "Oral",
         "PRINCIPIO ACTIVO": "Acetaminofen", "FORMA FARMACÉUTICA": "Tableta", "CANTIDAD": 500.0,
         "ESTADO REGISTRO": "Vigente", "ESTADO CUM": "Activo", "MUESTRA MÉDICA": "No"},
        {"CUM": "B-1", "PRODUCTO": "Tylenol", "ATC": "N02BE01", "VÍA ADMINISTRACIÓN": "Oral",
         "PRINCIPIO ACTIVO": "Acetaminofen", "FORMA FARMACÉUTICA": "Tableta", "CANTIDAD": 500.0,
         "ESTADO REGISTRO": "Vencido", "ESTADO CUM": "Inactivo", "MUESTRA MÉDICA": "No"},
        {"PRODUCTO": "Sin CUM"}
    ]"#;

    #[test]
    fn test_query_before_training_fails() {
        let engine = open_engine_in_memory().unwrap();
        assert!(matches!(
            engine.recommend("A-1".into(), 5, 0.85),
            Err(HomologError::ModelNotLoaded)
        ));
        assert!(matches!(engine.model_info(), Err(HomologError::ModelNotLoaded)));
    }

    #[test]
    fn test_import_train_recommend() {
        let engine = open_engine_in_memory().unwrap();
        let report = engine.import_medications(ROWS.into()).unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(engine.medication_count().unwrap(), 2);

        let info = engine.train_model(None).unwrap();
        assert_eq!(info.valid_records, 1);

        let result = engine.recommend("B-1".into(), 5, 0.85).unwrap();
        assert_eq!(result.error_code, None);
        assert_eq!(result.recomendaciones.len(), 1);
        assert_eq!(result.recomendaciones[0].cum, "A-1");

        let missing = engine.recommend("Z-9".into(), 5, 0.85).unwrap();
        assert_eq!(missing.error_code.as_deref(), Some("NOT_FOUND"));
    }

    #[test]
    fn test_batch_labels() {
        let engine = open_engine_in_memory().unwrap();
        engine.import_medications(ROWS.into()).unwrap();
        engine.train_model(None).unwrap();

        let report = engine
            .homologate_batch(vec!["B-1".into(), "B-1".into(), "Z-9".into()], None)
            .unwrap();
        assert_eq!(report.unique_ids, 2);
        assert_eq!(report.homologs_found, 1);
        assert_eq!(report.entries[0].homolog_cum, "A-1");
        assert_eq!(report.entries[1].homolog_cum, recommender::SIN_HOMOLOGO);
        assert_eq!(report.entries[1].error_code.as_deref(), Some("NOT_FOUND"));
    }

    #[test]
    fn test_load_latest_model() {
        let engine = open_engine_in_memory().unwrap();
        assert!(matches!(engine.load_latest_model(), Err(HomologError::NotFound(_))));

        engine.import_medications(ROWS.into()).unwrap();
        let trained = engine.train_model(None).unwrap();
        let loaded = engine.load_latest_model().unwrap();
        assert_eq!(loaded.model_id, trained.model_id);
        assert_eq!(loaded.checksum, trained.checksum);
    }

    #[test]
    fn test_bad_weights_rejected() {
        let engine = open_engine_in_memory().unwrap();
        let weights = r#"{"atc": 0.9, "route": 0.3, "form": 0.2, "quantity": 0.1, "ingredient_bonus": 0.15}"#;
        assert!(matches!(
            engine.train_model(Some(weights.into())),
            Err(HomologError::InvalidInput(_))
        ));
    }
}
