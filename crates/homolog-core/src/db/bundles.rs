//! Trained model bundle storage.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{Database, DbResult};
use crate::model::TrainedModel;

/// Stored bundle metadata, without the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BundleSummary {
    pub model_id: String,
    pub format_version: u32,
    pub trained_at: String,
    pub checksum: String,
    pub total_records: usize,
    pub valid_records: usize,
    pub combo_clusters: usize,
}

impl Database {
    /// Persist a trained model. Bundles are append-only.
    pub fn save_model_bundle(&self, model: &TrainedModel) -> DbResult<()> {
        let payload = model.to_bundle_json()?;
        let meta = model.meta();

        self.conn.execute(
            r#"
            INSERT INTO model_bundles (
                model_id, format_version, trained_at, checksum,
                total_records, valid_records, combo_clusters, payload
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                meta.model_id,
                meta.format_version,
                meta.trained_at,
                meta.checksum,
                meta.stats.total_records as i64,
                meta.stats.valid_records as i64,
                meta.stats.combo_clusters as i64,
                payload,
            ],
        )?;

        tracing::info!(model_id = %meta.model_id, bytes = payload.len(), "model bundle saved");
        Ok(())
    }

    /// Load and verify the most recently trained bundle, if any.
    pub fn load_latest_model_bundle(&self) -> DbResult<Option<TrainedModel>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM model_bundles ORDER BY trained_at DESC, rowid DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(json) => Ok(Some(TrainedModel::from_bundle_json(&json)?)),
            None => Ok(None),
        }
    }

    /// Stored bundles, newest first.
    pub fn list_model_bundles(&self) -> DbResult<Vec<BundleSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT model_id, format_version, trained_at, checksum,
                   total_records, valid_records, combo_clusters
            FROM model_bundles
            ORDER BY trained_at DESC, rowid DESC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(BundleSummary {
                model_id: row.get(0)?,
                format_version: row.get(1)?,
                trained_at: row.get(2)?,
                checksum: row.get(3)?,
                total_records: row.get::<_, i64>(4)? as usize,
                valid_records: row.get::<_, i64>(5)? as usize,
                combo_clusters: row.get::<_, i64>(6)? as usize,
            })
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbError;
    use crate::model::{train, ModelError};
    use crate::models::{MedicationRecord, RegistrationStatus};
    use crate::scorer::SimilarityWeights;

    fn model() -> TrainedModel {
        let mut a = MedicationRecord::new("1-1".into(), "Dolex".into(), RegistrationStatus::vigente());
        a.atc = "N02BE01".into();
        a.via_administracion = "Oral".into();
        let mut b = a.clone();
        b.cum = "1-2".into();
        train(vec![a, b], SimilarityWeights::default()).unwrap()
    }

    #[test]
    fn test_empty_store_has_no_bundle() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_latest_model_bundle().unwrap().is_none());
        assert!(db.list_model_bundles().unwrap().is_empty());
    }

    #[test]
    fn test_latest_bundle_wins() {
        let db = Database::open_in_memory().unwrap();
        let first = model();
        let second = model();
        db.save_model_bundle(&first).unwrap();
        db.save_model_bundle(&second).unwrap();

        let latest = db.load_latest_model_bundle().unwrap().unwrap();
        assert_eq!(latest.meta().model_id, second.meta().model_id);

        let summaries = db.list_model_bundles().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].model_id, second.meta().model_id);
        assert_eq!(summaries[0].valid_records, 2);
        assert_eq!(summaries[0].combo_clusters, 1);
    }

    #[test]
    fn test_corrupt_payload_surfaces_model_error() {
        let db = Database::open_in_memory().unwrap();
        let m = model();
        db.save_model_bundle(&m).unwrap();
        db.conn()
            .execute("UPDATE model_bundles SET payload = '{\"meta\": 1}'", [])
            .unwrap();

        let result = db.load_latest_model_bundle();
        assert!(matches!(result, Err(DbError::Model(ModelError::Json(_)))));
    }
}
