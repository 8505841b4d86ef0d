//! Reference medication table operations.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{MedicationRecord, RegistrationStatus};

const UPSERT_MEDICATION: &str = r#"
    INSERT INTO medications (
        cum, producto, atc, atc_descripcion, via_administracion,
        principio_activo, forma_farmaceutica, cantidad, cantidad_cum,
        unidad_medida, estado_registro, estado_cum, muestra_medica, valido, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, datetime('now'))
    ON CONFLICT(cum) DO UPDATE SET
        producto = excluded.producto,
        atc = excluded.atc,
        atc_descripcion = excluded.atc_descripcion,
        via_administracion = excluded.via_administracion,
        principio_activo = excluded.principio_activo,
        forma_farmaceutica = excluded.forma_farmaceutica,
        cantidad = excluded.cantidad,
        cantidad_cum = excluded.cantidad_cum,
        unidad_medida = excluded.unidad_medida,
        estado_registro = excluded.estado_registro,
        estado_cum = excluded.estado_cum,
        muestra_medica = excluded.muestra_medica,
        valido = excluded.valido,
        updated_at = datetime('now')
"#;

const SELECT_MEDICATION: &str = r#"
    SELECT cum, producto, atc, atc_descripcion, via_administracion,
           principio_activo, forma_farmaceutica, cantidad, cantidad_cum,
           unidad_medida, estado_registro, estado_cum, muestra_medica
    FROM medications
"#;

impl Database {
    /// Insert or update a medication by CUM.
    pub fn upsert_medication(&self, record: &MedicationRecord) -> DbResult<()> {
        upsert(&self.conn, record)
    }

    /// Insert or update many medications in a single transaction.
    ///
    /// Returns the number of rows written.
    pub fn upsert_medications(&self, records: &[MedicationRecord]) -> DbResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        for record in records {
            upsert(&tx, record)?;
        }
        tx.commit()?;
        tracing::info!(rows = records.len(), "medications upserted");
        Ok(records.len())
    }

    /// Get a medication by CUM.
    pub fn get_medication(&self, cum: &str) -> DbResult<Option<MedicationRecord>> {
        let sql = format!("{} WHERE cum = ?", SELECT_MEDICATION);
        let row = self.conn.query_row(&sql, [cum], MedicationRow::from_row).optional()?;
        Ok(row.map(Into::into))
    }

    /// All medications, in first-insertion order.
    pub fn list_medications(&self) -> DbResult<Vec<MedicationRecord>> {
        let sql = format!("{} ORDER BY rowid", SELECT_MEDICATION);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], MedicationRow::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into());
        }
        Ok(records)
    }

    pub fn count_medications(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM medications", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn upsert(conn: &Connection, record: &MedicationRecord) -> DbResult<()> {
    conn.execute(
        UPSERT_MEDICATION,
        params![
            record.cum,
            record.producto,
            record.atc,
            record.atc_descripcion,
            record.via_administracion,
            record.principio_activo,
            record.forma_farmaceutica,
            record.cantidad,
            record.cantidad_cum,
            record.unidad_medida,
            record.status.estado_registro,
            record.status.estado_cum,
            record.status.muestra_medica,
            record.is_valid(),
        ],
    )?;
    Ok(())
}

/// Intermediate row struct for database mapping.
struct MedicationRow {
    cum: String,
    producto: String,
    atc: String,
    atc_descripcion: String,
    via_administracion: String,
    principio_activo: String,
    forma_farmaceutica: String,
    cantidad: Option<f64>,
    cantidad_cum: Option<f64>,
    unidad_medida: String,
    estado_registro: String,
    estado_cum: String,
    muestra_medica: String,
}

impl MedicationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            cum: row.get(0)?,
            producto: row.get(1)?,
            atc: row.get(2)?,
            atc_descripcion: row.get(3)?,
            via_administracion: row.get(4)?,
            principio_activo: row.get(5)?,
            forma_farmaceutica: row.get(6)?,
            cantidad: row.get(7)?,
            cantidad_cum: row.get(8)?,
            unidad_medida: row.get(9)?,
            estado_registro: row.get(10)?,
            estado_cum: row.get(11)?,
            muestra_medica: row.get(12)?,
        })
    }
}

// Validity is re-derived from the stored statuses, never read back.
impl From<MedicationRow> for MedicationRecord {
    fn from(row: MedicationRow) -> Self {
        let status = RegistrationStatus {
            estado_registro: row.estado_registro,
            estado_cum: row.estado_cum,
            muestra_medica: row.muestra_medica,
        };
        let mut record = MedicationRecord::new(row.cum, row.producto, status);
        record.atc = row.atc;
        record.atc_descripcion = row.atc_descripcion;
        record.via_administracion = row.via_administracion;
        record.principio_activo = row.principio_activo;
        record.forma_farmaceutica = row.forma_farmaceutica;
        record.cantidad = row.cantidad;
        record.cantidad_cum = row.cantidad_cum;
        record.unidad_medida = row.unidad_medida;
        record
    }
}
