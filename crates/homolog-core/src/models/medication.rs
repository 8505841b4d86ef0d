//! Medication registry models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Registration status that marks a record as current.
pub const ESTADO_REGISTRO_VIGENTE: &str = "Vigente";
/// CUM status that marks a record as active.
pub const ESTADO_CUM_ACTIVO: &str = "Activo";
/// Medical-sample flag value for commercial (non-sample) records.
pub const MUESTRA_MEDICA_NO: &str = "No";

/// Ingestion errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    #[error("Row {row} has no CUM and no EXPEDIENTE CUM/CONSECUTIVO pair")]
    MissingCum { row: usize },
}

pub type IngestResult<T> = Result<T, IngestError>;

/// The three status fields a record's validity is derived from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationStatus {
    pub estado_registro: String,
    pub estado_cum: String,
    pub muestra_medica: String,
}

impl RegistrationStatus {
    /// Status of an active, current, non-sample registration.
    pub fn vigente() -> Self {
        Self {
            estado_registro: ESTADO_REGISTRO_VIGENTE.into(),
            estado_cum: ESTADO_CUM_ACTIVO.into(),
            muestra_medica: MUESTRA_MEDICA_NO.into(),
        }
    }

    /// Status of an expired registration.
    pub fn vencido() -> Self {
        Self {
            estado_registro: "Vencido".into(),
            estado_cum: "Inactivo".into(),
            muestra_medica: MUESTRA_MEDICA_NO.into(),
        }
    }

    /// A record is valid only when current, active and not a medical sample.
    pub fn is_valid(&self) -> bool {
        self.estado_registro == ESTADO_REGISTRO_VIGENTE
            && self.estado_cum == ESTADO_CUM_ACTIVO
            && self.muestra_medica == MUESTRA_MEDICA_NO
    }
}

/// One row of the reference medication table.
///
/// `valido` is derived from [`RegistrationStatus`] on construction and has no
/// setter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationRecord {
    /// Unique registration identifier
    pub cum: String,
    /// Commercial product name (display only)
    pub producto: String,
    /// Anatomical Therapeutic Chemical code
    pub atc: String,
    /// Human-readable ATC description
    pub atc_descripcion: String,
    /// Route of administration
    pub via_administracion: String,
    /// Active ingredient(s)
    pub principio_activo: String,
    /// Pharmaceutical form (e.g., "Tableta", "Jarabe")
    pub forma_farmaceutica: String,
    /// Dose quantity
    pub cantidad: Option<f64>,
    /// Reference quantity registered with the CUM
    pub cantidad_cum: Option<f64>,
    /// Unit of measure for the quantities
    pub unidad_medida: String,
    /// Status fields `valido` was derived from
    pub status: RegistrationStatus,
    valido: bool,
}

impl MedicationRecord {
    /// Create a record with required fields; validity is derived from `status`.
    pub fn new(cum: String, producto: String, status: RegistrationStatus) -> Self {
        let valido = status.is_valid();
        Self {
            cum,
            producto,
            atc: String::new(),
            atc_descripcion: String::new(),
            via_administracion: String::new(),
            principio_activo: String::new(),
            forma_farmaceutica: String::new(),
            cantidad: None,
            cantidad_cum: None,
            unidad_medida: String::new(),
            status,
            valido,
        }
    }

    /// Whether this record is a valid (homologation target) medication.
    pub fn is_valid(&self) -> bool {
        self.valido
    }

    /// The exact (ATC, route) pair used as the eligibility key.
    pub fn combo(&self) -> (&str, &str) {
        (&self.atc, &self.via_administracion)
    }

    /// Dose quantity if present, finite and strictly positive.
    pub fn positive_quantity(&self) -> Option<f64> {
        self.cantidad.filter(|q| q.is_finite() && *q > 0.0)
    }
}

/// A row as it arrives from the source spreadsheet export.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawMedication {
    #[serde(rename = "CUM", default, deserialize_with = "identifier")]
    pub cum: Option<String>,
    #[serde(rename = "EXPEDIENTE CUM", default, deserialize_with = "identifier")]
    pub expediente_cum: Option<String>,
    #[serde(rename = "CONSECUTIVO", default, deserialize_with = "identifier")]
    pub consecutivo: Option<String>,
    #[serde(rename = "PRODUCTO", default)]
    pub producto: String,
    #[serde(rename = "ATC", default)]
    pub atc: String,
    #[serde(rename = "DESCRIPCIÓN_ATC", default)]
    pub atc_descripcion: String,
    #[serde(rename = "VÍA ADMINISTRACIÓN", default)]
    pub via_administracion: String,
    #[serde(rename = "PRINCIPIO ACTIVO", default)]
    pub principio_activo: String,
    #[serde(rename = "FORMA FARMACÉUTICA", default)]
    pub forma_farmaceutica: String,
    #[serde(rename = "CANTIDAD", default)]
    pub cantidad: Option<f64>,
    #[serde(rename = "CANTIDAD CUM", default)]
    pub cantidad_cum: Option<f64>,
    #[serde(rename = "UNIDAD MEDIDA", default)]
    pub unidad_medida: String,
    #[serde(rename = "ESTADO REGISTRO", default)]
    pub estado_registro: String,
    #[serde(rename = "ESTADO CUM", default)]
    pub estado_cum: String,
    #[serde(rename = "MUESTRA MÉDICA", default)]
    pub muestra_medica: String,
}

impl RawMedication {
    /// Validate and convert into a [`MedicationRecord`].
    ///
    /// `row` is only used for error reporting.
    pub fn into_record(self, row: usize) -> IngestResult<MedicationRecord> {
        let cum = resolve_cum(
            self.cum.as_deref(),
            self.expediente_cum.as_deref(),
            self.consecutivo.as_deref(),
        )
        .ok_or(IngestError::MissingCum { row })?;

        let status = RegistrationStatus {
            estado_registro: self.estado_registro.trim().to_string(),
            estado_cum: self.estado_cum.trim().to_string(),
            muestra_medica: self.muestra_medica.trim().to_string(),
        };

        let mut record = MedicationRecord::new(cum, self.producto.trim().to_string(), status);
        record.atc = self.atc.trim().to_string();
        record.atc_descripcion = self.atc_descripcion.trim().to_string();
        record.via_administracion = self.via_administracion.trim().to_string();
        record.principio_activo = self.principio_activo.trim().to_string();
        record.forma_farmaceutica = self.forma_farmaceutica.trim().to_string();
        record.cantidad = sanitize_quantity(self.cantidad);
        record.cantidad_cum = sanitize_quantity(self.cantidad_cum);
        record.unidad_medida = self.unidad_medida.trim().to_string();
        Ok(record)
    }
}

/// Identifier cell that spreadsheet exports write as text or as a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdentifierCell {
    Text(String),
    Number(serde_json::Number),
}

fn identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let cell = Option::<IdentifierCell>::deserialize(deserializer)?;
    Ok(cell.map(|cell| match cell {
        IdentifierCell::Text(text) => text,
        IdentifierCell::Number(number) => number_text(&number),
    }))
}

// Whole floats ("1234.0") come from numeric spreadsheet columns
fn number_text(number: &serde_json::Number) -> String {
    match number.as_f64() {
        Some(f) if number.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => number.to_string(),
    }
}

/// Outcome of ingesting a batch of raw rows.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub records: Vec<MedicationRecord>,
    pub rejected: Vec<IngestError>,
}

/// Validate every row, collecting rejects instead of aborting.
pub fn ingest<I>(rows: I) -> IngestReport
where
    I: IntoIterator<Item = RawMedication>,
{
    let mut report = IngestReport::default();
    for (row, raw) in rows.into_iter().enumerate() {
        match raw.into_record(row) {
            Ok(record) => report.records.push(record),
            Err(e) => {
                tracing::warn!(error = %e, "rejected medication row");
                report.rejected.push(e);
            }
        }
    }
    report
}

fn resolve_cum(cum: Option<&str>, expediente: Option<&str>, consecutivo: Option<&str>) -> Option<String> {
    if let Some(cum) = cum.map(str::trim).filter(|c| !c.is_empty()) {
        return Some(cum.to_string());
    }
    let expediente = expediente.map(str::trim).filter(|e| !e.is_empty())?;
    let consecutivo = consecutivo.map(str::trim).filter(|c| !c.is_empty())?;
    Some(format!("{}-{}", expediente, consecutivo))
}

fn sanitize_quantity(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}
