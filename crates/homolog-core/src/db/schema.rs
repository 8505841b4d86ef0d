//! SQLite schema definition.

/// Schema revision stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

/// Complete database schema for the homologation store.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Reference medication table
-- ============================================================================

CREATE TABLE IF NOT EXISTS medications (
    cum TEXT PRIMARY KEY,
    producto TEXT NOT NULL,
    atc TEXT NOT NULL DEFAULT '',
    atc_descripcion TEXT NOT NULL DEFAULT '',
    via_administracion TEXT NOT NULL DEFAULT '',
    principio_activo TEXT NOT NULL DEFAULT '',
    forma_farmaceutica TEXT NOT NULL DEFAULT '',
    cantidad REAL,                                -- NULL when missing
    cantidad_cum REAL,
    unidad_medida TEXT NOT NULL DEFAULT '',
    estado_registro TEXT NOT NULL DEFAULT '',
    estado_cum TEXT NOT NULL DEFAULT '',
    muestra_medica TEXT NOT NULL DEFAULT '',
    valido INTEGER NOT NULL DEFAULT 0,            -- derived, informational
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_medications_combo ON medications(atc, via_administracion);
CREATE INDEX IF NOT EXISTS idx_medications_valido ON medications(valido);

-- ============================================================================
-- Trained model bundles (append-only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS model_bundles (
    model_id TEXT PRIMARY KEY,
    format_version INTEGER NOT NULL,
    trained_at TEXT NOT NULL,
    checksum TEXT NOT NULL,
    total_records INTEGER NOT NULL,
    valid_records INTEGER NOT NULL,
    combo_clusters INTEGER NOT NULL,
    payload TEXT NOT NULL,                        -- JSON bundle
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_model_bundles_trained_at ON model_bundles(trained_at);
"#;
