//! MagicPop Configuration Loader
//!
//! This crate turns the popup records supplied by the admin collaborator
//! into a validated configuration snapshot for the engine. Defaults for
//! fields older records lack are applied here, so the engine only ever sees
//! complete `PopupConfig` values.

pub mod parser;
pub mod validate;

pub use parser::{normalize_record, parse_popup_records, parse_popup_value, RawPopupRecord, RawProduct};
pub use validate::{validate_configs, StorageKeyCollision};

use mp_core::types::PopupConfig;

/// Error type for snapshot loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Expected an array or object of popup records, found {0}")]
    UnexpectedShape(String),
    #[error("Duplicate popup id: {0}")]
    DuplicateId(String),
}

/// What loading had to drop or flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub records: usize,
    pub rejected_records: usize,
    pub dropped_products: usize,
    pub deduped_rules: usize,
    /// Popups left without any renderable product; they are never selected.
    pub without_products: Vec<String>,
    pub storage_key_collisions: Vec<StorageKeyCollision>,
}

/// A validated, ordered configuration snapshot.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub configs: Vec<PopupConfig>,
    pub report: LoadReport,
}

/// Load a snapshot from JSON text.
pub fn load_configs(text: &str) -> Result<Snapshot, LoadError> {
    build_snapshot(parse_popup_records(text)?)
}

/// Load a snapshot from an already parsed JSON value.
pub fn load_value(value: serde_json::Value) -> Result<Snapshot, LoadError> {
    build_snapshot(parse_popup_value(value)?)
}

fn build_snapshot(parsed: parser::ParseOutput) -> Result<Snapshot, LoadError> {
    let mut report = LoadReport {
        records: parsed.records.len() + parsed.rejected,
        rejected_records: parsed.rejected,
        ..LoadReport::default()
    };

    let mut configs = Vec::with_capacity(parsed.records.len());
    for record in parsed.records {
        let normalized = normalize_record(record);
        report.dropped_products += normalized.dropped_products;
        configs.push(normalized.config);
    }

    let stats = validate_configs(&mut configs)?;
    report.deduped_rules = stats.deduped_rules;
    report.without_products = stats.without_products;
    report.storage_key_collisions = stats.storage_key_collisions;

    log::debug!(
        "Loaded {} popup(s) from {} record(s)",
        configs.len(),
        report.records
    );

    Ok(Snapshot { configs, report })
}
