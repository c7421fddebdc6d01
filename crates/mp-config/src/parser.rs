use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use ts_rs::TS;

use mp_core::storage::parse_timestamp;
use mp_core::types::{default_storage_key, PopupConfig, Product, DEFAULT_TITLE};

use crate::LoadError;

/// Keys that mark a JSON object as a single popup record rather than a
/// map of records keyed by popup id.
const RECORD_KEYS: &[&str] = &[
    "products",
    "title",
    "storageKey",
    "storage_key",
    "pageRules",
    "page_rules",
];

/// camelCase names of the front-end payload and the record fields they fill.
pub const FIELD_ALIASES: &[(&str, &str)] = &[
    ("pageRules", "page_rules"),
    ("showOnDesktop", "show_on_desktop"),
    ("redisplayDays", "redisplay_days"),
    ("storageKey", "storage_key"),
];

// =============================================================================
// Raw Shapes
// =============================================================================

/// A boolean as stored by older admin versions: a real bool, 0/1, or a string.
#[derive(Debug, Clone, PartialEq, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum LooseBool {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl LooseBool {
    pub fn truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        }
    }
}

/// A non-negative integer that may arrive as a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
}

impl LooseNumber {
    /// Clamp to `u32`; negative or unparsable values become 0.
    pub fn to_u32(&self) -> u32 {
        let value = match self {
            Self::Number(n) if n.is_finite() => n.trunc() as i64,
            Self::Number(_) => 0,
            Self::Text(s) => parse_timestamp(s).unwrap_or(0),
        };
        value.clamp(0, i64::from(u32::MAX)) as u32
    }
}

/// Page rules as a list, or as the newline-delimited admin textarea.
#[derive(Debug, Clone, PartialEq, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum RawRules {
    List(Vec<String>),
    Text(String),
}

impl RawRules {
    pub fn into_rules(self) -> Vec<String> {
        let lines: Vec<String> = match self {
            Self::List(list) => list,
            Self::Text(text) => text.lines().map(str::to_string).collect(),
        };
        lines
            .into_iter()
            .map(|rule| rule.trim().to_string())
            .filter(|rule| !rule.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, TS)]
#[ts(export)]
pub struct RawProduct {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl RawProduct {
    /// Build a product if title, url and image are all present and non-blank.
    pub fn into_product(self) -> Option<Product> {
        let required = |field: Option<String>| field.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let title = required(self.title)?;
        let url = required(self.url)?;
        let image = required(self.image)?;
        let subtitle = self
            .subtitle
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Some(Product {
            title,
            subtitle,
            url,
            image,
        })
    }
}

/// Products as a list, or as the JSON-encoded string the settings store keeps.
#[derive(Debug, Clone, PartialEq, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum RawProducts {
    List(Vec<RawProduct>),
    Encoded(String),
}

/// One popup record as the admin collaborator hands it over.
///
/// Both the stored snake_case shape and the camelCase front-end shape are
/// accepted: `pageRules`, `showOnDesktop`, `redisplayDays` and `storageKey`
/// are renamed to their snake_case fields before deserialization (see
/// [`FIELD_ALIASES`]). Every field is optional; defaults are applied by
/// [`normalize_record`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, TS)]
#[ts(export)]
pub struct RawPopupRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: Option<LooseBool>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub products: Option<RawProducts>,
    #[serde(default)]
    pub page_rules: Option<RawRules>,
    #[serde(default)]
    pub show_on_desktop: Option<LooseBool>,
    #[serde(default)]
    pub redisplay_days: Option<LooseNumber>,
    #[serde(default)]
    pub storage_key: Option<String>,
}

// =============================================================================
// Parsing
// =============================================================================

/// A raw record together with the id it should fall back to.
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    pub fallback_id: String,
    pub record: RawPopupRecord,
}

/// Outcome of parsing a snapshot document.
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub records: Vec<ParsedRecord>,
    /// Entries that could not be read as a popup record.
    pub rejected: usize,
}

/// Parse a snapshot document: a JSON array of records, an object of records
/// keyed by popup id, a single record, or `null`.
pub fn parse_popup_records(text: &str) -> Result<ParseOutput, LoadError> {
    let value: Value = serde_json::from_str(text)?;
    parse_popup_value(value)
}

pub fn parse_popup_value(value: Value) -> Result<ParseOutput, LoadError> {
    let entries: Vec<(String, Value)> = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (format!("popup_{}", index), item))
            .collect(),
        Value::Object(map) if RECORD_KEYS.iter().any(|key| map.contains_key(*key)) => {
            vec![("popup_0".to_string(), Value::Object(map))]
        }
        Value::Object(map) => map.into_iter().collect(),
        other => return Err(LoadError::UnexpectedShape(json_kind(&other).to_string())),
    };

    let mut output = ParseOutput::default();
    for (fallback_id, item) in entries {
        match serde_json::from_value::<RawPopupRecord>(canonical_keys(item)) {
            Ok(record) => output.records.push(ParsedRecord { fallback_id, record }),
            Err(e) => {
                log::warn!("Skipping popup record '{}': {}", fallback_id, e);
                output.rejected += 1;
            }
        }
    }

    resolve_fallback_ids(&mut output.records);
    Ok(output)
}

/// Rename camelCase keys to their snake_case field. When both spellings
/// are present the snake_case value wins.
fn canonical_keys(item: Value) -> Value {
    match item {
        Value::Object(mut map) => {
            for (alias, field) in FIELD_ALIASES {
                if let Some(value) = map.remove(*alias) {
                    if !map.contains_key(*field) {
                        map.insert(field.to_string(), value);
                    }
                }
            }
            Value::Object(map)
        }
        other => other,
    }
}

/// Records without an id fall back to their position or map key. Make sure
/// a fallback never takes an id another record sets explicitly.
fn resolve_fallback_ids(records: &mut [ParsedRecord]) {
    let mut taken: HashSet<String> = records
        .iter()
        .filter_map(|parsed| explicit_id(&parsed.record))
        .collect();

    for parsed in records.iter_mut() {
        if explicit_id(&parsed.record).is_some() {
            continue;
        }
        let mut candidate = parsed.fallback_id.clone();
        let mut n = 1usize;
        while taken.contains(&candidate) {
            candidate = format!("{}_{}", parsed.fallback_id, n);
            n += 1;
        }
        if candidate != parsed.fallback_id {
            log::warn!(
                "Popup id '{}' is already in use; using '{}' for the record without an id",
                parsed.fallback_id,
                candidate
            );
        }
        taken.insert(candidate.clone());
        parsed.fallback_id = candidate;
    }
}

fn explicit_id(record: &RawPopupRecord) -> Option<String> {
    record
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Normalization
// =============================================================================

/// A normalized config and the number of products that had to be dropped.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub config: PopupConfig,
    pub dropped_products: usize,
}

/// Apply defaults and drop unusable products.
pub fn normalize_record(parsed: ParsedRecord) -> NormalizedRecord {
    let ParsedRecord { fallback_id, record } = parsed;

    let id = non_blank(record.id).unwrap_or(fallback_id);

    let raw_products = match record.products {
        None => Vec::new(),
        Some(RawProducts::List(list)) => list,
        Some(RawProducts::Encoded(text)) if text.trim().is_empty() => Vec::new(),
        Some(RawProducts::Encoded(text)) => match serde_json::from_str::<Vec<RawProduct>>(&text) {
            Ok(list) => list,
            Err(e) => {
                log::warn!("Popup '{}' has an unreadable product list: {}", id, e);
                Vec::new()
            }
        },
    };
    let total = raw_products.len();
    let products: Vec<Product> = raw_products
        .into_iter()
        .filter_map(RawProduct::into_product)
        .collect();
    let dropped_products = total - products.len();
    if dropped_products > 0 {
        log::warn!(
            "Popup '{}': dropped {} product(s) missing title, url or image",
            id,
            dropped_products
        );
    }

    let storage_key = non_blank(record.storage_key).unwrap_or_else(|| default_storage_key(&id));

    let config = PopupConfig {
        name: non_blank(record.name),
        enabled: record.enabled.map_or(true, |b| b.truthy()),
        title: non_blank(record.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        products,
        page_rules: record.page_rules.map(RawRules::into_rules).unwrap_or_default(),
        show_on_desktop: record.show_on_desktop.map_or(false, |b| b.truthy()),
        redisplay_days: record.redisplay_days.map_or(0, |n| n.to_u32()),
        storage_key,
        id,
    };

    NormalizedRecord {
        config,
        dropped_products,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize_one(json: &str) -> NormalizedRecord {
        let mut parsed = parse_popup_records(json).unwrap();
        assert_eq!(parsed.records.len(), 1);
        normalize_record(parsed.records.remove(0))
    }

    #[test]
    fn test_front_end_shape() {
        let out = normalize_one(
            r#"{
                "storageKey": "urn_shown",
                "title": "Welke urn?",
                "products": [{"title": "Furever", "url": "/furever/", "image": "/f.jpg", "subtitle": ""}],
                "redisplayDays": 7,
                "showOnDesktop": true
            }"#,
        );
        let config = out.config;
        assert_eq!(config.id, "popup_0");
        assert_eq!(config.storage_key, "urn_shown");
        assert!(config.enabled);
        assert!(config.show_on_desktop);
        assert_eq!(config.redisplay_days, 7);
        assert_eq!(config.products.len(), 1);
        assert_eq!(config.products[0].subtitle, None);
    }

    #[test]
    fn test_stored_shape_keyed_by_id() {
        let parsed = parse_popup_records(
            r#"{
                "popup_200": {"id": "popup_200", "enabled": true, "page_rules": "*furever*\r\n\n  /nl/  \n", "products": []},
                "popup_100": {"enabled": "0", "redisplay_days": "14", "products": "[]"}
            }"#,
        )
        .unwrap();
        let ids: Vec<String> = parsed
            .records
            .into_iter()
            .map(|p| normalize_record(p).config)
            .map(|c| {
                if c.id == "popup_200" {
                    assert_eq!(c.page_rules, vec!["*furever*", "/nl/"]);
                    assert!(c.enabled);
                } else {
                    assert!(!c.enabled);
                    assert_eq!(c.redisplay_days, 14);
                    assert_eq!(c.storage_key, "popup_100_shown");
                }
                c.id
            })
            .collect();
        // Object order is kept
        assert_eq!(ids, vec!["popup_200", "popup_100"]);
    }

    #[test]
    fn test_show_on_desktop_defaults_false() {
        let out = normalize_one(r#"{"title": "T", "products": []}"#);
        assert!(!out.config.show_on_desktop);
        assert_eq!(out.config.redisplay_days, 0);
        assert!(out.config.page_rules.is_empty());
    }

    #[test]
    fn test_legacy_boolean_values() {
        assert!(LooseBool::Text("1".to_string()).truthy());
        assert!(LooseBool::Text(" True ".to_string()).truthy());
        assert!(!LooseBool::Text("".to_string()).truthy());
        assert!(!LooseBool::Text("0".to_string()).truthy());
        assert!(LooseBool::Number(1.0).truthy());
        assert!(!LooseBool::Number(0.0).truthy());
    }

    #[test]
    fn test_loose_number() {
        assert_eq!(LooseNumber::Number(3.0).to_u32(), 3);
        assert_eq!(LooseNumber::Number(-2.0).to_u32(), 0);
        assert_eq!(LooseNumber::Text("30".to_string()).to_u32(), 30);
        assert_eq!(LooseNumber::Text("abc".to_string()).to_u32(), 0);
    }

    #[test]
    fn test_products_missing_fields_dropped() {
        let out = normalize_one(
            r#"{"title": "T", "products": [
                {"title": "Ok", "url": "/ok/", "image": "/ok.jpg"},
                {"title": "No url", "image": "/x.jpg"},
                {"title": "  ", "url": "/blank/", "image": "/b.jpg"}
            ]}"#,
        );
        assert_eq!(out.config.products.len(), 1);
        assert_eq!(out.dropped_products, 2);
    }

    #[test]
    fn test_encoded_products() {
        let out = normalize_one(
            r#"{"title": "T", "products": "[{\"title\":\"A\",\"url\":\"/a\",\"image\":\"/a.jpg\"}]"}"#,
        );
        assert_eq!(out.config.products.len(), 1);

        let out = normalize_one(r#"{"title": "T", "products": "not json"}"#);
        assert!(out.config.products.is_empty());
    }

    #[test]
    fn test_blank_title_gets_default() {
        let out = normalize_one(r#"{"title": "  ", "products": []}"#);
        assert_eq!(out.config.title, DEFAULT_TITLE);
    }

    #[test]
    fn test_bad_record_is_skipped() {
        let parsed = parse_popup_records(r#"[{"title": 5}, {"title": "ok"}, 3]"#).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.rejected, 2);
        assert_eq!(parsed.records[0].fallback_id, "popup_1");
    }

    #[test]
    fn test_fallback_id_avoids_explicit_ids() {
        let parsed = parse_popup_records(
            r#"[{"title": "no id"}, {"id": "popup_0", "title": "A"}, {"id": "popup_0_1", "title": "B"}]"#,
        )
        .unwrap();
        let ids: Vec<String> = parsed
            .records
            .into_iter()
            .map(|p| normalize_record(p).config.id)
            .collect();
        assert_eq!(ids, ["popup_0_2", "popup_0", "popup_0_1"]);
    }

    #[test]
    fn test_snake_case_wins_over_camel_case() {
        let out = normalize_one(r#"{"title": "T", "storage_key": "snake", "storageKey": "camel"}"#);
        assert_eq!(out.config.storage_key, "snake");

        let out = normalize_one(r#"{"title": "T", "showOnDesktop": true, "pageRules": ["*urn*"]}"#);
        assert!(out.config.show_on_desktop);
        assert_eq!(out.config.page_rules, ["*urn*"]);
    }

    #[test]
    fn test_unexpected_shapes() {
        assert!(matches!(parse_popup_records("42"), Err(LoadError::UnexpectedShape(_))));
        assert!(matches!(parse_popup_records("{not json"), Err(LoadError::InvalidJson(_))));
        assert!(parse_popup_records("null").unwrap().records.is_empty());
    }
}
