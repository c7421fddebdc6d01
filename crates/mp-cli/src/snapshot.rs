use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use mp_config::{load_configs, Snapshot};
use mp_core::types::{PopupConfig, Timestamp};
use mp_core::url::Location;

pub fn read_snapshot(path: &Path) -> Result<Snapshot, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    load_configs(&content).map_err(|e| format!("Invalid configuration '{}': {}", path.display(), e))
}

/// Find a config by id, or the first one when no id is given.
pub fn find_config<'a>(snapshot: &'a Snapshot, id: Option<&str>) -> Result<&'a PopupConfig, String> {
    match id {
        Some(id) => snapshot
            .configs
            .iter()
            .find(|config| config.id == id)
            .ok_or_else(|| format!("No popup with id '{}'", id)),
        None => snapshot
            .configs
            .first()
            .ok_or_else(|| "Configuration contains no popups".to_string()),
    }
}

/// Location from a URL, with an optional explicit request path.
pub fn location(url: &str, path: Option<&str>) -> Location {
    match path {
        Some(path) => Location::new(path, url),
        None => Location::from_url(url),
    }
}

pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_config() {
        let snapshot = load_configs(r#"[{"id": "a", "title": "A"}, {"id": "b", "title": "B"}]"#).unwrap();
        assert_eq!(find_config(&snapshot, None).unwrap().id, "a");
        assert_eq!(find_config(&snapshot, Some("b")).unwrap().id, "b");
        assert!(find_config(&snapshot, Some("c")).is_err());
    }

    #[test]
    fn test_location_override() {
        let loc = location("https://example.nl/nl/?x=1", Some("/nl/"));
        assert_eq!(loc.path, "/nl/");
        assert_eq!(loc.full_url, "https://example.nl/nl/?x=1");
        assert_eq!(location("https://example.nl/nl/?x=1", None).path, "/nl/?x=1");
    }
}
