use std::collections::{HashMap, HashSet};

use mp_core::types::PopupConfig;

use crate::LoadError;

/// Popups that persist their display record under the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeyCollision {
    pub storage_key: String,
    pub popup_ids: Vec<String>,
}

pub struct ValidateStats {
    pub deduped_rules: usize,
    pub without_products: Vec<String>,
    pub storage_key_collisions: Vec<StorageKeyCollision>,
}

/// Check a normalized snapshot before handing it to the engine.
///
/// Duplicate popup ids are an error. Repeated page rules inside one popup
/// are dropped. Shared storage keys are reported, not fixed: the popups
/// sharing a key also share their display history.
pub fn validate_configs(configs: &mut [PopupConfig]) -> Result<ValidateStats, LoadError> {
    let mut ids: HashSet<&str> = HashSet::new();
    for config in configs.iter() {
        if !ids.insert(config.id.as_str()) {
            return Err(LoadError::DuplicateId(config.id.clone()));
        }
    }

    let mut deduped_rules = 0usize;
    for config in configs.iter_mut() {
        let mut seen: HashSet<String> = HashSet::new();
        let before = config.page_rules.len();
        config.page_rules.retain(|rule| seen.insert(rule.clone()));
        deduped_rules += before - config.page_rules.len();
    }

    let without_products: Vec<String> = configs
        .iter()
        .filter(|config| !config.has_renderable_products())
        .map(|config| config.id.clone())
        .collect();

    let mut by_key: HashMap<&str, Vec<String>> = HashMap::new();
    let mut key_order: Vec<&str> = Vec::new();
    for config in configs.iter() {
        let ids = by_key.entry(config.storage_key.as_str()).or_insert_with(|| {
            key_order.push(config.storage_key.as_str());
            Vec::new()
        });
        ids.push(config.id.clone());
    }

    let storage_key_collisions: Vec<StorageKeyCollision> = key_order
        .into_iter()
        .filter_map(|key| {
            let ids = by_key.remove(key)?;
            (ids.len() > 1).then(|| StorageKeyCollision {
                storage_key: key.to_string(),
                popup_ids: ids,
            })
        })
        .collect();

    for collision in &storage_key_collisions {
        log::warn!(
            "Storage key '{}' is shared by popups {:?}; they will share display history",
            collision.storage_key,
            collision.popup_ids
        );
    }

    Ok(ValidateStats {
        deduped_rules,
        without_products,
        storage_key_collisions,
    })
}
