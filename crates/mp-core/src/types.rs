//! Core type definitions for MagicPop
//!
//! These types describe one configuration snapshot as handed to the engine
//! by the admin collaborator. They are read-only for the duration of a
//! single page evaluation.

use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// Widest viewport (in CSS pixels) still treated as a mobile device.
///
/// Fixed by design; configs opt into wider viewports with `show_on_desktop`.
pub const MOBILE_MAX_WIDTH: u32 = 768;

/// Milliseconds in one day, used by the re-display interval.
pub const MS_PER_DAY: i64 = 86_400_000;

/// Title used when a record does not carry one.
pub const DEFAULT_TITLE: &str = "Which product are you interested in?";

/// Epoch milliseconds, as produced by `Date.now()`.
pub type Timestamp = i64;

// =============================================================================
// Product
// =============================================================================

/// One clickable product card inside a popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Navigation target of the card.
    pub url: String,
    /// Image URL shown on the card.
    pub image: String,
}

impl Product {
    pub fn new(title: impl Into<String>, url: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            url: url.into(),
            image: image.into(),
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    /// A product can be rendered only when title, url and image are all present.
    pub fn is_renderable(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.trim().is_empty() && !self.image.trim().is_empty()
    }

    /// Subtitle, if present and not blank.
    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref().filter(|s| !s.trim().is_empty())
    }
}

// =============================================================================
// Popup Config
// =============================================================================

/// A complete popup definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupConfig {
    pub id: String,
    /// Admin-facing label, never rendered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub enabled: bool,
    pub title: String,
    pub products: Vec<Product>,
    /// Glob patterns; empty matches every page.
    #[serde(default)]
    pub page_rules: Vec<String>,
    #[serde(default)]
    pub show_on_desktop: bool,
    /// 0 means the popup is shown once and never again.
    #[serde(default)]
    pub redisplay_days: u32,
    pub storage_key: String,
}

impl PopupConfig {
    /// Create an enabled, mobile-only, show-once config with the default storage key.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let id = id.into();
        let storage_key = default_storage_key(&id);
        Self {
            id,
            name: None,
            enabled: true,
            title: title.into(),
            products: Vec::new(),
            page_rules: Vec::new(),
            show_on_desktop: false,
            redisplay_days: 0,
            storage_key,
        }
    }

    /// Products that carry every required field, in configured order.
    pub fn renderable_products(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.is_renderable())
    }

    pub fn has_renderable_products(&self) -> bool {
        self.renderable_products().next().is_some()
    }
}

/// Storage key assigned to a popup that was saved without one.
pub fn default_storage_key(id: &str) -> String {
    format!("{}_shown", id)
}
