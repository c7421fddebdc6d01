//! Display Selection & Frequency Engine
//!
//! Walks the configured popups in order and returns the first one that
//! passes every gate:
//!
//! 1. enabled
//! 2. has at least one renderable product
//! 3. page rules match the current location
//! 4. device: mobile-only popups are skipped above [`MOBILE_MAX_WIDTH`]
//! 5. frequency: never shown, or shown at least `redisplay_days` ago
//!
//! Order is the admin's prioritisation and is never changed here.

use crate::rules::PageRules;
use crate::storage::{DisplayState, KeyValueStore, LastShown};
use crate::types::{PopupConfig, Timestamp, MOBILE_MAX_WIDTH, MS_PER_DAY};
use crate::url::Location;

// =============================================================================
// Evaluation Context
// =============================================================================

/// Everything about the current page view the gates look at.
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    pub location: &'a Location,
    /// Viewport width in CSS pixels.
    pub viewport_width: u32,
    pub now: Timestamp,
}

impl<'a> EvalContext<'a> {
    pub fn new(location: &'a Location, viewport_width: u32, now: Timestamp) -> Self {
        Self {
            location,
            viewport_width,
            now,
        }
    }
}

// =============================================================================
// Gate Results
// =============================================================================

/// Why a popup was passed over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    Disabled,
    NoProducts,
    PageMismatch,
    /// Mobile-only popup on a viewport wider than [`MOBILE_MAX_WIDTH`].
    DesktopViewport { width: u32 },
    /// Show-once popup that already has a display record.
    AlreadyShown,
    /// Re-display interval has not elapsed yet.
    ShownRecently { elapsed_days: f64, redisplay_days: u32 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::NoProducts => write!(f, "no renderable products"),
            Self::PageMismatch => write!(f, "page rules do not match"),
            Self::DesktopViewport { width } => {
                write!(f, "viewport {}px is wider than {}px and desktop is off", width, MOBILE_MAX_WIDTH)
            }
            Self::AlreadyShown => write!(f, "already shown once"),
            Self::ShownRecently {
                elapsed_days,
                redisplay_days,
            } => write!(f, "shown {:.2} days ago, re-display after {}", elapsed_days, redisplay_days),
        }
    }
}

/// Per-popup outcome, as reported by [`Selector::evaluate`].
#[derive(Debug, Clone)]
pub struct Evaluation<'c> {
    pub config: &'c PopupConfig,
    pub verdict: Result<(), SkipReason>,
}

impl Evaluation<'_> {
    pub fn is_eligible(&self) -> bool {
        self.verdict.is_ok()
    }
}

/// Device gate: mobile-only popups stay hidden on wide viewports.
#[inline]
pub fn device_gate(show_on_desktop: bool, viewport_width: u32) -> Result<(), SkipReason> {
    if !show_on_desktop && viewport_width > MOBILE_MAX_WIDTH {
        return Err(SkipReason::DesktopViewport {
            width: viewport_width,
        });
    }
    Ok(())
}

/// Frequency gate on the popup's display record.
///
/// An entry whose value is not a timestamp still counts as "shown" for
/// show-once popups, but cannot hold back a popup with an interval.
pub fn frequency_gate(
    redisplay_days: u32,
    last_shown: Option<LastShown>,
    now: Timestamp,
) -> Result<(), SkipReason> {
    let last_shown = match last_shown {
        None => return Ok(()),
        Some(last_shown) => last_shown,
    };

    if redisplay_days == 0 {
        return Err(SkipReason::AlreadyShown);
    }

    let last = match last_shown {
        LastShown::At(ts) => ts,
        LastShown::Unreadable => return Ok(()),
    };

    let elapsed_days = now.saturating_sub(last) as f64 / MS_PER_DAY as f64;
    if elapsed_days < f64::from(redisplay_days) {
        return Err(SkipReason::ShownRecently {
            elapsed_days,
            redisplay_days,
        });
    }

    Ok(())
}

// =============================================================================
// Selector
// =============================================================================

/// A configuration snapshot with its page rules compiled once.
#[derive(Debug, Clone)]
pub struct Selector<'c> {
    configs: &'c [PopupConfig],
    rules: Vec<PageRules>,
}

impl<'c> Selector<'c> {
    pub fn new(configs: &'c [PopupConfig]) -> Self {
        Self {
            configs,
            rules: configs
                .iter()
                .map(|config| PageRules::compile(&config.page_rules))
                .collect(),
        }
    }

    pub fn configs(&self) -> &'c [PopupConfig] {
        self.configs
    }

    fn check<S: KeyValueStore>(
        &self,
        index: usize,
        state: &DisplayState<S>,
        ctx: &EvalContext<'_>,
    ) -> Result<(), SkipReason> {
        let config = &self.configs[index];

        if !config.enabled {
            return Err(SkipReason::Disabled);
        }

        if !config.has_renderable_products() {
            return Err(SkipReason::NoProducts);
        }

        if !self.rules[index].matches_location(ctx.location) {
            return Err(SkipReason::PageMismatch);
        }

        device_gate(config.show_on_desktop, ctx.viewport_width)?;

        frequency_gate(config.redisplay_days, state.last_shown(&config.storage_key), ctx.now)
    }

    /// Return the first popup passing every gate, in configured order.
    pub fn select<S: KeyValueStore>(
        &self,
        state: &DisplayState<S>,
        ctx: &EvalContext<'_>,
    ) -> Option<&'c PopupConfig> {
        for (index, config) in self.configs.iter().enumerate() {
            match self.check(index, state, ctx) {
                Ok(()) => {
                    log::debug!("popup '{}' selected", config.id);
                    return Some(config);
                }
                Err(reason) => log::debug!("popup '{}' skipped: {}", config.id, reason),
            }
        }
        None
    }

    /// Run every gate on every popup, without stopping at the first match.
    pub fn evaluate<S: KeyValueStore>(
        &self,
        state: &DisplayState<S>,
        ctx: &EvalContext<'_>,
    ) -> Vec<Evaluation<'c>> {
        self.configs
            .iter()
            .enumerate()
            .map(|(index, config)| Evaluation {
                config,
                verdict: self.check(index, state, ctx),
            })
            .collect()
    }
}

/// Pick the popup to show for this page view, if any.
///
/// The first config passing every gate wins; later configs are never
/// considered once a match is found.
pub fn select_popup<'c, S: KeyValueStore>(
    configs: &'c [PopupConfig],
    state: &DisplayState<S>,
    ctx: &EvalContext<'_>,
) -> Option<&'c PopupConfig> {
    Selector::new(configs).select(state, ctx)
}

// =============================================================================
// Preview
// =============================================================================

/// Prepare a config for an admin preview.
///
/// Previews skip every gate and use a throwaway storage key so they never
/// touch the live display record.
pub fn preview(config: &PopupConfig, now: Timestamp) -> PopupConfig {
    let mut preview = config.clone();
    preview.enabled = true;
    preview.storage_key = format!("preview_{}", now);
    preview.redisplay_days = 0;
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::Product;

    const T: Timestamp = 1_700_000_000_000;

    fn config(id: &str) -> PopupConfig {
        let mut config = PopupConfig::new(id, format!("Popup {}", id));
        config.products.push(Product::new("Urn", "/urn", "/urn.jpg"));
        config.storage_key = format!("{}_key", id);
        config
    }

    fn loc(path: &str) -> Location {
        Location::new(path, format!("https://www.example.nl{}", path))
    }

    fn empty_state() -> DisplayState<MemoryStore> {
        DisplayState::new(MemoryStore::new())
    }

    fn state_with(key: &str, ts: Timestamp) -> DisplayState<MemoryStore> {
        let mut state = empty_state();
        state.record_shown(key, ts);
        state
    }

    fn selected_id(
        configs: &[PopupConfig],
        state: &DisplayState<MemoryStore>,
        width: u32,
        now: Timestamp,
    ) -> Option<String> {
        let location = loc("/nl/product/furever/");
        let ctx = EvalContext::new(&location, width, now);
        select_popup(configs, state, &ctx).map(|c| c.id.clone())
    }

    #[test]
    fn test_end_to_end_show_once() {
        let mut k1 = config("k1");
        k1.storage_key = "k1".to_string();
        let configs = vec![k1];
        let mut state = empty_state();

        let location = loc("/");
        let ctx = EvalContext::new(&location, 400, T);
        let chosen = select_popup(&configs, &state, &ctx).expect("popup selected");
        state.record_shown(&chosen.storage_key, T);

        let ctx = EvalContext::new(&location, 400, T + 1000);
        assert!(select_popup(&configs, &state, &ctx).is_none());
    }

    #[test]
    fn test_show_once_never_reselected() {
        let configs = vec![config("a")];
        let state = state_with("a_key", T);
        for later in [T, T + MS_PER_DAY, T + 365 * MS_PER_DAY, T + 10_000 * MS_PER_DAY] {
            assert_eq!(selected_id(&configs, &state, 400, later), None);
        }
    }

    #[test]
    fn test_redisplay_interval() {
        let mut a = config("a");
        a.redisplay_days = 3;
        let configs = vec![a];
        let state = state_with("a_key", T);

        assert_eq!(selected_id(&configs, &state, 400, T + 3 * MS_PER_DAY - 1), None);
        assert_eq!(selected_id(&configs, &state, 400, T + 3 * MS_PER_DAY).as_deref(), Some("a"));
        assert_eq!(selected_id(&configs, &state, 400, T + 30 * MS_PER_DAY).as_deref(), Some("a"));
    }

    #[test]
    fn test_first_eligible_wins() {
        let configs = vec![config("a"), config("b")];
        assert_eq!(selected_id(&configs, &empty_state(), 400, T).as_deref(), Some("a"));
    }

    #[test]
    fn test_falls_through_to_next() {
        let configs = vec![config("a"), config("b")];
        let state = state_with("a_key", T);
        assert_eq!(selected_id(&configs, &state, 400, T + 1).as_deref(), Some("b"));
    }

    #[test]
    fn test_device_gate() {
        let configs = vec![config("a")];
        assert_eq!(selected_id(&configs, &empty_state(), 1024, T), None);
        assert_eq!(selected_id(&configs, &empty_state(), 768, T).as_deref(), Some("a"));

        let mut desktop = config("a");
        desktop.show_on_desktop = true;
        let configs = vec![desktop];
        assert_eq!(selected_id(&configs, &empty_state(), 1024, T).as_deref(), Some("a"));
    }

    #[test]
    fn test_disabled_and_empty_skipped() {
        let mut disabled = config("disabled");
        disabled.enabled = false;
        let mut empty = config("empty");
        empty.products.clear();
        let mut broken = config("broken");
        broken.products = vec![Product::new("No image", "/x", "")];
        let configs = vec![disabled, empty, broken, config("ok")];
        assert_eq!(selected_id(&configs, &empty_state(), 400, T).as_deref(), Some("ok"));
    }

    #[test]
    fn test_page_rules_gate() {
        let mut earthrise = config("earthrise");
        earthrise.page_rules = vec!["*earthrise*".to_string()];
        let mut furever = config("furever");
        furever.page_rules = vec!["*furever*".to_string()];
        let configs = vec![earthrise, furever];
        assert_eq!(selected_id(&configs, &empty_state(), 400, T).as_deref(), Some("furever"));
    }

    #[test]
    fn test_none_selected() {
        let configs: Vec<PopupConfig> = Vec::new();
        assert_eq!(selected_id(&configs, &empty_state(), 400, T), None);
    }

    #[test]
    fn test_frequency_gate_unreadable_entry() {
        assert_eq!(frequency_gate(0, Some(LastShown::Unreadable), T), Err(SkipReason::AlreadyShown));
        assert_eq!(frequency_gate(7, Some(LastShown::Unreadable), T), Ok(()));
        assert_eq!(frequency_gate(0, None, T), Ok(()));
    }

    #[test]
    fn test_frequency_gate_clock_skew() {
        // A record from the future keeps an interval popup hidden
        assert!(frequency_gate(1, Some(LastShown::At(T + MS_PER_DAY)), T).is_err());
    }

    #[test]
    fn test_evaluate_reports_every_reason() {
        let mut disabled = config("disabled");
        disabled.enabled = false;
        let mut elsewhere = config("elsewhere");
        elsewhere.page_rules = vec!["/checkout/".to_string()];
        let desktop_only = config("mobile");
        let seen = config("seen");
        let configs = vec![disabled, elsewhere, desktop_only, seen];

        let location = loc("/nl/");
        let state = state_with("seen_key", T);
        let ctx = EvalContext::new(&location, 1280, T);
        let report = Selector::new(&configs).evaluate(&state, &ctx);

        assert_eq!(report[0].verdict, Err(SkipReason::Disabled));
        assert_eq!(report[1].verdict, Err(SkipReason::PageMismatch));
        assert_eq!(report[2].verdict, Err(SkipReason::DesktopViewport { width: 1280 }));
        assert_eq!(report[3].verdict, Err(SkipReason::DesktopViewport { width: 1280 }));
        assert!(report.iter().all(|e| !e.is_eligible()));
    }

    #[test]
    fn test_preview_bypasses_gates() {
        let mut config = config("a");
        config.enabled = false;
        config.redisplay_days = 9;
        let preview = preview(&config, T);
        assert!(preview.enabled);
        assert_eq!(preview.storage_key, format!("preview_{}", T));
        assert_eq!(preview.redisplay_days, 0);
        assert_eq!(preview.title, config.title);
    }
}
