//! WebAssembly bindings for MagicPop

mod console;
mod runtime;
mod storage;

use log::LevelFilter;
use wasm_bindgen::prelude::*;

use mp_config::{load_configs, Snapshot};
use mp_core::{
    markup::{render_modal, MarkupOptions},
    modal::SHOW_DELAY_MS,
    rules::PageRules,
    selector::{self, EvalContext, Selector},
    storage::{DisplayState, MemoryStore},
    Location,
};

pub use storage::LocalStore;

/// Global holding multiple popup records, in priority order.
const CONFIGS_GLOBAL: &str = "URN_POPUP_CONFIGS";
/// Global holding a single popup record.
const CONFIG_GLOBAL: &str = "URN_POPUP_CONFIG";

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    console::init(LevelFilter::Info);
}

/// Change console verbosity: "off", "error", "warn", "info", "debug" or "trace".
#[wasm_bindgen]
pub fn set_log_level(level: &str) -> Result<(), JsValue> {
    let level: LevelFilter = level
        .parse()
        .map_err(|_| JsValue::from_str(&format!("Unknown log level: {}", level)))?;
    console::set_level(level);
    Ok(())
}

fn load_snapshot(configs: &JsValue) -> Result<Snapshot, JsValue> {
    if configs.is_undefined() || configs.is_null() {
        return Ok(Snapshot::default());
    }
    let text: String = js_sys::JSON::stringify(configs)?.into();
    load_configs(&text).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn close_label(options: &JsValue) -> MarkupOptions {
    let mut markup = MarkupOptions::default();
    if options.is_object() {
        if let Some(label) = js_sys::Reflect::get(options, &"closeLabel".into())
            .ok()
            .and_then(|value| value.as_string())
        {
            markup.close_label = label;
        }
    }
    markup
}

/// Pick a popup for the current page and show it once the document is
/// ready. Returns whether a popup was scheduled.
///
/// Never throws: bad configuration, missing storage or DOM failures are
/// logged and the page is left alone.
#[wasm_bindgen]
pub fn run(configs: JsValue, options: JsValue) -> bool {
    let snapshot = match load_snapshot(&configs) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::warn!("Ignoring popup configuration: {}", storage::describe(&e));
            return false;
        }
    };

    let window = match web_sys::window() {
        Some(window) => window,
        None => return false,
    };
    let href = match window.location().href() {
        Ok(href) => href,
        Err(_) => return false,
    };
    let viewport_width = window
        .inner_width()
        .ok()
        .and_then(|width| width.as_f64())
        .unwrap_or(0.0)
        .max(0.0) as u32;

    let location = Location::from_url(&href);
    let ctx = EvalContext::new(&location, viewport_width, js_sys::Date::now() as i64);
    let state = DisplayState::new(LocalStore::open());

    let config = match Selector::new(&snapshot.configs).select(&state, &ctx) {
        Some(config) => config.clone(),
        None => return false,
    };

    match runtime::show_when_ready(config, close_label(&options), SHOW_DELAY_MS) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Failed to schedule popup: {}", storage::describe(&e));
            false
        }
    }
}

/// Read the configuration from the page globals and [`run`] it.
#[wasm_bindgen]
pub fn run_from_window() -> bool {
    let window = match web_sys::window() {
        Some(window) => window,
        None => return false,
    };

    let many = js_sys::Reflect::get(&window, &CONFIGS_GLOBAL.into()).unwrap_or(JsValue::UNDEFINED);
    if js_sys::Array::is_array(&many) {
        return run(many, JsValue::UNDEFINED);
    }

    let single = js_sys::Reflect::get(&window, &CONFIG_GLOBAL.into()).unwrap_or(JsValue::UNDEFINED);
    if single.is_object() {
        return run(single, JsValue::UNDEFINED);
    }

    log::info!("No configuration found");
    false
}

/// Show the first config in `config` right away, skipping every gate.
/// Used by the admin preview.
#[wasm_bindgen]
pub fn preview(config: JsValue, options: JsValue) -> Result<(), JsValue> {
    let snapshot = load_snapshot(&config)?;
    let first = snapshot
        .configs
        .first()
        .ok_or_else(|| JsValue::from_str("No popup configuration to preview"))?;
    if !first.has_renderable_products() {
        return Err(JsValue::from_str("Add at least one product before previewing"));
    }
    let preview = selector::preview(first, js_sys::Date::now() as i64);
    runtime::show(&preview, &close_label(&options))
}

/// Evaluate page rules against a location. Exposed for the admin rule tester.
#[wasm_bindgen]
pub fn matches_page_rules(rules: JsValue, path: &str, full_url: &str) -> bool {
    let rules: Vec<String> = js_sys::Array::from(&rules)
        .iter()
        .filter_map(|value| value.as_string())
        .collect();
    PageRules::compile(&rules).matches(path, full_url)
}

/// Pure selection: no DOM, no `localStorage`. `state` is a plain object of
/// storage key to timestamp string.
#[wasm_bindgen]
pub fn select_popup_id(
    configs: JsValue,
    state: JsValue,
    href: &str,
    viewport_width: u32,
    now: f64,
) -> Result<Option<String>, JsValue> {
    let snapshot = load_snapshot(&configs)?;

    let mut store = Vec::new();
    if state.is_object() {
        let entries = js_sys::Object::entries(&js_sys::Object::from(state));
        for entry in entries.iter() {
            let pair = js_sys::Array::from(&entry);
            if let (Some(key), Some(value)) = (pair.get(0).as_string(), pair.get(1).as_string()) {
                store.push((key, value));
            }
        }
    }
    let state = DisplayState::new(store.into_iter().collect::<MemoryStore>());

    let location = Location::from_url(href);
    let ctx = EvalContext::new(&location, viewport_width, now as i64);
    Ok(Selector::new(&snapshot.configs)
        .select(&state, &ctx)
        .map(|config| config.id.clone()))
}

/// Render the modal markup of the first config in `config`.
#[wasm_bindgen]
pub fn render_modal_html(config: JsValue, options: JsValue) -> Result<String, JsValue> {
    let snapshot = load_snapshot(&config)?;
    let first = snapshot
        .configs
        .first()
        .ok_or_else(|| JsValue::from_str("No popup configuration to render"))?;
    Ok(render_modal(first, &close_label(&options)))
}
