use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

use mp_wasm::{matches_page_rules, render_modal_html, select_popup_id};

const T: f64 = 1_700_000_000_000.0;

fn js(json: &str) -> JsValue {
    js_sys::JSON::parse(json).unwrap()
}

fn configs() -> JsValue {
    js(r#"[
        {"id": "furever", "storageKey": "furever_shown", "pageRules": ["*furever*"],
         "products": [{"title": "Furever", "url": "/furever/", "image": "/f.jpg"}]},
        {"id": "any", "storageKey": "any_shown",
         "products": [{"title": "Any", "url": "/any/", "image": "/a.jpg"}]}
    ]"#)
}

#[wasm_bindgen_test]
fn page_rules_from_js_array() {
    let rules = js(r#"["*furever*"]"#);
    assert!(matches_page_rules(rules.clone(), "/nl/product/furever/", ""));
    assert!(!matches_page_rules(rules, "/nl/product/earthrise/", ""));
    assert!(matches_page_rules(js("[]"), "/anything/", ""));
}

#[wasm_bindgen_test]
fn select_honours_order_and_state() {
    let href = "https://www.example.nl/nl/product/furever/";
    let empty = js("{}");
    assert_eq!(
        select_popup_id(configs(), empty, href, 390, T).unwrap().as_deref(),
        Some("furever")
    );

    let seen = js(r#"{"furever_shown": "1700000000000"}"#);
    assert_eq!(
        select_popup_id(configs(), seen, href, 390, T + 1000.0).unwrap().as_deref(),
        Some("any")
    );

    assert_eq!(select_popup_id(configs(), JsValue::UNDEFINED, href, 1280, T).unwrap(), None);
}

#[wasm_bindgen_test]
fn malformed_configs_select_nothing() {
    assert!(select_popup_id(js("42"), JsValue::UNDEFINED, "https://x/", 390, T).is_err());
    assert_eq!(select_popup_id(JsValue::NULL, JsValue::UNDEFINED, "https://x/", 390, T).unwrap(), None);
}

#[wasm_bindgen_test]
fn renders_dialog_markup() {
    let options = js(r#"{"closeLabel": "Close"}"#);
    let html = render_modal_html(configs(), options).unwrap();
    assert!(html.contains(r#"role="dialog""#));
    assert!(html.contains(r#"href="/furever/""#));
    assert!(html.contains(">Close</button>"));
}
