//! Modal markup and stylesheet
//!
//! The markup is a self-contained HTML fragment: an overlay carrying the
//! dialog role, a labelled title, one anchor card per renderable product
//! and a close button. Every configured string is escaped.

use std::fmt::Write;

use crate::types::PopupConfig;

pub const OVERLAY_CLASS: &str = "mp-modal-overlay";
pub const VISIBLE_CLASS: &str = "visible";
pub const PRODUCT_CARD_CLASS: &str = "mp-product-card";
pub const CLOSE_BUTTON_CLASS: &str = "mp-modal-close";
pub const LOADING_CLASS: &str = "loading";
pub const LOADER_CLASS: &str = "mp-loader";
pub const TITLE_ID: &str = "mp-modal-title";

/// Presentation knobs that are not part of a popup config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupOptions {
    pub close_label: String,
}

impl Default for MarkupOptions {
    fn default() -> Self {
        Self {
            close_label: "Sluiten".to_string(),
        }
    }
}

/// Escape text for use in element content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the modal for `config`. Products missing a required field are left out.
pub fn render_modal(config: &PopupConfig, options: &MarkupOptions) -> String {
    let mut cards = String::new();
    for (index, product) in config.renderable_products().enumerate() {
        let title = escape_html(&product.title);
        let _ = write!(
            cards,
            concat!(
                r#"<a href="{url}" class="{card}" data-product-index="{index}">"#,
                r#"<img src="{image}" alt="{title}" class="mp-product-image" loading="eager" />"#,
                r#"<div class="mp-product-title">{title}</div>"#,
            ),
            url = escape_html(&product.url),
            card = PRODUCT_CARD_CLASS,
            index = index,
            image = escape_html(&product.image),
            title = title,
        );
        if let Some(subtitle) = product.subtitle() {
            let _ = write!(cards, r#"<div class="mp-product-subtitle">{}</div>"#, escape_html(subtitle));
        }
        cards.push_str("</a>");
    }

    format!(
        concat!(
            r#"<div class="{overlay}" role="dialog" aria-modal="true" aria-labelledby="{title_id}">"#,
            r#"<div class="mp-modal">"#,
            r#"<h2 id="{title_id}" class="mp-modal-title">{title}</h2>"#,
            r#"<div class="mp-modal-products">{cards}</div>"#,
            r#"<button type="button" class="{close}">{close_label}</button>"#,
            r#"</div></div>"#,
        ),
        overlay = OVERLAY_CLASS,
        title_id = TITLE_ID,
        title = escape_html(&config.title),
        cards = cards,
        close = CLOSE_BUTTON_CLASS,
        close_label = escape_html(&options.close_label),
    )
}

/// Grid columns for the product area.
pub fn grid_columns(product_count: usize) -> &'static str {
    match product_count {
        0 | 1 => "1fr",
        2 => "1fr 1fr",
        3 => "repeat(3, 1fr)",
        _ => "repeat(auto-fit, minmax(150px, 1fr))",
    }
}

/// Stylesheet for a modal with `product_count` cards.
pub fn render_styles(product_count: usize) -> String {
    let columns = grid_columns(product_count);
    let max_width = if product_count <= 1 { "350px" } else { "500px" };
    let narrow_columns = if product_count > 2 { "1fr 1fr" } else { columns };
    let font = "'Montserrat', -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif";

    format!(
        r#"
.mp-modal-overlay {{ position: fixed; inset: 0; background: rgba(0, 0, 0, 0.5); z-index: 9999; display: flex; align-items: center; justify-content: center; padding: 20px; opacity: 0; transition: opacity 0.3s ease; }}
.mp-modal-overlay.visible {{ opacity: 1; }}
.mp-modal {{ background: white; border-radius: 8px; padding: 30px 20px; max-width: {max_width}; width: 100%; box-shadow: 0 4px 20px rgba(0, 0, 0, 0.15); animation: mp-slide-up 0.3s ease; }}
@keyframes mp-slide-up {{ from {{ transform: translateY(30px); opacity: 0; }} to {{ transform: translateY(0); opacity: 1; }} }}
.mp-modal-title {{ font-family: {font}; font-size: 20px; font-weight: 600; color: #000; text-align: center; margin: 0 0 25px 0; line-height: 1.4; }}
.mp-modal-products {{ display: grid; grid-template-columns: {columns}; gap: 15px; margin-bottom: 15px; }}
.mp-product-card {{ display: flex; flex-direction: column; align-items: center; text-decoration: none; padding: 15px; border: 2px solid #e5e5e5; border-radius: 8px; transition: all 0.2s ease; cursor: pointer; background: white; }}
.mp-product-card:hover, .mp-product-card:active {{ border-color: #000; transform: translateY(-2px); box-shadow: 0 4px 12px rgba(0, 0, 0, 0.1); }}
.mp-product-image {{ width: 100%; aspect-ratio: 1; object-fit: cover; border-radius: 4px; margin-bottom: 12px; }}
.mp-product-title {{ font-family: {font}; font-size: 14px; font-weight: 600; color: #000; text-align: center; margin: 0 0 4px 0; line-height: 1.3; }}
.mp-product-subtitle {{ font-family: {font}; font-size: 12px; color: #666; text-align: center; margin: 0; }}
.mp-modal-close {{ display: block; width: 100%; padding: 12px; margin-top: 10px; background: transparent; border: 1px solid #ddd; border-radius: 6px; font-family: {font}; font-size: 14px; color: #666; cursor: pointer; transition: all 0.2s ease; }}
.mp-modal-close:hover, .mp-modal-close:active {{ background: #f5f5f5; border-color: #999; color: #000; }}
.mp-modal-close.loading {{ color: transparent; position: relative; pointer-events: none; border-color: #999; }}
.mp-loader {{ display: inline-block; width: 16px; height: 16px; border: 2px solid #f3f3f3; border-top: 2px solid #666; border-radius: 50%; animation: mp-spin 0.8s linear infinite; position: absolute; left: 50%; top: 50%; transform: translate(-50%, -50%); }}
@keyframes mp-spin {{ 0% {{ transform: translate(-50%, -50%) rotate(0deg); }} 100% {{ transform: translate(-50%, -50%) rotate(360deg); }} }}
@media (max-width: 360px) {{
  .mp-modal {{ padding: 25px 15px; }}
  .mp-modal-title {{ font-size: 18px; }}
  .mp-modal-products {{ grid-template-columns: {narrow_columns}; }}
}}
"#,
        max_width = max_width,
        font = font,
        columns = columns,
        narrow_columns = narrow_columns,
    )
}
