//! DOM side of the modal lifecycle.
//!
//! `ModalSession` decides what happens; this module carries the resulting
//! effects out against the document. Listener closures hold a strong
//! reference to the modal, so the modal lives until it is dismissed and
//! its fade-out has finished. The closures are released only after
//! removal, never from inside one of their own invocations.

use std::cell::RefCell;
use std::rc::Rc;

use mp_core::markup::{self, MarkupOptions};
use mp_core::modal::{DismissTrigger, ModalEffect, ModalSession};
use mp_core::storage::DisplayState;
use mp_core::types::PopupConfig;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, EventTarget, HtmlElement, KeyboardEvent, Window};

use crate::storage::{describe, LocalStore};

type Listener = Closure<dyn FnMut(Event)>;

const STYLE_ELEMENT_ID: &str = "mp-modal-styles";

thread_local! {
    static ACTIVE: RefCell<Option<Rc<Modal>>> = const { RefCell::new(None) };
}

struct Listeners {
    escape: Listener,
    overlay_click: Listener,
    close_click: Listener,
    product_clicks: Vec<(Element, Listener)>,
}

pub struct Modal {
    window: Window,
    document: Document,
    body: HtmlElement,
    overlay: Element,
    close_button: Element,
    session: RefCell<ModalSession>,
    state: RefCell<DisplayState<LocalStore>>,
    listeners: RefCell<Option<Listeners>>,
    /// Listeners already detached from the page, dropped after removal.
    retired: RefCell<Option<Listeners>>,
}

fn js_error(message: &str) -> JsValue {
    JsValue::from_str(message)
}

impl Modal {
    /// Build the modal element for `config` without attaching it.
    fn build(config: &PopupConfig, options: &MarkupOptions) -> Result<Rc<Self>, JsValue> {
        let window = web_sys::window().ok_or_else(|| js_error("no window"))?;
        let document = window.document().ok_or_else(|| js_error("no document"))?;
        let body = document.body().ok_or_else(|| js_error("no body"))?;

        let template = document.create_element("div")?;
        template.set_inner_html(&markup::render_modal(config, options));
        let overlay = template
            .first_element_child()
            .ok_or_else(|| js_error("modal markup is empty"))?;
        let close_button = overlay
            .query_selector(&format!(".{}", markup::CLOSE_BUTTON_CLASS))?
            .ok_or_else(|| js_error("modal markup has no close button"))?;

        Ok(Rc::new(Self {
            window,
            document,
            body,
            overlay,
            close_button,
            session: RefCell::new(ModalSession::new(config.storage_key.clone())),
            state: RefCell::new(DisplayState::new(LocalStore::open())),
            listeners: RefCell::new(None),
            retired: RefCell::new(None),
        }))
    }

    fn dismiss(self: &Rc<Self>, trigger: DismissTrigger) {
        let effects = self.session.borrow_mut().dismiss(trigger);
        self.apply(effects);
    }

    fn finish(self: &Rc<Self>) {
        let effects = self.session.borrow_mut().finish();
        self.apply(effects);
        self.retired.borrow_mut().take();
    }

    fn apply(self: &Rc<Self>, effects: Vec<ModalEffect>) {
        for effect in effects {
            if let Err(e) = self.apply_one(effect) {
                log::warn!("Modal update failed: {}", describe(&e));
            }
        }
    }

    fn apply_one(self: &Rc<Self>, effect: ModalEffect) -> Result<(), JsValue> {
        match effect {
            ModalEffect::Attach => {
                self.body.append_child(&self.overlay)?;
                self.attach_listeners()?;
            }
            ModalEffect::LockScroll => {
                self.body.style().set_property("overflow", "hidden")?;
            }
            ModalEffect::FadeIn => {
                let overlay = self.overlay.clone();
                let callback = Closure::once_into_js(move || {
                    if let Err(e) = overlay.class_list().add_1(markup::VISIBLE_CLASS) {
                        log::warn!("Modal update failed: {}", describe(&e));
                    }
                });
                self.window.request_animation_frame(callback.unchecked_ref())?;
            }
            ModalEffect::ShowLoader => {
                self.close_button.class_list().add_1(markup::LOADING_CLASS)?;
                let loader = self.document.create_element("span")?;
                loader.set_class_name(markup::LOADER_CLASS);
                self.close_button.append_child(&loader)?;
            }
            ModalEffect::RecordShown { storage_key } => {
                let now = js_sys::Date::now() as i64;
                self.state.borrow_mut().record_shown(&storage_key, now);
            }
            ModalEffect::DetachListeners => {
                let detached = self.listeners.borrow_mut().take();
                if let Some(listeners) = detached {
                    self.detach_listeners(&listeners)?;
                    *self.retired.borrow_mut() = Some(listeners);
                }
            }
            ModalEffect::FadeOut => {
                self.overlay.class_list().remove_1(markup::VISIBLE_CLASS)?;
            }
            ModalEffect::UnlockScroll => {
                self.body.style().set_property("overflow", "")?;
            }
            ModalEffect::ScheduleRemoval { after_ms } => {
                let modal = Rc::clone(self);
                let callback = Closure::once_into_js(move || modal.finish());
                self.window
                    .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), after_ms as i32)?;
            }
            ModalEffect::Remove => {
                self.overlay.remove();
            }
        }
        Ok(())
    }

    fn listener(self: &Rc<Self>, handler: impl Fn(&Rc<Self>, Event) + 'static) -> Listener {
        let modal = Rc::clone(self);
        Closure::wrap(Box::new(move |event: Event| handler(&modal, event)) as Box<dyn FnMut(Event)>)
    }

    fn attach_listeners(self: &Rc<Self>) -> Result<(), JsValue> {
        let escape = self.listener(|modal, event| {
            if let Some(event) = event.dyn_ref::<KeyboardEvent>() {
                if event.key() == "Escape" {
                    modal.dismiss(DismissTrigger::Escape);
                }
            }
        });

        let overlay_click = self.listener(|modal, event| {
            let on_backdrop = event
                .target()
                .map(|target| js_sys::Object::is(&target, &modal.overlay))
                .unwrap_or(false);
            if on_backdrop {
                modal.dismiss(DismissTrigger::Overlay);
            }
        });

        let close_click = self.listener(|modal, _event| modal.dismiss(DismissTrigger::CloseButton));

        // Product links are left to navigate; the click only records the view
        let cards = self
            .overlay
            .query_selector_all(&format!(".{}", markup::PRODUCT_CARD_CLASS))?;
        let mut product_clicks = Vec::with_capacity(cards.length() as usize);
        for index in 0..cards.length() {
            let card = match cards.get(index).and_then(|node| node.dyn_into::<Element>().ok()) {
                Some(card) => card,
                None => continue,
            };
            let listener = self.listener(move |modal, _event| {
                modal.dismiss(DismissTrigger::ProductClick {
                    index: index as usize,
                })
            });
            product_clicks.push((card, listener));
        }

        let listeners = Listeners {
            escape,
            overlay_click,
            close_click,
            product_clicks,
        };

        add_listener(&self.document, "keydown", &listeners.escape)?;
        add_listener(&self.overlay, "click", &listeners.overlay_click)?;
        add_listener(&self.close_button, "click", &listeners.close_click)?;
        for (card, listener) in &listeners.product_clicks {
            add_listener(card, "click", listener)?;
        }

        *self.listeners.borrow_mut() = Some(listeners);
        Ok(())
    }

    fn detach_listeners(&self, listeners: &Listeners) -> Result<(), JsValue> {
        remove_listener(&self.document, "keydown", &listeners.escape)?;
        remove_listener(&self.overlay, "click", &listeners.overlay_click)?;
        remove_listener(&self.close_button, "click", &listeners.close_click)?;
        for (card, listener) in &listeners.product_clicks {
            remove_listener(card, "click", listener)?;
        }
        Ok(())
    }
}

fn add_listener(target: &EventTarget, event: &str, listener: &Listener) -> Result<(), JsValue> {
    target.add_event_listener_with_callback(event, listener.as_ref().unchecked_ref())
}

fn remove_listener(target: &EventTarget, event: &str, listener: &Listener) -> Result<(), JsValue> {
    target.remove_event_listener_with_callback(event, listener.as_ref().unchecked_ref())
}

/// Add the modal stylesheet to the document head, replacing an earlier one.
fn inject_styles(document: &Document, product_count: usize) -> Result<(), JsValue> {
    if let Some(existing) = document.get_element_by_id(STYLE_ELEMENT_ID) {
        existing.remove();
    }
    let head = document.head().ok_or_else(|| js_error("no head"))?;
    let style = document.create_element("style")?;
    style.set_id(STYLE_ELEMENT_ID);
    style.set_text_content(Some(&markup::render_styles(product_count)));
    head.append_child(&style)?;
    Ok(())
}

/// Render `config` and show it now.
///
/// A modal still open from an earlier call (a previous preview) is closed
/// first, so only one modal and one set of listeners exist at a time.
pub fn show(config: &PopupConfig, options: &MarkupOptions) -> Result<(), JsValue> {
    let previous = ACTIVE.with(|active| active.borrow_mut().take());
    if let Some(previous) = previous {
        previous.dismiss(DismissTrigger::CloseButton);
    }

    let modal = Modal::build(config, options)?;
    inject_styles(&modal.document, config.renderable_products().count())?;

    let effects = modal.session.borrow_mut().show();
    modal.apply(effects);

    ACTIVE.with(|active| *active.borrow_mut() = Some(modal));
    Ok(())
}

/// Show `config` once the document is ready plus `delay_ms`.
pub fn show_when_ready(config: PopupConfig, options: MarkupOptions, delay_ms: u32) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| js_error("no window"))?;
    let document = window.document().ok_or_else(|| js_error("no document"))?;

    let schedule = move || {
        let window = match web_sys::window() {
            Some(window) => window,
            None => return,
        };
        let callback = Closure::once_into_js(move || {
            if let Err(e) = show(&config, &options) {
                log::warn!("Failed to show popup: {}", describe(&e));
            }
        });
        if let Err(e) = window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay_ms as i32)
        {
            log::warn!("Failed to schedule popup: {}", describe(&e));
        }
    };

    if document.ready_state() == "loading" {
        let callback = Closure::once_into_js(schedule);
        document.add_event_listener_with_callback("DOMContentLoaded", callback.unchecked_ref())?;
    } else {
        schedule();
    }
    Ok(())
}
