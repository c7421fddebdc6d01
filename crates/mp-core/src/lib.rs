//! MagicPop Core Library
//!
//! This crate decides which promotional popup, if any, to show on a page
//! view, and tracks when each popup was last shown.
//!
//! # Architecture
//!
//! The engine receives an ordered configuration snapshot plus everything it
//! needs to know about the page view (location, viewport width, current
//! time, display state) as explicit arguments. It never reads globals, so
//! the same code runs in the browser, in the CLI and in tests.
//!
//! # Modules
//!
//! - `types`: Popup and product definitions
//! - `url`: Path / full-URL derivation for the current location
//! - `rules`: Page-rule (glob) matcher
//! - `storage`: Key-value store abstraction and display state
//! - `selector`: Selection and re-display frequency engine
//! - `modal`: Modal lifecycle state machine
//! - `markup`: Modal HTML and stylesheet rendering

pub mod types;
pub mod url;
pub mod rules;
pub mod storage;
pub mod selector;
pub mod modal;
pub mod markup;

// Re-export commonly used types
pub use types::{PopupConfig, Product, Timestamp, MOBILE_MAX_WIDTH};
pub use url::Location;
pub use rules::{PageRule, PageRules, RuleError};
pub use storage::{DisplayState, KeyValueStore, LastShown, MemoryStore, StorageError};
pub use selector::{select_popup, EvalContext, Selector, SkipReason};
pub use modal::{DismissTrigger, ModalEffect, ModalPhase, ModalSession};
pub use markup::{render_modal, render_styles, MarkupOptions};
