//! Internationalization module
//!
//! Bot messages are looked up by dotted key in per-language JSON files.

pub mod loader;

pub use loader::{I18n, TranslationParams, TRANSLATIONS_DIR};
