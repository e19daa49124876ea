//! Translation loading and lookup
//!
//! Translations are JSON files named `<lang>.json`. Keys are dotted paths into
//! nested objects and `{name}` placeholders are substituted from parameters.

use std::collections::HashMap;
use std::path::Path;
use serde_json::{Map, Value};
use tokio::fs;
use tracing::{debug, info, warn};
use crate::config::I18nConfig;
use crate::utils::errors::{CbxError, Result};

pub const TRANSLATIONS_DIR: &str = "translations";

#[derive(Debug, Clone)]
pub struct I18n {
    translations: HashMap<String, Map<String, Value>>,
    default_language: String,
    supported_languages: Vec<String>,
}

pub type TranslationParams = HashMap<String, String>;

impl I18n {
    pub fn new(config: &I18nConfig) -> Self {
        Self {
            translations: HashMap::new(),
            default_language: config.default_language.clone(),
            supported_languages: config.supported_languages.clone(),
        }
    }

    pub async fn load_translations(&mut self) -> Result<()> {
        self.load_from_dir(Path::new(TRANSLATIONS_DIR)).await
    }

    /// Load every supported language found in `dir`. Only the default
    /// language is mandatory.
    pub async fn load_from_dir(&mut self, dir: &Path) -> Result<()> {
        for lang in self.supported_languages.clone() {
            let path = dir.join(format!("{}.json", lang));
            if !path.exists() {
                if lang == self.default_language {
                    return Err(CbxError::Config(format!(
                        "Default language translation file not found: {}",
                        path.display()
                    )));
                }
                warn!(path = %path.display(), "Translation file not found");
                continue;
            }

            let content = fs::read_to_string(&path).await?;
            match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => {
                    self.insert_language(&lang, map);
                    info!(language = %lang, "Loaded translations");
                }
                _ => {
                    return Err(CbxError::Config(format!(
                        "Translation file {} must contain a JSON object",
                        path.display()
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn insert_language(&mut self, lang: &str, translations: Map<String, Value>) {
        debug!(language = lang, keys = count_keys(&translations), "Registering translations");
        self.translations.insert(lang.to_string(), translations);
    }

    /// Translate `key`, falling back to the default language and finally to
    /// the key itself
    pub fn t(&self, key: &str, lang: &str, params: Option<&TranslationParams>) -> String {
        let lang = self.effective_language(lang);
        let found = self
            .lookup(key, lang)
            .or_else(|| self.lookup(key, &self.default_language));

        match found {
            Some(text) => format_message(&text, params),
            None => {
                warn!(key, language = lang, "Translation key not found");
                key.to_string()
            }
        }
    }

    /// Translate with `{name}` parameters given as pairs
    pub fn t_with(&self, key: &str, lang: &str, pairs: &[(&str, String)]) -> String {
        let params: TranslationParams = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.t(key, lang, Some(&params))
    }

    /// Whether `key` resolves in the language or the default language
    pub fn has_key(&self, key: &str, lang: &str) -> bool {
        let lang = self.effective_language(lang);
        self.lookup(key, lang).is_some() || self.lookup(key, &self.default_language).is_some()
    }

    /// Pick `one` or `other` under `key` and substitute `{count}`
    pub fn tp(&self, key: &str, lang: &str, count: i64, params: Option<&TranslationParams>) -> String {
        let form = if count == 1 { "one" } else { "other" };
        let mut params = params.cloned().unwrap_or_default();
        params.insert("count".to_string(), count.to_string());
        self.t(&format!("{}.{}", key, form), lang, Some(&params))
    }

    pub fn is_language_supported(&self, lang: &str) -> bool {
        self.supported_languages.iter().any(|l| l == lang)
    }

    /// Map a Telegram `language_code` such as `es-MX` to a supported language
    pub fn detect_user_language(&self, telegram_lang: Option<&str>) -> String {
        telegram_lang
            .and_then(|lang| lang.split(['-', '_']).next())
            .map(str::to_lowercase)
            .filter(|code| self.is_language_supported(code))
            .unwrap_or_else(|| self.default_language.clone())
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn supported_languages(&self) -> &[String] {
        &self.supported_languages
    }

    fn effective_language<'a>(&'a self, lang: &'a str) -> &'a str {
        if self.translations.contains_key(lang) {
            lang
        } else {
            &self.default_language
        }
    }

    fn lookup(&self, key: &str, lang: &str) -> Option<String> {
        let mut current = self.translations.get(lang)?.get(key.split('.').next()?)?;
        for part in key.split('.').skip(1) {
            current = current.get(part)?;
        }

        match current {
            Value::String(s) => Some(s.clone()),
            Value::Array(lines) => Some(
                lines
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => None,
        }
    }
}

fn format_message(template: &str, params: Option<&TranslationParams>) -> String {
    let Some(params) = params else {
        return template.to_string();
    };

    params.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{}}}", key), value)
    })
}

fn count_keys(map: &Map<String, Value>) -> usize {
    map.values()
        .map(|value| match value {
            Value::Object(nested) => count_keys(nested),
            _ => 1,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn i18n() -> I18n {
        let mut i18n = I18n::new(&I18nConfig {
            default_language: "en".to_string(),
            supported_languages: vec!["en".to_string(), "es".to_string()],
        });
        let en = json!({
            "start": { "welcome": "Welcome, {name}!" },
            "errors": { "generic": "Something went wrong" },
            "help": ["Line one", "Line two"],
            "events": { "interested": { "one": "{count} person interested", "other": "{count} people interested" } }
        });
        let es = json!({ "start": { "welcome": "¡Bienvenido, {name}!" } });
        i18n.insert_language("en", en.as_object().cloned().unwrap_or_default());
        i18n.insert_language("es", es.as_object().cloned().unwrap_or_default());
        i18n
    }

    #[test]
    fn test_translation_with_params() {
        let i18n = i18n();
        assert_eq!(i18n.t_with("start.welcome", "es", &[("name", "Ana".to_string())]), "¡Bienvenido, Ana!");
        assert_eq!(i18n.t_with("start.welcome", "en", &[("name", "Ana".to_string())]), "Welcome, Ana!");
    }

    #[test]
    fn test_fallback_to_default_language() {
        let i18n = i18n();
        assert_eq!(i18n.t("errors.generic", "es", None), "Something went wrong");
        assert_eq!(i18n.t("errors.generic", "fr", None), "Something went wrong");
        assert!(i18n.has_key("errors.generic", "es"));
    }

    #[test]
    fn test_missing_key_returns_key() {
        let i18n = i18n();
        assert_eq!(i18n.t("nope.missing", "en", None), "nope.missing");
        assert!(!i18n.has_key("nope.missing", "en"));
        // A node with children is not a message
        assert!(!i18n.has_key("start", "en"));
    }

    #[test]
    fn test_array_values_join_lines() {
        assert_eq!(i18n().t("help", "en", None), "Line one\nLine two");
    }

    #[test]
    fn test_plural_forms() {
        let i18n = i18n();
        assert_eq!(i18n.tp("events.interested", "en", 1, None), "1 person interested");
        assert_eq!(i18n.tp("events.interested", "en", 3, None), "3 people interested");
    }

    #[test]
    fn test_language_detection() {
        let i18n = i18n();
        assert_eq!(i18n.detect_user_language(Some("es-MX")), "es");
        assert_eq!(i18n.detect_user_language(Some("EN")), "en");
        assert_eq!(i18n.detect_user_language(Some("fr")), "en");
        assert_eq!(i18n.detect_user_language(None), "en");
    }

    #[tokio::test]
    async fn test_load_from_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("en.json"), r#"{"start":{"hello":"Hi"}}"#).expect("write en");

        let mut i18n = I18n::new(&I18nConfig {
            default_language: "en".to_string(),
            supported_languages: vec!["en".to_string(), "es".to_string()],
        });
        i18n.load_from_dir(dir.path()).await.expect("load");
        assert_eq!(i18n.t("start.hello", "es", None), "Hi");
    }

    #[tokio::test]
    async fn test_missing_default_language_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut i18n = I18n::new(&I18nConfig {
            default_language: "en".to_string(),
            supported_languages: vec!["en".to_string()],
        });
        assert!(i18n.load_from_dir(dir.path()).await.is_err());
    }
}
