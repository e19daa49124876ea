//! Shipped translation files

use std::collections::BTreeSet;
use std::path::Path;
use cbx_rentals::config::I18nConfig;
use cbx_rentals::i18n::{I18n, TRANSLATIONS_DIR};

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut BTreeSet<String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() { key.clone() } else { format!("{}.{}", prefix, key) };
                flatten(&path, child, out);
            }
        }
        _ => {
            out.insert(prefix.to_string());
        }
    }
}

fn keys(lang: &str) -> BTreeSet<String> {
    let path = Path::new(TRANSLATIONS_DIR).join(format!("{}.json", lang));
    let content = std::fs::read_to_string(&path).expect("translation file readable");
    let value: serde_json::Value = serde_json::from_str(&content).expect("translation file is JSON");
    let mut out = BTreeSet::new();
    flatten("", &value, &mut out);
    out
}

#[test]
fn test_languages_share_keys() {
    let en = keys("en");
    let es = keys("es");
    assert_eq!(en.difference(&es).collect::<Vec<_>>(), Vec::<&String>::new());
    assert_eq!(es.difference(&en).collect::<Vec<_>>(), Vec::<&String>::new());
}

#[tokio::test]
async fn test_load_and_translate_with_params() {
    let config = I18nConfig {
        default_language: "en".to_string(),
        supported_languages: vec!["en".to_string(), "es".to_string()],
    };
    let mut i18n = I18n::new(&config);
    i18n.load_from_dir(Path::new(TRANSLATIONS_DIR)).await.unwrap();

    let text = i18n.t_with("auth.login_success", "es", &[("name", "Ana".to_string())]);
    assert!(text.contains("Ana"));
    assert!(!text.contains("{name}"));

    assert_eq!(i18n.tp("events.interested", "en", 1, None), "1 person interested");
    assert!(i18n.has_key("errors.flow_expired", "es"));
    assert!(i18n.t("help.admin", "en", None).contains("/markpaid"));
}
