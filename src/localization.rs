use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::classify::split_type_detail;
use crate::model::{MetadataIndex, read_json};

pub const POI_TABLE: &str = "poi.json";
pub const SPECIAL_EVENT_TABLE: &str = "special_event.json";

type Table = Arc<HashMap<String, String>>;

/// Language string tables under `{i18n}/{lang}/{file}`, each read at most
/// once per session. A missing or unreadable table is an empty one.
pub struct StringTables {
    root: PathBuf,
    tables: Mutex<HashMap<(String, String), Table>>,
}

impl StringTables {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn table(&self, lang: &str, file: &str) -> Table {
        let lang = lang.trim();
        let key = (lang.to_lowercase(), file.to_string());
        if let Some(hit) = self.tables.lock().ok().and_then(|map| map.get(&key).cloned()) {
            return hit;
        }
        let path = self.root.join(lang).join(file);
        let table: Table = match read_json(&path) {
            Ok(Value::Object(map)) => Arc::new(
                map.into_iter()
                    .filter_map(|(k, v)| match v {
                        Value::String(s) => Some((k, s)),
                        _ => None,
                    })
                    .collect(),
            ),
            Ok(_) => Arc::default(),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "string table unavailable");
                Arc::default()
            }
        };
        match self.tables.lock() {
            Ok(mut map) => map.entry(key).or_insert(table).clone(),
            Err(_) => table,
        }
    }

    pub fn lookup(&self, lang: &str, file: &str, key: &str) -> Option<String> {
        self.table(lang, file)
            .get(key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    /// Like [`lookup`](Self::lookup) but ignoring key case.
    pub fn lookup_ignore_case(&self, lang: &str, file: &str, key: &str) -> Option<String> {
        let table = self.table(lang, file);
        if let Some(v) = table.get(key).filter(|v| !v.trim().is_empty()) {
            return Some(v.clone());
        }
        table
            .iter()
            .find(|(k, v)| k.eq_ignore_ascii_case(key) && !v.trim().is_empty())
            .map(|(_, v)| v.clone())
    }

    /// First key whose value equals `value`, ignoring case.
    pub fn key_for_value(&self, lang: &str, file: &str, value: &str) -> Option<String> {
        let value = value.trim();
        self.table(lang, file)
            .iter()
            .find(|(_, v)| v.trim().eq_ignore_ascii_case(value))
            .map(|(k, _)| k.clone())
    }

    pub fn clear(&self) {
        if let Ok(mut map) = self.tables.lock() {
            map.clear();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedText {
    pub text: String,
    pub localized: bool,
}

/// Display text for POI names through the metadata index and the `poi.json` tables.
pub struct LabelTextResolver<'a> {
    index: &'a MetadataIndex,
    strings: &'a StringTables,
    lang: &'a str,
    default_lang: &'a str,
}

impl<'a> LabelTextResolver<'a> {
    pub fn new(
        index: &'a MetadataIndex,
        strings: &'a StringTables,
        lang: &'a str,
        default_lang: &'a str,
    ) -> Self {
        Self {
            index,
            strings,
            lang,
            default_lang,
        }
    }

    pub fn resolve(&self, raw: &str) -> ResolvedText {
        if raw.trim().is_empty() {
            return ResolvedText {
                text: String::new(),
                localized: false,
            };
        }
        if let Some(text) = self.localization_key(raw).and_then(|key| self.lookup_key(&key)) {
            return ResolvedText {
                text,
                localized: true,
            };
        }
        ResolvedText {
            text: strip_type_prefix(raw).to_string(),
            localized: false,
        }
    }

    /// Look `key` up in the active language, then the default one.
    pub fn lookup_key(&self, key: &str) -> Option<String> {
        self.strings
            .lookup(self.lang, POI_TABLE, key)
            .or_else(|| self.strings.lookup(self.default_lang, POI_TABLE, key))
    }

    fn localization_key(&self, raw: &str) -> Option<String> {
        if let Some(key) = self.index.get(raw).and_then(|e| e.localization_key()) {
            return Some(key);
        }
        if let Some((_, detail)) = split_type_detail(raw)
            && let Some(key) = self.index.get(detail).and_then(|e| e.localization_key())
        {
            return Some(key);
        }
        self.index
            .iter()
            .filter(|(_, entry)| entry.name.as_deref() == Some(raw))
            .find_map(|(_, entry)| entry.localization_key())
    }
}

/// `"Type - Detail"` → `"Detail"`; other names unchanged.
pub fn strip_type_prefix(raw: &str) -> &str {
    match split_type_detail(raw) {
        Some((_, detail)) => detail,
        None => raw,
    }
}
