use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{MapGenError, Result};

static PATTERN_STEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)pattern_(\d+)").unwrap());

/// Anything that sits on the map under a name at a world coordinate.
pub trait PoiSource {
    fn name(&self) -> &str;
    fn x(&self) -> f64;
    fn z(&self) -> f64;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Poi {
    pub name: String,
    pub x: f64,
    pub z: f64,
    pub alias_count: Option<u32>,
}

impl Poi {
    pub fn new(name: impl Into<String>, x: f64, z: f64) -> Self {
        Self {
            name: name.into(),
            x,
            z,
            alias_count: None,
        }
    }
}

impl PoiSource for Poi {
    fn name(&self) -> &str {
        &self.name
    }
    fn x(&self) -> f64 {
        self.x
    }
    fn z(&self) -> f64 {
        self.z
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawPoi {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    z: Option<f64>,
    #[serde(default)]
    pos: Option<RawPos>,
    #[serde(default, rename = "dupCount")]
    dup_count: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPos {
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    z: Option<f64>,
}

impl RawPoi {
    fn into_poi(self) -> Option<Poi> {
        let name = self.name.filter(|n| !n.trim().is_empty())?;
        let pos = self.pos.unwrap_or_default();
        Some(Poi {
            name,
            x: self.x.or(pos.x).unwrap_or(0.0),
            z: self.z.or(pos.z).unwrap_or(0.0),
            alias_count: self.dup_count,
        })
    }
}

/// A pre-projected terrain label site from an attach-point file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachPoint {
    #[serde(default)]
    pub px: f64,
    #[serde(default)]
    pub py: f64,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "i18nKey")]
    pub i18n_key: Option<String>,
}

impl AttachPoint {
    pub fn world(&self) -> Option<(f64, f64)> {
        Some((self.x?, self.z?))
    }

    pub fn pixel(&self) -> (i32, i32) {
        (self.px.round() as i32, self.py.round() as i32)
    }
}

/// Attach points are an array file; elements without numeric `px`/`py` or
/// otherwise malformed are skipped.
pub fn load_attach_points(path: &Path) -> Result<Vec<AttachPoint>> {
    let value = read_json(path)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter(|item| item.get("px").is_some_and(Value::is_number) && item.get("py").is_some_and(Value::is_number))
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

#[derive(Debug, Clone)]
pub struct PatternDoc {
    pub id: String,
    pub pois: Vec<Poi>,
}

pub fn load_pattern(path: &Path) -> Result<PatternDoc> {
    let value = read_json(path)?;
    let id = pattern_id(path, &value)?;
    let pois = match value.get("pois") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| serde_json::from_value::<RawPoi>(item.clone()).ok())
            .filter_map(RawPoi::into_poi)
            .collect(),
        _ => Vec::new(),
    };
    Ok(PatternDoc { id, pois })
}

/// `patternId` or `id` from the document, then `pattern_(\d+)` in the file
/// stem, then the stem itself. Numeric ids are zero-padded to three digits.
pub fn pattern_id(path: &Path, doc: &Value) -> Result<String> {
    for key in ["patternId", "id"] {
        if let Some(id) = doc.get(key).and_then(normalize_id) {
            return Ok(id);
        }
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MapGenError::PatternId(path.to_path_buf()))?;
    if let Some(caps) = PATTERN_STEM_RE.captures(stem) {
        return Ok(pad_id(&caps[1]));
    }
    Ok(stem.to_string())
}

fn normalize_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => {
            let n = n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64))?;
            Some(format!("{n:03}"))
        }
        Value::String(s) if !s.trim().is_empty() => Some(pad_id(s.trim())),
        _ => None,
    }
}

fn pad_id(raw: &str) -> String {
    match raw.parse::<i64>() {
        Ok(n) => format!("{n:03}"),
        Err(_) => raw.to_string(),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, rename = "i18nKey")]
    pub i18n_key: Option<String>,
}

impl IndexEntry {
    /// `i18nKey` when present, otherwise `poi.{id}`.
    pub fn localization_key(&self) -> Option<String> {
        if let Some(key) = self.i18n_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            return Some(key.to_string());
        }
        let id = self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
        Some(format!("poi.{id}"))
    }
}

/// Name-keyed POI metadata. Lookups trim the name and ignore case; when a
/// name appears twice the later entry wins. Iteration keeps file order.
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    entries: Vec<(String, IndexEntry)>,
    by_name: HashMap<String, usize>,
}

impl MetadataIndex {
    pub fn insert(&mut self, key: &str, entry: IndexEntry) {
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        let folded = key.to_lowercase();
        match self.by_name.get(&folded) {
            Some(&slot) => self.entries[slot] = (key.to_string(), entry),
            None => {
                self.by_name.insert(folded, self.entries.len());
                self.entries.push((key.to_string(), entry));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&IndexEntry> {
        let slot = self.by_name.get(&name.trim().to_lowercase())?;
        Some(&self.entries[*slot].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accepts `{ "entries": [..] }`, a bare array, or an object keyed by name.
    pub fn from_value(value: Value) -> Self {
        let mut index = Self::default();
        match value {
            Value::Object(mut map) if matches!(map.get("entries"), Some(Value::Array(_))) => {
                if let Some(Value::Array(items)) = map.remove("entries") {
                    index.extend_from_array(items);
                }
            }
            Value::Array(items) => index.extend_from_array(items),
            Value::Object(map) => {
                for (key, raw) in map {
                    if key.trim().eq_ignore_ascii_case("entries") {
                        continue;
                    }
                    let mut entry: IndexEntry = serde_json::from_value(raw).unwrap_or_default();
                    if entry.name.is_none() {
                        entry.name = Some(key.trim().to_string());
                    }
                    index.insert(&key, entry);
                }
            }
            _ => {}
        }
        index
    }

    fn extend_from_array(&mut self, items: Vec<Value>) {
        for item in items {
            let Ok(entry) = serde_json::from_value::<IndexEntry>(item) else {
                continue;
            };
            let Some(key) = entry.name.clone() else {
                continue;
            };
            self.insert(&key, entry);
        }
    }
}

pub fn load_index(path: &Path) -> Result<MetadataIndex> {
    let index = MetadataIndex::from_value(read_json(path)?);
    tracing::debug!(entries = index.len(), path = %path.display(), "loaded metadata index");
    Ok(index)
}

/// One row of `summary.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryPattern {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub nightlord: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub special: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub treasure: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub frenzy_tower: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub rot_blessing: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub spawn_point_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub special_event_key: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub special_event: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub extra_boss_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryRoot {
    #[serde(default)]
    patterns: Vec<Value>,
}

pub fn load_summary(path: &Path) -> Result<Vec<SummaryPattern>> {
    let value = read_json(path)?;
    let root: SummaryRoot = serde_json::from_value(value).map_err(|source| MapGenError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(root
        .patterns
        .into_iter()
        .filter_map(|row| serde_json::from_value(row).ok())
        .collect())
}

/// Summary row whose id matches `id`, ignoring case and zero padding.
pub fn find_pattern<'a>(rows: &'a [SummaryPattern], id: &str) -> Option<&'a SummaryPattern> {
    let wanted = pad_id(id.trim());
    rows.iter().find(|row| {
        row.id
            .as_deref()
            .map(|rid| pad_id(rid.trim()).eq_ignore_ascii_case(&wanted))
            .unwrap_or(false)
    })
}

pub fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| MapGenError::io(path, e))?;
    serde_json::from_str(strip_bom(&text)).map_err(|source| MapGenError::Json {
        path: PathBuf::from(path),
        source,
    })
}

pub(crate) fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// Strings and numbers both become `Some(String)`; anything else is `None`.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pattern_id_prefers_document_fields() {
        let path = Path::new("data/pattern/pattern_042.json");
        assert_eq!(pattern_id(path, &json!({"patternId": 7})).unwrap(), "007");
        assert_eq!(pattern_id(path, &json!({"id": "12"})).unwrap(), "012");
        assert_eq!(pattern_id(path, &json!({"id": "abc"})).unwrap(), "abc");
        assert_eq!(pattern_id(path, &json!({})).unwrap(), "042");
        assert_eq!(pattern_id(Path::new("custom.json"), &json!({})).unwrap(), "custom");
    }

    #[test]
    fn raw_pois_accept_nested_positions_and_drop_blank_names() {
        let raw: Vec<RawPoi> = serde_json::from_value(json!([
            {"name": "Camp - North", "x": 1.5, "z": -2.0, "dupCount": 2},
            {"name": "Fort - East", "pos": {"x": 10.0, "z": 20.0}},
            {"name": "   ", "x": 0.0, "z": 0.0},
        ]))
        .unwrap();
        let pois: Vec<Poi> = raw.into_iter().filter_map(RawPoi::into_poi).collect();
        assert_eq!(pois.len(), 2);
        assert_eq!(pois[0].alias_count, Some(2));
        assert_eq!((pois[1].x, pois[1].z), (10.0, 20.0));
    }

    #[test]
    fn index_accepts_three_shapes() {
        let wrapped = MetadataIndex::from_value(json!({
            "entries": [{"name": "Camp - North", "category": "Camp", "id": 101}]
        }));
        assert_eq!(wrapped.get("Camp - North").unwrap().id.as_deref(), Some("101"));

        let array = MetadataIndex::from_value(json!([
            {"name": " Fort - East ", "icon": "assets/fort.png"}
        ]));
        assert!(array.get("Fort - East").is_some());

        let map = MetadataIndex::from_value(json!({
            "Church - West": {"category": "Church", "i18nKey": "poi.church_west"}
        }));
        let entry = map.get("church - west").unwrap();
        assert_eq!(entry.name.as_deref(), Some("Church - West"));
        assert_eq!(entry.localization_key().as_deref(), Some("poi.church_west"));
    }

    #[test]
    fn later_index_entries_overwrite_earlier() {
        let index = MetadataIndex::from_value(json!([
            {"name": "Ruins - A", "icon": "first.png"},
            {"name": "Ruins - B"},
            {"name": "Ruins - A", "icon": "second.png"}
        ]));
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("Ruins - A").unwrap().icon.as_deref(), Some("second.png"));
        let names: Vec<&str> = index.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["Ruins - A", "Ruins - B"]);
    }

    #[test]
    fn localization_key_falls_back_to_id() {
        let entry = IndexEntry {
            id: Some("77".to_string()),
            ..IndexEntry::default()
        };
        assert_eq!(entry.localization_key().as_deref(), Some("poi.77"));
        assert_eq!(IndexEntry::default().localization_key(), None);
    }

    #[test]
    fn summary_rows_match_case_insensitively() {
        let rows: Vec<SummaryPattern> = serde_json::from_value(json!([
            {"id": "007", "nightlord": 3, "special": "1"},
            {"id": "ABC", "special": 0}
        ]))
        .unwrap();
        let hit = find_pattern(&rows, "7").unwrap();
        assert_eq!(hit.nightlord.as_deref(), Some("3"));
        assert_eq!(find_pattern(&rows, "abc").unwrap().special.as_deref(), Some("0"));
        assert!(find_pattern(&rows, "008").is_none());
    }
}
