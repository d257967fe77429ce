use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::classify::Group;
use crate::model::strip_bom;
use crate::overrides::PlacementConfig;
use crate::style::{LabelStyleMap, TextConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SizeBox {
    pub width_px: u32,
    pub height_px: u32,
}

impl SizeBox {
    pub const fn new(width_px: u32, height_px: u32) -> Self {
        Self { width_px, height_px }
    }
}

/// Placement of an emblem anchored to a canvas corner.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IconSettings {
    pub width_percent: f64,
    pub anchor: String,
    pub margin_x: i32,
    pub margin_y: i32,
    pub max_width_px: Option<u32>,
    pub max_height_px: Option<u32>,
    pub fixed_width_px: Option<u32>,
    pub fixed_height_px: Option<u32>,
    pub preserve_aspect: bool,
    pub fit_inside_box: bool,
}

impl Default for IconSettings {
    fn default() -> Self {
        Self {
            width_percent: 0.18,
            anchor: "bottom-left".to_string(),
            margin_x: 0,
            margin_y: 0,
            max_width_px: None,
            max_height_px: None,
            fixed_width_px: Some(356),
            fixed_height_px: Some(356),
            preserve_aspect: true,
            fit_inside_box: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SpecialEventSettings {
    pub bottom_margin_px: i32,
}

impl Default for SpecialEventSettings {
    fn default() -> Self {
        Self { bottom_margin_px: 24 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BottomMargins {
    pub icon_only: i32,
    pub icon_and_banner: i32,
}

impl Default for BottomMargins {
    fn default() -> Self {
        Self {
            icon_only: 28,
            icon_and_banner: 36,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IconBox {
    pub width: u32,
    pub height: u32,
}

impl Default for IconBox {
    fn default() -> Self {
        Self {
            width: 172,
            height: 70,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SpecialEventIconSettings {
    pub folder: String,
    pub bottom_margins: BottomMargins,
    #[serde(alias = "Box")]
    pub icon_box: IconBox,
}

impl Default for SpecialEventIconSettings {
    fn default() -> Self {
        Self {
            folder: "../assets/misc".to_string(),
            bottom_margins: BottomMargins::default(),
            icon_box: IconBox::default(),
        }
    }
}

/// Raw path and scalar settings, before resolution against the config directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct PathSettings {
    background_path: Option<String>,
    output_folder: Option<String>,
    summary_path: Option<String>,
    index_path: Option<String>,
    nightlord_folder: Option<String>,
    map_raw_folder: Option<String>,
    treasure_folder: Option<String>,
    assets_folder: Option<String>,
    attach_points_folder: Option<String>,
    i18n_folder: Option<String>,
    i18n_lang: Option<String>,
    i18n_default_lang: Option<String>,
    verbose: bool,
}

/// Everything read from `appsettings.json`. Relative paths are already
/// resolved against the directory the config file lives in.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_dir: PathBuf,
    pub background_path: PathBuf,
    pub summary_path: PathBuf,
    pub output_folder: PathBuf,
    pub index_path: PathBuf,
    pub nightlord_folder: Option<PathBuf>,
    pub map_raw_folder: Option<PathBuf>,
    pub treasure_folder: Option<PathBuf>,
    pub assets_folder: PathBuf,
    pub attach_points_folder: PathBuf,
    pub i18n_folder: PathBuf,
    pub i18n_lang: String,
    pub i18n_default_lang: String,
    pub verbose: bool,
    pub nightlord_icon: IconSettings,
    pub icon_overrides: HashMap<String, String>,
    pub icon_boxes: HashMap<Group, HashMap<String, SizeBox>>,
    pub text: TextConfig,
    pub label_styles: LabelStyleMap,
    pub placement: PlacementConfig,
    pub special_event: SpecialEventSettings,
    pub special_event_icon: SpecialEventIconSettings,
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("config file not found: {}", path.display()))?;
    let root: Value = json5::from_str(strip_bom(&contents))
        .with_context(|| format!("config file {} is not valid JSON", path.display()))?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."));
    AppConfig::from_value(&root, &base_dir)
}

impl AppConfig {
    /// Build the typed config from a parsed document. Only the two required
    /// paths can fail; every other section falls back to its defaults.
    pub fn from_value(root: &Value, base_dir: &Path) -> anyhow::Result<Self> {
        let paths: PathSettings = section(root, None);
        let resolve = |raw: &str| resolve_path(base_dir, raw);
        let required = |value: &Option<String>, key: &str| -> anyhow::Result<PathBuf> {
            match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                Some(v) => Ok(resolve(v)),
                None => anyhow::bail!("{key} missing from config"),
            }
        };
        let optional = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(resolve)
        };
        let or_default = |value: &Option<String>, default: &str| {
            optional(value).unwrap_or_else(|| resolve(default))
        };

        let mut icon_boxes = HashMap::new();
        for group in Group::ALL {
            icon_boxes.insert(group, size_boxes(root, group));
        }

        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            background_path: required(&paths.background_path, "BackgroundPath")?,
            summary_path: required(&paths.summary_path, "SummaryPath")?,
            output_folder: or_default(&paths.output_folder, "output"),
            index_path: or_default(&paths.index_path, "../data/index.json"),
            nightlord_folder: optional(&paths.nightlord_folder),
            map_raw_folder: optional(&paths.map_raw_folder),
            treasure_folder: optional(&paths.treasure_folder),
            assets_folder: or_default(&paths.assets_folder, "../assets/map"),
            attach_points_folder: or_default(
                &paths.attach_points_folder,
                "../data/param/attach_points",
            ),
            i18n_folder: or_default(&paths.i18n_folder, "../i18n"),
            i18n_lang: non_empty(paths.i18n_lang).unwrap_or_else(|| "en".to_string()),
            i18n_default_lang: non_empty(paths.i18n_default_lang)
                .unwrap_or_else(|| "en".to_string()),
            verbose: paths.verbose,
            nightlord_icon: section(root, Some("NightlordIcon")),
            icon_overrides: section(root, Some("IconOverrides")),
            icon_boxes,
            text: section(root, Some("Text")),
            label_styles: section(root, Some("LabelStyles")),
            placement: PlacementConfig::from_root(root),
            special_event: section(root, Some("SpecialEvent")),
            special_event_icon: section(root, Some("SpecialEventIcon")),
        })
    }

    pub fn size_box(&self, group: Group, subtype: &str) -> Option<SizeBox> {
        self.icon_boxes.get(&group)?.get(subtype).copied()
    }

    pub fn resolve(&self, raw: &str) -> PathBuf {
        resolve_path(&self.base_dir, raw)
    }
}

pub fn resolve_path(base_dir: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Deserialize `root[key]` (or the whole root), logging and falling back to
/// the default when the section does not have the expected shape.
fn section<T: DeserializeOwned + Default>(root: &Value, key: Option<&str>) -> T {
    let value = match key {
        Some(key) => match root.get(key) {
            Some(Value::Null) | None => return T::default(),
            Some(value) => value,
        },
        None => root,
    };
    match T::deserialize(value) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(
                section = key.unwrap_or("<root>"),
                error = %err,
                "ignoring malformed config section"
            );
            T::default()
        }
    }
}

fn size_boxes(root: &Value, group: Group) -> HashMap<String, SizeBox> {
    let mut boxes = HashMap::new();
    let Some(Value::Object(entries)) = root.get(group.config_key()) else {
        return boxes;
    };
    for (subtype, raw) in entries {
        match SizeBox::deserialize(raw) {
            Ok(size) if size.width_px > 0 && size.height_px > 0 => {
                boxes.insert(subtype.clone(), size);
            }
            _ => tracing::warn!(
                entry = %format!("{group}.{subtype}"),
                "ignoring malformed size box"
            ),
        }
    }
    boxes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_json_with_comments_and_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appsettings.json");
        std::fs::write(
            &path,
            r##"{
                // base art
                "BackgroundPath": "../assets/map/background.png",
                "SummaryPath": "/abs/summary.json",
                "Verbose": true,
                "MajorBase": { "Camp": { "WidthPx": 200, "HeightPx": 200 } },
                "Text": { "FontPath": "fonts/a.ttf", "Styles": { "poiStandard": { "FontSizePx": 18 } } },
            }"##,
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.background_path, dir.path().join("../assets/map/background.png"));
        assert_eq!(cfg.summary_path, PathBuf::from("/abs/summary.json"));
        assert_eq!(cfg.output_folder, dir.path().join("output"));
        assert_eq!(cfg.i18n_folder, dir.path().join("../i18n"));
        assert_eq!(cfg.i18n_lang, "en");
        assert!(cfg.verbose);
        assert_eq!(cfg.size_box(Group::MajorBase, "Camp"), Some(SizeBox::new(200, 200)));
        assert_eq!(cfg.text.styles["poiStandard"].font_size_px, Some(18.0));
    }

    #[test]
    fn missing_required_paths_fail() {
        let err = AppConfig::from_value(&json!({ "SummaryPath": "s.json" }), Path::new("."))
            .unwrap_err();
        assert!(err.to_string().contains("BackgroundPath"));
    }

    #[test]
    fn malformed_sections_fall_back_to_defaults() {
        let cfg = AppConfig::from_value(
            &json!({
                "BackgroundPath": "bg.png",
                "SummaryPath": "s.json",
                "NightlordIcon": "not an object",
                "SpecialEventIcon": { "BottomMargins": { "IconOnly": 10 } },
                "Evergaol": { "Default": { "WidthPx": "wide" }, "Other": { "WidthPx": 40, "HeightPx": 30 } }
            }),
            Path::new("cfg"),
        )
        .unwrap();
        assert_eq!(cfg.nightlord_icon, IconSettings::default());
        assert_eq!(cfg.special_event_icon.bottom_margins.icon_only, 10);
        assert_eq!(cfg.special_event_icon.bottom_margins.icon_and_banner, 36);
        assert_eq!(cfg.special_event_icon.icon_box, IconBox::default());
        assert_eq!(cfg.size_box(Group::Evergaol, "Default"), None);
        assert_eq!(cfg.size_box(Group::Evergaol, "Other"), Some(SizeBox::new(40, 30)));
        assert_eq!(cfg.special_event.bottom_margin_px, 24);
    }
}
