use std::collections::HashMap;

use serde::Deserialize;
use tiny_skia::ColorU8;

use crate::classify::Group;

/// Style every lookup ends on when nothing more specific exists.
pub const STANDARD_STYLE: &str = "poiStandard";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlowStyle {
    pub color: ColorU8,
    pub opacity_percent: f32,
    /// Dilation iterations.
    pub widen_radius: u32,
    /// Gaussian sigma.
    pub blur_radius: f32,
    pub offset_x: i32,
    pub offset_y: i32,
}

impl Default for GlowStyle {
    fn default() -> Self {
        Self {
            color: ColorU8::from_rgba(0, 0, 0, 255),
            opacity_percent: 100.0,
            widen_radius: 3,
            blur_radius: 5.0,
            offset_x: 0,
            offset_y: 0,
        }
    }
}

impl GlowStyle {
    pub fn is_visible(&self) -> bool {
        self.opacity_percent > 0.0 && self.color.alpha() > 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Font file reference, relative to the config directory.
    pub font_path: String,
    pub size_px: f32,
    pub fill: ColorU8,
    pub glow: Option<GlowStyle>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_path: String::new(),
            size_px: 24.0,
            fill: ColorU8::from_rgba(255, 255, 255, 255),
            glow: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GlowConfig {
    pub color: Option<String>,
    pub opacity_percent: Option<f32>,
    #[serde(alias = "WidenRadius")]
    pub widening_radius: Option<u32>,
    pub blur_radius: Option<f32>,
    pub offset_x: Option<i32>,
    pub offset_y: Option<i32>,
}

impl GlowConfig {
    /// Fields missing from a configured glow read as zero, except opacity
    /// (100%) and color (black).
    pub fn to_style(&self) -> GlowStyle {
        GlowStyle {
            color: self
                .color
                .as_deref()
                .and_then(parse_hex_color)
                .unwrap_or(ColorU8::from_rgba(0, 0, 0, 255)),
            opacity_percent: self.opacity_percent.unwrap_or(100.0).clamp(0.0, 100.0),
            widen_radius: self.widening_radius.unwrap_or(0),
            blur_radius: self.blur_radius.unwrap_or(0.0).max(0.0),
            offset_x: self.offset_x.unwrap_or(0),
            offset_y: self.offset_y.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StyleConfig {
    pub font_path: Option<String>,
    pub font_size_px: Option<f32>,
    pub fill: Option<String>,
    pub glow: Option<GlowConfig>,
}

/// The `Text` section: base font settings plus named styles.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TextConfig {
    pub font_path: Option<String>,
    pub font_size_px: Option<f32>,
    pub fill: Option<String>,
    pub glow: Option<GlowConfig>,
    pub styles: HashMap<String, StyleConfig>,
}

/// `LabelStyles.<Group>.<Subtype>` → style name.
pub type LabelStyleMap = HashMap<String, HashMap<String, String>>;

/// `#RRGGBB` or `#RRGGBBAA`, leading `#` optional.
pub fn parse_hex_color(raw: &str) -> Option<ColorU8> {
    let hex = raw.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        6 => Some(ColorU8::from_rgba(byte(0)?, byte(2)?, byte(4)?, 255)),
        8 => Some(ColorU8::from_rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

pub struct StyleResolver<'a> {
    text: &'a TextConfig,
    label_styles: &'a LabelStyleMap,
}

impl<'a> StyleResolver<'a> {
    pub fn new(text: &'a TextConfig, label_styles: &'a LabelStyleMap) -> Self {
        Self { text, label_styles }
    }

    fn base(&self) -> TextStyle {
        let mut style = TextStyle::default();
        if let Some(path) = self.text.font_path.as_deref().filter(|p| !p.trim().is_empty()) {
            style.font_path = path.to_string();
        }
        if let Some(size) = self.text.font_size_px.filter(|s| *s > 0.0) {
            style.size_px = size;
        }
        if let Some(fill) = self.text.fill.as_deref().and_then(parse_hex_color) {
            style.fill = fill;
        }
        style.glow = self.text.glow.as_ref().map(GlowConfig::to_style);
        style
    }

    /// Text defaults merged with the first named style that exists among
    /// `name`, `fallbacks` and finally `poiStandard`.
    pub fn resolve(&self, name: &str, fallbacks: &[&str]) -> TextStyle {
        let mut style = self.base();
        let chosen = std::iter::once(name)
            .chain(fallbacks.iter().copied())
            .chain(std::iter::once(STANDARD_STYLE))
            .filter(|n| !n.trim().is_empty())
            .find_map(|n| self.text.styles.get(n));
        if let Some(named) = chosen {
            merge(&mut style, named);
        }
        style
    }

    /// Style name configured for a group/subtype pair, if any.
    pub fn label_style_name(&self, group: Group, subtype: &str) -> Option<&'a str> {
        self.label_styles
            .get(group.config_key())?
            .get(subtype)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn for_label(&self, group: Group, subtype: &str, default_style: &str) -> TextStyle {
        match self.label_style_name(group, subtype) {
            Some(name) => self.resolve(name, &[default_style]),
            None => self.resolve(default_style, &[]),
        }
    }

    pub fn has_style(&self, name: &str) -> bool {
        self.text.styles.contains_key(name)
    }
}

fn merge(style: &mut TextStyle, named: &StyleConfig) {
    if let Some(path) = named.font_path.as_deref().filter(|p| !p.trim().is_empty()) {
        style.font_path = path.to_string();
    }
    if let Some(size) = named.font_size_px.filter(|s| *s > 0.0) {
        style.size_px = size;
    }
    if let Some(fill) = named.fill.as_deref().and_then(parse_hex_color) {
        style.fill = fill;
    }
    if let Some(glow) = &named.glow {
        style.glow = Some(glow.to_style());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_config() -> TextConfig {
        serde_json::from_value(serde_json::json!({
            "FontPath": "fonts/base.ttf",
            "FontSizePx": 20,
            "Fill": "#FFFFFF",
            "Styles": {
                "poiStandard": { "FontSizePx": 22 },
                "poiNightBoss": {
                    "Fill": "#FF000080",
                    "Glow": { "Color": "#101010", "BlurRadius": 2.5, "WideningRadius": 1 }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_hex_color("#FF8000"), Some(ColorU8::from_rgba(255, 128, 0, 255)));
        assert_eq!(parse_hex_color("00ff0080"), Some(ColorU8::from_rgba(0, 255, 0, 128)));
        assert_eq!(parse_hex_color("#FFF"), None);
        assert_eq!(parse_hex_color("#GG0000"), None);
    }

    #[test]
    fn named_style_overrides_only_present_fields() {
        let text = text_config();
        let labels = LabelStyleMap::new();
        let style = StyleResolver::new(&text, &labels).resolve("poiNightBoss", &[]);
        assert_eq!(style.font_path, "fonts/base.ttf");
        assert_eq!(style.size_px, 20.0);
        assert_eq!(style.fill, ColorU8::from_rgba(255, 0, 0, 128));
        let glow = style.glow.unwrap();
        assert_eq!(glow.widen_radius, 1);
        assert_eq!(glow.blur_radius, 2.5);
        assert_eq!(glow.opacity_percent, 100.0);
    }

    #[test]
    fn unknown_style_falls_back_to_standard() {
        let text = text_config();
        let labels = LabelStyleMap::new();
        let style = StyleResolver::new(&text, &labels).resolve("poiMissing", &["alsoMissing"]);
        assert_eq!(style.size_px, 22.0);
        assert!(style.glow.is_none());
    }

    #[test]
    fn label_styles_map_group_and_subtype() {
        let text = text_config();
        let mut labels = LabelStyleMap::new();
        labels.insert(
            "FieldBoss".to_string(),
            HashMap::from([("Castle".to_string(), "poiNightBoss".to_string())]),
        );
        let resolver = StyleResolver::new(&text, &labels);
        assert_eq!(resolver.label_style_name(Group::FieldBoss, "Castle"), Some("poiNightBoss"));
        let castle = resolver.for_label(Group::FieldBoss, "Castle", STANDARD_STYLE);
        assert!(castle.glow.is_some());
        let arena = resolver.for_label(Group::FieldBoss, "Arena_Boss", STANDARD_STYLE);
        assert_eq!(arena.size_px, 22.0);
    }
}
