use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tiny_skia::{PathBuilder, Rect};
use ttf_parser::{Face, GlyphId, OutlineBuilder};

use crate::config::resolve_path;

/// Advance used for characters a face has no glyph for, as a fraction of the size.
const FALLBACK_ADVANCE: f32 = 0.56;
const FALLBACK_ASCENT: f32 = 0.8;
const FALLBACK_DESCENT: f32 = 0.2;

static SYSTEM_SANS: Lazy<Option<Arc<FontFace>>> = Lazy::new(load_system_sans);

/// Font faces by configured font reference, resolved once per session.
///
/// Resolution order: the referenced file (relative to the config directory),
/// then a system sans-serif face found through `fontdb`, then built-in
/// placeholder metrics. Falling back is logged once per reference.
pub struct FontBook {
    base_dir: PathBuf,
    allow_system: bool,
    faces: Mutex<HashMap<String, Arc<FontFace>>>,
}

impl FontBook {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            allow_system: true,
            faces: Mutex::new(HashMap::new()),
        }
    }

    /// A book that never consults installed fonts, so metrics are the same on every host.
    pub fn without_system_fonts(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            allow_system: false,
            ..Self::new(base_dir)
        }
    }

    pub fn face(&self, font_ref: &str) -> Arc<FontFace> {
        let key = font_ref.trim().to_string();
        if let Some(hit) = self.faces.lock().ok().and_then(|map| map.get(&key).cloned()) {
            return hit;
        }
        let face = self.load(&key);
        match self.faces.lock() {
            Ok(mut map) => map.entry(key).or_insert(face).clone(),
            Err(_) => face,
        }
    }

    pub fn clear(&self) {
        if let Ok(mut map) = self.faces.lock() {
            map.clear();
        }
    }

    fn load(&self, font_ref: &str) -> Arc<FontFace> {
        if !font_ref.is_empty() {
            let path = resolve_path(&self.base_dir, font_ref);
            match fs::read(&path) {
                Ok(bytes) => {
                    if let Some(face) = FontFace::parse(bytes, 0) {
                        tracing::debug!(font = %path.display(), "loaded font");
                        return Arc::new(face);
                    }
                    tracing::warn!(font = %path.display(), "font could not be parsed, using fallback");
                }
                Err(err) => {
                    tracing::warn!(font = %path.display(), error = %err, "font unavailable, using fallback");
                }
            }
        }
        if self.allow_system
            && let Some(face) = SYSTEM_SANS.as_ref()
        {
            return face.clone();
        }
        Arc::new(FontFace::placeholder())
    }
}

fn load_system_sans() -> Option<Arc<FontFace>> {
    let mut db = Database::new();
    db.load_system_fonts();
    let families = [Family::SansSerif, Family::Name("DejaVu Sans"), Family::Serif];
    let query = Query {
        families: &families,
        weight: Weight::NORMAL,
        stretch: Stretch::Normal,
        style: Style::Normal,
    };
    let id = db.query(&query)?;
    db.with_face_data(id, |data, index| FontFace::parse(data.to_vec(), index))
        .flatten()
        .map(Arc::new)
}

/// Vertical metrics in pixels at one size. `descent` is positive downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalMetrics {
    pub ascent: f32,
    pub descent: f32,
}

impl VerticalMetrics {
    pub fn line_height(&self) -> u32 {
        (self.ascent + self.descent).ceil().max(1.0) as u32
    }
}

pub struct FontFace {
    data: Option<(Vec<u8>, u32)>,
    units_per_em: u16,
    ascii_advances: [u16; 128],
}

impl FontFace {
    fn parse(data: Vec<u8>, index: u32) -> Option<Self> {
        let (units_per_em, ascii_advances) = {
            let face = Face::parse(&data, index).ok()?;
            let mut advances = [0u16; 128];
            for byte in 0u8..=127 {
                if let Some(glyph_id) = face.glyph_index(byte as char) {
                    advances[byte as usize] = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                }
            }
            (face.units_per_em().max(1), advances)
        };
        Some(Self {
            data: Some((data, index)),
            units_per_em,
            ascii_advances,
        })
    }

    /// Built-in metrics used when no font file or system font exists. Glyphs
    /// render as filled boxes.
    pub fn placeholder() -> Self {
        Self {
            data: None,
            units_per_em: 1000,
            ascii_advances: [0; 128],
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.data.is_none()
    }

    fn with_face<R>(&self, f: impl FnOnce(&Face<'_>) -> R) -> Option<R> {
        let (data, index) = self.data.as_ref()?;
        let face = Face::parse(data, *index).ok()?;
        Some(f(&face))
    }

    pub fn vertical(&self, size: f32) -> VerticalMetrics {
        let scale = size / self.units_per_em as f32;
        self.with_face(|face| VerticalMetrics {
            ascent: face.ascender() as f32 * scale,
            descent: -(face.descender() as f32) * scale,
        })
        .unwrap_or(VerticalMetrics {
            ascent: size * FALLBACK_ASCENT,
            descent: size * FALLBACK_DESCENT,
        })
    }

    pub fn measure(&self, text: &str, size: f32) -> f32 {
        if text.is_empty() || size <= 0.0 {
            return 0.0;
        }
        let scale = size / self.units_per_em as f32;
        let fallback = size * FALLBACK_ADVANCE;
        if self.is_placeholder() {
            return text.chars().count() as f32 * fallback;
        }
        if text.is_ascii() {
            return text
                .bytes()
                .map(|b| match self.ascii_advances[b as usize] {
                    0 => fallback,
                    adv => adv as f32 * scale,
                })
                .sum();
        }
        self.with_face(|face| {
            text.chars()
                .map(|ch| {
                    face.glyph_index(ch)
                        .and_then(|id| face.glyph_hor_advance(id))
                        .map(|adv| adv as f32 * scale)
                        .unwrap_or(fallback)
                })
                .sum()
        })
        .unwrap_or(0.0)
    }

    /// Append the outlines of `text` to `builder`, starting at `x` on the
    /// given baseline. Returns the advance consumed.
    pub fn outline(&self, text: &str, size: f32, x: f32, baseline: f32, builder: &mut PathBuilder) -> f32 {
        let scale = size / self.units_per_em as f32;
        let fallback = size * FALLBACK_ADVANCE;
        let drawn = self.with_face(|face| {
            let mut pen = x;
            for ch in text.chars() {
                let Some(glyph) = face.glyph_index(ch) else {
                    pen += fallback;
                    continue;
                };
                let mut sink = PathSink {
                    builder: &mut *builder,
                    scale,
                    x: pen,
                    y: baseline,
                };
                face.outline_glyph(glyph, &mut sink);
                pen += advance_of(face, glyph, scale, fallback);
            }
            pen - x
        });
        match drawn {
            Some(width) => width,
            None => {
                let mut pen = x;
                for ch in text.chars() {
                    if !ch.is_whitespace()
                        && let Some(rect) = Rect::from_xywh(
                            pen + fallback * 0.1,
                            baseline - size * 0.7,
                            fallback * 0.8,
                            size * 0.7,
                        )
                    {
                        builder.push_rect(rect);
                    }
                    pen += fallback;
                }
                pen - x
            }
        }
    }
}

fn advance_of(face: &Face<'_>, glyph: GlyphId, scale: f32, fallback: f32) -> f32 {
    face.glyph_hor_advance(glyph)
        .map(|adv| adv as f32 * scale)
        .unwrap_or(fallback)
}

/// Font units (y up) to canvas pixels (y down).
struct PathSink<'a> {
    builder: &'a mut PathBuilder,
    scale: f32,
    x: f32,
    y: f32,
}

impl PathSink<'_> {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.x + x * self.scale, self.y - y * self.scale)
    }
}

impl OutlineBuilder for PathSink<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_font_falls_back_to_placeholder_metrics() {
        let book = FontBook::without_system_fonts("/nowhere");
        let face = book.face("fonts/missing.ttf");
        assert!(face.is_placeholder());
        assert!((face.measure("abcd", 10.0) - 22.4).abs() < 1e-3);
        let v = face.vertical(20.0);
        assert_eq!(v.line_height(), 20);
    }

    #[test]
    fn faces_are_cached_per_reference() {
        let book = FontBook::without_system_fonts("/nowhere");
        let a = book.face("x.ttf");
        let b = book.face(" x.ttf ");
        assert!(Arc::ptr_eq(&a, &b));
        book.clear();
        let c = book.face("x.ttf");
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn placeholder_outline_boxes_skip_whitespace() {
        let face = FontFace::placeholder();
        let mut builder = PathBuilder::new();
        let advance = face.outline("a b", 10.0, 0.0, 10.0, &mut builder);
        assert!((advance - 16.8).abs() < 1e-3);
        let path = builder.finish().unwrap();
        let bounds = path.bounds();
        assert!(bounds.left() >= 0.0 && bounds.right() <= advance);
        assert!(bounds.top() >= 3.0 - 0.01 && bounds.bottom() <= 10.0);
    }

    #[test]
    fn empty_text_has_no_width() {
        let face = FontFace::placeholder();
        assert_eq!(face.measure("", 24.0), 0.0);
    }
}
