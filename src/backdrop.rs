use std::path::{Path, PathBuf};

use tiny_skia::Pixmap;

use crate::config::IconSettings;
use crate::error::Result;
use crate::model::SummaryPattern;
use crate::render::{composite, pixmap_from_rgba};
use crate::session::RenderSession;

/// Terrain variant selected by the summary's `special` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Special {
    Default,
    Mountaintop,
    Crater,
    RottedWood,
    Noklateo,
}

impl Special {
    /// Numeric codes as written by the summary, or the variant name.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(code) = raw.parse::<i64>() {
            return match code {
                0 => Some(Special::Default),
                1 => Some(Special::Mountaintop),
                2 => Some(Special::Crater),
                3 => Some(Special::RottedWood),
                5 => Some(Special::Noklateo),
                _ => None,
            };
        }
        match raw.to_ascii_lowercase().as_str() {
            "default" => Some(Special::Default),
            "mountaintop" => Some(Special::Mountaintop),
            "crater" => Some(Special::Crater),
            "rotted_wood" | "rottedwood" => Some(Special::RottedWood),
            "noklateo" => Some(Special::Noklateo),
            _ => None,
        }
    }

    pub fn stem(self) -> &'static str {
        match self {
            Special::Default => "default",
            Special::Mountaintop => "mountaintop",
            Special::Crater => "crater",
            Special::RottedWood => "rotted_wood",
            Special::Noklateo => "noklateo",
        }
    }

    pub fn map_raw_file(self) -> String {
        format!("{}.png", self.stem())
    }

    pub fn shifting_overlay_file(self) -> Option<String> {
        match self {
            Special::Default => None,
            other => Some(format!("{}_overlay.png", other.stem())),
        }
    }

    /// Shifting-earth variants that carry labelled attach points.
    pub fn attach_points_file(self) -> Option<String> {
        match self {
            Special::Mountaintop | Special::Crater | Special::Noklateo => {
                Some(format!("{}_overlay.json", self.stem()))
            }
            _ => None,
        }
    }

    /// The castle art sits on every variant except Noklateo.
    pub fn has_castle(self) -> bool {
        self != Special::Noklateo
    }
}

pub fn frenzy_file(direction: &str) -> Option<&'static str> {
    match direction.trim().to_ascii_lowercase().as_str() {
        "north" => Some("frenzy_north.png"),
        "south" => Some("frenzy_south.png"),
        _ => None,
    }
}

pub fn blessing_file(direction: &str) -> Option<&'static str> {
    match direction.trim().to_ascii_lowercase().as_str() {
        "west" => Some("blessing_west.png"),
        "northeast" => Some("blessing_northeast.png"),
        "southwest" => Some("blessing_southwest.png"),
        _ => None,
    }
}

/// `treasure_{treasure * 10 + special:05}.png`; both columns must be numeric.
pub fn treasure_file(treasure: &str, special: &str) -> Option<String> {
    let t: i64 = treasure.trim().parse().ok()?;
    let s: i64 = special.trim().parse().ok()?;
    Some(format!("treasure_{:05}.png", t * 10 + s))
}

/// `start_{n}.png`, taking the digits out of ids like `"sp_12"` if needed.
pub fn spawn_file(id: &str) -> Option<String> {
    let id = id.trim();
    if let Ok(n) = id.parse::<i64>() {
        return Some(format!("start_{n}.png"));
    }
    let digits: String = id.chars().filter(char::is_ascii_digit).collect();
    let n: u64 = digits.parse().ok()?;
    Some(format!("start_{n}.png"))
}

const NIGHTLORDS: [&str; 8] = [
    "Gladius", "Adel", "Gnoster", "Maris", "Libra", "Fulghor", "Caligo", "Heolstor",
];

/// Emblem file for a nightlord given by index or by name.
pub fn nightlord_emblem_file(nightlord: &str) -> Option<String> {
    let raw = nightlord.trim();
    let name = match raw.parse::<usize>() {
        Ok(i) => NIGHTLORDS.get(i)?,
        Err(_) => NIGHTLORDS.iter().find(|n| n.eq_ignore_ascii_case(raw))?,
    };
    Some(format!("{name}.png"))
}

/// Top-left corner for an object of `obj_w × obj_h` at a named canvas anchor.
pub fn measure_anchor(
    canvas_w: i32,
    canvas_h: i32,
    obj_w: i32,
    obj_h: i32,
    anchor: &str,
    margin_x: i32,
    margin_y: i32,
) -> (i32, i32) {
    match anchor.trim().to_ascii_lowercase().as_str() {
        "top-left" => (margin_x, margin_y),
        "top-right" => (canvas_w - obj_w - margin_x, margin_y),
        "bottom-right" => (canvas_w - obj_w - margin_x, canvas_h - obj_h - margin_y),
        "center" => ((canvas_w - obj_w) / 2, (canvas_h - obj_h) / 2),
        _ => (margin_x, canvas_h - obj_h - margin_y),
    }
}

/// Where an anchored emblem lands and how large it is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchoredPlacement {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Fit an `img_w × img_h` emblem into the box `settings` describe and anchor
/// that box on the canvas. The emblem is centered inside its box.
pub fn place_anchored(
    canvas_w: u32,
    canvas_h: u32,
    img_w: u32,
    img_h: u32,
    settings: &IconSettings,
) -> AnchoredPlacement {
    let (box_w, box_h): (u32, Option<u32>) =
        if settings.fixed_width_px.is_some() || settings.fixed_height_px.is_some() {
            let w = settings.fixed_width_px.or(settings.fixed_height_px).unwrap_or(1);
            let h = settings.fixed_height_px.or(settings.fixed_width_px).unwrap_or(1);
            (w, Some(h))
        } else {
            let w = settings
                .max_width_px
                .unwrap_or_else(|| (settings.width_percent * canvas_w as f64).round().max(0.0) as u32);
            (w, settings.max_height_px)
        };

    let (img_w, img_h) = (img_w.max(1), img_h.max(1));
    let (width, height) = if settings.preserve_aspect {
        let sw = box_w as f64 / img_w as f64;
        let scale = match box_h {
            Some(h) => {
                let sh = h as f64 / img_h as f64;
                if settings.fit_inside_box { sw.min(sh) } else { sw.max(sh) }
            }
            None => sw,
        };
        (
            ((img_w as f64 * scale).round() as u32).max(1),
            ((img_h as f64 * scale).round() as u32).max(1),
        )
    } else {
        (box_w.max(1), box_h.unwrap_or(img_h).max(1))
    };

    let obj_w = box_w.min(canvas_w) as i32;
    let obj_h = match box_h {
        Some(h) => h.min(canvas_h) as i32,
        None => height as i32,
    };
    let (bx, by) = measure_anchor(
        canvas_w as i32,
        canvas_h as i32,
        obj_w,
        obj_h,
        &settings.anchor,
        settings.margin_x,
        settings.margin_y,
    );
    let x = bx + ((box_w as i32 - width as i32) / 2).max(0);
    let y = by + box_h.map(|h| ((h as i32 - height as i32) / 2).max(0)).unwrap_or(0);
    AnchoredPlacement { x, y, width, height }
}

/// Paint every backdrop and overlay the summary row selects, bottom to top.
/// Unknown values and missing files are logged and skipped. A step that fails
/// to decode or composite is logged and the remaining steps still run; the
/// return value counts those failed steps.
pub fn apply_backdrops(
    canvas: &mut Pixmap,
    summary: &SummaryPattern,
    session: &RenderSession,
) -> usize {
    let config = &session.config;
    let assets = &config.assets_folder;
    let special = summary.special.as_deref().filter(|s| !s.trim().is_empty());
    let parsed_special = special.and_then(|raw| {
        let parsed = Special::parse(raw);
        if parsed.is_none() {
            tracing::debug!(special = raw, "unrecognized special, skipping terrain overlays");
        }
        parsed
    });
    let nightlord = summary.nightlord.as_deref().filter(|s| !s.trim().is_empty());

    let mut steps: Vec<(PathBuf, Step)> = Vec::new();
    if let (Some(folder), Some(nightlord)) = (&config.nightlord_folder, nightlord) {
        steps.push((folder.join(format!("backdrop_{}.png", nightlord.trim())), Step::FullCanvas));
    }
    if let (Some(folder), Some(special)) = (&config.map_raw_folder, parsed_special) {
        steps.push((folder.join(special.map_raw_file()), Step::FullCanvas));
    }
    if let Some(file) = parsed_special.and_then(Special::shifting_overlay_file) {
        steps.push((assets.join("shifting_earth").join(file), Step::FullCanvas));
    }
    if let Some(file) = summary.frenzy_tower.as_deref().and_then(frenzy_file) {
        steps.push((assets.join("event").join(file), Step::FullCanvas));
    }
    if let Some(file) = summary.rot_blessing.as_deref().and_then(blessing_file) {
        steps.push((assets.join("event").join(file), Step::FullCanvas));
    }
    if parsed_special.is_some_and(Special::has_castle) {
        steps.push((assets.join("castle.png"), Step::Unscaled));
    }
    if let (Some(folder), Some(treasure), Some(special)) =
        (&config.treasure_folder, summary.treasure.as_deref(), special)
    {
        match treasure_file(treasure, special) {
            Some(file) => steps.push((folder.join(file), Step::FullCanvas)),
            None => tracing::warn!(treasure, special, "treasure or special is not numeric"),
        }
    }
    if let Some(file) = summary.spawn_point_id.as_deref().and_then(spawn_file) {
        steps.push((assets.join("spawn_point").join(file), Step::FullCanvas));
    }
    if let (Some(folder), Some(nightlord)) = (&config.nightlord_folder, nightlord) {
        match nightlord_emblem_file(nightlord) {
            Some(file) => steps.push((folder.join(file), Step::Anchored(&config.nightlord_icon))),
            None => tracing::debug!(nightlord, "no emblem for nightlord"),
        }
    }

    let mut failed = 0;
    for (path, step) in steps {
        if !present(session, &path) {
            continue;
        }
        let applied = match step {
            Step::FullCanvas => full_canvas(canvas, session, &path),
            Step::Unscaled => unscaled(canvas, session, &path),
            Step::Anchored(settings) => anchored(canvas, session, &path, settings),
        };
        if let Err(err) = applied {
            tracing::warn!(overlay = %path.display(), error = %err, "overlay skipped");
            failed += 1;
        }
    }
    failed
}

enum Step<'a> {
    FullCanvas,
    Unscaled,
    Anchored(&'a IconSettings),
}

fn present(session: &RenderSession, path: &Path) -> bool {
    let exists = session.file_exists(path);
    if !exists {
        tracing::warn!(path = %path.display(), "overlay not found");
    }
    exists
}

fn full_canvas(canvas: &mut Pixmap, session: &RenderSession, path: &Path) -> Result<()> {
    let layer = session.icons.resized(path, canvas.width(), canvas.height())?;
    composite(canvas, &layer, 0, 0);
    tracing::debug!(overlay = %path.display(), "applied overlay");
    Ok(())
}

fn unscaled(canvas: &mut Pixmap, session: &RenderSession, path: &Path) -> Result<()> {
    let original = session.icons.original(path)?;
    composite(canvas, &pixmap_from_rgba(&original)?, 0, 0);
    tracing::debug!(overlay = %path.display(), "applied overlay without resizing");
    Ok(())
}

fn anchored(
    canvas: &mut Pixmap,
    session: &RenderSession,
    path: &Path,
    settings: &IconSettings,
) -> Result<()> {
    let original = session.icons.original(path)?;
    let place = place_anchored(
        canvas.width(),
        canvas.height(),
        original.width(),
        original.height(),
        settings,
    );
    let icon = session.icons.resized(path, place.width, place.height)?;
    composite(canvas, &icon, place.x, place.y);
    tracing::debug!(
        emblem = %path.display(),
        x = place.x,
        y = place.y,
        width = place.width,
        height = place.height,
        "anchored emblem"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{session, write_png};
    use serde_json::json;

    #[test]
    fn special_codes_and_names() {
        assert_eq!(Special::parse("1"), Some(Special::Mountaintop));
        assert_eq!(Special::parse(" Crater "), Some(Special::Crater));
        assert_eq!(Special::parse("4"), None);
        assert_eq!(Special::parse("volcano"), None);
        assert_eq!(Special::Default.map_raw_file(), "default.png");
        assert_eq!(Special::Default.shifting_overlay_file(), None);
        assert_eq!(
            Special::RottedWood.shifting_overlay_file().as_deref(),
            Some("rotted_wood_overlay.png")
        );
        assert_eq!(Special::RottedWood.attach_points_file(), None);
        assert!(!Special::Noklateo.has_castle());
    }

    #[test]
    fn event_overlay_tables() {
        assert_eq!(frenzy_file("North"), Some("frenzy_north.png"));
        assert_eq!(frenzy_file("east"), None);
        assert_eq!(blessing_file(" southwest"), Some("blessing_southwest.png"));
        assert_eq!(blessing_file(""), None);
    }

    #[test]
    fn treasure_and_spawn_names() {
        assert_eq!(treasure_file("12", "3").as_deref(), Some("treasure_00123.png"));
        assert_eq!(treasure_file("x", "3"), None);
        assert_eq!(spawn_file("7").as_deref(), Some("start_7.png"));
        assert_eq!(spawn_file("spawn_07").as_deref(), Some("start_7.png"));
        assert_eq!(spawn_file("none"), None);
    }

    #[test]
    fn nightlord_by_index_or_name() {
        assert_eq!(nightlord_emblem_file("0").as_deref(), Some("Gladius.png"));
        assert_eq!(nightlord_emblem_file("heolstor").as_deref(), Some("Heolstor.png"));
        assert_eq!(nightlord_emblem_file("8"), None);
    }

    #[test]
    fn anchors_measure_from_margins() {
        assert_eq!(measure_anchor(100, 80, 10, 20, "top-right", 5, 6), (85, 6));
        assert_eq!(measure_anchor(100, 80, 10, 20, "bottom-right", 5, 6), (85, 54));
        assert_eq!(measure_anchor(100, 80, 10, 20, "center", 5, 6), (45, 30));
        assert_eq!(measure_anchor(100, 80, 10, 20, "sideways", 5, 6), (5, 54));
    }

    #[test]
    fn fixed_box_centers_emblem() {
        let settings = IconSettings {
            fixed_width_px: Some(100),
            fixed_height_px: None,
            margin_x: 10,
            margin_y: 10,
            ..IconSettings::default()
        };
        let place = place_anchored(1000, 1000, 200, 100, &settings);
        assert_eq!((place.width, place.height), (100, 50));
        assert_eq!((place.x, place.y), (10, 1000 - 100 - 10 + 25));
    }

    #[test]
    fn percent_box_without_height_limit() {
        let settings = IconSettings {
            fixed_width_px: None,
            fixed_height_px: None,
            width_percent: 0.1,
            anchor: "top-left".to_string(),
            ..IconSettings::default()
        };
        let place = place_anchored(1000, 800, 50, 25, &settings);
        assert_eq!((place.width, place.height), (100, 50));
        assert_eq!((place.x, place.y), (0, 0));
    }

    #[test]
    fn corrupt_backdrop_does_not_hide_the_emblem() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(
            dir.path(),
            json!({
                "NightlordFolder": "nightlord",
                "NightlordIcon": { "Anchor": "top-left", "FixedWidthPx": 50, "FixedHeightPx": 50 }
            }),
        );
        std::fs::create_dir_all(dir.path().join("nightlord")).unwrap();
        std::fs::write(dir.path().join("nightlord/backdrop_0.png"), b"not a png").unwrap();
        write_png(&dir.path().join("nightlord/Gladius.png"), 10, 10, [255, 0, 0, 255]);

        let summary = SummaryPattern {
            nightlord: Some("0".to_string()),
            ..SummaryPattern::default()
        };
        let mut canvas = Pixmap::new(400, 400).unwrap();
        assert_eq!(apply_backdrops(&mut canvas, &summary, &session), 1);
        let px = canvas.pixel(25, 25).unwrap();
        assert_eq!((px.red(), px.alpha()), (255, 255));
        assert_eq!(canvas.pixel(200, 200).unwrap().alpha(), 0);
    }

    #[test]
    fn missing_overlays_are_not_failures() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path(), json!({}));
        let summary = SummaryPattern {
            special: Some("2".to_string()),
            frenzy_tower: Some("north".to_string()),
            ..SummaryPattern::default()
        };
        let mut canvas = Pixmap::new(64, 64).unwrap();
        assert_eq!(apply_backdrops(&mut canvas, &summary, &session), 0);
        assert!(canvas.pixels().iter().all(|p| p.alpha() == 0));
    }
}
