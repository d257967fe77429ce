use tiny_skia::Pixmap;

use super::{LabelPass, PassStats, RenderContext};
use crate::backdrop::Special;
use crate::error::Result;
use crate::model::{AttachPoint, load_attach_points};
use crate::overrides::{Anchor, SHIFTING_EARTH_SCOPE};
use crate::style::STANDARD_STYLE;

pub const SHIFTING_EARTH_STYLE: &str = "poiShiftingEarth";

const SUBTYPE: &str = "Default";

/// Labels the landmarks of a shifting-earth variant. Sites come pre-projected
/// from `{AttachPointsFolder}/{variant}_overlay.json`.
pub struct ShiftingEarthPass;

impl ShiftingEarthPass {
    fn sites(ctx: &RenderContext<'_>) -> Result<Vec<AttachPoint>> {
        let Some(raw) = ctx.summary.and_then(|s| s.special.as_deref()) else {
            return Ok(Vec::new());
        };
        let Some(file) = Special::parse(raw).and_then(Special::attach_points_file) else {
            tracing::debug!(special = raw, "no shifting-earth labels for special");
            return Ok(Vec::new());
        };
        let path = ctx.session.config.attach_points_folder.join(file);
        if !ctx.session.file_exists(&path) {
            tracing::warn!(path = %path.display(), "attach points not found");
            return Ok(Vec::new());
        }
        load_attach_points(&path)
    }
}

impl LabelPass for ShiftingEarthPass {
    fn name(&self) -> &str {
        "ShiftingEarth Labels"
    }

    fn run(&self, ctx: &RenderContext<'_>, canvas: &mut Pixmap) -> Result<PassStats> {
        let sites = Self::sites(ctx)?;
        let styles = ctx.styles();
        let overrides = ctx.overrides();
        let resolver = ctx.label_text();
        let text = ctx.text();
        let base_style = if styles.has_style(SHIFTING_EARTH_STYLE) {
            SHIFTING_EARTH_STYLE
        } else {
            STANDARD_STYLE
        };
        let mut stats = PassStats::default();

        for site in &sites {
            stats.seen += 1;
            let name = site.name.as_deref().unwrap_or("");
            let label = match site.i18n_key.as_deref().filter(|k| !k.trim().is_empty()) {
                Some(key) => match resolver.lookup_key(key) {
                    Some(text) => {
                        stats.matched_index += 1;
                        text
                    }
                    None => {
                        stats.missing_localization += 1;
                        name.to_string()
                    }
                },
                None => name.to_string(),
            };
            if label.trim().is_empty() {
                continue;
            }

            let pixel = site.pixel();
            let placement = overrides.resolve(SHIFTING_EARTH_SCOPE, SUBTYPE, site.world(), pixel);
            let style = match placement.style.as_deref() {
                Some(name) => styles.resolve(name, &[base_style]),
                None => styles.resolve(base_style, &[]),
            };
            let (cx, cy) = (pixel.0 + placement.dx, pixel.1 + placement.dy);
            text.draw_label(
                canvas,
                &label,
                &style,
                cx,
                cy,
                placement.anchor.unwrap_or(Anchor::Center),
            )?;
            stats.drawn += 1;
        }
        Ok(stats)
    }
}
