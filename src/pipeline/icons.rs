use tiny_skia::Pixmap;

use super::{CategoryDescriptor, LabelPass, PassStats, RenderContext};
use crate::error::Result;
use crate::projection::project;
use crate::render::composite_centered;

/// Draws the icon of every indexed POI in one group, fitted into the group's
/// configured size box and centered on the projected coordinate.
pub struct IconPass {
    descriptor: &'static CategoryDescriptor,
}

impl IconPass {
    pub fn new(descriptor: &'static CategoryDescriptor) -> Self {
        Self { descriptor }
    }
}

impl LabelPass for IconPass {
    fn name(&self) -> &str {
        self.descriptor.group.config_key()
    }

    fn run(&self, ctx: &RenderContext<'_>, canvas: &mut Pixmap) -> Result<PassStats> {
        let group = self.descriptor.group;
        let config = &ctx.session.config;
        let mut stats = PassStats::default();

        for poi in ctx.pois {
            let Some(tag) = ctx.tag(poi).filter(|t| t.group == group) else {
                continue;
            };
            stats.seen += 1;
            let Some(entry) = ctx.index.get(&poi.name) else {
                continue;
            };
            stats.matched_index += 1;

            let Some(size) = config.size_box(group, &tag.subtype) else {
                stats.skipped_category += 1;
                continue;
            };
            let Some(path) = ctx.session.resolve_icon_path(&poi.name, entry.icon.as_deref()) else {
                stats.missing_icon += 1;
                continue;
            };
            let icon = match ctx.session.icons.fitted(&path, size.width_px, size.height_px) {
                Ok(icon) => icon,
                Err(err) => {
                    tracing::warn!(poi = %poi.name, error = %err, "icon could not be loaded");
                    stats.missing_icon += 1;
                    continue;
                }
            };
            let (px, py) = project(poi.x, poi.z, canvas.width(), canvas.height());
            composite_centered(canvas, &icon, px, py);
            tracing::debug!(
                poi = %poi.name,
                x = px,
                y = py,
                width = icon.width(),
                height = icon.height(),
                "placed icon"
            );
            stats.drawn += 1;
        }
        Ok(stats)
    }
}
