use tiny_skia::Pixmap;

use super::descriptors::{DAY_PREFIX_STYLE, day_prefix};
use super::{CategoryDescriptor, LabelPass, PassStats, RenderContext};
use crate::error::Result;
use crate::overrides::Anchor;
use crate::projection::project;
use crate::style::TextStyle;
use crate::text::LINE_SPACING;

/// Draws the localized name of every POI in one group.
///
/// Placement is the projected coordinate (after any configured reanchor) plus
/// the group's offset, or the first matching per-coordinate override. Override
/// matching always uses the POI's own world coordinate.
pub struct CategoryLabelPass {
    descriptor: &'static CategoryDescriptor,
    name: String,
}

impl CategoryLabelPass {
    pub fn new(descriptor: &'static CategoryDescriptor) -> Self {
        Self {
            descriptor,
            name: format!("{} Labels", descriptor.group),
        }
    }
}

impl LabelPass for CategoryLabelPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &RenderContext<'_>, canvas: &mut Pixmap) -> Result<PassStats> {
        let Some(default_style) = self.descriptor.label_style else {
            return Ok(PassStats::default());
        };
        let group = self.descriptor.group;
        let scope = group.config_key();
        let styles = ctx.styles();
        let overrides = ctx.overrides();
        let resolver = ctx.label_text();
        let text = ctx.text();
        let mut stats = PassStats::default();

        for poi in ctx.pois {
            let Some(tag) = ctx.tag(poi).filter(|t| t.group == group) else {
                continue;
            };
            stats.seen += 1;
            if ctx.index.get(&poi.name).is_some() {
                stats.matched_index += 1;
            }

            let label = resolver.resolve(&poi.name);
            if !label.localized {
                stats.missing_localization += 1;
                tracing::debug!(poi = %poi.name, fallback = %label.text, "no localized label");
            }
            if label.text.trim().is_empty() {
                continue;
            }

            let (wx, wz) = overrides
                .reanchor(scope, &tag.subtype)
                .unwrap_or((poi.x, poi.z));
            let pixel = project(wx, wz, canvas.width(), canvas.height());
            let placement = overrides.resolve(scope, &tag.subtype, Some((poi.x, poi.z)), pixel);

            let style = match placement.style.as_deref() {
                Some(name) => styles.resolve(name, &[default_style]),
                None => styles.for_label(group, &tag.subtype, default_style),
            };
            let anchor = placement.anchor.unwrap_or(Anchor::Center);
            let cx = pixel.0 + placement.dx;
            let cy = pixel.1 + placement.dy;

            match day_prefix(&poi.name).filter(|_| self.descriptor.day_prefix) {
                Some(prefix) => {
                    let prefix_style = day_style(ctx, &style);
                    let block =
                        text.layout_stacked(prefix, &prefix_style, &label.text, &style, LINE_SPACING);
                    text.draw(canvas, &block, anchor.apply(cx, block.width), cy)?;
                }
                None => {
                    text.draw_label(canvas, &label.text, &style, cx, cy, anchor)?;
                }
            }
            tracing::debug!(poi = %poi.name, x = cx, y = cy, overridden = placement.overridden, "placed label");
            stats.drawn += 1;
        }
        Ok(stats)
    }
}

/// The day marker takes its font from `poiNightBossDayPrefix` when defined and
/// its colors from the label it sits on.
fn day_style(ctx: &RenderContext<'_>, label: &TextStyle) -> TextStyle {
    let styles = ctx.styles();
    if !styles.has_style(DAY_PREFIX_STYLE) {
        return label.clone();
    }
    let prefix = styles.resolve(DAY_PREFIX_STYLE, &[]);
    TextStyle {
        font_path: prefix.font_path,
        size_px: prefix.size_px,
        ..label.clone()
    }
}
