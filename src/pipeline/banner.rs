use tiny_skia::Pixmap;

use super::{LabelPass, PassStats, RenderContext};
use crate::error::Result;
use crate::localization::{POI_TABLE, SPECIAL_EVENT_TABLE};
use crate::model::SummaryPattern;
use crate::render::composite;
use crate::style::TextStyle;

pub const BANNER_STYLE: &str = "poiBanner";
pub const BANNER_BOSS_STYLE: &str = "poiBannerBoss";

const EXTRA_BOSS_KEYS: [&str; 2] = ["day1_extra_night_boss", "day2_extra_night_boss"];
const BOSS_TOKEN: &str = "BOSS";

const TOWNSHIP: &str = "Township - Township";
const MERCHANT: &str = "Event - Scale-Bearing Merchant";

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A pattern has a banner when its summary row names a special event.
pub fn has_special_event(summary: &SummaryPattern) -> bool {
    non_blank(summary.special_event_key.as_deref()).is_some()
        || non_blank(summary.special_event.as_deref()).is_some()
}

/// Splits `text` around the first case-insensitive `BOSS`, keeping the
/// original casing of the token.
pub fn split_boss_token(text: &str) -> Option<(&str, &str, &str)> {
    let idx = text.to_ascii_uppercase().find(BOSS_TOKEN)?;
    let end = idx + BOSS_TOKEN.len();
    Some((&text[..idx], &text[idx..end], &text[end..]))
}

/// The special-event line along the bottom edge.
pub struct SpecialEventBannerPass;

impl SpecialEventBannerPass {
    fn lookup(ctx: &RenderContext<'_>, file: &str, key: &str) -> Option<String> {
        let config = &ctx.session.config;
        let strings = &ctx.session.strings;
        strings
            .lookup_ignore_case(&config.i18n_lang, file, key)
            .or_else(|| strings.lookup_ignore_case(&config.i18n_default_lang, file, key))
    }

    fn event_key(ctx: &RenderContext<'_>, summary: &SummaryPattern) -> Option<String> {
        if let Some(key) = non_blank(summary.special_event_key.as_deref()) {
            return Some(key.to_string());
        }
        let value = non_blank(summary.special_event.as_deref())?;
        let config = &ctx.session.config;
        let strings = &ctx.session.strings;
        strings
            .key_for_value(&config.i18n_lang, SPECIAL_EVENT_TABLE, value)
            .or_else(|| strings.key_for_value(&config.i18n_default_lang, SPECIAL_EVENT_TABLE, value))
    }
}

impl LabelPass for SpecialEventBannerPass {
    fn name(&self) -> &str {
        "SpecialEvent"
    }

    fn run(&self, ctx: &RenderContext<'_>, canvas: &mut Pixmap) -> Result<PassStats> {
        let mut stats = PassStats::default();
        let Some(summary) = ctx.summary.filter(|s| has_special_event(s)) else {
            return Ok(stats);
        };
        stats.seen += 1;
        let Some(key) = Self::event_key(ctx, summary) else {
            tracing::info!(pattern = ctx.pattern_id, "no special event key could be resolved");
            stats.missing_localization += 1;
            return Ok(stats);
        };
        let Some(mut banner) = Self::lookup(ctx, SPECIAL_EVENT_TABLE, &key) else {
            tracing::warn!(key = %key, "special event text missing");
            stats.missing_localization += 1;
            return Ok(stats);
        };
        stats.matched_index += 1;

        let extra_boss = EXTRA_BOSS_KEYS.iter().any(|k| k.eq_ignore_ascii_case(&key));
        if extra_boss
            && let Some(boss_key) = non_blank(summary.extra_boss_key.as_deref())
        {
            match Self::lookup(ctx, POI_TABLE, boss_key) {
                Some(boss) => banner = format!("{banner} - {boss}"),
                None => stats.missing_localization += 1,
            }
        }

        let styles = ctx.styles();
        let base = styles.resolve(BANNER_STYLE, &[]);
        let text = ctx.text();
        let spans: Vec<(String, TextStyle)> = match split_boss_token(&banner).filter(|_| extra_boss) {
            Some((left, token, right)) => {
                let boss_style = styles.resolve(BANNER_BOSS_STYLE, &[BANNER_STYLE]);
                [(left, &base), (token, &boss_style), (right, &base)]
                    .into_iter()
                    .filter(|(t, _)| !t.is_empty())
                    .map(|(t, s)| (t.to_string(), s.clone()))
                    .collect()
            }
            None => vec![(banner.clone(), base.clone())],
        };
        let block = text.layout_spans(&spans);
        let cx = (canvas.width() / 2) as i32;
        let bottom = ctx.session.config.special_event.bottom_margin_px;
        let cy = canvas.height() as i32 - bottom - (base.size_px / 2.0) as i32;
        text.draw(canvas, &block, cx, cy)?;
        tracing::info!(pattern = ctx.pattern_id, key = %key, spans = spans.len(), "drew special event banner");
        stats.drawn += 1;
        Ok(stats)
    }
}

/// Bottom-center spawn marker for patterns with the township and/or the
/// scale-bearing merchant.
pub struct SpecialIconPass;

impl SpecialIconPass {
    fn icon_file(township: bool, merchant: bool) -> Option<&'static str> {
        match (township, merchant) {
            (true, true) => Some("spawn_both.png"),
            (true, false) => Some("spawn_village.png"),
            (false, true) => Some("spawn_merchant.png"),
            (false, false) => None,
        }
    }
}

impl LabelPass for SpecialIconPass {
    fn name(&self) -> &str {
        "SpecialIcon"
    }

    fn run(&self, ctx: &RenderContext<'_>, canvas: &mut Pixmap) -> Result<PassStats> {
        let mut stats = PassStats::default();
        let has = |wanted: &str| ctx.pois.iter().any(|p| p.name.trim().eq_ignore_ascii_case(wanted));
        let (township, merchant) = (has(TOWNSHIP), has(MERCHANT));
        let Some(file) = Self::icon_file(township, merchant) else {
            return Ok(stats);
        };
        stats.seen += 1;

        let settings = &ctx.session.config.special_event_icon;
        let path = ctx.session.config.resolve(&settings.folder).join(file);
        if !ctx.session.file_exists(&path) {
            tracing::warn!(path = %path.display(), "special icon not found");
            stats.missing_icon += 1;
            return Ok(stats);
        }
        let icon = ctx
            .session
            .icons
            .fitted(&path, settings.icon_box.width, settings.icon_box.height)?;

        let with_banner = ctx.summary.is_some_and(has_special_event);
        let margin = if with_banner {
            settings.bottom_margins.icon_and_banner
        } else {
            settings.bottom_margins.icon_only
        };
        let cx = (canvas.width() / 2) as i32;
        let cy = canvas.height() as i32 - margin;
        let x = cx - (icon.width() / 2) as i32;
        let y = cy - (icon.height() / 2) as i32;
        composite(canvas, &icon, x, y);
        tracing::info!(township, merchant, with_banner, "drew special icon");
        stats.drawn += 1;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MetadataIndex, Poi};
    use crate::pipeline::testing::{covered, session, write_png};
    use serde_json::json;
    use std::fs;

    fn i18n(dir: &std::path::Path) {
        fs::create_dir_all(dir.join("i18n/en")).unwrap();
        fs::write(
            dir.join("i18n/en/special_event.json"),
            json!({
                "day1_extra_night_boss": "Extra Boss",
                "meteor": "Meteor Strike"
            })
            .to_string(),
        )
        .unwrap();
        fs::write(
            dir.join("i18n/en/poi.json"),
            json!({ "boss.gaping_jaw": "Gaping Jaw" }).to_string(),
        )
        .unwrap();
    }

    fn run_banner(dir: &std::path::Path, summary: &SummaryPattern) -> (PassStats, Pixmap) {
        let session = session(dir, json!({}));
        let index = MetadataIndex::default();
        let ctx = RenderContext {
            session: &session,
            pois: &[],
            index: &index,
            pattern_id: "001",
            summary: Some(summary),
        };
        let mut canvas = Pixmap::new(400, 200).unwrap();
        let stats = SpecialEventBannerPass.run(&ctx, &mut canvas).unwrap();
        (stats, canvas)
    }

    #[test]
    fn splits_on_first_boss_token() {
        assert_eq!(
            split_boss_token("Extra Boss - Boss Two"),
            Some(("Extra ", "Boss", " - Boss Two"))
        );
        assert_eq!(split_boss_token("BOSS"), Some(("", "BOSS", "")));
        assert_eq!(split_boss_token("Meteor"), None);
    }

    #[test]
    fn banner_sits_above_bottom_margin() {
        let dir = tempfile::tempdir().unwrap();
        i18n(dir.path());
        let summary = SummaryPattern {
            special_event: Some("meteor strike".to_string()),
            ..SummaryPattern::default()
        };
        let (stats, canvas) = run_banner(dir.path(), &summary);
        assert_eq!(stats.drawn, 1);
        // Default size 24 and margin 24 put the block center at y = 164.
        let rows: Vec<u32> = (0..200)
            .filter(|y| (0..400).any(|x| canvas.pixel(x, *y).unwrap().alpha() > 0))
            .collect();
        assert!(!rows.is_empty());
        assert!(*rows.first().unwrap() >= 150);
        assert!(*rows.last().unwrap() <= 178);
    }

    #[test]
    fn extra_boss_appends_name() {
        let dir = tempfile::tempdir().unwrap();
        i18n(dir.path());
        let plain = SummaryPattern {
            special_event_key: Some("day1_extra_night_boss".to_string()),
            ..SummaryPattern::default()
        };
        let named = SummaryPattern {
            extra_boss_key: Some("boss.gaping_jaw".to_string()),
            ..plain.clone()
        };
        let (_, a) = run_banner(dir.path(), &plain);
        let (stats, b) = run_banner(dir.path(), &named);
        assert_eq!(stats.drawn, 1);
        assert_eq!(stats.missing_localization, 0);
        let width = |p: &Pixmap| {
            (0..400)
                .filter(|x| (0..200).any(|y| p.pixel(*x, y).unwrap().alpha() > 0))
                .count()
        };
        assert!(width(&b) > width(&a));
    }

    #[test]
    fn unknown_event_draws_nothing() {
        let dir = tempfile::tempdir().unwrap();
        i18n(dir.path());
        let summary = SummaryPattern {
            special_event_key: Some("unheard_of".to_string()),
            ..SummaryPattern::default()
        };
        let (stats, canvas) = run_banner(dir.path(), &summary);
        assert_eq!(stats.drawn, 0);
        assert_eq!(stats.missing_localization, 1);
        assert_eq!(covered(&canvas), 0);

        let (stats, _) = run_banner(dir.path(), &SummaryPattern::default());
        assert_eq!(stats, PassStats::default());
    }

    fn run_icon(dir: &std::path::Path, pois: &[Poi], summary: &SummaryPattern) -> (PassStats, Pixmap) {
        let session = session(dir, json!({ "SpecialEventIcon": { "Folder": "misc" } }));
        let index = MetadataIndex::default();
        let ctx = RenderContext {
            session: &session,
            pois,
            index: &index,
            pattern_id: "001",
            summary: Some(summary),
        };
        let mut canvas = Pixmap::new(400, 400).unwrap();
        let stats = SpecialIconPass.run(&ctx, &mut canvas).unwrap();
        (stats, canvas)
    }

    #[test]
    fn icon_choice_follows_markers() {
        assert_eq!(SpecialIconPass::icon_file(true, true), Some("spawn_both.png"));
        assert_eq!(SpecialIconPass::icon_file(true, false), Some("spawn_village.png"));
        assert_eq!(SpecialIconPass::icon_file(false, true), Some("spawn_merchant.png"));
        assert_eq!(SpecialIconPass::icon_file(false, false), None);
    }

    #[test]
    fn special_icon_fits_box_and_respects_banner_margin() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("misc/spawn_village.png"), 344, 70, [0, 255, 0, 255]);
        let pois = vec![Poi::new("Township - Township", 0.0, 0.0)];

        // 344×70 into 172×70 is 172×35, centered on (200, 372).
        let (stats, canvas) = run_icon(dir.path(), &pois, &SummaryPattern::default());
        assert_eq!(stats.drawn, 1);
        assert_eq!(covered(&canvas), 172 * 35);
        assert_eq!(canvas.pixel(114, 355).unwrap().alpha(), 255);
        assert_eq!(canvas.pixel(285, 389).unwrap().alpha(), 255);

        let with_banner = SummaryPattern {
            special_event_key: Some("meteor".to_string()),
            ..SummaryPattern::default()
        };
        let (_, canvas) = run_icon(dir.path(), &pois, &with_banner);
        assert_eq!(canvas.pixel(114, 347).unwrap().alpha(), 255);
        assert_eq!(canvas.pixel(114, 382).unwrap().alpha(), 0);
    }

    #[test]
    fn missing_special_icon_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let pois = vec![Poi::new("Event - Scale-Bearing Merchant", 0.0, 0.0)];
        let (stats, canvas) = run_icon(dir.path(), &pois, &SummaryPattern::default());
        assert_eq!(stats.missing_icon, 1);
        assert_eq!(covered(&canvas), 0);
        let (stats, _) = run_icon(dir.path(), &[], &SummaryPattern::default());
        assert_eq!(stats, PassStats::default());
    }
}
