//! Ordered drawing passes over the shared canvas.
//!
//! Every pass filters the pattern's POIs down to its own category, resolves
//! text and placement, and draws. A pass that errors or panics is logged by
//! name and the remaining passes still run.

pub mod banner;
pub mod descriptors;
pub mod icons;
pub mod labels;
pub mod terrain;

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tiny_skia::Pixmap;

use crate::classify::{CategoryTag, classify};
use crate::error::Result;
use crate::localization::LabelTextResolver;
use crate::model::{MetadataIndex, Poi, SummaryPattern};
use crate::overrides::OverrideResolver;
use crate::session::RenderSession;
use crate::style::StyleResolver;
use crate::text::TextRenderer;

pub use banner::{SpecialEventBannerPass, SpecialIconPass};
pub use descriptors::{CategoryDescriptor, DESCRIPTORS, descriptor};
pub use icons::IconPass;
pub use labels::CategoryLabelPass;
pub use terrain::ShiftingEarthPass;

/// Read-only inputs shared by every pass.
pub struct RenderContext<'a> {
    pub session: &'a RenderSession,
    pub pois: &'a [Poi],
    pub index: &'a MetadataIndex,
    pub pattern_id: &'a str,
    pub summary: Option<&'a SummaryPattern>,
}

impl<'a> RenderContext<'a> {
    pub fn tag(&self, poi: &Poi) -> Option<CategoryTag> {
        classify(&poi.name, self.index.get(&poi.name))
    }

    pub fn styles(&self) -> StyleResolver<'a> {
        let config = &self.session.config;
        StyleResolver::new(&config.text, &config.label_styles)
    }

    pub fn overrides(&self) -> OverrideResolver<'a> {
        OverrideResolver::new(&self.session.config.placement, self.pois)
    }

    pub fn label_text(&self) -> LabelTextResolver<'a> {
        let config = &self.session.config;
        LabelTextResolver::new(
            self.index,
            &self.session.strings,
            &config.i18n_lang,
            &config.i18n_default_lang,
        )
    }

    pub fn text(&self) -> TextRenderer<'a> {
        TextRenderer::new(&self.session.fonts)
    }
}

/// Per-pass diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub seen: usize,
    pub matched_index: usize,
    pub drawn: usize,
    pub skipped_category: usize,
    pub missing_icon: usize,
    pub missing_localization: usize,
}

impl fmt::Display for PassStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seen={} matchedIndex={} drawn={} skippedCat={} missingIcon={} missingI18n={}",
            self.seen,
            self.matched_index,
            self.drawn,
            self.skipped_category,
            self.missing_icon,
            self.missing_localization
        )
    }
}

pub trait LabelPass {
    fn name(&self) -> &str;
    fn run(&self, ctx: &RenderContext<'_>, canvas: &mut Pixmap) -> Result<PassStats>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub name: String,
    pub outcome: PassOutcome,
    pub stats: PassStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub passes: Vec<PassReport>,
    /// POIs no category rule claimed.
    pub unclassified: usize,
}

impl RenderReport {
    pub fn pass(&self, name: &str) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.name == name)
    }

    pub fn failures(&self) -> impl Iterator<Item = &PassReport> {
        self.passes
            .iter()
            .filter(|p| matches!(p.outcome, PassOutcome::Failed(_)))
    }
}

pub struct LabelPipeline {
    passes: Vec<Box<dyn LabelPass>>,
}

impl LabelPipeline {
    pub fn new(passes: Vec<Box<dyn LabelPass>>) -> Self {
        Self { passes }
    }

    /// Icons for every group, then labels, then terrain labels, the event
    /// banner and the special icon.
    pub fn standard() -> Self {
        let mut passes: Vec<Box<dyn LabelPass>> = Vec::new();
        for d in DESCRIPTORS.iter().filter(|d| d.icons) {
            passes.push(Box::new(IconPass::new(d)));
        }
        for d in DESCRIPTORS.iter().filter(|d| d.label_style.is_some()) {
            passes.push(Box::new(CategoryLabelPass::new(d)));
        }
        passes.push(Box::new(ShiftingEarthPass));
        passes.push(Box::new(SpecialEventBannerPass));
        passes.push(Box::new(SpecialIconPass));
        Self::new(passes)
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn run(&self, ctx: &RenderContext<'_>, canvas: &mut Pixmap) -> RenderReport {
        let unclassified = ctx.pois.iter().filter(|p| ctx.tag(p).is_none()).count();
        if unclassified > 0 {
            tracing::debug!(unclassified, "POIs without a category");
        }
        let mut report = RenderReport {
            passes: Vec::with_capacity(self.passes.len()),
            unclassified,
        };
        for pass in &self.passes {
            let name = pass.name().to_string();
            let result = catch_unwind(AssertUnwindSafe(|| pass.run(ctx, canvas)));
            let (outcome, stats) = match result {
                Ok(Ok(stats)) => {
                    tracing::info!(pass = %name, "{stats}");
                    (PassOutcome::Completed, stats)
                }
                Ok(Err(err)) => {
                    tracing::error!(pass = %name, error = %err, "[LabelPass:{name}] {err}");
                    (PassOutcome::Failed(err.to_string()), PassStats::default())
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(pass = %name, "[LabelPass:{name}] panicked: {message}");
                    (PassOutcome::Failed(message), PassStats::default())
                }
            };
            report.passes.push(PassReport {
                name,
                outcome,
                stats,
            });
        }
        report
    }
}

/// Run the standard pass list.
pub fn render_map(ctx: &RenderContext<'_>, canvas: &mut Pixmap) -> RenderReport {
    LabelPipeline::standard().run(ctx, canvas)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
