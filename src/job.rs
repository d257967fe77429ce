use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::backdrop::apply_backdrops;
use crate::config::AppConfig;
use crate::error::MapGenError;
use crate::model::{find_pattern, load_index, load_pattern, load_summary};
use crate::pipeline::{RenderContext, RenderReport, render_map};
use crate::render::{load_canvas, write_output_png};
use crate::session::RenderSession;

/// What one render produced.
#[derive(Debug, Clone)]
pub struct RenderedMap {
    pub pattern_id: String,
    pub output: PathBuf,
    pub report: RenderReport,
}

/// Default output location: `{OutputFolder}/{id}.png`.
pub fn default_output(config: &AppConfig, pattern_id: &str) -> PathBuf {
    config.output_folder.join(format!("{pattern_id}.png"))
}

/// Render one pattern file to a PNG.
///
/// Every input is read before anything is drawn, so a missing background,
/// pattern, summary row or index fails without writing output. Problems
/// inside the backdrop step or a single pass only cost that piece.
pub fn render_pattern(
    config: AppConfig,
    pattern_path: &Path,
    output: Option<&Path>,
) -> anyhow::Result<RenderedMap> {
    let pattern = load_pattern(pattern_path)
        .with_context(|| format!("failed to load pattern {}", pattern_path.display()))?;
    let rows = load_summary(&config.summary_path)?;
    let summary = find_pattern(&rows, &pattern.id)
        .ok_or_else(|| MapGenError::PatternNotInSummary(pattern.id.clone()))?;
    let index = load_index(&config.index_path)?;
    let mut canvas = load_canvas(&config.background_path).context("failed to load background")?;
    tracing::info!(
        pattern = %pattern.id,
        pois = pattern.pois.len(),
        width = canvas.width(),
        height = canvas.height(),
        "rendering pattern"
    );

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output(&config, &pattern.id));
    let session = RenderSession::new(config);

    let skipped = apply_backdrops(&mut canvas, summary, &session);
    if skipped > 0 {
        tracing::warn!(skipped, "some overlays could not be applied");
    }
    let ctx = RenderContext {
        session: &session,
        pois: &pattern.pois,
        index: &index,
        pattern_id: &pattern.id,
        summary: Some(summary),
    };
    let report = render_map(&ctx, &mut canvas);

    write_output_png(&canvas, &output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!(output = %output.display(), failed_passes = report.failures().count(), "wrote map");
    session.clear();

    Ok(RenderedMap {
        pattern_id: pattern.id,
        output,
        report,
    })
}
