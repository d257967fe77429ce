use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};

use crate::error::Result;
use crate::halo::{pad_for, render_halo};
use crate::overrides::Anchor;
use crate::render::{composite, new_layer};
use crate::style::{GlowStyle, TextStyle};
use crate::text_metrics::FontBook;

/// Vertical gap between lines of one block.
pub const LINE_SPACING: u32 = 4;

/// One styled piece of text positioned inside its block.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub style: TextStyle,
    pub x: f32,
    pub baseline: f32,
}

/// Measured text, positioned relative to its own top-left corner.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextBlock {
    pub width: u32,
    pub height: u32,
    pub runs: Vec<TextRun>,
}

impl TextBlock {
    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|run| run.text.trim().is_empty())
    }
}

/// Split on `\r\n`, `\n` and the two-character `\n` escape found in data files.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split("\r\n")
        .flat_map(|part| part.split('\n'))
        .flat_map(|part| part.split("\\n"))
        .collect()
}

struct LineSpec<'t> {
    spans: Vec<(&'t str, &'t TextStyle)>,
}

struct MeasuredLine {
    width: f32,
    ascent: f32,
    height: u32,
    widths: Vec<f32>,
}

pub struct TextRenderer<'a> {
    fonts: &'a FontBook,
}

impl<'a> TextRenderer<'a> {
    pub fn new(fonts: &'a FontBook) -> Self {
        Self { fonts }
    }

    pub fn measure(&self, text: &str, style: &TextStyle) -> f32 {
        self.fonts.face(&style.font_path).measure(text, style.size_px)
    }

    /// One style, any number of lines.
    pub fn layout_block(&self, text: &str, style: &TextStyle) -> TextBlock {
        let lines = split_lines(text)
            .into_iter()
            .map(|line| LineSpec {
                spans: vec![(line, style)],
            })
            .collect();
        self.layout(lines, LINE_SPACING)
    }

    /// A differently styled block stacked above the main one, both centered as a unit.
    pub fn layout_stacked(
        &self,
        top: &str,
        top_style: &TextStyle,
        main: &str,
        main_style: &TextStyle,
        spacing: u32,
    ) -> TextBlock {
        let mut lines: Vec<LineSpec<'_>> = split_lines(top)
            .into_iter()
            .map(|line| LineSpec {
                spans: vec![(line, top_style)],
            })
            .collect();
        lines.extend(split_lines(main).into_iter().map(|line| LineSpec {
            spans: vec![(line, main_style)],
        }));
        self.layout(lines, spacing)
    }

    /// A single line built from consecutive spans of different styles.
    pub fn layout_spans(&self, spans: &[(String, TextStyle)]) -> TextBlock {
        let line = LineSpec {
            spans: spans.iter().map(|(text, style)| (text.as_str(), style)).collect(),
        };
        self.layout(vec![line], LINE_SPACING)
    }

    fn measure_line(&self, line: &LineSpec<'_>) -> MeasuredLine {
        let mut ascent = 0.0f32;
        let mut descent = 0.0f32;
        let mut widths = Vec::with_capacity(line.spans.len());
        for (text, style) in &line.spans {
            let face = self.fonts.face(&style.font_path);
            let v = face.vertical(style.size_px);
            ascent = ascent.max(v.ascent);
            descent = descent.max(v.descent);
            widths.push(face.measure(text, style.size_px));
        }
        MeasuredLine {
            width: widths.iter().sum(),
            ascent,
            height: (ascent + descent).ceil().max(1.0) as u32,
            widths,
        }
    }

    fn layout(&self, lines: Vec<LineSpec<'_>>, spacing: u32) -> TextBlock {
        let measured: Vec<MeasuredLine> = lines.iter().map(|l| self.measure_line(l)).collect();
        if measured.is_empty() {
            return TextBlock::default();
        }
        let width = measured
            .iter()
            .map(|m| m.width.ceil() as u32)
            .max()
            .unwrap_or(0);
        let height = measured.iter().map(|m| m.height).sum::<u32>()
            + spacing * (measured.len() as u32 - 1);

        let mut runs = Vec::new();
        let mut top = 0u32;
        for (line, m) in lines.iter().zip(&measured) {
            let mut x = ((width as f32 - m.width) / 2.0).floor();
            let baseline = top as f32 + m.ascent.round();
            for ((text, style), w) in line.spans.iter().zip(&m.widths) {
                runs.push(TextRun {
                    text: (*text).to_string(),
                    style: (*style).clone(),
                    x,
                    baseline,
                });
                x += w;
            }
            top += m.height + spacing;
        }
        TextBlock { width, height, runs }
    }

    /// Draw `block` centered on `(cx, cy)`: halos first, crisp text on top.
    pub fn draw(&self, canvas: &mut Pixmap, block: &TextBlock, cx: i32, cy: i32) -> Result<()> {
        if block.is_empty() || block.width == 0 {
            return Ok(());
        }
        let left = cx - (block.width / 2) as i32;
        let top = cy - (block.height / 2) as i32;

        let mut glows: Vec<GlowStyle> = Vec::new();
        for glow in block.runs.iter().filter_map(|r| r.style.glow) {
            if glow.is_visible() && !glows.contains(&glow) {
                glows.push(glow);
            }
        }
        for glow in &glows {
            let pad = pad_for(glow);
            let mut mask = new_layer(block.width + 2 * pad, block.height + 2 * pad)?;
            let shift = Transform::from_translate(
                (pad as i32 + glow.offset_x) as f32,
                (pad as i32 + glow.offset_y) as f32,
            );
            for run in block.runs.iter().filter(|r| r.style.glow.as_ref() == Some(glow)) {
                self.fill_run(&mut mask, run, tiny_skia::ColorU8::from_rgba(255, 255, 255, 255), shift);
            }
            if let Some(halo) = render_halo(&mask, glow)? {
                composite(canvas, &halo, left - pad as i32, top - pad as i32);
            }
        }

        let mut layer = new_layer(block.width, block.height)?;
        for run in &block.runs {
            self.fill_run(&mut layer, run, run.style.fill, Transform::identity());
        }
        composite(canvas, &layer, left, top);
        Ok(())
    }

    /// Single style, possibly multi-line, with the anchor deciding which
    /// edge sits on `cx`.
    pub fn draw_label(
        &self,
        canvas: &mut Pixmap,
        text: &str,
        style: &TextStyle,
        cx: i32,
        cy: i32,
        anchor: Anchor,
    ) -> Result<TextBlock> {
        if text.trim().is_empty() {
            return Ok(TextBlock::default());
        }
        let block = self.layout_block(text, style);
        self.draw(canvas, &block, anchor.apply(cx, block.width), cy)?;
        Ok(block)
    }

    fn fill_run(&self, layer: &mut Pixmap, run: &TextRun, color: tiny_skia::ColorU8, transform: Transform) {
        let face = self.fonts.face(&run.style.font_path);
        let mut builder = PathBuilder::new();
        face.outline(&run.text, run.style.size_px, run.x, run.baseline, &mut builder);
        let Some(path) = builder.finish() else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.red(), color.green(), color.blue(), color.alpha());
        paint.anti_alias = true;
        layer.fill_path(&path, &paint, FillRule::Winding, transform, None);
    }
}
