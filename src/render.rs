use std::path::Path;

use image::RgbaImage;
use tiny_skia::{IntSize, Pixmap, PixmapPaint, Transform};

use crate::error::{MapGenError, Result};

/// Decode any raster the `image` crate understands into a canvas.
pub fn load_canvas(path: &Path) -> Result<Pixmap> {
    let bytes = std::fs::read(path).map_err(|e| MapGenError::io(path, e))?;
    let image = image::load_from_memory(&bytes).map_err(|source| MapGenError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    pixmap_from_rgba(&image.into_rgba8())
}

/// Straight-alpha RGBA to a premultiplied pixmap.
pub fn pixmap_from_rgba(image: &RgbaImage) -> Result<Pixmap> {
    let (width, height) = image.dimensions();
    let size = IntSize::from_wh(width, height).ok_or(MapGenError::Layer { width, height })?;
    let mut data = image.as_raw().clone();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
    Pixmap::from_vec(data, size).ok_or(MapGenError::Layer { width, height })
}

pub fn new_layer(width: u32, height: u32) -> Result<Pixmap> {
    Pixmap::new(width, height).ok_or(MapGenError::Layer { width, height })
}

/// Source-over `layer` onto `canvas` with its top-left at `(x, y)`.
pub fn composite(canvas: &mut Pixmap, layer: &Pixmap, x: i32, y: i32) {
    canvas.draw_pixmap(
        x,
        y,
        layer.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
}

/// Composite `layer` centered on `(cx, cy)`.
pub fn composite_centered(canvas: &mut Pixmap, layer: &Pixmap, cx: i32, cy: i32) {
    let x = (cx as f64 - layer.width() as f64 / 2.0).round() as i32;
    let y = (cy as f64 - layer.height() as f64 / 2.0).round() as i32;
    composite(canvas, layer, x, y);
}

pub fn write_output_png(canvas: &Pixmap, output: &Path) -> anyhow::Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    canvas.save_png(output)?;
    Ok(())
}
