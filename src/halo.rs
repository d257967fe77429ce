use image::imageops;
use image::{GrayImage, Luma};
use tiny_skia::{IntSize, Pixmap};

use crate::error::{MapGenError, Result};
use crate::style::GlowStyle;

/// Residual alpha at or below this fraction is cut after blurring.
const ALPHA_FLOOR: f32 = 0.07;

/// Transparent border a glyph layer needs so the halo is never clipped.
pub fn pad_for(glow: &GlowStyle) -> u32 {
    let blur = (6.0 * glow.blur_radius.max(0.0)).ceil() as u32;
    let offset = glow.offset_x.unsigned_abs().max(glow.offset_y.unsigned_abs());
    blur + 2 * glow.widen_radius + offset + 8
}

/// Turn a glyph mask (only alpha is read) into a colored halo layer of the
/// same size. `None` when the glow is invisible.
pub fn render_halo(mask: &Pixmap, glow: &GlowStyle) -> Result<Option<Pixmap>> {
    if !glow.is_visible() {
        return Ok(None);
    }
    let (width, height) = (mask.width(), mask.height());
    let mut alpha = GrayImage::from_fn(width, height, |x, y| {
        Luma([mask.pixel(x, y).map(|p| p.alpha()).unwrap_or(0)])
    });
    for _ in 0..glow.widen_radius {
        alpha = dilate(&alpha);
    }
    if glow.blur_radius > 0.0 {
        alpha = imageops::blur(&alpha, glow.blur_radius);
    }

    let strength = (glow.opacity_percent / 100.0).clamp(0.0, 1.0) * glow.color.alpha() as f32 / 255.0;
    let (r, g, b) = (glow.color.red(), glow.color.green(), glow.color.blue());
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for Luma([a]) in alpha.pixels() {
        let a = (level(*a as f32 / 255.0) * strength * 255.0).round() as u16;
        let premul = |c: u8| ((c as u16 * a + 127) / 255) as u8;
        data.extend_from_slice(&[premul(r), premul(g), premul(b), a as u8]);
    }
    let size = IntSize::from_wh(width, height).ok_or(MapGenError::Layer { width, height })?;
    Pixmap::from_vec(data, size)
        .map(Some)
        .ok_or(MapGenError::Layer { width, height })
}

fn level(a: f32) -> f32 {
    if a <= ALPHA_FLOOR {
        0.0
    } else {
        ((a - ALPHA_FLOOR) / (1.0 - ALPHA_FLOOR)).min(1.0)
    }
}

/// One step of a diamond (4-neighbour) max filter.
fn dilate(src: &GrayImage) -> GrayImage {
    let (w, h) = src.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let mut v = src.get_pixel(x, y)[0];
        if x > 0 {
            v = v.max(src.get_pixel(x - 1, y)[0]);
        }
        if x + 1 < w {
            v = v.max(src.get_pixel(x + 1, y)[0]);
        }
        if y > 0 {
            v = v.max(src.get_pixel(x, y - 1)[0]);
        }
        if y + 1 < h {
            v = v.max(src.get_pixel(x, y + 1)[0]);
        }
        Luma([v])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::{Color, ColorU8};

    fn dot_mask() -> Pixmap {
        let mut mask = Pixmap::new(21, 21).unwrap();
        let rect = tiny_skia::Rect::from_xywh(10.0, 10.0, 1.0, 1.0).unwrap();
        let mut paint = tiny_skia::Paint::default();
        paint.set_color(Color::WHITE);
        mask.fill_rect(rect, &paint, tiny_skia::Transform::identity(), None);
        mask
    }

    #[test]
    fn pad_covers_blur_widen_and_offset() {
        let glow = GlowStyle {
            blur_radius: 2.5,
            widen_radius: 3,
            offset_x: -4,
            offset_y: 2,
            ..GlowStyle::default()
        };
        assert_eq!(pad_for(&glow), 15 + 6 + 4 + 8);
    }

    #[test]
    fn dilation_grows_a_diamond() {
        let glow = GlowStyle {
            blur_radius: 0.0,
            widen_radius: 2,
            color: ColorU8::from_rgba(255, 0, 0, 255),
            ..GlowStyle::default()
        };
        let halo = render_halo(&dot_mask(), &glow).unwrap().unwrap();
        assert_eq!(halo.pixel(12, 10).unwrap().alpha(), 255);
        assert_eq!(halo.pixel(11, 11).unwrap().alpha(), 255);
        assert_eq!(halo.pixel(12, 11).unwrap().alpha(), 0);
        assert_eq!(halo.pixel(13, 10).unwrap().alpha(), 0);
        assert_eq!(halo.pixel(12, 10).unwrap().red(), 255);
    }

    #[test]
    fn opacity_scales_and_zero_disables() {
        let mut glow = GlowStyle {
            blur_radius: 0.0,
            widen_radius: 0,
            opacity_percent: 50.0,
            ..GlowStyle::default()
        };
        let halo = render_halo(&dot_mask(), &glow).unwrap().unwrap();
        assert_eq!(halo.pixel(10, 10).unwrap().alpha(), 128);
        glow.opacity_percent = 0.0;
        assert!(render_halo(&dot_mask(), &glow).unwrap().is_none());
    }

    fn square_mask(size: u32, side: u32) -> Pixmap {
        let mut mask = Pixmap::new(size, size).unwrap();
        let at = ((size - side) / 2) as f32;
        let rect = tiny_skia::Rect::from_xywh(at, at, side as f32, side as f32).unwrap();
        let mut paint = tiny_skia::Paint::default();
        paint.set_color(Color::WHITE);
        mask.fill_rect(rect, &paint, tiny_skia::Transform::identity(), None);
        mask
    }

    #[test]
    fn blur_fringe_under_the_floor_is_transparent() {
        let glow = GlowStyle {
            blur_radius: 3.0,
            widen_radius: 0,
            ..GlowStyle::default()
        };
        let mask = square_mask(41, 9);
        let halo = render_halo(&mask, &glow).unwrap().unwrap();
        let raw = imageops::blur(
            &GrayImage::from_fn(41, 41, |x, y| Luma([mask.pixel(x, y).unwrap().alpha()])),
            3.0,
        );
        let floor = (ALPHA_FLOOR * 255.0).floor() as u8;
        let mut fringe = 0;
        for (x, y, Luma([a])) in raw.enumerate_pixels() {
            let out = halo.pixel(x, y).unwrap().alpha();
            if *a <= floor {
                assert_eq!(out, 0, "faint halo left at ({x}, {y})");
                if *a > 0 {
                    fringe += 1;
                }
            }
            if *a >= 128 {
                assert!(out > 0);
            }
        }
        assert!(fringe > 0);
    }

    #[test]
    fn faint_blur_tail_is_cut() {
        assert_eq!(level(0.05), 0.0);
        assert_eq!(level(1.0), 1.0);
        assert!(level(0.5) > 0.45 && level(0.5) < 0.5);
    }
}
