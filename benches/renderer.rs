use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use nightmap_renderer::classify::classify;
use nightmap_renderer::halo::{pad_for, render_halo};
use nightmap_renderer::style::{GlowStyle, TextStyle};
use nightmap_renderer::text::TextRenderer;
use nightmap_renderer::text_metrics::FontBook;
use std::hint::black_box;
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Rect, Transform};

const NAMES: [&str; 12] = [
    "Camp - Gatefront",
    "Fort - Stormhill",
    "Great Church - East",
    "Ruins - Lowland",
    "Church - West",
    "Small Camp - Pond",
    "Sorcerers Rise - Tower",
    "Township - Township",
    "Event - Scale-Bearing Merchant",
    "Arena Boss - Ulcerated",
    "Night Boss - Gaping Jaw (Day 1)",
    "Spiritstream - North",
];

fn glyph_mask(width: u32, height: u32, pad: u32) -> Pixmap {
    let mut mask = Pixmap::new(width + 2 * pad, height + 2 * pad).unwrap();
    let mut builder = PathBuilder::new();
    let glyph = width as f32 / 12.0;
    for i in 0..10 {
        let x = pad as f32 + i as f32 * glyph * 1.2;
        if let Some(rect) = Rect::from_xywh(x, pad as f32, glyph, height as f32) {
            builder.push_rect(rect);
        }
    }
    let path = builder.finish().unwrap();
    let mut paint = Paint::default();
    paint.set_color_rgba8(255, 255, 255, 255);
    mask.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    mask
}

fn bench_halo(c: &mut Criterion) {
    let mut group = c.benchmark_group("halo");
    for (name, widen, blur) in [("tight", 1u32, 1.5f32), ("standard", 3, 5.0), ("wide", 6, 10.0)] {
        let glow = GlowStyle {
            widen_radius: widen,
            blur_radius: blur,
            ..GlowStyle::default()
        };
        let mask = glyph_mask(240, 32, pad_for(&glow));
        group.bench_with_input(BenchmarkId::from_parameter(name), &mask, |b, mask| {
            b.iter(|| render_halo(black_box(mask), &glow).unwrap())
        });
    }
    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    c.bench_function("classify_names", |b| {
        b.iter(|| {
            NAMES
                .iter()
                .filter_map(|name| classify(black_box(name), None))
                .count()
        })
    });
}

fn bench_label(c: &mut Criterion) {
    let fonts = FontBook::without_system_fonts(".");
    let text = TextRenderer::new(&fonts);
    let style = TextStyle {
        glow: Some(GlowStyle::default()),
        ..TextStyle::default()
    };
    c.bench_function("draw_glow_label", |b| {
        b.iter(|| {
            let mut canvas = Pixmap::new(512, 128).unwrap();
            let block = text.layout_block(black_box("Stormhill Fort\\nDay 2"), &style);
            text.draw(&mut canvas, &block, 256, 64).unwrap();
            canvas
        })
    });
}

criterion_group!(benches, bench_halo, bench_classify, bench_label);
criterion_main!(benches);
