use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::RgbaImage;
use image::imageops::{self, FilterType};
use tiny_skia::Pixmap;

use crate::error::{MapGenError, Result};
use crate::render::pixmap_from_rgba;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IconKey {
    path: String,
    width: u32,
    height: u32,
}

/// Decoded and resized bitmap assets, shared for the whole render.
///
/// Originals are keyed by path (case-insensitively), resized variants by the
/// exact `(path, width, height)` the caller asks for. Two threads racing on
/// the same key may both decode; the first insert wins and both callers get
/// the cached `Arc`.
#[derive(Default)]
pub struct IconCache {
    originals: Mutex<HashMap<String, Arc<RgbaImage>>>,
    resized: Mutex<HashMap<IconKey, Arc<Pixmap>>>,
}

impl IconCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn original(&self, path: &Path) -> Result<Arc<RgbaImage>> {
        let key = cache_key(path);
        if let Some(hit) = self.originals.lock().ok().and_then(|map| map.get(&key).cloned()) {
            return Ok(hit);
        }
        let decoded = Arc::new(decode(path)?);
        let mut map = self
            .originals
            .lock()
            .map_err(|_| MapGenError::missing("icon cache", path))?;
        Ok(map.entry(key).or_insert(decoded).clone())
    }

    /// The icon at `path` resized to exactly `width × height`.
    pub fn resized(&self, path: &Path, width: u32, height: u32) -> Result<Arc<Pixmap>> {
        let key = IconKey {
            path: cache_key(path),
            width: width.max(1),
            height: height.max(1),
        };
        if let Some(hit) = self.resized.lock().ok().and_then(|map| map.get(&key).cloned()) {
            return Ok(hit);
        }
        let original = self.original(path)?;
        let scaled = if original.dimensions() == (key.width, key.height) {
            original.as_ref().clone()
        } else {
            imageops::resize(original.as_ref(), key.width, key.height, FilterType::Triangle)
        };
        let pixmap = Arc::new(pixmap_from_rgba(&scaled)?);
        let mut map = self
            .resized
            .lock()
            .map_err(|_| MapGenError::missing("icon cache", path))?;
        Ok(map.entry(key).or_insert(pixmap).clone())
    }

    /// The icon scaled to fit inside `box_w × box_h` with its aspect ratio kept.
    pub fn fitted(&self, path: &Path, box_w: u32, box_h: u32) -> Result<Arc<Pixmap>> {
        let original = self.original(path)?;
        let (w, h) = fit_within(original.width(), original.height(), box_w, box_h);
        self.resized(path, w, h)
    }

    pub fn len(&self) -> usize {
        self.resized.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut map) = self.originals.lock() {
            map.clear();
        }
        if let Ok(mut map) = self.resized.lock() {
            map.clear();
        }
    }
}

/// Aspect-preserving target size: `scale = min(box_w/src_w, box_h/src_h)`,
/// each side rounded and at least one pixel.
pub fn fit_within(src_w: u32, src_h: u32, box_w: u32, box_h: u32) -> (u32, u32) {
    if src_w == 0 || src_h == 0 {
        return (box_w.max(1), box_h.max(1));
    }
    let scale = (box_w as f64 / src_w as f64).min(box_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).max(1);
    let h = ((src_h as f64 * scale).round() as u32).max(1);
    (w, h)
}

fn cache_key(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| PathBuf::from(path));
    absolute.to_string_lossy().to_lowercase()
}

fn decode(path: &Path) -> Result<RgbaImage> {
    let bytes = std::fs::read(path).map_err(|e| MapGenError::io(path, e))?;
    let image = image::load_from_memory(&bytes).map_err(|source| MapGenError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.into_rgba8())
}
