/// Side length of the reference canvas world coordinates are authored against.
pub const REFERENCE_SIZE: f64 = 1536.0;

/// Map a world `(x, z)` coordinate to a canvas pixel.
///
/// The world origin sits at the canvas center and `z` grows upwards, so the
/// vertical axis is inverted. Both axes scale with the canvas relative to the
/// 1536px reference. `f64::round` rounds halves away from zero.
pub fn project(x: f64, z: f64, canvas_width: u32, canvas_height: u32) -> (i32, i32) {
    let w = canvas_width as f64;
    let h = canvas_height as f64;
    let px = (w / 2.0 + x * w / REFERENCE_SIZE).round();
    let py = (h / 2.0 - z * h / REFERENCE_SIZE).round();
    (px as i32, py as i32)
}
