//! Panel UV → surface pixel coordinates.

use crate::surface::{PixelPos, SurfaceMetrics};

/// Map a panel UV (origin bottom-left) to a pixel in the surface's pointer
/// space (origin top-left). UV is clamped to [0, 1] first, so the result
/// always lies inside the surface.
pub fn uv_to_pixel(u: f64, v: f64, metrics: &SurfaceMetrics) -> PixelPos {
    let (w, h) = metrics.pointer_space();
    let u = u.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);
    let x = (u * f64::from(w - 1)).round();
    let y = ((1.0 - v) * f64::from(h - 1)).round();
    PixelPos::new(x as i32, y as i32)
}

/// Like [`uv_to_pixel`], but `None` when the surface has no size yet or
/// the UV is not finite.
pub fn map_uv(u: f64, v: f64, metrics: Option<&SurfaceMetrics>) -> Option<PixelPos> {
    if !u.is_finite() || !v.is_finite() {
        return None;
    }
    metrics.map(|m| uv_to_pixel(u, v, m))
}
