//! Controller ray → panel UV.
//!
//! The geometric intersection itself is delegated to the runtime; this
//! module derives the ray from the device pose and folds every failure
//! into "no hit".

use tracing::{trace, warn};

use crate::math::Pose;
use crate::runtime::{OverlayRuntime, PanelHandle};

/// Panel-local hit, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    pub u: f64,
    pub v: f64,
}

impl HitResult {
    pub fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }
}

/// Cast the device's forward ray against `panel`.
///
/// Returns `None` on a miss, on a runtime error, or when the pose or the
/// reported UV is not finite. A UV a hair outside the panel edge is clamped
/// into `[0, 1]`.
pub fn resolve_hit<R>(runtime: &R, panel: PanelHandle, pose: &Pose) -> Option<HitResult>
where
    R: OverlayRuntime + ?Sized,
{
    if !pose.is_finite() {
        trace!("hit: skipping non-finite pose");
        return None;
    }

    let origin = pose.translation();
    let direction = pose.forward();

    match runtime.intersect(panel, origin, direction) {
        Ok(Some(hit)) if hit.u.is_finite() && hit.v.is_finite() => {
            Some(HitResult::new(hit.u.clamp(0.0, 1.0), hit.v.clamp(0.0, 1.0)))
        }
        Ok(_) => None,
        Err(e) => {
            warn!("controller hit test failed: {}", e);
            None
        }
    }
}
