//! Spawn/reset placement relative to the headset.

use crate::config::{SpawnConfig, SpawnOrientation};
use crate::math::{Pose, Quat, Vec3};

/// Panel pose for a headset at `hmd`, or `None` when the headset rotation
/// is degenerate (an invalid tracking sample).
///
/// Position is the configured head-local offset rotated into world space.
/// With `YawOnly` the panel keeps only the head's heading, so looking down
/// or tilting the head at reset time still yields a level panel.
pub fn spawn_pose(hmd: &Pose, spawn: &SpawnConfig) -> Option<Pose> {
    let q = hmd.rotation();
    if q.is_degenerate() {
        return None;
    }

    let position = hmd.translation() + q.rotate(spawn.offset);
    let tilt = Pose::from_rotation_translation(
        &Quat::from_axis_angle(Vec3::X, spawn.tilt_deg.to_radians()),
        Vec3::ZERO,
    );

    let base = match spawn.orientation {
        SpawnOrientation::YawOnly => yaw_basis(&q, position),
        SpawnOrientation::FullHead => Pose::from_rotation_translation(&q, position),
    };
    let pose = base.mul(&tilt);
    pose.is_finite().then_some(pose)
}

const HEADING_EPSILON: f64 = 1e-5;

fn yaw_basis(q: &Quat, position: Vec3) -> Pose {
    // The panel's +Z faces back toward the viewer, like the head's +Z.
    let back = q.rotate(Vec3::Z);
    let flat = Vec3::new(back.x, 0.0, back.z);
    // Looking straight up or down: no heading to keep.
    let flat = if flat.length() < HEADING_EPSILON {
        -Vec3::Z
    } else {
        flat.normalize()
    };
    let right = Vec3::Y.cross(flat);
    let right = if right.length() < HEADING_EPSILON {
        Vec3::X
    } else {
        right.normalize()
    };
    let up = flat.cross(right);
    Pose::from_basis(right, up, flat, position)
}
