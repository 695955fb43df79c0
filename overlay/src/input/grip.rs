//! Grip manipulation: while a controller holds grip, the panel keeps the
//! pose it had relative to that controller when the grip began.
//!
//! At grip start the controller's inverse pose and the panel's world pose
//! are recorded once. Every later tick composes
//! `delta = current · start⁻¹` and re-poses the panel to
//! `delta · start_panel`, so nothing accumulates across ticks.

use tracing::{debug, info, warn};

use crate::error::{RuntimeError, RuntimeResult};
use crate::math::Pose;
use crate::runtime::{ControllerId, OverlayRuntime, PanelHandle, PoseSource, TransformKind};

/// The single active grip.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub controller: ControllerId,
    start_controller_pose: Pose,
    inverse_start_pose: Pose,
    start_panel_pose: Pose,
}

impl DragSession {
    /// Record a grip start. `None` if the controller pose cannot be inverted.
    pub fn begin(controller: ControllerId, controller_pose: &Pose, panel_pose: Pose) -> Option<Self> {
        let inverse_start_pose = controller_pose.inverse()?;
        Some(Self {
            controller,
            start_controller_pose: *controller_pose,
            inverse_start_pose,
            start_panel_pose: panel_pose,
        })
    }

    pub fn start_panel_pose(&self) -> &Pose {
        &self.start_panel_pose
    }

    /// Panel pose for the controller's current pose; `None` if the result
    /// is not a finite transform.
    pub fn panel_pose_for(&self, current: &Pose) -> Option<Pose> {
        if *current == self.start_controller_pose {
            return Some(self.start_panel_pose);
        }
        let delta = current.mul(&self.inverse_start_pose);
        let pose = delta.mul(&self.start_panel_pose);
        pose.is_finite().then_some(pose)
    }
}

/// Resolve a panel's world pose from whichever representation the runtime
/// holds. Absolute poses are read directly, falling back to the
/// device-relative path if that read fails; device-relative poses are
/// reconstructed as `device_pose · relative`.
pub fn panel_world_pose<R>(runtime: &R, panel: PanelHandle) -> RuntimeResult<Pose>
where
    R: PoseSource + OverlayRuntime + ?Sized,
{
    match runtime.transform_kind(panel)? {
        TransformKind::Absolute => match runtime.absolute_pose(panel) {
            Ok(pose) => Ok(pose),
            Err(e) => {
                warn!("absolute panel pose unavailable ({}), trying device-relative", e);
                relative_as_world(runtime, panel)
            }
        },
        TransformKind::TrackedDeviceRelative => relative_as_world(runtime, panel),
    }
}

fn relative_as_world<R>(runtime: &R, panel: PanelHandle) -> RuntimeResult<Pose>
where
    R: PoseSource + OverlayRuntime + ?Sized,
{
    let rel = runtime.relative_transform(panel)?;
    let device = runtime
        .device_pose(rel.device)?
        .ok_or(RuntimeError::PoseUnavailable(rel.device))?;
    Ok(device.mul(&rel.transform))
}

/// Result of one grip tick for one controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GripUpdate {
    /// Nothing to do for this controller.
    Idle,
    Started,
    /// Apply this absolute pose to the panel.
    Moved(Pose),
    Ended,
}

/// Owner of the (at most one) drag session.
#[derive(Debug, Default)]
pub struct GripController {
    session: Option<DragSession>,
}

impl GripController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    pub fn owner(&self) -> Option<ControllerId> {
        self.session.as_ref().map(|s| s.controller)
    }

    /// Advance one controller. `pose` is `None` when the controller has no
    /// valid tracking sample this tick.
    pub fn update<R>(
        &mut self,
        runtime: &R,
        panel: PanelHandle,
        id: ControllerId,
        pose: Option<&Pose>,
        grip: bool,
    ) -> GripUpdate
    where
        R: PoseSource + OverlayRuntime + ?Sized,
    {
        match &self.session {
            None => {
                let (true, Some(pose)) = (grip, pose) else {
                    return GripUpdate::Idle;
                };
                self.start(runtime, panel, id, pose)
            }
            Some(session) if session.controller == id => {
                if !grip {
                    self.end();
                    return GripUpdate::Ended;
                }
                let Some(pose) = pose else {
                    warn!("grip: controller {} lost tracking, ending drag", id);
                    self.end();
                    return GripUpdate::Ended;
                };
                match session.panel_pose_for(pose) {
                    Some(next) => GripUpdate::Moved(next),
                    None => {
                        warn!("grip: pose math failed for controller {}, ending drag", id);
                        self.end();
                        GripUpdate::Ended
                    }
                }
            }
            Some(_) => GripUpdate::Idle,
        }
    }

    fn start<R>(&mut self, runtime: &R, panel: PanelHandle, id: ControllerId, pose: &Pose) -> GripUpdate
    where
        R: PoseSource + OverlayRuntime + ?Sized,
    {
        let panel_pose = match panel_world_pose(runtime, panel) {
            Ok(p) => p,
            Err(e) => {
                warn!("grip: cannot read panel pose: {}", e);
                return GripUpdate::Idle;
            }
        };
        match DragSession::begin(id, pose, panel_pose) {
            Some(session) => {
                info!("grip: drag started with controller {}", id);
                self.session = Some(session);
                GripUpdate::Started
            }
            None => {
                warn!("grip: controller {} pose is not invertible", id);
                GripUpdate::Idle
            }
        }
    }

    /// End the active session, if any.
    pub fn end(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("grip: drag ended for controller {}", session.controller);
        }
    }

    /// End the session if `id` owns it. Returns whether it did.
    pub fn end_if_owner(&mut self, id: ControllerId) -> bool {
        if self.owner() == Some(id) {
            self.end();
            return true;
        }
        false
    }
}
