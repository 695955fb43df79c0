//! Interfaces to the VR runtime.
//!
//! The runtime is split along the two roles it plays: `PoseSource` reports
//! tracked devices, poses and buttons once per tick; `OverlayRuntime` owns
//! the composited panels (creation, placement, texture upload, visibility)
//! and the ray/panel intersection query.

use crate::error::RuntimeResult;
use crate::math::{Pose, Vec3};

/// Tracked device index. `HMD_DEVICE` is the headset and never a pointer source.
pub type ControllerId = u32;

/// Device index of the head-mounted display.
pub const HMD_DEVICE: ControllerId = 0;

/// Opaque reference to a runtime overlay object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelHandle(pub u64);

/// Digital button state for one controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pub trigger: bool,
    pub grip: bool,
}

/// Result of a ray/panel intersection query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// Panel-local U in [0, 1], origin left.
    pub u: f64,
    /// Panel-local V in [0, 1], origin bottom.
    pub v: f64,
    /// World-space hit point.
    pub point: Vec3,
    pub distance: f64,
}

/// How the runtime currently stores a panel's placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Absolute,
    TrackedDeviceRelative,
}

/// A panel placement relative to a tracked device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeTransform {
    pub device: ControllerId,
    pub transform: Pose,
}

/// Per-tick source of tracking data.
pub trait PoseSource {
    /// Indices of connected controllers. May include `HMD_DEVICE`; callers skip it.
    fn tracked_controllers(&self) -> RuntimeResult<Vec<ControllerId>>;

    /// World pose of a device. `Ok(None)` means the device is connected but
    /// has no valid tracking sample this tick.
    fn device_pose(&self, id: ControllerId) -> RuntimeResult<Option<Pose>>;

    /// Digital trigger/grip state.
    fn button_state(&self, id: ControllerId) -> RuntimeResult<ButtonState>;
}

/// Panel management and geometric queries.
pub trait OverlayRuntime {
    fn create_panel(&mut self, key: &str, name: &str) -> RuntimeResult<PanelHandle>;

    fn set_width(&mut self, panel: PanelHandle, meters: f64) -> RuntimeResult<()>;

    /// Intersect a world-space ray with the panel. `Ok(None)` is a miss.
    fn intersect(
        &self,
        panel: PanelHandle,
        origin: Vec3,
        direction: Vec3,
    ) -> RuntimeResult<Option<Intersection>>;

    fn transform_kind(&self, panel: PanelHandle) -> RuntimeResult<TransformKind>;

    fn absolute_pose(&self, panel: PanelHandle) -> RuntimeResult<Pose>;

    fn relative_transform(&self, panel: PanelHandle) -> RuntimeResult<RelativeTransform>;

    fn set_absolute_pose(&mut self, panel: PanelHandle, pose: &Pose) -> RuntimeResult<()>;

    /// Attach the panel `distance` meters in front of the headset.
    fn attach_to_hmd(&mut self, panel: PanelHandle, distance: f64) -> RuntimeResult<()>;

    /// Upload tightly packed 4-byte pixels.
    fn upload_texture(
        &mut self,
        panel: PanelHandle,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> RuntimeResult<()>;

    fn show(&mut self, panel: PanelHandle) -> RuntimeResult<()>;

    fn hide(&mut self, panel: PanelHandle) -> RuntimeResult<()>;
}

/// Everything the service needs from the runtime.
pub trait VrRuntime: PoseSource + OverlayRuntime {}

impl<T: PoseSource + OverlayRuntime> VrRuntime for T {}
