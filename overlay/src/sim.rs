//! In-process VR runtime and render surface.
//!
//! `SimRuntime` keeps panel and device state in memory and answers ray
//! queries geometrically, so the headless backend and the tests exercise
//! the same code paths a real runtime would. Both types can be told to
//! misbehave (failed calls, deferred or mis-sized frames, destruction).

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use crate::error::{RuntimeError, RuntimeResult, SurfaceError, SurfaceResult};
use crate::math::{Pose, Vec3};
use crate::runtime::{
    ButtonState, ControllerId, Intersection, OverlayRuntime, PanelHandle, PoseSource, RelativeTransform,
    TransformKind, HMD_DEVICE,
};
use crate::surface::{ControllerNotice, Frame, FrameRequest, PointerEvent, RenderSurface, SurfaceMetrics};

// ── SimRuntime ───────────────────────────────────────────────

/// Mutating calls, in order, for assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeCall {
    Create(PanelHandle),
    SetWidth(PanelHandle),
    SetPose(PanelHandle),
    AttachToHmd(PanelHandle),
    Upload(PanelHandle, u32, u32),
    Show(PanelHandle),
    Hide(PanelHandle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimPanel {
    pub key: String,
    pub name: String,
    pub width: f64,
    /// Last absolute pose set (identity until placed).
    pub pose: Pose,
    pub kind: TransformKind,
    pub relative: Option<RelativeTransform>,
    pub visible: bool,
    pub texture_size: Option<(u32, u32)>,
}

impl SimPanel {
    /// Quad height: width scaled by the texture aspect, 2:1 before any upload.
    pub fn height(&self) -> f64 {
        match self.texture_size {
            Some((w, h)) if w > 0 => self.width * f64::from(h) / f64::from(w),
            _ => self.width * 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SimDevice {
    pose: Option<Pose>,
    buttons: ButtonState,
}

#[derive(Debug, Default)]
pub struct SimRuntime {
    panels: HashMap<PanelHandle, SimPanel>,
    next_handle: u64,
    devices: BTreeMap<ControllerId, SimDevice>,
    calls: Vec<RuntimeCall>,
    uploads: u64,
    fail_listing: bool,
    fail_intersections: bool,
    fail_absolute_reads: bool,
    report_relative: bool,
}

impl SimRuntime {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            ..Default::default()
        }
    }

    /// Connect (or update) a device.
    pub fn set_device(&mut self, id: ControllerId, pose: Option<Pose>, buttons: ButtonState) {
        self.devices.insert(id, SimDevice { pose, buttons });
    }

    pub fn remove_device(&mut self, id: ControllerId) {
        self.devices.remove(&id);
    }

    pub fn panel(&self, handle: PanelHandle) -> Option<&SimPanel> {
        self.panels.get(&handle)
    }

    /// Store a device-relative placement without changing the panel's kind.
    pub fn set_relative(&mut self, handle: PanelHandle, relative: RelativeTransform) {
        if let Some(p) = self.panels.get_mut(&handle) {
            p.relative = Some(relative);
        }
    }

    pub fn fail_listing(&mut self, fail: bool) {
        self.fail_listing = fail;
    }

    pub fn fail_intersections(&mut self, fail: bool) {
        self.fail_intersections = fail;
    }

    pub fn fail_absolute_reads(&mut self, fail: bool) {
        self.fail_absolute_reads = fail;
    }

    /// Report every panel as device-relative regardless of how it was placed.
    pub fn report_relative(&mut self, relative: bool) {
        self.report_relative = relative;
    }

    pub fn calls(&self) -> &[RuntimeCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn upload_count(&self) -> u64 {
        self.uploads
    }

    fn panel_mut(&mut self, handle: PanelHandle) -> RuntimeResult<&mut SimPanel> {
        self.panels.get_mut(&handle).ok_or(RuntimeError::InvalidHandle(handle))
    }

    fn panel_ref(&self, handle: PanelHandle) -> RuntimeResult<&SimPanel> {
        self.panels.get(&handle).ok_or(RuntimeError::InvalidHandle(handle))
    }

    /// World pose of a panel as the compositor would draw it.
    fn world_pose(&self, panel: &SimPanel) -> Option<Pose> {
        match panel.kind {
            TransformKind::Absolute => Some(panel.pose),
            TransformKind::TrackedDeviceRelative => {
                let rel = panel.relative?;
                let device = self.devices.get(&rel.device)?.pose?;
                Some(device.mul(&rel.transform))
            }
        }
    }
}

/// Ray/quad intersection against a `width` x `height` quad centered at the
/// origin of `pose`, facing +Z. UV origin is bottom-left.
pub fn ray_quad_intersection(
    pose: &Pose,
    width: f64,
    height: f64,
    origin: Vec3,
    direction: Vec3,
) -> Option<Intersection> {
    let inv = pose.inverse()?;
    let local_origin = inv.transform_point(origin);
    let local_dir = inv.transform_vector(direction.normalize());

    if local_dir.z.abs() < 1e-9 {
        return None;
    }
    let t = -local_origin.z / local_dir.z;
    if t < 0.0 {
        return None;
    }

    let x = local_origin.x + local_dir.x * t;
    let y = local_origin.y + local_dir.y * t;
    let (hw, hh) = (width * 0.5, height * 0.5);
    if x < -hw || x > hw || y < -hh || y > hh {
        return None;
    }

    Some(Intersection {
        u: (x + hw) / width,
        v: (y + hh) / height,
        point: pose.transform_point(Vec3::new(x, y, 0.0)),
        distance: t,
    })
}

impl PoseSource for SimRuntime {
    fn tracked_controllers(&self) -> RuntimeResult<Vec<ControllerId>> {
        if self.fail_listing {
            return Err(RuntimeError::call("GetSortedTrackedDeviceIndices", "simulated failure"));
        }
        Ok(self.devices.keys().copied().collect())
    }

    fn device_pose(&self, id: ControllerId) -> RuntimeResult<Option<Pose>> {
        Ok(self.devices.get(&id).and_then(|d| d.pose))
    }

    fn button_state(&self, id: ControllerId) -> RuntimeResult<ButtonState> {
        Ok(self.devices.get(&id).map(|d| d.buttons).unwrap_or_default())
    }
}

impl OverlayRuntime for SimRuntime {
    fn create_panel(&mut self, key: &str, name: &str) -> RuntimeResult<PanelHandle> {
        if self.panels.values().any(|p| p.key == key) {
            return Err(RuntimeError::call("CreateOverlay", "KeyInUse"));
        }
        let handle = PanelHandle(self.next_handle);
        self.next_handle += 1;
        self.panels.insert(
            handle,
            SimPanel {
                key: key.to_string(),
                name: name.to_string(),
                width: 1.0,
                pose: Pose::IDENTITY,
                kind: TransformKind::Absolute,
                relative: None,
                visible: false,
                texture_size: None,
            },
        );
        self.calls.push(RuntimeCall::Create(handle));
        Ok(handle)
    }

    fn set_width(&mut self, panel: PanelHandle, meters: f64) -> RuntimeResult<()> {
        self.panel_mut(panel)?.width = meters;
        self.calls.push(RuntimeCall::SetWidth(panel));
        Ok(())
    }

    fn intersect(&self, panel: PanelHandle, origin: Vec3, direction: Vec3) -> RuntimeResult<Option<Intersection>> {
        if self.fail_intersections {
            return Err(RuntimeError::call("ComputeOverlayIntersection", "simulated failure"));
        }
        let p = self.panel_ref(panel)?;
        let Some(world) = self.world_pose(p) else {
            trace!("sim: panel {:?} has no world pose", panel);
            return Ok(None);
        };
        Ok(ray_quad_intersection(&world, p.width, p.height(), origin, direction))
    }

    fn transform_kind(&self, panel: PanelHandle) -> RuntimeResult<TransformKind> {
        let p = self.panel_ref(panel)?;
        if self.report_relative {
            return Ok(TransformKind::TrackedDeviceRelative);
        }
        Ok(p.kind)
    }

    fn absolute_pose(&self, panel: PanelHandle) -> RuntimeResult<Pose> {
        let p = self.panel_ref(panel)?;
        if self.fail_absolute_reads || p.kind != TransformKind::Absolute {
            return Err(RuntimeError::call("GetOverlayTransformAbsolute", "WrongTransformType"));
        }
        Ok(p.pose)
    }

    fn relative_transform(&self, panel: PanelHandle) -> RuntimeResult<RelativeTransform> {
        self.panel_ref(panel)?
            .relative
            .ok_or_else(|| RuntimeError::call("GetOverlayTransformTrackedDeviceRelative", "WrongTransformType"))
    }

    fn set_absolute_pose(&mut self, panel: PanelHandle, pose: &Pose) -> RuntimeResult<()> {
        let p = self.panel_mut(panel)?;
        p.pose = *pose;
        p.kind = TransformKind::Absolute;
        self.calls.push(RuntimeCall::SetPose(panel));
        Ok(())
    }

    fn attach_to_hmd(&mut self, panel: PanelHandle, distance: f64) -> RuntimeResult<()> {
        let hmd = self.devices.get(&HMD_DEVICE).and_then(|d| d.pose);
        let transform = Pose::from_translation(Vec3::new(0.0, 0.0, -distance));
        let p = self.panel_mut(panel)?;
        p.kind = TransformKind::TrackedDeviceRelative;
        p.relative = Some(RelativeTransform {
            device: HMD_DEVICE,
            transform,
        });
        if let Some(hmd) = hmd {
            p.pose = hmd.mul(&transform);
        }
        self.calls.push(RuntimeCall::AttachToHmd(panel));
        Ok(())
    }

    fn upload_texture(&mut self, panel: PanelHandle, pixels: &[u8], width: u32, height: u32) -> RuntimeResult<()> {
        if Frame::expected_len(width, height) != Some(pixels.len()) {
            return Err(RuntimeError::call("SetOverlayRaw", "InvalidParameter"));
        }
        self.panel_mut(panel)?.texture_size = Some((width, height));
        self.uploads += 1;
        self.calls.push(RuntimeCall::Upload(panel, width, height));
        Ok(())
    }

    fn show(&mut self, panel: PanelHandle) -> RuntimeResult<()> {
        self.panel_mut(panel)?.visible = true;
        self.calls.push(RuntimeCall::Show(panel));
        Ok(())
    }

    fn hide(&mut self, panel: PanelHandle) -> RuntimeResult<()> {
        self.panel_mut(panel)?.visible = false;
        self.calls.push(RuntimeCall::Hide(panel));
        Ok(())
    }
}

// ── SimSurface ───────────────────────────────────────────────

/// How `SimSurface` answers frame requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceMode {
    /// Frames are returned immediately at the reported size.
    Immediate,
    /// Requests return `Pending`; the frame is held for `take_deferred`.
    Deferred,
    /// Buffers are rendered at this scale while the logical size is reported.
    Scaled(f64),
    /// Buffers are this many bytes short.
    Truncated(usize),
}

#[derive(Debug)]
pub struct SimSurface {
    metrics: Option<SurfaceMetrics>,
    mode: SurfaceMode,
    destroyed: bool,
    deferred: Option<Frame>,
    frames: u64,
    pointer_events: Vec<PointerEvent>,
    scrolls: Vec<f64>,
    notices: Vec<ControllerNotice>,
    rejected: u64,
}

impl SimSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            metrics: Some(SurfaceMetrics::new(width, height)),
            mode: SurfaceMode::Immediate,
            destroyed: false,
            deferred: None,
            frames: 0,
            pointer_events: Vec::new(),
            scrolls: Vec::new(),
            notices: Vec::new(),
            rejected: 0,
        }
    }

    pub fn set_metrics(&mut self, metrics: Option<SurfaceMetrics>) {
        self.metrics = metrics;
    }

    pub fn set_mode(&mut self, mode: SurfaceMode) {
        self.mode = mode;
    }

    pub fn destroy(&mut self) {
        self.destroyed = true;
    }

    /// The frame behind the last `Pending` answer, if not yet taken.
    pub fn take_deferred(&mut self) -> Option<Frame> {
        self.deferred.take()
    }

    pub fn pointer_events(&self) -> &[PointerEvent] {
        &self.pointer_events
    }

    pub fn scrolls(&self) -> &[f64] {
        &self.scrolls
    }

    pub fn notices(&self) -> &[ControllerNotice] {
        &self.notices
    }

    /// Injections and notices refused because the surface was destroyed.
    pub fn rejected_calls(&self) -> u64 {
        self.rejected
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn clear_recorded(&mut self) {
        self.pointer_events.clear();
        self.scrolls.clear();
        self.notices.clear();
    }

    fn render(&mut self, metrics: SurfaceMetrics) -> Frame {
        self.frames += 1;
        let (w, h) = match self.mode {
            SurfaceMode::Scaled(s) => (
                (f64::from(metrics.width) * s).round() as u32,
                (f64::from(metrics.height) * s).round() as u32,
            ),
            _ => (metrics.width, metrics.height),
        };
        let mut len = Frame::expected_len(w, h).unwrap_or(0);
        if let SurfaceMode::Truncated(n) = self.mode {
            len = len.saturating_sub(n);
        }
        Frame {
            width: metrics.width,
            height: metrics.height,
            pixels: vec![(self.frames % 256) as u8; len],
        }
    }
}

impl RenderSurface for SimSurface {
    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn metrics(&self) -> Option<SurfaceMetrics> {
        self.metrics
    }

    fn request_frame(&mut self) -> SurfaceResult<FrameRequest> {
        if self.destroyed {
            return Err(SurfaceError::Destroyed);
        }
        let metrics = self
            .metrics
            .ok_or_else(|| SurfaceError::Capture("surface has no size yet".to_string()))?;
        let frame = self.render(metrics);
        if self.mode == SurfaceMode::Deferred {
            self.deferred = Some(frame);
            return Ok(FrameRequest::Pending);
        }
        Ok(FrameRequest::Ready(frame))
    }

    fn inject_pointer(&mut self, event: PointerEvent) -> SurfaceResult<()> {
        if self.destroyed {
            self.rejected += 1;
            return Err(SurfaceError::Destroyed);
        }
        self.pointer_events.push(event);
        Ok(())
    }

    fn inject_scroll(&mut self, delta_y: f64) -> SurfaceResult<()> {
        if self.destroyed {
            self.rejected += 1;
            return Err(SurfaceError::Destroyed);
        }
        self.scrolls.push(delta_y);
        Ok(())
    }

    fn notify(&mut self, notice: ControllerNotice) -> SurfaceResult<()> {
        if self.destroyed {
            self.rejected += 1;
            return Err(SurfaceError::Destroyed);
        }
        self.notices.push(notice);
        Ok(())
    }
}
