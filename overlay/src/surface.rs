//! Interface to the render surface that draws the keyboard.
//!
//! The surface produces pixel frames for the panel texture and accepts
//! synthetic pointer and scroll input in its own pixel space (origin
//! top-left).

use crate::error::SurfaceResult;
use crate::runtime::ControllerId;

/// One captured frame: tightly packed 4-byte pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    /// Byte length a `width x height` frame should have.
    pub fn expected_len(width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)
    }
}

/// Outcome of asking the surface for its newest frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRequest {
    Ready(Frame),
    /// The frame will arrive later as `SurfaceNotice::FrameReady`.
    Pending,
}

/// Content-area size in logical pixels plus the zoom factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMetrics {
    pub width: u32,
    pub height: u32,
    pub zoom: f64,
}

impl SurfaceMetrics {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            zoom: 1.0,
        }
    }

    /// Pixel space that pointer coordinates are expressed in.
    pub fn pointer_space(&self) -> (u32, u32) {
        let zoom = if self.zoom.is_finite() && self.zoom > 0.0 {
            self.zoom
        } else {
            1.0
        };
        let scale = |v: u32| ((v as f64 * zoom).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }
}

/// A pixel position in the surface's pointer space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelPos {
    pub x: i32,
    pub y: i32,
}

impl PixelPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Synthetic mouse-like events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Move(PixelPos),
    Enter(PixelPos),
    Leave(PixelPos),
    Down { pos: PixelPos, click_count: u32 },
    Up { pos: PixelPos, click_count: u32 },
}

/// Per-controller state the surface draws its own cursors from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerNotice {
    Cursor { id: ControllerId, u: f64, v: f64 },
    CursorHidden { id: ControllerId },
    TriggerChanged { id: ControllerId, pressed: bool },
}

/// Asynchronous notifications from the render host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceNotice {
    /// A new frame was painted.
    Paint,
    /// Completion of a `FrameRequest::Pending`.
    FrameReady(Frame),
    Destroyed,
}

/// The render surface as seen from the overlay.
pub trait RenderSurface {
    fn is_destroyed(&self) -> bool;

    /// `None` until the surface has reported a size.
    fn metrics(&self) -> Option<SurfaceMetrics>;

    fn request_frame(&mut self) -> SurfaceResult<FrameRequest>;

    fn inject_pointer(&mut self, event: PointerEvent) -> SurfaceResult<()>;

    fn inject_scroll(&mut self, delta_y: f64) -> SurfaceResult<()>;

    fn notify(&mut self, notice: ControllerNotice) -> SurfaceResult<()>;
}
