//! Runtime configuration.
//!
//! Every tunable of the overlay lives here with its default. The binary
//! maps command-line flags onto `OverlayConfig`; persistence of user
//! settings is handled by the host application.

use std::time::Duration;

use crate::math::Vec3;

/// Tick interval for a rate in frames per second (floored to whole ms).
pub fn interval_for_fps(fps: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(fps.max(1)))
}

// ── Top level ────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct OverlayConfig {
    pub input: InputConfig,
    pub present: PresentConfig,
    pub panel: PanelConfig,
    pub spawn: SpawnConfig,
}

// ── Input ────────────────────────────────────────────────────

/// How input ticks are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSchedule {
    /// Fixed-rate timer at `InputConfig::fps`.
    Interval,
    /// One tick per render-surface paint, with a fallback timer.
    SyncWithCapture { fallback_fps: u32 },
}

#[derive(Debug, Clone)]
pub struct InputConfig {
    pub fps: u32,
    pub schedule: InputSchedule,
    /// Minimum per-axis UV change that counts as pointer movement.
    pub move_epsilon: f64,
    pub gesture: GestureConfig,
    pub stabilizer: StabilizerConfig,
}

impl Default for InputConfig {
    fn default() -> Self {
        let fps = 120;
        Self {
            fps,
            schedule: InputSchedule::SyncWithCapture {
                fallback_fps: fps.min(30),
            },
            move_epsilon: 0.0005,
            gesture: GestureConfig::default(),
            stabilizer: StabilizerConfig::default(),
        }
    }
}

impl InputConfig {
    pub fn interval(&self) -> Duration {
        interval_for_fps(self.fps)
    }
}

/// Trigger gesture thresholds (UV units unless noted).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// |Δu| + |Δv| from the press point beyond which a click is cancelled.
    pub cancel_threshold: f64,
    /// |Δv| from the press point beyond which the gesture scrolls.
    pub drag_threshold: f64,
    pub scroll_multiplier: f64,
    /// Clamp for a single scroll delta, in pixels.
    pub scroll_max: f64,
    /// Panel height in pixels when the surface has not reported one.
    pub fallback_height: u32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            cancel_threshold: 0.03,
            drag_threshold: 0.015,
            scroll_multiplier: 0.6,
            scroll_max: 140.0,
            fallback_height: 700,
        }
    }
}

/// Pointer smoothing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilizerConfig {
    pub enabled: bool,
    /// Cutoff frequency while still (Hz).
    pub min_cutoff: f64,
    /// Speed coefficient raising the cutoff during fast motion.
    pub beta: f64,
    /// Cutoff for the velocity estimate (Hz).
    pub derivative_cutoff: f64,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_cutoff: 1.0,
            beta: 0.0,
            derivative_cutoff: 1.0,
        }
    }
}

// ── Presentation ─────────────────────────────────────────────

/// How capture ticks are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Capture on paint notifications, with a fallback timer.
    PaintDriven,
    /// Capture on a fixed-interval timer.
    Polling,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaintDriven => "paint",
            Self::Polling => "poll",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "paint" => Some(Self::PaintDriven),
            "poll" => Some(Self::Polling),
            _ => None,
        }
    }
}

/// Number of panel texture handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Buffering {
    Single,
    Double,
}

impl Buffering {
    pub fn panel_count(&self) -> usize {
        match self {
            Self::Single => 1,
            Self::Double => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PresentConfig {
    pub fps: u32,
    pub mode: CaptureMode,
    pub buffering: Buffering,
    /// Minimum spacing between size-mismatch warnings.
    pub mismatch_warn_interval: Duration,
}

impl Default for PresentConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            mode: CaptureMode::PaintDriven,
            buffering: Buffering::Double,
            mismatch_warn_interval: Duration::from_secs(5),
        }
    }
}

impl PresentConfig {
    pub fn interval(&self) -> Duration {
        interval_for_fps(self.fps)
    }
}

// ── Panel ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Overlay key prefix; panel `i` is registered as `<prefix>-<i>`.
    pub key_prefix: String,
    /// Display name prefix; panel `i` is shown as `<prefix> <i>`.
    pub name_prefix: String,
    pub width_m: f64,
    /// Distance in front of the headset when spawning without an HMD pose.
    pub hmd_fallback_distance: f64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            key_prefix: "vrkb-keyboard-overlay".to_string(),
            name_prefix: "VR Keyboard".to_string(),
            width_m: 0.5,
            hmd_fallback_distance: 0.5,
        }
    }
}

// ── Spawn ────────────────────────────────────────────────────

/// Orientation of a freshly spawned panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOrientation {
    /// Heading only: the panel stays level regardless of head pitch/roll.
    YawOnly,
    /// Full head rotation.
    FullHead,
}

impl SpawnOrientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YawOnly => "yaw",
            Self::FullHead => "head",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "yaw" => Some(Self::YawOnly),
            "head" => Some(Self::FullHead),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnConfig {
    /// Offset from the headset in head-local space (meters).
    pub offset: Vec3,
    pub orientation: SpawnOrientation,
    /// Rotation about the panel's local X axis, in degrees.
    pub tilt_deg: f64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            offset: Vec3::new(0.0, -0.3, -0.5),
            orientation: SpawnOrientation::YawOnly,
            tilt_deg: -30.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_for_fps() {
        assert_eq!(interval_for_fps(60), Duration::from_millis(16));
        assert_eq!(interval_for_fps(120), Duration::from_millis(8));
        assert_eq!(interval_for_fps(0), Duration::from_millis(1000));
    }

    #[test]
    fn test_default_input_syncs_with_capture() {
        let cfg = InputConfig::default();
        assert_eq!(cfg.schedule, InputSchedule::SyncWithCapture { fallback_fps: 30 });
    }

    #[test]
    fn test_capture_mode_from_str() {
        assert_eq!(CaptureMode::from_str("paint"), Some(CaptureMode::PaintDriven));
        assert_eq!(CaptureMode::from_str("poll"), Some(CaptureMode::Polling));
        assert_eq!(CaptureMode::from_str("vsync"), None);
    }

    #[test]
    fn test_spawn_orientation_from_str() {
        assert_eq!(SpawnOrientation::from_str("yaw"), Some(SpawnOrientation::YawOnly));
        assert_eq!(SpawnOrientation::from_str("head"), Some(SpawnOrientation::FullHead));
        assert_eq!(SpawnOrientation::from_str("roll"), None);
    }

    #[test]
    fn test_buffering_panel_count() {
        assert_eq!(Buffering::Single.panel_count(), 1);
        assert_eq!(Buffering::Double.panel_count(), 2);
    }
}
