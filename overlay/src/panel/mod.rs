//! The keyboard panel(s) registered with the VR runtime.
//!
//! One handle with single buffering, two with double buffering. Every
//! placement (spawn, reset, grip) moves all handles together so a buffer
//! swap never jumps.

pub mod spawn;

use tracing::{debug, info, warn};

use crate::config::{Buffering, PanelConfig, SpawnConfig};
use crate::error::RuntimeResult;
use crate::math::Pose;
use crate::runtime::{PanelHandle, VrRuntime, HMD_DEVICE};

use self::spawn::spawn_pose;

#[derive(Debug, Clone)]
pub struct PanelSet {
    handles: Vec<PanelHandle>,
    active: usize,
    visible: bool,
    width_m: f64,
}

impl PanelSet {
    /// Register the panels, size and place them, and show the first.
    pub fn create<R>(
        runtime: &mut R,
        config: &PanelConfig,
        spawn: &SpawnConfig,
        buffering: Buffering,
    ) -> RuntimeResult<Self>
    where
        R: VrRuntime + ?Sized,
    {
        let mut handles = Vec::with_capacity(buffering.panel_count());
        for i in 0..buffering.panel_count() {
            let key = format!("{}-{}", config.key_prefix, i);
            let name = format!("{} {}", config.name_prefix, i);
            let handle = runtime.create_panel(&key, &name)?;
            runtime.set_width(handle, config.width_m)?;
            debug!("panel: created {} as {:?}", key, handle);
            handles.push(handle);
        }

        let set = Self {
            handles,
            active: 0,
            visible: true,
            width_m: config.width_m,
        };

        let placed = match runtime.device_pose(HMD_DEVICE) {
            Ok(Some(hmd)) => match spawn_pose(&hmd, spawn) {
                Some(pose) => set.apply_pose(runtime, &pose).is_ok(),
                None => false,
            },
            Ok(None) => false,
            Err(e) => {
                warn!("panel: headset pose unavailable at startup: {}", e);
                false
            }
        };
        if !placed {
            info!(
                "panel: no headset pose, attaching {:.2} m in front of the headset",
                config.hmd_fallback_distance
            );
            for &h in &set.handles {
                runtime.attach_to_hmd(h, config.hmd_fallback_distance)?;
            }
        }

        runtime.show(set.handles[0])?;
        info!("panel: {} handle(s) ready", set.handles.len());
        Ok(set)
    }

    pub fn handles(&self) -> &[PanelHandle] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    /// The handle currently shown (and the one hit-tested against).
    pub fn active(&self) -> PanelHandle {
        self.handles[self.active]
    }

    /// The handle the next frame should be written to.
    pub fn back_index(&self) -> usize {
        if self.handles.len() > 1 {
            1 - self.active
        } else {
            self.active
        }
    }

    pub fn back(&self) -> PanelHandle {
        self.handles[self.back_index()]
    }

    pub fn set_active(&mut self, index: usize) {
        if index < self.handles.len() {
            self.active = index;
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn width(&self) -> f64 {
        self.width_m
    }

    pub fn set_width<R>(&mut self, runtime: &mut R, meters: f64) -> RuntimeResult<()>
    where
        R: VrRuntime + ?Sized,
    {
        for &h in &self.handles {
            runtime.set_width(h, meters)?;
        }
        self.width_m = meters;
        Ok(())
    }

    /// Move every handle to `pose`.
    pub fn apply_pose<R>(&self, runtime: &mut R, pose: &Pose) -> RuntimeResult<()>
    where
        R: VrRuntime + ?Sized,
    {
        for &h in &self.handles {
            runtime.set_absolute_pose(h, pose)?;
        }
        Ok(())
    }

    /// Re-spawn in front of the headset. Returns whether the panels moved.
    pub fn reset_position<R>(&self, runtime: &mut R, spawn: &SpawnConfig) -> bool
    where
        R: VrRuntime + ?Sized,
    {
        let hmd = match runtime.device_pose(HMD_DEVICE) {
            Ok(Some(p)) => p,
            Ok(None) => {
                warn!("panel: reset skipped, headset not tracked");
                return false;
            }
            Err(e) => {
                warn!("panel: reset skipped: {}", e);
                return false;
            }
        };
        let Some(pose) = spawn_pose(&hmd, spawn) else {
            warn!("panel: reset skipped, headset rotation is degenerate");
            return false;
        };
        match self.apply_pose(runtime, &pose) {
            Ok(()) => {
                debug!("panel: reset to {:?}", pose.translation());
                true
            }
            Err(e) => {
                warn!("panel: reset failed: {}", e);
                false
            }
        }
    }

    /// Show (after a reset) when hidden; hide every handle when visible.
    /// Returns the new visibility.
    pub fn toggle_visibility<R>(&mut self, runtime: &mut R, spawn: &SpawnConfig) -> RuntimeResult<bool>
    where
        R: VrRuntime + ?Sized,
    {
        if self.visible {
            for &h in &self.handles {
                runtime.hide(h)?;
            }
            self.visible = false;
        } else {
            self.reset_position(runtime, spawn);
            runtime.show(self.active())?;
            self.visible = true;
        }
        info!("panel: {}", if self.visible { "shown" } else { "hidden" });
        Ok(self.visible)
    }
}
