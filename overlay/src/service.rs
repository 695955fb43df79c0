//! The overlay service: owns the runtime, the render surface, the panels
//! and both tick pipelines, and exposes the operations the event loop and
//! the host application call.
//!
//! Ticks are cheap to call at any time: a tick that is not due, not
//! running, or already in flight simply does nothing.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::OverlayConfig;
use crate::error::RuntimeResult;
use crate::input::{InputEngine, InputTickSummary};
use crate::panel::PanelSet;
use crate::present::{CaptureOutcome, PresentStats, PresentationPipeline};
use crate::runtime::VrRuntime;
use crate::schedule::{FallbackTimer, TickGuard, TickSchedule};
use crate::surface::{RenderSurface, SurfaceNotice};

/// Snapshot for the periodic status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStatus {
    pub running: bool,
    pub visible: bool,
    pub input_ticks: u64,
    pub input_skipped: u64,
    pub controllers: usize,
    pub present: PresentStats,
}

pub struct OverlayService<R, S, C> {
    config: OverlayConfig,
    runtime: R,
    surface: S,
    clock: C,
    panels: Option<PanelSet>,
    input: InputEngine,
    present: PresentationPipeline,
    input_guard: TickGuard,
    input_fallback: FallbackTimer,
    input_schedule: TickSchedule,
    capture_schedule: TickSchedule,
    running: bool,
    input_ticks: u64,
}

impl<R, S, C> OverlayService<R, S, C>
where
    R: VrRuntime,
    S: RenderSurface,
    C: Clock,
{
    pub fn new(config: OverlayConfig, runtime: R, surface: S, clock: C) -> Self {
        let input_schedule = TickSchedule::for_input(&config.input);
        let capture_schedule = TickSchedule::for_capture(&config.present);
        Self {
            input: InputEngine::new(config.input.clone()),
            present: PresentationPipeline::new(&config.present),
            input_guard: TickGuard::new(),
            input_fallback: FallbackTimer::new(input_schedule.timer_interval()),
            input_schedule,
            capture_schedule,
            panels: None,
            running: false,
            input_ticks: 0,
            config,
            runtime,
            surface,
            clock,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────

    /// Create the panels (first start only) and begin ticking.
    pub fn start(&mut self) -> RuntimeResult<()> {
        if self.running {
            return Ok(());
        }
        if self.panels.is_none() {
            let panels = PanelSet::create(
                &mut self.runtime,
                &self.config.panel,
                &self.config.spawn,
                self.config.present.buffering,
            )?;
            self.panels = Some(panels);
        }
        self.running = true;
        info!(
            "overlay: started (input {:?}, capture {} {:?})",
            self.input_schedule,
            self.config.present.mode.as_str(),
            self.config.present.buffering
        );
        Ok(())
    }

    /// Stop ticking and discard all transient input and capture state.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.input.reset();
        self.present.cancel_pending();
        info!("overlay: stopped after {} input tick(s)", self.input_ticks);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // ── Ticks ────────────────────────────────────────────────

    /// Run one input tick now.
    pub fn input_tick(&mut self) -> Option<InputTickSummary> {
        if !self.running {
            return None;
        }
        let panels = self.panels.as_ref()?;
        let _token = self.input_guard.try_enter()?;
        let now = self.clock.now();
        self.input_fallback.mark(now);
        self.input_ticks += 1;
        Some(self.input.tick(&mut self.runtime, &mut self.surface, panels, now))
    }

    /// Run one capture tick now.
    pub fn capture_tick(&mut self) -> Option<CaptureOutcome> {
        if !self.running {
            return None;
        }
        let panels = self.panels.as_mut()?;
        let now = self.clock.now();
        Some(self.present.capture_tick(&mut self.runtime, &mut self.surface, panels, now))
    }

    /// Input timer callback: a fixed-rate tick, or a fallback tick when
    /// paint notices have stalled.
    pub fn on_input_timer(&mut self) -> Option<InputTickSummary> {
        if self.input_schedule.follows_paint() && !self.input_fallback.is_due(self.clock.now()) {
            return None;
        }
        self.input_tick()
    }

    /// Capture timer callback, same rules as `on_input_timer`.
    pub fn on_capture_timer(&mut self) -> Option<CaptureOutcome> {
        if self.capture_schedule.follows_paint() && !self.present.fallback_due(self.clock.now()) {
            return None;
        }
        self.capture_tick()
    }

    /// Handle a notification from the render host.
    pub fn on_notice(&mut self, notice: SurfaceNotice) {
        match notice {
            SurfaceNotice::Paint => {
                if self.capture_schedule.follows_paint() {
                    self.capture_tick();
                }
                if self.input_schedule.follows_paint() {
                    self.input_tick();
                }
            }
            SurfaceNotice::FrameReady(frame) => {
                if !self.running {
                    return;
                }
                if let Some(panels) = self.panels.as_mut() {
                    let now = self.clock.now();
                    self.present.complete_capture(&mut self.runtime, panels, frame, now);
                }
            }
            SurfaceNotice::Destroyed => {
                self.present.stop();
            }
        }
    }

    // ── Panel operations ─────────────────────────────────────

    /// Re-spawn the panels in front of the headset.
    pub fn reset_position(&mut self) -> bool {
        let Some(panels) = self.panels.as_ref() else {
            warn!("overlay: reset requested before start");
            return false;
        };
        panels.reset_position(&mut self.runtime, &self.config.spawn)
    }

    /// Show (re-spawned) or hide the panels. Returns the new visibility.
    pub fn toggle_visibility(&mut self) -> RuntimeResult<bool> {
        let Some(panels) = self.panels.as_mut() else {
            warn!("overlay: visibility toggle requested before start");
            return Ok(false);
        };
        panels.toggle_visibility(&mut self.runtime, &self.config.spawn)
    }

    pub fn set_width(&mut self, meters: f64) -> RuntimeResult<()> {
        self.config.panel.width_m = meters;
        match self.panels.as_mut() {
            Some(panels) => {
                debug!("overlay: width {:.2} m", meters);
                panels.set_width(&mut self.runtime, meters)
            }
            None => Ok(()),
        }
    }

    // ── Accessors ────────────────────────────────────────────

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            running: self.running,
            visible: self.panels.as_ref().is_some_and(|p| p.is_visible()),
            input_ticks: self.input_ticks,
            input_skipped: self.input_guard.skipped(),
            controllers: self.input.tracked().count(),
            present: self.present.stats(),
        }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn panels(&self) -> Option<&PanelSet> {
        self.panels.as_ref()
    }

    pub fn input(&self) -> &InputEngine {
        &self.input
    }

    pub fn present(&self) -> &PresentationPipeline {
        &self.present
    }

    pub fn input_schedule(&self) -> TickSchedule {
        self.input_schedule
    }

    pub fn capture_schedule(&self) -> TickSchedule {
        self.capture_schedule
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }
}
