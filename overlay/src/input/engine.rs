//! One input tick: sample every controller, resolve hits, classify
//! gestures, drive the grip, then arbitrate the single emulated pointer.
//!
//! All per-controller state lives in `InputEngine` and is only touched
//! from `tick`, which the service calls under the input tick guard.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::config::InputConfig;
use crate::input::arbiter::PointerArbiter;
use crate::input::gesture::{GestureAction, GestureClassifier};
use crate::input::grip::{GripController, GripUpdate};
use crate::input::hit::{resolve_hit, HitResult};
use crate::input::mapping::map_uv;
use crate::input::stabilizer::PointerStabilizer;
use crate::panel::PanelSet;
use crate::runtime::{ButtonState, ControllerId, VrRuntime, HMD_DEVICE};
use crate::surface::{ControllerNotice, PointerEvent, RenderSurface, SurfaceMetrics};

/// Per-controller bookkeeping carried between ticks.
#[derive(Debug, Clone)]
struct ControllerSlot {
    buttons: ButtonState,
    had_hit: bool,
    stabilizer: PointerStabilizer,
}

/// What one tick did, for status lines and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputTickSummary {
    pub controllers: usize,
    pub hits: usize,
    pub pointer_events: usize,
    pub scrolls: usize,
    pub clicks: usize,
}

pub struct InputEngine {
    config: InputConfig,
    epoch: Option<Instant>,
    slots: HashMap<ControllerId, ControllerSlot>,
    gestures: GestureClassifier,
    grip: GripController,
    arbiter: PointerArbiter,
}

impl InputEngine {
    pub fn new(config: InputConfig) -> Self {
        Self {
            gestures: GestureClassifier::new(config.gesture),
            arbiter: PointerArbiter::new(config.move_epsilon),
            grip: GripController::new(),
            slots: HashMap::new(),
            epoch: None,
            config,
        }
    }

    pub fn arbiter(&self) -> &PointerArbiter {
        &self.arbiter
    }

    pub fn gestures(&self) -> &GestureClassifier {
        &self.gestures
    }

    pub fn grip(&self) -> &GripController {
        &self.grip
    }

    /// Controllers with live per-controller state.
    pub fn tracked(&self) -> impl Iterator<Item = ControllerId> + '_ {
        self.slots.keys().copied()
    }

    /// Drop every piece of transient state.
    pub fn reset(&mut self) {
        self.slots.clear();
        self.gestures.clear();
        self.grip.end();
        self.arbiter.clear();
        self.epoch = None;
    }

    pub fn tick<R, S>(&mut self, runtime: &mut R, surface: &mut S, panels: &PanelSet, now: Instant) -> InputTickSummary
    where
        R: VrRuntime + ?Sized,
        S: RenderSurface + ?Sized,
    {
        let mut summary = InputTickSummary::default();

        if surface.is_destroyed() {
            if !self.slots.is_empty() || self.grip.owner().is_some() {
                debug!("input: render surface destroyed, dropping controller state");
                self.reset();
            }
            return summary;
        }

        let ids = match runtime.tracked_controllers() {
            Ok(ids) => pointer_sources(ids),
            Err(e) => {
                warn!("input: cannot list controllers: {}", e);
                return summary;
            }
        };
        summary.controllers = ids.len();

        let gone: Vec<_> = self.slots.keys().copied().filter(|id| !ids.contains(id)).collect();
        for id in gone {
            self.drop_controller(id, surface);
        }

        let epoch = *self.epoch.get_or_insert(now);
        let timestamp = now.saturating_duration_since(epoch).as_secs_f64();
        let metrics = surface.metrics();
        let height = metrics.map(|m| m.height);
        let panel = panels.active();
        let mut hits: Vec<(ControllerId, HitResult)> = Vec::with_capacity(ids.len());

        for &id in &ids {
            let pose = match runtime.device_pose(id) {
                Ok(p) => p,
                Err(e) => {
                    warn!("input: pose for controller {} unavailable: {}", id, e);
                    None
                }
            };

            let slot = self.slots.entry(id).or_insert_with(|| ControllerSlot {
                buttons: ButtonState::default(),
                had_hit: false,
                stabilizer: PointerStabilizer::new(&self.config.stabilizer),
            });

            let buttons = match runtime.button_state(id) {
                Ok(b) => b,
                Err(e) => {
                    warn!("input: buttons for controller {} unavailable: {}", id, e);
                    slot.buttons
                }
            };
            if buttons.trigger != slot.buttons.trigger {
                notify(surface, ControllerNotice::TriggerChanged {
                    id,
                    pressed: buttons.trigger,
                });
            }
            slot.buttons = buttons;

            let raw = pose.as_ref().and_then(|p| resolve_hit(&*runtime, panel, p));
            let hit = match raw {
                Some(h) if self.config.stabilizer.enabled => {
                    if !slot.had_hit {
                        slot.stabilizer.reset();
                    }
                    let (u, v) = slot.stabilizer.update(h.u, h.v, timestamp);
                    Some(HitResult::new(u, v))
                }
                other => other,
            };

            match hit {
                Some(h) => {
                    notify(surface, ControllerNotice::Cursor { id, u: h.u, v: h.v });
                    slot.had_hit = true;
                    hits.push((id, h));
                }
                None if slot.had_hit => {
                    notify(surface, ControllerNotice::CursorHidden { id });
                    slot.had_hit = false;
                }
                None => {}
            }

            match self.gestures.update(id, buttons.trigger, hit, height) {
                Some(GestureAction::Scroll(delta)) => {
                    trace!("input: controller {} scroll {:.1}", id, delta);
                    if let Err(e) = surface.inject_scroll(delta) {
                        warn!("input: scroll injection failed: {}", e);
                    }
                    summary.scrolls += 1;
                }
                Some(GestureAction::Click { u, v }) => {
                    if click(surface, u, v, metrics.as_ref()) {
                        summary.clicks += 1;
                    }
                }
                None => {}
            }

            if let GripUpdate::Moved(next) = self.grip.update(&*runtime, panel, id, pose.as_ref(), buttons.grip) {
                if let Err(e) = panels.apply_pose(runtime, &next) {
                    warn!("input: applying grip pose failed, ending drag: {}", e);
                    self.grip.end();
                }
            }
        }

        summary.hits = hits.len();
        for event in self.arbiter.arbitrate(&hits, now, metrics.as_ref()) {
            if let Err(e) = surface.inject_pointer(event) {
                warn!("input: pointer injection failed: {}", e);
            }
            summary.pointer_events += 1;
        }
        summary
    }

    /// Forget a controller that is no longer tracked.
    fn drop_controller<S>(&mut self, id: ControllerId, surface: &mut S)
    where
        S: RenderSurface + ?Sized,
    {
        let Some(slot) = self.slots.remove(&id) else {
            return;
        };
        debug!("input: controller {} disconnected", id);
        if slot.had_hit {
            notify(surface, ControllerNotice::CursorHidden { id });
        }
        self.gestures.discard(id);
        self.grip.end_if_owner(id);
        self.arbiter.forget(id);
    }
}

/// Controllers that may drive the pointer, in device order, each once.
fn pointer_sources(mut ids: Vec<ControllerId>) -> Vec<ControllerId> {
    ids.retain(|id| *id != HMD_DEVICE);
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn notify<S>(surface: &mut S, notice: ControllerNotice)
where
    S: RenderSurface + ?Sized,
{
    if let Err(e) = surface.notify(notice) {
        trace!("input: controller notice dropped: {}", e);
    }
}

/// Inject a press/release pair at a panel UV. Returns whether it was sent.
fn click<S>(surface: &mut S, u: f64, v: f64, metrics: Option<&SurfaceMetrics>) -> bool
where
    S: RenderSurface + ?Sized,
{
    let Some(pos) = map_uv(u, v, metrics) else {
        debug!("input: click at ({:.3}, {:.3}) dropped, surface has no size", u, v);
        return false;
    };
    debug!("input: click at ({}, {})", pos.x, pos.y);
    for event in [
        PointerEvent::Down { pos, click_count: 1 },
        PointerEvent::Up { pos, click_count: 1 },
    ] {
        if let Err(e) = surface.inject_pointer(event) {
            warn!("input: click injection failed: {}", e);
            return false;
        }
    }
    true
}
