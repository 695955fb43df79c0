//! Pointer arbitration: many controller rays, one emulated mouse.
//!
//! Each tick the arbiter receives every controller's (possibly filtered)
//! hit. Two or more simultaneous hits are ambiguous and suppress the
//! pointer entirely. Otherwise the controller whose hit moved most
//! recently drives it. Enter and leave follow the "any pointer" state only,
//! so handing the pointer from one controller to another never produces
//! enter/leave churn.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, trace};

use crate::input::hit::HitResult;
use crate::input::mapping::map_uv;
use crate::runtime::ControllerId;
use crate::surface::{PixelPos, PointerEvent, SurfaceMetrics};

/// Routing bookkeeping carried from one tick to the next.
#[derive(Debug, Clone, Default)]
pub struct PointerRoutingState {
    pub last_hit: HashMap<ControllerId, HitResult>,
    pub last_move_at: HashMap<ControllerId, Instant>,
    pub last_mouse_position: Option<PixelPos>,
    pub last_mouse_controller: Option<ControllerId>,
    /// Whether the emulated pointer is currently inside the surface.
    pub last_mouse_hit: bool,
    pub suppressed: bool,
}

#[derive(Debug, Clone)]
pub struct PointerArbiter {
    move_epsilon: f64,
    state: PointerRoutingState,
}

impl PointerArbiter {
    pub fn new(move_epsilon: f64) -> Self {
        Self {
            move_epsilon,
            state: PointerRoutingState::default(),
        }
    }

    pub fn state(&self) -> &PointerRoutingState {
        &self.state
    }

    pub fn is_suppressed(&self) -> bool {
        self.state.suppressed
    }

    /// Controller currently driving the pointer, if any.
    pub fn primary(&self) -> Option<ControllerId> {
        self.state
            .last_mouse_hit
            .then_some(self.state.last_mouse_controller)
            .flatten()
    }

    /// Run one tick. `hits` holds every controller with a hit this tick, in
    /// device order. Returns the pointer events to inject, in order.
    pub fn arbitrate(
        &mut self,
        hits: &[(ControllerId, HitResult)],
        now: Instant,
        metrics: Option<&SurfaceMetrics>,
    ) -> Vec<PointerEvent> {
        self.record_motion(hits, now);

        let mut events = Vec::new();

        if hits.len() > 1 {
            if !self.state.suppressed {
                info!("pointer: {} simultaneous hits, suppressing", hits.len());
            }
            self.state.suppressed = true;
            self.state.last_mouse_controller = None;
            self.leave(&mut events);
            return events;
        }
        if self.state.suppressed {
            debug!("pointer: suppression lifted");
            self.state.suppressed = false;
        }

        let Some((id, hit)) = self.pick_primary(hits) else {
            self.leave(&mut events);
            return events;
        };

        let Some(pos) = map_uv(hit.u, hit.v, metrics) else {
            trace!("pointer: no surface metrics, skipping move");
            return events;
        };

        if !self.state.last_mouse_hit {
            debug!("pointer: enter at ({}, {}) from controller {}", pos.x, pos.y, id);
            events.push(PointerEvent::Enter(pos));
        }
        events.push(PointerEvent::Move(pos));
        self.state.last_mouse_hit = true;
        self.state.last_mouse_position = Some(pos);
        self.state.last_mouse_controller = Some(id);
        events
    }

    fn record_motion(&mut self, hits: &[(ControllerId, HitResult)], now: Instant) {
        let eps = self.move_epsilon;
        for (id, hit) in hits {
            let moved = match self.state.last_hit.get(id) {
                Some(prev) => (hit.u - prev.u).abs() > eps || (hit.v - prev.v).abs() > eps,
                None => true,
            };
            if moved {
                self.state.last_move_at.insert(*id, now);
            }
            self.state.last_hit.insert(*id, *hit);
        }
        self.state.last_hit.retain(|id, _| hits.iter().any(|(h, _)| h == id));
    }

    fn pick_primary(&self, hits: &[(ControllerId, HitResult)]) -> Option<(ControllerId, HitResult)> {
        let newest = hits
            .iter()
            .filter_map(|(id, _)| self.state.last_move_at.get(id))
            .max()
            .copied();

        let movers: Vec<_> = hits
            .iter()
            .filter(|(id, _)| newest.is_some() && self.state.last_move_at.get(id).copied() == newest)
            .copied()
            .collect();

        if movers.len() == 1 {
            return movers.first().copied();
        }
        let previous = self.state.last_mouse_controller;
        hits.iter()
            .find(|(id, _)| Some(*id) == previous)
            .or_else(|| hits.first())
            .copied()
    }

    fn leave(&mut self, events: &mut Vec<PointerEvent>) {
        if !self.state.last_mouse_hit {
            return;
        }
        let pos = self.state.last_mouse_position.unwrap_or_default();
        debug!("pointer: leave at ({}, {})", pos.x, pos.y);
        events.push(PointerEvent::Leave(pos));
        self.state.last_mouse_hit = false;
    }

    /// Drop a controller's bookkeeping (it stopped being tracked).
    pub fn forget(&mut self, id: ControllerId) {
        self.state.last_hit.remove(&id);
        self.state.last_move_at.remove(&id);
    }

    pub fn clear(&mut self) {
        self.state = PointerRoutingState::default();
    }
}
