//! Trigger gesture classification: click, drag-to-scroll, or cancel.
//!
//! Per controller:
//!
//! ```text
//! Idle ──press, no hit──▶ PressedNoHit ──release──▶ Idle
//!   │
//!   └──press + hit──▶ Pressed { moved: false, dragging: false }
//!                        │ |Δu|+|Δv| > cancel      → moved
//!                        │ |Δv| > drag             → dragging (scrolls every tick)
//!                        │ hit lost                → moved
//!                        └──release──▶ Idle (click iff !moved && !dragging)
//! ```

use std::collections::HashMap;

use tracing::debug;

use crate::config::GestureConfig;
use crate::input::hit::HitResult;
use crate::runtime::ControllerId;

/// Tracking data for a press that started on the panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureState {
    pub start_u: f64,
    pub start_v: f64,
    pub last_u: f64,
    pub last_v: f64,
    pub dragging: bool,
    pub moved: bool,
}

impl GestureState {
    fn new(hit: HitResult) -> Self {
        Self {
            start_u: hit.u,
            start_v: hit.v,
            last_u: hit.u,
            last_v: hit.v,
            dragging: false,
            moved: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// Trigger went down off the panel; ignored until released.
    PressedNoHit,
    Pressed(GestureState),
}

/// What a tick of the classifier asks the caller to emit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureAction {
    /// Vertical scroll in surface pixels.
    Scroll(f64),
    /// Press-then-release at a panel UV.
    Click { u: f64, v: f64 },
}

/// Gesture state machines for every controller.
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    config: GestureConfig,
    phases: HashMap<ControllerId, Phase>,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            phases: HashMap::new(),
        }
    }

    /// Advance one controller by one tick.
    ///
    /// `panel_height` is the surface height in pixels used to scale scroll
    /// deltas; `None` uses the configured fallback.
    pub fn update(
        &mut self,
        id: ControllerId,
        trigger: bool,
        hit: Option<HitResult>,
        panel_height: Option<u32>,
    ) -> Option<GestureAction> {
        if !trigger {
            return self.release(id);
        }

        if !self.phases.contains_key(&id) {
            let phase = match hit {
                Some(h) => {
                    debug!("gesture: controller {} pressed at ({:.3}, {:.3})", id, h.u, h.v);
                    Phase::Pressed(GestureState::new(h))
                }
                None => Phase::PressedNoHit,
            };
            self.phases.insert(id, phase);
            return None;
        }

        let Some(Phase::Pressed(state)) = self.phases.get_mut(&id) else {
            return None;
        };

        let Some(hit) = hit else {
            // Ray dropout keeps the gesture alive but rules out a click.
            state.moved = true;
            return None;
        };

        let total_u = hit.u - state.start_u;
        let total_v = hit.v - state.start_v;
        if !state.moved && total_u.abs() + total_v.abs() > self.config.cancel_threshold {
            state.moved = true;
        }
        if !state.dragging && total_v.abs() > self.config.drag_threshold {
            debug!("gesture: controller {} started drag-scroll", id);
            state.dragging = true;
        }

        let mut action = None;
        if state.dragging {
            let height = panel_height
                .filter(|h| *h > 0)
                .unwrap_or(self.config.fallback_height);
            let raw = (hit.v - state.last_v) * f64::from(height) * self.config.scroll_multiplier;
            let clamped = raw.clamp(-self.config.scroll_max, self.config.scroll_max);
            if clamped != 0.0 {
                action = Some(GestureAction::Scroll(clamped));
            }
        }

        state.last_u = hit.u;
        state.last_v = hit.v;
        action
    }

    fn release(&mut self, id: ControllerId) -> Option<GestureAction> {
        match self.phases.remove(&id)? {
            Phase::Pressed(state) if !state.dragging && !state.moved => {
                debug!("gesture: controller {} click at ({:.3}, {:.3})", id, state.start_u, state.start_v);
                Some(GestureAction::Click {
                    u: state.start_u,
                    v: state.start_v,
                })
            }
            _ => None,
        }
    }

    /// Drop a controller's gesture without emitting anything.
    pub fn discard(&mut self, id: ControllerId) -> bool {
        self.phases.remove(&id).is_some()
    }

    /// Gesture state for a press that started on the panel.
    pub fn state(&self, id: ControllerId) -> Option<&GestureState> {
        match self.phases.get(&id) {
            Some(Phase::Pressed(state)) => Some(state),
            _ => None,
        }
    }

    /// Controllers with any tracked press.
    pub fn controllers(&self) -> impl Iterator<Item = ControllerId> + '_ {
        self.phases.keys().copied()
    }

    pub fn clear(&mut self) {
        self.phases.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: ControllerId = 3;

    fn classifier() -> GestureClassifier {
        GestureClassifier::new(GestureConfig::default())
    }

    fn hit(u: f64, v: f64) -> Option<HitResult> {
        Some(HitResult::new(u, v))
    }

    #[test]
    fn test_press_release_in_place_clicks_at_start() {
        let mut g = classifier();
        assert_eq!(g.update(ID, true, hit(0.2, 0.2), Some(500)), None);
        assert_eq!(g.update(ID, true, hit(0.205, 0.2), Some(500)), None);
        assert_eq!(
            g.update(ID, false, hit(0.21, 0.2), Some(500)),
            Some(GestureAction::Click { u: 0.2, v: 0.2 })
        );
        assert!(g.state(ID).is_none());
    }

    #[test]
    fn test_press_without_hit_is_ignored_until_release() {
        let mut g = classifier();
        assert_eq!(g.update(ID, true, None, None), None);
        assert!(g.state(ID).is_none());
        // Sliding onto the panel while held does not start a gesture.
        assert_eq!(g.update(ID, true, hit(0.5, 0.5), None), None);
        assert!(g.state(ID).is_none());
        assert_eq!(g.update(ID, false, hit(0.5, 0.5), None), None);
        // A fresh press on the panel does.
        g.update(ID, true, hit(0.5, 0.5), None);
        assert!(g.state(ID).is_some());
    }

    #[test]
    fn test_horizontal_motion_cancels_click_without_scrolling() {
        let mut g = classifier();
        g.update(ID, true, hit(0.2, 0.5), Some(500));
        assert_eq!(g.update(ID, true, hit(0.25, 0.5), Some(500)), None);
        assert!(g.state(ID).unwrap().moved);
        assert!(!g.state(ID).unwrap().dragging);
        assert_eq!(g.update(ID, false, None, Some(500)), None);
    }

    #[test]
    fn test_vertical_drag_scrolls_each_tick_and_suppresses_click() {
        let mut g = classifier();
        g.update(ID, true, hit(0.5, 0.5), Some(500));

        // Below the drag threshold: nothing yet.
        assert_eq!(g.update(ID, true, hit(0.5, 0.51), Some(500)), None);

        // Crossing it scrolls by the per-tick delta since the last sample.
        match g.update(ID, true, hit(0.5, 0.52), Some(500)) {
            Some(GestureAction::Scroll(d)) => assert!((d - 0.01 * 500.0 * 0.6).abs() < 1e-9, "d={}", d),
            other => panic!("expected scroll, got {:?}", other),
        }

        match g.update(ID, true, hit(0.5, 0.50), Some(500)) {
            Some(GestureAction::Scroll(d)) => assert!((d + 0.02 * 500.0 * 0.6).abs() < 1e-9, "d={}", d),
            other => panic!("expected scroll, got {:?}", other),
        }

        // No movement while dragging emits nothing.
        assert_eq!(g.update(ID, true, hit(0.5, 0.50), Some(500)), None);
        assert_eq!(g.update(ID, false, hit(0.5, 0.50), Some(500)), None);
    }

    #[test]
    fn test_scroll_delta_is_clamped() {
        let mut g = classifier();
        g.update(ID, true, hit(0.5, 0.1), Some(1000));
        match g.update(ID, true, hit(0.5, 0.9), Some(1000)) {
            Some(GestureAction::Scroll(d)) => assert_eq!(d, 140.0),
            other => panic!("expected scroll, got {:?}", other),
        }
        match g.update(ID, true, hit(0.5, 0.0), Some(1000)) {
            Some(GestureAction::Scroll(d)) => assert_eq!(d, -140.0),
            other => panic!("expected scroll, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_height_uses_fallback() {
        let mut g = classifier();
        g.update(ID, true, hit(0.5, 0.5), None);
        match g.update(ID, true, hit(0.5, 0.52), Some(0)) {
            Some(GestureAction::Scroll(d)) => assert!((d - 0.02 * 700.0 * 0.6).abs() < 1e-9),
            other => panic!("expected scroll, got {:?}", other),
        }
    }

    #[test]
    fn test_hit_loss_marks_moved_but_keeps_tracking() {
        let mut g = classifier();
        g.update(ID, true, hit(0.4, 0.4), None);
        g.update(ID, true, None, None);
        let s = g.state(ID).unwrap();
        assert!(s.moved);
        assert_eq!((s.last_u, s.last_v), (0.4, 0.4));

        g.update(ID, true, hit(0.4, 0.4), None);
        assert_eq!(g.update(ID, false, None, None), None);
    }

    #[test]
    fn test_controllers_are_independent() {
        let mut g = classifier();
        g.update(1, true, hit(0.1, 0.1), None);
        g.update(2, true, hit(0.9, 0.9), None);
        g.update(2, true, hit(0.5, 0.9), None);

        assert_eq!(g.update(1, false, None, None), Some(GestureAction::Click { u: 0.1, v: 0.1 }));
        assert_eq!(g.update(2, false, None, None), None);
    }

    #[test]
    fn test_discard_drops_without_click() {
        let mut g = classifier();
        g.update(ID, true, hit(0.3, 0.3), None);
        assert!(g.discard(ID));
        assert_eq!(g.update(ID, false, None, None), None);
        assert!(!g.discard(ID));
    }
}
