//! End-to-end input tests: scripted controllers against the simulated
//! runtime and surface, driven through `OverlayService` with a manual clock.

use std::rc::Rc;

use vrkb_overlay::clock::TestClock;
use vrkb_overlay::config::{Buffering, OverlayConfig};
use vrkb_overlay::input::InputTickSummary;
use vrkb_overlay::math::{Pose, Vec3};
use vrkb_overlay::runtime::{ButtonState, ControllerId, HMD_DEVICE};
use vrkb_overlay::service::OverlayService;
use vrkb_overlay::sim::{SimRuntime, SimSurface};
use vrkb_overlay::surface::{ControllerNotice, PixelPos, PointerEvent};

type Service = OverlayService<SimRuntime, SimSurface, Rc<TestClock>>;

// ── Fixtures ────────────────────────────────────────────────

/// Service with a 1 m wide panel 1 m ahead at eye height and a 1000×500
/// surface.
fn service() -> (Service, Rc<TestClock>) {
    let mut config = OverlayConfig::default();
    config.panel.width_m = 1.0;
    config.present.buffering = Buffering::Double;

    let mut runtime = SimRuntime::new();
    runtime.set_device(
        HMD_DEVICE,
        Some(Pose::from_translation(Vec3::new(0.0, 1.6, 0.0))),
        ButtonState::default(),
    );
    let clock = Rc::new(TestClock::new());
    let mut svc = OverlayService::new(config, runtime, SimSurface::new(1000, 500), Rc::clone(&clock));
    svc.start().unwrap();

    let panels = svc.panels().unwrap().clone();
    panels
        .apply_pose(svc.runtime_mut(), &Pose::from_translation(Vec3::new(0.0, 1.0, -1.0)))
        .unwrap();
    (svc, clock)
}

/// Controller pose on the z=0 plane aiming straight at panel UV.
fn aim(u: f64, v: f64) -> Pose {
    Pose::from_translation(Vec3::new(u - 0.5, 1.0 + (v - 0.5) * 0.5, 0.0))
}

fn set(svc: &mut Service, id: ControllerId, pose: Option<Pose>, trigger: bool, grip: bool) {
    svc.runtime_mut().set_device(id, pose, ButtonState { trigger, grip });
}

fn tick(svc: &mut Service, clock: &TestClock) {
    clock.advance_ms(8);
    svc.input_tick().unwrap();
}

fn count(events: &[PointerEvent], pred: impl Fn(&PointerEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

// ── Clicks and scrolling ────────────────────────────────────

#[test]
fn test_click_in_place_emits_down_and_up_at_pixel() {
    let (mut svc, clock) = service();
    set(&mut svc, 1, Some(aim(0.2, 0.2)), true, false);
    tick(&mut svc, &clock);
    set(&mut svc, 1, Some(aim(0.2, 0.2)), false, false);
    tick(&mut svc, &clock);

    let ev = svc.surface().pointer_events();
    let pos = PixelPos::new(200, 399);
    assert_eq!(count(ev, |e| matches!(e, PointerEvent::Down { .. })), 1);
    assert_eq!(count(ev, |e| matches!(e, PointerEvent::Up { .. })), 1);
    assert!(ev.contains(&PointerEvent::Down { pos, click_count: 1 }));
    assert!(ev.contains(&PointerEvent::Up { pos, click_count: 1 }));
    assert!(svc.surface().scrolls().is_empty());
}

#[test]
fn test_vertical_drag_scrolls_and_never_clicks() {
    let (mut svc, clock) = service();
    set(&mut svc, 1, Some(aim(0.5, 0.4)), true, false);
    tick(&mut svc, &clock);
    for step in 1..=10 {
        let v = 0.4 + 0.01 * f64::from(step);
        set(&mut svc, 1, Some(aim(0.5, v)), true, false);
        tick(&mut svc, &clock);
    }
    set(&mut svc, 1, Some(aim(0.5, 0.5)), false, false);
    tick(&mut svc, &clock);

    let scrolls = svc.surface().scrolls();
    assert!(!scrolls.is_empty());
    assert!(scrolls.len() <= 9, "at most one scroll per tick after the threshold");
    assert!(scrolls.iter().all(|d| *d > 0.0 && *d <= 140.0), "{:?}", scrolls);
    let ev = svc.surface().pointer_events();
    assert_eq!(count(ev, |e| matches!(e, PointerEvent::Down { .. })), 0);
}

// ── Arbitration ─────────────────────────────────────────────

#[test]
fn test_two_controllers_suppress_pointer_with_single_leave() {
    let (mut svc, clock) = service();
    set(&mut svc, 1, Some(aim(0.3, 0.5)), false, false);
    tick(&mut svc, &clock);
    svc.surface_mut().clear_recorded();

    set(&mut svc, 2, Some(aim(0.7, 0.5)), false, false);
    for _ in 0..5 {
        tick(&mut svc, &clock);
    }

    let ev = svc.surface().pointer_events();
    assert_eq!(count(ev, |e| matches!(e, PointerEvent::Move(_))), 0);
    assert_eq!(count(ev, |e| matches!(e, PointerEvent::Leave(_))), 1);
    assert!(svc.input().arbiter().is_suppressed());

    // Per-controller cursors keep flowing while suppressed.
    let cursors = svc
        .surface()
        .notices()
        .iter()
        .filter(|n| matches!(n, ControllerNotice::Cursor { .. }))
        .count();
    assert_eq!(cursors, 10);
}

#[test]
fn test_switching_primary_has_no_enter_leave_churn() {
    let (mut svc, clock) = service();
    set(&mut svc, 1, Some(aim(0.3, 0.5)), false, false);
    tick(&mut svc, &clock);

    // Controller 1 leaves the panel as controller 2 arrives.
    set(&mut svc, 1, Some(aim(3.0, 0.5)), false, false);
    set(&mut svc, 2, Some(aim(0.7, 0.5)), false, false);
    tick(&mut svc, &clock);
    tick(&mut svc, &clock);

    let ev = svc.surface().pointer_events();
    assert_eq!(count(ev, |e| matches!(e, PointerEvent::Enter(_))), 1);
    assert_eq!(count(ev, |e| matches!(e, PointerEvent::Leave(_))), 0);
    assert_eq!(svc.input().arbiter().primary(), Some(2));
}

#[test]
fn test_center_maps_to_500_250() {
    let (mut svc, clock) = service();
    set(&mut svc, 1, Some(aim(0.5, 0.5)), false, false);
    tick(&mut svc, &clock);
    assert_eq!(
        svc.surface().pointer_events().last(),
        Some(&PointerEvent::Move(PixelPos::new(500, 250)))
    );
}

// ── Failures ────────────────────────────────────────────────

#[test]
fn test_intersection_failures_are_silent_misses() {
    let (mut svc, clock) = service();
    svc.runtime_mut().fail_intersections(true);
    set(&mut svc, 1, Some(aim(0.5, 0.5)), true, false);
    tick(&mut svc, &clock);
    set(&mut svc, 1, Some(aim(0.5, 0.5)), false, false);
    tick(&mut svc, &clock);

    assert!(svc.surface().pointer_events().is_empty());
    assert!(svc
        .surface()
        .notices()
        .iter()
        .all(|n| matches!(n, ControllerNotice::TriggerChanged { .. })));
}

#[test]
fn test_destroyed_surface_receives_no_input() {
    let (mut svc, clock) = service();
    set(&mut svc, 1, Some(aim(0.3, 0.5)), false, true);
    tick(&mut svc, &clock);
    svc.surface_mut().destroy();

    for step in 0..100 {
        let u = 0.3 + 0.004 * f64::from(step);
        set(&mut svc, 1, Some(aim(u, 0.5)), step % 2 == 0, true);
        clock.advance_ms(8);
        assert_eq!(svc.input_tick(), Some(InputTickSummary::default()));
    }
    assert_eq!(svc.surface().rejected_calls(), 0);
    assert!(svc.input().grip().owner().is_none());
    assert!(!svc.input().arbiter().state().last_mouse_hit);
}

#[test]
fn test_untracked_controller_still_reports_trigger() {
    let (mut svc, clock) = service();
    set(&mut svc, 3, None, true, false);
    tick(&mut svc, &clock);
    assert_eq!(
        svc.surface().notices(),
        &[ControllerNotice::TriggerChanged { id: 3, pressed: true }]
    );
}

// ── Grip ────────────────────────────────────────────────────

#[test]
fn test_still_grip_keeps_panel_pose_bit_for_bit() {
    let (mut svc, clock) = service();
    let handles = svc.panels().unwrap().handles().to_vec();
    let before = svc.runtime().panel(handles[0]).unwrap().pose;

    let hand = Pose::from_rotation_translation(
        &vrkb_overlay::math::Quat::from_axis_angle(Vec3::new(0.3, 1.0, -0.2), 0.9),
        Vec3::new(0.2, 1.1, -0.3),
    );
    set(&mut svc, 1, Some(hand), false, true);
    for _ in 0..20 {
        tick(&mut svc, &clock);
        for h in &handles {
            assert_eq!(svc.runtime().panel(*h).unwrap().pose, before);
        }
    }
    assert_eq!(svc.input().grip().owner(), Some(1));
}

#[test]
fn test_grip_release_and_owner_loss_end_session() {
    let (mut svc, clock) = service();
    set(&mut svc, 1, Some(aim(0.5, 0.5)), false, true);
    tick(&mut svc, &clock);
    assert_eq!(svc.input().grip().owner(), Some(1));

    // Second controller cannot steal the grip.
    set(&mut svc, 2, Some(aim(0.2, 0.2)), false, true);
    tick(&mut svc, &clock);
    assert_eq!(svc.input().grip().owner(), Some(1));

    set(&mut svc, 1, None, false, true);
    tick(&mut svc, &clock);
    assert_ne!(svc.input().grip().owner(), Some(1));
}

// ── Panel operations ────────────────────────────────────────

#[test]
fn test_toggle_and_reset_follow_headset() {
    let (mut svc, _clock) = service();
    assert_eq!(svc.toggle_visibility(), Ok(false));

    svc.runtime_mut().set_device(
        HMD_DEVICE,
        Some(Pose::from_translation(Vec3::new(1.0, 1.6, 1.0))),
        ButtonState::default(),
    );
    assert_eq!(svc.toggle_visibility(), Ok(true));

    let active = svc.panels().unwrap().active();
    let t = svc.runtime().panel(active).unwrap().pose.translation();
    assert!((t - Vec3::new(1.0, 1.3, 0.5)).length() < 1e-9, "t={:?}", t);
    assert!(svc.runtime().panel(active).unwrap().visible);
}

#[test]
fn test_stop_discards_controller_state() {
    let (mut svc, clock) = service();
    set(&mut svc, 1, Some(aim(0.5, 0.5)), true, true);
    tick(&mut svc, &clock);
    assert_eq!(svc.status().controllers, 1);

    svc.stop();
    assert_eq!(svc.status().controllers, 0);
    assert!(svc.input().grip().owner().is_none());
    assert!(svc.input_tick().is_none());
}
