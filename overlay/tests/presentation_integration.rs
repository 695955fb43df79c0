//! End-to-end presentation tests: paint notices, deferred captures, buffer
//! swaps and surface teardown through `OverlayService`.

use std::rc::Rc;

use vrkb_overlay::clock::TestClock;
use vrkb_overlay::config::{Buffering, CaptureMode, OverlayConfig};
use vrkb_overlay::present::CaptureOutcome;
use vrkb_overlay::service::OverlayService;
use vrkb_overlay::sim::{RuntimeCall, SimRuntime, SimSurface, SurfaceMode};
use vrkb_overlay::surface::SurfaceNotice;

type Service = OverlayService<SimRuntime, SimSurface, Rc<TestClock>>;

fn service(buffering: Buffering, mode: CaptureMode) -> (Service, Rc<TestClock>) {
    let mut config = OverlayConfig::default();
    config.present.buffering = buffering;
    config.present.mode = mode;
    let clock = Rc::new(TestClock::new());
    let mut svc = OverlayService::new(config, SimRuntime::new(), SimSurface::new(320, 160), Rc::clone(&clock));
    svc.start().unwrap();
    svc.runtime_mut().clear_calls();
    (svc, clock)
}

fn shows(svc: &Service) -> Vec<RuntimeCall> {
    svc.runtime()
        .calls()
        .iter()
        .filter(|c| matches!(c, RuntimeCall::Show(_) | RuntimeCall::Hide(_)))
        .copied()
        .collect()
}

// ── Buffering ───────────────────────────────────────────────

#[test]
fn test_double_buffer_swaps_without_hiding() {
    let (mut svc, clock) = service(Buffering::Double, CaptureMode::PaintDriven);
    let handles = svc.panels().unwrap().handles().to_vec();

    for _ in 0..4 {
        clock.advance_ms(16);
        svc.on_notice(SurfaceNotice::Paint);
    }

    assert_eq!(svc.status().present.presented, 4);
    assert_eq!(
        shows(&svc),
        vec![
            RuntimeCall::Show(handles[1]),
            RuntimeCall::Show(handles[0]),
            RuntimeCall::Show(handles[1]),
            RuntimeCall::Show(handles[0]),
        ]
    );
    assert_eq!(svc.panels().unwrap().active_index(), 0);
}

#[test]
fn test_single_buffer_polling_uploads_in_place() {
    let (mut svc, clock) = service(Buffering::Single, CaptureMode::Polling);
    let h = svc.panels().unwrap().active();
    for _ in 0..3 {
        clock.advance_ms(16);
        assert_eq!(svc.on_capture_timer(), Some(CaptureOutcome::Presented(0)));
    }
    assert!(shows(&svc).is_empty());
    assert_eq!(svc.runtime().panel(h).unwrap().texture_size, Some((320, 160)));
}

#[test]
fn test_hidden_panel_keeps_receiving_frames() {
    let (mut svc, clock) = service(Buffering::Double, CaptureMode::PaintDriven);
    svc.toggle_visibility().unwrap();
    svc.runtime_mut().clear_calls();

    clock.advance_ms(16);
    svc.on_notice(SurfaceNotice::Paint);
    assert_eq!(svc.runtime().upload_count(), 1);
    assert!(shows(&svc).is_empty());

    svc.toggle_visibility().unwrap();
    let active = svc.panels().unwrap().active();
    assert!(svc.runtime().panel(active).unwrap().visible);
    assert_eq!(svc.runtime().panel(active).unwrap().texture_size, Some((320, 160)));
}

// ── Re-entrancy ─────────────────────────────────────────────

#[test]
fn test_slow_capture_skips_exactly_one_tick() {
    let (mut svc, clock) = service(Buffering::Double, CaptureMode::PaintDriven);
    svc.surface_mut().set_mode(SurfaceMode::Deferred);

    svc.on_notice(SurfaceNotice::Paint);
    assert!(svc.present().is_pending());

    // The next paint arrives before the frame does.
    clock.advance_ms(16);
    assert_eq!(svc.capture_tick(), Some(CaptureOutcome::Skipped));

    let frame = svc.surface_mut().take_deferred().unwrap();
    svc.on_notice(SurfaceNotice::FrameReady(frame));
    assert!(!svc.present().is_pending());

    let st = svc.status().present;
    assert_eq!(st.skipped, 1);
    assert_eq!(st.presented, 1);
    assert_eq!(svc.runtime().upload_count(), 1);
}

#[test]
fn test_fallback_timer_recovers_stalled_paints() {
    let (mut svc, clock) = service(Buffering::Single, CaptureMode::PaintDriven);
    svc.on_notice(SurfaceNotice::Paint);

    // Paints stop arriving; the fallback only fires after 2x the interval.
    clock.advance_ms(16);
    assert_eq!(svc.on_capture_timer(), None);
    clock.advance_ms(16);
    assert_eq!(svc.on_capture_timer(), Some(CaptureOutcome::Presented(0)));
    assert_eq!(svc.runtime().upload_count(), 2);
}

// ── Surface failures ────────────────────────────────────────

#[test]
fn test_lost_deferred_frame_does_not_freeze_capture() {
    let (mut svc, clock) = service(Buffering::Double, CaptureMode::Polling);
    svc.surface_mut().set_mode(SurfaceMode::Deferred);

    assert_eq!(svc.on_capture_timer(), Some(CaptureOutcome::Pending));
    assert!(svc.surface_mut().take_deferred().is_some());

    // One tick is skipped; after 2x the interval the request is retried.
    clock.advance_ms(16);
    assert_eq!(svc.on_capture_timer(), Some(CaptureOutcome::Skipped));
    clock.advance_ms(16);
    assert_eq!(svc.on_capture_timer(), Some(CaptureOutcome::Pending));

    let frame = svc.surface_mut().take_deferred().unwrap();
    svc.on_notice(SurfaceNotice::FrameReady(frame));
    let st = svc.status().present;
    assert_eq!(st.presented, 1);
    assert_eq!(st.dropped, 1);
    assert_eq!(svc.runtime().upload_count(), 1);
}

#[test]
fn test_destroyed_surface_stops_scheduling() {
    let (mut svc, clock) = service(Buffering::Double, CaptureMode::PaintDriven);
    svc.surface_mut().destroy();

    svc.on_notice(SurfaceNotice::Paint);
    assert!(svc.present().is_stopped());
    for _ in 0..5 {
        clock.advance_ms(100);
        svc.on_notice(SurfaceNotice::Paint);
        assert_eq!(svc.on_capture_timer(), None);
    }
    assert_eq!(svc.runtime().upload_count(), 0);
}

#[test]
fn test_scaled_frames_recover_and_garbage_is_dropped() {
    let (mut svc, clock) = service(Buffering::Single, CaptureMode::PaintDriven);
    let h = svc.panels().unwrap().active();

    svc.surface_mut().set_mode(SurfaceMode::Scaled(1.5));
    svc.on_notice(SurfaceNotice::Paint);
    assert_eq!(svc.runtime().panel(h).unwrap().texture_size, Some((480, 240)));

    svc.surface_mut().set_mode(SurfaceMode::Truncated(1));
    for _ in 0..10 {
        clock.advance_ms(16);
        svc.on_notice(SurfaceNotice::Paint);
    }
    assert_eq!(svc.status().present.dropped, 10);
    assert_eq!(svc.runtime().upload_count(), 1);
}
