//! Frame capture and upload to the panel texture(s).
//!
//! With two handles the new frame goes to the back handle, which is shown
//! and made active. The previous handle is left visible; hiding it first
//! would flash black for a frame.

use std::time::Instant;

use tracing::{debug, info, trace, warn};

use crate::config::PresentConfig;
use crate::error::SurfaceError;
use crate::panel::PanelSet;
use crate::present::frame::{validate_frame, FrameError};
use crate::runtime::OverlayRuntime;
use crate::schedule::{FallbackTimer, TickGuard, TickToken};
use crate::surface::{Frame, FrameRequest, RenderSurface};
use crate::throttle::RateLimiter;

/// What a capture tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Uploaded to the handle at this index, which is now active.
    Presented(usize),
    /// Frame requested; the tick stays in flight until it arrives.
    Pending,
    /// Previous capture still in flight.
    Skipped,
    /// The frame was malformed or the upload failed.
    Dropped,
    /// The surface is gone; no further captures will run.
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresentStats {
    pub presented: u64,
    pub dropped: u64,
    pub skipped: u64,
}

pub struct PresentationPipeline {
    guard: TickGuard,
    /// In-flight request and when it was made.
    pending: Option<(TickToken, Instant)>,
    fallback: FallbackTimer,
    mismatch_log: RateLimiter,
    stopped: bool,
    presented: u64,
    dropped: u64,
}

impl PresentationPipeline {
    pub fn new(config: &PresentConfig) -> Self {
        Self {
            guard: TickGuard::new(),
            pending: None,
            fallback: FallbackTimer::new(config.interval()),
            mismatch_log: RateLimiter::new(config.mismatch_warn_interval),
            stopped: false,
            presented: 0,
            dropped: 0,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn stats(&self) -> PresentStats {
        PresentStats {
            presented: self.presented,
            dropped: self.dropped,
            skipped: self.guard.skipped(),
        }
    }

    /// Whether the fallback timer should run a capture now.
    pub fn fallback_due(&self, now: Instant) -> bool {
        !self.stopped && self.fallback.is_due(now)
    }

    /// Acquire the newest frame and upload it.
    pub fn capture_tick<R, S>(
        &mut self,
        runtime: &mut R,
        surface: &mut S,
        panels: &mut PanelSet,
        now: Instant,
    ) -> CaptureOutcome
    where
        R: OverlayRuntime + ?Sized,
        S: RenderSurface + ?Sized,
    {
        if self.stopped {
            return CaptureOutcome::Stopped;
        }
        if surface.is_destroyed() {
            self.stop();
            return CaptureOutcome::Stopped;
        }
        self.expire_pending(now);
        let Some(token) = self.guard.try_enter() else {
            trace!("capture: previous capture in flight, skipping");
            return CaptureOutcome::Skipped;
        };
        self.fallback.mark(now);

        match surface.request_frame() {
            Ok(FrameRequest::Ready(frame)) => self.present(runtime, panels, frame, now),
            Ok(FrameRequest::Pending) => {
                self.pending = Some((token, now));
                CaptureOutcome::Pending
            }
            Err(SurfaceError::Destroyed) => {
                self.stop();
                CaptureOutcome::Stopped
            }
            Err(e) => {
                warn!("capture: frame request failed: {}", e);
                self.dropped += 1;
                CaptureOutcome::Dropped
            }
        }
    }

    /// A frame delivered by the surface: either the completion of a
    /// pending request or an unsolicited push.
    pub fn complete_capture<R>(
        &mut self,
        runtime: &mut R,
        panels: &mut PanelSet,
        frame: Frame,
        now: Instant,
    ) -> CaptureOutcome
    where
        R: OverlayRuntime + ?Sized,
    {
        if self.stopped {
            return CaptureOutcome::Stopped;
        }
        let _token = match self.pending.take() {
            Some((token, _)) => token,
            None => match self.guard.try_enter() {
                Some(token) => {
                    self.fallback.mark(now);
                    token
                }
                None => return CaptureOutcome::Skipped,
            },
        };
        self.present(runtime, panels, frame, now)
    }

    fn present<R>(&mut self, runtime: &mut R, panels: &mut PanelSet, frame: Frame, now: Instant) -> CaptureOutcome
    where
        R: OverlayRuntime + ?Sized,
    {
        let (reported_w, reported_h) = (frame.width, frame.height);
        let frame = match validate_frame(frame) {
            Ok(f) => f,
            Err(e @ FrameError::Mismatch { .. }) => {
                if let Some(suppressed) = self.mismatch_log.check(now) {
                    warn!("capture: dropping frame: {} ({} similar suppressed)", e, suppressed);
                }
                self.dropped += 1;
                return CaptureOutcome::Dropped;
            }
            Err(e) => {
                trace!("capture: {}", e);
                self.dropped += 1;
                return CaptureOutcome::Dropped;
            }
        };
        if (frame.width, frame.height) != (reported_w, reported_h) {
            trace!(
                "capture: recovered {}x{} frame reported as {}x{}",
                frame.width,
                frame.height,
                reported_w,
                reported_h
            );
        }

        let index = panels.back_index();
        let target = panels.handles()[index];
        if let Err(e) = runtime.upload_texture(target, &frame.pixels, frame.width, frame.height) {
            warn!("capture: texture upload failed: {}", e);
            self.dropped += 1;
            return CaptureOutcome::Dropped;
        }

        if panels.len() > 1 {
            if panels.is_visible() {
                if let Err(e) = runtime.show(target) {
                    warn!("capture: showing back buffer failed: {}", e);
                }
            }
            panels.set_active(index);
        }
        self.presented += 1;
        CaptureOutcome::Presented(index)
    }

    /// Give up on a request the surface never answered, so a lost frame
    /// stalls capture for at most the fallback window.
    fn expire_pending(&mut self, now: Instant) {
        let window = self.fallback.interval() * 2;
        let stale = matches!(self.pending, Some((_, since)) if now.saturating_duration_since(since) >= window);
        if stale {
            warn!("capture: no frame after {:?}, requesting a new one", window);
            self.pending = None;
            self.dropped += 1;
        }
    }

    /// Stop capturing for good (the surface went away).
    pub fn stop(&mut self) {
        if !self.stopped {
            info!("capture: render surface destroyed, stopping capture");
        }
        self.stopped = true;
        self.pending = None;
    }

    /// Abandon an in-flight request so the next tick may run.
    pub fn cancel_pending(&mut self) {
        if self.pending.take().is_some() {
            debug!("capture: pending request abandoned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Buffering, PanelConfig, SpawnConfig};
    use crate::sim::{RuntimeCall, SimRuntime, SimSurface, SurfaceMode};
    use std::time::Duration;

    fn setup(buffering: Buffering) -> (PresentationPipeline, SimRuntime, SimSurface, PanelSet) {
        let mut rt = SimRuntime::new();
        let panels = PanelSet::create(&mut rt, &PanelConfig::default(), &SpawnConfig::default(), buffering).unwrap();
        rt.clear_calls();
        (
            PresentationPipeline::new(&PresentConfig::default()),
            rt,
            SimSurface::new(64, 32),
            panels,
        )
    }

    #[test]
    fn test_double_buffer_alternates_and_never_hides() {
        let (mut p, mut rt, mut s, mut panels) = setup(Buffering::Double);
        let t0 = Instant::now();
        let (h0, h1) = (panels.handles()[0], panels.handles()[1]);

        assert_eq!(p.capture_tick(&mut rt, &mut s, &mut panels, t0), CaptureOutcome::Presented(1));
        assert_eq!(panels.active_index(), 1);
        assert_eq!(p.capture_tick(&mut rt, &mut s, &mut panels, t0), CaptureOutcome::Presented(0));
        assert_eq!(panels.active_index(), 0);

        assert_eq!(
            rt.calls(),
            &[
                RuntimeCall::Upload(h1, 64, 32),
                RuntimeCall::Show(h1),
                RuntimeCall::Upload(h0, 64, 32),
                RuntimeCall::Show(h0),
            ]
        );
    }

    #[test]
    fn test_single_buffer_uploads_in_place() {
        let (mut p, mut rt, mut s, mut panels) = setup(Buffering::Single);
        let h = panels.active();
        assert_eq!(p.capture_tick(&mut rt, &mut s, &mut panels, Instant::now()), CaptureOutcome::Presented(0));
        assert_eq!(rt.calls(), &[RuntimeCall::Upload(h, 64, 32)]);
    }

    #[test]
    fn test_hidden_panels_upload_without_show() {
        let (mut p, mut rt, mut s, mut panels) = setup(Buffering::Double);
        panels.toggle_visibility(&mut rt, &SpawnConfig::default()).unwrap();
        rt.clear_calls();

        p.capture_tick(&mut rt, &mut s, &mut panels, Instant::now());
        assert!(rt.calls().iter().all(|c| !matches!(c, RuntimeCall::Show(_))));
        assert_eq!(panels.active_index(), 1);
    }

    #[test]
    fn test_pending_capture_skips_exactly_one_tick() {
        let (mut p, mut rt, mut s, mut panels) = setup(Buffering::Double);
        s.set_mode(SurfaceMode::Deferred);
        let t0 = Instant::now();

        assert_eq!(p.capture_tick(&mut rt, &mut s, &mut panels, t0), CaptureOutcome::Pending);
        assert_eq!(
            p.capture_tick(&mut rt, &mut s, &mut panels, t0 + Duration::from_millis(16)),
            CaptureOutcome::Skipped
        );

        let frame = s.take_deferred().unwrap();
        assert_eq!(
            p.complete_capture(&mut rt, &mut panels, frame, t0 + Duration::from_millis(20)),
            CaptureOutcome::Presented(1)
        );
        assert_eq!(
            p.capture_tick(&mut rt, &mut s, &mut panels, t0 + Duration::from_millis(32)),
            CaptureOutcome::Pending
        );
        assert_eq!(p.stats().skipped, 1);
        assert_eq!(rt.upload_count(), 1);
    }

    #[test]
    fn test_lost_frame_is_abandoned_after_fallback_window() {
        let (mut p, mut rt, mut s, mut panels) = setup(Buffering::Double);
        s.set_mode(SurfaceMode::Deferred);
        let t0 = Instant::now();
        let at = |ms| t0 + Duration::from_millis(ms);

        assert_eq!(p.capture_tick(&mut rt, &mut s, &mut panels, t0), CaptureOutcome::Pending);
        assert!(s.take_deferred().is_some());

        assert_eq!(p.capture_tick(&mut rt, &mut s, &mut panels, at(16)), CaptureOutcome::Skipped);
        assert_eq!(p.capture_tick(&mut rt, &mut s, &mut panels, at(40)), CaptureOutcome::Pending);
        assert_eq!(p.stats().dropped, 1);

        let frame = s.take_deferred().unwrap();
        assert_eq!(p.complete_capture(&mut rt, &mut panels, frame, at(44)), CaptureOutcome::Presented(1));
        assert_eq!(rt.upload_count(), 1);
    }

    #[test]
    fn test_destroyed_surface_stops_capture() {
        let (mut p, mut rt, mut s, mut panels) = setup(Buffering::Double);
        s.destroy();
        assert_eq!(p.capture_tick(&mut rt, &mut s, &mut panels, Instant::now()), CaptureOutcome::Stopped);
        assert!(p.is_stopped());
        assert!(!p.fallback_due(Instant::now() + Duration::from_secs(1)));
        assert_eq!(rt.upload_count(), 0);
    }

    #[test]
    fn test_mis_sized_frames_are_dropped_or_recovered() {
        let (mut p, mut rt, mut s, mut panels) = setup(Buffering::Single);
        let t0 = Instant::now();

        s.set_mode(SurfaceMode::Scaled(2.0));
        assert_eq!(p.capture_tick(&mut rt, &mut s, &mut panels, t0), CaptureOutcome::Presented(0));
        assert_eq!(rt.panel(panels.active()).unwrap().texture_size, Some((128, 64)));

        s.set_mode(SurfaceMode::Truncated(7));
        assert_eq!(p.capture_tick(&mut rt, &mut s, &mut panels, t0), CaptureOutcome::Dropped);
        assert_eq!(p.stats().dropped, 1);
    }

    #[test]
    fn test_pushed_frame_without_request_is_presented() {
        let (mut p, mut rt, _s, mut panels) = setup(Buffering::Double);
        let frame = Frame {
            width: 4,
            height: 2,
            pixels: vec![255; 32],
        };
        assert_eq!(
            p.complete_capture(&mut rt, &mut panels, frame, Instant::now()),
            CaptureOutcome::Presented(1)
        );
    }

    #[test]
    fn test_fallback_due_tracks_last_capture() {
        let (mut p, mut rt, mut s, mut panels) = setup(Buffering::Single);
        let t0 = Instant::now();
        assert!(p.fallback_due(t0));
        p.capture_tick(&mut rt, &mut s, &mut panels, t0);
        assert!(!p.fallback_due(t0 + Duration::from_millis(20)));
        assert!(p.fallback_due(t0 + Duration::from_millis(32)));
    }
}
