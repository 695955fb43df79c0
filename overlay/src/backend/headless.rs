//! Headless backend: drives the overlay service against the in-process
//! runtime and surface.
//!
//! Used for CI and for soak-testing the scheduling without a headset. A
//! background thread plays the render host, posting paint notices over a
//! calloop channel; an optional scripted controller sweeps across the
//! panel and taps the trigger so the input path sees real traffic.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use calloop::channel::{self, Channel, Sender};
use calloop::signals::{Signal, Signals};
use calloop::timer::{TimeoutAction, Timer};
use calloop::EventLoop;
use tracing::{debug, info, warn};

use crate::clock::SystemClock;
use crate::config::OverlayConfig;
use crate::math::{Pose, Vec3};
use crate::runtime::{ButtonState, ControllerId, HMD_DEVICE};
use crate::service::OverlayService;
use crate::sim::{SimRuntime, SimSurface, SurfaceMode};
use crate::surface::SurfaceNotice;

/// Simulated controller id.
const SWEEP_CONTROLLER: ControllerId = 1;

/// Headless host configuration.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub surface_width: u32,
    pub surface_height: u32,
    /// Rate of simulated paint notices; 0 disables the paint thread.
    pub paint_fps: u32,
    /// Answer frame requests asynchronously.
    pub deferred_frames: bool,
    /// Drive a scripted controller across the panel.
    pub sweep_controller: bool,
    /// Exit after N seconds.
    pub exit_after: Option<u64>,
    pub status_interval: Duration,
    /// Upper bound on one event-loop dispatch.
    pub poll_interval: Duration,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            surface_width: 1000,
            surface_height: 500,
            paint_fps: 60,
            deferred_frames: false,
            sweep_controller: true,
            exit_after: None,
            status_interval: Duration::from_secs(60),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl HeadlessConfig {
    /// Parse a "WxH" surface size.
    pub fn parse_size(s: &str) -> Option<(u32, u32)> {
        let (w, h) = s.split_once('x')?;
        let w = w.parse::<u32>().ok()?;
        let h = h.parse::<u32>().ok()?;
        (w > 0 && h > 0).then_some((w, h))
    }
}

struct HeadlessState {
    service: OverlayService<SimRuntime, SimSurface, SystemClock>,
    notices: Sender<SurfaceNotice>,
    sweep: Option<Instant>,
    running: bool,
}

impl HeadlessState {
    /// Hand a deferred frame back through the notice channel, the way a
    /// real surface completes an asynchronous capture.
    fn complete_deferred(&mut self) {
        if !self.service.present().is_pending() {
            return;
        }
        if let Some(frame) = self.service.surface_mut().take_deferred() {
            if self.notices.send(SurfaceNotice::FrameReady(frame)).is_err() {
                warn!("headless: notice channel closed");
            }
        }
    }

    fn advance_sweep(&mut self) {
        let Some(started) = self.sweep else {
            return;
        };
        let t = started.elapsed().as_secs_f64();
        let x = 0.15 * (t * TAU / 6.0).sin();
        let pose = Pose::from_translation(Vec3::new(x, 1.3, 0.0));
        let buttons = ButtonState {
            trigger: t % 4.0 < 0.15,
            grip: false,
        };
        self.service
            .runtime_mut()
            .set_device(SWEEP_CONTROLLER, Some(pose), buttons);
    }
}

fn spawn_paint_thread(sender: Sender<SurfaceNotice>, fps: u32, stop: Arc<AtomicBool>) {
    let interval = crate::config::interval_for_fps(fps);
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            thread::sleep(interval);
            if sender.send(SurfaceNotice::Paint).is_err() {
                break;
            }
        }
        debug!("headless: paint thread exiting");
    });
}

/// Run the overlay until a signal or the exit timer stops it.
pub fn run(config: OverlayConfig, headless: HeadlessConfig) -> anyhow::Result<()> {
    let mut event_loop = EventLoop::<HeadlessState>::try_new()?;
    let handle = event_loop.handle();

    let mut runtime = SimRuntime::new();
    runtime.set_device(
        HMD_DEVICE,
        Some(Pose::from_translation(Vec3::new(0.0, 1.6, 0.0))),
        ButtonState::default(),
    );
    let mut surface = SimSurface::new(headless.surface_width, headless.surface_height);
    if headless.deferred_frames {
        surface.set_mode(SurfaceMode::Deferred);
    }

    let mut service = OverlayService::new(config, runtime, surface, SystemClock);
    service
        .start()
        .map_err(|e| anyhow::anyhow!("failed to start overlay: {}", e))?;

    let (sender, notices): (Sender<SurfaceNotice>, Channel<SurfaceNotice>) = channel::channel();
    let mut state = HeadlessState {
        service,
        notices: sender.clone(),
        sweep: headless.sweep_controller.then(Instant::now),
        running: true,
    };

    // Render-host notices
    handle
        .insert_source(notices, |event, _, state: &mut HeadlessState| match event {
            channel::Event::Msg(notice) => {
                let paint = notice == SurfaceNotice::Paint;
                if paint {
                    state.advance_sweep();
                }
                state.service.on_notice(notice);
                if paint {
                    state.complete_deferred();
                }
            }
            channel::Event::Closed => debug!("headless: notice channel closed"),
        })
        .map_err(|e| anyhow::anyhow!("failed to register notice channel: {}", e.error))?;

    let stop_paint = Arc::new(AtomicBool::new(false));
    if headless.paint_fps > 0 {
        spawn_paint_thread(sender, headless.paint_fps, Arc::clone(&stop_paint));
        info!("headless: simulated paints at {} fps", headless.paint_fps);
    }

    // Input ticks: fixed rate, or fallback when paints stall
    let input_interval = state.service.input_schedule().timer_interval();
    handle
        .insert_source(
            Timer::from_duration(input_interval),
            move |_, _, state: &mut HeadlessState| {
                state.advance_sweep();
                state.service.on_input_timer();
                TimeoutAction::ToDuration(input_interval)
            },
        )
        .map_err(|e| anyhow::anyhow!("failed to register input timer: {}", e.error))?;

    // Capture ticks, same rules; dropped once the surface is gone
    let capture_interval = state.service.capture_schedule().timer_interval();
    handle
        .insert_source(
            Timer::from_duration(capture_interval),
            move |_, _, state: &mut HeadlessState| {
                if state.service.present().is_stopped() {
                    info!("headless: capture timer removed");
                    return TimeoutAction::Drop;
                }
                state.service.on_capture_timer();
                state.complete_deferred();
                TimeoutAction::ToDuration(capture_interval)
            },
        )
        .map_err(|e| anyhow::anyhow!("failed to register capture timer: {}", e.error))?;

    // Signal handling: SIGTERM and SIGINT for graceful shutdown
    let signals = Signals::new(&[Signal::SIGTERM, Signal::SIGINT])
        .map_err(|e| anyhow::anyhow!("failed to create signal source: {}", e))?;
    handle
        .insert_source(signals, |event, _, state: &mut HeadlessState| {
            info!("Received signal {:?}, shutting down", event.signal());
            state.running = false;
        })
        .map_err(|e| anyhow::anyhow!("failed to register signal handler: {}", e.error))?;

    if let Some(seconds) = headless.exit_after {
        info!("Will exit after {} seconds", seconds);
        handle
            .insert_source(
                Timer::from_duration(Duration::from_secs(seconds)),
                |_, _, state: &mut HeadlessState| {
                    info!("headless: exit timer fired");
                    state.running = false;
                    TimeoutAction::Drop
                },
            )
            .map_err(|e| anyhow::anyhow!("failed to register exit timer: {}", e.error))?;
    }

    let status_interval = headless.status_interval;
    handle
        .insert_source(
            Timer::from_duration(status_interval),
            move |_, _, state: &mut HeadlessState| {
                let st = state.service.status();
                info!(
                    "headless status: {} input tick(s) ({} skipped), {} controller(s), {} frame(s) presented, {} dropped, {} skipped",
                    st.input_ticks,
                    st.input_skipped,
                    st.controllers,
                    st.present.presented,
                    st.present.dropped,
                    st.present.skipped
                );
                TimeoutAction::ToDuration(status_interval)
            },
        )
        .map_err(|e| anyhow::anyhow!("failed to register status timer: {}", e.error))?;

    info!(
        "headless: {}x{} surface, entering event loop",
        headless.surface_width, headless.surface_height
    );
    while state.running {
        event_loop.dispatch(Some(headless.poll_interval), &mut state)?;
    }

    stop_paint.store(true, Ordering::Relaxed);
    state.service.stop();
    let st = state.service.status();
    info!(
        "headless: shutting down ({} input tick(s), {} frame(s) presented)",
        st.input_ticks, st.present.presented
    );
    Ok(())
}
