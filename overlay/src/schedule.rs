//! Tick scheduling primitives: in-flight guards and the paint fallback.
//!
//! Input and capture ticks each own a `TickGuard`. A tick that finds its
//! guard held is skipped outright, never queued, so a slow runtime or
//! surface only lowers the effective rate.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::config::{CaptureMode, InputConfig, InputSchedule, PresentConfig};

// ── TickGuard ────────────────────────────────────────────────

/// Re-entrancy guard for one kind of tick.
#[derive(Debug, Clone, Default)]
pub struct TickGuard {
    busy: Rc<Cell<bool>>,
    skipped: Rc<Cell<u64>>,
}

/// Held for the duration of a tick; releases the guard on drop.
///
/// A tick whose work completes asynchronously keeps its token until the
/// completion arrives.
#[derive(Debug)]
pub struct TickToken {
    busy: Rc<Cell<bool>>,
}

impl Drop for TickToken {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}

impl TickGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a tick, or `None` (and count a skip) if one is in flight.
    pub fn try_enter(&self) -> Option<TickToken> {
        if self.busy.get() {
            self.skipped.set(self.skipped.get() + 1);
            return None;
        }
        self.busy.set(true);
        Some(TickToken {
            busy: Rc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Ticks skipped because one was already in flight.
    pub fn skipped(&self) -> u64 {
        self.skipped.get()
    }
}

// ── TickSchedule ─────────────────────────────────────────────

/// How a tick is driven by the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSchedule {
    /// A timer at a fixed interval.
    Fixed(Duration),
    /// Render-surface paint notices, with a fallback timer checked at
    /// `fallback`.
    OnPaint { fallback: Duration },
}

impl TickSchedule {
    pub fn for_input(config: &InputConfig) -> Self {
        match config.schedule {
            InputSchedule::Interval => Self::Fixed(config.interval()),
            InputSchedule::SyncWithCapture { fallback_fps } => Self::OnPaint {
                fallback: crate::config::interval_for_fps(fallback_fps),
            },
        }
    }

    pub fn for_capture(config: &PresentConfig) -> Self {
        match config.mode {
            CaptureMode::Polling => Self::Fixed(config.interval()),
            CaptureMode::PaintDriven => Self::OnPaint {
                fallback: config.interval(),
            },
        }
    }

    /// Period of the timer the event loop should arm.
    pub fn timer_interval(&self) -> Duration {
        match self {
            Self::Fixed(d) => *d,
            Self::OnPaint { fallback } => *fallback,
        }
    }

    pub fn follows_paint(&self) -> bool {
        matches!(self, Self::OnPaint { .. })
    }
}

// ── FallbackTimer ────────────────────────────────────────────

/// Decides whether a fallback tick is due: only after no tick ran for at
/// least twice the expected interval.
#[derive(Debug, Clone)]
pub struct FallbackTimer {
    interval: Duration,
    last_tick: Option<Instant>,
}

impl FallbackTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_tick: None,
        }
    }

    /// Record that a tick ran (paint-driven or fallback).
    pub fn mark(&mut self, now: Instant) {
        self.last_tick = Some(now);
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_tick {
            Some(last) => now.saturating_duration_since(last) >= self.interval * 2,
            None => true,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
