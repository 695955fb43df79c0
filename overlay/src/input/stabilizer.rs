//! Adaptive low-pass filter for controller hit points.
//!
//! One-euro style: the position cutoff rises with the smoothed speed, so a
//! still pointer is held steady while fast sweeps stay responsive.

use std::f64::consts::PI;

use crate::config::StabilizerConfig;

/// Smoothing factor for a first-order low-pass at `cutoff` Hz over `dt` seconds.
pub fn alpha(cutoff: f64, dt: f64) -> f64 {
    let tau = 1.0 / (2.0 * PI * cutoff);
    1.0 / (1.0 + tau / dt)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Filtered {
    x: f64,
    y: f64,
    dx: f64,
    dy: f64,
    /// Seconds.
    last_time: f64,
}

/// Per-controller filter state.
#[derive(Debug, Clone)]
pub struct PointerStabilizer {
    min_cutoff: f64,
    beta: f64,
    derivative_cutoff: f64,
    state: Option<Filtered>,
}

impl PointerStabilizer {
    pub fn new(config: &StabilizerConfig) -> Self {
        Self {
            min_cutoff: config.min_cutoff,
            beta: config.beta,
            derivative_cutoff: config.derivative_cutoff,
            state: None,
        }
    }

    /// Feed a raw sample taken at `timestamp` seconds; returns the filtered point.
    pub fn update(&mut self, x: f64, y: f64, timestamp: f64) -> (f64, f64) {
        let Some(s) = self.state.as_mut() else {
            self.state = Some(Filtered {
                x,
                y,
                dx: 0.0,
                dy: 0.0,
                last_time: timestamp,
            });
            return (x, y);
        };

        let dt = timestamp - s.last_time;
        s.last_time = timestamp;
        if dt <= 0.0 {
            return (s.x, s.y);
        }

        let dx_raw = (x - s.x) / dt;
        let dy_raw = (y - s.y) / dt;

        let a_d = alpha(self.derivative_cutoff, dt);
        let dx = s.dx + a_d * (dx_raw - s.dx);
        let dy = s.dy + a_d * (dy_raw - s.dy);

        let speed = (dx * dx + dy * dy).sqrt();
        let cutoff = self.min_cutoff + self.beta * speed;
        let a = alpha(cutoff, dt);

        s.x += a * (x - s.x);
        s.y += a * (y - s.y);
        s.dx = dx;
        s.dy = dy;

        (s.x, s.y)
    }

    /// Forget history; the next sample passes through unfiltered.
    pub fn reset(&mut self) {
        self.state = None;
    }

    pub fn is_primed(&self) -> bool {
        self.state.is_some()
    }
}
