//! VR keyboard overlay library.
//!
//! Turns tracked-controller poses into pointer, click and scroll input on a
//! 2D keyboard panel composited by a VR runtime, lets a controller grip and
//! carry the panel, and keeps the panel texture current from an external
//! render surface. The binary entry point lives in `main.rs`.

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod input;
pub mod math;
pub mod panel;
pub mod present;
pub mod runtime;
pub mod schedule;
pub mod service;
pub mod sim;
pub mod surface;
pub mod throttle;
