//! Keeping the panel texture current.

pub mod frame;
pub mod pipeline;

pub use pipeline::{CaptureOutcome, PresentStats, PresentationPipeline};
