//! Event-loop hosts for the overlay service.
//!
//! Only the headless host ships in this crate; hosts that bind a real VR
//! runtime and render surface provide their own `PoseSource`,
//! `OverlayRuntime` and `RenderSurface` implementations and drive
//! `OverlayService` the same way.

pub mod headless;

pub use headless::HeadlessConfig;

use crate::config::OverlayConfig;

/// Backend type selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Headless,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Headless => "headless",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "headless" | "auto" => Some(Self::Headless),
            _ => None,
        }
    }
}

/// Run the overlay with the selected backend.
pub fn run(backend: BackendType, config: OverlayConfig, headless: HeadlessConfig) -> anyhow::Result<()> {
    match backend {
        BackendType::Headless => headless::run(config, headless),
    }
}
