//! Error types for the VR runtime and the render surface.

use thiserror::Error;

use crate::runtime::PanelHandle;

/// Failures reported by the VR runtime.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("VR runtime not available")]
    Unavailable,

    #[error("invalid panel handle {0:?}")]
    InvalidHandle(PanelHandle),

    #[error("pose for device {0} not available")]
    PoseUnavailable(u32),

    #[error("{op} failed: {reason}")]
    Call { op: &'static str, reason: String },
}

impl RuntimeError {
    pub fn call(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Call {
            op,
            reason: reason.into(),
        }
    }
}

/// Failures reported by the render surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    #[error("render surface destroyed")]
    Destroyed,

    #[error("frame capture failed: {0}")]
    Capture(String),
}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;
pub type SurfaceResult<T> = std::result::Result<T, SurfaceError>;
