//! Captured-frame validation.
//!
//! Under display scaling a surface can report its logical size while
//! handing back a buffer at device resolution. Such frames are recovered
//! by factoring the buffer length against the reported aspect ratio.

use thiserror::Error;

use crate::surface::Frame;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame is empty ({width}x{height}, {len} bytes)")]
    Empty { width: u32, height: u32, len: usize },

    #[error("buffer of {len} bytes does not fit {width}x{height} and no consistent size exists")]
    Mismatch { width: u32, height: u32, len: usize },
}

/// Accept a frame whose buffer is exactly `width * height * 4` bytes, or
/// re-derive its dimensions when a consistent factoring exists.
pub fn validate_frame(mut frame: Frame) -> Result<Frame, FrameError> {
    let len = frame.pixels.len();
    if frame.width == 0 || frame.height == 0 || len == 0 {
        return Err(FrameError::Empty {
            width: frame.width,
            height: frame.height,
            len,
        });
    }
    if Frame::expected_len(frame.width, frame.height) == Some(len) {
        return Ok(frame);
    }

    let (width, height) = recover_dimensions(frame.width, frame.height, len).ok_or(FrameError::Mismatch {
        width: frame.width,
        height: frame.height,
        len,
    })?;
    frame.width = width;
    frame.height = height;
    Ok(frame)
}

/// Width and height whose product covers `len` bytes exactly and whose
/// ratio matches `width / height` to within a pixel.
pub fn recover_dimensions(width: u32, height: u32, len: usize) -> Option<(u32, u32)> {
    if len % 4 != 0 || width == 0 || height == 0 {
        return None;
    }
    let pixels = (len / 4) as u64;
    let aspect = f64::from(width) / f64::from(height);
    let guess = (pixels as f64 / aspect).sqrt().round() as u64;

    (guess.saturating_sub(2)..=guess + 2)
        .filter(|h| *h > 0 && pixels % h == 0)
        .map(|h| (pixels / h, h))
        .find(|(w, h)| (*w as f64 - *h as f64 * aspect).abs() <= 1.0)
        .and_then(|(w, h)| Some((u32::try_from(w).ok()?, u32::try_from(h).ok()?)))
}
