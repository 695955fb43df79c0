//! Controller input: from tracked poses to pointer, scroll and grip.

pub mod arbiter;
pub mod engine;
pub mod gesture;
pub mod grip;
pub mod hit;
pub mod mapping;
pub mod stabilizer;

pub use engine::{InputEngine, InputTickSummary};
