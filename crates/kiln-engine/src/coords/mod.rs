//! Geometry types shared by the batches and the compositor.
//!
//! Canonical CPU space:
//! - surface pixels
//! - origin top-left
//! - +X right, +Y down
//!
//! The vertex stage converts to NDC using the resolution uniform.

mod rect;
mod vec2;

pub use rect::Rect;
pub use vec2::Vec2;
