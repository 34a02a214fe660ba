//! Kiln engine crate.
//!
//! A batching compositor that sits directly above the GPU device. Application
//! code records sprites and glyphs between `begin` and `end`; the compositor
//! coalesces them into as few draw calls as the sampler budget and batch kind
//! switches allow, and resolves the pick id under the cursor without ever
//! waiting on the GPU.

pub mod device;
pub mod logging;
pub mod coords;
pub mod paint;
pub mod surface;
pub mod batch;
pub mod pick;
pub mod text;
pub mod compositor;

pub use compositor::{CompositorConfig, CompositorError, FrameCompositor, FrameStats};
