//! Frame orchestration.
//!
//! [`FrameCompositor`] owns the render surface, both batches and the pick
//! pipeline, and drives them through one `begin`/`end` cycle per frame:
//!
//! ```text
//! NotRecording --begin--> Recording(None) --draw--> Recording(Sprite | Text)
//!       ^                                                   |
//!       +---------------------------end---------------------+
//! ```

mod config;
mod error;
mod frame;
mod scissor;
mod state;
mod stats;

pub use config::{CompositorConfig, ConfigError};
pub use error::CompositorError;
pub use frame::{FrameCompositor, PickMode, TextStyle};
pub use scissor::ScissorStack;
pub use state::RecordState;
pub use stats::{FrameStats, StatsWindow};
