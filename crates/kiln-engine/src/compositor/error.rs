use crate::device::DeviceError;
use crate::surface::SurfaceError;

use super::ConfigError;

/// Errors returned by [`FrameCompositor`](super::FrameCompositor).
///
/// Illegal-state variants are caller protocol violations. Sampler exhaustion
/// and slow or failed readbacks never show up here.
#[derive(Debug, thiserror::Error)]
pub enum CompositorError {
    #[error("begin called while a frame is already recording")]
    AlreadyRecording,

    #[error("{0} called while no frame is recording")]
    NotRecording(&'static str),

    #[error("{0} is not allowed while a frame is recording")]
    WhileRecording(&'static str),

    #[error("{0} called while the compositor is paused")]
    Paused(&'static str),

    #[error("resume called while not paused")]
    NotPaused,

    #[error("pop_scissor called with an empty scissor stack")]
    ScissorUnderflow,

    #[error("font slot {0} is out of range")]
    FontSlot(u8),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}
