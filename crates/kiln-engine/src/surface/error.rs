use crate::device::{DeviceError, ImageId, PixelFormat};

/// Surface configuration errors, raised at attach/resize time.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("attachment slot {slot} is out of range")]
    SlotOutOfRange { slot: usize },

    #[error("attachment slot {slot} is already occupied; detach it first")]
    SlotOccupied { slot: usize },

    #[error("attachment slot {slot} is empty")]
    SlotEmpty { slot: usize },

    #[error("image {0:?} is not known to the backend")]
    UnknownImage(ImageId),

    #[error("{format:?} is not a colour format")]
    NotColorFormat { format: PixelFormat },

    #[error("slot {slot} expects {expected:?}, got {actual:?}")]
    FormatMismatch {
        slot: usize,
        expected: PixelFormat,
        actual: PixelFormat,
    },

    #[error("image is {actual:?} but the surface is {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("surface cannot be {width}x{height}")]
    ZeroSize { width: u32, height: u32 },

    #[error(transparent)]
    Device(#[from] DeviceError),
}
