use super::{ImageId, PixelFormat, ReadbackId};

/// Failures reported by a [`RenderBackend`](super::RenderBackend) when creating
/// or filling resources.
///
/// Transient conditions (unsignaled fences, failed maps) are not errors; they
/// are reported through `FenceStatus` and `Option` returns instead.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("image {0:?} is not known to the backend")]
    UnknownImage(ImageId),

    #[error("readback buffer {0:?} is not known to the backend")]
    UnknownReadback(ReadbackId),

    #[error("cannot create a {width}x{height} image")]
    ZeroSizedImage { width: u32, height: u32 },

    #[error("{width}x{height} exceeds the device texture limit of {limit}")]
    ImageTooLarge { width: u32, height: u32, limit: u32 },

    #[error("upload of {actual} bytes does not match the {expected} bytes of a {format:?} image")]
    UploadSizeMismatch {
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },

    #[error("{format:?} images cannot be uploaded from the CPU")]
    NotUploadable { format: PixelFormat },
}
