//! GPU device seam.
//!
//! Everything above this module talks to the GPU through [`RenderBackend`].
//! Two implementations ship with the crate:
//! - [`HeadlessBackend`] records commands and simulates fences on the CPU
//! - [`WgpuBackend`] drives a real wgpu device

mod backend;
mod error;
mod gpu;
mod headless;

pub use backend::{
    FenceId, FenceStatus, ImageDesc, ImageId, ImageInfo, PixelFormat, ReadbackId, RenderBackend,
    SamplerChannel, ScissorRect, SurfaceBinding,
};
pub use error::DeviceError;
pub use gpu::{GpuContext, GpuInit, SurfaceErrorAction, WgpuBackend};
pub use headless::{Command, HeadlessBackend};
