//! wgpu implementation of [`RenderBackend`](super::RenderBackend).
//!
//! [`GpuContext`] owns instance, adapter, device and (optionally) the window
//! surface. [`WgpuBackend`] takes a device and queue and renders compositor
//! layers into offscreen textures; presenting is a blit of the diffuse layer
//! onto the swapchain via [`WgpuBackend::composite_to`].

mod backend;
mod blit;
mod context;
mod pipelines;
mod readback;
mod shaders;

pub use backend::WgpuBackend;
pub use context::{GpuContext, GpuInit, SurfaceErrorAction};
