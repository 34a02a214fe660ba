use crate::batch::BatchKind;
use crate::surface::WriteSet;
use crate::text::GlyphTable;

use super::DeviceError;

/// Opaque handle to a backend image. Compared by identity only.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(u32);

impl ImageId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Opaque handle to a CPU-visible readback buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ReadbackId(u32);

impl ReadbackId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Opaque handle to a completion marker.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FenceId(u64);

impl FenceId {
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8Unorm,
    Rgba16Float,
    R32Uint,
    Depth32Float,
    Depth24Stencil8,
}

impl PixelFormat {
    /// True for formats that can be a colour attachment.
    #[inline]
    pub const fn is_color(self) -> bool {
        !matches!(self, PixelFormat::Depth32Float | PixelFormat::Depth24Stencil8)
    }

    /// True for unnormalized integer formats, which cannot be filtered or blended.
    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(self, PixelFormat::R32Uint)
    }

    /// Size of one texel, `None` for packed depth-stencil.
    #[inline]
    pub const fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelFormat::Rgba8Unorm | PixelFormat::R32Uint | PixelFormat::Depth32Float => Some(4),
            PixelFormat::Rgba16Float => Some(8),
            PixelFormat::Depth24Stencil8 => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub label: Option<&'static str>,
}

impl ImageDesc {
    pub const fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            label: None,
        }
    }

    pub const fn with_label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Scissor rectangle in surface pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Attachment set handed to the backend when a surface becomes current.
///
/// `attachments[i]` is the image behind colour slot `i`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SurfaceBinding<'a> {
    pub attachments: &'a [Option<ImageId>],
    pub width: u32,
    pub height: u32,
}

/// Independent sampler pools bound per draw.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SamplerChannel {
    Diffuse,
    Normals,
    Glyphs,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FenceStatus {
    Unsignaled,
    Signaled,
}

/// Command sink between the compositor and a GPU.
///
/// Calls are recorded in order. Nothing here may block on GPU completion:
/// `fence_status` and `read_pixel` must answer from whatever the device has
/// already reported.
pub trait RenderBackend {
    // ── images ────────────────────────────────────────────────────────────

    fn create_image(&mut self, desc: &ImageDesc) -> Result<ImageId, DeviceError>;

    /// Replaces the whole contents of `image` with tightly packed rows.
    fn upload_image(&mut self, image: ImageId, data: &[u8]) -> Result<(), DeviceError>;

    /// Unknown ids are ignored.
    fn destroy_image(&mut self, image: ImageId);

    /// `None` once the image has been destroyed.
    fn image_info(&self, image: ImageId) -> Option<ImageInfo>;

    // ── surface state ─────────────────────────────────────────────────────

    fn bind_surface(&mut self, binding: SurfaceBinding<'_>);

    /// Releases the current surface. The next draw needs a `bind_surface` first.
    fn unbind_surface(&mut self);

    fn set_write_set(&mut self, write_set: WriteSet);

    /// Clears the attachments in `slots`. Integer attachments clear to zero.
    fn clear(&mut self, slots: WriteSet, color: [f32; 4]);

    fn set_scissor(&mut self, scissor: Option<ScissorRect>);

    /// Resolution used to map surface pixels to clip space.
    fn set_resolution(&mut self, width: u32, height: u32);

    // ── batch submission ──────────────────────────────────────────────────

    fn upload_vertices(&mut self, kind: BatchKind, bytes: &[u8]);

    /// Slot-to-image table for the next draw of the channel's batch kind.
    fn bind_samplers(&mut self, channel: SamplerChannel, images: &[Option<ImageId>]);

    /// One draw call over the first `primitives` primitives of the last upload.
    fn draw(&mut self, kind: BatchKind, primitives: u32);

    fn upload_glyph_table(&mut self, font_slot: u8, table: &GlyphTable);

    // ── readback ──────────────────────────────────────────────────────────

    fn create_readback(&mut self) -> Result<ReadbackId, DeviceError>;

    fn destroy_readback(&mut self, readback: ReadbackId);

    /// Records a copy of one texel of `source` into `dst`.
    fn copy_pixel(&mut self, source: ImageId, x: u32, y: u32, dst: ReadbackId);

    /// Marker that signals once every command recorded so far against `readback`
    /// has completed and its contents are CPU-visible.
    fn insert_fence(&mut self, readback: ReadbackId) -> FenceId;

    fn fence_status(&mut self, fence: FenceId) -> FenceStatus;

    /// Contents of a readback whose fence signaled, `None` if the map failed.
    fn read_pixel(&mut self, readback: ReadbackId) -> Option<u32>;

    fn release_fence(&mut self, fence: FenceId);

    // ── frame ─────────────────────────────────────────────────────────────

    /// Hands everything recorded so far to the device.
    fn submit(&mut self);
}
