//! CPU-only backend used by the test suites.
//!
//! It keeps an ordered log of every command, a registry of live images and a
//! simulated readback path:
//! - a copy captures the id-layer value at record time and lands at `submit`
//! - a fence signals after `fence_latency` submits (never while stalled)
//! - the id layer is a single value standing in for the pixel under the cursor

use std::collections::HashMap;

use crate::batch::BatchKind;
use crate::surface::{SurfaceRole, WriteSet};
use crate::text::GlyphTable;

use super::{
    DeviceError, FenceId, FenceStatus, ImageDesc, ImageId, ImageInfo, ReadbackId, RenderBackend,
    SamplerChannel, ScissorRect, SurfaceBinding,
};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateImage { image: ImageId, desc: ImageDesc },
    UploadImage { image: ImageId, bytes: usize },
    DestroyImage(ImageId),
    BindSurface { attachments: Vec<Option<ImageId>>, width: u32, height: u32 },
    UnbindSurface,
    SetWriteSet(WriteSet),
    Clear { slots: WriteSet, color: [f32; 4] },
    SetScissor(Option<ScissorRect>),
    SetResolution { width: u32, height: u32 },
    UploadVertices { kind: BatchKind, data: Vec<u8> },
    BindSamplers { channel: SamplerChannel, images: Vec<Option<ImageId>> },
    Draw { kind: BatchKind, primitives: u32, write_set: WriteSet },
    UploadGlyphTable { font_slot: u8 },
    CopyPixel { source: ImageId, x: u32, y: u32, dst: ReadbackId },
    InsertFence { fence: FenceId, readback: ReadbackId },
    ReleaseFence(FenceId),
    Submit,
}

#[derive(Debug)]
struct HeadlessFence {
    readback: ReadbackId,
    /// Submits left before the fence signals.
    remaining: u32,
}

#[derive(Debug, Default)]
struct HeadlessReadback {
    /// Value copied by the last completed submit.
    contents: Option<u32>,
    /// Copies recorded since the last submit.
    in_flight: Option<u32>,
}

/// Recording [`RenderBackend`] with simulated GPU latency.
#[derive(Debug)]
pub struct HeadlessBackend {
    commands: Vec<Command>,
    images: HashMap<ImageId, ImageInfo>,
    next_image: u32,

    readbacks: HashMap<ReadbackId, HeadlessReadback>,
    next_readback: u32,
    fences: HashMap<FenceId, HeadlessFence>,
    next_fence: u64,

    bound: Option<Vec<Option<ImageId>>>,
    write_set: WriteSet,

    /// Number of submits a fence waits before signaling.
    pub fence_latency: u32,
    /// While set, no fence ever signals.
    pub stall_fences: bool,
    fail_next_map: bool,

    id_pixel: u32,
    staged_id: u32,
    submits: u64,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            images: HashMap::new(),
            next_image: 1,
            readbacks: HashMap::new(),
            next_readback: 1,
            fences: HashMap::new(),
            next_fence: 1,
            bound: None,
            write_set: WriteSet::EMPTY,
            fence_latency: 1,
            stall_fences: false,
            fail_next_map: false,
            id_pixel: 0,
            staged_id: 0,
            submits: 0,
        }
    }

    pub fn with_fence_latency(mut self, submits: u32) -> Self {
        self.fence_latency = submits;
        self
    }

    /// Value that sprite draws write to the id layer under the cursor.
    pub fn stage_id_pixel(&mut self, value: u32) {
        self.staged_id = value;
    }

    /// Current id-layer value under the cursor.
    pub fn id_pixel(&self) -> u32 {
        self.id_pixel
    }

    /// Makes the next `read_pixel` report a failed map.
    pub fn fail_next_map(&mut self) {
        self.fail_next_map = true;
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Draw calls in recording order.
    pub fn draws(&self) -> impl Iterator<Item = (BatchKind, u32, WriteSet)> + '_ {
        self.commands.iter().filter_map(|c| match c {
            Command::Draw { kind, primitives, write_set } => Some((*kind, *primitives, *write_set)),
            _ => None,
        })
    }

    pub fn draw_count(&self) -> usize {
        self.draws().count()
    }

    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    pub fn submit_count(&self) -> u64 {
        self.submits
    }

    pub fn live_images(&self) -> usize {
        self.images.len()
    }

    pub fn live_readbacks(&self) -> usize {
        self.readbacks.len()
    }

    pub fn outstanding_fences(&self) -> usize {
        self.fences.len()
    }

    pub fn bound_attachments(&self) -> Option<&[Option<ImageId>]> {
        self.bound.as_deref()
    }

    fn id_slot_targeted(&self, slots: WriteSet) -> bool {
        let id = SurfaceRole::PixelId.slot();
        self.bound
            .as_ref()
            .is_some_and(|b| b.get(id).copied().flatten().is_some())
            && slots.contains(id)
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_image(&mut self, desc: &ImageDesc) -> Result<ImageId, DeviceError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(DeviceError::ZeroSizedImage {
                width: desc.width,
                height: desc.height,
            });
        }
        let image = ImageId::from_raw(self.next_image);
        self.next_image += 1;
        self.images.insert(
            image,
            ImageInfo {
                width: desc.width,
                height: desc.height,
                format: desc.format,
            },
        );
        self.commands.push(Command::CreateImage {
            image,
            desc: desc.clone(),
        });
        Ok(image)
    }

    fn upload_image(&mut self, image: ImageId, data: &[u8]) -> Result<(), DeviceError> {
        let info = self.image_info(image).ok_or(DeviceError::UnknownImage(image))?;
        let bpp = match info.format.bytes_per_pixel() {
            Some(bpp) if info.format.is_color() => bpp,
            _ => return Err(DeviceError::NotUploadable { format: info.format }),
        };
        let expected = info.width as usize * info.height as usize * bpp;
        if data.len() != expected {
            return Err(DeviceError::UploadSizeMismatch {
                format: info.format,
                expected,
                actual: data.len(),
            });
        }
        self.commands.push(Command::UploadImage {
            image,
            bytes: data.len(),
        });
        Ok(())
    }

    fn destroy_image(&mut self, image: ImageId) {
        if self.images.remove(&image).is_some() {
            self.commands.push(Command::DestroyImage(image));
        }
    }

    fn image_info(&self, image: ImageId) -> Option<ImageInfo> {
        self.images.get(&image).copied()
    }

    fn bind_surface(&mut self, binding: SurfaceBinding<'_>) {
        self.bound = Some(binding.attachments.to_vec());
        self.commands.push(Command::BindSurface {
            attachments: binding.attachments.to_vec(),
            width: binding.width,
            height: binding.height,
        });
    }

    fn unbind_surface(&mut self) {
        self.bound = None;
        self.commands.push(Command::UnbindSurface);
    }

    fn set_write_set(&mut self, write_set: WriteSet) {
        self.write_set = write_set;
        self.commands.push(Command::SetWriteSet(write_set));
    }

    fn clear(&mut self, slots: WriteSet, color: [f32; 4]) {
        if self.id_slot_targeted(slots) {
            self.id_pixel = 0;
        }
        self.commands.push(Command::Clear { slots, color });
    }

    fn set_scissor(&mut self, scissor: Option<ScissorRect>) {
        self.commands.push(Command::SetScissor(scissor));
    }

    fn set_resolution(&mut self, width: u32, height: u32) {
        self.commands.push(Command::SetResolution { width, height });
    }

    fn upload_vertices(&mut self, kind: BatchKind, bytes: &[u8]) {
        self.commands.push(Command::UploadVertices {
            kind,
            data: bytes.to_vec(),
        });
    }

    fn bind_samplers(&mut self, channel: SamplerChannel, images: &[Option<ImageId>]) {
        self.commands.push(Command::BindSamplers {
            channel,
            images: images.to_vec(),
        });
    }

    fn draw(&mut self, kind: BatchKind, primitives: u32) {
        if kind == BatchKind::Sprite && self.id_slot_targeted(self.write_set) {
            self.id_pixel = self.staged_id;
        }
        self.commands.push(Command::Draw {
            kind,
            primitives,
            write_set: self.write_set,
        });
    }

    fn upload_glyph_table(&mut self, font_slot: u8, _table: &GlyphTable) {
        self.commands.push(Command::UploadGlyphTable { font_slot });
    }

    fn create_readback(&mut self) -> Result<ReadbackId, DeviceError> {
        let readback = ReadbackId::from_raw(self.next_readback);
        self.next_readback += 1;
        self.readbacks.insert(readback, HeadlessReadback::default());
        Ok(readback)
    }

    fn destroy_readback(&mut self, readback: ReadbackId) {
        self.readbacks.remove(&readback);
        self.fences.retain(|_, f| f.readback != readback);
    }

    fn copy_pixel(&mut self, source: ImageId, x: u32, y: u32, dst: ReadbackId) {
        let value = self.id_pixel;
        if let Some(rb) = self.readbacks.get_mut(&dst) {
            rb.in_flight = Some(value);
        }
        self.commands.push(Command::CopyPixel { source, x, y, dst });
    }

    fn insert_fence(&mut self, readback: ReadbackId) -> FenceId {
        let fence = FenceId::from_raw(self.next_fence);
        self.next_fence += 1;
        self.fences.insert(
            fence,
            HeadlessFence {
                readback,
                remaining: self.fence_latency,
            },
        );
        self.commands.push(Command::InsertFence { fence, readback });
        fence
    }

    fn fence_status(&mut self, fence: FenceId) -> FenceStatus {
        match self.fences.get(&fence) {
            Some(f) if f.remaining == 0 && !self.stall_fences => FenceStatus::Signaled,
            _ => FenceStatus::Unsignaled,
        }
    }

    fn read_pixel(&mut self, readback: ReadbackId) -> Option<u32> {
        if std::mem::take(&mut self.fail_next_map) {
            return None;
        }
        self.readbacks.get(&readback).and_then(|rb| rb.contents)
    }

    fn release_fence(&mut self, fence: FenceId) {
        if self.fences.remove(&fence).is_some() {
            self.commands.push(Command::ReleaseFence(fence));
        }
    }

    fn submit(&mut self) {
        self.submits += 1;
        for rb in self.readbacks.values_mut() {
            if let Some(v) = rb.in_flight.take() {
                rb.contents = Some(v);
            }
        }
        if !self.stall_fences {
            for f in self.fences.values_mut() {
                f.remaining = f.remaining.saturating_sub(1);
            }
        }
        self.commands.push(Command::Submit);
    }
}
