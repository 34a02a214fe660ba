use std::collections::HashMap;
use std::sync::mpsc;

use crate::device::{FenceId, FenceStatus, ReadbackId};

/// Copies must start at a multiple of this many bytes per row.
const READBACK_BYTES: u64 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64;

type MapResult = Result<(), wgpu::BufferAsyncError>;

enum FenceState {
    /// Recorded but not yet submitted; the map request is issued after submit.
    Recorded,
    Mapping(mpsc::Receiver<MapResult>),
    Mapped,
    /// Contents were read and the buffer unmapped.
    Consumed,
    Failed,
}

struct Fence {
    readback: ReadbackId,
    state: FenceState,
}

/// Single-texel readback buffers and the fences guarding them.
///
/// A fence is a map request on its readback buffer: it signals when wgpu
/// reports the mapping complete (or failed). Nothing here waits on the device.
#[derive(Default)]
pub(super) struct Readbacks {
    buffers: HashMap<ReadbackId, wgpu::Buffer>,
    fences: HashMap<FenceId, Fence>,
    next_buffer: u32,
    next_fence: u64,
}

impl Readbacks {
    pub fn create(&mut self, device: &wgpu::Device) -> ReadbackId {
        let id = ReadbackId::from_raw(self.next_buffer);
        self.next_buffer = self.next_buffer.wrapping_add(1);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kiln pick readback"),
            size: READBACK_BYTES,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.buffers.insert(id, buffer);
        id
    }

    pub fn destroy(&mut self, readback: ReadbackId) {
        self.fences.retain(|_, f| f.readback != readback);
        if let Some(buffer) = self.buffers.remove(&readback) {
            buffer.destroy();
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Records a copy of texel `(x, y)` of `texture` into `dst`.
    pub fn copy_pixel(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
        x: u32,
        y: u32,
        dst: ReadbackId,
    ) -> bool {
        let Some(buffer) = self.buffers.get(&dst) else {
            return false;
        };
        if x >= texture.width() || y >= texture.height() {
            return false;
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(READBACK_BYTES as u32),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        true
    }

    pub fn insert_fence(&mut self, readback: ReadbackId) -> FenceId {
        let id = FenceId::from_raw(self.next_fence);
        self.next_fence = self.next_fence.wrapping_add(1);

        let state = if self.buffers.contains_key(&readback) {
            FenceState::Recorded
        } else {
            FenceState::Failed
        };
        self.fences.insert(id, Fence { readback, state });
        id
    }

    /// Issues map requests for fences whose commands were just submitted.
    pub fn after_submit(&mut self) {
        for fence in self.fences.values_mut() {
            if !matches!(fence.state, FenceState::Recorded) {
                continue;
            }
            let Some(buffer) = self.buffers.get(&fence.readback) else {
                fence.state = FenceState::Failed;
                continue;
            };

            let (sender, receiver) = mpsc::channel();
            buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send(result);
            });
            fence.state = FenceState::Mapping(receiver);
        }
    }

    /// Non-blocking status. `device` is polled once so callbacks can fire.
    pub fn status(&mut self, device: &wgpu::Device, fence: FenceId) -> FenceStatus {
        let Some(f) = self.fences.get_mut(&fence) else {
            return FenceStatus::Signaled;
        };

        if let FenceState::Mapping(receiver) = &f.state {
            let _ = device.poll(wgpu::PollType::Poll);
            f.state = match receiver.try_recv() {
                Ok(Ok(())) => FenceState::Mapped,
                Ok(Err(err)) => {
                    log::debug!("pick readback map failed: {err}");
                    FenceState::Failed
                }
                Err(mpsc::TryRecvError::Empty) => return FenceStatus::Unsignaled,
                Err(mpsc::TryRecvError::Disconnected) => FenceState::Failed,
            };
        }

        match f.state {
            FenceState::Recorded | FenceState::Mapping(_) => FenceStatus::Unsignaled,
            FenceState::Mapped | FenceState::Consumed | FenceState::Failed => {
                FenceStatus::Signaled
            }
        }
    }

    /// Reads the texel behind a signaled fence and unmaps the buffer.
    pub fn read(&mut self, readback: ReadbackId) -> Option<u32> {
        let buffer = self.buffers.get(&readback)?;
        let fence = self
            .fences
            .values_mut()
            .find(|f| f.readback == readback && matches!(f.state, FenceState::Mapped))?;

        let value = {
            let view = buffer.slice(..4).get_mapped_range();
            u32::from_le_bytes([view[0], view[1], view[2], view[3]])
        };
        buffer.unmap();
        fence.state = FenceState::Consumed;
        Some(value)
    }

    pub fn release(&mut self, fence: FenceId) {
        let Some(f) = self.fences.remove(&fence) else {
            return;
        };
        if matches!(f.state, FenceState::Mapped) {
            if let Some(buffer) = self.buffers.get(&f.readback) {
                buffer.unmap();
            }
        }
    }

    pub fn outstanding(&self) -> usize {
        self.fences.len()
    }
}
