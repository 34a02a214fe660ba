use std::collections::HashMap;
use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::batch::{quad_indices, BatchKind, FONT_SLOTS, MAX_SAMPLER_SLOTS};
use crate::device::{
    DeviceError, FenceId, FenceStatus, ImageDesc, ImageId, ImageInfo, PixelFormat, ReadbackId,
    RenderBackend, SamplerChannel, ScissorRect, SurfaceBinding,
};
use crate::surface::{WriteSet, MAX_ATTACHMENTS};
use crate::text::{GlyphEntry, GlyphTable, GLYPH_TABLE_LEN};

use super::blit::BlitPipeline;
use super::pipelines::{is_filterable, writes_target, PipelineCache, PipelineKey, TargetFormats};
use super::readback::Readbacks;

const INITIAL_ARENA_BYTES: u64 = 256 * 1024;
const MIN_INDEXED_QUADS: usize = 256;
const GLYPH_TABLE_BYTES: u64 = (GLYPH_TABLE_LEN * size_of::<GlyphEntry>()) as u64;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct ViewportUniform {
    viewport: [f32; 2],
    _pad: [f32; 2],
}

struct GpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    info: ImageInfo,
}

/// Append-only vertex storage, rewound after each submit.
///
/// Queue writes land before the next submit's commands, so uploads for
/// different draws of one submit must not overlap.
struct VertexArena {
    label: &'static str,
    buffer: wgpu::Buffer,
    cursor: u64,
    last: Option<(u64, u64)>,
}

impl VertexArena {
    fn new(device: &wgpu::Device, label: &'static str) -> Self {
        Self {
            label,
            buffer: create_vertex_buffer(device, label, INITIAL_ARENA_BYTES),
            cursor: 0,
            last: None,
        }
    }

    fn fits(&self, len: u64) -> bool {
        self.cursor + len <= self.buffer.size()
    }
}

fn create_vertex_buffer(device: &wgpu::Device, label: &'static str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

struct BoundSurface {
    attachments: [Option<ImageId>; MAX_ATTACHMENTS],
    width: u32,
    height: u32,
}

fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        PixelFormat::R32Uint => wgpu::TextureFormat::R32Uint,
        PixelFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        PixelFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
    }
}

#[inline]
fn arena_index(kind: BatchKind) -> usize {
    match kind {
        BatchKind::Sprite => 0,
        BatchKind::Text => 1,
    }
}

/// Clamps `r` to the surface; `None` when nothing of it remains.
fn clamp_scissor(r: ScissorRect, width: u32, height: u32) -> Option<ScissorRect> {
    let x = r.x.min(width);
    let y = r.y.min(height);
    let w = r.width.min(width - x);
    let h = r.height.min(height - y);
    (w > 0 && h > 0).then_some(ScissorRect {
        x,
        y,
        width: w,
        height: h,
    })
}

/// [`RenderBackend`] over a wgpu device.
///
/// Commands accumulate in one encoder that is submitted on `submit`, or
/// earlier when a queue write has to be ordered after already recorded work.
/// Each draw is its own render pass with `LoadOp::Load`.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    encoder: Option<wgpu::CommandEncoder>,

    images: HashMap<ImageId, GpuImage>,
    next_image: u32,
    /// 1x1 white texture bound to every unused or unsampleable slot.
    placeholder: wgpu::TextureView,
    sampler: wgpu::Sampler,

    viewport: wgpu::Buffer,
    resolution: (u32, u32),
    glyph_tables: wgpu::Buffer,
    sprite_globals: wgpu::BindGroup,
    text_globals: wgpu::BindGroup,

    arenas: [VertexArena; 2],
    quad_indices: wgpu::Buffer,
    quad_capacity: usize,

    surface: Option<BoundSurface>,
    write_set: WriteSet,
    scissor: Option<ScissorRect>,
    diffuse: Vec<Option<ImageId>>,
    normals: Vec<Option<ImageId>>,
    glyphs: Vec<Option<ImageId>>,

    pipelines: PipelineCache,
    readbacks: Readbacks,
    blit: BlitPipeline,
    warned_unbound: bool,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let pipelines = PipelineCache::new(&device);

        let viewport = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kiln viewport uniform"),
            contents: bytemuck::bytes_of(&ViewportUniform {
                viewport: [1.0, 1.0],
                _pad: [0.0; 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let glyph_tables = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kiln glyph tables"),
            size: GLYPH_TABLE_BYTES * FONT_SLOTS as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("kiln sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let sprite_globals = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kiln sprite globals"),
            layout: pipelines.globals_layout(BatchKind::Sprite),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: viewport.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let text_globals = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kiln text globals"),
            layout: pipelines.globals_layout(BatchKind::Text),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: viewport.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: glyph_tables.as_entire_binding(),
                },
            ],
        });

        let placeholder = device
            .create_texture_with_data(
                &queue,
                &wgpu::TextureDescriptor {
                    label: Some("kiln placeholder texture"),
                    size: wgpu::Extent3d {
                        width: 1,
                        height: 1,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                &[255, 255, 255, 255],
            )
            .create_view(&wgpu::TextureViewDescriptor::default());

        let quad_indices = create_index_buffer(&device, MIN_INDEXED_QUADS);
        let arenas = [
            VertexArena::new(&device, "kiln sprite vertices"),
            VertexArena::new(&device, "kiln glyph vertices"),
        ];
        let blit = BlitPipeline::new(&device);

        Self {
            device,
            queue,
            encoder: None,
            images: HashMap::new(),
            next_image: 0,
            placeholder,
            sampler,
            viewport,
            resolution: (1, 1),
            glyph_tables,
            sprite_globals,
            text_globals,
            arenas,
            quad_indices,
            quad_capacity: MIN_INDEXED_QUADS,
            surface: None,
            write_set: WriteSet::EMPTY,
            scissor: None,
            diffuse: Vec::new(),
            normals: Vec::new(),
            glyphs: Vec::new(),
            pipelines,
            readbacks: Readbacks::default(),
            blit,
            warned_unbound: false,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Texture behind `image`, for callers that sample compositor layers themselves.
    pub fn texture(&self, image: ImageId) -> Option<&wgpu::Texture> {
        self.images.get(&image).map(|img| &img.texture)
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn readback_count(&self) -> usize {
        self.readbacks.len()
    }

    pub fn outstanding_fences(&self) -> usize {
        self.readbacks.outstanding()
    }

    /// Records a copy of `source` onto `target`, e.g. a swapchain view.
    ///
    /// The copy is part of the next [`submit`](RenderBackend::submit).
    pub fn composite_to(
        &mut self,
        source: ImageId,
        target: &wgpu::TextureView,
        target_format: wgpu::TextureFormat,
    ) {
        let Some(img) = self.images.get(&source) else {
            log::warn!("composite: unknown source {source:?}");
            return;
        };
        if !is_filterable(img.texture.format()) {
            log::warn!("composite: {:?} cannot be sampled", img.info.format);
            return;
        }

        let encoder = self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("kiln encoder"),
                })
        });
        self.blit.record(
            &self.device,
            encoder,
            &self.sampler,
            &img.view,
            target,
            target_format,
        );
    }

    fn take_encoder(&mut self) -> wgpu::CommandEncoder {
        self.encoder.take().unwrap_or_else(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("kiln encoder"),
                })
        })
    }

    /// Submits recorded work so a following queue write is ordered after it.
    fn flush_encoder(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
            self.after_submit();
        }
    }

    fn after_submit(&mut self) {
        self.readbacks.after_submit();
        for arena in &mut self.arenas {
            arena.cursor = 0;
        }
    }

    fn ensure_quad_indices(&mut self, quads: usize) {
        if quads <= self.quad_capacity {
            return;
        }
        let capacity = quads.next_power_of_two();
        self.quad_indices = create_index_buffer(&self.device, capacity);
        self.quad_capacity = capacity;
    }

    /// View bound for a sampler slot; unusable images fall back to the placeholder.
    fn sample_view(&self, image: Option<ImageId>) -> &wgpu::TextureView {
        image
            .and_then(|id| self.images.get(&id))
            .filter(|img| is_filterable(img.texture.format()))
            .map(|img| &img.view)
            .unwrap_or(&self.placeholder)
    }

    fn target_formats(&self, kind: BatchKind, surface: &BoundSurface) -> TargetFormats {
        let mut targets: TargetFormats = [None; MAX_ATTACHMENTS];
        for (slot, target) in targets.iter_mut().enumerate() {
            if !self.write_set.contains(slot) {
                continue;
            }
            let Some(img) = surface.attachments[slot].and_then(|id| self.images.get(&id)) else {
                continue;
            };
            let format = img.texture.format();
            if writes_target(kind, format) {
                *target = Some(format);
            }
        }
        targets
    }
}

fn create_index_buffer(device: &wgpu::Device, quads: usize) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("kiln quad indices"),
        contents: bytemuck::cast_slice(&quad_indices(quads)),
        usage: wgpu::BufferUsages::INDEX,
    })
}

impl RenderBackend for WgpuBackend {
    fn create_image(&mut self, desc: &ImageDesc) -> Result<ImageId, DeviceError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(DeviceError::ZeroSizedImage {
                width: desc.width,
                height: desc.height,
            });
        }
        let limit = self.device.limits().max_texture_dimension_2d;
        if desc.width > limit || desc.height > limit {
            return Err(DeviceError::ImageTooLarge {
                width: desc.width,
                height: desc.height,
                limit,
            });
        }

        let usage = if desc.format.is_color() {
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::RENDER_ATTACHMENT
        } else {
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label.unwrap_or("kiln image")),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(desc.format),
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = ImageId::from_raw(self.next_image);
        self.next_image = self.next_image.wrapping_add(1);
        self.images.insert(
            id,
            GpuImage {
                texture,
                view,
                info: ImageInfo {
                    width: desc.width,
                    height: desc.height,
                    format: desc.format,
                },
            },
        );
        Ok(id)
    }

    fn upload_image(&mut self, image: ImageId, data: &[u8]) -> Result<(), DeviceError> {
        let info = self
            .images
            .get(&image)
            .map(|img| img.info)
            .ok_or(DeviceError::UnknownImage(image))?;

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

        // Recorded draws into this image must land before the new contents.
        self.flush_encoder();

        let Some(img) = self.images.get(&image) else {
            return Err(DeviceError::UnknownImage(image));
        };
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &img.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(info.width * bpp as u32),
                rows_per_image: Some(info.height),
            },
            wgpu::Extent3d {
                width: info.width,
                height: info.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn destroy_image(&mut self, image: ImageId) {
        // Dropping is deferred by wgpu until recorded work no longer uses it.
        self.images.remove(&image);
    }

    fn image_info(&self, image: ImageId) -> Option<ImageInfo> {
        self.images.get(&image).map(|img| img.info)
    }

    fn bind_surface(&mut self, binding: SurfaceBinding<'_>) {
        let mut attachments = [None; MAX_ATTACHMENTS];
        for (dst, src) in attachments.iter_mut().zip(binding.attachments) {
            *dst = *src;
        }
        self.surface = Some(BoundSurface {
            attachments,
            width: binding.width,
            height: binding.height,
        });
        self.warned_unbound = false;
    }

    fn unbind_surface(&mut self) {
        self.surface = None;
    }

    fn set_write_set(&mut self, write_set: WriteSet) {
        self.write_set = write_set;
    }

    fn clear(&mut self, slots: WriteSet, color: [f32; 4]) {
        let Some(surface) = self.surface.as_ref() else {
            return;
        };

        let float_clear = wgpu::Color {
            r: color[0] as f64,
            g: color[1] as f64,
            b: color[2] as f64,
            a: color[3] as f64,
        };

        let attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = (0..MAX_ATTACHMENTS)
            .map(|slot| {
                if !slots.contains(slot) {
                    return None;
                }
                let img = surface.attachments[slot].and_then(|id| self.images.get(&id))?;
                let clear = if img.info.format.is_integer() {
                    wgpu::Color::TRANSPARENT
                } else {
                    float_clear
                };
                Some(wgpu::RenderPassColorAttachment {
                    view: &img.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        if attachments.iter().all(Option::is_none) {
            return;
        }

        let encoder = self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("kiln encoder"),
                })
        });
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("kiln clear pass"),
            color_attachments: &attachments,
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    fn set_scissor(&mut self, scissor: Option<ScissorRect>) {
        self.scissor = scissor;
    }

    fn set_resolution(&mut self, width: u32, height: u32) {
        if self.resolution == (width, height) {
            return;
        }
        self.flush_encoder();
        self.resolution = (width, height);
        self.queue.write_buffer(
            &self.viewport,
            0,
            bytemuck::bytes_of(&ViewportUniform {
                viewport: [width.max(1) as f32, height.max(1) as f32],
                _pad: [0.0; 2],
            }),
        );
    }

    fn upload_vertices(&mut self, kind: BatchKind, bytes: &[u8]) {
        let index = arena_index(kind);
        let len = bytes.len() as u64;
        if len == 0 {
            self.arenas[index].last = None;
            return;
        }

        if !self.arenas[index].fits(len) {
            self.flush_encoder();
        }

        let arena = &mut self.arenas[index];
        if !arena.fits(len) {
            let size = len.next_power_of_two().max(INITIAL_ARENA_BYTES);
            log::debug!("growing {} to {size} bytes", arena.label);
            arena.buffer = create_vertex_buffer(&self.device, arena.label, size);
            arena.cursor = 0;
        }

        self.queue.write_buffer(&arena.buffer, arena.cursor, bytes);
        arena.last = Some((arena.cursor, len));
        arena.cursor += len;
    }

    fn bind_samplers(&mut self, channel: SamplerChannel, images: &[Option<ImageId>]) {
        let table = match channel {
            SamplerChannel::Diffuse => &mut self.diffuse,
            SamplerChannel::Normals => &mut self.normals,
            SamplerChannel::Glyphs => &mut self.glyphs,
        };
        table.clear();
        table.extend_from_slice(images);
    }

    fn draw(&mut self, kind: BatchKind, primitives: u32) {
        if primitives == 0 {
            return;
        }
        let Some(surface) = self.surface.as_ref() else {
            if !self.warned_unbound {
                log::warn!("{kind:?} draw with no bound surface dropped");
                self.warned_unbound = true;
            }
            return;
        };
        let Some((offset, len)) = self.arenas[arena_index(kind)].last else {
            return;
        };

        let scissor = match self.scissor {
            Some(r) => match clamp_scissor(r, surface.width, surface.height) {
                Some(r) => Some(r),
                None => {
                    log::trace!("{kind:?} draw fully scissored");
                    return;
                }
            },
            None => None,
        };

        let targets = self.target_formats(kind, surface);
        if targets.iter().all(Option::is_none) {
            return;
        }
        let attachments = surface.attachments;

        let budget = match kind {
            BatchKind::Sprite => self.diffuse.len().clamp(1, MAX_SAMPLER_SLOTS) as u8,
            BatchKind::Text => FONT_SLOTS as u8,
        };
        let key = PipelineKey {
            kind,
            budget,
            targets,
        };

        if kind == BatchKind::Sprite {
            self.ensure_quad_indices(primitives as usize);
        }
        self.pipelines.ensure(&self.device, key);

        let (Some(pipeline), Some(textures_layout)) = (
            self.pipelines.get(&key),
            self.pipelines.textures_layout(kind, budget),
        ) else {
            log::error!("no {kind:?} pipeline for {key:?}");
            return;
        };

        let views: Vec<&wgpu::TextureView> = match kind {
            BatchKind::Sprite => {
                let slot = |table: &[Option<ImageId>], i: usize| table.get(i).copied().flatten();
                (0..budget as usize)
                    .map(|i| self.sample_view(slot(&self.diffuse, i)))
                    .chain((0..budget as usize).map(|i| self.sample_view(slot(&self.normals, i))))
                    .collect()
            }
            BatchKind::Text => (0..FONT_SLOTS)
                .map(|i| self.sample_view(self.glyphs.get(i).copied().flatten()))
                .collect(),
        };
        let entries: Vec<wgpu::BindGroupEntry<'_>> = views
            .iter()
            .enumerate()
            .map(|(binding, view)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        let textures = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kiln batch textures"),
            layout: textures_layout,
            entries: &entries,
        });

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = targets
            .iter()
            .zip(attachments)
            .map(|(format, image)| {
                format.as_ref()?;
                let img = self.images.get(&image?)?;
                Some(wgpu::RenderPassColorAttachment {
                    view: &img.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let globals = match kind {
            BatchKind::Sprite => &self.sprite_globals,
            BatchKind::Text => &self.text_globals,
        };
        let vertices = self.arenas[arena_index(kind)]
            .buffer
            .slice(offset..offset + len);

        let encoder = self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("kiln encoder"),
                })
        });
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(match kind {
                BatchKind::Sprite => "kiln sprite pass",
                BatchKind::Text => "kiln text pass",
            }),
            color_attachments: &color_attachments,
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, globals, &[]);
        pass.set_bind_group(1, &textures, &[]);
        pass.set_vertex_buffer(0, vertices);
        if let Some(r) = scissor {
            pass.set_scissor_rect(r.x, r.y, r.width, r.height);
        }

        match kind {
            BatchKind::Sprite => {
                pass.set_index_buffer(self.quad_indices.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..primitives * 6, 0, 0..1);
            }
            BatchKind::Text => pass.draw(0..4, 0..primitives),
        }
    }

    fn upload_glyph_table(&mut self, font_slot: u8, table: &GlyphTable) {
        if font_slot as usize >= FONT_SLOTS {
            log::warn!("glyph table for font slot {font_slot} ignored");
            return;
        }
        self.flush_encoder();
        self.queue.write_buffer(
            &self.glyph_tables,
            font_slot as u64 * GLYPH_TABLE_BYTES,
            table.as_bytes(),
        );
    }

    fn create_readback(&mut self) -> Result<ReadbackId, DeviceError> {
        Ok(self.readbacks.create(&self.device))
    }

    fn destroy_readback(&mut self, readback: ReadbackId) {
        // A recorded copy into the buffer must be submitted before it goes away.
        self.flush_encoder();
        self.readbacks.destroy(readback);
    }

    fn copy_pixel(&mut self, source: ImageId, x: u32, y: u32, dst: ReadbackId) {
        let Some(img) = self.images.get(&source) else {
            log::debug!("copy_pixel from unknown image {source:?}");
            return;
        };
        let encoder = self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("kiln encoder"),
                })
        });
        self.readbacks.copy_pixel(encoder, &img.texture, x, y, dst);
    }

    fn insert_fence(&mut self, readback: ReadbackId) -> FenceId {
        self.readbacks.insert_fence(readback)
    }

    fn fence_status(&mut self, fence: FenceId) -> FenceStatus {
        self.readbacks.status(&self.device, fence)
    }

    fn read_pixel(&mut self, readback: ReadbackId) -> Option<u32> {
        self.readbacks.read(readback)
    }

    fn release_fence(&mut self, fence: FenceId) {
        self.readbacks.release(fence);
    }

    fn submit(&mut self) {
        let encoder = self.take_encoder();
        self.queue.submit(std::iter::once(encoder.finish()));
        self.after_submit();
    }
}
