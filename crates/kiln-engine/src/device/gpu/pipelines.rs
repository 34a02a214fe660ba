use std::collections::HashMap;
use std::mem::size_of;

use crate::batch::{BatchKind, GlyphVertex, SpriteVertex, FONT_SLOTS};
use crate::surface::MAX_ATTACHMENTS;

use super::shaders;

/// Colour target formats of a pass, `None` where the slot is not written.
pub(super) type TargetFormats = [Option<wgpu::TextureFormat>; MAX_ATTACHMENTS];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    pub kind: BatchKind,
    /// Sampler slots per channel; always `FONT_SLOTS` for text.
    pub budget: u8,
    pub targets: TargetFormats,
}

const SPRITE_ATTRS: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Uint32, 3 => Uint32];

const GLYPH_ATTRS: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Uint32, 2 => Uint32];

fn sprite_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: size_of::<SpriteVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &SPRITE_ATTRS,
    }
}

fn glyph_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: size_of::<GlyphVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &GLYPH_ATTRS,
    }
}

/// Premultiplied alpha: `src + dst * (1 - src.a)`.
fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn is_integer_format(format: wgpu::TextureFormat) -> bool {
    matches!(
        format.sample_type(None, None),
        Some(wgpu::TextureSampleType::Uint | wgpu::TextureSampleType::Sint)
    )
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Bind group layouts, shader modules and render pipelines, created on demand.
///
/// Pipelines are keyed by batch kind, sampler budget and the exact target
/// formats of the pass, so a change of write set or attachment formats picks
/// (or builds) a matching pipeline instead of invalidating anything.
pub(super) struct PipelineCache {
    sprite_globals: wgpu::BindGroupLayout,
    text_globals: wgpu::BindGroupLayout,
    text_pages: wgpu::BindGroupLayout,
    text_shader: wgpu::ShaderModule,
    sprite_textures: HashMap<u8, wgpu::BindGroupLayout>,
    sprite_shaders: HashMap<u8, wgpu::ShaderModule>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub fn new(device: &wgpu::Device) -> Self {
        let sprite_globals = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln sprite globals layout"),
            entries: &[uniform_entry(0), sampler_entry(1)],
        });

        let text_globals = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln text globals layout"),
            entries: &[uniform_entry(0), sampler_entry(1), uniform_entry(2)],
        });

        let page_entries: Vec<_> = (0..FONT_SLOTS as u32).map(texture_entry).collect();
        let text_pages = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln text pages layout"),
            entries: &page_entries,
        });

        let text_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("kiln text shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::TEXT_SOURCE.into()),
        });

        Self {
            sprite_globals,
            text_globals,
            text_pages,
            text_shader,
            sprite_textures: HashMap::new(),
            sprite_shaders: HashMap::new(),
            pipelines: HashMap::new(),
        }
    }

    pub fn globals_layout(&self, kind: BatchKind) -> &wgpu::BindGroupLayout {
        match kind {
            BatchKind::Sprite => &self.sprite_globals,
            BatchKind::Text => &self.text_globals,
        }
    }

    /// Texture layout for `kind`. Sprite layouts exist once `ensure` ran for the budget.
    pub fn textures_layout(&self, kind: BatchKind, budget: u8) -> Option<&wgpu::BindGroupLayout> {
        match kind {
            BatchKind::Sprite => self.sprite_textures.get(&budget),
            BatchKind::Text => Some(&self.text_pages),
        }
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Creates whatever `key` needs that does not exist yet.
    pub fn ensure(&mut self, device: &wgpu::Device, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }

        if key.kind == BatchKind::Sprite {
            self.ensure_sprite_resources(device, key.budget);
        }

        let (shader, globals, textures, vertex_layout) = match key.kind {
            BatchKind::Sprite => {
                let (Some(shader), Some(textures)) = (
                    self.sprite_shaders.get(&key.budget),
                    self.sprite_textures.get(&key.budget),
                ) else {
                    return;
                };
                (shader, &self.sprite_globals, textures, sprite_vertex_layout())
            }
            BatchKind::Text => (
                &self.text_shader,
                &self.text_globals,
                &self.text_pages,
                glyph_vertex_layout(),
            ),
        };

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kiln batch pipeline layout"),
            bind_group_layouts: &[globals, textures],
            immediate_size: 0,
        });

        let targets: Vec<Option<wgpu::ColorTargetState>> = key
            .targets
            .iter()
            .map(|format| {
                format.map(|format| wgpu::ColorTargetState {
                    format,
                    blend: (!is_integer_format(format)).then(premul_alpha_blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let topology = match key.kind {
            BatchKind::Sprite => wgpu::PrimitiveTopology::TriangleList,
            BatchKind::Text => wgpu::PrimitiveTopology::TriangleStrip,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(match key.kind {
                BatchKind::Sprite => "kiln sprite pipeline",
                BatchKind::Text => "kiln text pipeline",
            }),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[vertex_layout],
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &targets,
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!(
            "built {:?} pipeline (budget {}, targets {:?}); {} cached",
            key.kind,
            key.budget,
            key.targets,
            self.pipelines.len() + 1
        );
        self.pipelines.insert(key, pipeline);
    }

    fn ensure_sprite_resources(&mut self, device: &wgpu::Device, budget: u8) {
        let channels = budget as u32 * 2;
        self.sprite_textures.entry(budget).or_insert_with(|| {
            let entries: Vec<_> = (0..channels).map(texture_entry).collect();
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("kiln sprite textures layout"),
                entries: &entries,
            })
        });
        self.sprite_shaders.entry(budget).or_insert_with(|| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("kiln sprite shader"),
                source: wgpu::ShaderSource::Wgsl(shaders::sprite_source(budget as usize).into()),
            })
        });
    }
}

/// Whether a texture of `format` can sit in a filterable float binding.
pub(super) fn is_filterable(format: wgpu::TextureFormat) -> bool {
    matches!(
        format.sample_type(None, None),
        Some(wgpu::TextureSampleType::Float { filterable: true })
    )
}

/// Whether a target of `format` may be written by `kind`. Text has no id output.
pub(super) fn writes_target(kind: BatchKind, format: wgpu::TextureFormat) -> bool {
    match kind {
        BatchKind::Sprite => true,
        BatchKind::Text => !is_integer_format(format),
    }
}
