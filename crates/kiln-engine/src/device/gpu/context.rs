use anyhow::{Context, Result};
use wgpu::SurfaceError;

use crate::batch::MAX_SAMPLER_SLOTS;

/// Sampled textures the sprite stage needs per sampler slot: diffuse + normals.
const TEXTURES_PER_SLOT: u32 = 2;

/// Initialization parameters for the GPU layer.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior).
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference for the surface.
    ///
    /// If provided but unsupported on the current surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub required_features: wgpu::Features,

    /// Baseline limits. The sampled-texture limit is raised toward what a full
    /// sampler budget needs, as far as the adapter allows.
    pub required_limits: wgpu::Limits,

    /// Hint; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,

    pub power_preference: wgpu::PowerPreference,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Window surface plus its active configuration.
struct WindowSurface<'w> {
    surface: wgpu::Surface<'w>,
    config: wgpu::SurfaceConfiguration,
}

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); terminate gracefully.
    Fatal,
}

/// Owns the wgpu core objects and, when presenting, the window surface.
///
/// The compositor never sees this type; hand [`device`](Self::device) and
/// [`queue`](Self::queue) to a [`WgpuBackend`](super::WgpuBackend) instead.
pub struct GpuContext<'w> {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: Option<WindowSurface<'w>>,
    sampler_budget: usize,
}

impl GpuContext<'static> {
    /// Context without a presentable surface, for offscreen compositing.
    pub async fn headless(init: GpuInit) -> Result<Self> {
        let instance = create_instance();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue, sampler_budget) = request_device(&adapter, &init).await?;

        Ok(GpuContext {
            instance,
            adapter,
            device,
            queue,
            surface: None,
            sampler_budget,
        })
    }

    /// Blocking variant of [`headless`](Self::headless).
    pub fn headless_blocking(init: GpuInit) -> Result<Self> {
        pollster::block_on(Self::headless(init))
    }
}

impl<'w> GpuContext<'w> {
    /// Creates a context presenting to `target`, sized in physical pixels.
    pub async fn with_surface(
        target: impl Into<wgpu::SurfaceTarget<'w>>,
        size: (u32, u32),
        init: GpuInit,
    ) -> Result<Self> {
        anyhow::ensure!(size.0 > 0 && size.1 > 0, "window has zero size");

        let instance = create_instance();

        // Surface lifetime is tied to the window via `'w`.
        let surface = instance
            .create_surface(target)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue, sampler_budget) = request_device(&adapter, &init).await?;

        let caps = surface.get_capabilities(&adapter);
        let format =
            choose_surface_format(&caps, init.prefer_srgb).context("no supported surface formats")?;

        let alpha_mode = init
            .alpha_mode
            .filter(|m| caps.alpha_modes.contains(m))
            .unwrap_or_else(|| {
                caps.alpha_modes
                    .first()
                    .copied()
                    .unwrap_or(wgpu::CompositeAlphaMode::Auto)
            });

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.0,
            height: size.1,
            present_mode: init.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        log::info!(
            "gpu: {} ({:?}), surface {format:?} {}x{}",
            adapter.get_info().name,
            adapter.get_info().backend,
            size.0,
            size.1
        );

        Ok(GpuContext {
            instance,
            adapter,
            device,
            queue,
            surface: Some(WindowSurface { surface, config }),
            sampler_budget,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Largest sampler budget the device can bind in one sprite draw.
    pub fn max_sampler_budget(&self) -> usize {
        self.sampler_budget
    }

    /// Active surface format, `None` for a headless context.
    pub fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.surface.as_ref().map(|s| s.config.format)
    }

    /// Reconfigures the surface after a resize.
    ///
    /// wgpu rejects a 0x0 configuration; such sizes are ignored until the
    /// window is visible again.
    pub fn resize(&mut self, width: u32, height: u32) {
        let Some(ws) = self.surface.as_mut() else {
            return;
        };
        if width == 0 || height == 0 {
            return;
        }
        ws.config.width = width;
        ws.config.height = height;
        ws.surface.configure(&self.device, &ws.config);
    }

    /// Acquires the next presentable texture.
    ///
    /// Presentation happens when the returned texture is `present`ed after the
    /// frame's work has been submitted.
    pub fn acquire(&self) -> std::result::Result<wgpu::SurfaceTexture, SurfaceError> {
        match self.surface.as_ref() {
            Some(ws) => ws.surface.get_current_texture(),
            None => Err(SurfaceError::Other),
        }
    }

    /// Converts a `SurfaceError` into a higher-level action.
    pub fn handle_surface_error(&mut self, err: SurfaceError) -> SurfaceErrorAction {
        match err {
            SurfaceError::Lost | SurfaceError::Outdated => {
                if let Some(ws) = self.surface.as_ref() {
                    ws.surface.configure(&self.device, &ws.config);
                }
                SurfaceErrorAction::Reconfigured
            }
            SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
            SurfaceError::Timeout => SurfaceErrorAction::SkipFrame,
            SurfaceError::Other => SurfaceErrorAction::SkipFrame,
        }
    }
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

async fn request_device(
    adapter: &wgpu::Adapter,
    init: &GpuInit,
) -> Result<(wgpu::Device, wgpu::Queue, usize)> {
    let mut limits = init.required_limits.clone();
    let wanted = TEXTURES_PER_SLOT * MAX_SAMPLER_SLOTS as u32;
    let supported = adapter.limits().max_sampled_textures_per_shader_stage;
    limits.max_sampled_textures_per_shader_stage = limits
        .max_sampled_textures_per_shader_stage
        .max(wanted.min(supported));

    let sampler_budget = sampler_budget_for(limits.max_sampled_textures_per_shader_stage);
    if sampler_budget < MAX_SAMPLER_SLOTS {
        log::warn!(
            "adapter binds {} sampled textures per stage; sampler budget limited to {sampler_budget}",
            limits.max_sampled_textures_per_shader_stage
        );
    }

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("kiln device"),
            required_features: init.required_features,
            required_limits: limits,
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        })
        .await
        .context("failed to create wgpu device/queue")?;

    Ok((device, queue, sampler_budget))
}

fn sampler_budget_for(max_sampled_textures: u32) -> usize {
    ((max_sampled_textures / TEXTURES_PER_SLOT) as usize).clamp(1, MAX_SAMPLER_SLOTS)
}

fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if caps.formats.is_empty() {
        return None;
    }

    if prefer_srgb {
        let preferred = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ];
        for f in preferred {
            if caps.formats.contains(&f) {
                return Some(f);
            }
        }
    }

    Some(caps.formats[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(formats: Vec<wgpu::TextureFormat>) -> wgpu::SurfaceCapabilities {
        wgpu::SurfaceCapabilities {
            formats,
            ..Default::default()
        }
    }

    #[test]
    fn srgb_preferred_when_available() {
        let c = caps(vec![
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ]);
        assert_eq!(
            choose_surface_format(&c, true),
            Some(wgpu::TextureFormat::Rgba8UnormSrgb)
        );
        assert_eq!(
            choose_surface_format(&c, false),
            Some(wgpu::TextureFormat::Bgra8Unorm)
        );
    }

    #[test]
    fn no_formats_no_choice() {
        assert_eq!(choose_surface_format(&caps(vec![]), true), None);
    }

    #[test]
    fn budget_follows_texture_limit() {
        assert_eq!(sampler_budget_for(16), 8);
        assert_eq!(sampler_budget_for(31), 15);
        assert_eq!(sampler_budget_for(128), MAX_SAMPLER_SLOTS);
        assert_eq!(sampler_budget_for(0), 1);
    }
}
