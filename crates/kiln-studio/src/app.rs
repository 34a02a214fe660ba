use anyhow::{Context, Result};
use ouroboros::self_referencing;

use kiln_engine::coords::Vec2;
use kiln_engine::device::{GpuContext, GpuInit, RenderBackend, SurfaceErrorAction, WgpuBackend};
use kiln_engine::surface::SurfaceRole;
use kiln_engine::{CompositorConfig, FrameCompositor};

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::scene::Scene;

#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub gpu: GpuInit,
    pub compositor: CompositorConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            title: "kiln studio".to_string(),
            initial_size: LogicalSize::new(960.0, 640.0),
            gpu: GpuInit::default(),
            compositor: CompositorConfig::default(),
        }
    }
}

pub fn run(config: StudioConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut studio = Studio::new(config);

    event_loop
        .run_app(&mut studio)
        .context("winit event loop terminated with error")?;

    Ok(())
}

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: GpuContext<'this>,
}

struct Studio {
    config: StudioConfig,
    entry: Option<WindowEntry>,
    compositor: Option<FrameCompositor<WgpuBackend>>,
    scene: Option<Scene>,
    cursor: Vec2,
    shown_pick: Option<u32>,
    exit_requested: bool,
}

impl Studio {
    fn new(config: StudioConfig) -> Self {
        Self {
            config,
            entry: None,
            compositor: None,
            scene: None,
            cursor: Vec2::zero(),
            shown_pick: None,
            exit_requested: false,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);
        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));
        let gpu_init = self.config.gpu.clone();

        let entry = WindowEntryTryBuilder {
            window,
            gpu_builder: |w| {
                pollster::block_on(GpuContext::with_surface(w, (width, height), gpu_init))
            },
        }
        .try_build()?;

        let (backend, budget) = {
            let gpu = entry.borrow_gpu();
            (
                WgpuBackend::new(gpu.device().clone(), gpu.queue().clone()),
                gpu.max_sampler_budget(),
            )
        };

        let mut config = self.config.compositor.clone();
        config.sampler_budget = config.sampler_budget.min(budget);

        let mut compositor = FrameCompositor::new(backend, width, height, config)
            .context("failed to create compositor")?;
        let scene = Scene::new(&mut compositor)?;

        self.entry = Some(entry);
        self.compositor = Some(compositor);
        self.scene = Some(scene);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(entry) = self.entry.as_mut() {
            entry.with_gpu_mut(|gpu| gpu.resize(width, height));
        }
        if let Some(compositor) = self.compositor.as_mut() {
            if let Err(e) = compositor.resize(width, height) {
                log::error!("compositor resize failed: {e}");
            }
        }
    }

    /// Renders one frame. Returns `false` when the surface is lost for good.
    fn render(&mut self) -> Result<bool> {
        let (Some(entry), Some(compositor), Some(scene)) = (
            self.entry.as_mut(),
            self.compositor.as_mut(),
            self.scene.as_ref(),
        ) else {
            return Ok(true);
        };
        let cursor = self.cursor;
        let shown_pick = &mut self.shown_pick;

        entry.with_mut(|fields| -> Result<bool> {
            let frame = match fields.gpu.acquire() {
                Ok(frame) => frame,
                Err(err) => {
                    log::debug!("surface error: {err:?}");
                    let action = fields.gpu.handle_surface_error(err);
                    return Ok(action != SurfaceErrorAction::Fatal);
                }
            };

            let (width, height) = (compositor.surface().width(), compositor.surface().height());
            compositor.begin(cursor)?;
            let drawn = scene.draw(compositor, width, height);
            compositor.end()?;
            drawn?;

            let view = frame
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            if let Some(diffuse) = compositor.surface().image(SurfaceRole::Diffuse) {
                let format = frame.texture.format();
                compositor.backend_mut().composite_to(diffuse, &view, format);
            }
            compositor.backend_mut().submit();

            fields.window.pre_present_notify();
            frame.present();

            let pick = compositor.current_pick_id();
            if *shown_pick != Some(pick) {
                *shown_pick = Some(pick);
                fields.window.set_title(&format!("kiln studio · tile {pick}"));
            }
            Ok(true)
        })
    }
}

impl ApplicationHandler for Studio {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            log::error!("failed to start studio: {e:#}");
            self.exit_requested = true;
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(entry) = self.entry.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.exit_requested = true;
                event_loop.exit();
            }

            WindowEvent::Resized(size) => self.resize(size.width, size.height),

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.entry.as_ref().map(|e| e.with_window(|w| w.inner_size())) {
                    self.resize(size.width, size.height);
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
            }

            WindowEvent::RedrawRequested => match self.render() {
                Ok(true) => {}
                Ok(false) => {
                    log::error!("surface lost; exiting");
                    self.exit_requested = true;
                    event_loop.exit();
                }
                Err(e) => log::error!("frame failed: {e:#}"),
            },

            _ => {}
        }
    }
}

impl Drop for Studio {
    fn drop(&mut self) {
        // Release compositor resources while the device is still alive.
        if let Some(compositor) = self.compositor.take() {
            drop(compositor.destroy());
        }
    }
}
