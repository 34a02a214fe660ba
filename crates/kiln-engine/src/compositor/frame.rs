use crate::batch::{
    Batch, BatchKind, FlushCause, SpriteBatch, SpriteDraw, SpriteFlags, TextBatch, FONT_SLOTS,
};
use crate::coords::{Rect, Vec2};
use crate::device::{ImageId, RenderBackend};
use crate::paint::Tint;
use crate::pick::PixelPickPipeline;
use crate::surface::{Attachment, BindTracker, RenderSurface, SurfaceRole};
use crate::text::{layout_line, Alignment, GlyphMetrics, GlyphPosition, GlyphTable, LineLayout, SizeMode};

use super::{CompositorConfig, CompositorError, FrameStats, RecordState, ScissorStack, StatsWindow};

/// How a sprite interacts with the pick id layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PickMode {
    /// Write this id under the sprite's covered pixels.
    Id(u16),
    /// Render normally but leave the id layer untouched.
    Skip,
}

/// Shared parameters of one text run.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TextStyle {
    pub font_slot: u8,
    pub size: f32,
    pub tint: Tint,
    pub glow: f32,
    pub align: Alignment,
    pub mode: SizeMode,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_slot: 0,
            size: 16.0,
            tint: Tint::WHITE,
            glow: 0.0,
            align: Alignment::Left,
            mode: SizeMode::Fixed,
        }
    }
}

/// Batching compositor over one [`RenderSurface`].
///
/// Draws are recorded between [`begin`](Self::begin) and [`end`](Self::end).
/// Within a frame they reach the GPU in submission order: a kind switch always
/// flushes the outgoing batch before the incoming one receives anything.
pub struct FrameCompositor<B: RenderBackend> {
    backend: B,
    config: CompositorConfig,

    surface: RenderSurface,
    binds: BindTracker,

    sprites: SpriteBatch,
    text: TextBatch,
    pick: PixelPickPipeline,
    scissors: ScissorStack,

    state: RecordState,
    frame: FrameStats,
    last_frame: FrameStats,
    window: StatsWindow,
    frames: u64,
}

impl<B: RenderBackend> FrameCompositor<B> {
    /// Creates the surface at `width`×`height` with an owned image per role.
    pub fn new(
        mut backend: B,
        width: u32,
        height: u32,
        config: CompositorConfig,
    ) -> Result<Self, CompositorError> {
        config.validate()?;

        let surface = RenderSurface::new(&mut backend, width, height, config.clear_color.to_array())?;
        let pick = PixelPickPipeline::new(&mut backend)?;

        log::debug!(
            "compositor {}x{}: sprite capacity {}, text capacity {}, {} sampler slots",
            width,
            height,
            config.sprite_capacity,
            config.text_capacity,
            config.sampler_budget
        );

        Ok(Self {
            sprites: SpriteBatch::new(config.sprite_capacity, config.sampler_budget),
            text: TextBatch::new(config.text_capacity),
            window: StatsWindow::new(config.stats_window),
            backend,
            config,
            surface,
            binds: BindTracker::new(),
            pick,
            scissors: ScissorStack::new(),
            state: RecordState::NotRecording,
            frame: FrameStats::default(),
            last_frame: FrameStats::default(),
            frames: 0,
        })
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Direct backend access, e.g. to create or upload images.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    pub fn active_batch(&self) -> Option<BatchKind> {
        self.state.active()
    }

    /// Primitives waiting in the batch of `kind`.
    pub fn pending(&self, kind: BatchKind) -> usize {
        match kind {
            BatchKind::Sprite => Batch::<B>::pending(&self.sprites),
            BatchKind::Text => Batch::<B>::pending(&self.text),
        }
    }

    /// Completed frames.
    pub fn frame_index(&self) -> u64 {
        self.frames
    }

    /// Id under the cursor, one or two frames behind.
    pub fn current_pick_id(&self) -> u32 {
        self.pick.value()
    }

    pub fn pick(&self) -> &PixelPickPipeline {
        &self.pick
    }

    /// Draw calls of the last completed frame.
    pub fn draw_call_count(&self) -> u32 {
        self.last_frame.draw_calls
    }

    /// Flushes of the last completed frame.
    pub fn flush_count(&self) -> u32 {
        self.last_frame.flush_count()
    }

    pub fn last_frame_stats(&self) -> FrameStats {
        self.last_frame
    }

    /// Counters of the frame being recorded so far.
    pub fn frame_stats(&self) -> FrameStats {
        let mut s = self.frame;
        s.absorb(&self.sprites.stats());
        s.absorb(&self.text.stats());
        s
    }

    /// Field-wise maxima over the last `stats_window` frames.
    pub fn peak_stats(&self) -> FrameStats {
        self.window.peak()
    }

    // ── frame cycle ───────────────────────────────────────────────────────

    /// Starts a frame. `cursor` is in surface pixels and is clamped to the surface.
    pub fn begin(&mut self, cursor: Vec2) -> Result<(), CompositorError> {
        if self.state.is_recording() {
            return Err(CompositorError::AlreadyRecording);
        }

        self.frame = FrameStats::default();
        self.bind_surface();
        let all = self.surface.default_write_set();
        self.surface.set_write_set(&mut self.backend, all)?;

        // The copy must be recorded before the clear wipes the id layer.
        if let Some(id_layer) = self.surface.image(SurfaceRole::PixelId) {
            let (x, y) = self.clamp_cursor(cursor);
            self.pick.poll(&mut self.backend, id_layer, x, y);
        }

        self.surface.clear(&mut self.backend);
        self.scissors.clear();
        self.backend.set_scissor(None);

        self.state = RecordState::Recording {
            active: None,
            paused: false,
        };
        Ok(())
    }

    /// Flushes the active batch, submits the frame and records its statistics.
    pub fn end(&mut self) -> Result<FrameStats, CompositorError> {
        let RecordState::Recording { active, paused } = self.state else {
            return Err(CompositorError::NotRecording("end"));
        };

        if let (Some(kind), false) = (active, paused) {
            self.flush(kind, FlushCause::EndOfFrame);
        }

        let mut stats = self.frame;
        stats.absorb(&Batch::<B>::take_stats(&mut self.sprites));
        stats.absorb(&Batch::<B>::take_stats(&mut self.text));

        self.backend.submit();

        self.last_frame = stats;
        self.window.push(stats);
        self.frame = FrameStats::default();
        self.frames += 1;
        self.state = RecordState::NotRecording;

        log::trace!(
            "frame {} done: {} draw calls, {} flushes",
            self.frames,
            stats.draw_calls,
            stats.flush_count()
        );
        Ok(stats)
    }

    // ── drawing ───────────────────────────────────────────────────────────

    /// Draws `image` stretched over `rect`.
    pub fn draw_sprite(
        &mut self,
        image: ImageId,
        rect: Rect,
        tint: Tint,
        pick: PickMode,
        glow: f32,
    ) -> Result<(), CompositorError> {
        let draw = SpriteDraw::new(image, rect).with_tint(tint).with_glow(glow);
        self.draw_with(draw, pick)
    }

    /// Draws `image` letterboxed into `rect` at the image's aspect ratio.
    ///
    /// An image the backend does not know is stretched over `rect` instead.
    pub fn draw_sprite_fit(
        &mut self,
        image: ImageId,
        rect: Rect,
        tint: Tint,
        pick: PickMode,
        glow: f32,
    ) -> Result<(), CompositorError> {
        let mut draw = SpriteDraw::new(image, rect).with_tint(tint).with_glow(glow);
        if let Some(info) = self.backend.image_info(image) {
            draw = draw.fit_within((info.width, info.height));
        }
        self.draw_with(draw, pick)
    }

    /// Draws `image` at its own size times `scale`, centred on `center`.
    /// Unknown images have no size and draw nothing.
    pub fn draw_sprite_at(
        &mut self,
        image: ImageId,
        center: Vec2,
        scale: f32,
        tint: Tint,
        pick: PickMode,
        glow: f32,
    ) -> Result<(), CompositorError> {
        let size = self
            .backend
            .image_info(image)
            .map_or((0, 0), |info| (info.width, info.height));
        let draw = SpriteDraw::centered(image, center, scale, size)
            .with_tint(tint)
            .with_glow(glow);
        self.draw_with(draw, pick)
    }

    /// Draws a solid quad.
    pub fn fill_rect(&mut self, rect: Rect, tint: Tint, pick: PickMode) -> Result<(), CompositorError> {
        self.draw_with(SpriteDraw::solid(rect, tint), pick)
    }

    /// Draws a fully specified sprite, writing `draw.pick_id` to the id layer.
    pub fn draw_sprite_with(&mut self, draw: &SpriteDraw) -> Result<(), CompositorError> {
        self.draw_with(*draw, PickMode::Id(draw.pick_id))
    }

    /// Draws a sprite that never becomes pickable.
    ///
    /// The sprite gets a draw call of its own with the id layer removed from
    /// the write set, so the surrounding batches keep writing ids.
    pub fn draw_sprite_unpickable(&mut self, draw: &SpriteDraw) -> Result<(), CompositorError> {
        self.draw_with(*draw, PickMode::Skip)
    }

    fn draw_with(&mut self, mut draw: SpriteDraw, pick: PickMode) -> Result<(), CompositorError> {
        self.ensure_drawable("draw_sprite")?;
        if !draw.rect.is_valid() {
            log::trace!("culled empty sprite {:?}", draw.rect);
            return Ok(());
        }
        self.switch_to(BatchKind::Sprite)?;

        if self.config.pixel_art_antialiasing {
            draw.flags = draw.flags | SpriteFlags::PIXEL_AA;
        }

        match pick {
            PickMode::Id(id) => {
                draw.pick_id = id;
                self.sprites.push(&mut self.backend, &draw);
            }
            PickMode::Skip => {
                draw.pick_id = 0;
                // TODO: batch consecutive unpickable sprites into one narrowed draw
                // instead of flushing around each of them.
                self.flush(BatchKind::Sprite, FlushCause::SkipId);
                let restore = self.surface.write_set();
                let narrowed = restore.without(SurfaceRole::PixelId.slot());
                self.surface.set_write_set(&mut self.backend, narrowed)?;
                self.sprites.push(&mut self.backend, &draw);
                self.flush(BatchKind::Sprite, FlushCause::SkipId);
                self.surface.set_write_set(&mut self.backend, restore)?;
            }
        }
        self.frame.sprites += 1;
        Ok(())
    }

    /// Queues positioned glyphs. Glyphs never write to the id layer.
    pub fn draw_text(
        &mut self,
        glyphs: &[GlyphPosition],
        font_slot: u8,
        size: f32,
        tint: Tint,
        glow: f32,
    ) -> Result<(), CompositorError> {
        self.ensure_drawable("draw_text")?;
        if font_slot as usize >= FONT_SLOTS {
            return Err(CompositorError::FontSlot(font_slot));
        }
        self.switch_to(BatchKind::Text)?;
        self.text
            .push_run(&mut self.backend, glyphs, font_slot, size, tint, glow);
        self.frame.glyphs += glyphs.len() as u32;
        Ok(())
    }

    /// Lays out `text` on one line starting at `origin` and queues it.
    pub fn draw_string<M: GlyphMetrics + ?Sized>(
        &mut self,
        metrics: &M,
        text: &str,
        origin: Vec2,
        max_width: Option<f32>,
        style: &TextStyle,
    ) -> Result<LineLayout, CompositorError> {
        let line = layout_line(metrics, text, origin, max_width, style.size, style.align, style.mode);
        self.draw_text(&line.glyphs, style.font_slot, line.size, style.tint, style.glow)?;
        Ok(line)
    }

    // ── scissor ───────────────────────────────────────────────────────────

    /// Clips subsequent draws to `rect` intersected with the current clip.
    /// Returns whether anything remains visible.
    pub fn push_scissor(&mut self, rect: Rect) -> Result<bool, CompositorError> {
        self.ensure_recording("push_scissor")?;
        self.flush_active(FlushCause::Scissor);
        let visible = self.scissors.push(rect);
        self.apply_scissor();
        Ok(visible)
    }

    pub fn pop_scissor(&mut self) -> Result<(), CompositorError> {
        self.ensure_recording("pop_scissor")?;
        if self.scissors.depth() == 0 {
            return Err(CompositorError::ScissorUnderflow);
        }
        self.flush_active(FlushCause::Scissor);
        self.scissors.pop();
        self.apply_scissor();
        Ok(())
    }

    // ── pause / resume ────────────────────────────────────────────────────

    /// Flushes and releases the surface so another renderer can use the device
    /// mid-frame.
    pub fn pause(&mut self) -> Result<(), CompositorError> {
        self.ensure_drawable("pause")?;
        self.flush_active(FlushCause::Pause);
        self.backend.unbind_surface();
        self.binds.invalidate();
        self.state = RecordState::Recording {
            active: None,
            paused: true,
        };
        Ok(())
    }

    /// Rebinds the surface with the default write set and the current scissor.
    pub fn resume(&mut self) -> Result<(), CompositorError> {
        self.ensure_recording("resume")?;
        if !self.state.is_paused() {
            return Err(CompositorError::NotPaused);
        }
        self.bind_surface();
        let all = self.surface.default_write_set();
        self.surface.set_write_set(&mut self.backend, all)?;
        self.apply_scissor();
        self.state = RecordState::Recording {
            active: None,
            paused: false,
        };
        Ok(())
    }

    // ── resources ─────────────────────────────────────────────────────────

    /// Recreates the surface and the readback buffers at the new size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), CompositorError> {
        if self.state.is_recording() {
            return Err(CompositorError::WhileRecording("resize"));
        }
        self.surface.resize(&mut self.backend, width, height)?;
        self.pick.reallocate(&mut self.backend)?;
        Ok(())
    }

    /// Replaces the image in `slot`. The slot must be detached first.
    pub fn attach_image(
        &mut self,
        image: ImageId,
        slot: usize,
        owned: bool,
    ) -> Result<(), CompositorError> {
        if self.state.is_recording() {
            return Err(CompositorError::WhileRecording("attach_image"));
        }
        self.surface.attach(&self.backend, image, slot, owned)?;
        Ok(())
    }

    pub fn detach_image(&mut self, slot: usize) -> Result<Attachment, CompositorError> {
        if self.state.is_recording() {
            return Err(CompositorError::WhileRecording("detach_image"));
        }
        Ok(self.surface.detach(slot)?)
    }

    /// Sets the glyph page sampled for `font_slot`.
    pub fn set_font_page(
        &mut self,
        font_slot: u8,
        image: Option<ImageId>,
    ) -> Result<(), CompositorError> {
        if !self.text.set_page(&mut self.backend, font_slot, image) {
            return Err(CompositorError::FontSlot(font_slot));
        }
        Ok(())
    }

    /// Uploads the glyph table used to expand glyphs of `font_slot`.
    pub fn upload_glyph_table(
        &mut self,
        font_slot: u8,
        table: &GlyphTable,
    ) -> Result<(), CompositorError> {
        if font_slot as usize >= FONT_SLOTS {
            return Err(CompositorError::FontSlot(font_slot));
        }
        // Pending glyphs expand with the table they were queued against.
        self.flush(BatchKind::Text, FlushCause::FontPage);
        self.backend.upload_glyph_table(font_slot, table);
        Ok(())
    }

    /// Releases surface attachments and readback buffers and hands back the backend.
    pub fn destroy(mut self) -> B {
        if self.state.is_recording() {
            log::warn!("compositor destroyed mid-frame; pending draws are dropped");
        }
        self.surface.destroy(&mut self.backend);
        self.pick.destroy(&mut self.backend);
        self.backend
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn ensure_recording(&self, op: &'static str) -> Result<(), CompositorError> {
        if !self.state.is_recording() {
            return Err(CompositorError::NotRecording(op));
        }
        Ok(())
    }

    fn ensure_drawable(&self, op: &'static str) -> Result<(), CompositorError> {
        self.ensure_recording(op)?;
        if self.state.is_paused() {
            return Err(CompositorError::Paused(op));
        }
        Ok(())
    }

    fn bind_surface(&mut self) {
        if self.surface.bind(&mut self.backend, &mut self.binds) {
            self.frame.surface_binds += 1;
        }
    }

    /// Makes `kind` the active batch, flushing the other one first.
    fn switch_to(&mut self, kind: BatchKind) -> Result<(), CompositorError> {
        let RecordState::Recording { active, paused } = self.state else {
            return Err(CompositorError::NotRecording("draw"));
        };
        if active == Some(kind) {
            return Ok(());
        }

        if let Some(prev) = active {
            self.flush(prev, FlushCause::KindSwitch);
            self.frame.kind_switches += 1;
            log::trace!("batch switch {prev:?} -> {kind:?}");
        }

        let all = self.surface.default_write_set();
        let write_set = match kind {
            BatchKind::Sprite => all,
            BatchKind::Text => all.without(SurfaceRole::PixelId.slot()),
        };
        self.surface.set_write_set(&mut self.backend, write_set)?;

        self.state = RecordState::Recording {
            active: Some(kind),
            paused,
        };
        Ok(())
    }

    fn flush(&mut self, kind: BatchKind, cause: FlushCause) -> bool {
        match kind {
            BatchKind::Sprite => self.sprites.flush(&mut self.backend, cause),
            BatchKind::Text => self.text.flush(&mut self.backend, cause),
        }
    }

    fn flush_active(&mut self, cause: FlushCause) {
        if let RecordState::Recording {
            active: Some(kind),
            paused: false,
        } = self.state
        {
            self.flush(kind, cause);
        }
    }

    fn apply_scissor(&mut self) {
        if self.state.is_paused() {
            return;
        }
        let rect = self
            .scissors
            .to_pixels(self.surface.width(), self.surface.height());
        self.backend.set_scissor(rect);
    }

    fn clamp_cursor(&self, cursor: Vec2) -> (u32, u32) {
        let max_x = self.surface.width().saturating_sub(1) as f32;
        let max_y = self.surface.height().saturating_sub(1) as f32;
        // NaN clamps to NaN, which the cast maps to 0.
        (
            cursor.x.clamp(0.0, max_x) as u32,
            cursor.y.clamp(0.0, max_y) as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Command, HeadlessBackend, ImageDesc, PixelFormat};

    fn compositor(config: CompositorConfig) -> FrameCompositor<HeadlessBackend> {
        FrameCompositor::new(HeadlessBackend::new(), 800, 600, config).unwrap()
    }

    fn image(c: &mut FrameCompositor<HeadlessBackend>) -> ImageId {
        c.backend_mut()
            .create_image(&ImageDesc::new(16, 16, PixelFormat::Rgba8Unorm))
            .unwrap()
    }

    fn rect() -> Rect {
        Rect::from_xywh(0.0, 0.0, 10.0, 10.0)
    }

    fn glyphs() -> Vec<GlyphPosition> {
        vec![GlyphPosition { code: b'x', position: Vec2::new(1.0, 1.0) }]
    }

    // ── illegal state ─────────────────────────────────────────────────────

    #[test]
    fn begin_twice_fails() {
        let mut c = compositor(CompositorConfig::default());
        c.begin(Vec2::zero()).unwrap();
        assert!(matches!(c.begin(Vec2::zero()), Err(CompositorError::AlreadyRecording)));
    }

    #[test]
    fn draw_outside_frame_fails() {
        let mut c = compositor(CompositorConfig::default());
        assert!(matches!(
            c.fill_rect(rect(), Tint::WHITE, PickMode::Id(1)),
            Err(CompositorError::NotRecording(_))
        ));
        assert!(matches!(c.end(), Err(CompositorError::NotRecording("end"))));
    }

    #[test]
    fn draw_while_paused_fails() {
        let mut c = compositor(CompositorConfig::default());
        c.begin(Vec2::zero()).unwrap();
        c.pause().unwrap();
        assert!(matches!(
            c.draw_text(&glyphs(), 0, 12.0, Tint::WHITE, 0.0),
            Err(CompositorError::Paused("draw_text"))
        ));
        c.resume().unwrap();
        assert!(c.draw_text(&glyphs(), 0, 12.0, Tint::WHITE, 0.0).is_ok());
    }

    #[test]
    fn resize_while_recording_fails() {
        let mut c = compositor(CompositorConfig::default());
        c.begin(Vec2::zero()).unwrap();
        assert!(matches!(c.resize(10, 10), Err(CompositorError::WhileRecording("resize"))));
        c.end().unwrap();
        c.resize(10, 10).unwrap();
        assert_eq!((c.surface().width(), c.surface().height()), (10, 10));
    }

    #[test]
    fn invalid_font_slot_fails() {
        let mut c = compositor(CompositorConfig::default());
        c.begin(Vec2::zero()).unwrap();
        assert!(matches!(
            c.draw_text(&glyphs(), 4, 12.0, Tint::WHITE, 0.0),
            Err(CompositorError::FontSlot(4))
        ));
        assert!(matches!(c.set_font_page(9, None), Err(CompositorError::FontSlot(9))));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = CompositorConfig { sampler_budget: 0, ..Default::default() };
        assert!(matches!(
            FrameCompositor::new(HeadlessBackend::new(), 8, 8, cfg),
            Err(CompositorError::Config(_))
        ));
    }

    // ── kind switches ─────────────────────────────────────────────────────

    #[test]
    fn sprite_sprite_text_sprite_flushes_twice() {
        let mut c = compositor(CompositorConfig::default());
        c.begin(Vec2::zero()).unwrap();
        c.fill_rect(rect(), Tint::WHITE, PickMode::Id(1)).unwrap();
        c.fill_rect(rect(), Tint::WHITE, PickMode::Id(2)).unwrap();
        c.draw_text(&glyphs(), 0, 12.0, Tint::WHITE, 0.0).unwrap();
        c.fill_rect(rect(), Tint::WHITE, PickMode::Id(3)).unwrap();

        let s = c.frame_stats();
        assert_eq!(s.flushes_for(FlushCause::KindSwitch), 2);
        assert_eq!(s.flush_count(), 2);
        assert_eq!(s.kind_switches, 2);
        assert_eq!(c.pending(BatchKind::Sprite), 1);
    }

    #[test]
    fn text_excludes_id_layer() {
        let mut c = compositor(CompositorConfig::default());
        c.begin(Vec2::zero()).unwrap();
        c.draw_text(&glyphs(), 0, 12.0, Tint::WHITE, 0.0).unwrap();
        c.fill_rect(rect(), Tint::WHITE, PickMode::Id(1)).unwrap();
        c.end().unwrap();

        let id = SurfaceRole::PixelId.slot();
        let draws: Vec<_> = c.backend().draws().collect();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].0, BatchKind::Text);
        assert!(!draws[0].2.contains(id));
        assert_eq!(draws[1].0, BatchKind::Sprite);
        assert!(draws[1].2.contains(id));
    }

    // ── skip id ───────────────────────────────────────────────────────────

    #[test]
    fn unpickable_sprite_gets_its_own_narrowed_draw() {
        let mut c = compositor(CompositorConfig::default());
        c.begin(Vec2::zero()).unwrap();
        c.fill_rect(rect(), Tint::WHITE, PickMode::Id(1)).unwrap();
        c.fill_rect(rect(), Tint::WHITE, PickMode::Skip).unwrap();
        c.fill_rect(rect(), Tint::WHITE, PickMode::Id(2)).unwrap();
        c.end().unwrap();

        let id = SurfaceRole::PixelId.slot();
        let draws: Vec<_> = c.backend().draws().collect();
        assert_eq!(draws.len(), 3);
        assert!(draws[0].2.contains(id));
        assert!(!draws[1].2.contains(id));
        assert_eq!(draws[1].1, 1);
        assert!(draws[2].2.contains(id));
        assert_eq!(c.last_frame_stats().flushes_for(FlushCause::SkipId), 2);
    }

    #[test]
    fn skip_first_in_frame_still_flushes_after() {
        let mut c = compositor(CompositorConfig::default());
        c.begin(Vec2::zero()).unwrap();
        c.fill_rect(rect(), Tint::WHITE, PickMode::Skip).unwrap();
        assert_eq!(c.pending(BatchKind::Sprite), 0);
        assert_eq!(c.surface().write_set(), c.surface().default_write_set());
        c.end().unwrap();
        assert_eq!(c.draw_call_count(), 1);
    }

    // ── end of frame ──────────────────────────────────────────────────────

    #[test]
    fn ten_sprites_three_images_capacity_four() {
        let cfg = CompositorConfig { sprite_capacity: 4, ..Default::default() };
        let mut c = compositor(cfg);
        let imgs = [image(&mut c), image(&mut c), image(&mut c)];

        c.begin(Vec2::new(400.0, 300.0)).unwrap();
        for i in 0..10 {
            c.draw_sprite(imgs[i % 3], rect(), Tint::WHITE, PickMode::Id(i as u16 + 1), 0.0)
                .unwrap();
        }
        let stats = c.end().unwrap();

        assert_eq!(stats.draw_calls, 3);
        assert_eq!(c.draw_call_count(), 3);
        assert_eq!(c.flush_count(), 3);
        assert_eq!(c.pending(BatchKind::Sprite), 0);
        assert_eq!(c.backend().draw_count(), 3);
    }

    #[test]
    fn end_submits_once() {
        let mut c = compositor(CompositorConfig::default());
        c.begin(Vec2::zero()).unwrap();
        c.end().unwrap();
        assert_eq!(c.backend().submit_count(), 1);
        assert_eq!(c.frame_index(), 1);
    }

    #[test]
    fn surface_is_bound_once_across_frames() {
        let mut c = compositor(CompositorConfig::default());
        for _ in 0..3 {
            c.begin(Vec2::zero()).unwrap();
            c.end().unwrap();
        }
        assert_eq!(c.backend().count(|cmd| matches!(cmd, Command::BindSurface { .. })), 1);
        assert_eq!(c.peak_stats().surface_binds, 1);
        assert_eq!(c.last_frame_stats().surface_binds, 0);
    }

    // ── scissor / pause ───────────────────────────────────────────────────

    #[test]
    fn scissor_change_flushes_active_batch() {
        let mut c = compositor(CompositorConfig::default());
        c.begin(Vec2::zero()).unwrap();
        c.fill_rect(rect(), Tint::WHITE, PickMode::Id(1)).unwrap();
        assert!(c.push_scissor(Rect::from_xywh(0.0, 0.0, 5.0, 5.0)).unwrap());
        c.fill_rect(rect(), Tint::WHITE, PickMode::Id(1)).unwrap();
        c.pop_scissor().unwrap();
        assert!(matches!(c.pop_scissor(), Err(CompositorError::ScissorUnderflow)));
        c.end().unwrap();

        assert_eq!(c.last_frame_stats().flushes_for(FlushCause::Scissor), 2);
        assert_eq!(c.draw_call_count(), 2);
    }

    #[test]
    fn pause_unbinds_and_resume_rebinds() {
        let mut c = compositor(CompositorConfig::default());
        c.begin(Vec2::zero()).unwrap();
        c.fill_rect(rect(), Tint::WHITE, PickMode::Id(1)).unwrap();
        c.pause().unwrap();
        assert_eq!(c.backend().bound_attachments(), None);
        assert!(matches!(c.pause(), Err(CompositorError::Paused("pause"))));
        c.resume().unwrap();
        assert!(matches!(c.resume(), Err(CompositorError::NotPaused)));
        assert!(c.backend().bound_attachments().is_some());
        c.end().unwrap();

        let s = c.last_frame_stats();
        assert_eq!(s.flushes_for(FlushCause::Pause), 1);
        assert_eq!(s.surface_binds, 2);
    }

    #[test]
    fn font_page_change_flushes_pending_text() {
        let mut c = compositor(CompositorConfig::default());
        let page = image(&mut c);
        c.begin(Vec2::zero()).unwrap();
        c.draw_text(&glyphs(), 0, 12.0, Tint::WHITE, 0.0).unwrap();
        c.set_font_page(0, Some(page)).unwrap();
        c.end().unwrap();
        assert_eq!(c.last_frame_stats().flushes_for(FlushCause::FontPage), 1);
    }

    #[test]
    fn pixel_art_flag_applies_to_every_sprite() {
        let cfg = CompositorConfig { pixel_art_antialiasing: true, ..Default::default() };
        let mut c = compositor(cfg);
        c.begin(Vec2::zero()).unwrap();
        c.fill_rect(rect(), Tint::WHITE, PickMode::Id(1)).unwrap();
        let bits = c.sprites.vertices()[0].bits;
        assert!(crate::batch::SpriteBits::flags(bits).contains(SpriteFlags::PIXEL_AA));
    }

    #[test]
    fn attach_while_recording_fails() {
        let mut c = compositor(CompositorConfig::default());
        c.begin(Vec2::zero()).unwrap();
        assert!(matches!(c.detach_image(0), Err(CompositorError::WhileRecording(_))));
    }

    #[test]
    fn destroy_releases_everything() {
        let c = compositor(CompositorConfig::default());
        let b = c.destroy();
        assert_eq!(b.live_images(), 0);
        assert_eq!(b.live_readbacks(), 0);
    }

    #[test]
    fn glyph_table_upload_waits_for_pending_text() {
        let mut c = compositor(CompositorConfig::default());
        c.begin(Vec2::zero()).unwrap();
        c.draw_text(&glyphs(), 0, 12.0, Tint::WHITE, 0.0).unwrap();
        c.upload_glyph_table(0, &GlyphTable::new()).unwrap();
        c.end().unwrap();

        let cmds = c.backend().commands();
        let draw = cmds
            .iter()
            .position(|cmd| matches!(cmd, Command::Draw { kind: BatchKind::Text, .. }))
            .unwrap();
        let upload = cmds
            .iter()
            .position(|cmd| matches!(cmd, Command::UploadGlyphTable { font_slot: 0 }))
            .unwrap();
        assert!(draw < upload);
        assert_eq!(c.last_frame_stats().flushes_for(FlushCause::FontPage), 1);
    }

    #[test]
    fn empty_and_inverted_quads_are_culled() {
        let mut c = compositor(CompositorConfig::default());
        c.begin(Vec2::zero()).unwrap();
        c.fill_rect(Rect::new(10.0, 10.0, 10.0, 10.0), Tint::WHITE, PickMode::Id(1)).unwrap();
        c.fill_rect(Rect::new(20.0, 20.0, 5.0, 5.0), Tint::WHITE, PickMode::Skip).unwrap();
        c.fill_rect(Rect::new(0.0, 0.0, f32::NAN, 4.0), Tint::WHITE, PickMode::Id(2)).unwrap();
        assert_eq!(c.active_batch(), None);
        let stats = c.end().unwrap();

        assert_eq!(stats.draw_calls, 0);
        assert_eq!(stats.flushes_for(FlushCause::SkipId), 0);
        assert_eq!(c.backend().draw_count(), 0);
    }

    #[test]
    fn fit_letterboxes_wide_image() {
        let mut c = compositor(CompositorConfig::default());
        let wide = c
            .backend_mut()
            .create_image(&ImageDesc::new(40, 20, PixelFormat::Rgba8Unorm))
            .unwrap();
        c.begin(Vec2::zero()).unwrap();
        c.draw_sprite_fit(wide, Rect::from_xywh(0.0, 0.0, 100.0, 100.0), Tint::WHITE, PickMode::Id(1), 0.0)
            .unwrap();

        let v = c.sprites.vertices();
        assert_eq!(v[0].position, [0.0, 25.0]);
        assert_eq!(v[2].position, [100.0, 75.0]);
    }

    #[test]
    fn centred_sprite_uses_image_size() {
        let mut c = compositor(CompositorConfig::default());
        let img = image(&mut c);
        c.begin(Vec2::zero()).unwrap();
        c.draw_sprite_at(img, Vec2::new(50.0, 50.0), 2.0, Tint::WHITE, PickMode::Id(1), 0.0)
            .unwrap();

        let v = c.sprites.vertices();
        assert_eq!(v[0].position, [34.0, 34.0]);
        assert_eq!(v[2].position, [66.0, 66.0]);
    }

    #[test]
    fn centred_unknown_image_draws_nothing() {
        let mut c = compositor(CompositorConfig::default());
        let img = image(&mut c);
        c.backend_mut().destroy_image(img);
        c.begin(Vec2::zero()).unwrap();
        c.draw_sprite_at(img, Vec2::new(50.0, 50.0), 1.0, Tint::WHITE, PickMode::Id(1), 0.0)
            .unwrap();
        assert_eq!(c.pending(BatchKind::Sprite), 0);
    }
}
