//! Sprite batch: textured or solid quads with pick ids.
//!
//! Each quad is four [`SpriteVertex`] records sharing one packed bits word:
//!
//! | bits  | meaning                      |
//! |-------|------------------------------|
//! | 0–3   | diffuse sampler slot         |
//! | 4–7   | normals sampler slot         |
//! | 8–12  | glow, quantized to 0–31      |
//! | 13    | pixel-art antialiasing       |
//! | 14    | ellipse mask                 |
//! | 15    | opaque id                    |
//! | 16–31 | pick id                      |

use core::f32::consts::FRAC_PI_2;
use core::ops::BitOr;

use bytemuck::{Pod, Zeroable};

use crate::coords::{Rect, Vec2};
use crate::device::{ImageId, RenderBackend, SamplerChannel};
use crate::paint::Tint;

use super::{
    Batch, BatchAccumulator, BatchKind, BatchStats, FlushCause, SamplerSlot, SamplerSlotAllocator,
};

// ── vertex ────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub tint: u32,
    pub bits: u32,
}

const VERTICES_PER_QUAD: usize = 4;

/// Index pattern `0,1,2,2,3,0` repeated for `quads` quads.
///
/// `quads * 4` must fit in `u16`; the compositor config enforces it.
pub fn quad_indices(quads: usize) -> Vec<u16> {
    (0..quads)
        .flat_map(|q| {
            let b = (q * VERTICES_PER_QUAD) as u16;
            [b, b + 1, b + 2, b + 2, b + 3, b]
        })
        .collect()
}

// ── bits ──────────────────────────────────────────────────────────────────

/// Per-quad rendering flags.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct SpriteFlags(u32);

impl SpriteFlags {
    pub const NONE: SpriteFlags = SpriteFlags(0);
    /// Snap UVs to texel centres with a one-pixel blend, for scaled pixel art.
    pub const PIXEL_AA: SpriteFlags = SpriteFlags(1 << 13);
    /// Discard fragments outside the inscribed ellipse.
    pub const ELLIPSE: SpriteFlags = SpriteFlags(1 << 14);
    /// Write the pick id over the whole quad, transparent texels included.
    pub const OPAQUE_ID: SpriteFlags = SpriteFlags(1 << 15);

    const MASK: u32 = 0b111 << 13;

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: SpriteFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SpriteFlags {
    type Output = SpriteFlags;
    #[inline]
    fn bitor(self, rhs: SpriteFlags) -> SpriteFlags {
        SpriteFlags(self.0 | rhs.0)
    }
}

/// Packing helpers for the sprite bits word.
pub struct SpriteBits;

impl SpriteBits {
    pub fn pack(
        diffuse: SamplerSlot,
        normals: SamplerSlot,
        glow: f32,
        flags: SpriteFlags,
        pick_id: u16,
    ) -> u32 {
        let glow = (glow.clamp(0.0, 1.0) * 31.0).round() as u32;
        (diffuse.index() as u32 & 0xF)
            | (normals.index() as u32 & 0xF) << 4
            | glow << 8
            | flags.bits() & SpriteFlags::MASK
            | (pick_id as u32) << 16
    }

    #[inline]
    pub const fn diffuse_slot(bits: u32) -> u8 {
        (bits & 0xF) as u8
    }

    #[inline]
    pub const fn normals_slot(bits: u32) -> u8 {
        (bits >> 4 & 0xF) as u8
    }

    #[inline]
    pub const fn glow_level(bits: u32) -> u8 {
        (bits >> 8 & 0x1F) as u8
    }

    #[inline]
    pub const fn flags(bits: u32) -> SpriteFlags {
        SpriteFlags(bits & SpriteFlags::MASK)
    }

    #[inline]
    pub const fn pick_id(bits: u32) -> u16 {
        (bits >> 16) as u16
    }
}

// ── draw request ──────────────────────────────────────────────────────────

/// One sprite as requested by application code.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SpriteDraw {
    /// `None` draws a solid quad in `tint`.
    pub image: Option<ImageId>,
    pub normals: Option<ImageId>,
    pub rect: Rect,
    /// Source region in normalized texture coordinates.
    pub uv: Rect,
    pub tint: Tint,
    pub pick_id: u16,
    pub glow: f32,
    /// Clockwise, in radians. Quarter turns rotate the image inside `rect`;
    /// other angles rotate the quad around its centre.
    pub rotation: f32,
    pub flags: SpriteFlags,
}

impl SpriteDraw {
    pub fn new(image: ImageId, rect: Rect) -> Self {
        Self {
            image: Some(image),
            ..Self::solid(rect, Tint::WHITE)
        }
    }

    pub fn solid(rect: Rect, tint: Tint) -> Self {
        Self {
            image: None,
            normals: None,
            rect,
            uv: Rect::new(0.0, 0.0, 1.0, 1.0),
            tint,
            pick_id: 0,
            glow: 0.0,
            rotation: 0.0,
            flags: SpriteFlags::NONE,
        }
    }

    /// `image` at its source region's size times `scale`, centred on `center`.
    ///
    /// `image_size` is the full image in pixels; the region is `uv` of it.
    pub fn centered(image: ImageId, center: Vec2, scale: f32, image_size: (u32, u32)) -> Self {
        let draw = Self::new(image, Rect::default());
        let size = draw.region_size(image_size) * scale;
        Self {
            rect: Rect::centered(center, size),
            ..draw
        }
    }

    /// Shrinks `rect` to the largest centred rect with the source region's
    /// aspect ratio. Leaves it alone when the region has no area.
    pub fn fit_within(mut self, image_size: (u32, u32)) -> Self {
        let region = self.region_size(image_size);
        if !(region.x > 0.0 && region.y > 0.0) {
            return self;
        }
        let aspect = region.x / region.y;
        let (box_w, box_h) = (self.rect.width(), self.rect.height());
        let mut w = box_w;
        let mut h = w / aspect;
        if h > box_h {
            h = box_h;
            w = h * aspect;
        }
        self.rect = Rect::centered(self.rect.center(), Vec2::new(w, h));
        self
    }

    fn region_size(&self, (width, height): (u32, u32)) -> Vec2 {
        Vec2::new(
            width as f32 * self.uv.width().abs(),
            height as f32 * self.uv.height().abs(),
        )
    }

    pub fn with_uv(mut self, uv: Rect) -> Self {
        self.uv = uv;
        self
    }

    pub fn with_normals(mut self, normals: ImageId) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_tint(mut self, tint: Tint) -> Self {
        self.tint = tint;
        self
    }

    pub fn with_pick_id(mut self, id: u16) -> Self {
        self.pick_id = id;
        self
    }

    pub fn with_glow(mut self, glow: f32) -> Self {
        self.glow = glow;
        self
    }

    pub fn with_rotation(mut self, radians: f32) -> Self {
        self.rotation = radians;
        self
    }

    pub fn with_flags(mut self, flags: SpriteFlags) -> Self {
        self.flags = self.flags | flags;
        self
    }
}

// ── batch ─────────────────────────────────────────────────────────────────

/// Quad accumulator with two independent sampler pools.
#[derive(Debug)]
pub struct SpriteBatch {
    accum: BatchAccumulator<SpriteVertex>,
    diffuse: SamplerSlotAllocator,
    normals: SamplerSlotAllocator,
    stats: BatchStats,
    warned_destroyed: bool,
}

impl SpriteBatch {
    pub fn new(capacity: usize, sampler_budget: usize) -> Self {
        Self {
            accum: BatchAccumulator::new(capacity, VERTICES_PER_QUAD),
            diffuse: SamplerSlotAllocator::new(sampler_budget),
            normals: SamplerSlotAllocator::new(sampler_budget),
            stats: BatchStats::default(),
            warned_destroyed: false,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.accum.capacity()
    }

    pub fn diffuse_slots(&self) -> &SamplerSlotAllocator {
        &self.diffuse
    }

    pub fn normals_slots(&self) -> &SamplerSlotAllocator {
        &self.normals
    }

    /// Counters since the last `take_stats`.
    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    /// Pending vertices, four per quad.
    pub fn vertices(&self) -> &[SpriteVertex] {
        self.accum.vertices()
    }

    /// Appends one quad, flushing first when the batch is full or a sampler
    /// pool cannot take the quad's images.
    pub fn push<B: RenderBackend>(&mut self, backend: &mut B, draw: &SpriteDraw) {
        if self.accum.is_full() {
            self.flush(backend, FlushCause::Capacity);
        }

        let mut tint = draw.tint;
        let mut image = draw.image;
        let mut normals = draw.normals;

        if let Some(img) = image {
            if backend.image_info(img).is_none() {
                if !self.warned_destroyed {
                    log::warn!("sprite references destroyed image {img:?}; drawing error tint");
                    self.warned_destroyed = true;
                }
                image = None;
                normals = None;
                tint = Tint::ERROR;
            }
        }
        if let Some(n) = normals {
            if backend.image_info(n).is_none() {
                log::debug!("sprite normals {n:?} destroyed; using flat normals");
                normals = None;
            }
        }

        // Both slots are settled before any vertex is written.
        let (d_slot, n_slot) = match self.try_assign(image, normals) {
            Some(pair) => pair,
            None => {
                log::trace!("sampler slots exhausted; flushing sprite batch");
                self.flush(backend, FlushCause::SamplerExhausted);
                self.try_assign(image, normals)
                    .unwrap_or((SamplerSlot::NONE, SamplerSlot::NONE))
            }
        };

        let bits = SpriteBits::pack(d_slot, n_slot, draw.glow, draw.flags, draw.pick_id);
        let tint = tint.0;
        let (positions, uvs) = quad_geometry(draw.rect, draw.uv, draw.rotation);

        let mut quad = [SpriteVertex::default(); VERTICES_PER_QUAD];
        for (i, v) in quad.iter_mut().enumerate() {
            *v = SpriteVertex {
                position: [positions[i].x, positions[i].y],
                uv: [uvs[i].x, uvs[i].y],
                tint,
                bits,
            };
        }
        self.accum.push(&quad);

        if self.accum.is_full() {
            self.flush(backend, FlushCause::Capacity);
        }
    }

    fn try_assign(
        &mut self,
        image: Option<ImageId>,
        normals: Option<ImageId>,
    ) -> Option<(SamplerSlot, SamplerSlot)> {
        let d = match image {
            Some(img) => self.diffuse.assign(img)?,
            None => SamplerSlot::NONE,
        };
        let n = match normals {
            Some(img) => self.normals.assign(img)?,
            None => SamplerSlot::NONE,
        };
        Some((d, n))
    }
}

impl<B: RenderBackend> Batch<B> for SpriteBatch {
    fn pending(&self) -> usize {
        self.accum.pending()
    }

    fn flush(&mut self, backend: &mut B, cause: FlushCause) -> bool {
        if self.accum.is_empty() {
            // A half-assigned primitive may still hold slots.
            self.diffuse.release_all();
            self.normals.release_all();
            return false;
        }

        let primitives = self.accum.pending() as u32;
        backend.upload_vertices(BatchKind::Sprite, self.accum.as_bytes());
        backend.bind_samplers(SamplerChannel::Diffuse, self.diffuse.bound());
        backend.bind_samplers(SamplerChannel::Normals, self.normals.bound());
        backend.draw(BatchKind::Sprite, primitives);

        self.stats.draw_calls += 1;
        self.stats.flushes.record(cause);
        log::trace!("sprite flush: {primitives} quads ({cause:?})");

        self.accum.reset();
        self.diffuse.release_all();
        self.normals.release_all();
        true
    }

    fn take_stats(&mut self) -> BatchStats {
        std::mem::take(&mut self.stats)
    }
}

/// Corner positions and UVs in quad order (tl, tr, br, bl).
fn quad_geometry(rect: Rect, uv: Rect, rotation: f32) -> ([Vec2; 4], [Vec2; 4]) {
    let uvs = uv.corners();
    if rotation == 0.0 || !rotation.is_finite() {
        return (rect.corners(), uvs);
    }

    let turns = rotation / FRAC_PI_2;
    let nearest = turns.round();
    if (turns - nearest).abs() < 1e-4 {
        let k = (nearest as i64).rem_euclid(4) as usize;
        let rotated = core::array::from_fn(|i| uvs[(i + 4 - k) % 4]);
        return (rect.corners(), rotated);
    }

    (rect.rotated_corners(rotation), uvs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Command, HeadlessBackend, ImageDesc, PixelFormat};

    fn backend_with_images(n: usize) -> (HeadlessBackend, Vec<ImageId>) {
        let mut b = HeadlessBackend::new();
        let imgs = (0..n)
            .map(|_| b.create_image(&ImageDesc::new(8, 8, PixelFormat::Rgba8Unorm)).unwrap())
            .collect();
        (b, imgs)
    }

    fn rect() -> Rect {
        Rect::from_xywh(10.0, 20.0, 30.0, 40.0)
    }

    // ── capacity ──────────────────────────────────────────────────────────

    #[test]
    fn flushes_follow_capacity() {
        for capacity in 1..=5 {
            for n in 0..=17 {
                let mut b = HeadlessBackend::new();
                let mut batch = SpriteBatch::new(capacity, 15);
                for _ in 0..n {
                    batch.push(&mut b, &SpriteDraw::solid(rect(), Tint::WHITE));
                }
                assert_eq!(b.draw_count(), n / capacity, "n={n} c={capacity}");
                assert_eq!(Batch::<HeadlessBackend>::pending(&batch), n % capacity);

                Batch::<HeadlessBackend>::flush(&mut batch, &mut b, FlushCause::EndOfFrame);
                assert_eq!(b.draw_count(), n.div_ceil(capacity));
            }
        }
    }

    #[test]
    fn flush_on_empty_batch_is_noop() {
        let mut b = HeadlessBackend::new();
        let mut batch = SpriteBatch::new(4, 15);
        assert!(!Batch::<HeadlessBackend>::flush(&mut batch, &mut b, FlushCause::EndOfFrame));
        assert_eq!(b.draw_count(), 0);
        assert_eq!(batch.stats().draw_calls, 0);
    }

    #[test]
    fn draw_uploads_used_region_only() {
        let (mut b, imgs) = backend_with_images(1);
        let mut batch = SpriteBatch::new(8, 15);
        batch.push(&mut b, &SpriteDraw::new(imgs[0], rect()));
        batch.push(&mut b, &SpriteDraw::new(imgs[0], rect()));
        Batch::<HeadlessBackend>::flush(&mut batch, &mut b, FlushCause::EndOfFrame);

        let uploaded = b.commands().iter().find_map(|c| match c {
            Command::UploadVertices { data, .. } => Some(data.len()),
            _ => None,
        });
        assert_eq!(uploaded, Some(2 * 4 * size_of::<SpriteVertex>()));
    }

    // ── sampler slots ─────────────────────────────────────────────────────

    #[test]
    fn repeated_image_reuses_slot() {
        let (mut b, imgs) = backend_with_images(2);
        let mut batch = SpriteBatch::new(16, 15);
        batch.push(&mut b, &SpriteDraw::new(imgs[0], rect()));
        batch.push(&mut b, &SpriteDraw::new(imgs[0], rect()));
        let v = batch.vertices();
        assert_eq!(SpriteBits::diffuse_slot(v[0].bits), SpriteBits::diffuse_slot(v[4].bits));
        assert_eq!(batch.diffuse_slots().used(), 1);
    }

    #[test]
    fn exhaustion_forces_exactly_one_flush() {
        let budget = 15;
        let (mut b, imgs) = backend_with_images(budget + 1);
        let mut batch = SpriteBatch::new(512, budget);
        for img in &imgs {
            batch.push(&mut b, &SpriteDraw::new(*img, rect()));
        }

        assert_eq!(b.draw_count(), 1);
        assert_eq!(batch.stats().flushes.get(FlushCause::SamplerExhausted), 1);
        assert_eq!(Batch::<HeadlessBackend>::pending(&batch), 1);
        assert_eq!(batch.diffuse_slots().used(), 1);
        assert_eq!(SpriteBits::diffuse_slot(batch.vertices()[0].bits), 0);
    }

    #[test]
    fn normals_exhaustion_keeps_diffuse_slot_valid() {
        let (mut b, imgs) = backend_with_images(4);
        let mut batch = SpriteBatch::new(16, 2);
        batch.push(&mut b, &SpriteDraw::new(imgs[0], rect()).with_normals(imgs[1]));
        batch.push(&mut b, &SpriteDraw::new(imgs[0], rect()).with_normals(imgs[2]));
        // Diffuse pool has room, normals pool is full.
        batch.push(&mut b, &SpriteDraw::new(imgs[3], rect()).with_normals(imgs[3]));

        assert_eq!(b.draw_count(), 1);
        let bits = batch.vertices()[0].bits;
        assert_eq!(SpriteBits::diffuse_slot(bits), 0);
        assert_eq!(SpriteBits::normals_slot(bits), 0);
        assert_eq!(batch.diffuse_slots().bound()[0], Some(imgs[3]));
    }

    #[test]
    fn flush_binds_slot_tables() {
        let (mut b, imgs) = backend_with_images(2);
        let mut batch = SpriteBatch::new(16, 3);
        batch.push(&mut b, &SpriteDraw::new(imgs[1], rect()));
        batch.push(&mut b, &SpriteDraw::new(imgs[0], rect()));
        Batch::<HeadlessBackend>::flush(&mut batch, &mut b, FlushCause::EndOfFrame);

        assert!(b.commands().contains(&Command::BindSamplers {
            channel: SamplerChannel::Diffuse,
            images: vec![Some(imgs[1]), Some(imgs[0]), None],
        }));
    }

    // ── packing ───────────────────────────────────────────────────────────

    #[test]
    fn bits_layout() {
        let bits = SpriteBits::pack(
            SamplerSlot::NONE,
            SamplerSlot::NONE,
            1.0,
            SpriteFlags::ELLIPSE | SpriteFlags::OPAQUE_ID,
            0xBEEF,
        );
        assert_eq!(SpriteBits::diffuse_slot(bits), 15);
        assert_eq!(SpriteBits::normals_slot(bits), 15);
        assert_eq!(SpriteBits::glow_level(bits), 31);
        assert!(SpriteBits::flags(bits).contains(SpriteFlags::ELLIPSE));
        assert!(!SpriteBits::flags(bits).contains(SpriteFlags::PIXEL_AA));
        assert_eq!(SpriteBits::pick_id(bits), 0xBEEF);
    }

    #[test]
    fn glow_is_clamped() {
        let bits = SpriteBits::pack(SamplerSlot::NONE, SamplerSlot::NONE, 4.0, SpriteFlags::NONE, 0);
        assert_eq!(SpriteBits::glow_level(bits), 31);
        let bits = SpriteBits::pack(SamplerSlot::NONE, SamplerSlot::NONE, -1.0, SpriteFlags::NONE, 0);
        assert_eq!(SpriteBits::glow_level(bits), 0);
    }

    #[test]
    fn destroyed_image_draws_error_tint() {
        let (mut b, imgs) = backend_with_images(1);
        b.destroy_image(imgs[0]);
        let mut batch = SpriteBatch::new(4, 15);
        batch.push(&mut b, &SpriteDraw::new(imgs[0], rect()).with_tint(Tint::BLACK));

        let v = batch.vertices()[0];
        assert_eq!(v.tint, Tint::ERROR.0);
        assert_eq!(SpriteBits::diffuse_slot(v.bits), SamplerSlot::NONE.index());
        assert!(batch.diffuse_slots().is_empty());
    }

    #[test]
    fn quad_indices_pattern() {
        assert_eq!(quad_indices(2), vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]);
    }

    // ── rotation ──────────────────────────────────────────────────────────

    #[test]
    fn quarter_turn_rotates_uvs_not_positions() {
        let uv = Rect::new(0.0, 0.0, 1.0, 1.0);
        let (pos, uvs) = quad_geometry(rect(), uv, FRAC_PI_2);
        assert_eq!(pos, rect().corners());
        // Top-left corner now shows the bottom-left texel.
        assert_eq!(uvs[0], Vec2::new(0.0, 1.0));
        assert_eq!(uvs[1], Vec2::new(0.0, 0.0));
    }

    #[test]
    fn negative_quarter_turn_wraps() {
        let uv = Rect::new(0.0, 0.0, 1.0, 1.0);
        let (_, uvs) = quad_geometry(rect(), uv, -FRAC_PI_2);
        assert_eq!(uvs[0], Vec2::new(1.0, 0.0));
    }

    #[test]
    fn free_rotation_moves_corners_around_centre() {
        let (pos, uvs) = quad_geometry(rect(), Rect::new(0.0, 0.0, 1.0, 1.0), 0.3);
        assert_eq!(uvs[0], Vec2::new(0.0, 0.0));
        let c = rect().center();
        let d0 = pos[0] - c;
        let orig = rect().min - c;
        let len = |v: Vec2| (v.x * v.x + v.y * v.y).sqrt();
        assert!((len(d0) - len(orig)).abs() < 1e-3);
        assert_ne!(pos[0], rect().min);
    }

    #[test]
    fn fit_keeps_tall_region_aspect() {
        let img = ImageId::from_raw(1);
        let d = SpriteDraw::new(img, Rect::from_xywh(0.0, 0.0, 100.0, 50.0)).fit_within((10, 20));
        assert_eq!(d.rect, Rect::new(37.5, 0.0, 62.5, 50.0));
    }

    #[test]
    fn fit_uses_uv_region_not_whole_image() {
        let img = ImageId::from_raw(1);
        let d = SpriteDraw::new(img, Rect::from_xywh(0.0, 0.0, 40.0, 40.0))
            .with_uv(Rect::new(0.0, 0.0, 1.0, 0.5))
            .fit_within((16, 16));
        assert_eq!(d.rect, Rect::new(0.0, 10.0, 40.0, 30.0));
    }

    #[test]
    fn fit_without_area_keeps_rect() {
        let img = ImageId::from_raw(1);
        let r = Rect::from_xywh(0.0, 0.0, 40.0, 40.0);
        assert_eq!(SpriteDraw::new(img, r).fit_within((0, 16)).rect, r);
    }

    #[test]
    fn centred_scales_source_size() {
        let d = SpriteDraw::centered(ImageId::from_raw(1), Vec2::new(10.0, 10.0), 0.5, (8, 4));
        assert_eq!(d.rect, Rect::new(8.0, 9.0, 12.0, 11.0));
        assert!(!SpriteDraw::centered(ImageId::from_raw(1), Vec2::zero(), 1.0, (0, 0)).rect.is_valid());
    }
}
