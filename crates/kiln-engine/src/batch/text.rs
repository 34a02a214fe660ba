//! Text batch: one point per glyph.
//!
//! The point carries everything the expansion stage needs to build the quad
//! from the glyph table of its font slot. `info` packs:
//!
//! | bits  | meaning                                  |
//! |-------|------------------------------------------|
//! | 0–7   | glyph code                               |
//! | 8–15  | size class, `round(clamp(size,1,256))-1` |
//! | 16–23 | glow, quantized to 0–255                 |
//! | 24–25 | font slot                                |

use bytemuck::{Pod, Zeroable};

use crate::device::{ImageId, RenderBackend, SamplerChannel};
use crate::paint::Tint;
use crate::text::GlyphPosition;

use super::{Batch, BatchAccumulator, BatchKind, BatchStats, FlushCause};

/// Discrete glyph pages a text draw can reference.
pub const FONT_SLOTS: usize = 4;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GlyphVertex {
    /// Pen position on the baseline, surface pixels.
    pub position: [f32; 2],
    pub info: u32,
    pub tint: u32,
}

/// Packing helpers for [`GlyphVertex::info`].
pub struct GlyphInfo;

impl GlyphInfo {
    pub fn pack(code: u8, size: f32, glow: f32, font_slot: u8) -> u32 {
        (code as u32)
            | (Self::size_class(size) as u32) << 8
            | ((glow.clamp(0.0, 1.0) * 255.0).round() as u32) << 16
            | ((font_slot & 0x3) as u32) << 24
    }

    /// `size` in pixels mapped to `0..=255`. NaN maps to the smallest class.
    pub fn size_class(size: f32) -> u8 {
        let s = if size.is_nan() { 1.0 } else { size.clamp(1.0, 256.0) };
        (s.round() as u32 - 1) as u8
    }

    #[inline]
    pub const fn code(info: u32) -> u8 {
        info as u8
    }

    /// Decoded pixel size.
    #[inline]
    pub const fn size(info: u32) -> u32 {
        (info >> 8 & 0xFF) + 1
    }

    #[inline]
    pub const fn glow_level(info: u32) -> u8 {
        (info >> 16) as u8
    }

    #[inline]
    pub const fn font_slot(info: u32) -> u8 {
        (info >> 24 & 0x3) as u8
    }
}

/// Glyph point accumulator plus the glyph page bound to each font slot.
#[derive(Debug)]
pub struct TextBatch {
    accum: BatchAccumulator<GlyphVertex>,
    pages: [Option<ImageId>; FONT_SLOTS],
    stats: BatchStats,
}

impl TextBatch {
    pub fn new(capacity: usize) -> Self {
        Self {
            accum: BatchAccumulator::new(capacity, 1),
            pages: [None; FONT_SLOTS],
            stats: BatchStats::default(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.accum.capacity()
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn vertices(&self) -> &[GlyphVertex] {
        self.accum.vertices()
    }

    pub fn page(&self, font_slot: u8) -> Option<ImageId> {
        self.pages.get(font_slot as usize).copied().flatten()
    }

    /// Binds the glyph page for `font_slot`. Pending glyphs are drawn with the
    /// old page first. Returns `false` for an out-of-range slot.
    pub fn set_page<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        font_slot: u8,
        image: Option<ImageId>,
    ) -> bool {
        let Some(entry) = self.pages.get(font_slot as usize).copied() else {
            return false;
        };
        if entry != image {
            self.flush(backend, FlushCause::FontPage);
            self.pages[font_slot as usize] = image;
        }
        true
    }

    /// Appends one packed glyph.
    pub fn push<B: RenderBackend>(&mut self, backend: &mut B, glyph: GlyphVertex) {
        if self.accum.is_full() {
            self.flush(backend, FlushCause::Capacity);
        }
        self.accum.push(&[glyph]);
        if self.accum.is_full() {
            self.flush(backend, FlushCause::Capacity);
        }
    }

    /// Appends a run of glyphs sharing font, size, tint and glow.
    pub fn push_run<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        glyphs: &[GlyphPosition],
        font_slot: u8,
        size: f32,
        tint: Tint,
        glow: f32,
    ) {
        for g in glyphs {
            let glyph = GlyphVertex {
                position: [g.position.x, g.position.y],
                info: GlyphInfo::pack(g.code, size, glow, font_slot),
                tint: tint.0,
            };
            self.push(backend, glyph);
        }
    }
}

impl<B: RenderBackend> Batch<B> for TextBatch {
    fn pending(&self) -> usize {
        self.accum.pending()
    }

    fn flush(&mut self, backend: &mut B, cause: FlushCause) -> bool {
        if self.accum.is_empty() {
            return false;
        }

        let primitives = self.accum.pending() as u32;
        backend.upload_vertices(BatchKind::Text, self.accum.as_bytes());
        backend.bind_samplers(SamplerChannel::Glyphs, &self.pages);
        backend.draw(BatchKind::Text, primitives);

        self.stats.draw_calls += 1;
        self.stats.flushes.record(cause);
        log::trace!("text flush: {primitives} glyphs ({cause:?})");

        self.accum.reset();
        true
    }

    fn take_stats(&mut self) -> BatchStats {
        std::mem::take(&mut self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use crate::device::{Command, HeadlessBackend, ImageDesc, PixelFormat};

    fn glyphs(n: usize) -> Vec<GlyphPosition> {
        (0..n)
            .map(|i| GlyphPosition {
                code: b'a' + (i % 26) as u8,
                position: Vec2::new(i as f32 * 8.0, 20.0),
            })
            .collect()
    }

    #[test]
    fn info_layout() {
        let info = GlyphInfo::pack(b'Q', 16.0, 1.0, 2);
        assert_eq!(GlyphInfo::code(info), b'Q');
        assert_eq!(GlyphInfo::size(info), 16);
        assert_eq!(GlyphInfo::glow_level(info), 255);
        assert_eq!(GlyphInfo::font_slot(info), 2);
    }

    #[test]
    fn size_class_clamps() {
        assert_eq!(GlyphInfo::size_class(0.0), 0);
        assert_eq!(GlyphInfo::size_class(1000.0), 255);
        assert_eq!(GlyphInfo::size_class(12.4), 11);
        assert_eq!(GlyphInfo::size_class(f32::NAN), 0);
    }

    #[test]
    fn font_slot_wraps_to_two_bits() {
        assert_eq!(GlyphInfo::font_slot(GlyphInfo::pack(0, 1.0, 0.0, 5)), 1);
    }

    #[test]
    fn run_respects_capacity() {
        let mut b = HeadlessBackend::new();
        let mut batch = TextBatch::new(4);
        batch.push_run(&mut b, &glyphs(10), 0, 12.0, Tint::WHITE, 0.0);
        assert_eq!(b.draw_count(), 2);
        assert_eq!(Batch::<HeadlessBackend>::pending(&batch), 2);
        assert_eq!(batch.vertices()[1].position, [72.0, 20.0]);
    }

    #[test]
    fn flush_binds_font_pages() {
        let mut b = HeadlessBackend::new();
        let page = b.create_image(&ImageDesc::new(64, 64, PixelFormat::Rgba8Unorm)).unwrap();
        let mut batch = TextBatch::new(16);
        assert!(batch.set_page(&mut b, 1, Some(page)));
        batch.push_run(&mut b, &glyphs(3), 1, 12.0, Tint::WHITE, 0.0);
        Batch::<HeadlessBackend>::flush(&mut batch, &mut b, FlushCause::EndOfFrame);

        assert!(b.commands().contains(&Command::BindSamplers {
            channel: SamplerChannel::Glyphs,
            images: vec![None, Some(page), None, None],
        }));
    }

    #[test]
    fn replacing_page_flushes_pending_glyphs() {
        let mut b = HeadlessBackend::new();
        let a = b.create_image(&ImageDesc::new(8, 8, PixelFormat::Rgba8Unorm)).unwrap();
        let c = b.create_image(&ImageDesc::new(8, 8, PixelFormat::Rgba8Unorm)).unwrap();
        let mut batch = TextBatch::new(16);
        batch.set_page(&mut b, 0, Some(a));
        batch.push_run(&mut b, &glyphs(2), 0, 12.0, Tint::WHITE, 0.0);
        batch.set_page(&mut b, 0, Some(a));
        assert_eq!(b.draw_count(), 0);
        batch.set_page(&mut b, 0, Some(c));
        assert_eq!(b.draw_count(), 1);
        assert_eq!(batch.stats().flushes.get(FlushCause::FontPage), 1);
        assert!(!batch.set_page(&mut b, 4, Some(c)));
    }
}
