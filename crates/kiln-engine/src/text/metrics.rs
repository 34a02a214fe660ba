use bytemuck::{Pod, Zeroable};

use crate::coords::{Rect, Vec2};

/// Glyph codes per font slot.
pub const GLYPH_TABLE_LEN: usize = 256;

/// One glyph to draw: its code and its pen position on the baseline.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlyphPosition {
    pub code: u8,
    pub position: Vec2,
}

/// Font-metric provider.
///
/// All lengths are in pixels at [`base_size`](Self::base_size), y-down, relative
/// to the pen position on the baseline.
pub trait GlyphMetrics {
    fn base_size(&self) -> f32;

    /// Pen advance after `code`. Missing glyphs advance by zero.
    fn advance(&self, code: u8) -> f32;

    /// Distance from the baseline up to the top of the line box.
    fn ascent(&self) -> f32;

    /// Distance from the baseline down to the bottom of the line box.
    fn descent(&self) -> f32;

    fn line_gap(&self) -> f32;

    /// Bitmap bounds of `code`, `None` for glyphs without coverage.
    fn glyph_bounds(&self, code: u8) -> Option<Rect>;

    fn kerning(&self, _left: u8, _right: u8) -> f32 {
        0.0
    }

    fn line_height(&self) -> f32 {
        self.ascent() + self.descent() + self.line_gap()
    }
}

/// GPU-side description of one glyph, em-relative so one table serves every size.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GlyphEntry {
    /// Atlas region: min x, min y, max x, max y in normalized coordinates.
    pub uv: [f32; 4],
    /// Bitmap top-left relative to the pen, divided by the base size.
    pub offset: [f32; 2],
    /// Bitmap size divided by the base size.
    pub extent: [f32; 2],
}

/// Per-font-slot glyph table consumed by the text expansion stage.
#[derive(Clone, PartialEq)]
pub struct GlyphTable {
    entries: Vec<GlyphEntry>,
}

impl core::fmt::Debug for GlyphTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let present = self.entries.iter().filter(|e| e.extent != [0.0; 2]).count();
        f.debug_struct("GlyphTable").field("glyphs", &present).finish()
    }
}

impl Default for GlyphTable {
    fn default() -> Self {
        Self::new()
    }
}

impl GlyphTable {
    /// Table with no glyphs; every code expands to an empty quad.
    pub fn new() -> Self {
        Self {
            entries: vec![GlyphEntry::default(); GLYPH_TABLE_LEN],
        }
    }

    /// Fills the table from metrics and the atlas placement of each code.
    pub fn build<M, F>(metrics: &M, uv_of: F) -> Self
    where
        M: GlyphMetrics + ?Sized,
        F: Fn(u8) -> Option<Rect>,
    {
        let mut table = Self::new();
        let base = metrics.base_size().max(1.0);
        for code in 0..=u8::MAX {
            let (Some(bounds), Some(uv)) = (metrics.glyph_bounds(code), uv_of(code)) else {
                continue;
            };
            table.set(
                code,
                GlyphEntry {
                    uv: [uv.min.x, uv.min.y, uv.max.x, uv.max.y],
                    offset: [bounds.min.x / base, bounds.min.y / base],
                    extent: [bounds.width() / base, bounds.height() / base],
                },
            );
        }
        table
    }

    #[inline]
    pub fn get(&self, code: u8) -> &GlyphEntry {
        &self.entries[code as usize]
    }

    #[inline]
    pub fn set(&mut self, code: u8, entry: GlyphEntry) {
        self.entries[code as usize] = entry;
    }

    pub fn entries(&self) -> &[GlyphEntry] {
        &self.entries
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.entries)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Monospace metrics: every printable glyph is `base/2` wide.
    pub(crate) struct Mono {
        pub base: f32,
    }

    impl GlyphMetrics for Mono {
        fn base_size(&self) -> f32 {
            self.base
        }
        fn advance(&self, code: u8) -> f32 {
            if code.is_ascii_graphic() || code == b' ' { self.base / 2.0 } else { 0.0 }
        }
        fn ascent(&self) -> f32 {
            self.base * 0.8
        }
        fn descent(&self) -> f32 {
            self.base * 0.2
        }
        fn line_gap(&self) -> f32 {
            0.0
        }
        fn glyph_bounds(&self, code: u8) -> Option<Rect> {
            code.is_ascii_graphic()
                .then(|| Rect::from_xywh(0.0, -self.base * 0.8, self.base / 2.0, self.base))
        }
    }

    #[test]
    fn build_normalizes_by_base_size() {
        let m = Mono { base: 20.0 };
        let table = GlyphTable::build(&m, |c| (c == b'A').then(|| Rect::new(0.5, 0.0, 0.75, 0.25)));
        let a = table.get(b'A');
        assert_eq!(a.uv, [0.5, 0.0, 0.75, 0.25]);
        assert_eq!(a.offset, [0.0, -0.8]);
        assert_eq!(a.extent, [0.5, 1.0]);
        assert_eq!(*table.get(b'B'), GlyphEntry::default());
    }

    #[test]
    fn table_bytes_cover_every_code() {
        assert_eq!(GlyphTable::new().as_bytes().len(), GLYPH_TABLE_LEN * 32);
    }

    #[test]
    fn line_height_sums_parts() {
        assert_eq!(Mono { base: 10.0 }.line_height(), 10.0);
    }
}
