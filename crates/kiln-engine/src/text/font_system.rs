use crate::coords::Rect;

use super::{GlyphMetrics, GlyphTable};

// ── page constants ─────────────────────────────────────────────────────────

const PAGE_WIDTH: u32 = 512;
const GLYPH_PADDING: u32 = 1; // pixels between glyphs on a page

/// Error returned by [`FontSystem`] operations.
#[derive(Debug, thiserror::Error)]
pub enum FontLoadError {
    #[error("font parse error: {0}")]
    Parse(String),
    #[error("unknown font {0:?}")]
    UnknownFont(FontId),
    #[error("font has no horizontal line metrics")]
    NoLineMetrics,
}

/// Opaque handle to a font loaded into a [`FontSystem`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FontId(pub(crate) usize);

/// Owns a collection of loaded fonts.
///
/// Fonts are immutable after loading. Metrics are handed out per size through
/// [`FontMetrics`]; [`bake_page`](Self::bake_page) rasterizes a Latin-1 glyph
/// page plus the matching [`GlyphTable`].
pub struct FontSystem {
    fonts: Vec<fontdue::Font>,
}

impl FontSystem {
    pub fn new() -> Self {
        Self { fonts: Vec::new() }
    }

    /// Parses and stores a TrueType or OpenType font from raw bytes.
    pub fn load_font(&mut self, bytes: &[u8]) -> Result<FontId, FontLoadError> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| FontLoadError::Parse(e.to_string()))?;
        let id = FontId(self.fonts.len());
        self.fonts.push(font);
        Ok(id)
    }

    /// Metrics of `id` at `base_size` pixels.
    pub fn metrics(&self, id: FontId, base_size: f32) -> Result<FontMetrics<'_>, FontLoadError> {
        let font = self.fonts.get(id.0).ok_or(FontLoadError::UnknownFont(id))?;
        let line = font
            .horizontal_line_metrics(base_size)
            .ok_or(FontLoadError::NoLineMetrics)?;
        Ok(FontMetrics {
            font,
            size: base_size,
            ascent: line.ascent,
            descent: -line.descent,
            line_gap: line.line_gap,
        })
    }

    /// Rasterizes every printable Latin-1 glyph of `id` at `base_size` onto one
    /// page, shelf-packed left to right.
    pub fn bake_page(&self, id: FontId, base_size: f32) -> Result<GlyphPage, FontLoadError> {
        let metrics = self.metrics(id, base_size)?;
        let font = metrics.font;

        let mut bitmaps = Vec::new();
        for code in printable_codes() {
            let (m, coverage) = font.rasterize(code as char, base_size);
            if m.width == 0 || m.height == 0 {
                continue;
            }
            bitmaps.push((code, m.width as u32, m.height as u32, coverage));
        }

        // First pass: placements.
        let mut cursor_x = GLYPH_PADDING;
        let mut cursor_y = GLYPH_PADDING;
        let mut row_height = 0;
        let mut placed = Vec::with_capacity(bitmaps.len());
        for (code, w, h, _) in &bitmaps {
            if cursor_x + w + GLYPH_PADDING > PAGE_WIDTH {
                cursor_y += row_height + GLYPH_PADDING;
                cursor_x = GLYPH_PADDING;
                row_height = 0;
            }
            placed.push((*code, cursor_x, cursor_y));
            cursor_x += w + GLYPH_PADDING;
            row_height = row_height.max(*h);
        }
        let height = (cursor_y + row_height + GLYPH_PADDING).max(1);

        // Second pass: blit coverage into white RGBA texels.
        let mut pixels = vec![0u8; (PAGE_WIDTH * height * 4) as usize];
        let mut uvs = [None; 256];
        for ((code, w, h, coverage), (_, gx, gy)) in bitmaps.iter().zip(placed.iter()) {
            for row in 0..*h {
                for col in 0..*w {
                    let a = coverage[(row * w + col) as usize];
                    let i = (((gy + row) * PAGE_WIDTH + gx + col) * 4) as usize;
                    pixels[i..i + 4].copy_from_slice(&[255, 255, 255, a]);
                }
            }
            let pw = PAGE_WIDTH as f32;
            let ph = height as f32;
            uvs[*code as usize] = Some(Rect::new(
                *gx as f32 / pw,
                *gy as f32 / ph,
                (gx + w) as f32 / pw,
                (gy + h) as f32 / ph,
            ));
        }

        let table = GlyphTable::build(&metrics, |code| uvs[code as usize]);
        log::debug!(
            "baked glyph page {}x{} with {} glyphs at {}px",
            PAGE_WIDTH,
            height,
            bitmaps.len(),
            base_size
        );

        Ok(GlyphPage {
            width: PAGE_WIDTH,
            height,
            pixels,
            table,
        })
    }
}

impl Default for FontSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn printable_codes() -> impl Iterator<Item = u8> {
    (0x20..=0x7Eu8).chain(0xA0..=0xFFu8)
}

/// A rasterized glyph page: tightly packed RGBA8 rows plus its glyph table.
#[derive(Debug, Clone)]
pub struct GlyphPage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub table: GlyphTable,
}

/// [`GlyphMetrics`] view of one font at one pixel size.
#[derive(Clone, Copy)]
pub struct FontMetrics<'a> {
    font: &'a fontdue::Font,
    size: f32,
    ascent: f32,
    descent: f32,
    line_gap: f32,
}

impl GlyphMetrics for FontMetrics<'_> {
    fn base_size(&self) -> f32 {
        self.size
    }

    fn advance(&self, code: u8) -> f32 {
        self.font.metrics(code as char, self.size).advance_width
    }

    fn ascent(&self) -> f32 {
        self.ascent
    }

    fn descent(&self) -> f32 {
        self.descent
    }

    fn line_gap(&self) -> f32 {
        self.line_gap
    }

    fn glyph_bounds(&self, code: u8) -> Option<Rect> {
        let m = self.font.metrics(code as char, self.size);
        if m.width == 0 || m.height == 0 {
            return None;
        }
        // fontdue's ymin is the bitmap bottom, y-up from the baseline.
        let top = -(m.ymin as f32 + m.height as f32);
        Some(Rect::from_xywh(m.xmin as f32, top, m.width as f32, m.height as f32))
    }

    fn kerning(&self, left: u8, right: u8) -> f32 {
        self.font
            .horizontal_kern(left as char, right as char, self.size)
            .unwrap_or(0.0)
    }
}
