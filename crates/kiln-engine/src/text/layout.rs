use crate::coords::Vec2;

use super::{GlyphMetrics, GlyphPosition};

/// Horizontal placement of a line inside its box.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// What happens when a line is wider than its box.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum SizeMode {
    /// Keep the requested size and drop glyphs past the right edge.
    #[default]
    Fixed,
    /// Shrink the size until the line fits.
    Dynamic,
}

/// Result of [`layout_line`].
#[derive(Debug, Clone, PartialEq)]
pub struct LineLayout {
    pub glyphs: Vec<GlyphPosition>,
    /// Pixel size the glyphs were placed at.
    pub size: f32,
    /// Advance width of the placed glyphs.
    pub width: f32,
    /// Baseline y in surface pixels.
    pub baseline: f32,
}

/// Smallest size a dynamic line shrinks to.
const MIN_DYNAMIC_SIZE: f32 = 1.0;

/// Places `text` on one line whose box starts at `origin` (top-left).
///
/// With `max_width`, alignment is relative to the box `[origin.x, origin.x + max_width]`.
/// Without it, `origin.x` is the left edge, centre or right edge of the line
/// depending on `align`. Characters outside Latin-1 are drawn as `?`.
pub fn layout_line<M: GlyphMetrics + ?Sized>(
    metrics: &M,
    text: &str,
    origin: Vec2,
    max_width: Option<f32>,
    size: f32,
    align: Alignment,
    mode: SizeMode,
) -> LineLayout {
    let codes: Vec<u8> = text
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect();

    let base = metrics.base_size().max(1.0);
    let natural = advance_width(metrics, &codes) * size / base;

    let size = match (mode, max_width) {
        (SizeMode::Dynamic, Some(max)) if natural > max && natural > 0.0 => {
            (size * max / natural).floor().max(MIN_DYNAMIC_SIZE)
        }
        _ => size,
    };
    let scale = size / base;

    let mut glyphs = Vec::with_capacity(codes.len());
    let mut pen = 0.0f32;
    let mut prev: Option<u8> = None;
    for &code in &codes {
        if let Some(p) = prev {
            pen += metrics.kerning(p, code) * scale;
        }
        let advance = metrics.advance(code) * scale;
        if max_width.is_some_and(|max| pen + advance > max + f32::EPSILON) {
            break;
        }
        glyphs.push(GlyphPosition {
            code,
            position: Vec2::new(pen, 0.0),
        });
        pen += advance;
        prev = Some(code);
    }
    let width = pen;

    let left = match (align, max_width) {
        (Alignment::Left, _) => origin.x,
        (Alignment::Center, Some(max)) => origin.x + (max - width) * 0.5,
        (Alignment::Right, Some(max)) => origin.x + max - width,
        (Alignment::Center, None) => origin.x - width * 0.5,
        (Alignment::Right, None) => origin.x - width,
    };
    let baseline = origin.y + metrics.ascent() * scale;

    for g in &mut glyphs {
        g.position = Vec2::new(left + g.position.x, baseline);
    }

    LineLayout {
        glyphs,
        size,
        width,
        baseline,
    }
}

fn advance_width<M: GlyphMetrics + ?Sized>(metrics: &M, codes: &[u8]) -> f32 {
    let mut w = 0.0;
    let mut prev: Option<u8> = None;
    for &code in codes {
        if let Some(p) = prev {
            w += metrics.kerning(p, code);
        }
        w += metrics.advance(code);
        prev = Some(code);
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::metrics::tests::Mono;

    const M: Mono = Mono { base: 10.0 };

    #[test]
    fn left_aligned_advances_by_glyph_width() {
        let l = layout_line(&M, "abc", Vec2::new(5.0, 0.0), None, 10.0, Alignment::Left, SizeMode::Fixed);
        let xs: Vec<f32> = l.glyphs.iter().map(|g| g.position.x).collect();
        assert_eq!(xs, vec![5.0, 10.0, 15.0]);
        assert_eq!(l.width, 15.0);
        assert_eq!(l.baseline, 8.0);
    }

    #[test]
    fn size_scales_positions() {
        let l = layout_line(&M, "ab", Vec2::zero(), None, 20.0, Alignment::Left, SizeMode::Fixed);
        assert_eq!(l.glyphs[1].position.x, 10.0);
        assert_eq!(l.baseline, 16.0);
    }

    #[test]
    fn center_and_right_in_box() {
        let c = layout_line(&M, "ab", Vec2::zero(), Some(30.0), 10.0, Alignment::Center, SizeMode::Fixed);
        assert_eq!(c.glyphs[0].position.x, 10.0);
        let r = layout_line(&M, "ab", Vec2::zero(), Some(30.0), 10.0, Alignment::Right, SizeMode::Fixed);
        assert_eq!(r.glyphs[0].position.x, 20.0);
    }

    #[test]
    fn unbounded_alignment_anchors_on_origin() {
        let r = layout_line(&M, "ab", Vec2::new(100.0, 0.0), None, 10.0, Alignment::Right, SizeMode::Fixed);
        assert_eq!(r.glyphs[0].position.x, 90.0);
        let c = layout_line(&M, "ab", Vec2::new(100.0, 0.0), None, 10.0, Alignment::Center, SizeMode::Fixed);
        assert_eq!(c.glyphs[0].position.x, 95.0);
    }

    #[test]
    fn fixed_mode_clips_overflowing_glyphs() {
        let l = layout_line(&M, "abcdef", Vec2::zero(), Some(12.0), 10.0, Alignment::Left, SizeMode::Fixed);
        assert_eq!(l.glyphs.len(), 2);
        assert_eq!(l.size, 10.0);
    }

    #[test]
    fn dynamic_mode_shrinks_to_fit() {
        let l = layout_line(&M, "abcdef", Vec2::zero(), Some(15.0), 10.0, Alignment::Left, SizeMode::Dynamic);
        assert_eq!(l.size, 5.0);
        assert_eq!(l.glyphs.len(), 6);
        assert!(l.width <= 15.0);
    }

    #[test]
    fn non_latin1_becomes_question_mark() {
        let l = layout_line(&M, "a\u{2603}", Vec2::zero(), None, 10.0, Alignment::Left, SizeMode::Fixed);
        assert_eq!(l.glyphs[1].code, b'?');
    }
}
