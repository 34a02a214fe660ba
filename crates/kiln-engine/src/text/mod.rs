//! Glyph metrics, glyph tables and single-line layout.
//!
//! The compositor only needs glyph codes and pen positions. Everything that
//! knows about fonts sits behind [`GlyphMetrics`]; [`FontSystem`] is the
//! fontdue-backed implementation.

mod font_system;
mod layout;
mod metrics;

pub use font_system::{FontId, FontLoadError, FontMetrics, FontSystem, GlyphPage};
pub use layout::{layout_line, Alignment, LineLayout, SizeMode};
pub use metrics::{GlyphEntry, GlyphMetrics, GlyphPosition, GlyphTable, GLYPH_TABLE_LEN};
