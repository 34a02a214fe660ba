//! CPU-side geometry batching.
//!
//! A batch accumulates primitives in a scratch buffer allocated once and
//! turns them into a single draw call on flush. Two batches exist:
//! - [`SpriteBatch`]: textured or solid quads, four vertices each
//! - [`TextBatch`]: one point per glyph, expanded to a quad on the GPU

mod accumulator;
mod sampler;
mod sprite;
mod text;

pub use accumulator::BatchAccumulator;
pub use sampler::{SamplerSlot, SamplerSlotAllocator, MAX_SAMPLER_SLOTS};
pub use sprite::{quad_indices, SpriteBatch, SpriteBits, SpriteDraw, SpriteFlags, SpriteVertex};
pub use text::{GlyphInfo, GlyphVertex, TextBatch, FONT_SLOTS};

use crate::device::RenderBackend;

/// Which batch receives draws. The compositor keeps at most one active.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BatchKind {
    Sprite,
    Text,
}

/// Why a flush happened.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FlushCause {
    /// The batch was full.
    Capacity,
    /// A sampler pool ran out of slots mid-primitive.
    SamplerExhausted,
    /// The other batch kind was requested.
    KindSwitch,
    /// Before or after a primitive that must not reach the id layer.
    SkipId,
    /// The scissor rectangle changed.
    Scissor,
    /// A glyph page was replaced while glyphs referencing it were pending.
    FontPage,
    Pause,
    EndOfFrame,
}

impl FlushCause {
    pub const COUNT: usize = 8;

    pub const ALL: [FlushCause; Self::COUNT] = [
        FlushCause::Capacity,
        FlushCause::SamplerExhausted,
        FlushCause::KindSwitch,
        FlushCause::SkipId,
        FlushCause::Scissor,
        FlushCause::FontPage,
        FlushCause::Pause,
        FlushCause::EndOfFrame,
    ];

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

/// Flush tally per cause.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FlushCounts([u32; FlushCause::COUNT]);

impl FlushCounts {
    #[inline]
    pub fn record(&mut self, cause: FlushCause) {
        self.0[cause.index()] += 1;
    }

    #[inline]
    pub fn get(&self, cause: FlushCause) -> u32 {
        self.0[cause.index()]
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Adds `other` cause by cause.
    pub fn merge(&mut self, other: &FlushCounts) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += *b;
        }
    }

    /// Keeps the larger count for every cause.
    pub fn max_with(&mut self, other: &FlushCounts) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a = (*a).max(*b);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (FlushCause, u32)> + '_ {
        FlushCause::ALL.iter().map(|&c| (c, self.get(c)))
    }
}

/// Counters a batch accumulates between two `take_stats` calls.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub draw_calls: u32,
    pub flushes: FlushCounts,
}

/// Common surface of the two batch kinds, used by the compositor to flush
/// whichever one is active.
pub trait Batch<B: RenderBackend> {
    fn pending(&self) -> usize;

    /// Uploads and draws pending primitives. Returns `false` when nothing was pending.
    fn flush(&mut self, backend: &mut B, cause: FlushCause) -> bool;

    /// Returns and resets the counters.
    fn take_stats(&mut self) -> BatchStats;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_track_causes_independently() {
        let mut c = FlushCounts::default();
        c.record(FlushCause::Capacity);
        c.record(FlushCause::Capacity);
        c.record(FlushCause::KindSwitch);
        assert_eq!(c.get(FlushCause::Capacity), 2);
        assert_eq!(c.get(FlushCause::KindSwitch), 1);
        assert_eq!(c.total(), 3);
    }

    #[test]
    fn max_with_is_per_cause() {
        let mut a = FlushCounts::default();
        a.record(FlushCause::Capacity);
        let mut b = FlushCounts::default();
        b.record(FlushCause::Scissor);
        b.record(FlushCause::Scissor);
        a.max_with(&b);
        assert_eq!(a.get(FlushCause::Capacity), 1);
        assert_eq!(a.get(FlushCause::Scissor), 2);
    }
}
