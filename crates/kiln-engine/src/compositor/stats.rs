use std::collections::VecDeque;

use crate::batch::{BatchStats, FlushCause, FlushCounts};

/// Counters for one frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub flushes: FlushCounts,
    /// Transitions between sprite and text batches.
    pub kind_switches: u32,
    /// `bind_surface` calls actually issued.
    pub surface_binds: u32,
    pub sprites: u32,
    pub glyphs: u32,
}

impl FrameStats {
    #[inline]
    pub fn flush_count(&self) -> u32 {
        self.flushes.total()
    }

    #[inline]
    pub fn flushes_for(&self, cause: FlushCause) -> u32 {
        self.flushes.get(cause)
    }

    pub(crate) fn absorb(&mut self, batch: &BatchStats) {
        self.draw_calls += batch.draw_calls;
        self.flushes.merge(&batch.flushes);
    }

    fn max_with(&mut self, other: &FrameStats) {
        self.draw_calls = self.draw_calls.max(other.draw_calls);
        self.flushes.max_with(&other.flushes);
        self.kind_switches = self.kind_switches.max(other.kind_switches);
        self.surface_binds = self.surface_binds.max(other.surface_binds);
        self.sprites = self.sprites.max(other.sprites);
        self.glyphs = self.glyphs.max(other.glyphs);
    }
}

/// Rolling window of completed frames with per-field maxima.
#[derive(Debug)]
pub struct StatsWindow {
    len: usize,
    frames: VecDeque<FrameStats>,
    peak: FrameStats,
}

impl StatsWindow {
    pub fn new(len: usize) -> Self {
        let len = len.max(1);
        Self {
            len,
            frames: VecDeque::with_capacity(len),
            peak: FrameStats::default(),
        }
    }

    pub fn push(&mut self, frame: FrameStats) {
        if self.frames.len() == self.len {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
        self.peak = self.frames.iter().fold(FrameStats::default(), |mut acc, f| {
            acc.max_with(f);
            acc
        });
    }

    /// Field-wise maxima over the window.
    #[inline]
    pub fn peak(&self) -> FrameStats {
        self.peak
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(draw_calls: u32, sprites: u32) -> FrameStats {
        FrameStats { draw_calls, sprites, ..Default::default() }
    }

    #[test]
    fn peak_is_fieldwise() {
        let mut w = StatsWindow::new(4);
        w.push(frame(5, 1));
        w.push(frame(2, 9));
        assert_eq!(w.peak().draw_calls, 5);
        assert_eq!(w.peak().sprites, 9);
    }

    #[test]
    fn old_frames_fall_out() {
        let mut w = StatsWindow::new(2);
        w.push(frame(10, 0));
        w.push(frame(1, 0));
        w.push(frame(2, 0));
        assert_eq!(w.len(), 2);
        assert_eq!(w.peak().draw_calls, 2);
    }
}
