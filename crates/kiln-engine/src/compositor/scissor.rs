use crate::coords::Rect;
use crate::device::ScissorRect;

/// Nested clip rectangles in surface pixels.
///
/// The top is always the effective clip, already intersected with every
/// parent. A push without overlap stores a zero-area rect, which clips
/// everything until it is popped.
#[derive(Debug, Default)]
pub struct ScissorStack {
    stack: Vec<Rect>,
}

impl ScissorStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `rect` intersected with the current clip. Returns whether the
    /// resulting clip has any area.
    pub fn push(&mut self, rect: Rect) -> bool {
        let effective = match self.stack.last() {
            None if rect.is_valid() => rect,
            None => Rect::default(),
            Some(&parent) => parent.intersect(rect).unwrap_or_default(),
        };
        self.stack.push(effective);
        effective.is_valid()
    }

    /// `false` when the stack was already empty.
    pub fn pop(&mut self) -> bool {
        self.stack.pop().is_some()
    }

    #[inline]
    pub fn current(&self) -> Option<Rect> {
        self.stack.last().copied()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    /// Effective clip as whole pixels, clamped to the surface. Partially
    /// covered pixels are kept. `None` means unclipped.
    pub fn to_pixels(&self, width: u32, height: u32) -> Option<ScissorRect> {
        let r = self.current()?;
        let x = (r.min.x.floor().max(0.0) as u32).min(width);
        let y = (r.min.y.floor().max(0.0) as u32).min(height);
        let x2 = (r.max.x.ceil().max(0.0) as u32).min(width);
        let y2 = (r.max.y.ceil().max(0.0) as u32).min(height);
        Some(ScissorRect {
            x,
            y,
            width: x2.saturating_sub(x),
            height: y2.saturating_sub(y),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_push_intersects_parent() {
        let mut s = ScissorStack::new();
        assert!(s.push(Rect::from_xywh(0.0, 0.0, 100.0, 100.0)));
        assert!(s.push(Rect::from_xywh(50.0, 50.0, 100.0, 100.0)));
        assert_eq!(s.current(), Some(Rect::new(50.0, 50.0, 100.0, 100.0)));
        s.pop();
        assert_eq!(s.current(), Some(Rect::new(0.0, 0.0, 100.0, 100.0)));
    }

    #[test]
    fn disjoint_push_clips_everything() {
        let mut s = ScissorStack::new();
        s.push(Rect::from_xywh(0.0, 0.0, 10.0, 10.0));
        assert!(!s.push(Rect::from_xywh(20.0, 20.0, 10.0, 10.0)));
        assert_eq!(s.to_pixels(100, 100).map(|r| r.width * r.height), Some(0));
    }

    #[test]
    fn pixels_are_clamped_and_rounded_outward() {
        let mut s = ScissorStack::new();
        s.push(Rect::new(-5.0, 1.5, 80.2, 300.0));
        assert_eq!(
            s.to_pixels(64, 64),
            Some(ScissorRect { x: 0, y: 1, width: 64, height: 63 })
        );
    }

    #[test]
    fn pop_on_empty_reports_false() {
        let mut s = ScissorStack::new();
        assert!(!s.pop());
        assert_eq!(s.to_pixels(10, 10), None);
    }
}
