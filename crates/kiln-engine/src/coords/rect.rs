use super::Vec2;

/// Axis-aligned rectangle stored as min/max bounds in surface pixels.
///
/// `min` is the top-left corner, `max` the bottom-right one. A rect is valid
/// when both bounds are finite and `max` lies strictly past `min` on both axes.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min: Vec2::new(min_x, min_y),
            max: Vec2::new(max_x, max_y),
        }
    }

    #[inline]
    pub const fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    /// Rect of `size` centred on `center`.
    #[inline]
    pub fn centered(center: Vec2, size: Vec2) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    #[inline]
    pub fn width(self) -> f32 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(self) -> f32 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn center(self) -> Vec2 {
        Vec2::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.max.x > self.min.x && self.max.y > self.min.y
    }

    /// Half-open containment: [min, max).
    #[inline]
    pub fn contains(self, p: Vec2) -> bool {
        p.x >= self.min.x && p.y >= self.min.y && p.x < self.max.x && p.y < self.max.y
    }

    /// Overlap of two rects, `None` when they only touch or are disjoint.
    #[inline]
    pub fn intersect(self, other: Rect) -> Option<Rect> {
        let r = Rect::new(
            self.min.x.max(other.min.x),
            self.min.y.max(other.min.y),
            self.max.x.min(other.max.x),
            self.max.y.min(other.max.y),
        );
        r.is_valid().then_some(r)
    }

    /// Corners in quad order: top-left, top-right, bottom-right, bottom-left.
    #[inline]
    pub fn corners(self) -> [Vec2; 4] {
        [
            self.min,
            Vec2::new(self.max.x, self.min.y),
            self.max,
            Vec2::new(self.min.x, self.max.y),
        ]
    }

    /// Corners (same order as [`corners`](Self::corners)) rotated by `radians`
    /// around the rect centre.
    pub fn rotated_corners(self, radians: f32) -> [Vec2; 4] {
        let c = self.center();
        let (sin, cos) = radians.sin_cos();
        self.corners().map(|p| (p - c).rotated(sin, cos) + c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect { Rect::from_xywh(x, y, w, h) }

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a.x - b.x).abs() < 1e-4 && (a.y - b.y).abs() < 1e-4
    }

    // ── validity ──────────────────────────────────────────────────────────

    #[test]
    fn zero_area_is_invalid() {
        assert!(!r(0.0, 0.0, 0.0, 5.0).is_valid());
        assert!(!r(0.0, 0.0, 5.0, 0.0).is_valid());
    }

    #[test]
    fn nan_bounds_are_invalid() {
        assert!(!Rect::new(f32::NAN, 0.0, 1.0, 1.0).is_valid());
    }

    #[test]
    fn centered_has_requested_size() {
        let rect = Rect::centered(Vec2::new(10.0, 10.0), Vec2::new(4.0, 2.0));
        assert_eq!(rect, Rect::new(8.0, 9.0, 12.0, 11.0));
        assert_eq!(rect.center(), Vec2::new(10.0, 10.0));
    }

    // ── contains ──────────────────────────────────────────────────────────

    #[test]
    fn contains_min_edge_but_not_max_edge() {
        let rect = r(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains(Vec2::new(0.0, 0.0)));
        assert!(!rect.contains(Vec2::new(10.0, 10.0)));
    }

    // ── intersect ─────────────────────────────────────────────────────────

    #[test]
    fn intersect_overlapping() {
        let a = r(0.0, 0.0, 10.0, 10.0);
        let b = r(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersect(b), Some(r(5.0, 5.0, 5.0, 5.0)));
    }

    #[test]
    fn intersect_touching_edge_returns_none() {
        let a = r(0.0, 0.0, 10.0, 10.0);
        let b = r(10.0, 0.0, 10.0, 10.0);
        assert!(a.intersect(b).is_none());
    }

    // ── corners ───────────────────────────────────────────────────────────

    #[test]
    fn zero_rotation_keeps_corners() {
        let rect = r(2.0, 3.0, 4.0, 6.0);
        let plain = rect.corners();
        let rotated = rect.rotated_corners(0.0);
        for (a, b) in plain.iter().zip(rotated.iter()) {
            assert!(approx(*a, *b));
        }
    }

    #[test]
    fn half_turn_swaps_opposite_corners() {
        let rect = r(0.0, 0.0, 4.0, 2.0);
        let c = rect.rotated_corners(core::f32::consts::PI);
        assert!(approx(c[0], rect.max));
        assert!(approx(c[2], rect.min));
    }
}
