/// Packed 8-bit RGBA tint, stored as `0xAABBGGRR`.
///
/// Invariant:
/// - Components are straight alpha. The shaders premultiply after sampling,
///   so a tint multiplies the sampled texel before blending.
///
/// The packed layout matches a little-endian `[r, g, b, a]` byte array, which
/// is what the vertex stage unpacks with `unpack4x8unorm`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Tint(pub u32);

impl Tint {
    pub const WHITE: Tint = Tint::from_rgba8(255, 255, 255, 255);
    pub const BLACK: Tint = Tint::from_rgba8(0, 0, 0, 255);
    pub const TRANSPARENT: Tint = Tint(0);

    /// Used for quads whose image was destroyed before the draw.
    pub const ERROR: Tint = Tint::from_rgba8(255, 0, 220, 255);

    #[inline]
    pub const fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self((r as u32) | (g as u32) << 8 | (b as u32) << 16 | (a as u32) << 24)
    }

    /// Quantizes straight `f32` components in `[0, 1]`. Out-of-range input is clamped.
    #[inline]
    pub fn from_rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::from_rgba8(quantize(r), quantize(g), quantize(b), quantize(a))
    }

    #[inline]
    pub const fn r(self) -> u8 {
        self.0 as u8
    }

    #[inline]
    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub const fn b(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    pub const fn a(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Same colour with alpha replaced.
    #[inline]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self(self.0 & 0x00FF_FFFF | (a as u32) << 24)
    }

    /// Unpacked straight `f32` components, as used for clear colours.
    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [
            self.r() as f32 / 255.0,
            self.g() as f32 / 255.0,
            self.b() as f32 / 255.0,
            self.a() as f32 / 255.0,
        ]
    }
}

impl Default for Tint {
    fn default() -> Self {
        Tint::WHITE
    }
}

#[inline]
fn quantize(v: f32) -> u8 {
    // NaN clamps to 0 through the `as` cast.
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_as_little_endian_rgba_bytes() {
        let t = Tint::from_rgba8(1, 2, 3, 4);
        assert_eq!(t.0.to_le_bytes(), [1, 2, 3, 4]);
        assert_eq!((t.r(), t.g(), t.b(), t.a()), (1, 2, 3, 4));
    }

    #[test]
    fn float_constructor_clamps_and_rounds() {
        let t = Tint::from_rgba(-1.0, 0.5, 2.0, f32::NAN);
        assert_eq!((t.r(), t.g(), t.b(), t.a()), (0, 128, 255, 0));
    }

    #[test]
    fn with_alpha_keeps_rgb() {
        let t = Tint::from_rgba8(10, 20, 30, 255).with_alpha(7);
        assert_eq!(t, Tint::from_rgba8(10, 20, 30, 7));
    }
}
