use crate::batch::MAX_SAMPLER_SLOTS;
use crate::paint::Tint;

/// Largest sprite capacity whose quad indices still fit in `u16`.
const MAX_SPRITE_CAPACITY: usize = (u16::MAX as usize + 1) / 4;

/// Compositor sizing and defaults.
///
/// Keep this structure flat; every field has a working default.
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    /// Quads per sprite draw call.
    pub sprite_capacity: usize,

    /// Glyphs per text draw call.
    pub text_capacity: usize,

    /// Sampler slots per channel and draw call, at most 15.
    pub sampler_budget: usize,

    /// Straight-alpha clear colour for the colour layers.
    pub clear_color: Tint,

    /// Frames covered by [`peak_stats`](super::FrameCompositor::peak_stats).
    pub stats_window: usize,

    /// Set the pixel-art antialiasing flag on every sprite.
    pub pixel_art_antialiasing: bool,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            sprite_capacity: 512,
            text_capacity: 2048,
            sampler_budget: MAX_SAMPLER_SLOTS,
            clear_color: Tint::TRANSPARENT,
            stats_window: 60,
            pixel_art_antialiasing: false,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be at least 1")]
    Zero(&'static str),

    #[error("sprite capacity {0} exceeds the 16-bit index range (max 16384)")]
    SpriteCapacity(usize),

    #[error("sampler budget {0} exceeds 15")]
    SamplerBudget(usize),
}

impl CompositorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sprite_capacity == 0 {
            return Err(ConfigError::Zero("sprite_capacity"));
        }
        if self.sprite_capacity > MAX_SPRITE_CAPACITY {
            return Err(ConfigError::SpriteCapacity(self.sprite_capacity));
        }
        if self.text_capacity == 0 {
            return Err(ConfigError::Zero("text_capacity"));
        }
        if self.sampler_budget == 0 {
            return Err(ConfigError::Zero("sampler_budget"));
        }
        if self.sampler_budget > MAX_SAMPLER_SLOTS {
            return Err(ConfigError::SamplerBudget(self.sampler_budget));
        }
        if self.stats_window == 0 {
            return Err(ConfigError::Zero("stats_window"));
        }
        Ok(())
    }
}
