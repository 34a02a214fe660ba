use crate::device::{ImageId, PixelFormat};

/// Number of colour slots on a render surface.
pub const MAX_ATTACHMENTS: usize = 4;

/// Fixed meaning of each colour slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SurfaceRole {
    Diffuse,
    Normals,
    Emissive,
    /// Integer layer holding the pick id of the topmost pickable primitive.
    PixelId,
}

impl SurfaceRole {
    pub const ALL: [SurfaceRole; MAX_ATTACHMENTS] = [
        SurfaceRole::Diffuse,
        SurfaceRole::Normals,
        SurfaceRole::Emissive,
        SurfaceRole::PixelId,
    ];

    #[inline]
    pub const fn slot(self) -> usize {
        match self {
            SurfaceRole::Diffuse => 0,
            SurfaceRole::Normals => 1,
            SurfaceRole::Emissive => 2,
            SurfaceRole::PixelId => 3,
        }
    }

    #[inline]
    pub const fn format(self) -> PixelFormat {
        match self {
            SurfaceRole::PixelId => PixelFormat::R32Uint,
            _ => PixelFormat::Rgba8Unorm,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            SurfaceRole::Diffuse => "kiln surface diffuse",
            SurfaceRole::Normals => "kiln surface normals",
            SurfaceRole::Emissive => "kiln surface emissive",
            SurfaceRole::PixelId => "kiln surface pixel id",
        }
    }

    pub fn from_slot(slot: usize) -> Option<SurfaceRole> {
        Self::ALL.get(slot).copied()
    }
}

/// Image bound to one surface slot.
///
/// Owned attachments are destroyed by the surface on resize and on
/// [`RenderSurface::destroy`](super::RenderSurface::destroy).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub image: ImageId,
    pub owned: bool,
}
