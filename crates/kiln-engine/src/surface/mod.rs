//! Multi-attachment off-screen render target.
//!
//! A [`RenderSurface`] owns up to [`MAX_ATTACHMENTS`] colour layers, one per
//! [`SurfaceRole`], and a [`WriteSet`] selecting which of them receive output.

mod attachment;
mod error;
mod render_surface;
mod write_set;

pub use attachment::{Attachment, SurfaceRole, MAX_ATTACHMENTS};
pub use error::SurfaceError;
pub use render_surface::{BindTracker, RenderSurface};
pub use write_set::WriteSet;
