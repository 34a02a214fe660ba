use crate::device::{ImageDesc, ImageId, RenderBackend, SurfaceBinding};

use super::{Attachment, SurfaceError, SurfaceRole, WriteSet, MAX_ATTACHMENTS};

/// Which surface generation the backend currently has bound.
///
/// Owned next to its one surface by whoever drives the backend. Anything that
/// rebinds the backend behind the tracker's back must call [`invalidate`](Self::invalidate).
#[derive(Debug, Default)]
pub struct BindTracker {
    current: Option<u64>,
    binds: u64,
}

impl BindTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the binding, e.g. after the backend was handed to someone else.
    pub fn invalidate(&mut self) {
        self.current = None;
    }

    pub fn is_bound(&self) -> bool {
        self.current.is_some()
    }

    /// Real `bind_surface` calls issued through this tracker.
    pub fn bind_count(&self) -> u64 {
        self.binds
    }
}

/// Off-screen target with one colour slot per [`SurfaceRole`].
///
/// Invariants:
/// - every attachment has the surface's dimensions
/// - a slot holds at most one image; replacing one needs an explicit detach
/// - the write set only names attached slots
#[derive(Debug)]
pub struct RenderSurface {
    generation: u64,
    width: u32,
    height: u32,
    slots: [Option<Attachment>; MAX_ATTACHMENTS],
    write_set: WriteSet,
    clear_color: [f32; 4],
    clear_mask: WriteSet,
}

impl RenderSurface {
    /// Creates a surface with an owned image for every role.
    pub fn new<B: RenderBackend>(
        backend: &mut B,
        width: u32,
        height: u32,
        clear_color: [f32; 4],
    ) -> Result<Self, SurfaceError> {
        if width == 0 || height == 0 {
            return Err(SurfaceError::ZeroSize { width, height });
        }

        let mut surface = Self {
            generation: 0,
            width,
            height,
            slots: [None; MAX_ATTACHMENTS],
            write_set: WriteSet::EMPTY,
            clear_color,
            clear_mask: WriteSet::first(MAX_ATTACHMENTS),
        };
        surface.create_owned(backend)?;
        surface.write_set = surface.default_write_set();
        Ok(surface)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bumped whenever the attachment set changes.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn attachment(&self, slot: usize) -> Option<Attachment> {
        self.slots.get(slot).copied().flatten()
    }

    pub fn image(&self, role: SurfaceRole) -> Option<ImageId> {
        self.attachment(role.slot()).map(|a| a.image)
    }

    #[inline]
    pub fn write_set(&self) -> WriteSet {
        self.write_set
    }

    /// Every attached slot.
    pub fn default_write_set(&self) -> WriteSet {
        (0..MAX_ATTACHMENTS)
            .filter(|&s| self.slots[s].is_some())
            .fold(WriteSet::EMPTY, WriteSet::with)
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn clear_mask(&self) -> WriteSet {
        self.clear_mask
    }

    /// Slots that `clear` is allowed to touch.
    pub fn set_clear_mask(&mut self, mask: WriteSet) {
        self.clear_mask = mask;
    }

    // ── attachments ───────────────────────────────────────────────────────

    /// Places `image` in `slot`. With `owned`, the surface destroys it on
    /// resize or teardown.
    pub fn attach<B: RenderBackend>(
        &mut self,
        backend: &B,
        image: ImageId,
        slot: usize,
        owned: bool,
    ) -> Result<(), SurfaceError> {
        let role = SurfaceRole::from_slot(slot).ok_or(SurfaceError::SlotOutOfRange { slot })?;
        if self.slots[slot].is_some() {
            return Err(SurfaceError::SlotOccupied { slot });
        }

        let info = backend
            .image_info(image)
            .ok_or(SurfaceError::UnknownImage(image))?;
        if !info.format.is_color() {
            return Err(SurfaceError::NotColorFormat {
                format: info.format,
            });
        }
        if info.format != role.format() {
            return Err(SurfaceError::FormatMismatch {
                slot,
                expected: role.format(),
                actual: info.format,
            });
        }
        if (info.width, info.height) != (self.width, self.height) {
            return Err(SurfaceError::DimensionMismatch {
                expected: (self.width, self.height),
                actual: (info.width, info.height),
            });
        }

        self.slots[slot] = Some(Attachment { image, owned });
        self.generation += 1;
        Ok(())
    }

    /// Removes the image in `slot` and drops it from the write set.
    ///
    /// The image is not destroyed; the returned attachment says whether the
    /// caller now owns it.
    pub fn detach(&mut self, slot: usize) -> Result<Attachment, SurfaceError> {
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(SurfaceError::SlotOutOfRange { slot })?;
        let attachment = entry.take().ok_or(SurfaceError::SlotEmpty { slot })?;
        self.write_set = self.write_set.without(slot);
        self.generation += 1;
        Ok(attachment)
    }

    // ── state ─────────────────────────────────────────────────────────────

    /// Makes this surface current on the backend. No-op when the tracker says
    /// it already is.
    pub fn bind<B: RenderBackend>(&self, backend: &mut B, tracker: &mut BindTracker) -> bool {
        if tracker.current == Some(self.generation) {
            return false;
        }

        let attachments = self.slots.map(|s| s.map(|a| a.image));
        backend.bind_surface(SurfaceBinding {
            attachments: &attachments,
            width: self.width,
            height: self.height,
        });
        backend.set_resolution(self.width, self.height);
        backend.set_write_set(self.write_set);

        tracker.current = Some(self.generation);
        tracker.binds += 1;
        log::trace!("bound surface gen {}", self.generation);
        true
    }

    /// Selects the slots receiving output. Returns whether anything changed.
    pub fn set_write_set<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        write_set: WriteSet,
    ) -> Result<bool, SurfaceError> {
        if let Some(slot) = write_set.iter().find(|&s| s >= MAX_ATTACHMENTS) {
            return Err(SurfaceError::SlotOutOfRange { slot });
        }
        if let Some(slot) = write_set.iter().find(|&s| self.slots[s].is_none()) {
            return Err(SurfaceError::SlotEmpty { slot });
        }
        if write_set == self.write_set {
            return Ok(false);
        }

        self.write_set = write_set;
        backend.set_write_set(write_set);
        Ok(true)
    }

    /// Clears the active write set, limited by the clear mask.
    pub fn clear<B: RenderBackend>(&self, backend: &mut B) {
        let slots = self.write_set.intersection(self.clear_mask);
        if !slots.is_empty() {
            backend.clear(slots, self.clear_color);
        }
    }

    /// Rebuilds every role at the new size and restores the default write set.
    ///
    /// External attachments are dropped from the surface and replaced by owned
    /// ones; their images stay alive.
    pub fn resize<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> Result<(), SurfaceError> {
        if width == 0 || height == 0 {
            return Err(SurfaceError::ZeroSize { width, height });
        }

        self.release(backend);
        self.width = width;
        self.height = height;
        self.generation += 1;
        self.create_owned(backend)?;
        self.write_set = self.default_write_set();

        log::debug!("surface resized to {}x{}", width, height);
        Ok(())
    }

    /// Destroys owned attachments.
    pub fn destroy<B: RenderBackend>(mut self, backend: &mut B) {
        self.release(backend);
    }

    fn release<B: RenderBackend>(&mut self, backend: &mut B) {
        for (slot, entry) in self.slots.iter_mut().enumerate() {
            match entry.take() {
                Some(Attachment { image, owned: true }) => backend.destroy_image(image),
                Some(Attachment { image, owned: false }) => {
                    log::warn!("surface slot {slot} releases external image {image:?}");
                }
                None => {}
            }
        }
    }

    fn create_owned<B: RenderBackend>(&mut self, backend: &mut B) -> Result<(), SurfaceError> {
        for role in SurfaceRole::ALL {
            let desc = ImageDesc::new(self.width, self.height, role.format()).with_label(role.label());
            let image = backend.create_image(&desc)?;
            self.slots[role.slot()] = Some(Attachment { image, owned: true });
        }
        Ok(())
    }
}
