use crate::device::ImageId;

/// Hard ceiling on sampler slots per channel. Slot index 15 is the "no image" marker.
pub const MAX_SAMPLER_SLOTS: usize = 15;

/// Slot index as packed into vertex data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SamplerSlot(u8);

impl SamplerSlot {
    /// No image bound; shaders skip sampling.
    pub const NONE: SamplerSlot = SamplerSlot(MAX_SAMPLER_SLOTS as u8);

    #[inline]
    pub const fn index(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 as usize == MAX_SAMPLER_SLOTS
    }
}

/// Multiplexes an unbounded set of images onto a fixed number of sampler
/// slots for one accumulation cycle.
///
/// `assign` never flushes on its own; `None` tells the caller to flush and
/// retry. The scan is linear because the budget is tiny.
#[derive(Debug, Clone)]
pub struct SamplerSlotAllocator {
    budget: usize,
    slots: [Option<ImageId>; MAX_SAMPLER_SLOTS],
    next: usize,
    last: Option<(ImageId, SamplerSlot)>,
}

impl SamplerSlotAllocator {
    /// `budget` is clamped to `1..=MAX_SAMPLER_SLOTS`.
    pub fn new(budget: usize) -> Self {
        Self {
            budget: budget.clamp(1, MAX_SAMPLER_SLOTS),
            slots: [None; MAX_SAMPLER_SLOTS],
            next: 0,
            last: None,
        }
    }

    #[inline]
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Slots in use this cycle.
    #[inline]
    pub fn used(&self) -> usize {
        self.next
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.next == 0
    }

    /// Slot holding `image`, binding it to a free slot if needed.
    /// `None` when every slot is taken by other images.
    pub fn assign(&mut self, image: ImageId) -> Option<SamplerSlot> {
        if let Some((cached, slot)) = self.last {
            if cached == image {
                return Some(slot);
            }
        }

        let slot = match self.slots[..self.next].iter().position(|s| *s == Some(image)) {
            Some(i) => SamplerSlot(i as u8),
            None => {
                if self.next >= self.budget {
                    return None;
                }
                self.slots[self.next] = Some(image);
                self.next += 1;
                SamplerSlot((self.next - 1) as u8)
            }
        };

        self.last = Some((image, slot));
        Some(slot)
    }

    pub fn release_all(&mut self) {
        self.slots = [None; MAX_SAMPLER_SLOTS];
        self.next = 0;
        self.last = None;
    }

    /// Slot-to-image table, `budget` entries long.
    #[inline]
    pub fn bound(&self) -> &[Option<ImageId>] {
        &self.slots[..self.budget]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(n: u32) -> ImageId {
        ImageId::from_raw(n)
    }

    #[test]
    fn same_image_twice_gets_same_slot() {
        let mut a = SamplerSlotAllocator::new(4);
        let s1 = a.assign(img(7)).unwrap();
        let s2 = a.assign(img(7)).unwrap();
        assert_eq!(s1, s2);
        assert_eq!(a.used(), 1);
    }

    #[test]
    fn scan_finds_earlier_image_after_cache_moved() {
        let mut a = SamplerSlotAllocator::new(4);
        let first = a.assign(img(1)).unwrap();
        a.assign(img(2)).unwrap();
        assert_eq!(a.assign(img(1)), Some(first));
        assert_eq!(a.used(), 2);
    }

    #[test]
    fn full_allocator_reports_none_but_serves_bound_images() {
        let mut a = SamplerSlotAllocator::new(3);
        for n in 0..3 {
            assert_eq!(a.assign(img(n)).map(|s| s.index()), Some(n as u8));
        }
        assert_eq!(a.assign(img(99)), None);
        assert_eq!(a.assign(img(1)).map(|s| s.index()), Some(1));
    }

    #[test]
    fn release_frees_every_slot() {
        let mut a = SamplerSlotAllocator::new(MAX_SAMPLER_SLOTS);
        for n in 0..MAX_SAMPLER_SLOTS as u32 {
            a.assign(img(n));
        }
        assert!(a.assign(img(100)).is_none());
        a.release_all();
        assert!(a.is_empty());
        assert!(a.bound().iter().all(Option::is_none));
        assert_eq!(a.assign(img(100)).map(|s| s.index()), Some(0));
    }

    #[test]
    fn budget_is_clamped() {
        assert_eq!(SamplerSlotAllocator::new(0).budget(), 1);
        assert_eq!(SamplerSlotAllocator::new(64).budget(), MAX_SAMPLER_SLOTS);
    }

    #[test]
    fn none_slot_is_fifteen() {
        assert_eq!(SamplerSlot::NONE.index(), 15);
        assert!(SamplerSlot::NONE.is_none());
    }
}
