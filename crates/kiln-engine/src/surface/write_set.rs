use core::fmt;

/// Subset of attachment slots receiving fragment output, as a bitmask.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct WriteSet(u8);

impl WriteSet {
    pub const EMPTY: WriteSet = WriteSet(0);

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Slots `0..count`.
    #[inline]
    pub const fn first(count: usize) -> Self {
        if count >= 8 {
            Self(u8::MAX)
        } else {
            Self(((1u16 << count) - 1) as u8)
        }
    }

    pub fn from_slots(slots: &[usize]) -> Self {
        slots.iter().fold(Self::EMPTY, |ws, &s| ws.with(s))
    }

    /// Slots past 7 are ignored.
    #[inline]
    pub const fn with(self, slot: usize) -> Self {
        if slot < 8 { Self(self.0 | 1 << slot) } else { self }
    }

    #[inline]
    pub const fn without(self, slot: usize) -> Self {
        if slot < 8 { Self(self.0 & !(1 << slot)) } else { self }
    }

    #[inline]
    pub const fn contains(self, slot: usize) -> bool {
        slot < 8 && self.0 & (1 << slot) != 0
    }

    #[inline]
    pub const fn intersection(self, other: WriteSet) -> Self {
        Self(self.0 & other.0)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Slot indices in ascending order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..8).filter(move |&s| self.contains(s))
    }
}

impl fmt::Debug for WriteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
