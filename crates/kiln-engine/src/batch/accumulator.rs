use bytemuck::Pod;

/// Fixed-capacity vertex scratch buffer.
///
/// Invariants:
/// - `pending <= capacity`
/// - the scratch storage is allocated once; `reset` clears it in place
#[derive(Debug)]
pub struct BatchAccumulator<V: Pod> {
    capacity: usize,
    vertices_per_primitive: usize,
    pending: usize,
    scratch: Vec<V>,
}

impl<V: Pod> BatchAccumulator<V> {
    pub fn new(capacity: usize, vertices_per_primitive: usize) -> Self {
        Self {
            capacity,
            vertices_per_primitive,
            pending: 0,
            scratch: Vec::with_capacity(capacity * vertices_per_primitive),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn vertices_per_primitive(&self) -> usize {
        self.vertices_per_primitive
    }

    /// Primitives appended since the last reset.
    #[inline]
    pub fn pending(&self) -> usize {
        self.pending
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.pending >= self.capacity
    }

    /// Appends one primitive. The caller flushes before calling this on a full batch.
    pub fn push(&mut self, vertices: &[V]) {
        debug_assert_eq!(vertices.len(), self.vertices_per_primitive);
        debug_assert!(!self.is_full(), "push into a full batch");
        self.scratch.extend_from_slice(vertices);
        self.pending += 1;
    }

    #[inline]
    pub fn vertices(&self) -> &[V] {
        &self.scratch
    }

    /// Used region of the scratch buffer, ready for upload.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.scratch)
    }

    pub fn reset(&mut self) {
        self.scratch.clear();
        self.pending = 0;
    }

    /// Allocated scratch size in vertices.
    #[inline]
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_allocation() {
        let mut acc = BatchAccumulator::<[f32; 2]>::new(3, 4);
        let before = acc.scratch_capacity();
        for _ in 0..3 {
            acc.push(&[[0.0; 2]; 4]);
        }
        assert!(acc.is_full());
        assert_eq!(acc.as_bytes().len(), 3 * 4 * 8);
        acc.reset();
        assert!(acc.is_empty());
        assert_eq!(acc.scratch_capacity(), before);
    }
}
