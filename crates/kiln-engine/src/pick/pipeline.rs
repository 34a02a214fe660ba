use crate::device::{DeviceError, FenceId, FenceStatus, ImageId, ReadbackId, RenderBackend};

/// Readback progress.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PickState {
    /// No fence outstanding.
    Idle,
    /// `fence` guards the copy into `buffers[buffer]`.
    Pending { fence: FenceId, buffer: usize },
}

/// Double-buffered, fence-synchronized readback of one id-layer pixel.
///
/// Invariants:
/// - at most one fence is outstanding
/// - `value` only ever comes from a buffer whose fence was observed signaled
/// - the fenced buffer is never the target of a new copy
#[derive(Debug)]
pub struct PixelPickPipeline {
    buffers: [ReadbackId; 2],
    ping: usize,
    state: PickState,
    value: u32,
    resolved: u64,
}

impl PixelPickPipeline {
    pub fn new<B: RenderBackend>(backend: &mut B) -> Result<Self, DeviceError> {
        let buffers = [backend.create_readback()?, backend.create_readback()?];
        Ok(Self {
            buffers,
            ping: 0,
            state: PickState::Idle,
            value: 0,
            resolved: 0,
        })
    }

    /// Last resolved pixel value.
    #[inline]
    pub fn value(&self) -> u32 {
        self.value
    }

    #[inline]
    pub fn state(&self) -> PickState {
        self.state
    }

    /// Completed readbacks so far, failed maps included.
    #[inline]
    pub fn resolved_count(&self) -> u64 {
        self.resolved
    }

    /// Advances the state machine by one step and schedules the next copy of
    /// `(x, y)` from `source`.
    pub fn poll<B: RenderBackend>(&mut self, backend: &mut B, source: ImageId, x: u32, y: u32) {
        match self.state {
            PickState::Idle => self.issue(backend, source, x, y),
            PickState::Pending { fence, buffer } => match backend.fence_status(fence) {
                FenceStatus::Unsignaled => {
                    // Keep the GPU fed with the spare buffer; never touch the fenced one.
                    backend.copy_pixel(source, x, y, self.buffers[1 - buffer]);
                }
                FenceStatus::Signaled => {
                    match backend.read_pixel(self.buffers[buffer]) {
                        Some(v) => self.value = v,
                        None => log::debug!("pick readback map failed; keeping {}", self.value),
                    }
                    backend.release_fence(fence);
                    self.resolved += 1;
                    self.state = PickState::Idle;
                    self.ping = 1 - buffer;
                    self.issue(backend, source, x, y);
                }
            },
        }
    }

    fn issue<B: RenderBackend>(&mut self, backend: &mut B, source: ImageId, x: u32, y: u32) {
        let buffer = self.ping;
        backend.copy_pixel(source, x, y, self.buffers[buffer]);
        let fence = backend.insert_fence(self.buffers[buffer]);
        self.state = PickState::Pending { fence, buffer };
    }

    /// Replaces both readback buffers, e.g. after the surface was resized.
    /// The last resolved value is kept.
    pub fn reallocate<B: RenderBackend>(&mut self, backend: &mut B) -> Result<(), DeviceError> {
        let fresh = [backend.create_readback()?, backend.create_readback()?];
        self.release(backend);
        self.buffers = fresh;
        self.ping = 0;
        log::debug!("pick readback buffers reallocated");
        Ok(())
    }

    /// Releases the fence and both buffers.
    pub fn destroy<B: RenderBackend>(mut self, backend: &mut B) {
        self.release(backend);
    }

    fn release<B: RenderBackend>(&mut self, backend: &mut B) {
        if let PickState::Pending { fence, .. } = self.state {
            backend.release_fence(fence);
        }
        self.state = PickState::Idle;
        for b in self.buffers {
            backend.destroy_readback(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Command, HeadlessBackend, ImageDesc, PixelFormat};

    fn setup() -> (HeadlessBackend, PixelPickPipeline, ImageId) {
        let mut b = HeadlessBackend::new();
        let img = b.create_image(&ImageDesc::new(4, 4, PixelFormat::R32Uint)).unwrap();
        let p = PixelPickPipeline::new(&mut b).unwrap();
        (b, p, img)
    }

    fn copies_into(b: &HeadlessBackend, rb: ReadbackId) -> usize {
        b.count(|c| matches!(c, Command::CopyPixel { dst, .. } if *dst == rb))
    }

    #[test]
    fn idle_poll_issues_copy_and_fence() {
        let (mut b, mut p, img) = setup();
        p.poll(&mut b, img, 1, 2);
        assert!(matches!(p.state(), PickState::Pending { buffer: 0, .. }));
        assert_eq!(b.outstanding_fences(), 1);
        assert_eq!(p.value(), 0);
    }

    #[test]
    fn unsignaled_poll_copies_into_spare_buffer() {
        let (mut b, mut p, img) = setup();
        b.stall_fences = true;
        p.poll(&mut b, img, 0, 0);
        let fenced = p.buffers[0];
        let spare = p.buffers[1];
        p.poll(&mut b, img, 0, 0);
        p.poll(&mut b, img, 0, 0);

        assert_eq!(copies_into(&b, fenced), 1);
        assert_eq!(copies_into(&b, spare), 2);
        assert_eq!(b.outstanding_fences(), 1);
    }

    #[test]
    fn signaled_poll_reads_and_reissues() {
        let (mut b, mut p, img) = setup();
        b.stage_id_pixel(0);
        p.poll(&mut b, img, 0, 0);
        b.submit();

        p.poll(&mut b, img, 0, 0);
        assert_eq!(p.resolved_count(), 1);
        assert!(matches!(p.state(), PickState::Pending { buffer: 1, .. }));
        assert_eq!(b.outstanding_fences(), 1);
    }

    #[test]
    fn stalled_gpu_keeps_last_value() {
        let (mut b, mut p, img) = setup();
        p.value = 42;
        b.stall_fences = true;
        for _ in 0..10 {
            p.poll(&mut b, img, 0, 0);
            b.submit();
        }
        assert_eq!(p.value(), 42);
        assert_eq!(p.resolved_count(), 0);
    }

    #[test]
    fn failed_map_keeps_last_value() {
        let (mut b, mut p, img) = setup();
        p.value = 7;
        p.poll(&mut b, img, 0, 0);
        b.submit();
        b.fail_next_map();
        p.poll(&mut b, img, 0, 0);
        assert_eq!(p.value(), 7);
        assert_eq!(p.resolved_count(), 1);
    }

    #[test]
    fn reallocate_keeps_value_and_drops_fence() {
        let (mut b, mut p, img) = setup();
        p.value = 9;
        p.poll(&mut b, img, 0, 0);
        p.reallocate(&mut b).unwrap();
        assert_eq!(p.value(), 9);
        assert_eq!(p.state(), PickState::Idle);
        assert_eq!(b.outstanding_fences(), 0);
        assert_eq!(b.live_readbacks(), 2);
    }
}
