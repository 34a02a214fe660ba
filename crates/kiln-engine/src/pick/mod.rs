//! Asynchronous single-pixel readback of the pick id layer.
//!
//! The pipeline is polled once per frame and never waits on the GPU. The
//! value it reports lags the frame being recorded by one or two submissions.

mod pipeline;

pub use pipeline::{PickState, PixelPickPipeline};
