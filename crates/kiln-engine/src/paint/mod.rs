//! Per-primitive colour data.

mod color;

pub use color::Tint;
