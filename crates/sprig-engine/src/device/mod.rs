//! Window surface, device and queue, plus per-frame acquire and present.

mod gpu;

pub use gpu::{FrameOutcome, Gpu, GpuInit};
