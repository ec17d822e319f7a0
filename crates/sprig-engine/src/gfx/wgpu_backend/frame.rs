//! Draw recording between flushes.
//!
//! wgpu encodes work into render passes, while the backend contract is
//! immediate: a draw uses whatever uniform values are current when it is
//! issued. Each recorded draw therefore snapshots the current program's
//! uniform bytes into a frame-wide staging area. On flush the staging area is
//! uploaded once and every draw selects its snapshot through dynamic offsets.

use crate::gfx::{ProgramId, TextureId, VertexArrayId};

/// Smallest arena allocation; also keeps the buffer non-empty.
const MIN_ARENA_SIZE: u64 = 4096;

#[derive(Debug)]
pub(super) struct DrawCall {
    pub program: ProgramId,
    pub vertex_array: VertexArrayId,
    pub texture: TextureId,
    pub first_vertex: u32,
    pub vertex_count: u32,
    /// One dynamic offset per uniform slot, in binding order.
    pub offsets: Vec<u32>,
}

#[derive(Debug)]
pub(super) struct FrameRecorder {
    alignment: u32,
    bytes: Vec<u8>,
    pub draws: Vec<DrawCall>,
}

impl FrameRecorder {
    pub fn new(alignment: u32) -> Self {
        Self { alignment: alignment.max(1), bytes: Vec::new(), draws: Vec::new() }
    }

    /// Appends uniform snapshots and returns their offsets.
    pub fn push_uniforms(&mut self, values: &[Vec<u8>]) -> Vec<u32> {
        values
            .iter()
            .map(|value| {
                let offset = align_up(self.bytes.len(), self.alignment as usize);
                self.bytes.resize(offset, 0);
                self.bytes.extend_from_slice(value);
                offset as u32
            })
            .collect()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.draws.clear();
    }
}

#[inline]
fn align_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

/// Uniform buffer shared by every program's bind group.
///
/// `generation` changes whenever the buffer is reallocated; bind groups built
/// against an older generation must be rebuilt.
#[derive(Debug, Default)]
pub(super) struct UniformArena {
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
    generation: u64,
}

impl UniformArena {
    /// Uploads `bytes` at offset 0, growing the buffer first if needed.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
    ) -> (wgpu::Buffer, u64) {
        let needed = (bytes.len() as u64).max(MIN_ARENA_SIZE);

        let buffer = match &self.buffer {
            Some(buffer) if needed <= self.capacity => buffer.clone(),
            _ => {
                let capacity = needed.next_power_of_two();
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("sprig uniform arena"),
                    size: capacity,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                log::debug!("uniform arena resized to {capacity} bytes");
                self.capacity = capacity;
                self.generation += 1;
                self.buffer = Some(buffer.clone());
                buffer
            }
        };

        if !bytes.is_empty() {
            queue.write_buffer(&buffer, 0, bytes);
        }

        (buffer, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_are_aligned() {
        let mut frame = FrameRecorder::new(256);
        let first = frame.push_uniforms(&[vec![1; 64], vec![2; 16]]);
        assert_eq!(first, [0, 256]);
        let second = frame.push_uniforms(&[vec![3; 64]]);
        assert_eq!(second, [512]);
        assert_eq!(frame.bytes().len(), 512 + 64);
        assert_eq!(frame.bytes()[256], 2);
    }

    #[test]
    fn snapshots_keep_values_at_push_time() {
        let mut frame = FrameRecorder::new(16);
        let mut color = vec![0u8; 16];
        let a = frame.push_uniforms(std::slice::from_ref(&color))[0] as usize;
        color.fill(7);
        let b = frame.push_uniforms(std::slice::from_ref(&color))[0] as usize;
        assert_eq!(frame.bytes()[a], 0);
        assert_eq!(frame.bytes()[b], 7);
    }

    #[test]
    fn clear_resets_staging() {
        let mut frame = FrameRecorder::new(256);
        frame.push_uniforms(&[vec![1; 64]]);
        frame.clear();
        assert!(frame.bytes().is_empty());
        assert!(frame.is_empty());
        assert_eq!(frame.push_uniforms(&[vec![1; 16]]), [0]);
    }

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }
}
