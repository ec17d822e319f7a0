//! Procedural quad geometry for sprites and sprite sheets.
//!
//! Quads live in local pixel space with the origin at the top-left corner and
//! +Y down, matching the texture-coordinate origin. Each frame is two
//! triangles (six vertices); frames of a sheet share positions and differ only
//! in their uv rectangle.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};

/// Vertices emitted per frame (two triangles).
pub const VERTICES_PER_FRAME: u32 = 6;

/// Interleaved sprite vertex: position (z always 0 at build time) + uv.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl SpriteVertex {
    /// Number of `f32` components per vertex.
    pub const COMPONENTS: usize = 5;

    #[inline]
    const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self { position: [x, y, 0.0], uv: [u, v] }
    }
}

/// Invalid image or frame-grid parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("image has zero size ({width}x{height})")]
    ZeroImageSize { width: u32, height: u32 },
    #[error("sprite sheet with {frames} frames has zero frames per line")]
    ZeroFramesPerLine { frames: u32 },
}

/// CPU-side vertex data for one sprite.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBuffer {
    vertices: Vec<SpriteVertex>,
    frames: u32,
}

impl VertexBuffer {
    pub fn vertices(&self) -> &[SpriteVertex] {
        &self.vertices
    }

    /// Frame count as requested at build time (0 for an unsplit sprite).
    pub fn frame_count(&self) -> u32 {
        self.frames
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Vertices of frame `index`, or `None` past the end.
    ///
    /// An unsplit sprite has a single frame at index 0.
    pub fn frame(&self, index: u32) -> Option<&[SpriteVertex]> {
        self.vertices.get(frame_range(index))
    }

    /// The buffer as flat `f32` components, `COMPONENTS` per vertex.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }
}

/// Vertex index range occupied by frame `index`.
#[inline]
pub fn frame_range(index: u32) -> Range<usize> {
    let per_frame = VERTICES_PER_FRAME as usize;
    let start = (index as usize).saturating_mul(per_frame);
    start..start.saturating_add(per_frame)
}

/// Builds the vertex buffer for a sprite of `display_width` x `display_height`
/// pixels cut from an image of `image_width` x `image_height` pixels.
///
/// With `frame_count == 0` the quad maps the whole image. Otherwise the image
/// is treated as a grid of `frames_per_line` columns of display-sized frames
/// and one quad is emitted per frame, in frame order.
pub fn build(
    image_width: u32,
    image_height: u32,
    display_width: u32,
    display_height: u32,
    frame_count: u32,
    frames_per_line: u32,
) -> Result<VertexBuffer, GeometryError> {
    if image_width == 0 || image_height == 0 {
        return Err(GeometryError::ZeroImageSize { width: image_width, height: image_height });
    }

    let w = display_width as f32;
    let h = display_height as f32;

    if frame_count == 0 {
        let vertices = quad(w, h, [0.0, 0.0], [1.0, 1.0]).to_vec();
        return Ok(VertexBuffer { vertices, frames: 0 });
    }

    if frames_per_line == 0 {
        return Err(GeometryError::ZeroFramesPerLine { frames: frame_count });
    }

    let frame_w = w / image_width as f32;
    let frame_h = h / image_height as f32;

    let mut vertices = Vec::with_capacity(frame_count as usize * VERTICES_PER_FRAME as usize);
    for i in 0..frame_count {
        let column = (i % frames_per_line) as f32;
        let row = (i / frames_per_line) as f32;
        let origin = [column * frame_w, row * frame_h];
        let extent = [origin[0] + frame_w, origin[1] + frame_h];
        vertices.extend_from_slice(&quad(w, h, origin, extent));
    }

    Ok(VertexBuffer { vertices, frames: frame_count })
}

/// Two triangles covering (0,0)-(w,h), uv mapped onto `uv_min`-`uv_max`.
fn quad(w: f32, h: f32, uv_min: [f32; 2], uv_max: [f32; 2]) -> [SpriteVertex; 6] {
    let [u0, v0] = uv_min;
    let [u1, v1] = uv_max;
    [
        SpriteVertex::new(w, h, u1, v1),
        SpriteVertex::new(0.0, 0.0, u0, v0),
        SpriteVertex::new(0.0, h, u0, v1),
        SpriteVertex::new(w, h, u1, v1),
        SpriteVertex::new(0.0, 0.0, u0, v0),
        SpriteVertex::new(w, 0.0, u1, v0),
    ]
}
