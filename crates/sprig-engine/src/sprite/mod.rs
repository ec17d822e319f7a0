//! Textured sprites: geometry, draw parameters and the sprite registry.

pub mod geometry;

mod draw;
mod params;
mod registry;

pub use draw::{draw, draw_frame, model_matrix};
pub use geometry::{GeometryError, SpriteVertex, VertexBuffer};
pub use params::DrawParams;
pub use registry::SpriteRegistry;

use crate::gfx::{GraphicsBackend, VertexArrayId};
use crate::texture::{Texture, TextureError};

#[derive(Debug, thiserror::Error)]
pub enum SpriteError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Texture(#[from] TextureError),
}

/// A texture paired with the uploaded quads that display it.
#[derive(Debug)]
pub struct Sprite {
    key: String,
    texture: Texture,
    vertex_array: VertexArrayId,
    frames: u32,
    frames_per_line: u32,
    width: u32,
    height: u32,
}

impl Sprite {
    /// Builds geometry for `texture` and uploads it as a vertex array.
    ///
    /// `frames == 0` displays the whole texture; otherwise the texture is cut
    /// into `frames` cells of `width` x `height`, `frames_per_line` per row.
    pub fn new<B>(
        backend: &mut B,
        key: impl Into<String>,
        texture: Texture,
        width: u32,
        height: u32,
        frames: u32,
        frames_per_line: u32,
    ) -> Result<Self, GeometryError>
    where
        B: GraphicsBackend + ?Sized,
    {
        let (image_width, image_height) = (texture.width(), texture.height());
        let geometry =
            geometry::build(image_width, image_height, width, height, frames, frames_per_line)?;
        let vertex_array = backend.create_vertex_array(geometry.vertices());

        Ok(Self {
            key: key.into(),
            texture,
            vertex_array,
            frames: geometry.frame_count(),
            frames_per_line,
            width,
            height,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn vertex_array(&self) -> VertexArrayId {
        self.vertex_array
    }

    /// Number of sheet frames; 0 for a single whole-image quad.
    pub fn frame_count(&self) -> u32 {
        self.frames
    }

    pub fn frames_per_line(&self) -> u32 {
        self.frames_per_line
    }

    /// Display size in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether this sprite was built with the given display size and layout.
    pub(crate) fn matches(
        &self,
        width: u32,
        height: u32,
        frames: u32,
        frames_per_line: u32,
    ) -> bool {
        self.width == width
            && self.height == height
            && self.frames == frames
            && (frames == 0 || self.frames_per_line == frames_per_line)
    }
}
