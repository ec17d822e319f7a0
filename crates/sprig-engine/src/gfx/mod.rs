//! GPU command seam.
//!
//! The shader cache and the sprite pipeline never talk to wgpu directly; they
//! issue program, uniform, vertex-array, texture and draw commands through
//! [`GraphicsBackend`]. The model is a single current program plus bound
//! vertex array and texture, and uniform writes go to the program in use.
//!
//! Convention:
//! - every handle is an opaque `u32` newtype issued by the backend
//! - uniform setters target the program made current by `use_program`

use std::fmt;

use glam::Mat4;

use crate::sprite::SpriteVertex;

#[cfg(test)]
pub(crate) mod recording;
pub mod wgpu_backend;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

handle!(
    /// A compiled, not yet linked, shader stage.
    ShaderId
);
handle!(
    /// A linked program (vertex + fragment).
    ProgramId
);
handle!(
    /// Uploaded sprite vertices plus their attribute layout.
    VertexArrayId
);
handle!(
    /// A GPU texture.
    TextureId
);
handle!(
    /// Resolved location of a uniform inside one program.
    UniformLocation
);

/// Pipeline stage of a shader source.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Commands the rendering core issues to the GPU.
///
/// Compile and link failures are reported as the backend's diagnostic log.
/// Everything else is infallible from the caller's point of view: a backend
/// that cannot honour a command logs it and drops it.
pub trait GraphicsBackend {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String>;

    fn delete_shader(&mut self, shader: ShaderId);

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String>;

    fn delete_program(&mut self, program: ProgramId);

    /// Makes `program` current for subsequent uniform writes and draws.
    fn use_program(&mut self, program: ProgramId);

    /// Returns `None` when the program does not declare (or does not use) `name`.
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    fn set_uniform_mat4(&mut self, location: UniformLocation, value: &Mat4);

    fn set_uniform_vec4(&mut self, location: UniformLocation, value: [f32; 4]);

    fn create_vertex_array(&mut self, vertices: &[SpriteVertex]) -> VertexArrayId;

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId);

    /// `rgba` holds `width * height` straight-alpha RGBA8 texels, rows top to bottom.
    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureId;

    fn delete_texture(&mut self, texture: TextureId);

    fn bind_texture(&mut self, texture: TextureId);

    /// Draws `vertex_count` vertices of the bound vertex array as a triangle list,
    /// starting at `first_vertex`.
    fn draw_triangles(&mut self, first_vertex: u32, vertex_count: u32);
}
