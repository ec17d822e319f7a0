//! Sprig engine crate.
//!
//! Named shader programs compiled on first use, sprite-sheet geometry and a
//! sprite draw path, written against the [`gfx::GraphicsBackend`] seam. The
//! wgpu implementation of that seam lives in [`gfx::wgpu_backend`].

pub mod color;
pub mod device;
pub mod gfx;
pub mod logging;
pub mod renderer;
pub mod shader;
pub mod sprite;
pub mod texture;

pub use color::Color;
pub use renderer::{Renderer, RendererConfig};
