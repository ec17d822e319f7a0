//! Owning facade over a backend, its shader cache and its sprites.

use std::path::Path;
use std::rc::Rc;

use glam::Mat4;
use image::RgbaImage;

use crate::gfx::{GraphicsBackend, UniformLocation};
use crate::shader::{ShaderCache, ShaderError, ShaderProgram, ShaderSource, builtin};
use crate::sprite::{self, DrawParams, Sprite, SpriteError, SpriteRegistry};
use crate::texture::Texture;

/// Renderer construction options.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Register the `texture`, `color` and `sprite` programs.
    pub builtin_shaders: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self { builtin_shaders: true }
    }
}

pub struct Renderer<B: GraphicsBackend> {
    backend: B,
    shaders: ShaderCache,
    sprites: SpriteRegistry,
}

impl<B: GraphicsBackend> Renderer<B> {
    pub fn new(backend: B, config: RendererConfig) -> Result<Self, ShaderError> {
        let mut shaders = ShaderCache::new();
        if config.builtin_shaders {
            builtin::register_builtin(&mut shaders)?;
        }
        Ok(Self { backend, shaders, sprites: SpriteRegistry::new() })
    }

    pub fn register_shader(&mut self, source: ShaderSource) -> Result<(), ShaderError> {
        self.shaders.register(source)
    }

    pub fn replace_shader(&mut self, source: ShaderSource) {
        self.shaders.replace(&mut self.backend, source);
    }

    /// Makes `name` current, compiling it on first use.
    pub fn activate(&mut self, name: &str) -> Result<&ShaderProgram, ShaderError> {
        self.shaders.activate(&mut self.backend, name)
    }

    pub fn active_shader(&self) -> Option<&ShaderProgram> {
        self.shaders.active()
    }

    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.shaders.uniform_location(name)
    }

    /// Writes a matrix uniform on the active program.
    ///
    /// Returns `false` if there is no active program or it does not expose `name`.
    pub fn set_uniform_mat4(&mut self, name: &str, value: &Mat4) -> bool {
        match self.shaders.uniform_location(name) {
            Some(location) => {
                self.backend.set_uniform_mat4(location, value);
                true
            }
            None => false,
        }
    }

    /// Vector counterpart of [`set_uniform_mat4`](Self::set_uniform_mat4).
    pub fn set_uniform_vec4(&mut self, name: &str, value: [f32; 4]) -> bool {
        match self.shaders.uniform_location(name) {
            Some(location) => {
                self.backend.set_uniform_vec4(location, value);
                true
            }
            None => false,
        }
    }

    /// Single-quad sprite showing the whole image at `path`.
    pub fn load_sprite(
        &mut self,
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
    ) -> Result<Rc<Sprite>, SpriteError> {
        self.load_sheet(path, width, height, 0, 0)
    }

    /// Sprite sheet cut from the image at `path`, decoded on first use.
    pub fn load_sheet(
        &mut self,
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
        frames: u32,
        frames_per_line: u32,
    ) -> Result<Rc<Sprite>, SpriteError> {
        let path = path.as_ref();
        let key = path.to_string_lossy();
        self.sprites.get_or_create(
            &mut self.backend,
            &key,
            width,
            height,
            frames,
            frames_per_line,
            |backend| Texture::load(backend, path),
        )
    }

    /// Sprite backed by an in-memory image, cached under `key`.
    pub fn sprite_from_image(
        &mut self,
        key: &str,
        image: &RgbaImage,
        width: u32,
        height: u32,
        frames: u32,
        frames_per_line: u32,
    ) -> Result<Rc<Sprite>, SpriteError> {
        self.sprites.get_or_create(
            &mut self.backend,
            key,
            width,
            height,
            frames,
            frames_per_line,
            |backend| Texture::from_image(backend, image),
        )
    }

    pub fn draw(&mut self, sprite: &Sprite, params: &DrawParams) {
        sprite::draw(&mut self.backend, &self.shaders, sprite, params);
    }

    pub fn draw_frame(&mut self, sprite: &Sprite, params: &DrawParams) {
        sprite::draw_frame(&mut self.backend, &self.shaders, sprite, params);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn shaders(&self) -> &ShaderCache {
        &self.shaders
    }

    pub fn sprites(&self) -> &SpriteRegistry {
        &self.sprites
    }
}
