use std::collections::HashMap;
use std::rc::Rc;

use crate::gfx::GraphicsBackend;
use crate::texture::{Texture, TextureError};

use super::{Sprite, SpriteError};

/// Sprites keyed by source (usually the image path), built once and shared.
#[derive(Debug, Default)]
pub struct SpriteRegistry {
    sprites: HashMap<String, Rc<Sprite>>,
}

impl SpriteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sprite cached under `key`, building it on first request.
    ///
    /// `load_texture` only runs on a miss. A hit with a different display size
    /// or sheet layout still returns the cached sprite.
    #[allow(clippy::too_many_arguments)]
    pub fn get_or_create<B, F>(
        &mut self,
        backend: &mut B,
        key: &str,
        width: u32,
        height: u32,
        frames: u32,
        frames_per_line: u32,
        load_texture: F,
    ) -> Result<Rc<Sprite>, SpriteError>
    where
        B: GraphicsBackend + ?Sized,
        F: FnOnce(&mut B) -> Result<Texture, TextureError>,
    {
        if let Some(sprite) = self.sprites.get(key) {
            if !sprite.matches(width, height, frames, frames_per_line) {
                log::warn!(
                    "sprite `{key}` already built as {}x{} with {} frames; \
                     ignoring request for {width}x{height} with {frames}",
                    sprite.width,
                    sprite.height,
                    sprite.frames
                );
            }
            return Ok(Rc::clone(sprite));
        }

        let texture = load_texture(backend)?;
        let texture_id = texture.id();
        let sprite =
            match Sprite::new(backend, key, texture, width, height, frames, frames_per_line) {
                Ok(sprite) => Rc::new(sprite),
                Err(err) => {
                    backend.delete_texture(texture_id);
                    return Err(err.into());
                }
            };
        log::debug!(
            "created sprite `{key}` ({width}x{height}, {frames} frames, {frames_per_line} per line)"
        );
        self.sprites.insert(key.to_owned(), Rc::clone(&sprite));
        Ok(sprite)
    }

    pub fn get(&self, key: &str) -> Option<Rc<Sprite>> {
        self.sprites.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }
}
