//! Programs available without any registration by the host application.
//!
//! - `texture`: samples the sprite texture as-is
//! - `color`: flat `color` fill, ignores the texture
//! - `sprite`: samples the sprite texture and multiplies by `color`
//!
//! All three expect `projection` and `camera` to be written by the caller's
//! per-frame setup; sprite draws only write `model` and `color`.

use super::{ShaderCache, ShaderError, ShaderSource};

pub const TEXTURE: &str = "texture";
pub const COLOR: &str = "color";
pub const SPRITE: &str = "sprite";

const TEXTURE_VS: &str = include_str!("shaders/texture_vs.wgsl");
const TEXTURE_FS: &str = include_str!("shaders/texture_fs.wgsl");
const COLOR_VS: &str = include_str!("shaders/color_vs.wgsl");
const COLOR_FS: &str = include_str!("shaders/color_fs.wgsl");
const SPRITE_FS: &str = include_str!("shaders/sprite_fs.wgsl");

/// Sources of every built-in program.
pub fn sources() -> [ShaderSource; 3] {
    const TINTED: [&str; 4] = ["projection", "camera", "model", "color"];
    [
        ShaderSource::new(TEXTURE, TEXTURE_VS, TEXTURE_FS, ["projection", "camera", "model"]),
        ShaderSource::new(COLOR, COLOR_VS, COLOR_FS, TINTED),
        ShaderSource::new(SPRITE, TEXTURE_VS, SPRITE_FS, TINTED),
    ]
}

/// Registers every built-in program in `cache`.
pub fn register_builtin(cache: &mut ShaderCache) -> Result<(), ShaderError> {
    sources().into_iter().try_for_each(|source| cache.register(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_all_builtins_once() {
        let mut cache = ShaderCache::new();
        register_builtin(&mut cache).unwrap();
        assert_eq!(cache.len(), 3);
        for name in [TEXTURE, COLOR, SPRITE] {
            assert!(cache.contains(name), "{name}");
        }
        assert!(matches!(
            register_builtin(&mut cache),
            Err(ShaderError::DuplicateRegistration(_))
        ));
    }
}
