use glam::Vec3;

use crate::color::Color;

/// Per-draw transform and appearance of a sprite.
///
/// Rotation is in degrees per axis and is applied X, then Y, then Z. Rotation
/// and scale pivot around the sprite's local origin (its top-left corner).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawParams {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Option<Vec3>,
    /// Flat color override; `None` writes opaque white.
    pub color: Option<Color>,
    /// Frame index used by `draw_frame`; ignored by `draw`.
    pub frame: u32,
}

impl Default for DrawParams {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: None,
            color: None,
            frame: 0,
        }
    }
}

impl DrawParams {
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self { position: Vec3::new(x, y, z), ..Self::default() }
    }

    pub fn rotated(mut self, x_deg: f32, y_deg: f32, z_deg: f32) -> Self {
        self.rotation = Vec3::new(x_deg, y_deg, z_deg);
        self
    }

    pub fn scaled(mut self, x: f32, y: f32, z: f32) -> Self {
        self.scale = Some(Vec3::new(x, y, z));
        self
    }

    pub fn tinted(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_frame(mut self, frame: u32) -> Self {
        self.frame = frame;
        self
    }

    #[inline]
    pub fn is_rotated(&self) -> bool {
        self.rotation != Vec3::ZERO
    }
}
