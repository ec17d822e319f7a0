use glam::Mat4;

use crate::color::Color;
use crate::gfx::GraphicsBackend;
use crate::shader::ShaderCache;

use super::geometry::VERTICES_PER_FRAME;
use super::{DrawParams, Sprite};

/// Uniform carrying the sprite's model matrix.
pub const MODEL_UNIFORM: &str = "model";
/// Uniform carrying the sprite's flat color.
pub const COLOR_UNIFORM: &str = "color";

/// `Translate · RotX · RotY · RotZ · Scale`, rotation in degrees.
///
/// The rotation factors are skipped when every angle is zero and the scale
/// factor when no scale is set.
pub fn model_matrix(params: &DrawParams) -> Mat4 {
    let mut model = Mat4::from_translation(params.position);
    if params.is_rotated() {
        let r = params.rotation;
        model = model
            * Mat4::from_rotation_x(r.x.to_radians())
            * Mat4::from_rotation_y(r.y.to_radians())
            * Mat4::from_rotation_z(r.z.to_radians());
    }
    if let Some(scale) = params.scale {
        model *= Mat4::from_scale(scale);
    }
    model
}

/// Draws the first quad of `sprite` with the active program.
pub fn draw<B>(backend: &mut B, shaders: &ShaderCache, sprite: &Sprite, params: &DrawParams)
where
    B: GraphicsBackend + ?Sized,
{
    submit(backend, shaders, sprite, params, 0);
}

/// Draws sheet frame `params.frame` of `sprite` with the active program.
///
/// The frame index is not checked against the sprite's frame count.
pub fn draw_frame<B>(backend: &mut B, shaders: &ShaderCache, sprite: &Sprite, params: &DrawParams)
where
    B: GraphicsBackend + ?Sized,
{
    submit(backend, shaders, sprite, params, params.frame.saturating_mul(VERTICES_PER_FRAME));
}

fn submit<B>(
    backend: &mut B,
    shaders: &ShaderCache,
    sprite: &Sprite,
    params: &DrawParams,
    first_vertex: u32,
) where
    B: GraphicsBackend + ?Sized,
{
    // No active program: issue the draw without uniform writes.
    if let Some(program) = shaders.active() {
        if let Some(location) = program.uniform(MODEL_UNIFORM) {
            backend.set_uniform_mat4(location, &model_matrix(params));
        }
        if let Some(location) = program.uniform(COLOR_UNIFORM) {
            let color = params.color.unwrap_or(Color::WHITE);
            backend.set_uniform_vec4(location, color.to_array());
        }
    }

    backend.bind_vertex_array(sprite.vertex_array());
    sprite.texture().bind(backend);
    backend.draw_triangles(first_vertex, VERTICES_PER_FRAME);
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};
    use image::RgbaImage;

    use super::*;
    use crate::gfx::recording::{Call, RecordingBackend};
    use crate::shader::ShaderSource;
    use crate::texture::Texture;

    fn sheet(backend: &mut RecordingBackend) -> Sprite {
        let texture = Texture::from_image(backend, &RgbaImage::new(64, 64)).unwrap();
        Sprite::new(backend, "sheet", texture, 32, 32, 4, 2).unwrap()
    }

    fn cache_with_active(backend: &mut RecordingBackend, uniforms: &[&str]) -> ShaderCache {
        let mut cache = ShaderCache::new();
        let vs = "uniform projection; uniform camera; uniform model;";
        let fs = "uniform color;";
        cache.register(ShaderSource::new("sprite", vs, fs, uniforms.iter().copied())).unwrap();
        cache.activate(backend, "sprite").unwrap();
        backend.clear_calls();
        cache
    }

    fn assert_mat_eq(a: Mat4, b: Mat4) {
        assert!(a.abs_diff_eq(b, 1e-5), "{a:?} != {b:?}");
    }

    #[test]
    fn transform_order_is_translate_rotate_scale() {
        let params = DrawParams::at(10.0, 0.0, 0.0).rotated(0.0, 0.0, 90.0).scaled(2.0, 2.0, 1.0);
        let expected = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0))
            * Mat4::from_rotation_z(90f32.to_radians())
            * Mat4::from_scale(Vec3::new(2.0, 2.0, 1.0));
        assert_mat_eq(model_matrix(&params), expected);

        // Local (1,0) scales to (2,0), rotates to (0,2), then moves to (10,2).
        let p = model_matrix(&params) * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert!(p.abs_diff_eq(Vec4::new(10.0, 2.0, 0.0, 1.0), 1e-5));
    }

    #[test]
    fn unrotated_unscaled_is_pure_translation() {
        let params = DrawParams::at(3.0, 4.0, 5.0);
        assert_eq!(model_matrix(&params), Mat4::from_translation(Vec3::new(3.0, 4.0, 5.0)));
    }

    #[test]
    fn rotations_apply_x_then_y_then_z() {
        let params = DrawParams::default().rotated(30.0, 45.0, 60.0);
        let expected = Mat4::from_rotation_x(30f32.to_radians())
            * Mat4::from_rotation_y(45f32.to_radians())
            * Mat4::from_rotation_z(60f32.to_radians());
        assert_mat_eq(model_matrix(&params), expected);
    }

    #[test]
    fn draw_writes_uniforms_then_binds_and_draws() {
        let mut backend = RecordingBackend::new();
        let sprite = sheet(&mut backend);
        let cache = cache_with_active(&mut backend, &["model", "color"]);
        let model = cache.uniform_location("model").unwrap();
        let color = cache.uniform_location("color").unwrap();
        let params = DrawParams::at(1.0, 2.0, 0.0);

        draw(&mut backend, &cache, &sprite, &params);

        assert_eq!(
            backend.calls,
            vec![
                Call::SetMat4(model, model_matrix(&params)),
                Call::SetVec4(color, [1.0; 4]),
                Call::BindVertexArray(sprite.vertex_array()),
                Call::BindTexture(sprite.texture().id()),
                Call::Draw { first_vertex: 0, vertex_count: 6 },
            ]
        );
    }

    #[test]
    fn color_defaults_to_opaque_white() {
        let mut backend = RecordingBackend::new();
        let sprite = sheet(&mut backend);
        let cache = cache_with_active(&mut backend, &["model", "color"]);

        draw(&mut backend, &cache, &sprite, &DrawParams::default());
        let tint = Color::rgba(1.0, 0.0, 0.0, 0.5);
        draw(&mut backend, &cache, &sprite, &DrawParams::default().tinted(tint));

        let writes: Vec<[f32; 4]> = backend.vec4_writes().into_iter().map(|(_, v)| v).collect();
        assert_eq!(writes, vec![[1.0, 1.0, 1.0, 1.0], [1.0, 0.0, 0.0, 0.5]]);
    }

    #[test]
    fn unresolved_uniforms_are_skipped() {
        let mut backend = RecordingBackend::new();
        let sprite = sheet(&mut backend);
        // `color` is declared but does not occur in either stage.
        let mut cache = ShaderCache::new();
        cache
            .register(ShaderSource::new("plain", "uniform model;", "", ["model", "color"]))
            .unwrap();
        cache.activate(&mut backend, "plain").unwrap();
        backend.clear_calls();

        draw(&mut backend, &cache, &sprite, &DrawParams::default());
        assert_eq!(backend.mat4_writes().len(), 1);
        assert!(backend.vec4_writes().is_empty());
        assert_eq!(backend.draws(), vec![(0, 6)]);
    }

    #[test]
    fn without_active_program_draw_is_still_issued() {
        let mut backend = RecordingBackend::new();
        let sprite = sheet(&mut backend);
        let cache = ShaderCache::new();
        backend.clear_calls();

        draw(&mut backend, &cache, &sprite, &DrawParams::default());
        assert!(backend.mat4_writes().is_empty());
        assert!(backend.vec4_writes().is_empty());
        assert_eq!(backend.draws(), vec![(0, 6)]);
    }

    #[test]
    fn draw_frame_offsets_by_six_vertices_per_frame() {
        let mut backend = RecordingBackend::new();
        let sprite = sheet(&mut backend);
        let cache = cache_with_active(&mut backend, &["model", "color"]);

        draw_frame(&mut backend, &cache, &sprite, &DrawParams::default().with_frame(2));
        // `draw` ignores the frame index.
        draw(&mut backend, &cache, &sprite, &DrawParams::default().with_frame(3));
        assert_eq!(backend.draws(), vec![(12, 6), (0, 6)]);
    }

    #[test]
    fn frame_past_the_end_is_not_validated() {
        let mut backend = RecordingBackend::new();
        let sprite = sheet(&mut backend);
        let cache = cache_with_active(&mut backend, &["model"]);
        let past_end = sprite.frame_count();

        draw_frame(&mut backend, &cache, &sprite, &DrawParams::default().with_frame(past_end));
        assert_eq!(backend.draws(), vec![(6 * past_end, 6)]);
    }

    #[test]
    fn huge_frame_index_saturates_instead_of_wrapping() {
        let mut backend = RecordingBackend::new();
        let sprite = sheet(&mut backend);
        let cache = cache_with_active(&mut backend, &["model"]);

        // 715827883 * 6 wraps to 2 in u32.
        draw_frame(&mut backend, &cache, &sprite, &DrawParams::default().with_frame(715_827_883));
        assert_eq!(backend.draws(), vec![(u32::MAX, 6)]);
    }
}
