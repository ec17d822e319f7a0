//! WGSL front end: per-stage compilation and program linking.
//!
//! wgpu has no separate compile and link steps, so they are reproduced on the
//! CPU with naga:
//! - `compile` parses and validates one stage and records its interface
//!   (entry point, resource bindings, `@location` varyings)
//! - `link` checks that two stage interfaces fit together and produces the
//!   program's uniform layout
//!
//! Binding convention:
//! - `@group(0)` holds `var<uniform>` values; a uniform's location is its `@binding`
//! - `@group(1)` holds the sprite texture (`@binding(0)`) and sampler (`@binding(1)`)

use std::collections::BTreeMap;

use crate::gfx::{ShaderStage, UniformLocation};

pub const UNIFORM_GROUP: u32 = 0;
pub const TEXTURE_GROUP: u32 = 1;
pub const TEXTURE_BINDING: u32 = 0;
pub const SAMPLER_BINDING: u32 = 1;

/// Upper bound on uniforms per program (one dynamic offset each).
///
/// Matches wgpu's default `max_dynamic_uniform_buffers_per_pipeline_layout`.
pub const MAX_UNIFORMS: usize = 8;

/// Vertex attributes every program is fed: position then uv.
const VERTEX_ATTRIBUTES: [(u32, naga::VectorSize); 2] =
    [(0, naga::VectorSize::Tri), (1, naga::VectorSize::Bi)];

/// Validator capabilities a device with `features` can run.
///
/// Only the shader features that change which modules validate are mapped;
/// everything else stays disabled.
pub fn capabilities_for(features: wgpu::Features) -> naga::valid::Capabilities {
    use naga::valid::Capabilities as Caps;

    let mut caps = Caps::empty();
    caps.set(Caps::FLOAT64, features.contains(wgpu::Features::SHADER_F64));
    caps.set(Caps::SHADER_FLOAT16, features.contains(wgpu::Features::SHADER_F16));
    caps.set(Caps::SHADER_INT64, features.contains(wgpu::Features::SHADER_INT64));
    caps.set(
        Caps::PRIMITIVE_INDEX,
        features.contains(wgpu::Features::SHADER_PRIMITIVE_INDEX),
    );
    caps
}

#[derive(Debug, Clone, PartialEq)]
enum BindingKind {
    Uniform { size: u32 },
    Texture2d,
    Sampler,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
struct Binding {
    name: String,
    group: u32,
    binding: u32,
    kind: BindingKind,
}

#[derive(Debug, Clone, PartialEq)]
struct Varying {
    location: u32,
    ty: naga::TypeInner,
}

/// Reflected interface of one compiled stage.
#[derive(Debug, Clone)]
pub struct StageInterface {
    stage: ShaderStage,
    entry_point: String,
    bindings: Vec<Binding>,
    // Vertex stage only.
    attributes: Vec<Varying>,
    // Vertex stage: outputs. Fragment stage: inputs.
    varyings: Vec<Varying>,
}

impl StageInterface {
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

/// A `var<uniform>` of a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: String,
    pub binding: u32,
    pub size: u32,
}

/// Result of a successful link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLayout {
    /// Sorted by binding, which is also the order of dynamic offsets.
    pub uniforms: Vec<UniformSlot>,
    pub vertex_entry: String,
    pub fragment_entry: String,
}

impl ProgramLayout {
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms
            .iter()
            .find(|u| u.name == name)
            .map(|u| UniformLocation(u.binding))
    }

    pub fn slot(&self, location: UniformLocation) -> Option<(usize, &UniformSlot)> {
        self.uniforms
            .iter()
            .enumerate()
            .find(|(_, u)| u.binding == location.0)
    }
}

/// Parses and validates `source` as the given stage.
///
/// `capabilities` should come from [`capabilities_for`] on the target device.
/// The error is a human-readable diagnostic rendered against the source.
pub fn compile(
    stage: ShaderStage,
    source: &str,
    capabilities: naga::valid::Capabilities,
) -> Result<StageInterface, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;

    let mut validator =
        naga::valid::Validator::new(naga::valid::ValidationFlags::all(), capabilities);
    validator
        .validate(&module)
        .map_err(|e| e.emit_to_string(source))?;

    let wanted = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == wanted)
        .ok_or_else(|| format!("error: no `@{stage}` entry point in {stage} shader"))?;

    let bindings = module
        .global_variables
        .iter()
        .filter_map(|(_, var)| {
            let rb = var.binding.as_ref()?;
            let inner = &module.types[var.ty].inner;
            let kind = match (var.space, inner) {
                (naga::AddressSpace::Uniform, _) => {
                    BindingKind::Uniform { size: inner.size(module.to_ctx()) }
                }
                (
                    naga::AddressSpace::Handle,
                    naga::TypeInner::Image {
                        dim: naga::ImageDimension::D2,
                        arrayed: false,
                        class: naga::ImageClass::Sampled { multi: false, .. },
                        ..
                    },
                ) => BindingKind::Texture2d,
                (naga::AddressSpace::Handle, naga::TypeInner::Sampler { comparison: false }) => {
                    BindingKind::Sampler
                }
                _ => BindingKind::Other,
            };
            Some(Binding {
                name: var.name.clone().unwrap_or_default(),
                group: rb.group,
                binding: rb.binding,
                kind,
            })
        })
        .collect();

    let mut attributes = Vec::new();
    let mut varyings = Vec::new();
    match stage {
        ShaderStage::Vertex => {
            for arg in &entry.function.arguments {
                collect_locations(&module, arg.ty, arg.binding.as_ref(), &mut attributes);
            }
            if let Some(result) = &entry.function.result {
                collect_locations(&module, result.ty, result.binding.as_ref(), &mut varyings);
            }
        }
        ShaderStage::Fragment => {
            for arg in &entry.function.arguments {
                collect_locations(&module, arg.ty, arg.binding.as_ref(), &mut varyings);
            }
        }
    }

    Ok(StageInterface {
        stage,
        entry_point: entry.name.clone(),
        bindings,
        attributes,
        varyings,
    })
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<Varying>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => out.push(Varying {
            location: *location,
            ty: module.types[ty].inner.clone(),
        }),
        Some(_) => {} // builtins
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

/// Checks that `vertex` and `fragment` form a valid program.
pub fn link(vertex: &StageInterface, fragment: &StageInterface) -> Result<ProgramLayout, String> {
    if vertex.stage != ShaderStage::Vertex || fragment.stage != ShaderStage::Fragment {
        return Err(format!(
            "error: expected a vertex and a fragment shader, got {} and {}",
            vertex.stage, fragment.stage
        ));
    }

    for input in &vertex.attributes {
        let Some(&(_, size)) = VERTEX_ATTRIBUTES.iter().find(|(l, _)| *l == input.location) else {
            return Err(format!(
                "error: vertex input @location({}) is not provided by the sprite vertex layout",
                input.location
            ));
        };
        let expected = naga::TypeInner::Vector { size, scalar: naga::Scalar::F32 };
        if input.ty != expected {
            return Err(format!(
                "error: vertex input @location({}) must be {expected:?}, found {:?}",
                input.location, input.ty
            ));
        }
    }

    for input in &fragment.varyings {
        let Some(output) = vertex.varyings.iter().find(|o| o.location == input.location) else {
            return Err(format!(
                "error: fragment input @location({}) is not written by the vertex shader",
                input.location
            ));
        };
        if output.ty != input.ty {
            return Err(format!(
                "error: type mismatch at @location({}): vertex writes {:?}, fragment reads {:?}",
                input.location, output.ty, input.ty
            ));
        }
    }

    let mut uniforms: BTreeMap<u32, UniformSlot> = BTreeMap::new();
    for b in vertex.bindings.iter().chain(&fragment.bindings) {
        match (b.group, &b.kind) {
            (UNIFORM_GROUP, BindingKind::Uniform { size }) => match uniforms.get(&b.binding) {
                Some(existing) if existing.name != b.name || existing.size != *size => {
                    return Err(format!(
                        "error: @group(0) @binding({}) declared as `{}` ({} bytes) \
                         and `{}` ({} bytes)",
                        b.binding, existing.name, existing.size, b.name, size
                    ));
                }
                Some(_) => {}
                None => {
                    uniforms.insert(
                        b.binding,
                        UniformSlot { name: b.name.clone(), binding: b.binding, size: *size },
                    );
                }
            },
            (TEXTURE_GROUP, BindingKind::Texture2d) if b.binding == TEXTURE_BINDING => {}
            (TEXTURE_GROUP, BindingKind::Sampler) if b.binding == SAMPLER_BINDING => {}
            _ => {
                return Err(format!(
                    "error: unsupported resource `{}` at @group({}) @binding({})",
                    b.name, b.group, b.binding
                ));
            }
        }
    }

    let uniforms: Vec<UniformSlot> = uniforms.into_values().collect();
    if uniforms.len() > MAX_UNIFORMS {
        return Err(format!(
            "error: program declares {} uniforms, at most {MAX_UNIFORMS} are supported",
            uniforms.len()
        ));
    }
    for (i, u) in uniforms.iter().enumerate() {
        if uniforms[..i].iter().any(|other| other.name == u.name) {
            return Err(format!("error: uniform `{}` is bound more than once", u.name));
        }
    }

    Ok(ProgramLayout {
        uniforms,
        vertex_entry: vertex.entry_point.clone(),
        fragment_entry: fragment.entry_point.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::builtin;

    fn caps() -> naga::valid::Capabilities {
        capabilities_for(wgpu::Features::empty())
    }

    fn vertex(source: &str) -> StageInterface {
        compile(ShaderStage::Vertex, source, caps()).unwrap()
    }

    fn fragment(source: &str) -> StageInterface {
        compile(ShaderStage::Fragment, source, caps()).unwrap()
    }

    const FLAT_FS: &str =
        "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";

    fn builtin_layout(name: &str) -> ProgramLayout {
        let source = builtin::sources().into_iter().find(|s| s.name == name).unwrap();
        let vs = compile(ShaderStage::Vertex, &source.vertex, caps()).unwrap();
        let fs = compile(ShaderStage::Fragment, &source.fragment, caps()).unwrap();
        link(&vs, &fs).unwrap()
    }

    fn color_vs() -> StageInterface {
        let source = builtin::sources().into_iter().find(|s| s.name == builtin::COLOR).unwrap();
        vertex(&source.vertex)
    }

    #[test]
    fn builtin_programs_compile_and_link() {
        let layout = builtin_layout(builtin::TEXTURE);
        assert_eq!(layout.vertex_entry, "vs_main");
        assert_eq!(layout.fragment_entry, "fs_main");
        let names: Vec<_> = layout.uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["projection", "camera", "model"]);
        assert!(layout.uniforms.iter().all(|u| u.size == 64));

        let layout = builtin_layout(builtin::COLOR);
        assert_eq!(layout.uniform_location("color"), Some(UniformLocation(3)));

        // `sprite` merges vertex-stage matrices with the fragment-stage color.
        let layout = builtin_layout(builtin::SPRITE);
        assert_eq!(layout.uniforms.len(), 4);
        let (_, color) = layout.slot(UniformLocation(3)).unwrap();
        assert_eq!((color.name.as_str(), color.size), ("color", 16));
    }

    #[test]
    fn absent_uniform_has_no_location() {
        let layout = builtin_layout(builtin::TEXTURE);
        assert_eq!(layout.uniform_location("color"), None);
    }

    #[test]
    fn syntax_error_yields_non_empty_diagnostic() {
        let source = "@fragment fn fs_main( -> @location(0) vec4<f32> { }";
        let log = compile(ShaderStage::Fragment, source, caps()).unwrap_err();
        assert!(!log.trim().is_empty());
    }

    #[test]
    fn validation_error_is_reported() {
        // Returns the wrong type.
        let source = "@fragment fn fs_main() -> @location(0) vec4<f32> { return 1.0; }";
        assert!(compile(ShaderStage::Fragment, source, caps()).is_err());
    }

    #[test]
    fn missing_entry_point_is_a_compile_error() {
        let log = compile(ShaderStage::Vertex, FLAT_FS, caps()).unwrap_err();
        assert!(log.contains("@vertex"), "{log}");
    }

    #[test]
    fn unwritten_fragment_input_fails_to_link() {
        let fs = fragment(
            "@fragment fn fs_main(@location(1) tint: vec4<f32>) \
             -> @location(0) vec4<f32> { return tint; }",
        );
        let log = link(&color_vs(), &fs).unwrap_err();
        assert!(log.contains("@location(1)"), "{log}");
    }

    #[test]
    fn varying_type_mismatch_fails_to_link() {
        let fs = fragment(
            "@fragment fn fs_main(@location(0) c: vec2<f32>) \
             -> @location(0) vec4<f32> { return vec4<f32>(c, 0.0, 1.0); }",
        );
        assert!(link(&color_vs(), &fs).unwrap_err().contains("type mismatch"));
    }

    #[test]
    fn conflicting_uniform_binding_fails_to_link() {
        let fs = fragment(
            "@group(0) @binding(0) var<uniform> tint: vec4<f32>;
             @fragment fn fs_main() -> @location(0) vec4<f32> { return tint; }",
        );
        assert!(link(&color_vs(), &fs).is_err());
    }

    #[test]
    fn unsupported_resource_fails_to_link() {
        let fs = fragment(
            "@group(2) @binding(0) var<uniform> extra: vec4<f32>;
             @fragment fn fs_main() -> @location(0) vec4<f32> { return extra; }",
        );
        assert!(link(&color_vs(), &fs).unwrap_err().contains("@group(2)"));
    }

    #[test]
    fn stages_must_be_given_in_order() {
        let fs = fragment(FLAT_FS);
        assert!(link(&fs, &color_vs()).is_err());
    }

    #[test]
    fn vertex_inputs_must_match_the_sprite_layout() {
        let fs = fragment(FLAT_FS);

        let extra = vertex(
            "@vertex fn vs_main(@location(0) p: vec3<f32>, @location(2) tint: vec4<f32>) \
             -> @builtin(position) vec4<f32> { return vec4<f32>(p, 1.0) * tint; }",
        );
        assert!(link(&extra, &fs).unwrap_err().contains("@location(2)"));

        let wrong_type = vertex(
            "@vertex fn vs_main(@location(1) uv: vec4<f32>) \
             -> @builtin(position) vec4<f32> { return uv; }",
        );
        assert!(link(&wrong_type, &fs).unwrap_err().contains("@location(1)"));

        // Reading a subset of the attributes, or only builtins, is fine.
        let uv_only = vertex(
            "@vertex fn vs_main(@builtin(vertex_index) i: u32, @location(1) uv: vec2<f32>) \
             -> @builtin(position) vec4<f32> { return vec4<f32>(uv, f32(i), 1.0); }",
        );
        assert!(link(&uv_only, &fs).is_ok());
    }

    #[test]
    fn capabilities_follow_device_features() {
        let source = "enable f16;
             @fragment fn fs_main() -> @location(0) vec4<f32> {
                 let h: f16 = 1.0h;
                 return vec4<f32>(f32(h));
             }";
        assert!(compile(ShaderStage::Fragment, source, caps()).is_err());

        let f16 = capabilities_for(wgpu::Features::SHADER_F16);
        assert!(compile(ShaderStage::Fragment, source, f16).is_ok());
    }
}
