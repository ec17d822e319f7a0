//! Test double that records every command instead of touching a GPU.
//!
//! Compilation fails for sources containing `SYNTAX_ERROR`, linking fails when
//! either stage contains `LINK_ERROR`. A uniform resolves when its name occurs
//! in one of the program's sources.

use std::collections::HashMap;

use glam::Mat4;

use super::{
    GraphicsBackend, ProgramId, ShaderId, ShaderStage, TextureId, UniformLocation, VertexArrayId,
};
use crate::sprite::SpriteVertex;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CompileShader(ShaderStage),
    DeleteShader(ShaderId),
    LinkProgram(ProgramId),
    DeleteProgram(ProgramId),
    UseProgram(ProgramId),
    SetMat4(UniformLocation, Mat4),
    SetVec4(UniformLocation, [f32; 4]),
    CreateVertexArray { vertex_count: usize },
    BindVertexArray(VertexArrayId),
    CreateTexture { width: u32, height: u32 },
    DeleteTexture(TextureId),
    BindTexture(TextureId),
    Draw { first_vertex: u32, vertex_count: u32 },
}

#[derive(Default)]
pub(crate) struct RecordingBackend {
    pub calls: Vec<Call>,
    pub compile_attempts: usize,
    pub vertex_arrays: HashMap<VertexArrayId, Vec<SpriteVertex>>,
    shaders: HashMap<ShaderId, String>,
    programs: HashMap<ProgramId, HashMap<String, UniformLocation>>,
    next_id: u32,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn draws(&self) -> Vec<(u32, u32)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Draw { first_vertex, vertex_count } => Some((*first_vertex, *vertex_count)),
                _ => None,
            })
            .collect()
    }

    pub fn vec4_writes(&self) -> Vec<(UniformLocation, [f32; 4])> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::SetVec4(loc, v) => Some((*loc, *v)),
                _ => None,
            })
            .collect()
    }

    pub fn mat4_writes(&self) -> Vec<(UniformLocation, Mat4)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::SetMat4(loc, m) => Some((*loc, *m)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

// Candidate uniform names: every identifier-like word in the source.
fn words(source: &str) -> impl Iterator<Item = &str> {
    source
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
}

impl GraphicsBackend for RecordingBackend {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String> {
        self.compile_attempts += 1;
        self.calls.push(Call::CompileShader(stage));
        if source.contains("SYNTAX_ERROR") {
            return Err(format!("0:1({stage}): error: syntax error, unexpected identifier"));
        }
        let id = ShaderId(self.next());
        self.shaders.insert(id, source.to_owned());
        Ok(id)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
        self.calls.push(Call::DeleteShader(shader));
    }

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String> {
        let vs = self.shaders.get(&vertex).cloned().unwrap_or_default();
        let fs = self.shaders.get(&fragment).cloned().unwrap_or_default();
        if vs.contains("LINK_ERROR") || fs.contains("LINK_ERROR") {
            return Err("error: vertex output `uv` not consumed by fragment input".to_owned());
        }

        let program = ProgramId(self.next());
        let mut uniforms = HashMap::new();
        for word in words(&vs).chain(words(&fs)) {
            if !uniforms.contains_key(word) {
                let location = UniformLocation(uniforms.len() as u32);
                uniforms.insert(word.to_owned(), location);
            }
        }
        self.programs.insert(program, uniforms);
        self.calls.push(Call::LinkProgram(program));
        Ok(program)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        self.calls.push(Call::DeleteProgram(program));
    }

    fn use_program(&mut self, program: ProgramId) {
        self.calls.push(Call::UseProgram(program));
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.get(name).copied()
    }

    fn set_uniform_mat4(&mut self, location: UniformLocation, value: &Mat4) {
        self.calls.push(Call::SetMat4(location, *value));
    }

    fn set_uniform_vec4(&mut self, location: UniformLocation, value: [f32; 4]) {
        self.calls.push(Call::SetVec4(location, value));
    }

    fn create_vertex_array(&mut self, vertices: &[SpriteVertex]) -> VertexArrayId {
        let id = VertexArrayId(self.next());
        self.vertex_arrays.insert(id, vertices.to_vec());
        self.calls.push(Call::CreateVertexArray { vertex_count: vertices.len() });
        id
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.calls.push(Call::BindVertexArray(vertex_array));
    }

    fn create_texture(&mut self, width: u32, height: u32, _rgba: &[u8]) -> TextureId {
        self.calls.push(Call::CreateTexture { width, height });
        TextureId(self.next())
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.calls.push(Call::DeleteTexture(texture));
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.calls.push(Call::BindTexture(texture));
    }

    fn draw_triangles(&mut self, first_vertex: u32, vertex_count: u32) {
        self.calls.push(Call::Draw { first_vertex, vertex_count });
    }
}
