use std::collections::HashMap;

use crate::gfx::{ProgramId, UniformLocation};

/// Registration entry for a named shader program.
///
/// `uniforms` lists the names resolved once at link time; a name the linked
/// program does not expose resolves to "unresolved" rather than failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub name: String,
    pub vertex: String,
    pub fragment: String,
    pub uniforms: Vec<String>,
}

impl ShaderSource {
    pub fn new<I, S>(
        name: impl Into<String>,
        vertex: impl Into<String>,
        fragment: impl Into<String>,
        uniforms: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
            uniforms: uniforms.into_iter().map(Into::into).collect(),
        }
    }
}

/// A registered program and, once loaded, its GPU handle and uniform table.
#[derive(Debug)]
pub struct ShaderProgram {
    source: ShaderSource,
    handle: Option<ProgramId>,
    // Keyed by declared uniform name; `None` = not exposed by the linked program.
    uniforms: HashMap<String, Option<UniformLocation>>,
}

impl ShaderProgram {
    pub(super) fn new(source: ShaderSource) -> Self {
        Self { source, handle: None, uniforms: HashMap::new() }
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn vertex_source(&self) -> &str {
        &self.source.vertex
    }

    pub fn fragment_source(&self) -> &str {
        &self.source.fragment
    }

    /// Uniform names declared at registration, in declaration order.
    pub fn declared_uniforms(&self) -> &[String] {
        &self.source.uniforms
    }

    /// Whether the program has been compiled and linked.
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    #[inline]
    pub fn handle(&self) -> Option<ProgramId> {
        self.handle
    }

    /// Resolved location of a declared uniform.
    ///
    /// `None` covers undeclared names, names the program does not expose and
    /// programs that are not loaded yet; callers skip the write in every case.
    #[inline]
    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied().flatten()
    }

    pub(super) fn mark_loaded(
        &mut self,
        handle: ProgramId,
        uniforms: HashMap<String, Option<UniformLocation>>,
    ) {
        self.handle = Some(handle);
        self.uniforms = uniforms;
    }

    /// Swaps in new source text and drops the link state, returning the old handle.
    pub(super) fn reset(&mut self, source: ShaderSource) -> Option<ProgramId> {
        self.source = source;
        self.uniforms.clear();
        self.handle.take()
    }
}
