use std::collections::HashMap;

use crate::gfx::{GraphicsBackend, ProgramId, ShaderStage, UniformLocation};

use super::{ShaderError, ShaderProgram, ShaderSource};

/// Owns every registered program and tracks the active one.
///
/// Registration is strict: a name can be registered once. [`replace`](Self::replace)
/// is the explicit way to swap a program's source, for example after fixing a
/// shader that failed to compile.
#[derive(Debug, Default)]
pub struct ShaderCache {
    programs: HashMap<String, ShaderProgram>,
    active: Option<String>,
}

impl ShaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `source` for lazy compilation. No GPU work happens here.
    pub fn register(&mut self, source: ShaderSource) -> Result<(), ShaderError> {
        if self.programs.contains_key(&source.name) {
            return Err(ShaderError::DuplicateRegistration(source.name));
        }
        log::debug!("registered shader program `{}`", source.name);
        self.programs.insert(source.name.clone(), ShaderProgram::new(source));
        Ok(())
    }

    /// Registers `source`, overwriting any program with the same name.
    ///
    /// A previously linked program is deleted and the entry goes back to
    /// unloaded. If it was active, no program is active afterwards.
    pub fn replace<B>(&mut self, backend: &mut B, source: ShaderSource)
    where
        B: GraphicsBackend + ?Sized,
    {
        let name = source.name.clone();
        let Some(program) = self.programs.get_mut(&name) else {
            log::debug!("registered shader program `{name}`");
            self.programs.insert(name, ShaderProgram::new(source));
            return;
        };

        if let Some(old) = program.reset(source) {
            backend.delete_program(old);
        }
        if self.active.as_deref() == Some(name.as_str()) {
            self.active = None;
        }
        log::debug!("replaced shader program `{name}`");
    }

    /// Makes `name` the active program, compiling and linking it on first use.
    ///
    /// Failures are reported to the caller and never retried; the program stays
    /// unloaded and the previously active program stays active.
    pub fn activate<B>(
        &mut self,
        backend: &mut B,
        name: &str,
    ) -> Result<&ShaderProgram, ShaderError>
    where
        B: GraphicsBackend + ?Sized,
    {
        let program = self
            .programs
            .get_mut(name)
            .ok_or_else(|| ShaderError::NotRegistered(name.to_owned()))?;

        let handle = match program.handle() {
            Some(handle) => {
                log::trace!("activating cached shader program `{name}`");
                handle
            }
            None => {
                let (handle, uniforms) = load(backend, program)?;
                program.mark_loaded(handle, uniforms);
                handle
            }
        };

        backend.use_program(handle);
        if self.active.as_deref() != Some(name) {
            self.active = Some(name.to_owned());
        }
        Ok(&self.programs[name])
    }

    /// The program made current by the last successful [`activate`](Self::activate).
    pub fn active(&self) -> Option<&ShaderProgram> {
        self.active.as_deref().and_then(|name| self.programs.get(name))
    }

    /// Location of `name` in the active program.
    ///
    /// `None` means "skip the write": no active program, or the uniform is
    /// unresolved.
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.active()?.uniform(name)
    }

    pub fn get(&self, name: &str) -> Option<&ShaderProgram> {
        self.programs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

type UniformTable = HashMap<String, Option<UniformLocation>>;

fn load<B>(
    backend: &mut B,
    program: &ShaderProgram,
) -> Result<(ProgramId, UniformTable), ShaderError>
where
    B: GraphicsBackend + ?Sized,
{
    let name = program.name();
    let compile_error = |stage: ShaderStage, source: &str, log: String| ShaderError::Compile {
        program: name.to_owned(),
        stage,
        source_text: source.to_owned(),
        log,
    };

    let vertex = backend
        .compile_shader(ShaderStage::Vertex, program.vertex_source())
        .map_err(|log| compile_error(ShaderStage::Vertex, program.vertex_source(), log))?;

    let fragment = match backend.compile_shader(ShaderStage::Fragment, program.fragment_source()) {
        Ok(fragment) => fragment,
        Err(log) => {
            backend.delete_shader(vertex);
            return Err(compile_error(ShaderStage::Fragment, program.fragment_source(), log));
        }
    };

    let linked = backend.link_program(vertex, fragment);
    backend.delete_shader(vertex);
    backend.delete_shader(fragment);
    let handle = linked.map_err(|log| ShaderError::Link { program: name.to_owned(), log })?;

    let uniforms: UniformTable = program
        .declared_uniforms()
        .iter()
        .map(|uniform| {
            let location = backend.uniform_location(handle, uniform);
            if location.is_none() {
                log::debug!("program `{name}`: uniform `{uniform}` is not exposed");
            }
            (uniform.clone(), location)
        })
        .collect();

    log::info!("compiled shader program `{name}` ({handle})");
    Ok((handle, uniforms))
}
