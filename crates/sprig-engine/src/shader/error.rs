use crate::gfx::ShaderStage;

/// Failure while registering or activating a shader program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShaderError {
    #[error("failed to compile {stage} shader of program `{program}`: {log}")]
    Compile {
        program: String,
        stage: ShaderStage,
        source_text: String,
        log: String,
    },
    #[error("failed to link program `{program}`: {log}")]
    Link { program: String, log: String },
    #[error("shader program `{0}` is not registered")]
    NotRegistered(String),
    #[error("shader program `{0}` is already registered")]
    DuplicateRegistration(String),
}

impl ShaderError {
    /// Diagnostic log reported by the backend, if any.
    pub fn log(&self) -> Option<&str> {
        match self {
            ShaderError::Compile { log, .. } | ShaderError::Link { log, .. } => Some(log),
            _ => None,
        }
    }
}
