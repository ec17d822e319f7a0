//! Named shader programs, compiled lazily and cached.
//!
//! Programs are registered as source text at startup and compiled on first
//! activation. The cache also tracks the single active program, the one whose
//! uniform table sprite draws write into.

pub mod builtin;
mod cache;
mod error;
mod program;

pub use cache::ShaderCache;
pub use error::ShaderError;
pub use program::{ShaderProgram, ShaderSource};
