use thiserror::Error;

/// Minimum `llama-cpp-2` release the `llama` feature is built against.
pub const LLAMA_CPP_MIN_VERSION: &str = "0.1.121";

#[derive(Debug, Error)]
pub enum EngineError {
    /// The inference engine was not compiled into this build.
    #[error("missing dependency: {hint}")]
    MissingDependency { hint: String },

    #[error("unknown model variant: {0}")]
    UnknownVariant(String),

    #[error("completion count must be at least 1")]
    InvalidCompletionCount,

    #[error("{requested} completions requested, at most {max} allowed")]
    TooManyCompletions { requested: usize, max: usize },

    /// Anything raised by the engine itself, passed through as-is.
    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

impl EngineError {
    pub fn missing_llama() -> Self {
        EngineError::MissingDependency {
            hint: format!(
                "rebuild with `--features llama` (llama-cpp-2 >= {LLAMA_CPP_MIN_VERSION}) to use this engine"
            ),
        }
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
