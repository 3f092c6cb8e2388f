use thiserror::Error;

#[derive(Error, Debug)]
pub enum RewindError {
    #[error("Unclassifiable value of type '{type_name}' at {path}")]
    Unclassifiable { type_name: String, path: String },

    #[error("Snapshot root does not belong to the live graph being restored")]
    IdentityViolation,

    #[error("Type '{type_name}' has no field '{field}'")]
    UnknownField { type_name: String, field: String },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: &'static str },

    #[error("Log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RewindResult<T> = Result<T, RewindError>;
