use thiserror::Error;

/// failures reported by registry operations.
///
/// every failing operation leaves the device map exactly as it was.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("device not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
