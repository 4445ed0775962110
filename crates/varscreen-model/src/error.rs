use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown variable type: {0}")]
    UnknownVariableType(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
