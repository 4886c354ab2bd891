use thiserror::Error;

use crate::registry::store::StoreError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("invalid descriptor: {0}")]
    Invalid(String),

    #[error("registry store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt registry data: {0}")]
    Corrupt(String),
}

impl RegistryError {
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::NotFound(_) => "not_found",
            RegistryError::Invalid(_) => "validation",
            RegistryError::Unavailable(_) => "backend_unavailable",
            RegistryError::Corrupt(_) => "corrupt",
        }
    }
}

impl From<StoreError> for RegistryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => RegistryError::Unavailable(msg),
            StoreError::Corrupt(msg) => RegistryError::Corrupt(msg),
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
