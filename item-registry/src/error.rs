use thiserror::Error;

/// Errors returned by the item registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Item {0} not found")]
    ItemNotFound(String),

    #[error("Item {0} already exists")]
    ItemExists(String),

    #[error("Registry lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, RegistryError>;
