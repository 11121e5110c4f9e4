use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZaniError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZaniError {
    /// Short, stable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            ZaniError::Config(_) => "CONFIG_ERROR",
            ZaniError::Serialization(_) => "SERIALIZATION_ERROR",
            ZaniError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ZaniError>;
