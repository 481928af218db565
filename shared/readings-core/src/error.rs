//! Error types shared by readings services

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReadingsError>;

#[derive(Error, Debug)]
pub enum ReadingsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ReadingsError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unavailable(_) => 503,
            _ => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Unavailable(_) => "UNAVAILABLE",
        }
    }
}

impl From<std::io::Error> for ReadingsError {
    fn from(err: std::io::Error) -> Self {
        ReadingsError::Network(err.to_string())
    }
}
