// src/error.rs
//! Error taxonomy shared by the store, the sweeper and the HTTP layer.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SightingError {
    /// Bad enum value, out-of-range coordinate, missing or malformed field.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("sighting not found: {0}")]
    NotFound(String),

    /// Backend could not be reached, read or written.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("media host unavailable: {0}")]
    MediaUnavailable(String),
}

impl SightingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound(id.to_string())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Stable machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::MediaUnavailable(_) => "media_unavailable",
        }
    }
}

pub type Result<T> = std::result::Result<T, SightingError>;
