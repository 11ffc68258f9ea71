//! Error types for envlayer operations

use crate::failure::{Failure, VariableFailure};
use crate::validation::Rejection;
use std::io;
use thiserror::Error;

// Internal use only
use envlayer_core::ParseError;

/// The main error type for envlayer operations
///
/// Resolution failures are wrapped as [`EnvLayerError::Failure`] or
/// [`EnvLayerError::Unresolved`]; use [`EnvLayerError::failure`] to get at the
/// typed [`Failure`] regardless of which wrapper carries it.
#[derive(Error, Debug)]
pub enum EnvLayerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
    #[error("Dotenv error: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("{0}")]
    DocumentNotFound(String),
    #[error("Invalid layer document: {0}")]
    InvalidDocument(String),
    #[error("Provider backend '{0}' not found")]
    ProviderNotFound(String),
    #[error("Provider operation failed: {0}")]
    ProviderOperationFailed(String),
    #[error(transparent)]
    Failure(#[from] Failure),
    #[error(transparent)]
    Unresolved(#[from] VariableFailure),
    #[error("Validator '{validator}' rejected profile '{profile}': {rejection}")]
    Rejected {
        validator: String,
        profile: String,
        #[source]
        rejection: Rejection,
    },
}

/// A type alias for `Result<T, EnvLayerError>`
pub type Result<T> = std::result::Result<T, EnvLayerError>;

impl EnvLayerError {
    /// The typed resolution failure behind this error, if it is one.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            EnvLayerError::Failure(failure) => Some(failure),
            EnvLayerError::Unresolved(unresolved) => Some(&unresolved.failure),
            _ => None,
        }
    }
}

impl From<ParseError> for EnvLayerError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Io(io_err) => {
                if io_err.kind() == io::ErrorKind::NotFound {
                    // The core crate puts the path into the message
                    EnvLayerError::DocumentNotFound(io_err.to_string())
                } else {
                    EnvLayerError::Io(io_err)
                }
            }
            ParseError::Toml(toml_err) => EnvLayerError::Toml(toml_err),
            ParseError::Json(json_err) => EnvLayerError::Json(json_err),
            other => EnvLayerError::InvalidDocument(other.to_string()),
        }
    }
}
