//! # envlayer core
//!
//! Type definitions and parsing logic for envlayer layer documents.
//!
//! A layer document declares named layers of environment variables. Layers may
//! inherit from a single parent layer, and every entry value is parsed once into
//! an [`Expression`]: a literal, a `secret:<name>` reference or a
//! `$.projects.<alias>` project alias reference.
//!
//! ## Key Features
//!
//! - **Layered profiles**: `inherits` chains share common variables
//! - **Parsed expressions**: reference syntax is validated when a document is read
//! - **Multiple documents**: later documents extend and override earlier ones
//! - **Project alias mapping**: parsing of the `.projects` alias file
//!
//! ## Document Structure
//!
//! ```toml
//! [layers.app]
//! APP_ID = "my-app"
//!
//! [layers.dev]
//! inherits = "app"
//! PROJECT_ID = "$.projects.dev"
//! JWT_SECRET = "secret:jwt-secret"
//! ```

use std::io;
use std::path::PathBuf;

pub mod document;
pub mod expression;
pub mod projects;

pub use document::{INLINE_LABEL, Layer, LayerDocument, LayerStore, SourceDocument};
pub use expression::{Expression, PROJECT_ALIAS_PREFIX, SECRET_PREFIX, Scalar};
pub use projects::ProjectMap;

/// Check if a string is a valid variable identifier.
///
/// Identifiers start with a letter or underscore and contain only
/// alphanumerics and underscores.
pub fn is_valid_identifier(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }

    let mut chars = s.chars();
    if let Some(first) = chars.next() {
        if !first.is_alphabetic() && first != '_' {
            return false;
        }
    }

    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Errors raised while reading layer documents.
#[derive(Debug)]
pub enum ParseError {
    /// I/O error when reading a document
    Io(io::Error),
    /// TOML parsing error
    Toml(toml::de::Error),
    /// JSON parsing error
    Json(serde_json::Error),
    /// File extension is neither `.toml` nor `.json`
    UnsupportedFormat(PathBuf),
    /// An entry value uses malformed reference syntax
    InvalidExpression {
        layer: String,
        variable: String,
        reason: String,
    },
    /// Two entries of one layer collide once upper-cased
    DuplicateVariable { layer: String, variable: String },
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Io(e) => write!(f, "I/O error: {}", e),
            ParseError::Toml(e) => write!(f, "TOML parsing error: {}", e),
            ParseError::Json(e) => write!(f, "JSON parsing error: {}", e),
            ParseError::UnsupportedFormat(path) => write!(
                f,
                "Unsupported layer document format '{}'. Use .toml or .json.",
                path.display()
            ),
            ParseError::InvalidExpression {
                layer,
                variable,
                reason,
            } => write!(
                f,
                "Invalid value for '{}' in layer '{}': {}",
                variable, layer, reason
            ),
            ParseError::DuplicateVariable { layer, variable } => write!(
                f,
                "Variable '{}' is declared more than once in layer '{}'",
                variable, layer
            ),
            ParseError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Io(e) => Some(e),
            ParseError::Toml(e) => Some(e),
            ParseError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ParseError {
    fn from(e: io::Error) -> Self {
        ParseError::Io(e)
    }
}

impl From<toml::de::Error> for ParseError {
    fn from(e: toml::de::Error) -> Self {
        ParseError::Toml(e)
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        ParseError::Json(e)
    }
}
