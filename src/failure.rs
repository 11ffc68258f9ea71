//! Typed failures raised while resolving a profile.
//!
//! Failures carry only the identifiers needed to act on them (layer, secret
//! name, alias). Turning them into remediation text is the job of
//! [`crate::guidance`].

use std::fmt;
use thiserror::Error;

/// Classification of a [`Failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    LayerNotFound,
    CyclicInheritance,
    SecretStoreUnavailable,
    DecryptionKeyUnavailable,
    SecretNotFound,
    ProjectIdRequired,
    ProjectAliasNotFound,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::LayerNotFound => "layer not found",
            FailureKind::CyclicInheritance => "cyclic inheritance",
            FailureKind::SecretStoreUnavailable => "secret store unavailable",
            FailureKind::DecryptionKeyUnavailable => "decryption key unavailable",
            FailureKind::SecretNotFound => "secret not found",
            FailureKind::ProjectIdRequired => "project id required",
            FailureKind::ProjectAliasNotFound => "project alias not found",
        };
        f.write_str(label)
    }
}

/// A failure to resolve a layer chain or a single expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    #[error("Layer '{layer}' is not defined")]
    LayerNotFound { layer: String },
    #[error("Layer '{layer}' inherits from itself through {}", .chain.join(" -> "))]
    CyclicInheritance { layer: String, chain: Vec<String> },
    #[error("Secret store unavailable while resolving '{secret}': {detail}")]
    SecretStoreUnavailable { secret: String, detail: String },
    #[error("Decryption key for the secret store is unavailable (needed for '{secret}')")]
    DecryptionKeyUnavailable { secret: String },
    #[error("Secret '{secret}' not found")]
    SecretNotFound { secret: String },
    #[error("A project id is required to resolve '{needed_by}'")]
    ProjectIdRequired { needed_by: String },
    #[error("Project alias '{alias}' is not registered")]
    ProjectAliasNotFound { alias: String },
}

impl Failure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Failure::LayerNotFound { .. } => FailureKind::LayerNotFound,
            Failure::CyclicInheritance { .. } => FailureKind::CyclicInheritance,
            Failure::SecretStoreUnavailable { .. } => FailureKind::SecretStoreUnavailable,
            Failure::DecryptionKeyUnavailable { .. } => FailureKind::DecryptionKeyUnavailable,
            Failure::SecretNotFound { .. } => FailureKind::SecretNotFound,
            Failure::ProjectIdRequired { .. } => FailureKind::ProjectIdRequired,
            Failure::ProjectAliasNotFound { .. } => FailureKind::ProjectAliasNotFound,
        }
    }

    /// Secret name involved, if any.
    pub fn secret_name(&self) -> Option<&str> {
        match self {
            Failure::SecretStoreUnavailable { secret, .. }
            | Failure::DecryptionKeyUnavailable { secret }
            | Failure::SecretNotFound { secret } => Some(secret),
            _ => None,
        }
    }

    /// Project alias involved, if any.
    pub fn alias(&self) -> Option<&str> {
        match self {
            Failure::ProjectAliasNotFound { alias } => Some(alias),
            _ => None,
        }
    }

    /// Layer involved, if any.
    pub fn layer(&self) -> Option<&str> {
        match self {
            Failure::LayerNotFound { layer } | Failure::CyclicInheritance { layer, .. } => {
                Some(layer)
            }
            _ => None,
        }
    }
}

/// A [`Failure`] tied to the variable that could not be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Could not resolve '{variable}' for profile '{profile}': {failure}")]
pub struct VariableFailure {
    /// Profile being evaluated (the side-load profile for prefixed variables)
    pub profile: String,
    /// Final variable name, including any side-load prefix
    pub variable: String,
    #[source]
    pub failure: Failure,
}

impl VariableFailure {
    pub fn new(profile: impl Into<String>, variable: impl Into<String>, failure: Failure) -> Self {
        Self {
            profile: profile.into(),
            variable: variable.into(),
            failure,
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.failure.kind()
    }
}
