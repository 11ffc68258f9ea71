//! # Secrets providers
//!
//! Secret references (`secret:<name>`) are resolved through a
//! [`SecretsProvider`]. Providers are selected from a URI string and looked up
//! in a registry that each backend joins through `register_provider!`.
//!
//! ## Available Providers
//!
//! - [`KeyringProvider`]: system keychain
//! - [`DotEnvProvider`]: local `.secrets.env` file store
//! - [`EnvProvider`]: process environment (read-only)
//!
//! ## URI-Based Configuration
//!
//! ```text
//! keyring://
//! dotenv:/path/to/.secrets.env
//! dotenv://.secrets.env
//! env://
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use envlayer::provider::SecretsProvider;
//!
//! let provider = Box::<dyn SecretsProvider>::try_from("dotenv:.secrets.env")?;
//! provider.set("jwt-secret", "s3cr3t")?;
//! assert_eq!(provider.get("jwt-secret")?, Some("s3cr3t".to_string()));
//! ```

use crate::{EnvLayerError, Result};
use std::convert::TryFrom;
use thiserror::Error;
use url::Url;

pub mod dotenv;
pub mod env;
pub mod keyring;
#[macro_use]
pub mod macros;


pub use dotenv::{DotEnvConfig, DotEnvProvider};
pub use env::{EnvConfig, EnvProvider};
pub use keyring::{KeyringConfig, KeyringProvider};

/// Macro support types
pub use macros::{PROVIDER_REGISTRY, ProviderRegistration};

/// Information about a secrets provider.
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// The canonical name of the provider (e.g., "keyring", "dotenv").
    pub name: &'static str,
    /// A human-readable description of what the provider does.
    pub description: &'static str,
    /// Example URIs showing how to configure this provider.
    pub examples: &'static [&'static str],
}

impl ProviderInfo {
    /// Formats as `name: description (e.g., example1, example2)`.
    pub fn display_with_examples(&self) -> String {
        if self.examples.is_empty() {
            format!("{}: {}", self.name, self.description)
        } else {
            format!(
                "{}: {} (e.g., {})",
                self.name,
                self.description,
                self.examples.join(", ")
            )
        }
    }
}

/// Returns metadata for every registered provider.
pub fn providers() -> Vec<ProviderInfo> {
    PROVIDER_REGISTRY
        .iter()
        .map(|reg| reg.info.clone())
        .collect()
}

/// Why a provider could not produce a secret.
///
/// A missing secret is not an error; providers return `Ok(None)` for it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretError {
    /// The backing store does not exist or cannot be reached.
    #[error("secret store unavailable: {0}")]
    StoreUnavailable(String),
    /// The store exists but the key protecting it is not available.
    #[error("decryption key unavailable")]
    KeyUnavailable,
    /// The store is scoped to a project and no project id is known.
    #[error("project id required")]
    ProjectIdRequired,
}

/// Interface for secret storage backends.
///
/// Providers are blocking. A backend that talks to a remote service is
/// expected to enforce its own timeout and report it as
/// [`SecretError::StoreUnavailable`].
pub trait SecretsProvider: Send + Sync {
    /// Retrieves a secret value.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))` if the secret exists
    /// - `Ok(None)` if the store is reachable but has no such secret
    /// - `Err` with the reason the store could not answer
    fn get(&self, name: &str) -> std::result::Result<Option<String>, SecretError>;

    /// Stores a secret value.
    ///
    /// # Errors
    ///
    /// Should fail when [`allows_set`](SecretsProvider::allows_set) returns `false`.
    fn set(&self, name: &str, value: &str) -> Result<()>;

    /// Returns whether this provider supports setting values.
    fn allows_set(&self) -> bool {
        true
    }

    /// Returns the name of this provider.
    fn name(&self) -> &'static str;
}

/// Provider used when none is configured; every lookup reports the store as
/// unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSecretStore;

impl SecretsProvider for NoSecretStore {
    fn get(&self, _name: &str) -> std::result::Result<Option<String>, SecretError> {
        Err(SecretError::StoreUnavailable(
            "no secrets provider configured".to_string(),
        ))
    }

    fn set(&self, _name: &str, _value: &str) -> Result<()> {
        Err(EnvLayerError::ProviderOperationFailed(
            "No secrets provider configured. Use --provider or run 'envlayer config init'."
                .to_string(),
        ))
    }

    fn allows_set(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

impl TryFrom<String> for Box<dyn SecretsProvider> {
    type Error = EnvLayerError;

    fn try_from(s: String) -> Result<Self> {
        Self::try_from(&s as &str)
    }
}

impl TryFrom<&str> for Box<dyn SecretsProvider> {
    type Error = EnvLayerError;

    /// Creates a provider from a URI string.
    ///
    /// Accepts full URIs (`keyring://`), path forms (`dotenv:/abs/.env`,
    /// `dotenv:relative/.env`) and bare provider names (`env`).
    fn try_from(s: &str) -> Result<Self> {
        let (scheme, rest) = match s.split_once(':') {
            Some((scheme, rest)) => (scheme, rest),
            None => (s, ""),
        };

        let is_valid_scheme = PROVIDER_REGISTRY
            .iter()
            .any(|reg| reg.schemes.contains(&scheme));
        if !is_valid_scheme {
            return Err(EnvLayerError::ProviderNotFound(scheme.to_string()));
        }

        let url_string = match rest {
            "" => format!("{}://", scheme),
            s if s.starts_with("//") => format!("{}:{}", scheme, s),
            // Absolute paths keep their leading slash after the empty authority
            s if s.starts_with('/') => format!("{}://{}", scheme, s),
            s => format!("{}://{}", scheme, s),
        };

        let proper_url = Url::parse(&url_string).map_err(|e| {
            EnvLayerError::ProviderOperationFailed(format!(
                "Invalid provider specification '{}': {}",
                s, e
            ))
        })?;

        Self::try_from(&proper_url)
    }
}

impl TryFrom<&Url> for Box<dyn SecretsProvider> {
    type Error = EnvLayerError;

    fn try_from(url: &Url) -> Result<Self> {
        let scheme = url.scheme();

        let registration = PROVIDER_REGISTRY
            .iter()
            .find(|reg| reg.schemes.contains(&scheme))
            .ok_or_else(|| EnvLayerError::ProviderNotFound(scheme.to_string()))?;

        (registration.factory)(url)
    }
}
