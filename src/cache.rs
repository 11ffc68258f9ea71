//! Memoization of resolved secret values.

use crate::failure::Failure;
use crate::provider::{SecretError, SecretsProvider};
use std::collections::HashMap;

/// Secret values resolved so far, keyed by secret name.
///
/// Entries live as long as the cache and are never invalidated. Failed
/// lookups are not stored, so the next request asks the provider again.
#[derive(Debug, Default)]
pub struct SecretCache {
    values: HashMap<String, String>,
}

impl SecretCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `name`, asking `provider` on a miss.
    pub fn get_or_resolve(
        &mut self,
        name: &str,
        provider: &dyn SecretsProvider,
    ) -> Result<String, Failure> {
        if let Some(value) = self.values.get(name) {
            tracing::debug!(secret = name, "secret cache hit");
            return Ok(value.clone());
        }

        tracing::debug!(secret = name, provider = provider.name(), "resolving secret");
        let value = match provider.get(name) {
            Ok(Some(value)) => value,
            Ok(None) => {
                return Err(Failure::SecretNotFound {
                    secret: name.to_string(),
                });
            }
            Err(error) => return Err(secret_failure(name, error)),
        };

        self.values.insert(name.to_string(), value.clone());
        Ok(value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn secret_failure(name: &str, error: SecretError) -> Failure {
    match error {
        SecretError::StoreUnavailable(detail) => Failure::SecretStoreUnavailable {
            secret: name.to_string(),
            detail,
        },
        SecretError::KeyUnavailable => Failure::DecryptionKeyUnavailable {
            secret: name.to_string(),
        },
        SecretError::ProjectIdRequired => Failure::ProjectIdRequired {
            needed_by: format!("secret:{}", name),
        },
    }
}
