use super::{SecretError, SecretsProvider};
use crate::{EnvLayerError, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for the keyring provider.
///
/// `keyring://` stores entries under the `envlayer` service namespace;
/// `keyring://myapp` uses `myapp` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyringConfig {
    /// Prefix of the keychain service name
    pub namespace: String,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            namespace: "envlayer".to_string(),
        }
    }
}

impl TryFrom<&Url> for KeyringConfig {
    type Error = EnvLayerError;

    fn try_from(url: &Url) -> std::result::Result<Self, Self::Error> {
        if url.scheme() != "keyring" {
            return Err(EnvLayerError::ProviderOperationFailed(format!(
                "Invalid scheme '{}' for keyring provider",
                url.scheme()
            )));
        }

        Ok(match url.host_str().filter(|h| !h.is_empty()) {
            Some(namespace) => Self {
                namespace: namespace.to_string(),
            },
            None => Self::default(),
        })
    }
}

/// Provider for storing secrets in the system keychain.
///
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service API
///
/// Secrets are stored with service `{namespace}/{name}` and the current
/// system username as account.
pub struct KeyringProvider {
    config: KeyringConfig,
}

crate::register_provider! {
    struct: KeyringProvider,
    config: KeyringConfig,
    name: "keyring",
    description: "Uses system keychain (Recommended)",
    schemes: ["keyring"],
    examples: ["keyring://"],
}

impl KeyringProvider {
    pub fn new(config: KeyringConfig) -> Self {
        Self { config }
    }

    fn entry(&self, name: &str) -> std::result::Result<Entry, keyring::Error> {
        let service = format!("{}/{}", self.config.namespace, name);
        Entry::new(&service, &whoami::username())
    }
}

/// Maps keychain errors onto the provider failure reasons.
fn classify(err: keyring::Error) -> SecretError {
    match err {
        keyring::Error::NoStorageAccess(_) => SecretError::KeyUnavailable,
        other => SecretError::StoreUnavailable(other.to_string()),
    }
}

impl SecretsProvider for KeyringProvider {
    fn name(&self) -> &'static str {
        Self::PROVIDER_NAME
    }

    fn get(&self, name: &str) -> std::result::Result<Option<String>, SecretError> {
        let entry = self.entry(name).map_err(classify)?;
        match entry.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(classify(e)),
        }
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        let entry = self.entry(name)?;
        entry.set_password(value)?;
        Ok(())
    }
}
