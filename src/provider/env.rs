use super::{SecretError, SecretsProvider};
use crate::{EnvLayerError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

/// Configuration for the environment variables provider.
///
/// `env://` reads secrets by name; `env://PREFIX_` reads `PREFIX_<NAME>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Prepended to the variable name looked up
    #[serde(default)]
    pub prefix: String,
}

impl TryFrom<&Url> for EnvConfig {
    type Error = EnvLayerError;

    fn try_from(url: &Url) -> std::result::Result<Self, Self::Error> {
        if url.scheme() != "env" {
            return Err(EnvLayerError::ProviderOperationFailed(format!(
                "Invalid scheme '{}' for env provider",
                url.scheme()
            )));
        }

        Ok(Self {
            prefix: url.host_str().unwrap_or_default().to_string(),
        })
    }
}

/// A read-only provider that reads secrets from environment variables.
///
/// A secret named `jwt-secret` is read from `JWT_SECRET` (after the optional
/// prefix). Useful in CI, where secrets arrive as masked variables.
pub struct EnvProvider {
    config: EnvConfig,
}

crate::register_provider! {
    struct: EnvProvider,
    config: EnvConfig,
    name: "env",
    description: "Read-only environment variables",
    schemes: ["env"],
    examples: ["env://", "env://CI_SECRET_"],
}

impl EnvProvider {
    pub fn new(config: EnvConfig) -> Self {
        Self { config }
    }

    fn variable_name(&self, name: &str) -> String {
        let normalized: String = name
            .chars()
            .map(|c| match c {
                '-' | '.' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        format!("{}{}", self.config.prefix, normalized)
    }
}

impl SecretsProvider for EnvProvider {
    fn name(&self) -> &'static str {
        Self::PROVIDER_NAME
    }

    fn get(&self, name: &str) -> std::result::Result<Option<String>, SecretError> {
        Ok(env::var(self.variable_name(name)).ok())
    }

    fn set(&self, _name: &str, _value: &str) -> Result<()> {
        Err(EnvLayerError::ProviderOperationFailed(
            "Environment variable provider is read-only. Set variables in your shell or process environment.".to_string()
        ))
    }

    fn allows_set(&self) -> bool {
        false
    }
}
