use super::{SecretError, SecretsProvider};
use crate::{EnvLayerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use url::Url;

/// File used when a dotenv URI names no path.
pub const DEFAULT_SECRETS_FILE: &str = ".secrets.env";

/// Configuration for the dotenv provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DotEnvConfig {
    /// Path to the secrets file
    pub path: PathBuf,
}

impl Default for DotEnvConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SECRETS_FILE),
        }
    }
}

impl TryFrom<&Url> for DotEnvConfig {
    type Error = EnvLayerError;

    /// `dotenv://` uses the default file, `dotenv:///abs/path` an absolute
    /// path and `dotenv://dir/file` a path relative to the working directory.
    fn try_from(url: &Url) -> std::result::Result<Self, Self::Error> {
        if url.scheme() != "dotenv" {
            return Err(EnvLayerError::ProviderOperationFailed(format!(
                "Invalid scheme '{}' for dotenv provider",
                url.scheme()
            )));
        }

        let host = url.host_str().filter(|h| !h.is_empty());
        let path = match (host, url.path()) {
            (Some(host), path) => PathBuf::from(format!("{}{}", host, path)),
            (None, path) if !path.is_empty() && path != "/" => PathBuf::from(path),
            _ => return Ok(Self::default()),
        };

        Ok(Self { path })
    }
}

/// Stores secrets as `name=value` lines in a local file.
///
/// Lookups re-read the file, so edits made by other processes are seen on the
/// next uncached resolution.
pub struct DotEnvProvider {
    config: DotEnvConfig,
}

crate::register_provider! {
    struct: DotEnvProvider,
    config: DotEnvConfig,
    name: "dotenv",
    description: "Local secrets file",
    schemes: ["dotenv"],
    examples: ["dotenv://.secrets.env", "dotenv:/path/to/.secrets.env"],
}

impl DotEnvProvider {
    pub fn new(config: DotEnvConfig) -> Self {
        Self { config }
    }

    fn load_secrets(&self) -> Result<BTreeMap<String, String>> {
        let mut vars = BTreeMap::new();
        let entries = dotenvy::from_path_iter(&self.config.path)?;
        for item in entries {
            let (key, value) = item?;
            vars.insert(key, value);
        }
        Ok(vars)
    }

    fn save_secrets(&self, vars: &BTreeMap<String, String>) -> Result<()> {
        let mut content = String::new();
        for (key, value) in vars {
            content.push_str(&format!("{}={}\n", key, quote(value)));
        }

        if let Some(parent) = self.config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.config.path, content)?;
        Ok(())
    }
}

impl SecretsProvider for DotEnvProvider {
    fn name(&self) -> &'static str {
        Self::PROVIDER_NAME
    }

    fn get(&self, name: &str) -> std::result::Result<Option<String>, SecretError> {
        if !self.config.path.exists() {
            return Err(SecretError::StoreUnavailable(format!(
                "{} does not exist",
                self.config.path.display()
            )));
        }

        let vars = self
            .load_secrets()
            .map_err(|e| SecretError::StoreUnavailable(e.to_string()))?;
        Ok(vars.get(&storage_key(name)).cloned())
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        let mut vars = if self.config.path.exists() {
            self.load_secrets()?
        } else {
            BTreeMap::new()
        };
        vars.insert(storage_key(name), value.to_string());
        self.save_secrets(&vars)
    }
}

/// Key a secret is stored under: `jwt-secret` becomes `JWT_SECRET`.
fn storage_key(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '-' | '.' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

fn quote(value: &str) -> String {
    // Single quotes are taken literally, double quotes expand `$` and escapes
    if !value.contains('\'') && !value.contains('\n') {
        return format!("'{}'", value);
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '$' => quoted.push_str("\\$"),
            '\n' => quoted.push_str("\\n"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
