//! User-level configuration (`~/.config/envlayer/config.toml`).

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Layer document read when none is given.
pub const DEFAULT_DOCUMENT: &str = "environments.toml";

/// Global user configuration.
///
/// ```toml
/// [defaults]
/// provider = "keyring://"
/// profile = "dev"
/// documents = ["environments.toml", "environments.local.toml"]
/// projects_file = ".projects"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct GlobalConfig {
    #[serde(default)]
    pub defaults: GlobalDefaults,
}

/// Default settings in the global configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct GlobalDefaults {
    /// Secrets provider URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Profile loaded when none is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Layer documents, merged in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<PathBuf>,
    /// Project alias mapping file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects_file: Option<PathBuf>,
}

impl GlobalConfig {
    /// Path of the configuration file in the platform config directory.
    pub fn path() -> io::Result<PathBuf> {
        use directories::ProjectDirs;
        let dirs = ProjectDirs::from("", "", "envlayer").ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "Could not find config directory")
        })?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Loads the configuration, or `None` if there is no file yet.
    pub fn load() -> Result<Option<Self>> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(toml::from_str(&content)?))
    }

    /// Saves the configuration, creating the config directory if needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Configured documents, or [`DEFAULT_DOCUMENT`].
    pub fn documents(&self) -> Vec<PathBuf> {
        if self.defaults.documents.is_empty() {
            vec![PathBuf::from(DEFAULT_DOCUMENT)]
        } else {
            self.defaults.documents.clone()
        }
    }
}
