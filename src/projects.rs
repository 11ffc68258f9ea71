//! Project alias resolution (`$.projects.<alias>`).

use envlayer_core::ProjectMap;
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default name of the alias mapping file.
pub const DEFAULT_PROJECTS_FILE: &str = ".projects";

/// Why an alias could not be mapped to a project id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectError {
    /// No alias mapping is available at all.
    #[error("no project mapping available: {0}")]
    MappingUnavailable(String),
    /// The mapping exists but does not register this alias.
    #[error("alias not registered")]
    AliasNotFound,
}

/// Maps a short alias ("dev") to a cloud project id.
pub trait ProjectIdResolver: Send + Sync {
    fn resolve(&self, alias: &str) -> Result<String, ProjectError>;

    /// Identity of the mapping's current content.
    ///
    /// A loader only reuses a committed load while this stays the same.
    /// Resolvers whose mapping never changes return `None`.
    fn fingerprint(&self) -> Option<u64> {
        None
    }
}

impl ProjectIdResolver for ProjectMap {
    fn resolve(&self, alias: &str) -> Result<String, ProjectError> {
        self.get(alias)
            .map(str::to_string)
            .ok_or(ProjectError::AliasNotFound)
    }
}

/// Resolver used when no mapping is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProjects;

impl ProjectIdResolver for NoProjects {
    fn resolve(&self, _alias: &str) -> Result<String, ProjectError> {
        Err(ProjectError::MappingUnavailable(
            "no project mapping configured".to_string(),
        ))
    }
}

/// Resolves aliases from a `.projects` file on disk.
///
/// The file is read on every lookup; results are not memoized.
#[derive(Debug, Clone)]
pub struct ProjectsFile {
    path: PathBuf,
}

impl ProjectsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Maps `alias` to `project_id`, creating the file when needed.
    ///
    /// Other lines and comments are left untouched.
    pub fn set(&self, alias: &str, project_id: &str) -> crate::Result<()> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                "# Project ids by alias\n".to_string()
            }
            Err(e) => return Err(e.into()),
        };

        fs::write(&self.path, ProjectMap::upsert(&text, alias, project_id))?;
        tracing::debug!(file = %self.path.display(), alias, "registered project alias");
        Ok(())
    }

    /// Reads and parses the mapping file.
    pub fn read(&self) -> Result<ProjectMap, ProjectError> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            ProjectError::MappingUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let map = ProjectMap::parse(&text);
        for line in map.skipped_lines() {
            tracing::warn!(
                file = %self.path.display(),
                line,
                "ignoring malformed line in project mapping, expected alias=project-id"
            );
        }
        Ok(map)
    }
}

impl ProjectIdResolver for ProjectsFile {
    fn resolve(&self, alias: &str) -> Result<String, ProjectError> {
        self.read()?.resolve(alias)
    }

    fn fingerprint(&self) -> Option<u64> {
        let text = fs::read_to_string(&self.path).ok()?;
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        Some(hasher.finish())
    }
}
