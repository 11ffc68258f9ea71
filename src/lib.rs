//! # envlayer
//!
//! Layered environment profiles, loaded atomically into the process
//! environment.
//!
//! Profiles are layers declared in TOML or JSON documents. A layer inherits
//! from at most one parent and maps variable names to literals, secret
//! references (`secret:<name>`) or project alias references
//! (`$.projects.<alias>`). A [`Loader`] resolves a profile, evaluates every
//! variable and applies the result all at once: a load that fails leaves the
//! environment exactly as it was.
//!
//! ## Example
//!
//! ```rust,no_run
//! use envlayer::{LayerStore, LoadRequest, Loader, ProjectsFile};
//! use envlayer::provider::SecretsProvider;
//!
//! # fn main() -> envlayer::Result<()> {
//! let store = LayerStore::from_paths(&["environments.toml"])?;
//! let mut loader = Loader::new(store)
//!     .with_secrets(Box::<dyn SecretsProvider>::try_from("keyring://")?)
//!     .with_projects(Box::new(ProjectsFile::new(".projects")));
//!
//! // Load `dev`, with the `e2e` profile available under TARGET_*
//! let report = loader.load(&LoadRequest::new("dev").side_load("e2e"))?;
//! println!("loaded {} variables", report.variables.len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod environment;
mod error;
pub mod evaluator;
pub mod failure;
pub mod guidance;
pub mod loader;
pub mod projects;
pub mod provider;
pub mod resolver;
pub mod validation;

#[cfg(test)]
mod tests;

pub use cache::SecretCache;
pub use config::{GlobalConfig, GlobalDefaults};
pub use environment::{Environment, MemoryEnvironment, ProcessEnvironment};
pub use error::{EnvLayerError, Result};
pub use evaluator::{FailurePolicy, Origin, ResolvedVariable, ResolvedVariableSet};
pub use failure::{Failure, FailureKind, VariableFailure};
pub use guidance::Guidance;
pub use loader::{LoadPhase, LoadReport, LoadRequest, LoadState, Loader, SIDE_LOAD_PREFIX};
pub use projects::{ProjectError, ProjectIdResolver, ProjectsFile};
pub use resolver::{FlatTable, resolve_layer_chain};
pub use validation::{Rejection, RequiredVariables, StagedValidator};

pub use envlayer_core::{
    Expression, Layer, LayerDocument, LayerStore, ParseError, ProjectMap, Scalar, SourceDocument,
};
