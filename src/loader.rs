//! Atomic loading of a profile into the environment.
//!
//! A load goes through four phases:
//!
//! 1. **Staging**: the profile (and optional side-load profile) is resolved
//!    and evaluated without touching the environment, then handed to every
//!    registered [`StagedValidator`].
//! 2. **Clearing**: variables written by the previous load are removed.
//! 3. **Applying**: staged variables are written.
//! 4. **Committed**: the new [`LoadState`] replaces the old one.
//!
//! A failure or validator rejection during staging aborts the load with the
//! environment and the committed state untouched. Variables that were already set before the first
//! load are never written, recorded or cleared.

use crate::cache::SecretCache;
use crate::environment::{Environment, ProcessEnvironment};
use crate::evaluator::{Evaluation, Evaluator, FailurePolicy, Origin, ResolvedVariableSet};
use crate::failure::{Failure, VariableFailure};
use crate::projects::{NoProjects, ProjectIdResolver};
use crate::provider::{NoSecretStore, SecretsProvider};
use crate::resolver::resolve_layer_chain;
use crate::validation::StagedValidator;
use crate::{EnvLayerError, Result};
use envlayer_core::{LayerStore, SourceDocument};
use std::collections::BTreeMap;

/// Prefix given to every variable of a side-loaded profile.
pub const SIDE_LOAD_PREFIX: &str = "TARGET_";

/// Phase of the most recent load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadPhase {
    #[default]
    Idle,
    Staging,
    Clearing,
    Applying,
    Committed,
    /// Staging failed; nothing was changed.
    Aborted,
}

/// What to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub profile: String,
    /// Profile published under [`SIDE_LOAD_PREFIX`]
    pub side_load: Option<String>,
    pub policy: FailurePolicy,
    /// Reload even when the committed load is identical
    pub force_reload: bool,
}

impl LoadRequest {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            side_load: None,
            policy: FailurePolicy::default(),
            force_reload: false,
        }
    }

    pub fn side_load(mut self, profile: impl Into<String>) -> Self {
        self.side_load = Some(profile.into());
        self
    }

    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn force_reload(mut self, force: bool) -> Self {
        self.force_reload = force;
        self
    }
}

/// Record of the last committed load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadState {
    pub profile: String,
    pub side_load: Option<String>,
    pub sources: Vec<SourceDocument>,
    /// Fingerprint of the project mapping at load time
    pub projects: Option<u64>,
    pub policy: FailurePolicy,
    /// Exactly the variables this load wrote, with the values written
    pub applied: BTreeMap<String, String>,
    pub variables: ResolvedVariableSet,
    pub failures: Vec<VariableFailure>,
    pub cycles: Vec<Failure>,
    /// Side-loaded names dropped because the primary profile defines them
    pub collisions: Vec<String>,
}

impl LoadState {
    fn matches(
        &self,
        request: &LoadRequest,
        sources: &[SourceDocument],
        projects: Option<u64>,
    ) -> bool {
        self.profile == request.profile
            && self.side_load == request.side_load
            && self.policy == request.policy
            && self.sources == sources
            && self.projects == projects
    }
}

/// Result of [`Loader::load`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub variables: ResolvedVariableSet,
    /// Variables left out under [`FailurePolicy::Permissive`]
    pub failures: Vec<VariableFailure>,
    /// Inheritance cycles that were skipped
    pub cycles: Vec<Failure>,
    /// Side-loaded names dropped because the primary profile defines them
    pub collisions: Vec<String>,
    /// `true` when the committed load was reused and nothing was re-resolved
    pub reused: bool,
}

impl LoadReport {
    fn from_state(state: &LoadState, reused: bool) -> Self {
        Self {
            variables: state.variables.clone(),
            failures: state.failures.clone(),
            cycles: state.cycles.clone(),
            collisions: state.collisions.clone(),
            reused,
        }
    }
}

struct Staged {
    variables: ResolvedVariableSet,
    failures: Vec<VariableFailure>,
    cycles: Vec<Failure>,
    collisions: Vec<String>,
}

/// Loading context: layers, secret backends, cache and the committed state.
pub struct Loader<E: Environment = ProcessEnvironment> {
    store: LayerStore,
    secrets: Box<dyn SecretsProvider>,
    projects: Box<dyn ProjectIdResolver>,
    validators: Vec<Box<dyn StagedValidator>>,
    env: E,
    cache: SecretCache,
    preexisting: Option<BTreeMap<String, String>>,
    state: Option<LoadState>,
    phase: LoadPhase,
}

impl Loader<ProcessEnvironment> {
    /// A loader writing the real process environment.
    pub fn new(store: LayerStore) -> Self {
        Self::with_environment(store, ProcessEnvironment)
    }
}

impl<E: Environment> Loader<E> {
    pub fn with_environment(store: LayerStore, env: E) -> Self {
        Self {
            store,
            secrets: Box::new(NoSecretStore),
            projects: Box::new(NoProjects),
            validators: Vec::new(),
            env,
            cache: SecretCache::new(),
            preexisting: None,
            state: None,
            phase: LoadPhase::Idle,
        }
    }

    pub fn with_secrets(mut self, secrets: Box<dyn SecretsProvider>) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn with_projects(mut self, projects: Box<dyn ProjectIdResolver>) -> Self {
        self.projects = projects;
        self
    }

    /// Adds a check run on every staged set before it is applied.
    pub fn with_validator(mut self, validator: Box<dyn StagedValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Swaps in re-read layer documents. The next load sees new sources and
    /// does not reuse the committed state.
    pub fn replace_store(&mut self, store: LayerStore) {
        self.store = store;
    }

    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    pub fn secrets(&self) -> &dyn SecretsProvider {
        self.secrets.as_ref()
    }

    pub fn cache(&self) -> &SecretCache {
        &self.cache
    }

    pub fn environment(&self) -> &E {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut E {
        &mut self.env
    }

    /// The last committed load, if any.
    pub fn state(&self) -> Option<&LoadState> {
        self.state.as_ref()
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    /// Loads a profile into the environment.
    ///
    /// # Errors
    ///
    /// - [`EnvLayerError::Failure`] with [`Failure::LayerNotFound`] when the
    ///   profile, the side-load profile or one of their ancestors is missing
    /// - [`EnvLayerError::Unresolved`] for the first failing variable under
    ///   [`FailurePolicy::Strict`]
    /// - [`EnvLayerError::Rejected`] when a [`StagedValidator`] refuses the
    ///   staged set
    ///
    /// In every case the environment and [`Loader::state`] are unchanged.
    pub fn load(&mut self, request: &LoadRequest) -> Result<LoadReport> {
        let projects = self.projects.fingerprint();
        if !request.force_reload {
            if let Some(state) = &self.state {
                if state.matches(request, self.store.sources(), projects) {
                    let drifted = self.drifted_variables();
                    if drifted.is_empty() {
                        tracing::debug!(profile = %request.profile, "reusing committed load");
                        return Ok(LoadReport::from_state(state, true));
                    }
                    tracing::debug!(
                        profile = %request.profile,
                        drifted = ?drifted,
                        "applied variables changed since last load, reloading"
                    );
                }
            }
        }

        let preexisting = self
            .preexisting
            .get_or_insert_with(|| self.env.snapshot())
            .clone();

        self.enter(LoadPhase::Staging);
        let staged = match self.stage(request, &preexisting) {
            Ok(staged) => staged,
            Err(error) => {
                self.enter(LoadPhase::Aborted);
                return Err(error);
            }
        };

        self.enter(LoadPhase::Clearing);
        if let Some(previous) = self.state.take() {
            for name in previous.applied.keys() {
                self.env.remove(name);
            }
        }

        self.enter(LoadPhase::Applying);
        let mut applied = BTreeMap::new();
        for (name, variable) in &staged.variables {
            if variable.origin == Origin::PreexistingEnvironment {
                continue;
            }
            self.env.set(name, &variable.value);
            applied.insert(name.clone(), variable.value.clone());
        }

        let state = LoadState {
            profile: request.profile.clone(),
            side_load: request.side_load.clone(),
            sources: self.store.sources().to_vec(),
            projects,
            policy: request.policy,
            applied,
            variables: staged.variables,
            failures: staged.failures,
            cycles: staged.cycles,
            collisions: staged.collisions,
        };
        let report = LoadReport::from_state(&state, false);
        self.state = Some(state);
        self.enter(LoadPhase::Committed);

        Ok(report)
    }

    /// Removes every variable the committed load wrote and forgets it.
    ///
    /// Returns the names removed. Cached secrets are kept.
    pub fn clear(&mut self) -> Vec<String> {
        let Some(state) = self.state.take() else {
            return Vec::new();
        };

        let names: Vec<String> = state.applied.into_keys().collect();
        for name in &names {
            self.env.remove(name);
        }
        tracing::debug!(count = names.len(), "cleared loaded variables");
        self.phase = LoadPhase::Idle;
        names
    }

    /// Applied variables whose current value differs from the value written.
    pub fn drifted_variables(&self) -> Vec<String> {
        let Some(state) = &self.state else {
            return Vec::new();
        };

        state
            .applied
            .iter()
            .filter(|(name, value)| self.env.get(name).as_deref() != Some(value.as_str()))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn stage(
        &mut self,
        request: &LoadRequest,
        preexisting: &BTreeMap<String, String>,
    ) -> Result<Staged> {
        let primary_table = resolve_layer_chain(&request.profile, &self.store)?;
        let side_table = request
            .side_load
            .as_deref()
            .map(|profile| resolve_layer_chain(profile, &self.store).map(|t| (profile, t)))
            .transpose()?;

        let mut evaluator = Evaluator {
            cache: &mut self.cache,
            secrets: self.secrets.as_ref(),
            projects: self.projects.as_ref(),
            preexisting,
            policy: request.policy,
        };

        let Evaluation {
            mut variables,
            mut failures,
        } = evaluator
            .evaluate(&request.profile, &primary_table, None)
            .map_err(EnvLayerError::from)?;
        let mut cycles = primary_table.cycles;
        let mut collisions = Vec::new();

        if let Some((profile, table)) = side_table {
            let side = evaluator
                .evaluate(profile, &table, Some(SIDE_LOAD_PREFIX))
                .map_err(EnvLayerError::from)?;
            for (name, variable) in side.variables {
                if variables.contains(&name) {
                    tracing::warn!(
                        variable = %name,
                        side_load = profile,
                        "primary profile already defines this name, side-loaded value dropped"
                    );
                    collisions.push(name);
                    continue;
                }
                variables.insert(name, variable);
            }
            failures.extend(side.failures);
            cycles.extend(table.cycles);
        }

        for validator in &self.validators {
            if !validator.should_validate(&variables, request) {
                continue;
            }
            if let Err(rejection) = validator.validate(&variables, request) {
                tracing::debug!(validator = validator.name(), "staged variables rejected");
                return Err(EnvLayerError::Rejected {
                    validator: validator.name().to_string(),
                    profile: request.profile.clone(),
                    rejection,
                });
            }
        }

        Ok(Staged {
            variables,
            failures,
            cycles,
            collisions,
        })
    }

    fn enter(&mut self, phase: LoadPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "load phase");
        self.phase = phase;
    }
}
