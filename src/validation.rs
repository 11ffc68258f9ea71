//! Checks run against the staged variable set before a load is applied.
//!
//! Validators see every staged variable, including side-loaded `TARGET_`
//! names and variables kept from the pre-existing environment. A rejection
//! aborts the load with the environment and the committed state untouched.

use crate::evaluator::ResolvedVariableSet;
use crate::loader::LoadRequest;
use thiserror::Error;

/// Why a validator refused a staged set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct Rejection {
    pub reason: String,
    /// Variables that would have satisfied the validator
    pub missing: Vec<String>,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            missing: Vec::new(),
        }
    }

    pub fn with_missing(mut self, missing: Vec<String>) -> Self {
        self.missing = missing;
        self
    }
}

/// A check on staged variables, run at the end of staging.
pub trait StagedValidator: Send + Sync {
    /// Name reported when the validator rejects a load.
    fn name(&self) -> &str;

    /// Whether this validator applies to the staged set at all.
    fn should_validate(&self, _staged: &ResolvedVariableSet, _request: &LoadRequest) -> bool {
        true
    }

    fn validate(
        &self,
        staged: &ResolvedVariableSet,
        request: &LoadRequest,
    ) -> Result<(), Rejection>;
}

/// Requires a set of variables to be staged, optionally only while a trigger
/// variable holds a given value.
///
/// ```
/// use envlayer::RequiredVariables;
///
/// // Remote API tests need the side-loaded target's coordinates
/// let validator = RequiredVariables::new("remote-api", ["TARGET_PROJECT_ID", "TARGET_APP_ID"])
///     .when("TEST_API_MODE", "REMOTE");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredVariables {
    name: String,
    required: Vec<String>,
    trigger: Option<(String, String)>,
}

impl RequiredVariables {
    pub fn new<I, S>(name: impl Into<String>, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            required: required.into_iter().map(Into::into).collect(),
            trigger: None,
        }
    }

    /// Only validate while `variable` is staged with exactly `value`.
    pub fn when(mut self, variable: impl Into<String>, value: impl Into<String>) -> Self {
        self.trigger = Some((variable.into(), value.into()));
        self
    }
}

impl StagedValidator for RequiredVariables {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_validate(&self, staged: &ResolvedVariableSet, _request: &LoadRequest) -> bool {
        match &self.trigger {
            Some((variable, value)) => staged.value(variable) == Some(value.as_str()),
            None => true,
        }
    }

    fn validate(
        &self,
        staged: &ResolvedVariableSet,
        request: &LoadRequest,
    ) -> Result<(), Rejection> {
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|name| !staged.contains(name))
            .cloned()
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        let source = request.side_load.as_deref().unwrap_or(&request.profile);
        Err(Rejection::new(format!(
            "missing {} (expected from profile '{}')",
            missing.join(", "),
            source
        ))
        .with_missing(missing))
    }
}
