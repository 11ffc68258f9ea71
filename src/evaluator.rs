//! Evaluation of a flattened layer table into concrete values.

use crate::cache::SecretCache;
use crate::failure::{Failure, VariableFailure};
use crate::projects::{ProjectError, ProjectIdResolver};
use crate::provider::SecretsProvider;
use crate::resolver::FlatTable;
use envlayer_core::Expression;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

/// How evaluation reacts to a variable that cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FailurePolicy {
    /// Abort on the first failure.
    #[default]
    Strict,
    /// Leave the variable out and keep going.
    Permissive,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Strict => f.write_str("strict"),
            FailurePolicy::Permissive => f.write_str("permissive"),
        }
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    PreexistingEnvironment,
    ResolvedLiteral,
    ResolvedSecret,
    ResolvedProjectAlias,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Origin::PreexistingEnvironment => "environment",
            Origin::ResolvedLiteral => "literal",
            Origin::ResolvedSecret => "secret",
            Origin::ResolvedProjectAlias => "project",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVariable {
    pub value: String,
    pub origin: Origin,
}

impl ResolvedVariable {
    pub fn new(value: impl Into<String>, origin: Origin) -> Self {
        Self {
            value: value.into(),
            origin,
        }
    }
}

/// Resolved variables ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedVariableSet(BTreeMap<String, ResolvedVariable>);

impl ResolvedVariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedVariable> {
        self.0.get(name)
    }

    /// Value of a variable, if resolved.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|v| v.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, variable: ResolvedVariable) {
        self.0.insert(name.into(), variable);
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ResolvedVariable> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a ResolvedVariableSet {
    type Item = (&'a String, &'a ResolvedVariable);
    type IntoIter = btree_map::Iter<'a, String, ResolvedVariable>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for ResolvedVariableSet {
    type Item = (String, ResolvedVariable);
    type IntoIter = btree_map::IntoIter<String, ResolvedVariable>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Extend<(String, ResolvedVariable)> for ResolvedVariableSet {
    fn extend<T: IntoIterator<Item = (String, ResolvedVariable)>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

/// Outcome of evaluating one flattened table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub variables: ResolvedVariableSet,
    /// Variables left out under [`FailurePolicy::Permissive`]
    pub failures: Vec<VariableFailure>,
}

/// Everything needed to turn expressions into values.
pub struct Evaluator<'a> {
    pub cache: &'a mut SecretCache,
    pub secrets: &'a dyn SecretsProvider,
    pub projects: &'a dyn ProjectIdResolver,
    /// Variables present before the first load; they always win
    pub preexisting: &'a BTreeMap<String, String>,
    pub policy: FailurePolicy,
}

impl Evaluator<'_> {
    /// Evaluates every entry of `table`, in variable-name order.
    ///
    /// With a `prefix`, each variable is published as `<prefix><NAME>` and the
    /// pre-existing check is made against that prefixed name.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::Strict`], the first variable that fails.
    pub fn evaluate(
        &mut self,
        profile: &str,
        table: &FlatTable,
        prefix: Option<&str>,
    ) -> Result<Evaluation, VariableFailure> {
        let mut evaluation = Evaluation::default();

        for (name, expression) in &table.entries {
            let variable = match prefix {
                Some(prefix) => format!("{}{}", prefix, name),
                None => name.clone(),
            };

            if let Some(value) = self.preexisting.get(&variable) {
                evaluation.variables.insert(
                    variable,
                    ResolvedVariable::new(value.clone(), Origin::PreexistingEnvironment),
                );
                continue;
            }

            match self.evaluate_expression(&variable, expression) {
                Ok(resolved) => evaluation.variables.insert(variable, resolved),
                Err(failure) => {
                    let failure = VariableFailure::new(profile, variable, failure);
                    match self.policy {
                        FailurePolicy::Strict => return Err(failure),
                        FailurePolicy::Permissive => {
                            tracing::debug!(
                                variable = %failure.variable,
                                kind = %failure.kind(),
                                "omitting unresolved variable"
                            );
                            evaluation.failures.push(failure);
                        }
                    }
                }
            }
        }

        Ok(evaluation)
    }

    fn evaluate_expression(
        &mut self,
        variable: &str,
        expression: &Expression,
    ) -> Result<ResolvedVariable, Failure> {
        match expression {
            Expression::Literal(value) => Ok(ResolvedVariable::new(
                value.to_string(),
                Origin::ResolvedLiteral,
            )),
            Expression::Secret(name) => {
                let value = self.cache.get_or_resolve(name, self.secrets)?;
                Ok(ResolvedVariable::new(value, Origin::ResolvedSecret))
            }
            Expression::ProjectAlias(alias) => match self.projects.resolve(alias) {
                Ok(project_id) => Ok(ResolvedVariable::new(
                    project_id,
                    Origin::ResolvedProjectAlias,
                )),
                Err(ProjectError::AliasNotFound) => Err(Failure::ProjectAliasNotFound {
                    alias: alias.clone(),
                }),
                Err(ProjectError::MappingUnavailable(detail)) => {
                    tracing::debug!(alias = %alias, %detail, "no project mapping");
                    Err(Failure::ProjectIdRequired {
                        needed_by: variable.to_string(),
                    })
                }
            },
        }
    }
}
