//! Remediation hints for resolution failures.
//!
//! Failures carry identifiers only; this module turns them into the next
//! command a developer should run.

use crate::failure::{Failure, VariableFailure};
use crate::projects::DEFAULT_PROJECTS_FILE;
use colored::Colorize;
use std::fmt;

/// A headline and the steps that fix it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guidance {
    pub headline: String,
    pub steps: Vec<String>,
}

impl Guidance {
    /// Guidance for a failure on its own.
    pub fn for_failure(failure: &Failure) -> Self {
        Self {
            headline: failure.to_string(),
            steps: steps(failure),
        }
    }

    /// Guidance for a failure of one variable.
    pub fn for_variable(failure: &VariableFailure) -> Self {
        Self {
            headline: failure.to_string(),
            steps: steps(&failure.failure),
        }
    }
}

impl fmt::Display for Guidance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", "✗".red(), self.headline.bold())?;
        if !self.steps.is_empty() {
            writeln!(f, "\nTo fix this:")?;
            for (i, step) in self.steps.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, step)?;
            }
        }
        Ok(())
    }
}

fn steps(failure: &Failure) -> Vec<String> {
    match failure {
        Failure::LayerNotFound { layer } => vec![
            format!(
                "Define the layer in your layer document: {}",
                format!("[layers.{}]", layer).cyan()
            ),
            "Or pick an existing profile (see 'envlayer show --help')".to_string(),
        ],
        Failure::CyclicInheritance { chain, .. } => vec![format!(
            "Remove one 'inherits' entry from the loop {}",
            chain.join(" -> ").cyan()
        )],
        Failure::SecretStoreUnavailable { secret, .. } => vec![
            format!(
                "Configure a secrets provider: {} or pass {}",
                "envlayer config init".cyan(),
                "--provider dotenv:.secrets.env".cyan()
            ),
            format!(
                "Then store the secret: {}",
                format!("envlayer secret set {}", secret).cyan()
            ),
        ],
        Failure::DecryptionKeyUnavailable { .. } => vec![
            "Unlock the system keychain (or log in to the desktop session) and retry".to_string(),
            format!(
                "In CI, read secrets from the environment instead: {}",
                "--provider env://".cyan()
            ),
        ],
        Failure::SecretNotFound { secret } => vec![format!(
            "Store the secret: {}",
            format!("envlayer secret set {}", secret).cyan()
        )],
        Failure::ProjectIdRequired { .. } => vec![
            format!(
                "Set the project explicitly: {}",
                "export PROJECT_ID=<project-id>".cyan()
            ),
            format!(
                "Or register an alias in {}: {}",
                DEFAULT_PROJECTS_FILE.cyan(),
                "envlayer project set <alias> <project-id>".cyan()
            ),
        ],
        Failure::ProjectAliasNotFound { alias } => vec![
            format!(
                "Register the alias: {}",
                format!("envlayer project set {} <project-id>", alias).cyan()
            ),
            format!(
                "Or add {} to {}",
                format!("{}=<project-id>", alias).cyan(),
                DEFAULT_PROJECTS_FILE.cyan()
            ),
        ],
    }
}
