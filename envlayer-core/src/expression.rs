//! Value expressions declared by layer entries.
//!
//! Every entry value in a layer document is parsed exactly once into an
//! [`Expression`]. Three forms exist:
//!
//! ```toml
//! APP_ID = "my-app"                  # literal
//! STUB_DB = true                     # literal (scalar)
//! JWT_SECRET = "secret:jwt-secret"   # secret reference
//! PROJECT_ID = "$.projects.dev"      # project alias reference
//! ```
//!
//! Strings that look like a reference but are not a well-formed one
//! (`"secret:"`, `"$.projects"`, `"$.project.dev"`, ...) are rejected when the
//! document is parsed instead of silently becoming literals.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix marking a secret reference.
pub const SECRET_PREFIX: &str = "secret:";

/// Prefix marking a project alias reference.
pub const PROJECT_ALIAS_PREFIX: &str = "$.projects.";

const REFERENCE_MARKER: &str = "$.";

/// A scalar literal as written in a layer document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    /// JSON integers above `i64::MAX`
    Unsigned(u64),
    Float(f64),
    String(String),
}

impl fmt::Display for Scalar {
    /// Renders the scalar the way it is exported into the environment.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Unsigned(u) => write!(f, "{}", u),
            Scalar::Float(x) => f.write_str(&render_float(*x)),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

/// A parsed layer entry value.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Used as-is, rendered to a string at evaluation time.
    Literal(Scalar),
    /// Resolved through the secret cache and secrets provider.
    Secret(String),
    /// Resolved through the project id resolver.
    ProjectAlias(String),
}

impl Expression {
    /// Parses a raw document value into an expression.
    ///
    /// Non-string scalars are always literals. Strings are inspected once for
    /// the reference prefixes.
    pub fn parse(raw: Scalar) -> Result<Self, String> {
        let text = match raw {
            Scalar::String(text) => text,
            other => return Ok(Expression::Literal(other)),
        };

        if let Some(name) = text.strip_prefix(SECRET_PREFIX) {
            validate_reference_name(name, "secret name")?;
            return Ok(Expression::Secret(name.to_string()));
        }

        if let Some(alias) = text.strip_prefix(PROJECT_ALIAS_PREFIX) {
            validate_reference_name(alias, "project alias")?;
            if alias.contains('.') {
                return Err(format!(
                    "project alias '{}' must not contain '.'; use '{}<alias>'",
                    alias, PROJECT_ALIAS_PREFIX
                ));
            }
            return Ok(Expression::ProjectAlias(alias.to_string()));
        }

        if text.starts_with(REFERENCE_MARKER) {
            return Err(format!(
                "'{}' looks like a reference but is not one; project aliases are written '{}<alias>'",
                text, PROJECT_ALIAS_PREFIX
            ));
        }

        Ok(Expression::Literal(Scalar::String(text)))
    }

    /// Short label of the expression form, used in logs and listings.
    pub fn kind(&self) -> &'static str {
        match self {
            Expression::Literal(_) => "literal",
            Expression::Secret(_) => "secret",
            Expression::ProjectAlias(_) => "project-alias",
        }
    }
}

impl fmt::Display for Expression {
    /// Writes the expression back in document syntax.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::Secret(name) => write!(f, "{}{}", SECRET_PREFIX, name),
            Expression::ProjectAlias(alias) => write!(f, "{}{}", PROJECT_ALIAS_PREFIX, alias),
        }
    }
}

/// Shortest round-trip form with a fractional part for whole values (`1.0`)
/// and a signed, two-digit exponent outside `[1e-4, 1e16)`: `1e-05`, `1e+16`.
fn render_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    // Debug already switches to exponent form at the same thresholds
    let text = format!("{:?}", x);
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => text,
    }
}

fn validate_reference_name(name: &str, what: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("empty {}", what));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(format!("{} '{}' contains whitespace", what, name));
    }
    Ok(())
}
