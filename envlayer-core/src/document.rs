//! Layer documents and the merged layer store.
//!
//! A layer document declares named layers under a top-level `layers` table:
//!
//! ```toml
//! [layers.app]
//! APP_ID = "my-app"
//!
//! [layers.unit]
//! inherits = "app"
//! STUB_DB = true
//!
//! [layers.dev]
//! inherits = "app"
//! PROJECT_ID = "$.projects.dev"
//! JWT_SECRET = "secret:jwt-secret"
//! ```
//!
//! The same structure is accepted as JSON. Several documents can be combined
//! into one [`LayerStore`]; later documents extend and override earlier ones.

use crate::expression::{Expression, Scalar};
use crate::{ParseError, is_valid_identifier};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::Path;
use std::str::FromStr;

/// Label used for documents parsed from a string rather than a file.
pub const INLINE_LABEL: &str = "<inline>";

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    layers: BTreeMap<String, RawLayer>,
}

#[derive(Debug, Deserialize)]
struct RawLayer {
    #[serde(default)]
    inherits: Option<String>,
    #[serde(flatten)]
    entries: BTreeMap<String, Scalar>,
}

/// Identity of a parsed document.
///
/// Two documents compare equal only when both their origin and their content
/// digest match, so re-reading an edited file yields a different identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceDocument {
    /// File path or [`INLINE_LABEL`]
    pub origin: String,
    /// Hash of the document text
    pub digest: u64,
}

impl SourceDocument {
    fn new(origin: impl Into<String>, text: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        Self {
            origin: origin.into(),
            digest: hasher.finish(),
        }
    }
}

/// A named configuration layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Unique layer name
    pub name: String,
    /// Optional parent layer
    pub inherits: Option<String>,
    /// Upper-cased variable name to expression
    pub entries: BTreeMap<String, Expression>,
}

impl Layer {
    fn from_raw(name: String, raw: RawLayer) -> Result<Self, ParseError> {
        if !is_valid_layer_name(&name) {
            return Err(ParseError::Validation(format!(
                "Invalid layer name '{}': use letters, digits, '-' and '_'",
                name
            )));
        }

        if let Some(parent) = &raw.inherits {
            if !is_valid_layer_name(parent) {
                return Err(ParseError::Validation(format!(
                    "Layer '{}' inherits from invalid layer name '{}'",
                    name, parent
                )));
            }
        }

        let mut entries = BTreeMap::new();
        for (variable, value) in raw.entries {
            if !is_valid_identifier(&variable) {
                return Err(ParseError::InvalidExpression {
                    layer: name.clone(),
                    variable,
                    reason: "variable names must be alphanumeric or '_' and not start with a digit"
                        .into(),
                });
            }

            let normalized = variable.to_uppercase();
            if entries.contains_key(&normalized) {
                return Err(ParseError::DuplicateVariable {
                    layer: name.clone(),
                    variable: normalized,
                });
            }

            let expression =
                Expression::parse(value).map_err(|reason| ParseError::InvalidExpression {
                    layer: name.clone(),
                    variable: variable.clone(),
                    reason,
                })?;
            entries.insert(normalized, expression);
        }

        Ok(Self {
            name,
            inherits: raw.inherits,
            entries,
        })
    }
}

/// One parsed layer document.
#[derive(Debug, Clone)]
pub struct LayerDocument {
    source: SourceDocument,
    layers: Vec<Layer>,
}

impl LayerDocument {
    /// Parses a TOML document.
    pub fn from_toml(origin: impl Into<String>, text: &str) -> Result<Self, ParseError> {
        let raw: RawDocument = toml::from_str(text)?;
        Self::from_raw(SourceDocument::new(origin, text), raw)
    }

    /// Parses a JSON document.
    pub fn from_json(origin: impl Into<String>, text: &str) -> Result<Self, ParseError> {
        let raw: RawDocument = serde_json::from_str(text)?;
        Self::from_raw(SourceDocument::new(origin, text), raw)
    }

    /// Identity of this document.
    pub fn source(&self) -> &SourceDocument {
        &self.source
    }

    /// Layers declared by this document, ordered by name.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    fn from_raw(source: SourceDocument, raw: RawDocument) -> Result<Self, ParseError> {
        let layers = raw
            .layers
            .into_iter()
            .map(|(name, layer)| Layer::from_raw(name, layer))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { source, layers })
    }
}

impl FromStr for LayerDocument {
    type Err = ParseError;

    /// Parses an inline TOML document.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_toml(INLINE_LABEL, s)
    }
}

impl TryFrom<&Path> for LayerDocument {
    type Error = ParseError;

    /// Loads a document from disk, choosing the format from the extension.
    ///
    /// `.json` files are parsed as JSON, `.toml` files (or files without an
    /// extension) as TOML.
    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let content = fs::read_to_string(path).map_err(|e| {
            ParseError::Io(io::Error::new(
                e.kind(),
                format!("Failed to read layer document {}: {}", path.display(), e),
            ))
        })?;
        let origin = path.display().to_string();

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(origin, &content),
            Some("toml") | None => Self::from_toml(origin, &content),
            Some(_) => Err(ParseError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Read-only collection of layers merged from one or more documents.
#[derive(Debug, Clone, Default)]
pub struct LayerStore {
    layers: BTreeMap<String, Layer>,
    sources: Vec<SourceDocument>,
}

impl LayerStore {
    /// Merges documents in order.
    ///
    /// For a layer declared by several documents, entries are combined and a
    /// later document overrides same-named entries (and `inherits`) of an
    /// earlier one.
    pub fn from_documents(documents: impl IntoIterator<Item = LayerDocument>) -> Self {
        let mut store = Self::default();
        for document in documents {
            store.sources.push(document.source);
            for layer in document.layers {
                match store.layers.get_mut(&layer.name) {
                    Some(existing) => existing.merge_with(layer),
                    None => {
                        store.layers.insert(layer.name.clone(), layer);
                    }
                }
            }
        }
        store
    }

    /// Loads and merges documents from disk, in the given order.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ParseError> {
        let documents = paths
            .iter()
            .map(|path| LayerDocument::try_from(path.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_documents(documents))
    }

    /// Looks up a layer by name.
    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    /// Whether a layer with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    /// All layer names, sorted.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    /// Documents this store was built from, in merge order.
    pub fn sources(&self) -> &[SourceDocument] {
        &self.sources
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the store has no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Layer {
    fn merge_with(&mut self, later: Layer) {
        if later.inherits.is_some() {
            self.inherits = later.inherits;
        }
        self.entries.extend(later.entries);
    }
}

fn is_valid_layer_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}
