//! Parsing of the `.projects` alias mapping file.
//!
//! The file maps short aliases to cloud project ids, one per line:
//!
//! ```text
//! # project aliases
//! dev=my-project-dev
//! prod = my-project-prod  # TODO: confirm with ops
//! ```

use std::collections::BTreeMap;

/// Aliases parsed from a `.projects` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectMap {
    entries: BTreeMap<String, String>,
    skipped_lines: Vec<usize>,
}

impl ProjectMap {
    /// Parses mapping file text.
    ///
    /// Blank lines and lines starting with `#` are ignored. Whitespace around
    /// alias and value is trimmed and a trailing ` #` comment after the value
    /// is dropped. Lines without `=` (or with an empty alias) are skipped and
    /// their 1-based line numbers are kept in [`ProjectMap::skipped_lines`].
    pub fn parse(text: &str) -> Self {
        let mut map = Self::default();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((alias, value)) = line.split_once('=') else {
                map.skipped_lines.push(index + 1);
                continue;
            };

            let alias = alias.trim();
            if alias.is_empty() {
                map.skipped_lines.push(index + 1);
                continue;
            }

            map.entries
                .insert(alias.to_string(), strip_inline_comment(value).to_string());
        }

        map
    }

    /// Project id for an alias.
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.entries.get(alias).map(String::as_str)
    }

    /// Line numbers that could not be parsed.
    pub fn skipped_lines(&self) -> &[usize] {
        &self.skipped_lines
    }

    /// All aliases with their project ids.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `text` with `alias` mapped to `project_id`.
    ///
    /// The line [`ProjectMap::parse`] would take `alias` from (the last one)
    /// is rewritten in place; otherwise a new line is appended. Comments and every other line are kept as-is.
    pub fn upsert(text: &str, alias: &str, project_id: &str) -> String {
        let entry = format!("{}={}", alias, project_id);
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();

        let existing = lines.iter().rposition(|line| {
            let line = line.trim();
            !line.starts_with('#')
                && line
                    .split_once('=')
                    .is_some_and(|(key, _)| key.trim() == alias)
        });

        match existing {
            Some(index) => lines[index] = entry,
            None => lines.push(entry),
        }

        let mut updated = lines.join("\n");
        updated.push('\n');
        updated
    }
}

fn strip_inline_comment(value: &str) -> &str {
    let value = value.trim();
    // `#` only starts a comment after whitespace
    match value.find(" #").or_else(|| value.find("\t#")) {
        Some(pos) => value[..pos].trim_end(),
        None => value,
    }
}
