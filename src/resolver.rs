//! Flattening of a layer's inheritance chain.

use crate::failure::Failure;
use envlayer_core::{Expression, LayerStore};
use std::collections::BTreeMap;

/// A profile's entries after inheritance, plus any cycles that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatTable {
    pub entries: BTreeMap<String, Expression>,
    /// Non-fatal [`Failure::CyclicInheritance`] notices
    pub cycles: Vec<Failure>,
}

/// Flattens `profile` and its ancestors into one table.
///
/// The root ancestor is applied first and each descendant overrides it. When a
/// layer reappears in its own chain the repeated branch contributes nothing and
/// the cycle is reported in [`FlatTable::cycles`].
///
/// # Errors
///
/// [`Failure::LayerNotFound`] if `profile` or any ancestor it names is missing.
pub fn resolve_layer_chain(profile: &str, store: &LayerStore) -> Result<FlatTable, Failure> {
    let mut chain = Vec::new();
    let mut table = FlatTable::default();
    collect(profile, store, &mut chain, &mut table)?;
    Ok(table)
}

fn collect(
    name: &str,
    store: &LayerStore,
    chain: &mut Vec<String>,
    table: &mut FlatTable,
) -> Result<(), Failure> {
    if chain.iter().any(|visited| visited == name) {
        let mut cycle = chain.clone();
        cycle.push(name.to_string());
        tracing::warn!(
            layer = name,
            chain = %cycle.join(" -> "),
            "cyclic layer inheritance, ignoring repeated branch"
        );
        table.cycles.push(Failure::CyclicInheritance {
            layer: name.to_string(),
            chain: cycle,
        });
        return Ok(());
    }

    let layer = store.get(name).ok_or_else(|| Failure::LayerNotFound {
        layer: name.to_string(),
    })?;

    chain.push(name.to_string());
    if let Some(parent) = &layer.inherits {
        collect(parent, store, chain, table)?;
    }
    chain.pop();

    table.entries.extend(
        layer
            .entries
            .iter()
            .map(|(variable, expression)| (variable.clone(), expression.clone())),
    );
    Ok(())
}
