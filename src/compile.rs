//! Action Map Compiler
//!
//! Expands every dependency rule of a layout mapping set into all concrete
//! value combinations and folds them into the nested lookup table the
//! generated script consults at document runtime:
//!
//! `layout name → target variable name → dependent-name key → value key → entry`
//!
//! ## Invariants
//!
//! 1. **Key symmetry**: a dependent-name key is the authored dependents' names
//!    joined with `|`, in authored order; a value key is one combination of
//!    their values joined the same way. The runtime rebuilds value keys from
//!    live values with the same join, so dependents order is load-bearing.
//! 2. **Best effort**: anything that does not resolve against the snapshot
//!    is skipped without writing an entry. No partial keys are emitted.
//! 3. **Merge order**: entries accumulate in processing order; an identical
//!    full key written twice keeps the later entry at the earlier position.

#[cfg(feature = "napi")]
use napi_derive::napi;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::document::{DocSnapshot, DocumentIndex};
use crate::mapping::{DependentGroup, LayoutMap, TransformCommand, ValueFragment};

/// Dependent-name key reserved for unconditional rules.
pub const ALWAYS_RUN_KEY: &str = "_always_run";
/// Separator for both dependent-name keys and value keys.
pub const KEY_SEPARATOR: &str = "|";

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActionEntry {
    /// Template with `${name}` placeholders for referenced variables.
    pub value: String,
    /// Transforms per referenced variable name, applied before substitution.
    pub transforms: IndexMap<String, Vec<TransformCommand>>,
}

/// value key → entry
pub type ValueTable = IndexMap<String, ActionEntry>;
/// dependent-name key → value table
pub type VariableRules = IndexMap<String, ValueTable>;
/// target variable name → rules
pub type LayoutRules = IndexMap<String, VariableRules>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct ActionMap(pub IndexMap<String, LayoutRules>);

impl ActionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(&self, layout_name: &str) -> Option<&LayoutRules> {
        self.0.get(layout_name)
    }

    pub fn rules(&self, layout_name: &str, variable_name: &str) -> Option<&VariableRules> {
        self.layout(layout_name)?.get(variable_name)
    }

    pub fn entry(
        &self,
        layout_name: &str,
        variable_name: &str,
        dependent_key: &str,
        value_key: &str,
    ) -> Option<&ActionEntry> {
        self.rules(layout_name, variable_name)?
            .get(dependent_key)?
            .get(value_key)
    }

    /// Write one entry, creating intermediate levels on demand.
    pub fn insert(&mut self, rule: CompiledRule) {
        self.0
            .entry(rule.layout_name)
            .or_default()
            .entry(rule.variable_name)
            .or_default()
            .entry(rule.dependent_key)
            .or_default()
            .insert(rule.value_key, rule.entry);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of leaf entries.
    pub fn entry_count(&self) -> usize {
        self.0
            .values()
            .flat_map(|layout| layout.values())
            .flat_map(|rules| rules.values())
            .map(|table| table.len())
            .sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Where a compiled entry came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuleOrigin {
    pub layout_map_id: String,
    pub layout_id: String,
    pub target_variable_id: String,
    pub group_index: usize,
}

/// One fully keyed entry, before it is folded into an [`ActionMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRule {
    pub layout_name: String,
    pub variable_name: String,
    pub dependent_key: String,
    pub value_key: String,
    pub entry: ActionEntry,
    pub origin: RuleOrigin,
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn dependent_key<S: AsRef<str>>(names: &[S]) -> String {
    join_key(names)
}

pub fn value_key<S: AsRef<str>>(values: &[S]) -> String {
    join_key(values)
}

fn join_key<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// Cartesian product of per-dependent value lists, in dependent order.
/// No axes yields one empty combination; any empty axis yields none.
pub fn combinations<S: AsRef<str>>(axes: &[Vec<S>]) -> Vec<Vec<String>> {
    let mut combos: Vec<Vec<String>> = vec![vec![]];
    for axis in axes {
        let mut next = Vec::with_capacity(combos.len() * axis.len());
        for existing in &combos {
            for value in axis {
                let mut combo = existing.clone();
                combo.push(value.as_ref().to_string());
                next.push(combo);
            }
        }
        combos = next;
    }
    combos
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Every entry the compiler would write, in write order.
pub fn compile_rules(layout_maps: &[LayoutMap], doc: &DocSnapshot) -> Vec<CompiledRule> {
    let index = doc.index();
    let mut rules = Vec::new();

    for map in layout_maps {
        for layout_id in &map.layout_ids {
            let Some(layout_name) = index.layout_name(layout_id) else {
                log::debug!("map {}: layout {} not in document, skipped", map.id, layout_id);
                continue;
            };

            for target in &map.variables {
                let Some(target_id) = target.id.as_deref() else {
                    continue;
                };
                let Some(variable_name) = index.variable_name(target_id) else {
                    log::debug!("map {}: target variable {} not in document, skipped", map.id, target_id);
                    continue;
                };

                for (group_index, group) in target.dependent_group.iter().enumerate() {
                    let Some((dependent_key, value_keys)) = group_keys(group, &index) else {
                        log::debug!(
                            "map {}: group {} of {} has an unresolved dependent, skipped",
                            map.id,
                            group_index,
                            variable_name
                        );
                        continue;
                    };
                    let entry = resolve_entry(group, &index);
                    let origin = RuleOrigin {
                        layout_map_id: map.id.clone(),
                        layout_id: layout_id.clone(),
                        target_variable_id: target_id.to_string(),
                        group_index,
                    };

                    for value_key in value_keys {
                        rules.push(CompiledRule {
                            layout_name: layout_name.to_string(),
                            variable_name: variable_name.to_string(),
                            dependent_key: dependent_key.clone(),
                            value_key,
                            entry: entry.clone(),
                            origin: origin.clone(),
                        });
                    }
                }
            }
        }
    }

    rules
}

/// Compile a mapping set into the runtime lookup table.
pub fn layout_mapping_to_action_map(layout_maps: &[LayoutMap], doc: &DocSnapshot) -> ActionMap {
    let mut action_map = ActionMap::new();
    for rule in compile_rules(layout_maps, doc) {
        action_map.insert(rule);
    }
    action_map
}

/// Dependent-name key and all value keys of a group, or `None` when a
/// dependent does not resolve.
fn group_keys(group: &DependentGroup, index: &DocumentIndex<'_>) -> Option<(String, Vec<String>)> {
    if group.always_run {
        return Some((ALWAYS_RUN_KEY.to_string(), vec![String::new()]));
    }

    let mut names = Vec::with_capacity(group.dependents.len());
    let mut axes = Vec::with_capacity(group.dependents.len());
    for dependent in &group.dependents {
        names.push(index.variable_name(&dependent.variable_id)?);
        axes.push(dependent.values.clone());
    }

    let value_keys = combinations(&axes)
        .iter()
        .map(|combo| value_key(combo))
        .collect();
    Some((dependent_key(&names), value_keys))
}

fn resolve_entry(group: &DependentGroup, index: &DocumentIndex<'_>) -> ActionEntry {
    let mut entry = ActionEntry::default();
    for fragment in &group.variable_value {
        match fragment {
            ValueFragment::Text(text) => entry.value.push_str(text),
            ValueFragment::Variable(reference) => {
                let Some(name) = reference.id.as_deref().and_then(|id| index.variable_name(id))
                else {
                    continue;
                };
                entry.value.push_str("${");
                entry.value.push_str(name);
                entry.value.push('}');
                entry
                    .transforms
                    .insert(name.to_string(), reference.transform.clone());
            }
        }
    }
    entry
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn compile_action_map_native(maps_json: String, doc_json: String) -> napi::Result<String> {
    let maps: Vec<LayoutMap> = serde_json::from_str(&maps_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid layout maps: {}", e)))?;
    let doc: DocSnapshot = serde_json::from_str(&doc_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid document snapshot: {}", e)))?;

    layout_mapping_to_action_map(&maps, &doc)
        .to_json()
        .map_err(|e| napi::Error::from_reason(e.to_string()))
}
