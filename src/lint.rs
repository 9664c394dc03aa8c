//! Lint Pass for Layout Mappings
//!
//! The compiler and the runtime resolve conflicting rules by order (last
//! write wins at compile time, first matching key wins at runtime). This
//! pass surfaces those situations, and configurations the runtime cannot
//! honor, as warnings. It never changes the mapping.

#[cfg(feature = "napi")]
use napi_derive::napi;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::compile::{compile_rules, ActionEntry, RuleOrigin, ALWAYS_RUN_KEY, KEY_SEPARATOR};
use crate::document::{DocSnapshot, DocumentIndex, VariableKind};
use crate::mapping::{DependentGroup, LayoutMap, ValueFragment};

// ═══════════════════════════════════════════════════════════════════════════════
// WARNING CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const LINT_LAYOUT_OVERLAP: &str = "W-LAYOUT-OVERLAP";
pub const LINT_RULE_COLLISION: &str = "W-RULE-COLLISION";
pub const LINT_AMBIGUOUS_DEPENDENTS: &str = "W-AMBIGUOUS-DEPENDENTS";
pub const LINT_ALWAYS_RUN_SHADOWS: &str = "W-ALWAYS-RUN-SHADOWS";
pub const LINT_TRANSFORM_REGEX: &str = "W-TRANSFORM-REGEX";
pub const LINT_TRANSFORM_EMPTY_FIND: &str = "W-TRANSFORM-EMPTY-FIND";
pub const LINT_LIST_VALUE: &str = "W-LIST-VALUE";
pub const LINT_BOOLEAN_VALUE: &str = "W-BOOLEAN-VALUE";
pub const LINT_KEY_SEPARATOR: &str = "W-KEY-SEPARATOR";
pub const LINT_PLACEHOLDER_NAME: &str = "W-PLACEHOLDER-NAME";
pub const LINT_DUPLICATE_NAME: &str = "W-DUPLICATE-NAME";

fn get_guarantee(code: &str) -> &'static str {
    match code {
        LINT_LAYOUT_OVERLAP => "Each layout belongs to at most one layout map.",
        LINT_RULE_COLLISION => "Each value combination resolves to one value per layout and variable.",
        LINT_AMBIGUOUS_DEPENDENTS => {
            "At most one dependency key of a variable matches any set of live values."
        }
        LINT_ALWAYS_RUN_SHADOWS => "Keyed rules are only consulted when no always-run rule exists.",
        LINT_TRANSFORM_REGEX => "Transforms replace literal text.",
        LINT_TRANSFORM_EMPTY_FIND => "A transform with an empty search string does nothing.",
        LINT_LIST_VALUE => "List dependents only match values the list can hold.",
        LINT_BOOLEAN_VALUE => "Boolean dependents only match \"true\" or \"false\".",
        LINT_KEY_SEPARATOR => "Dependent names and values never contain the key separator '|'.",
        LINT_PLACEHOLDER_NAME => "Referenced variable names never contain '}'.",
        LINT_DUPLICATE_NAME => "The runtime addresses variables by unique name.",
        _ => "Unknown lint.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WARNING TYPE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MappingWarning {
    pub code: String,
    pub message: String,
    pub guarantee: String,
    pub layout_map_id: Option<String>,
    pub hints: Vec<String>,
}

impl MappingWarning {
    pub fn new(code: &str, message: String, layout_map_id: Option<&str>) -> Self {
        Self::with_hints(code, message, layout_map_id, vec![])
    }

    pub fn with_hints(
        code: &str,
        message: String,
        layout_map_id: Option<&str>,
        hints: Vec<String>,
    ) -> Self {
        MappingWarning {
            code: code.to_string(),
            message,
            guarantee: get_guarantee(code).to_string(),
            layout_map_id: layout_map_id.map(str::to_string),
            hints,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LINT PASS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn lint_layout_maps(layout_maps: &[LayoutMap], doc: &DocSnapshot) -> Vec<MappingWarning> {
    let index = doc.index();
    let mut warnings = Vec::new();

    check_duplicate_names(doc, &mut warnings);
    check_layout_overlap(layout_maps, &mut warnings);

    for map in layout_maps {
        for target in &map.variables {
            let target_label = target
                .id
                .as_deref()
                .and_then(|id| index.variable_name(id))
                .or(target.id.as_deref())
                .unwrap_or("<unnamed>");

            if target.dependent_group.iter().any(|g| g.always_run)
                && target.dependent_group.iter().any(|g| !g.always_run)
            {
                warnings.push(MappingWarning::with_hints(
                    LINT_ALWAYS_RUN_SHADOWS,
                    format!("\"{}\" has an always-run rule next to keyed rules.", target_label),
                    Some(map.id.as_str()),
                    vec!["Keyed rules of this variable never run; remove them or the always-run rule.".to_string()],
                ));
            }

            for (group_index, group) in target.dependent_group.iter().enumerate() {
                check_group(map, target_label, group_index, group, &index, &mut warnings);
            }
        }
    }

    check_compiled_rules(layout_maps, doc, &mut warnings);

    if !warnings.is_empty() {
        log::warn!("layout mapping lint: {} warning(s)", warnings.len());
    }
    warnings
}

fn check_duplicate_names(doc: &DocSnapshot, warnings: &mut Vec<MappingWarning>) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for variable in &doc.variables {
        if !seen.insert(variable.name.as_str()) && reported.insert(variable.name.as_str()) {
            warnings.push(MappingWarning::new(
                LINT_DUPLICATE_NAME,
                format!("More than one variable is named \"{}\".", variable.name),
                None,
            ));
        }
    }
}

fn check_layout_overlap(layout_maps: &[LayoutMap], warnings: &mut Vec<MappingWarning>) {
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for map in layout_maps {
        for layout_id in &map.layout_ids {
            match owners.get(layout_id.as_str()) {
                Some(owner) => warnings.push(MappingWarning::with_hints(
                    LINT_LAYOUT_OVERLAP,
                    format!("Layout {} is assigned to map {} and map {}.", layout_id, owner, map.id),
                    Some(map.id.as_str()),
                    vec!["Rules from the later map override matching rules of the earlier one.".to_string()],
                )),
                None => {
                    owners.insert(layout_id.as_str(), map.id.as_str());
                }
            }
        }
    }
}

fn check_group(
    map: &LayoutMap,
    target_label: &str,
    group_index: usize,
    group: &DependentGroup,
    index: &DocumentIndex<'_>,
    warnings: &mut Vec<MappingWarning>,
) {
    let at = format!("\"{}\" rule {}", target_label, group_index + 1);

    for dependent in &group.dependents {
        let Some(variable) = index.variable(&dependent.variable_id) else {
            continue;
        };

        if variable.name.contains(KEY_SEPARATOR) {
            warnings.push(MappingWarning::new(
                LINT_KEY_SEPARATOR,
                format!("{}: dependent name \"{}\" contains '|'.", at, variable.name),
                Some(map.id.as_str()),
            ));
        }

        for value in &dependent.values {
            if value.contains(KEY_SEPARATOR) {
                warnings.push(MappingWarning::new(
                    LINT_KEY_SEPARATOR,
                    format!("{}: value \"{}\" of \"{}\" contains '|'.", at, value, variable.name),
                    Some(map.id.as_str()),
                ));
            }
        }

        match &variable.kind {
            VariableKind::List { items, .. } => {
                let allowed: HashSet<&str> = items.iter().map(|i| i.value.as_str()).collect();
                for value in dependent.values.iter().filter(|v| !allowed.contains(v.as_str())) {
                    warnings.push(MappingWarning::with_hints(
                        LINT_LIST_VALUE,
                        format!("{}: \"{}\" is not an item of list \"{}\".", at, value, variable.name),
                        Some(map.id.as_str()),
                        vec!["The list item may have been renamed or removed.".to_string()],
                    ));
                }
            }
            VariableKind::Boolean { .. } => {
                for value in dependent
                    .values
                    .iter()
                    .filter(|v| v.as_str() != "true" && v.as_str() != "false")
                {
                    warnings.push(MappingWarning::new(
                        LINT_BOOLEAN_VALUE,
                        format!("{}: \"{}\" can never match boolean \"{}\".", at, value, variable.name),
                        Some(map.id.as_str()),
                    ));
                }
            }
            _ => {}
        }
    }

    for fragment in &group.variable_value {
        let ValueFragment::Variable(reference) = fragment else {
            continue;
        };
        let name = reference.id.as_deref().and_then(|id| index.variable_name(id));
        if let Some(name) = name.filter(|n| n.contains('}')) {
            warnings.push(MappingWarning::new(
                LINT_PLACEHOLDER_NAME,
                format!("{}: referenced variable \"{}\" contains '}}'.", at, name),
                Some(map.id.as_str()),
            ));
        }
        let label = name.unwrap_or("<unresolved>");
        for transform in &reference.transform {
            if transform.regex {
                warnings.push(MappingWarning::with_hints(
                    LINT_TRANSFORM_REGEX,
                    format!("{}: transform of \"{}\" is marked as regex.", at, label),
                    Some(map.id.as_str()),
                    vec![format!("\"{}\" is matched as plain text.", transform.find)],
                ));
            }
            if transform.find.is_empty() {
                warnings.push(MappingWarning::new(
                    LINT_TRANSFORM_EMPTY_FIND,
                    format!("{}: transform of \"{}\" has an empty search string.", at, label),
                    Some(map.id.as_str()),
                ));
            }
        }
    }
}

fn check_compiled_rules(
    layout_maps: &[LayoutMap],
    doc: &DocSnapshot,
    warnings: &mut Vec<MappingWarning>,
) {
    let mut written: HashMap<(String, String, String, String), (RuleOrigin, ActionEntry)> =
        HashMap::new();
    // (layout, variable) → dependent keys in first-seen order
    let mut dependent_keys: IndexMap<(String, String), Vec<String>> = IndexMap::new();

    for rule in compile_rules(layout_maps, doc) {
        let keys = dependent_keys
            .entry((rule.layout_name.clone(), rule.variable_name.clone()))
            .or_default();
        if !keys.contains(&rule.dependent_key) {
            keys.push(rule.dependent_key.clone());
        }

        let key = (
            rule.layout_name.clone(),
            rule.variable_name.clone(),
            rule.dependent_key.clone(),
            rule.value_key.clone(),
        );
        if let Some((earlier, entry)) = written.get(&key) {
            if *entry != rule.entry {
                warnings.push(MappingWarning::with_hints(
                    LINT_RULE_COLLISION,
                    format!(
                        "Layout \"{}\", variable \"{}\": values [{}] of [{}] resolve to both \"{}\" and \"{}\".",
                        rule.layout_name,
                        rule.variable_name,
                        rule.value_key,
                        rule.dependent_key,
                        entry.value,
                        rule.entry.value
                    ),
                    Some(rule.origin.layout_map_id.as_str()),
                    vec![format!(
                        "Rule {} of map {} wins over rule {} of map {}.",
                        rule.origin.group_index + 1,
                        rule.origin.layout_map_id,
                        earlier.group_index + 1,
                        earlier.layout_map_id
                    )],
                ));
            }
        }
        written.insert(key, (rule.origin, rule.entry));
    }

    for ((layout_name, variable_name), keys) in dependent_keys {
        let keyed: Vec<&String> = keys.iter().filter(|k| *k != ALWAYS_RUN_KEY).collect();
        if keyed.len() > 1 {
            warnings.push(MappingWarning::with_hints(
                LINT_AMBIGUOUS_DEPENDENTS,
                format!(
                    "Layout \"{}\", variable \"{}\" is keyed on {} different dependent sets.",
                    layout_name,
                    variable_name,
                    keyed.len()
                ),
                None,
                vec![format!(
                    "When several match, the first in this order wins: {}.",
                    keyed
                        .iter()
                        .map(|k| format!("[{}]", k))
                        .collect::<Vec<_>>()
                        .join(", ")
                )],
            ));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn lint_layout_maps_native(maps_json: String, doc_json: String) -> napi::Result<String> {
    let maps: Vec<LayoutMap> = serde_json::from_str(&maps_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid layout maps: {}", e)))?;
    let doc: DocSnapshot = serde_json::from_str(&doc_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid document snapshot: {}", e)))?;

    serde_json::to_string(&lint_layout_maps(&maps, &doc))
        .map_err(|e| napi::Error::from_reason(e.to_string()))
}
