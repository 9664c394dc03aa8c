//! Validation Pass for Layout Mappings
//!
//! Prunes references to layouts and variables that no longer exist in the
//! document and reports every removal. The pass never fails and never
//! touches its inputs; it works on a copy.
//!
//! ## Invariants
//!
//! 1. **Soundness**: every id left in the cleaned map exists in the snapshot.
//! 2. **Idempotence**: validating a cleaned map reports nothing.
//! 3. **Complete reporting**: each structural removal appears exactly once in
//!    the report, in processing order (layouts, then variables depth-first).

#[cfg(feature = "napi")]
use napi_derive::napi;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::document::{DocSnapshot, DocumentIndex};
use crate::mapping::{DependentGroup, LayoutMap, TargetVariable, ValueFragment};

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemovedDependent {
    pub variable_id: String,
    pub image_variable_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemovedVariableValue {
    pub value: String,
    pub image_variable_id: Option<String>,
    /// Index of the group in the map as it was before pruning.
    pub dependent_group_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemovedDependentGroup {
    pub image_variable_id: Option<String>,
    pub dependent_group_index: usize,
}

/// Everything the validator removed. Informational only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub removed_layout_ids: Vec<String>,
    pub removed_variables: Vec<String>,
    pub removed_dependents: Vec<RemovedDependent>,
    pub removed_variable_values: Vec<RemovedVariableValue>,
    #[serde(default)]
    pub removed_dependent_groups: Vec<RemovedDependentGroup>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.removal_count() == 0
    }

    pub fn removal_count(&self) -> usize {
        self.removed_layout_ids.len()
            + self.removed_variables.len()
            + self.removed_dependents.len()
            + self.removed_variable_values.len()
            + self.removed_dependent_groups.len()
    }

    /// Append `other` after the entries already recorded.
    pub fn merge(&mut self, other: ValidationReport) {
        self.removed_layout_ids.extend(other.removed_layout_ids);
        self.removed_variables.extend(other.removed_variables);
        self.removed_dependents.extend(other.removed_dependents);
        self.removed_variable_values
            .extend(other.removed_variable_values);
        self.removed_dependent_groups
            .extend(other.removed_dependent_groups);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub clean_layout_map: LayoutMap,
    pub report: ValidationReport,
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATION FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn validate_layout_map(layout_map: &LayoutMap, doc: &DocSnapshot) -> ValidationOutcome {
    validate_with_index(layout_map, &doc.index())
}

/// Validate every map of a set. Maps are independent, so they are checked
/// in parallel; output order follows input order.
pub fn validate_layout_maps(layout_maps: &[LayoutMap], doc: &DocSnapshot) -> Vec<ValidationOutcome> {
    let index = doc.index();
    layout_maps
        .par_iter()
        .map(|map| validate_with_index(map, &index))
        .collect()
}

/// Cleaned maps plus one report covering the whole set.
pub fn clean_layout_maps(
    layout_maps: &[LayoutMap],
    doc: &DocSnapshot,
) -> (Vec<LayoutMap>, ValidationReport) {
    let mut report = ValidationReport::default();
    let mut clean = Vec::with_capacity(layout_maps.len());
    for outcome in validate_layout_maps(layout_maps, doc) {
        report.merge(outcome.report);
        clean.push(outcome.clean_layout_map);
    }
    (clean, report)
}

fn validate_with_index(layout_map: &LayoutMap, index: &DocumentIndex<'_>) -> ValidationOutcome {
    let mut report = ValidationReport::default();
    let mut clean = layout_map.clone();

    clean.layout_ids.retain(|id| {
        let keep = index.has_layout(id);
        if !keep {
            report.removed_layout_ids.push(id.clone());
        }
        keep
    });

    let mut variables = Vec::with_capacity(clean.variables.len());
    for target in clean.variables.drain(..) {
        if let Some(id) = &target.id {
            if !index.has_variable(id) {
                report.removed_variables.push(id.clone());
                continue;
            }
        }
        variables.push(clean_target(target, index, &mut report));
    }
    clean.variables = variables;

    if !report.is_empty() {
        log::debug!(
            "layout map {}: pruned {} dangling reference(s)",
            layout_map.id,
            report.removal_count()
        );
    }

    ValidationOutcome {
        clean_layout_map: clean,
        report,
    }
}

fn clean_target(
    mut target: TargetVariable,
    index: &DocumentIndex<'_>,
    report: &mut ValidationReport,
) -> TargetVariable {
    let image_variable_id = target.id.clone();
    let groups = std::mem::take(&mut target.dependent_group);

    for (group_index, group) in groups.into_iter().enumerate() {
        let group = clean_group(group, group_index, image_variable_id.as_ref(), index, report);
        if group.is_empty() {
            report.removed_dependent_groups.push(RemovedDependentGroup {
                image_variable_id: image_variable_id.clone(),
                dependent_group_index: group_index,
            });
            continue;
        }
        target.dependent_group.push(group);
    }
    target
}

fn clean_group(
    mut group: DependentGroup,
    group_index: usize,
    image_variable_id: Option<&String>,
    index: &DocumentIndex<'_>,
    report: &mut ValidationReport,
) -> DependentGroup {
    group.dependents.retain(|dependent| {
        let keep = index.has_variable(&dependent.variable_id);
        if !keep {
            report.removed_dependents.push(RemovedDependent {
                variable_id: dependent.variable_id.clone(),
                image_variable_id: image_variable_id.cloned(),
            });
        }
        keep
    });

    group.variable_value.retain(|fragment| match fragment {
        ValueFragment::Text(_) => true,
        ValueFragment::Variable(reference) => match &reference.id {
            Some(id) if !index.has_variable(id) => {
                report.removed_variable_values.push(RemovedVariableValue {
                    value: id.clone(),
                    image_variable_id: image_variable_id.cloned(),
                    dependent_group_index: group_index,
                });
                false
            }
            _ => true,
        },
    });

    group
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON in, JSON out: `[{ cleanLayoutMap, report }, ...]`.
#[cfg(feature = "napi")]
#[napi]
pub fn validate_layout_maps_native(maps_json: String, doc_json: String) -> napi::Result<String> {
    let maps: Vec<LayoutMap> = serde_json::from_str(&maps_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid layout maps: {}", e)))?;
    let doc: DocSnapshot = serde_json::from_str(&doc_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid document snapshot: {}", e)))?;

    let outcomes = validate_layout_maps(&maps, &doc);
    serde_json::to_string(&outcomes).map_err(|e| napi::Error::from_reason(e.to_string()))
}
