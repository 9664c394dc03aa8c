//! Mapping Editing Session
//!
//! Owns one document snapshot and the mapping set being edited against it.
//! Every edit goes through here, which is where the cross-map rules live
//! that the compiler does not re-check: a layout belongs to at most one map
//! and a variable is a target at most once per map.

use crate::compile::{layout_mapping_to_action_map, ActionMap};
use crate::document::{DocSnapshot, Layout};
use crate::error::{MappingError, Result};
use crate::lint::{lint_layout_maps, MappingWarning};
use crate::mapping::{DependentGroup, LayoutMap, TargetVariable};
use crate::options::SaveOptions;
use crate::persist::{load_layout_maps, save_layout_maps, ActionRegistry, PrivateDataStore, SaveOutcome};
use crate::validate::{clean_layout_maps, validate_layout_maps, ValidationOutcome, ValidationReport};

#[derive(Debug, Clone, Default)]
pub struct MappingSession {
    doc: DocSnapshot,
    layout_maps: Vec<LayoutMap>,
}

impl MappingSession {
    pub fn new(doc: DocSnapshot, layout_maps: Vec<LayoutMap>) -> Self {
        Self { doc, layout_maps }
    }

    /// Start a session from what the document has persisted.
    pub fn load<S: PrivateDataStore + ?Sized>(store: &S, root_id: &str, doc: DocSnapshot) -> Result<Self> {
        let layout_maps = load_layout_maps(store, root_id)?;
        Ok(Self::new(doc, layout_maps))
    }

    pub fn doc(&self) -> &DocSnapshot {
        &self.doc
    }

    /// Swap in a fresher snapshot. Maps are left alone until the next
    /// validation.
    pub fn set_doc(&mut self, doc: DocSnapshot) {
        self.doc = doc;
    }

    pub fn layout_maps(&self) -> &[LayoutMap] {
        &self.layout_maps
    }

    pub fn into_layout_maps(self) -> Vec<LayoutMap> {
        self.layout_maps
    }

    pub fn layout_map(&self, map_id: &str) -> Option<&LayoutMap> {
        self.layout_maps.iter().find(|m| m.id == map_id)
    }

    /// Map that currently owns `layout_id`.
    pub fn owner_of(&self, layout_id: &str) -> Option<&LayoutMap> {
        self.layout_maps
            .iter()
            .find(|m| m.layout_ids.iter().any(|id| id == layout_id))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Maps
    // ───────────────────────────────────────────────────────────────────────────

    pub fn add_layout_map(&mut self, name: Option<&str>) -> String {
        let id = ulid::Ulid::new().to_string();
        let mut map = LayoutMap::new(id.clone());
        map.name = name.map(str::to_string);
        self.layout_maps.push(map);
        id
    }

    pub fn rename_layout_map(&mut self, map_id: &str, name: Option<&str>) -> Result<()> {
        self.map_mut(map_id)?.name = name.map(str::to_string);
        Ok(())
    }

    pub fn remove_layout_map(&mut self, map_id: &str) -> Result<LayoutMap> {
        let position = self
            .layout_maps
            .iter()
            .position(|m| m.id == map_id)
            .ok_or_else(|| MappingError::UnknownLayoutMap(map_id.to_string()))?;
        Ok(self.layout_maps.remove(position))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Layouts
    // ───────────────────────────────────────────────────────────────────────────

    /// Assigning a layout to the map that already owns it is a no-op.
    pub fn assign_layout(&mut self, map_id: &str, layout_id: &str) -> Result<()> {
        if !self.doc.index().has_layout(layout_id) {
            return Err(MappingError::UnknownLayout(layout_id.to_string()));
        }
        if let Some(owner) = self.owner_of(layout_id) {
            if owner.id == map_id {
                return Ok(());
            }
            return Err(MappingError::LayoutAlreadyAssigned {
                layout_id: layout_id.to_string(),
                map_id: owner.id.clone(),
            });
        }
        self.map_mut(map_id)?.layout_ids.push(layout_id.to_string());
        Ok(())
    }

    /// Returns whether the layout was assigned.
    pub fn unassign_layout(&mut self, map_id: &str, layout_id: &str) -> Result<bool> {
        let map = self.map_mut(map_id)?;
        let before = map.layout_ids.len();
        map.layout_ids.retain(|id| id != layout_id);
        Ok(map.layout_ids.len() != before)
    }

    /// Document layouts no map owns, in document order.
    pub fn unassigned_layouts(&self) -> Vec<&Layout> {
        self.doc
            .layouts
            .iter()
            .filter(|layout| self.owner_of(&layout.id).is_none())
            .collect()
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Target variables
    // ───────────────────────────────────────────────────────────────────────────

    /// Add `variable_id` as a target, recording its current kind.
    pub fn add_target_variable(&mut self, map_id: &str, variable_id: &str) -> Result<()> {
        let kind = self
            .doc
            .index()
            .variable(variable_id)
            .map(|v| v.kind.type_name())
            .ok_or_else(|| MappingError::UnknownVariable(variable_id.to_string()))?;

        let map = self.map_mut(map_id)?;
        if map.target(variable_id).is_some() {
            return Err(MappingError::DuplicateTarget {
                variable_id: variable_id.to_string(),
                map_id: map_id.to_string(),
            });
        }
        map.variables.push(TargetVariable {
            id: Some(variable_id.to_string()),
            r#type: kind.to_string(),
            dependent_group: vec![],
        });
        Ok(())
    }

    pub fn remove_target_variable(&mut self, map_id: &str, variable_id: &str) -> Result<TargetVariable> {
        let map = self.map_mut(map_id)?;
        let position = map
            .variables
            .iter()
            .position(|v| v.id.as_deref() == Some(variable_id))
            .ok_or_else(|| MappingError::UnknownTarget {
                variable_id: variable_id.to_string(),
                map_id: map_id.to_string(),
            })?;
        Ok(map.variables.remove(position))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Dependent groups
    // ───────────────────────────────────────────────────────────────────────────

    /// Append a group; returns its index.
    pub fn add_dependent_group(
        &mut self,
        map_id: &str,
        variable_id: &str,
        group: DependentGroup,
    ) -> Result<usize> {
        let target = self.target_mut(map_id, variable_id)?;
        target.dependent_group.push(group);
        Ok(target.dependent_group.len() - 1)
    }

    pub fn replace_dependent_group(
        &mut self,
        map_id: &str,
        variable_id: &str,
        index: usize,
        group: DependentGroup,
    ) -> Result<DependentGroup> {
        let slot = self.group_mut(map_id, variable_id, index)?;
        Ok(std::mem::replace(slot, group))
    }

    pub fn remove_dependent_group(
        &mut self,
        map_id: &str,
        variable_id: &str,
        index: usize,
    ) -> Result<DependentGroup> {
        let target = self.target_mut(map_id, variable_id)?;
        if index >= target.dependent_group.len() {
            return Err(MappingError::GroupOutOfRange {
                variable_id: variable_id.to_string(),
                index,
            });
        }
        Ok(target.dependent_group.remove(index))
    }

    /// Drop one dependent from a group. Returns whether it was present.
    pub fn remove_dependent(
        &mut self,
        map_id: &str,
        variable_id: &str,
        index: usize,
        dependent_variable_id: &str,
    ) -> Result<bool> {
        let group = self.group_mut(map_id, variable_id, index)?;
        let before = group.dependents.len();
        group
            .dependents
            .retain(|d| d.variable_id != dependent_variable_id);
        Ok(group.dependents.len() != before)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Pipeline
    // ───────────────────────────────────────────────────────────────────────────

    pub fn validate(&self) -> Vec<ValidationOutcome> {
        validate_layout_maps(&self.layout_maps, &self.doc)
    }

    /// Replace the maps with their cleaned form.
    pub fn clean(&mut self) -> ValidationReport {
        let (clean, report) = clean_layout_maps(&self.layout_maps, &self.doc);
        self.layout_maps = clean;
        report
    }

    pub fn compile(&self) -> ActionMap {
        layout_mapping_to_action_map(&self.layout_maps, &self.doc)
    }

    pub fn lint(&self) -> Vec<MappingWarning> {
        lint_layout_maps(&self.layout_maps, &self.doc)
    }

    /// Persist and install; on success the session holds the cleaned maps.
    pub fn save<H>(&mut self, host: &mut H, root_id: &str, options: &SaveOptions) -> Result<SaveOutcome>
    where
        H: PrivateDataStore + ActionRegistry + ?Sized,
    {
        let outcome = save_layout_maps(host, root_id, &self.layout_maps, &self.doc, options)?;
        self.layout_maps = outcome.clean_layout_maps.clone();
        Ok(outcome)
    }

    fn map_mut(&mut self, map_id: &str) -> Result<&mut LayoutMap> {
        self.layout_maps
            .iter_mut()
            .find(|m| m.id == map_id)
            .ok_or_else(|| MappingError::UnknownLayoutMap(map_id.to_string()))
    }

    fn target_mut(&mut self, map_id: &str, variable_id: &str) -> Result<&mut TargetVariable> {
        self.map_mut(map_id)?
            .target_mut(variable_id)
            .ok_or_else(|| MappingError::UnknownTarget {
                variable_id: variable_id.to_string(),
                map_id: map_id.to_string(),
            })
    }

    fn group_mut(&mut self, map_id: &str, variable_id: &str, index: usize) -> Result<&mut DependentGroup> {
        self.target_mut(map_id, variable_id)?
            .dependent_group
            .get_mut(index)
            .ok_or_else(|| MappingError::GroupOutOfRange {
                variable_id: variable_id.to_string(),
                index,
            })
    }
}
