//! Persistence Adapter
//!
//! Reads and writes the mapping set through the document's private-data
//! channel and installs the generated action. Both host surfaces sit behind
//! traits so the save pipeline runs the same against a live studio and
//! against [`MemoryStudio`].
//!
//! ## Envelope
//!
//! Private data is a flat string map. The `toolbar` entry holds a JSON
//! envelope:
//!
//! ```json
//! { "version": 1, "layoutMaps": [...], "scriptFingerprint": "…", ...other toolbar fields }
//! ```
//!
//! Decoding fails closed. Malformed JSON and versions newer than
//! [`ENVELOPE_VERSION`] are rejected, so an older build never overwrites data
//! it does not understand. An envelope without `version` predates versioning
//! and is upgraded in place. Fields this crate does not own are carried
//! through untouched.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::codegen::{generate_action_script, ActionDefinition};
use crate::compile::{layout_mapping_to_action_map, ActionMap};
use crate::document::{DocSnapshot, VariableKind};
use crate::error::{MappingError, Result};
use crate::lint::{lint_layout_maps, MappingWarning};
use crate::mapping::LayoutMap;
use crate::options::SaveOptions;
use crate::runtime::{HostError, HostValue, StudioHost};
use crate::validate::{clean_layout_maps, ValidationReport};

/// Private-data key of the toolbar envelope.
pub const TOOLBAR_KEY: &str = "toolbar";
pub const ENVELOPE_VERSION: u32 = 1;
/// Version assumed when the envelope carries none.
const LEGACY_VERSION: u32 = 0;

pub type PrivateData = IndexMap<String, String>;

// ═══════════════════════════════════════════════════════════════════════════════
// HOST SURFACES
// ═══════════════════════════════════════════════════════════════════════════════

/// Opaque per-document key-value store.
pub trait PrivateDataStore {
    fn private_data(&self, root_id: &str) -> Result<PrivateData, HostError>;
    fn set_private_data(&mut self, root_id: &str, data: &PrivateData) -> Result<(), HostError>;
}

/// Named, trigger-bound document scripts.
pub trait ActionRegistry {
    fn update_action(&mut self, name: &str, action: &ActionDefinition) -> Result<(), HostError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENVELOPE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolbarEnvelope {
    #[serde(default = "legacy_version")]
    pub version: u32,
    #[serde(default)]
    pub layout_maps: Vec<LayoutMap>,
    /// Fingerprint of the action installed by the last save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_fingerprint: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn legacy_version() -> u32 {
    LEGACY_VERSION
}

impl Default for ToolbarEnvelope {
    fn default() -> Self {
        Self {
            version: ENVELOPE_VERSION,
            layout_maps: vec![],
            script_fingerprint: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl ToolbarEnvelope {
    pub fn decode(json: &str) -> Result<Self> {
        let mut envelope: ToolbarEnvelope =
            serde_json::from_str(json).map_err(MappingError::EnvelopeDecode)?;

        if envelope.version > ENVELOPE_VERSION {
            return Err(MappingError::UnsupportedVersion {
                found: envelope.version,
                supported: ENVELOPE_VERSION,
            });
        }
        if envelope.version == LEGACY_VERSION {
            log::warn!(
                "upgrading unversioned toolbar data ({} layout map(s)) to version {}",
                envelope.layout_maps.len(),
                ENVELOPE_VERSION
            );
            envelope.version = ENVELOPE_VERSION;
        }
        Ok(envelope)
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|source| MappingError::Serialize {
            what: "toolbar envelope",
            source,
        })
    }
}

/// Current envelope of the document, or a fresh one when none was saved.
pub fn load_envelope<S: PrivateDataStore + ?Sized>(store: &S, root_id: &str) -> Result<ToolbarEnvelope> {
    let data = store.private_data(root_id)?;
    match data.get(TOOLBAR_KEY) {
        Some(json) => ToolbarEnvelope::decode(json),
        None => Ok(ToolbarEnvelope::default()),
    }
}

pub fn load_layout_maps<S: PrivateDataStore + ?Sized>(store: &S, root_id: &str) -> Result<Vec<LayoutMap>> {
    Ok(load_envelope(store, root_id)?.layout_maps)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SAVE PIPELINE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub clean_layout_maps: Vec<LayoutMap>,
    pub report: ValidationReport,
    pub warnings: Vec<MappingWarning>,
    pub action_map: ActionMap,
    pub action: ActionDefinition,
    /// Whether the action was (re)installed by this save.
    pub installed: bool,
    pub fingerprint: String,
}

/// Validate, compile and generate, then install the action and persist the
/// cleaned maps.
///
/// The action is installed before the envelope is written so a failed
/// install never leaves a fingerprint behind that would suppress the retry.
pub fn save_layout_maps<H>(
    host: &mut H,
    root_id: &str,
    layout_maps: &[LayoutMap],
    doc: &DocSnapshot,
    options: &SaveOptions,
) -> Result<SaveOutcome>
where
    H: PrivateDataStore + ActionRegistry + ?Sized,
{
    let (clean, report) = clean_layout_maps(layout_maps, doc);
    let warnings = lint_layout_maps(&clean, doc);

    let action_map = layout_mapping_to_action_map(&clean, doc);
    let action = generate_action_script(&action_map, &options.script)?;
    let fingerprint = action.fingerprint();

    let mut data = host.private_data(root_id)?;
    let mut envelope = match data.get(TOOLBAR_KEY) {
        Some(json) => ToolbarEnvelope::decode(json)?,
        None => ToolbarEnvelope::default(),
    };

    let installed =
        options.force_install || envelope.script_fingerprint.as_deref() != Some(fingerprint.as_str());
    if installed {
        host.update_action(&action.name, &action)?;
    }

    envelope.version = ENVELOPE_VERSION;
    envelope.layout_maps = clean.clone();
    envelope.script_fingerprint = Some(fingerprint.clone());
    data.insert(TOOLBAR_KEY.to_string(), envelope.encode()?);
    host.set_private_data(root_id, &data)?;

    log::info!(
        "saved {} layout map(s) for {} ({} removal(s), {} entries, action {})",
        clean.len(),
        root_id,
        report.removal_count(),
        action_map.entry_count(),
        if installed { "installed" } else { "unchanged" }
    );

    Ok(SaveOutcome {
        clean_layout_maps: clean,
        report,
        warnings,
        action_map,
        action,
        installed,
        fingerprint,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY STUDIO
// ═══════════════════════════════════════════════════════════════════════════════

/// A whole studio in memory: document state, private data and installed
/// actions. Serves previews and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStudio {
    pub doc: DocSnapshot,
    pub selected_layout_id: Option<String>,
    pub private_data: HashMap<String, PrivateData>,
    pub actions: IndexMap<String, ActionDefinition>,
    /// Number of `update_action` calls served.
    pub install_count: usize,
    /// Reject private-data writes, like a document opened read-only.
    pub read_only: bool,
}

impl MemoryStudio {
    pub fn new(doc: DocSnapshot) -> Self {
        Self {
            doc,
            ..Self::default()
        }
    }

    pub fn select_layout(&mut self, layout_id: &str) {
        self.selected_layout_id = Some(layout_id.to_string());
    }

    pub fn action(&self, name: &str) -> Option<&ActionDefinition> {
        self.actions.get(name)
    }

    pub fn toolbar_json(&self, root_id: &str) -> Option<&str> {
        self.private_data
            .get(root_id)?
            .get(TOOLBAR_KEY)
            .map(String::as_str)
    }
}

impl PrivateDataStore for MemoryStudio {
    fn private_data(&self, root_id: &str) -> Result<PrivateData, HostError> {
        Ok(self.private_data.get(root_id).cloned().unwrap_or_default())
    }

    fn set_private_data(&mut self, root_id: &str, data: &PrivateData) -> Result<(), HostError> {
        if self.read_only {
            return Err(HostError(format!("document {} is read-only", root_id)));
        }
        self.private_data.insert(root_id.to_string(), data.clone());
        Ok(())
    }
}

impl ActionRegistry for MemoryStudio {
    fn update_action(&mut self, name: &str, action: &ActionDefinition) -> Result<(), HostError> {
        self.actions.insert(name.to_string(), action.clone());
        self.install_count += 1;
        Ok(())
    }
}

impl StudioHost for MemoryStudio {
    fn selected_layout_name(&self) -> Result<Option<String>, HostError> {
        let Some(id) = &self.selected_layout_id else {
            return Ok(None);
        };
        Ok(self.doc.index().layout_name(id).map(str::to_string))
    }

    fn variable_names(&self) -> Result<Vec<String>, HostError> {
        Ok(self.doc.variables.iter().map(|v| v.name.clone()).collect())
    }

    fn variable_value(&self, name: &str) -> Result<Option<HostValue>, HostError> {
        let Some(variable) = self.doc.variables.iter().find(|v| v.name == name) else {
            return Ok(None);
        };
        Ok(match &variable.kind {
            VariableKind::Boolean { value } => value.map(HostValue::Bool),
            VariableKind::Unsupported => None,
            _ => Some(HostValue::Text(variable.live_text())),
        })
    }

    fn set_variable_value(&mut self, name: &str, value: &str) -> Result<(), HostError> {
        let variable = self
            .doc
            .variables
            .iter_mut()
            .find(|v| v.name == name)
            .ok_or_else(|| HostError(format!("variable \"{}\" does not exist", name)))?;

        match &mut variable.kind {
            VariableKind::Image { value: slot }
            | VariableKind::ShortText { value: slot }
            | VariableKind::LongText { value: slot }
            | VariableKind::List { value: slot, .. } => *slot = Some(value.to_string()),
            VariableKind::Number { value: slot } => {
                let parsed = value
                    .parse::<f64>()
                    .map_err(|_| HostError(format!("\"{}\" is not a number", value)))?;
                *slot = Some(parsed);
            }
            VariableKind::Boolean { value: slot } => *slot = Some(value == "true"),
            VariableKind::Unsupported => {
                return Err(HostError(format!("variable \"{}\" cannot be written", name)));
            }
        }
        Ok(())
    }
}
