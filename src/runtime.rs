//! Reference Runtime for Image Selection
//!
//! Rust rendition of the behavior the generated action script performs
//! inside the host document. It drives the same lookups against a
//! [`StudioHost`] so mappings can be previewed and the script contract can be
//! pinned down in tests.
//!
//! Every miss is collected, never raised: a bad layout stops the run, a bad
//! variable is skipped, and host failures end the run with an `unexpected`
//! issue.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compile::{ActionEntry, ActionMap, VariableRules, ALWAYS_RUN_KEY, KEY_SEPARATOR};
use crate::mapping::apply_transforms;

pub const RT_LAYOUT_NOT_MAPPED: &str = "layout-not-mapped";
pub const RT_VARIABLE_NOT_MAPPED: &str = "variable-not-mapped";
pub const RT_NO_MATCHING_RULE: &str = "no-matching-rule";
pub const RT_UNEXPECTED: &str = "unexpected";

lazy_static! {
    /// `${name}` placeholders; the name runs up to the first `}`.
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\$\{([^}]*)\}").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// HOST SURFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Live variable value as the host reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostValue {
    Text(String),
    Bool(bool),
}

impl HostValue {
    pub fn as_text(&self) -> String {
        match self {
            HostValue::Text(s) => s.clone(),
            HostValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Text(s.to_string())
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HostError(pub String);

/// Sandbox primitives available to the action script.
pub trait StudioHost {
    fn selected_layout_name(&self) -> Result<Option<String>, HostError>;
    /// Names of every document variable, in document order.
    fn variable_names(&self) -> Result<Vec<String>, HostError>;
    fn variable_value(&self, name: &str) -> Result<Option<HostValue>, HostError>;
    fn set_variable_value(&mut self, name: &str, value: &str) -> Result<(), HostError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUN OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeIssue {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DebugEntry {
    pub step: String,
    pub variable: Option<String>,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub error_collection: Vec<RuntimeIssue>,
    /// Populated only for debug runs.
    pub debug_data: Vec<DebugEntry>,
    /// `(variable name, rendered value)` in write order.
    pub writes: Vec<(String, String)>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVALUATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Live text of a variable: missing and null values are empty.
pub fn live_text<H: StudioHost + ?Sized>(host: &H, name: &str) -> Result<String, HostError> {
    Ok(host
        .variable_value(name)?
        .map(|v| v.as_text())
        .unwrap_or_default())
}

/// Rebuild the value key for `dependent_key` from live values. The empty
/// key names no dependents and yields the empty value key.
pub fn live_value_key<H: StudioHost + ?Sized>(
    dependent_key: &str,
    host: &H,
) -> Result<String, HostError> {
    if dependent_key.is_empty() {
        return Ok(String::new());
    }
    let values = dependent_key
        .split(KEY_SEPARATOR)
        .map(|name| live_text(host, name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(values.join(KEY_SEPARATOR))
}

/// Substitute every `${name}` in the entry's template with the transformed
/// live value of `name`.
pub fn render_entry<H: StudioHost + ?Sized>(
    entry: &ActionEntry,
    host: &H,
) -> Result<String, HostError> {
    let mut rendered = String::with_capacity(entry.value.len());
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(&entry.value) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str();
        rendered.push_str(&entry.value[last..whole.start()]);
        let text = live_text(host, name)?;
        match entry.transforms.get(name) {
            Some(transforms) => rendered.push_str(&apply_transforms(&text, transforms)),
            None => rendered.push_str(&text),
        }
        last = whole.end();
    }
    rendered.push_str(&entry.value[last..]);
    Ok(rendered)
}

/// Pick the entry for one variable: `_always_run` first, otherwise the first
/// dependent key (in insertion order) whose live value key is present.
pub fn select_entry<'m, H: StudioHost + ?Sized>(
    rules: &'m VariableRules,
    host: &H,
    trace: &mut Tracer,
    variable: &str,
) -> Result<Option<&'m ActionEntry>, HostError> {
    if let Some(always) = rules.get(ALWAYS_RUN_KEY) {
        trace.push("always-run", Some(variable), String::new());
        return Ok(always.get(""));
    }

    for (dependent_key, table) in rules {
        let key = live_value_key(dependent_key, host)?;
        let hit = table.get(&key);
        trace.push(
            "lookup",
            Some(variable),
            format!("{} = {} ({})", dependent_key, key, if hit.is_some() { "hit" } else { "miss" }),
        );
        if hit.is_some() {
            return Ok(hit);
        }
    }
    Ok(None)
}

/// Debug trace sink; a no-op unless enabled.
#[derive(Debug, Default)]
pub struct Tracer {
    enabled: bool,
    entries: Vec<DebugEntry>,
}

impl Tracer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, step: &str, variable: Option<&str>, detail: String) {
        if self.enabled {
            self.entries.push(DebugEntry {
                step: step.to_string(),
                variable: variable.map(str::to_string),
                detail,
            });
        }
    }

    pub fn into_entries(self) -> Vec<DebugEntry> {
        self.entries
    }
}

/// Evaluate `action_map` against the host's current state and write the
/// resolved values back.
pub fn run_image_selection<H: StudioHost + ?Sized>(
    action_map: &ActionMap,
    host: &mut H,
    debug: bool,
) -> RunOutcome {
    let mut outcome = RunOutcome::default();
    let mut trace = Tracer::new(debug);

    if let Err(e) = execute(action_map, host, &mut trace, &mut outcome) {
        outcome.error_collection.push(RuntimeIssue {
            code: RT_UNEXPECTED.to_string(),
            message: e.to_string(),
            layout: None,
            variable: None,
        });
    }

    outcome.debug_data = trace.into_entries();
    outcome
}

fn execute<H: StudioHost + ?Sized>(
    action_map: &ActionMap,
    host: &mut H,
    trace: &mut Tracer,
    outcome: &mut RunOutcome,
) -> Result<(), HostError> {
    let layout_name = host.selected_layout_name()?.unwrap_or_default();
    let Some(layout_rules) = action_map.layout(&layout_name) else {
        outcome.error_collection.push(RuntimeIssue {
            code: RT_LAYOUT_NOT_MAPPED.to_string(),
            message: format!("No mapping for layout \"{}\"", layout_name),
            layout: Some(layout_name),
            variable: None,
        });
        return Ok(());
    };
    trace.push("layout", None, layout_name.clone());

    for name in host.variable_names()? {
        let Some(rules) = layout_rules.get(&name) else {
            outcome.error_collection.push(RuntimeIssue {
                code: RT_VARIABLE_NOT_MAPPED.to_string(),
                message: format!("No mapping for variable \"{}\"", name),
                layout: Some(layout_name.clone()),
                variable: Some(name),
            });
            continue;
        };

        let Some(entry) = select_entry(rules, &*host, trace, &name)? else {
            outcome.error_collection.push(RuntimeIssue {
                code: RT_NO_MATCHING_RULE.to_string(),
                message: format!("No rule matches the current values for \"{}\"", name),
                layout: Some(layout_name.clone()),
                variable: Some(name),
            });
            continue;
        };

        let rendered = render_entry(entry, &*host)?;
        host.set_variable_value(&name, &rendered)?;
        trace.push("set", Some(name.as_str()), rendered.clone());
        outcome.writes.push((name, rendered));
    }

    Ok(())
}
