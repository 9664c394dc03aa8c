//! Codegen module for the image selection action
//!
//! Turns a compiled [`ActionMap`] into the script text the host installs as
//! a trigger-bound action. The runtime is a fixed template with exactly one
//! substitution point, the `"%DATA%"` literal. It receives the script payload
//! (the action map plus the authored order of every variable's dependent
//! keys) as JSON text inside a string literal, decoded with `JSON.parse`.
//!
//! Two JS object behaviors make a plain object literal unsafe here: a
//! `__proto__` key sets the prototype instead of an own property, and
//! integer-like keys enumerate before all others. `JSON.parse` always creates
//! own properties, and the explicit order list replaces `Object.keys`.
//!
//! The template mirrors [`crate::runtime`] step for step; the script parity
//! tests run both against the same studio state.

#[cfg(feature = "napi")]
use napi_derive::napi;
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use indexmap::IndexMap;
use oxc_span::SourceType;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::compile::ActionMap;
use crate::error::{MappingError, Result};
use crate::options::ScriptOptions;
use crate::scope::check_script;

/// Literal token (quotes included) replaced by the serialized action map.
pub const DATA_PLACEHOLDER: &str = "\"%DATA%\"";
pub const SCRIPT_FUNCTION_NAME: &str = "imageSelectionScript";

// ═══════════════════════════════════════════════════════════════════════════════
// ACTION TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ActionEvent {
    SelectedLayoutChanged,
    VariableValueChanged,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionTrigger {
    pub event: ActionEvent,
    /// Variable ids that fire the trigger; absent means any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Vec<String>>,
}

impl ActionTrigger {
    pub fn on(event: ActionEvent) -> Self {
        Self {
            event,
            triggers: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub name: String,
    pub triggers: Vec<ActionTrigger>,
    pub script: String,
}

impl ActionDefinition {
    /// SHA-256 over everything the host stores for the action.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        for trigger in &self.triggers {
            hasher.update(format!("{:?}{:?}", trigger.event, trigger.triggers).as_bytes());
        }
        hasher.update(self.script.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Selected layout changed, or any variable value changed.
pub fn default_triggers() -> Vec<ActionTrigger> {
    vec![
        ActionTrigger::on(ActionEvent::SelectedLayoutChanged),
        ActionTrigger::on(ActionEvent::VariableValueChanged),
    ]
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUNTIME TEMPLATE
// ═══════════════════════════════════════════════════════════════════════════════

const RUNTIME_TEMPLATE: &str = r##"// [layout-mapping] generated action, edits are overwritten on save
function imageSelectionScript(debug) {
  const payload = JSON.parse("%DATA%");
  const actionMap = payload.actionMap;
  const dependencyOrder = payload.dependencyOrder;
  const errorCollection = [];
  const debugData = [];

  const own = (obj, key) =>
    obj != null && Object.prototype.hasOwnProperty.call(obj, key) ? obj[key] : undefined;

  const trace = (step, variable, detail) => {
    if (debug) {
      debugData.push({ step: step, variable: variable, detail: detail });
    }
  };

  const liveText = (name) => {
    const value = getVariableValue(name);
    return value == null ? "" : String(value);
  };

  // Literal replace; `regex` is carried but not honored.
  const applyTransforms = (text, transforms) => {
    let out = text;
    for (const t of transforms || []) {
      if (!t.find) {
        continue;
      }
      const replacement = t.replace == null ? "" : String(t.replace);
      if (t.replaceAll) {
        out = out.split(t.find).join(replacement);
      } else {
        const at = out.indexOf(t.find);
        if (at !== -1) {
          out = out.slice(0, at) + replacement + out.slice(at + t.find.length);
        }
      }
    }
    return out;
  };

  const liveValueKey = (dependencyKey) =>
    dependencyKey === ""
      ? ""
      : dependencyKey.split("|").map((name) => liveText(name)).join("|");

  const render = (entry) =>
    entry.value.replace(/\$\{([^}]*)\}/g, (placeholder, name) =>
      applyTransforms(liveText(name), own(entry.transforms, name))
    );

  // `order` lists the dependent keys as authored; object key order is not
  // reliable for integer-like names.
  const selectEntry = (groups, order, variable) => {
    const alwaysRun = own(groups, "_always_run");
    if (alwaysRun !== undefined) {
      trace("always-run", variable, "");
      return own(alwaysRun, "");
    }
    for (const dependencyKey of order || []) {
      const valueKey = liveValueKey(dependencyKey);
      const hit = own(own(groups, dependencyKey), valueKey);
      trace(
        "lookup",
        variable,
        dependencyKey + " = " + valueKey + (hit === undefined ? " (miss)" : " (hit)")
      );
      if (hit !== undefined) {
        return hit;
      }
    }
    return undefined;
  };

  try {
    const selected = getSelectedLayoutName();
    const layoutName = selected == null ? "" : String(selected);
    const layoutImageMapping = own(actionMap, layoutName);
    if (layoutImageMapping === undefined) {
      errorCollection.push({
        code: "layout-not-mapped",
        message: "No mapping for layout \"" + layoutName + "\"",
        layout: layoutName,
      });
      return { errorCollection: errorCollection, debugData: debugData };
    }
    const layoutOrder = own(dependencyOrder, layoutName);
    trace("layout", null, layoutName);

    for (const v of studio.variables.all()) {
      const groups = own(layoutImageMapping, v.name);
      if (groups === undefined) {
        errorCollection.push({
          code: "variable-not-mapped",
          message: "No mapping for variable \"" + v.name + "\"",
          layout: layoutName,
          variable: v.name,
        });
        continue;
      }

      const entry = selectEntry(groups, own(layoutOrder, v.name), v.name);
      if (entry === undefined) {
        errorCollection.push({
          code: "no-matching-rule",
          message: "No rule matches the current values for \"" + v.name + "\"",
          layout: layoutName,
          variable: v.name,
        });
        continue;
      }

      const rendered = render(entry);
      setVariableValue(v.name, rendered);
      trace("set", v.name, rendered);
    }
  } catch (e) {
    errorCollection.push({ code: "unexpected", message: String(e) });
  }

  return { errorCollection: errorCollection, debugData: debugData };
}
"##;

// ═══════════════════════════════════════════════════════════════════════════════
// GENERATION
// ═══════════════════════════════════════════════════════════════════════════════

/// What the script decodes at startup.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScriptPayload<'a> {
    action_map: &'a ActionMap,
    /// layout name → variable name → dependent keys in insertion order
    dependency_order: IndexMap<&'a str, IndexMap<&'a str, Vec<&'a str>>>,
}

impl<'a> ScriptPayload<'a> {
    fn new(action_map: &'a ActionMap) -> Self {
        let dependency_order = action_map
            .0
            .iter()
            .map(|(layout, variables)| {
                let variables = variables
                    .iter()
                    .map(|(variable, rules)| {
                        (variable.as_str(), rules.keys().map(String::as_str).collect())
                    })
                    .collect();
                (layout.as_str(), variables)
            })
            .collect();
        Self {
            action_map,
            dependency_order,
        }
    }
}

/// JSON text the script's `JSON.parse` receives.
pub fn script_payload(action_map: &ActionMap) -> Result<String> {
    serde_json::to_string(&ScriptPayload::new(action_map)).map_err(|source| {
        MappingError::Serialize {
            what: "script payload",
            source,
        }
    })
}

/// Script text with the payload spliced in, followed by the invocation.
pub fn render_script(action_map: &ActionMap, debug: bool) -> Result<String> {
    let payload = script_payload(action_map)?;
    // A JSON string literal is also a valid JS string literal, apart from
    // the line separators.
    let literal = serde_json::to_string(&payload).map_err(|source| MappingError::Serialize {
        what: "script payload",
        source,
    })?;

    let mut script =
        RUNTIME_TEMPLATE.replacen(DATA_PLACEHOLDER, &escape_js_separators(&literal), 1);
    script.push_str(&format!("\n{}({});\n", SCRIPT_FUNCTION_NAME, debug));
    Ok(script)
}

/// Build the installable action for `action_map`.
pub fn generate_action_script(
    action_map: &ActionMap,
    options: &ScriptOptions,
) -> Result<ActionDefinition> {
    let mut script = render_script(action_map, options.debug)?;

    if options.verify {
        let check = check_script(&script);
        if !check.is_clean() {
            return Err(MappingError::ScriptVerification(check.into_messages()));
        }
    }

    if options.minify {
        script = minify_script(&script)?;
    }

    log::debug!(
        "generated action {} ({} entries, {} bytes)",
        options.action_name,
        action_map.entry_count(),
        script.len()
    );

    Ok(ActionDefinition {
        name: options.action_name.clone(),
        triggers: default_triggers(),
        script,
    })
}

/// Reprint `source` without whitespace or comments.
pub fn minify_script(source: &str) -> Result<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::default()).parse();
    if !ret.errors.is_empty() {
        return Err(MappingError::ScriptVerification(
            ret.errors.iter().map(|e| format!("{:?}", e)).collect(),
        ));
    }

    let options = CodegenOptions {
        minify: true,
        ..CodegenOptions::default()
    };
    Ok(Codegen::new().with_options(options).build(&ret.program).code)
}

/// U+2028 / U+2029 are legal in JSON strings but not in older JS string
/// literals.
fn escape_js_separators(json: &str) -> String {
    json.replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn generate_action_script_native(
    action_map_json: String,
    options_json: Option<String>,
) -> napi::Result<String> {
    let action_map: ActionMap = serde_json::from_str(&action_map_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid action map: {}", e)))?;
    let options: ScriptOptions = match options_json {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| napi::Error::from_reason(format!("Invalid script options: {}", e)))?,
        None => ScriptOptions::default(),
    };

    let action = generate_action_script(&action_map, &options)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_string(&action).map_err(|e| napi::Error::from_reason(e.to_string()))
}
