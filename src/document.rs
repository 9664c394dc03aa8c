//! # Document Snapshot Model
//!
//! The read-only slice of host document state the mapping engine needs:
//! layouts and variables. Snapshots are produced by the host adapter and
//! never mutated here.
//!
//! ## Key Invariants
//!
//! 1. **Identity**: layouts and variables are identified by `id`. Names are
//!    labels and may collide.
//! 2. **Names at runtime**: the generated script only ever sees variable and
//!    layout *names*, so every id is resolved to a name at compile time.
//! 3. **Live text**: a variable value is rendered to text the same way the
//!    host scripting engine would stringify it (`null` → `""`, booleans →
//!    `"true"` / `"false"`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// A selectable entry of a list variable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
}

/// Variant-specific payload of a [`Variable`], tagged on `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VariableKind {
    Image {
        #[serde(default)]
        value: Option<String>,
    },
    ShortText {
        #[serde(default)]
        value: Option<String>,
    },
    LongText {
        #[serde(default)]
        value: Option<String>,
    },
    Number {
        #[serde(default)]
        value: Option<f64>,
    },
    List {
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        items: Vec<ListItem>,
    },
    Boolean {
        #[serde(default)]
        value: Option<bool>,
    },
    /// Host variable kinds this engine does not inspect. They still count as
    /// existing ids for validation and as names for compilation.
    #[serde(other)]
    Unsupported,
}

impl VariableKind {
    /// Kind tag as it appears on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            VariableKind::Image { .. } => "image",
            VariableKind::ShortText { .. } => "shortText",
            VariableKind::LongText { .. } => "longText",
            VariableKind::Number { .. } => "number",
            VariableKind::List { .. } => "list",
            VariableKind::Boolean { .. } => "boolean",
            VariableKind::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub id: String,
    pub name: String,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    #[serde(flatten)]
    pub kind: VariableKind,
}

fn default_visible() -> bool {
    true
}

impl Variable {
    /// Current value rendered as the host's scripting engine would see it
    /// after string coercion.
    pub fn live_text(&self) -> String {
        match &self.kind {
            VariableKind::Image { value }
            | VariableKind::ShortText { value }
            | VariableKind::LongText { value }
            | VariableKind::List { value, .. } => value.clone().unwrap_or_default(),
            VariableKind::Number { value } => value.map(format_number).unwrap_or_default(),
            VariableKind::Boolean { value } => value.map(|b| b.to_string()).unwrap_or_default(),
            VariableKind::Unsupported => String::new(),
        }
    }

    /// Selectable values of a list variable, `None` for every other kind.
    pub fn list_values(&self) -> Option<Vec<&str>> {
        match &self.kind {
            VariableKind::List { items, .. } => {
                Some(items.iter().map(|item| item.value.as_str()).collect())
            }
            _ => None,
        }
    }
}

/// Integral numbers print without a fractional part, like `String(3)` does.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocSnapshot {
    #[serde(default)]
    pub layouts: Vec<Layout>,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl DocSnapshot {
    pub fn new(layouts: Vec<Layout>, variables: Vec<Variable>) -> Self {
        Self { layouts, variables }
    }

    pub fn index(&self) -> DocumentIndex<'_> {
        DocumentIndex::new(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOOKUP INDEX
// ═══════════════════════════════════════════════════════════════════════════════

/// Id lookups over a [`DocSnapshot`], built once per validation or compile.
///
/// When a snapshot carries duplicate ids the first occurrence wins, matching
/// a front-to-back `find` over the arrays.
#[derive(Debug)]
pub struct DocumentIndex<'a> {
    layouts: HashMap<&'a str, &'a Layout>,
    variables: HashMap<&'a str, &'a Variable>,
}

impl<'a> DocumentIndex<'a> {
    pub fn new(doc: &'a DocSnapshot) -> Self {
        let mut layouts = HashMap::with_capacity(doc.layouts.len());
        for layout in &doc.layouts {
            layouts.entry(layout.id.as_str()).or_insert(layout);
        }
        let mut variables = HashMap::with_capacity(doc.variables.len());
        for variable in &doc.variables {
            variables.entry(variable.id.as_str()).or_insert(variable);
        }
        Self { layouts, variables }
    }

    pub fn has_layout(&self, id: &str) -> bool {
        self.layouts.contains_key(id)
    }

    pub fn has_variable(&self, id: &str) -> bool {
        self.variables.contains_key(id)
    }

    pub fn layout(&self, id: &str) -> Option<&'a Layout> {
        self.layouts.get(id).copied()
    }

    pub fn layout_name(&self, id: &str) -> Option<&'a str> {
        self.layout(id).map(|l| l.name.as_str())
    }

    pub fn variable(&self, id: &str) -> Option<&'a Variable> {
        self.variables.get(id).copied()
    }

    pub fn variable_name(&self, id: &str) -> Option<&'a str> {
        self.variable(id).map(|v| v.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_variable_kinds_deserialize() {
        let doc: DocSnapshot = serde_json::from_value(json!({
            "layouts": [{ "id": "L1", "name": "Square" }, { "id": "L2", "name": "Story", "parentId": "L1" }],
            "variables": [
                { "id": "v1", "name": "Hero", "type": "image", "value": "asset-1", "isVisible": true },
                { "id": "v2", "name": "Color", "type": "list", "value": "red",
                  "items": [{ "value": "red" }, { "value": "blue", "displayValue": "Blue" }] },
                { "id": "v3", "name": "Dark", "type": "boolean", "value": true, "isVisible": false },
                { "id": "v4", "name": "When", "type": "date", "value": "2024-01-01" }
            ]
        }))
        .unwrap();

        assert_eq!(doc.layouts[1].parent_id.as_deref(), Some("L1"));
        assert_eq!(doc.variables[0].kind.type_name(), "image");
        assert_eq!(doc.variables[1].list_values(), Some(vec!["red", "blue"]));
        assert!(!doc.variables[2].is_visible);
        assert_eq!(doc.variables[3].kind, VariableKind::Unsupported);
    }

    #[test]
    fn test_live_text_coercion() {
        let flag = Variable {
            id: "b".to_string(),
            name: "Flag".to_string(),
            is_visible: true,
            kind: VariableKind::Boolean { value: Some(false) },
        };
        let count = Variable {
            id: "n".to_string(),
            name: "Count".to_string(),
            is_visible: true,
            kind: VariableKind::Number { value: Some(3.0) },
        };
        let empty = Variable {
            id: "t".to_string(),
            name: "Text".to_string(),
            is_visible: true,
            kind: VariableKind::ShortText { value: None },
        };
        assert_eq!(flag.live_text(), "false");
        assert_eq!(count.live_text(), "3");
        assert_eq!(empty.live_text(), "");
    }

    #[test]
    fn test_index_first_duplicate_wins() {
        let doc = DocSnapshot::new(
            vec![
                Layout { id: "L1".into(), name: "First".into(), parent_id: None },
                Layout { id: "L1".into(), name: "Second".into(), parent_id: None },
            ],
            vec![
                Variable {
                    id: "v1".into(),
                    name: "Hero".into(),
                    is_visible: true,
                    kind: VariableKind::Image { value: None },
                },
                Variable {
                    id: "v1".into(),
                    name: "Logo".into(),
                    is_visible: true,
                    kind: VariableKind::Image { value: None },
                },
            ],
        );
        let index = doc.index();
        assert_eq!(index.layout_name("L1"), Some("First"));
        assert!(!index.has_layout("L2"));
        assert_eq!(index.variable_name("v1"), Some("Hero"));
        assert!(!index.has_variable("v2"));
    }
}
