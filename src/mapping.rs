//! Layout Mapping Model
//!
//! User-authored configuration: which image-bearing variables resolve to
//! which value, per group of layouts, keyed on other variables' values.
//! Wire shape is the JSON the toolbar persists in the document.

use serde::{Deserialize, Serialize};

/// One mapping group: a set of layouts sharing the same dependency rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LayoutMap {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub layout_ids: Vec<String>,
    #[serde(default)]
    pub variables: Vec<TargetVariable>,
}

impl LayoutMap {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn target(&self, variable_id: &str) -> Option<&TargetVariable> {
        self.variables
            .iter()
            .find(|v| v.id.as_deref() == Some(variable_id))
    }

    pub fn target_mut(&mut self, variable_id: &str) -> Option<&mut TargetVariable> {
        self.variables
            .iter_mut()
            .find(|v| v.id.as_deref() == Some(variable_id))
    }
}

/// An image-bearing variable whose effective value is decided by its groups.
///
/// `type` is the kind recorded when the rule was authored; it drives UI
/// filtering only and is never checked against the live document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TargetVariable {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub r#type: String,
    #[serde(default)]
    pub dependent_group: Vec<DependentGroup>,
}

/// "When these dependents hold these values, resolve to this template."
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DependentGroup {
    #[serde(default)]
    pub dependents: Vec<DependentVar>,
    #[serde(default)]
    pub variable_value: Vec<ValueFragment>,
    /// Unconditional rule; compiled to the `_always_run` key.
    #[serde(default, skip_serializing_if = "is_false")]
    pub always_run: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl DependentGroup {
    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty() && self.variable_value.is_empty()
    }
}

/// A dependent variable and the values of it that activate the rule (OR).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DependentVar {
    pub variable_id: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// A piece of the resolved value template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ValueFragment {
    Text(String),
    Variable(VariableRef),
}

impl From<&str> for ValueFragment {
    fn from(text: &str) -> Self {
        ValueFragment::Text(text.to_string())
    }
}

/// Reference to another variable whose live value is spliced in, after
/// running its transforms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VariableRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default)]
    pub transform: Vec<TransformCommand>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransformCommand {
    pub find: String,
    #[serde(default)]
    pub replace: String,
    #[serde(default)]
    pub replace_all: bool,
    /// Carried for round-tripping. Both runtimes replace literally.
    #[serde(default)]
    pub regex: bool,
}

impl TransformCommand {
    pub fn new(find: &str, replace: &str, replace_all: bool) -> Self {
        Self {
            find: find.to_string(),
            replace: replace.to_string(),
            replace_all,
            regex: false,
        }
    }

    /// Literal substring replace; an empty `find` leaves the text untouched.
    pub fn apply(&self, text: &str) -> String {
        if self.find.is_empty() {
            return text.to_string();
        }
        if self.replace_all {
            text.replace(&self.find, &self.replace)
        } else {
            text.replacen(&self.find, &self.replace, 1)
        }
    }
}

/// Run `transforms` over `text` in order.
pub fn apply_transforms(text: &str, transforms: &[TransformCommand]) -> String {
    transforms
        .iter()
        .fold(text.to_string(), |acc, t| t.apply(&acc))
}
