//! Shared builders for the pipeline tests.

use crate::document::{DocSnapshot, Layout, ListItem, Variable, VariableKind};
use crate::mapping::{
    DependentGroup, DependentVar, LayoutMap, TargetVariable, TransformCommand, ValueFragment,
    VariableRef,
};
use crate::persist::MemoryStudio;
use crate::runtime::{HostError, HostValue, StudioHost};

pub fn layout(id: &str, name: &str) -> Layout {
    Layout {
        id: id.to_string(),
        name: name.to_string(),
        parent_id: None,
    }
}

pub fn variable(id: &str, name: &str, kind: VariableKind) -> Variable {
    Variable {
        id: id.to_string(),
        name: name.to_string(),
        is_visible: true,
        kind,
    }
}

pub fn image_var(id: &str, name: &str, value: Option<&str>) -> Variable {
    variable(id, name, VariableKind::Image { value: value.map(str::to_string) })
}

pub fn text_var(id: &str, name: &str, value: Option<&str>) -> Variable {
    variable(id, name, VariableKind::ShortText { value: value.map(str::to_string) })
}

pub fn list_var(id: &str, name: &str, value: &str, items: &[&str]) -> Variable {
    variable(
        id,
        name,
        VariableKind::List {
            value: Some(value.to_string()),
            items: items
                .iter()
                .map(|v| ListItem {
                    value: v.to_string(),
                    display_value: None,
                })
                .collect(),
        },
    )
}

pub fn bool_var(id: &str, name: &str, value: Option<bool>) -> Variable {
    variable(id, name, VariableKind::Boolean { value })
}

/// Three layouts; two image targets; list, boolean and text dependents.
pub fn sample_doc() -> DocSnapshot {
    DocSnapshot::new(
        vec![
            layout("L1", "Square"),
            layout("L2", "Story"),
            layout("L3", "Banner"),
        ],
        vec![
            image_var("hero", "Hero", None),
            image_var("logo", "Logo", Some("logo-default")),
            list_var("color", "Color", "red", &["red", "blue"]),
            list_var("size", "Size", "s", &["s", "m"]),
            bool_var("dark", "Dark", Some(false)),
            text_var("name", "Name", Some("xxx")),
            text_var("letter", "Letter", Some("a")),
            text_var("axis", "Axis", Some("x")),
        ],
    )
}

pub fn dependent(variable_id: &str, values: &[&str]) -> DependentVar {
    DependentVar {
        variable_id: variable_id.to_string(),
        values: values.iter().map(|v| v.to_string()).collect(),
    }
}

pub fn group(dependents: Vec<DependentVar>, variable_value: Vec<ValueFragment>) -> DependentGroup {
    DependentGroup {
        dependents,
        variable_value,
        always_run: false,
    }
}

pub fn always_run(variable_value: Vec<ValueFragment>) -> DependentGroup {
    DependentGroup {
        dependents: vec![],
        variable_value,
        always_run: true,
    }
}

pub fn text(s: &str) -> ValueFragment {
    ValueFragment::Text(s.to_string())
}

pub fn var_ref(id: &str, transform: Vec<TransformCommand>) -> ValueFragment {
    ValueFragment::Variable(VariableRef {
        id: Some(id.to_string()),
        r#type: None,
        transform,
    })
}

pub fn target(id: &str, dependent_group: Vec<DependentGroup>) -> TargetVariable {
    TargetVariable {
        id: Some(id.to_string()),
        r#type: "image".to_string(),
        dependent_group,
    }
}

pub fn layout_map(id: &str, layout_ids: &[&str], variables: Vec<TargetVariable>) -> LayoutMap {
    LayoutMap {
        id: id.to_string(),
        name: None,
        layout_ids: layout_ids.iter().map(|l| l.to_string()).collect(),
        variables,
    }
}

/// `Hero` on `Square` keyed on `Color`, with a fixed fallback for `Logo`.
pub fn sample_maps() -> Vec<LayoutMap> {
    vec![layout_map(
        "m1",
        &["L1"],
        vec![
            target(
                "hero",
                vec![
                    group(vec![dependent("color", &["red"])], vec![text("hero-red")]),
                    group(vec![dependent("color", &["blue"])], vec![text("hero-blue")]),
                ],
            ),
            target("logo", vec![group(vec![], vec![text("logo-fixed")])]),
        ],
    )]
}

/// Host whose reads of one variable fail.
pub struct FlakyHost {
    pub inner: MemoryStudio,
    pub broken: Option<&'static str>,
}

impl StudioHost for FlakyHost {
    fn selected_layout_name(&self) -> Result<Option<String>, HostError> {
        self.inner.selected_layout_name()
    }

    fn variable_names(&self) -> Result<Vec<String>, HostError> {
        self.inner.variable_names()
    }

    fn variable_value(&self, name: &str) -> Result<Option<HostValue>, HostError> {
        if self.broken == Some(name) {
            return Err(HostError(format!("cannot read {}", name)));
        }
        self.inner.variable_value(name)
    }

    fn set_variable_value(&mut self, name: &str, value: &str) -> Result<(), HostError> {
        self.inner.set_variable_value(name, value)
    }
}
