//! # Layout Mapping Engine
//!
//! Decides, per layout, which value each image-bearing variable of a studio
//! document takes given the live values of other variables. Users author
//! [`LayoutMap`]s; on save they are validated against a [`DocSnapshot`],
//! compiled into an [`ActionMap`], spliced into a generated action script and
//! installed in the document. [`run_image_selection`] is the Rust reference
//! of what that script does.
//!
//! ## Pipeline Invariants
//!
//! 1. **Validation is total**: dangling layout and variable ids are pruned
//!    and reported, never raised. Validating a cleaned map reports nothing.
//!
//! 2. **Compilation is best effort**: anything that does not resolve is
//!    skipped without writing an entry. The output is a pure function of the
//!    maps and the snapshot, in insertion order.
//!
//! 3. **Key symmetry**: the compiler joins dependent names and values with
//!    `|` in authored order; the script rebuilds value keys from live values
//!    with the same join. The two must agree byte for byte.
//!
//! 4. **Conflict order**: identical full keys keep the last write; at runtime
//!    `_always_run` wins, then the first dependent key (insertion order)
//!    whose value key is present. [`lint_layout_maps`] reports both cases.
//!
//! 5. **Runtime never throws**: every miss lands in `errorCollection`, and
//!    unexpected failures are caught at the top of the script.
//!
//! 6. **Persisted data fails closed**: malformed or newer toolbar envelopes
//!    are rejected instead of overwritten.

pub mod codegen;
pub mod compile;
pub mod document;
pub mod error;
pub mod lint;
pub mod mapping;
pub mod options;
pub mod persist;
pub mod runtime;
pub mod scope;
pub mod session;
pub mod validate;

#[cfg(test)]
mod test_fixtures;

#[cfg(test)]
mod compile_tests;
#[cfg(test)]
mod validate_tests;

pub use codegen::{generate_action_script, ActionDefinition, ActionEvent, ActionTrigger};
pub use compile::{layout_mapping_to_action_map, ActionEntry, ActionMap, ALWAYS_RUN_KEY};
pub use document::{DocSnapshot, Layout, ListItem, Variable, VariableKind};
pub use error::{MappingError, Result};
pub use lint::{lint_layout_maps, MappingWarning};
pub use mapping::{
    DependentGroup, DependentVar, LayoutMap, TargetVariable, TransformCommand, ValueFragment,
    VariableRef,
};
pub use options::{SaveOptions, ScriptOptions};
pub use persist::{
    load_layout_maps, save_layout_maps, ActionRegistry, MemoryStudio, PrivateDataStore,
    SaveOutcome, ToolbarEnvelope,
};
pub use runtime::{run_image_selection, HostError, HostValue, RunOutcome, RuntimeIssue, StudioHost};
pub use session::MappingSession;
pub use validate::{validate_layout_map, validate_layout_maps, ValidationOutcome, ValidationReport};

#[cfg(feature = "napi")]
pub use codegen::generate_action_script_native;
#[cfg(feature = "napi")]
pub use compile::compile_action_map_native;
#[cfg(feature = "napi")]
pub use lint::lint_layout_maps_native;
#[cfg(feature = "napi")]
pub use validate::validate_layout_maps_native;
