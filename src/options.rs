//! Generation and save settings.

use serde::{Deserialize, Serialize};

/// Name the generated action is installed under unless configured.
pub const DEFAULT_ACTION_NAME: &str = "AUTO_GEN_LAYOUT_IMAGE_MAPPING";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptOptions {
    pub action_name: String,
    /// Collect a lookup trace in the script's `debugData`.
    pub debug: bool,
    /// Print the script without whitespace or comments.
    pub minify: bool,
    /// Parse the script and reject identifiers outside the sandbox surface.
    pub verify: bool,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            action_name: DEFAULT_ACTION_NAME.to_string(),
            debug: false,
            minify: false,
            verify: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveOptions {
    pub script: ScriptOptions,
    /// Reinstall the action even when its fingerprint is unchanged.
    pub force_install: bool,
}
