use thiserror::Error;

use crate::runtime::HostError;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("toolbar data is not a valid envelope: {0}")]
    EnvelopeDecode(#[source] serde_json::Error),

    #[error("toolbar data version {found} is newer than the supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("host error: {0}")]
    Host(#[from] HostError),

    #[error("generated script failed verification: {}", .0.join("; "))]
    ScriptVerification(Vec<String>),

    #[error("layout map {0} not found")]
    UnknownLayoutMap(String),

    #[error("layout {0} does not exist in the document")]
    UnknownLayout(String),

    #[error("variable {0} does not exist in the document")]
    UnknownVariable(String),

    #[error("layout {layout_id} is already assigned to map {map_id}")]
    LayoutAlreadyAssigned { layout_id: String, map_id: String },

    #[error("variable {variable_id} is already a target of map {map_id}")]
    DuplicateTarget { variable_id: String, map_id: String },

    #[error("map {map_id} has no target variable {variable_id}")]
    UnknownTarget { variable_id: String, map_id: String },

    #[error("variable {variable_id} has no dependent group {index}")]
    GroupOutOfRange { variable_id: String, index: usize },
}

pub type Result<T, E = MappingError> = std::result::Result<T, E>;
