//! Structural errors returned synchronously by graph, store and branch operations

use thiserror::Error;

use crate::document::SchemaError;
use crate::feature::{FeatureId, FeatureType};

/// Errors from history mutations; an operation that fails has no side effects
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("Dependency cycle: {}", join_ids(.path, " -> "))]
    Cycle { path: Vec<FeatureId> },

    #[error("Feature not found: {0}")]
    FeatureNotFound(FeatureId),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Feature already exists: {0}")]
    DuplicateFeature(FeatureId),

    #[error("Branch already exists: {0}")]
    DuplicateBranch(String),

    #[error("Feature {id} is still used by {}", join_ids(.dependents, ", "))]
    InUse {
        id: FeatureId,
        dependents: Vec<FeatureId>,
    },

    #[error("Feature {id} is a {expected} feature, got {found} parameters")]
    TypeMismatch {
        id: FeatureId,
        expected: FeatureType,
        found: FeatureType,
    },

    #[error("Cannot delete the active branch: {0}")]
    ActiveBranch(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// Result type for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

pub(crate) fn join_ids(ids: &[FeatureId], separator: &str) -> String {
    ids.iter()
        .map(FeatureId::as_str)
        .collect::<Vec<_>>()
        .join(separator)
}
