//! Serialization Layer
//!
//! A [`Document`] is the persisted form of one branch: features, parent
//! lists, suppression flags, the rollback marker and branch metadata.
//! Artifacts and errors are never persisted; an imported branch starts with
//! every feature dirty.

mod codec;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::branch::{Branch, BranchMetadata};
use crate::error::{HistoryError, join_ids};
use crate::feature::{Feature, FeatureId, FeatureKind, FeatureType};
use crate::store::FeatureStore;

pub use codec::{DocumentFormat, load, save};

/// Current document schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Import failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Unsupported schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Unknown feature type '{type_name}' on node {id}")]
    UnknownFeatureType { id: FeatureId, type_name: String },

    #[error("Invalid parameters for {feature_type} node {id}: {message}")]
    InvalidParameters {
        id: FeatureId,
        feature_type: FeatureType,
        message: String,
    },

    #[error("Duplicate node id: {0}")]
    DuplicateNode(FeatureId),

    #[error("Node {id} references unknown parent {parent}")]
    UnknownParent { id: FeatureId, parent: FeatureId },

    #[error("Dependency cycle: {}", join_ids(.path, " -> "))]
    Cycle { path: Vec<FeatureId> },

    #[error("Rollback target is not a node: {0}")]
    UnknownRollback(FeatureId),
}

/// Branch metadata as written in a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One feature as written in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: FeatureId,
    /// Feature type tag, e.g. `extrude`
    #[serde(rename = "type")]
    pub feature_type: String,
    /// Type-specific parameter record
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub parent_ids: Vec<FeatureId>,
    #[serde(default)]
    pub suppressed: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Persisted form of a branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub schema_version: u32,
    pub branch_id: String,
    /// Nodes in insertion order
    pub nodes: Vec<DocumentNode>,
    pub metadata: DocumentMetadata,
    /// Last active feature (None = at end)
    #[serde(default)]
    pub rollback: Option<FeatureId>,
}

/// Snapshot a branch
pub fn export(branch: &Branch) -> Result<Document, HistoryError> {
    let store = branch.store();
    let mut nodes = Vec::with_capacity(store.len());
    for node in store.iter() {
        let feature = &node.feature;
        let parameters = feature
            .kind
            .parameters_value()
            .map_err(|e| HistoryError::Serialize(e.to_string()))?;
        // serde_json writes NaN and infinities as null, which import rejects
        if contains_null(&parameters) {
            return Err(HistoryError::Serialize(format!(
                "feature {} has a non-finite parameter",
                feature.id
            )));
        }
        nodes.push(DocumentNode {
            id: feature.id.clone(),
            feature_type: feature.feature_type().as_str().to_owned(),
            parameters,
            parent_ids: store.parents_of(&feature.id).unwrap_or_default().to_vec(),
            suppressed: feature.suppressed,
            name: feature.name.clone(),
            description: feature.description.clone(),
            tags: feature.tags.clone(),
        });
    }

    let meta = branch.metadata();
    Ok(Document {
        schema_version: SCHEMA_VERSION,
        branch_id: meta.branch_id.clone(),
        nodes,
        metadata: DocumentMetadata {
            author: meta.author.clone(),
            description: meta.description.clone(),
            tags: meta.tags.clone(),
            created_at: meta.created_at,
            updated_at: meta.updated_at,
        },
        rollback: store.rollback().cloned(),
    })
}

/// Rebuild a branch from a document, validating it completely first
pub fn import(document: Document) -> Result<Branch, SchemaError> {
    check_version(document.schema_version)?;

    let mut seen: HashSet<FeatureId> = HashSet::with_capacity(document.nodes.len());
    let mut features = Vec::with_capacity(document.nodes.len());
    for node in document.nodes {
        if !seen.insert(node.id.clone()) {
            return Err(SchemaError::DuplicateNode(node.id));
        }
        let feature_type: FeatureType = node.feature_type.parse().map_err(|type_name| {
            SchemaError::UnknownFeatureType {
                id: node.id.clone(),
                type_name,
            }
        })?;
        let kind = FeatureKind::from_parameters(feature_type, node.parameters).map_err(|e| {
            SchemaError::InvalidParameters {
                id: node.id.clone(),
                feature_type,
                message: e.to_string(),
            }
        })?;

        let feature = Feature {
            id: node.id,
            name: node.name,
            kind,
            suppressed: node.suppressed,
            description: node.description,
            tags: node.tags,
        };
        features.push((feature, node.parent_ids));
    }

    for (feature, parents) in &features {
        if let Some(parent) = parents.iter().find(|p| !seen.contains(*p)) {
            return Err(SchemaError::UnknownParent {
                id: feature.id.clone(),
                parent: parent.clone(),
            });
        }
    }

    // Parents may be listed after their children, so wire edges second
    let mut store = FeatureStore::new();
    let mut edges = Vec::with_capacity(features.len());
    for (feature, parents) in features {
        let id = store.insert(feature, Vec::new()).map_err(structural)?;
        edges.push((id, parents));
    }
    for (id, parents) in edges {
        if !parents.is_empty() {
            store.set_parents(&id, parents).map_err(structural)?;
        }
    }

    if let Some(marker) = document.rollback {
        if !seen.contains(&marker) {
            return Err(SchemaError::UnknownRollback(marker));
        }
        store.rollback_to(&marker).map_err(structural)?;
    }

    debug!(
        "Imported branch {} with {} feature(s)",
        document.branch_id,
        store.len()
    );
    let meta = document.metadata;
    let metadata = BranchMetadata {
        branch_id: document.branch_id,
        description: meta.description,
        tags: meta.tags,
        author: meta.author,
        created_at: meta.created_at,
        updated_at: meta.updated_at,
    };
    Ok(Branch::from_parts(metadata, store))
}

fn contains_null(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Array(items) => items.iter().any(contains_null),
        serde_json::Value::Object(fields) => fields.values().any(contains_null),
        _ => false,
    }
}

pub(crate) fn check_version(found: u32) -> Result<(), SchemaError> {
    if found == SCHEMA_VERSION {
        Ok(())
    } else {
        Err(SchemaError::UnsupportedVersion {
            found,
            expected: SCHEMA_VERSION,
        })
    }
}

fn structural(err: HistoryError) -> SchemaError {
    match err {
        HistoryError::Cycle { path } => SchemaError::Cycle { path },
        HistoryError::DuplicateFeature(id) => SchemaError::DuplicateNode(id),
        other => SchemaError::Malformed(other.to_string()),
    }
}
