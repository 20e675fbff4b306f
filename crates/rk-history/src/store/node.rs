//! Feature nodes and their cache state

use chrono::{DateTime, Utc};

use crate::feature::Feature;
use crate::kernel::Artifact;
use crate::regen::NodeError;

/// A feature plus the cached result of its last evaluation
#[derive(Debug, Clone)]
pub struct FeatureNode {
    pub feature: Feature,
    /// Latest artifact; kept across failures but then flagged stale
    pub artifact: Option<Artifact>,
    /// The artifact does not reflect the current inputs
    pub stale: bool,
    /// Outcome of the last attempt, if it failed or was blocked
    pub error: Option<NodeError>,
    /// Needs regeneration
    pub dirty: bool,
    /// When the node last finished a regeneration attempt
    pub regenerated_at: Option<DateTime<Utc>>,
}

impl FeatureNode {
    /// Fresh node with nothing cached
    pub fn new(feature: Feature) -> Self {
        Self {
            feature,
            artifact: None,
            stale: false,
            error: None,
            dirty: true,
            regenerated_at: None,
        }
    }

    /// Artifact only when it reflects the current inputs
    pub fn valid_artifact(&self) -> Option<&Artifact> {
        if self.stale || self.error.is_some() {
            None
        } else {
            self.artifact.as_ref()
        }
    }

    pub(crate) fn record_success(&mut self, artifact: Artifact) {
        self.artifact = Some(artifact);
        self.stale = false;
        self.error = None;
        self.dirty = false;
        self.regenerated_at = Some(Utc::now());
    }

    pub(crate) fn record_failure(&mut self, error: NodeError) {
        self.stale = self.artifact.is_some();
        self.error = Some(error);
        self.dirty = false;
        self.regenerated_at = Some(Utc::now());
    }
}

/// What the viewport needs to draw one feature
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    /// Latest artifact, possibly stale
    pub artifact: Option<Artifact>,
    pub stale: bool,
    pub error: Option<NodeError>,
    pub dirty: bool,
    pub suppressed: bool,
    /// False when the feature sits past the rollback marker
    pub active: bool,
}
