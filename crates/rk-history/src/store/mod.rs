//! Feature Node Store
//!
//! Owns the nodes of one branch together with their dependency graph and
//! artifact cache. Every structural edit goes through here so the graph and
//! the node map never disagree. Mutations only mark nodes dirty; nothing is
//! regenerated until the scheduler runs.

mod node;

use std::collections::HashMap;

use tracing::debug;

use crate::error::{HistoryError, HistoryResult};
use crate::feature::{Feature, FeatureId, FeatureKind, FeatureMetadata};
use crate::graph::DependencyGraph;
use crate::kernel::Artifact;

pub use node::{FeatureNode, NodeView};

/// Nodes of one branch plus their dependency graph
#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    nodes: HashMap<FeatureId, FeatureNode>,
    graph: DependencyGraph,
    /// Last active feature (None = at end)
    rollback: Option<FeatureId>,
}

impl FeatureStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &FeatureId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &FeatureId) -> Option<&FeatureNode> {
        self.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: &FeatureId) -> Option<&mut FeatureNode> {
        self.nodes.get_mut(id)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Feature IDs in insertion order
    pub fn ids(&self) -> &[FeatureId] {
        self.graph.ids()
    }

    /// Nodes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &FeatureNode> {
        self.graph.ids().iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn parents_of(&self, id: &FeatureId) -> Option<&[FeatureId]> {
        self.graph.parents_of(id)
    }

    pub fn children_of(&self, id: &FeatureId) -> Vec<FeatureId> {
        self.graph.children_of(id)
    }

    // ============== Editing ==============

    /// Add a feature depending on `parent_ids`
    ///
    /// While rolled back, the feature lands right after the rollback marker
    /// and becomes the new marker.
    pub fn insert(&mut self, feature: Feature, parent_ids: Vec<FeatureId>) -> HistoryResult<FeatureId> {
        let id = feature.id.clone();
        let index = match &self.rollback {
            Some(marker) => self
                .graph
                .position(marker)
                .map_or(self.graph.len(), |pos| pos + 1),
            None => self.graph.len(),
        };

        self.graph.insert_node(index, id.clone(), parent_ids)?;
        self.nodes.insert(id.clone(), FeatureNode::new(feature));
        if self.rollback.is_some() {
            self.rollback = Some(id.clone());
        }

        debug!("Inserted feature {}", id);
        Ok(id)
    }

    /// Replace the parameters of a feature, keeping its type
    pub fn update_parameters(&mut self, id: &FeatureId, kind: FeatureKind) -> HistoryResult<()> {
        let node = self.require(id)?;
        let expected = node.feature.feature_type();
        let found = kind.feature_type();
        if expected != found {
            return Err(HistoryError::TypeMismatch {
                id: id.clone(),
                expected,
                found,
            });
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.feature.kind = kind;
        }
        self.mark_dirty(id)
    }

    /// Suppress or unsuppress a feature
    pub fn set_suppressed(&mut self, id: &FeatureId, suppressed: bool) -> HistoryResult<()> {
        let node = self.require(id)?;
        if node.feature.suppressed == suppressed {
            return Ok(());
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.feature.suppressed = suppressed;
        }
        self.mark_dirty(id)
    }

    /// Change the display name; geometry is unaffected
    pub fn rename(&mut self, id: &FeatureId, name: impl Into<String>) -> HistoryResult<()> {
        self.require(id)?;
        if let Some(node) = self.nodes.get_mut(id) {
            node.feature.name = name.into();
        }
        Ok(())
    }

    /// Replace description and tags; geometry is unaffected
    pub fn set_metadata(&mut self, id: &FeatureId, metadata: FeatureMetadata) -> HistoryResult<()> {
        self.require(id)?;
        if let Some(node) = self.nodes.get_mut(id) {
            node.feature.description = metadata.description;
            node.feature.tags = metadata.tags;
        }
        Ok(())
    }

    /// Re-parent a feature, all-or-nothing
    pub fn set_parents(&mut self, id: &FeatureId, parent_ids: Vec<FeatureId>) -> HistoryResult<()> {
        self.graph.set_parents(id, parent_ids)?;
        self.mark_dirty(id)
    }

    /// Remove a feature nothing depends on
    pub fn remove(&mut self, id: &FeatureId) -> HistoryResult<Feature> {
        self.require(id)?;
        let previous = self.previous_of(id);
        self.graph.remove_node(id)?;
        self.forget(id, previous)
    }

    /// Remove a feature and everything that depends on it
    ///
    /// Returns the removed IDs, dependents first.
    pub fn remove_cascade(&mut self, id: &FeatureId) -> HistoryResult<Vec<FeatureId>> {
        self.require(id)?;

        let mut doomed: Vec<FeatureId> = self.graph.descendants_of(id).into_iter().collect();
        doomed.push(id.clone());
        let mut order = self.graph.topological_order(&doomed)?;
        order.reverse();

        for victim in &order {
            let previous = self.previous_of(victim);
            self.graph.remove_node(victim)?;
            self.forget(victim, previous)?;
        }
        debug!("Removed {} feature(s) starting at {}", order.len(), id);
        Ok(order)
    }

    // ============== Dirty tracking ==============

    /// Mark a feature and all its transitive dependents dirty
    pub fn mark_dirty(&mut self, id: &FeatureId) -> HistoryResult<()> {
        self.require(id)?;
        let mut affected = self.graph.descendants_of(id);
        affected.insert(id.clone());
        for target in &affected {
            if let Some(node) = self.nodes.get_mut(target) {
                node.dirty = true;
            }
        }
        Ok(())
    }

    /// Mark the direct dependents of a feature dirty
    pub(crate) fn mark_children_dirty(&mut self, id: &FeatureId) {
        for child in self.graph.children_of(id) {
            if let Some(node) = self.nodes.get_mut(&child) {
                node.dirty = true;
            }
        }
    }

    /// Dirty features in insertion order
    pub fn dirty_ids(&self) -> Vec<FeatureId> {
        self.iter()
            .filter(|node| node.dirty)
            .map(|node| node.feature.id.clone())
            .collect()
    }

    // ============== Viewport ==============

    /// Latest artifact and flags for a feature
    pub fn view(&self, id: &FeatureId) -> Option<NodeView> {
        let node = self.nodes.get(id)?;
        Some(NodeView {
            artifact: node.artifact.clone(),
            stale: node.stale,
            error: node.error.clone(),
            dirty: node.dirty,
            suppressed: node.feature.suppressed,
            active: self.is_active(id),
        })
    }

    /// Artifact of a feature if it reflects the current inputs
    pub fn select(&self, id: &FeatureId) -> Option<Artifact> {
        let node = self.nodes.get(id)?;
        if node.dirty {
            return None;
        }
        node.valid_artifact().cloned()
    }

    // ============== Rollback ==============

    /// Deactivate every feature inserted after `id`
    pub fn rollback_to(&mut self, id: &FeatureId) -> HistoryResult<()> {
        self.require(id)?;
        self.rollback = Some(id.clone());
        Ok(())
    }

    /// Reactivate all features
    pub fn rollback_to_end(&mut self) {
        self.rollback = None;
    }

    /// Current rollback marker (None = at end)
    pub fn rollback(&self) -> Option<&FeatureId> {
        self.rollback.as_ref()
    }

    /// Whether a feature is at or before the rollback marker
    pub fn is_active(&self, id: &FeatureId) -> bool {
        match &self.rollback {
            None => self.contains(id),
            Some(marker) => match (self.graph.position(id), self.graph.position(marker)) {
                (Some(pos), Some(end)) => pos <= end,
                _ => false,
            },
        }
    }

    fn require(&self, id: &FeatureId) -> HistoryResult<&FeatureNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| HistoryError::FeatureNotFound(id.clone()))
    }

    /// Feature inserted just before `id`
    fn previous_of(&self, id: &FeatureId) -> Option<FeatureId> {
        let pos = self.graph.position(id)?;
        pos.checked_sub(1)
            .and_then(|prev| self.graph.ids().get(prev))
            .cloned()
    }

    /// Drop a node already removed from the graph
    ///
    /// A removed rollback marker hands over to its predecessor.
    fn forget(&mut self, id: &FeatureId, previous: Option<FeatureId>) -> HistoryResult<Feature> {
        if self.rollback.as_ref() == Some(id) {
            self.rollback = previous;
        }
        self.nodes
            .remove(id)
            .map(|node| node.feature)
            .ok_or_else(|| HistoryError::FeatureNotFound(id.clone()))
    }
}
