//! Branch Store
//!
//! Named, independently editable copies of a feature store. Forking deep
//! copies every node; branches never merge. Exactly one branch is active.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{HistoryError, HistoryResult};
use crate::store::FeatureStore;

/// Descriptive data about a branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchMetadata {
    pub branch_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BranchMetadata {
    pub fn new(branch_id: impl Into<String>, author: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            branch_id: branch_id.into(),
            description: String::new(),
            tags: Vec::new(),
            author: author.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A named feature store
#[derive(Debug, Clone)]
pub struct Branch {
    metadata: BranchMetadata,
    store: FeatureStore,
}

impl Branch {
    /// Create an empty branch
    pub fn new(branch_id: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            metadata: BranchMetadata::new(branch_id, author),
            store: FeatureStore::new(),
        }
    }

    pub fn from_parts(metadata: BranchMetadata, store: FeatureStore) -> Self {
        Self { metadata, store }
    }

    /// Deep copy under a new name
    pub fn fork(&self, branch_id: impl Into<String>) -> Self {
        let mut metadata = BranchMetadata::new(branch_id, self.metadata.author.clone());
        metadata.description = self.metadata.description.clone();
        metadata.tags = self.metadata.tags.clone();
        Self {
            metadata,
            store: self.store.clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.branch_id
    }

    pub fn metadata(&self) -> &BranchMetadata {
        &self.metadata
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    /// Mutable access to the features; call [`Branch::touch`] after edits
    pub fn store_mut(&mut self) -> &mut FeatureStore {
        &mut self.store
    }

    /// Record a modification
    pub fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.metadata.description = description.into();
        self.touch();
    }

    /// Add a tag unless already present
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.metadata.tags.contains(&tag) {
            self.metadata.tags.push(tag);
            self.touch();
        }
    }
}

/// All branches of a model with one active branch
#[derive(Debug, Clone)]
pub struct BranchStore {
    active: Branch,
    /// Every branch except the active one
    inactive: HashMap<String, Branch>,
}

impl BranchStore {
    /// Start with a single empty branch
    pub fn new(branch_id: impl Into<String>, author: impl Into<String>) -> Self {
        Self::with_branch(Branch::new(branch_id, author))
    }

    /// Start with an existing branch, e.g. one just imported
    pub fn with_branch(branch: Branch) -> Self {
        Self {
            active: branch,
            inactive: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inactive.len() + 1
    }

    pub fn contains(&self, branch_id: &str) -> bool {
        self.active.id() == branch_id || self.inactive.contains_key(branch_id)
    }

    pub fn active(&self) -> &Branch {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut Branch {
        &mut self.active
    }

    pub fn active_id(&self) -> &str {
        self.active.id()
    }

    pub fn get(&self, branch_id: &str) -> Option<&Branch> {
        if self.active.id() == branch_id {
            Some(&self.active)
        } else {
            self.inactive.get(branch_id)
        }
    }

    pub fn get_mut(&mut self, branch_id: &str) -> Option<&mut Branch> {
        if self.active.id() == branch_id {
            Some(&mut self.active)
        } else {
            self.inactive.get_mut(branch_id)
        }
    }

    /// Add an empty branch
    pub fn create(
        &mut self,
        branch_id: impl Into<String>,
        author: impl Into<String>,
    ) -> HistoryResult<()> {
        self.insert(Branch::new(branch_id, author))
    }

    /// Add an existing branch without activating it
    pub fn insert(&mut self, branch: Branch) -> HistoryResult<()> {
        if self.contains(branch.id()) {
            return Err(HistoryError::DuplicateBranch(branch.id().to_owned()));
        }
        self.inactive.insert(branch.id().to_owned(), branch);
        Ok(())
    }

    /// Deep copy `from` into a new branch `new_id`
    pub fn fork(&mut self, from: &str, new_id: impl Into<String>) -> HistoryResult<()> {
        let new_id = new_id.into();
        if self.contains(&new_id) {
            return Err(HistoryError::DuplicateBranch(new_id));
        }
        let source = self
            .get(from)
            .ok_or_else(|| HistoryError::BranchNotFound(from.to_owned()))?;

        let forked = source.fork(new_id.clone());
        info!("Forked branch {} from {}", new_id, from);
        self.inactive.insert(new_id, forked);
        Ok(())
    }

    /// Make another branch active
    pub fn switch(&mut self, branch_id: &str) -> HistoryResult<()> {
        if self.active.id() == branch_id {
            return Ok(());
        }
        let next = self
            .inactive
            .remove(branch_id)
            .ok_or_else(|| HistoryError::BranchNotFound(branch_id.to_owned()))?;

        let previous = std::mem::replace(&mut self.active, next);
        self.inactive.insert(previous.id().to_owned(), previous);
        info!("Switched to branch {}", branch_id);
        Ok(())
    }

    /// Remove an inactive branch
    pub fn delete(&mut self, branch_id: &str) -> HistoryResult<Branch> {
        if self.active.id() == branch_id {
            return Err(HistoryError::ActiveBranch(branch_id.to_owned()));
        }
        self.inactive
            .remove(branch_id)
            .ok_or_else(|| HistoryError::BranchNotFound(branch_id.to_owned()))
    }

    /// Metadata of every branch, oldest first (ties broken by id)
    pub fn list(&self) -> Vec<BranchMetadata> {
        let mut all: Vec<BranchMetadata> = std::iter::once(&self.active)
            .chain(self.inactive.values())
            .map(|branch| branch.metadata.clone())
            .collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.branch_id.cmp(&b.branch_id))
        });
        all
    }

    pub fn describe(&mut self, branch_id: &str, description: impl Into<String>) -> HistoryResult<()> {
        self.get_mut(branch_id)
            .ok_or_else(|| HistoryError::BranchNotFound(branch_id.to_owned()))?
            .set_description(description);
        Ok(())
    }

    pub fn tag(&mut self, branch_id: &str, tag: impl Into<String>) -> HistoryResult<()> {
        self.get_mut(branch_id)
            .ok_or_else(|| HistoryError::BranchNotFound(branch_id.to_owned()))?
            .add_tag(tag);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Feature, FeatureId, SketchParams};

    fn with_sketch() -> BranchStore {
        let mut branches = BranchStore::new("main", "alice");
        branches
            .active_mut()
            .store_mut()
            .insert(
                Feature::sketch("Sketch", SketchParams::rectangle(1.0, 1.0)).with_id("S1"),
                vec![],
            )
            .unwrap();
        branches
    }

    #[test]
    fn test_fork_is_independent() {
        let mut branches = with_sketch();
        branches.fork("main", "main-copy").unwrap();
        branches.switch("main-copy").unwrap();
        branches
            .active_mut()
            .store_mut()
            .remove(&FeatureId::from("S1"))
            .unwrap();

        assert!(branches.active().store().is_empty());
        let main = branches.get("main").unwrap();
        assert!(main.store().contains(&FeatureId::from("S1")));
        assert_eq!(branches.get("main-copy").unwrap().metadata().author, "alice");
    }

    #[test]
    fn test_fork_errors() {
        let mut branches = with_sketch();
        assert_eq!(
            branches.fork("nope", "x"),
            Err(HistoryError::BranchNotFound("nope".into()))
        );
        assert_eq!(
            branches.fork("main", "main"),
            Err(HistoryError::DuplicateBranch("main".into()))
        );
        assert_eq!(branches.len(), 1);
    }

    #[test]
    fn test_switch_unknown_keeps_active() {
        let mut branches = with_sketch();
        assert_eq!(
            branches.switch("ghost"),
            Err(HistoryError::BranchNotFound("ghost".into()))
        );
        assert_eq!(branches.active_id(), "main");
    }

    #[test]
    fn test_cannot_delete_active() {
        let mut branches = with_sketch();
        branches.create("scratch", "bob").unwrap();
        assert_eq!(
            branches.delete("main").unwrap_err(),
            HistoryError::ActiveBranch("main".into())
        );
        let removed = branches.delete("scratch").unwrap();
        assert_eq!(removed.metadata().author, "bob");
        assert_eq!(branches.len(), 1);
    }

    #[test]
    fn test_list_oldest_first() {
        let mut branches = with_sketch();
        branches.fork("main", "b").unwrap();
        branches.fork("main", "a").unwrap();
        let list = branches.list();
        assert_eq!(list.len(), 3);
        assert!(list.windows(2).all(|w| {
            (w[0].created_at, &w[0].branch_id) <= (w[1].created_at, &w[1].branch_id)
        }));
    }

    #[test]
    fn test_metadata_edits_touch() {
        let mut branches = with_sketch();
        let before = branches.active().metadata().updated_at;
        branches.describe("main", "baseline").unwrap();
        branches.tag("main", "v1").unwrap();
        branches.tag("main", "v1").unwrap();
        let meta = branches.active().metadata();
        assert_eq!(meta.description, "baseline");
        assert_eq!(meta.tags, vec!["v1".to_string()]);
        assert!(meta.updated_at >= before);
    }
}
