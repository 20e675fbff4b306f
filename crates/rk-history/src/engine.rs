//! Editing session
//!
//! [`Engine`] owns the branches of one model, the kernel and the
//! cancellation handle. It is the single entry point UI actions go through:
//! edits mark features dirty on the active branch, and nothing is recomputed
//! until [`Engine::request_regenerate`] is called.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::branch::{Branch, BranchMetadata, BranchStore};
use crate::cancel::RegenCanceller;
use crate::config::EngineConfig;
use crate::document::{self, Document};
use crate::error::{HistoryError, HistoryResult};
use crate::feature::{Feature, FeatureId, FeatureKind, FeatureMetadata};
use crate::kernel::{Artifact, GeometryKernel};
use crate::regen::{RegenerationResult, Regenerator};
use crate::store::{FeatureStore, NodeView};

/// One editing session over a branched feature history
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    branches: BranchStore,
    regenerator: Regenerator,
    canceller: RegenCanceller,
}

impl Engine {
    /// Start a session with an empty default branch
    pub fn new(config: EngineConfig, kernel: Arc<dyn GeometryKernel>) -> Self {
        let branches = BranchStore::new(
            config.default_branch.clone(),
            config.default_author.clone(),
        );
        Self::with_branches(config, kernel, branches)
    }

    /// Start a session on a previously exported branch
    pub fn from_document(
        config: EngineConfig,
        kernel: Arc<dyn GeometryKernel>,
        document: Document,
    ) -> HistoryResult<Self> {
        let branch = document::import(document)?;
        Ok(Self::with_branches(
            config,
            kernel,
            BranchStore::with_branch(branch),
        ))
    }

    /// Start a session on a document file
    pub fn open(
        config: EngineConfig,
        kernel: Arc<dyn GeometryKernel>,
        path: impl AsRef<Path>,
    ) -> HistoryResult<Self> {
        let document = document::load(path)?;
        Self::from_document(config, kernel, document)
    }

    fn with_branches(
        config: EngineConfig,
        kernel: Arc<dyn GeometryKernel>,
        branches: BranchStore,
    ) -> Self {
        let regenerator = Regenerator::new(kernel, config.kernel_time_budget());
        Self {
            config,
            branches,
            regenerator,
            canceller: RegenCanceller::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle that cancels the in-flight regeneration from any thread
    pub fn canceller(&self) -> RegenCanceller {
        self.canceller.clone()
    }

    pub fn branches(&self) -> &BranchStore {
        &self.branches
    }

    pub fn active_branch(&self) -> &Branch {
        self.branches.active()
    }

    /// Features of the active branch
    pub fn store(&self) -> &FeatureStore {
        self.branches.active().store()
    }

    // ============== Editing ==============

    /// Add a feature on the active branch
    pub fn add_feature(
        &mut self,
        feature: Feature,
        parent_ids: Vec<FeatureId>,
        metadata: Option<FeatureMetadata>,
    ) -> HistoryResult<FeatureId> {
        let feature = match metadata {
            Some(metadata) => feature.with_metadata(metadata),
            None => feature,
        };
        self.edit(|store| store.insert(feature, parent_ids))
    }

    /// Remove a feature nothing depends on
    pub fn remove_feature(&mut self, id: &FeatureId) -> HistoryResult<Feature> {
        self.edit(|store| store.remove(id))
    }

    /// Remove a feature together with its dependents
    pub fn remove_feature_cascade(&mut self, id: &FeatureId) -> HistoryResult<Vec<FeatureId>> {
        self.edit(|store| store.remove_cascade(id))
    }

    pub fn update_parameters(&mut self, id: &FeatureId, kind: FeatureKind) -> HistoryResult<()> {
        self.edit(|store| store.update_parameters(id, kind))
    }

    pub fn set_suppressed(&mut self, id: &FeatureId, suppressed: bool) -> HistoryResult<()> {
        self.edit(|store| store.set_suppressed(id, suppressed))
    }

    pub fn set_parents(&mut self, id: &FeatureId, parent_ids: Vec<FeatureId>) -> HistoryResult<()> {
        self.edit(|store| store.set_parents(id, parent_ids))
    }

    pub fn rename_feature(&mut self, id: &FeatureId, name: impl Into<String>) -> HistoryResult<()> {
        self.edit(|store| store.rename(id, name))
    }

    pub fn set_feature_metadata(
        &mut self,
        id: &FeatureId,
        metadata: FeatureMetadata,
    ) -> HistoryResult<()> {
        self.edit(|store| store.set_metadata(id, metadata))
    }

    pub fn rollback_to(&mut self, id: &FeatureId) -> HistoryResult<()> {
        self.edit(|store| store.rollback_to(id))
    }

    pub fn rollback_to_end(&mut self) {
        let branch = self.branches.active_mut();
        branch.store_mut().rollback_to_end();
        branch.touch();
    }

    /// Run a mutation on the active branch, touching it on success
    fn edit<T>(
        &mut self,
        op: impl FnOnce(&mut FeatureStore) -> HistoryResult<T>,
    ) -> HistoryResult<T> {
        let branch = self.branches.active_mut();
        let value = op(branch.store_mut())?;
        branch.touch();
        Ok(value)
    }

    // ============== Regeneration ==============

    /// Recompute dirty features, or `scope` and its dependents
    ///
    /// Starting a request cancels any pass still running.
    pub fn request_regenerate(
        &mut self,
        scope: Option<&HashSet<FeatureId>>,
    ) -> HistoryResult<RegenerationResult> {
        let ticket = self.canceller.begin();
        let store = self.branches.active_mut().store_mut();
        self.regenerator.regenerate(store, scope, &ticket)
    }

    /// Up-to-date artifact of a feature
    pub fn select(&self, id: &FeatureId) -> Option<Artifact> {
        self.store().select(id)
    }

    /// Latest artifact and flags of a feature, for the viewport
    pub fn view(&self, id: &FeatureId) -> Option<NodeView> {
        self.store().view(id)
    }

    // ============== Branches ==============

    pub fn create_branch(&mut self, branch_id: impl Into<String>) -> HistoryResult<()> {
        let author = self.config.default_author.clone();
        self.branches.create(branch_id, author)
    }

    pub fn fork_branch(&mut self, from: &str, new_id: impl Into<String>) -> HistoryResult<()> {
        self.branches.fork(from, new_id)
    }

    /// Activate another branch, cancelling any pass on the old one
    pub fn switch_branch(&mut self, branch_id: &str) -> HistoryResult<()> {
        if !self.branches.contains(branch_id) {
            return Err(HistoryError::BranchNotFound(branch_id.to_owned()));
        }
        self.canceller.cancel();
        self.branches.switch(branch_id)
    }

    pub fn list_branches(&self) -> Vec<BranchMetadata> {
        self.branches.list()
    }

    pub fn delete_branch(&mut self, branch_id: &str) -> HistoryResult<()> {
        self.branches.delete(branch_id).map(|_| ())
    }

    pub fn describe_branch(
        &mut self,
        branch_id: &str,
        description: impl Into<String>,
    ) -> HistoryResult<()> {
        self.branches.describe(branch_id, description)
    }

    pub fn tag_branch(&mut self, branch_id: &str, tag: impl Into<String>) -> HistoryResult<()> {
        self.branches.tag(branch_id, tag)
    }

    // ============== Persistence ==============

    pub fn export_active(&self) -> HistoryResult<Document> {
        document::export(self.branches.active())
    }

    /// Add a document as a new inactive branch; returns its id
    pub fn import_branch(&mut self, document: Document) -> HistoryResult<String> {
        if self.branches.contains(&document.branch_id) {
            return Err(HistoryError::DuplicateBranch(document.branch_id));
        }
        let branch = document::import(document)?;
        let branch_id = branch.id().to_owned();
        self.branches.insert(branch)?;
        info!("Imported branch {}", branch_id);
        Ok(branch_id)
    }

    /// Write the active branch to a file
    pub fn save(&self, path: impl AsRef<Path>) -> HistoryResult<()> {
        let path = path.as_ref();
        document::save(&self.export_active()?, path)?;
        info!("Saved branch {} to {}", self.branches.active_id(), path.display());
        Ok(())
    }

    /// Read a document file into a new inactive branch
    pub fn load(&mut self, path: impl AsRef<Path>) -> HistoryResult<String> {
        let document = document::load(path)?;
        self.import_branch(document)
    }
}
