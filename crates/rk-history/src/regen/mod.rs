//! Regeneration Scheduler
//!
//! Replays dirty features in dependency order through the geometry kernel.
//! A failing feature never aborts the pass: it records its error, its
//! dependents are blocked, and unrelated features keep regenerating.

mod runner;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cancel::RegenTicket;
use crate::error::{HistoryError, HistoryResult};
use crate::feature::FeatureId;
use crate::kernel::{Artifact, GeometryKernel, KernelError};
use crate::store::FeatureStore;

use runner::{KernelOutcome, WorkerCount, run_kernel};

/// Why a feature could not use one of its parents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// The upstream feature failed in the kernel
    Failed,
    /// The upstream feature has not been regenerated yet
    NotRegenerated,
    /// The upstream feature sits past the rollback marker
    RolledBack,
    /// The upstream feature is suppressed and never produced an artifact
    SuppressedWithoutArtifact,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlockReason::Failed => "upstream feature failed",
            BlockReason::NotRegenerated => "upstream feature was not regenerated",
            BlockReason::RolledBack => "upstream feature is rolled back",
            BlockReason::SuppressedWithoutArtifact => {
                "upstream feature is suppressed and has no artifact"
            }
        })
    }
}

/// Per-feature outcome of a regeneration attempt
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeError {
    #[error("{0}")]
    Kernel(KernelError),

    /// `upstream` is the feature where the failure originated
    #[error("Blocked by {upstream}: {reason}")]
    Blocked {
        upstream: FeatureId,
        reason: BlockReason,
    },
}

impl NodeError {
    pub fn is_blocked(&self) -> bool {
        matches!(self, NodeError::Blocked { .. })
    }
}

/// Aggregated outcome of one regeneration pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegenerationResult {
    /// Features recomputed successfully, in execution order
    pub regenerated: Vec<FeatureId>,
    /// Features handed to the kernel, in execution order
    pub attempted: Vec<FeatureId>,
    /// Every feature that ended in error during this pass
    pub errors: BTreeMap<FeatureId, NodeError>,
    /// Features passed over because they are suppressed or rolled back
    pub skipped: Vec<FeatureId>,
    /// A newer request superseded this pass before it finished
    pub cancelled: bool,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl RegenerationResult {
    /// True when every attempted feature succeeded and the pass ran to the end
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }

    pub fn error_for(&self, id: &FeatureId) -> Option<&NodeError> {
        self.errors.get(id)
    }
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

/// Drives the kernel over a feature store
#[derive(Clone)]
pub struct Regenerator {
    kernel: Arc<dyn GeometryKernel>,
    budget: Duration,
    workers: WorkerCount,
}

impl fmt::Debug for Regenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Regenerator")
            .field("kernel", &self.kernel.name())
            .field("budget", &self.budget)
            .field("running", &self.workers.running())
            .finish()
    }
}

impl Regenerator {
    pub fn new(kernel: Arc<dyn GeometryKernel>, budget: Duration) -> Self {
        Self {
            kernel,
            budget,
            workers: WorkerCount::default(),
        }
    }

    pub fn kernel(&self) -> &Arc<dyn GeometryKernel> {
        &self.kernel
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Bring dirty features up to date
    ///
    /// With a scope, the scope and its dependents are recomputed even if
    /// they were clean. Kernel failures are reported in the result; only an
    /// unknown feature in `scope` fails the call, before anything changes.
    pub fn regenerate(
        &self,
        store: &mut FeatureStore,
        scope: Option<&HashSet<FeatureId>>,
        ticket: &RegenTicket,
    ) -> HistoryResult<RegenerationResult> {
        let started = Instant::now();

        let candidates: Vec<FeatureId> = match scope {
            Some(scope) => {
                for id in scope {
                    if !store.contains(id) {
                        return Err(HistoryError::FeatureNotFound(id.clone()));
                    }
                }
                for id in scope {
                    store.mark_dirty(id)?;
                }
                scope.iter().cloned().collect()
            }
            None => store.dirty_ids(),
        };

        let mut pool: HashSet<FeatureId> = HashSet::new();
        for id in &candidates {
            pool.extend(store.graph().descendants_of(id));
            pool.insert(id.clone());
        }
        let pool: Vec<FeatureId> = pool.into_iter().collect();
        let order = store.graph().topological_order(&pool)?;
        debug!("Regeneration pass over {} feature(s)", order.len());

        let mut result = RegenerationResult::default();
        for id in order {
            if ticket.is_cancelled() {
                result.cancelled = true;
                break;
            }
            if !self.step(store, &id, ticket, &mut result) {
                result.cancelled = true;
                break;
            }
        }

        result.elapsed = started.elapsed();
        if result.cancelled {
            info!(
                "Regeneration cancelled after {} feature(s) in {:?}",
                result.attempted.len(),
                result.elapsed
            );
        } else {
            info!(
                "Regenerated {} feature(s), {} error(s), {} skipped in {:?}",
                result.regenerated.len(),
                result.errors.len(),
                result.skipped.len(),
                result.elapsed
            );
        }
        Ok(result)
    }

    /// Process one feature; returns false when the pass was cancelled
    fn step(
        &self,
        store: &mut FeatureStore,
        id: &FeatureId,
        ticket: &RegenTicket,
        result: &mut RegenerationResult,
    ) -> bool {
        let Some(node) = store.get(id) else {
            return true;
        };
        if !node.dirty {
            debug!("{}: clean, skipping", id);
            return true;
        }
        if !store.is_active(id) {
            debug!("{}: past rollback marker, skipping", id);
            result.skipped.push(id.clone());
            return true;
        }
        if node.feature.suppressed {
            debug!("{}: suppressed, skipping", id);
            result.skipped.push(id.clone());
            if let Some(node) = store.node_mut(id) {
                node.dirty = false;
            }
            return true;
        }

        let kind = node.feature.kind.clone();
        let parents = match resolve_parents(store, id) {
            Ok(parents) => parents,
            Err(blocked) => {
                debug!("{}: {}", id, blocked);
                self.finish(store, id, Err(blocked), result);
                return true;
            }
        };

        result.attempted.push(id.clone());
        debug!("{}: running {} kernel", id, self.kernel.name());
        match run_kernel(
            &self.kernel,
            id,
            &kind,
            parents,
            ticket,
            self.budget,
            &self.workers,
        ) {
            KernelOutcome::Finished(Ok(artifact)) => {
                self.finish(store, id, Ok(artifact), result);
                true
            }
            KernelOutcome::Finished(Err(err)) => {
                warn!("Feature {} failed: {}", id, err);
                self.finish(store, id, Err(NodeError::Kernel(err)), result);
                true
            }
            KernelOutcome::Cancelled => {
                debug!("{}: superseded, result discarded", id);
                false
            }
        }
    }

    fn finish(
        &self,
        store: &mut FeatureStore,
        id: &FeatureId,
        outcome: Result<Artifact, NodeError>,
        result: &mut RegenerationResult,
    ) {
        let Some(node) = store.node_mut(id) else {
            return;
        };
        match outcome {
            Ok(artifact) => {
                node.record_success(artifact);
                result.regenerated.push(id.clone());
            }
            Err(err) => {
                node.record_failure(err.clone());
                result.errors.insert(id.clone(), err);
            }
        }
        store.mark_children_dirty(id);
    }
}

/// Collect parent artifacts in declared order, or report the first blocker
fn resolve_parents(store: &FeatureStore, id: &FeatureId) -> Result<Vec<Artifact>, NodeError> {
    let parent_ids = store.parents_of(id).unwrap_or_default();
    let mut artifacts = Vec::with_capacity(parent_ids.len());

    for parent_id in parent_ids {
        let blocked = |reason| NodeError::Blocked {
            upstream: parent_id.clone(),
            reason,
        };
        let Some(parent) = store.get(parent_id) else {
            return Err(blocked(BlockReason::NotRegenerated));
        };

        if !store.is_active(parent_id) {
            return Err(blocked(BlockReason::RolledBack));
        }
        // A suppressed parent hands down whatever it last produced, stale or not
        if parent.feature.suppressed {
            match &parent.artifact {
                Some(artifact) => {
                    artifacts.push(artifact.clone());
                    continue;
                }
                None => return Err(blocked(BlockReason::SuppressedWithoutArtifact)),
            }
        }
        match &parent.error {
            Some(NodeError::Kernel(_)) => return Err(blocked(BlockReason::Failed)),
            Some(upstream @ NodeError::Blocked { .. }) => return Err(upstream.clone()),
            None => {}
        }
        match parent.valid_artifact() {
            Some(artifact) if !parent.dirty => artifacts.push(artifact.clone()),
            _ => return Err(blocked(BlockReason::NotRegenerated)),
        }
    }
    Ok(artifacts)
}
