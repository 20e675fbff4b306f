//! Geometry kernel adapter
//!
//! The history engine never does solid modeling itself. It hands a feature's
//! kind and its parents' artifacts to a [`GeometryKernel`] and caches what
//! comes back.

mod mesh;
mod preview;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::feature::FeatureKind;

pub use mesh::TessellatedMesh;
pub use preview::PreviewKernel;

/// Human-readable failure reported by a kernel
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct KernelError {
    pub message: String,
}

impl KernelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Kernel did not answer within its time budget
    pub fn timeout(budget: Duration) -> Self {
        Self::new(format!(
            "kernel timed out after {} ms",
            budget.as_millis()
        ))
    }

    /// Kernel thread died before producing a result
    pub fn panicked() -> Self {
        Self::new("kernel panicked")
    }

    /// Kernel observed the cancel token and stopped early
    pub fn cancelled() -> Self {
        Self::new("cancelled")
    }
}

/// Cached output of one successful feature evaluation
///
/// Meshes are immutable once produced and shared between branches.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Identity of this particular evaluation
    pub id: Uuid,
    pub mesh: Arc<TessellatedMesh>,
}

impl Artifact {
    pub fn new(mesh: TessellatedMesh) -> Self {
        Self {
            id: Uuid::new_v4(),
            mesh: Arc::new(mesh),
        }
    }

    /// New evaluation that reuses an existing mesh
    pub fn shared(mesh: Arc<TessellatedMesh>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mesh,
        }
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Artifact {}

/// The geometry kernel consumed by the regeneration scheduler
///
/// Implementations run on a worker thread and should poll `cancel` during
/// long operations.
pub trait GeometryKernel: Send + Sync {
    /// Get the name of this kernel
    fn name(&self) -> &str;

    /// Evaluate one feature against the artifacts of its parents
    ///
    /// `parents` follows the feature's declared parent order.
    fn execute(
        &self,
        kind: &FeatureKind,
        parents: &[Artifact],
        cancel: &CancelToken,
    ) -> Result<Artifact, KernelError>;
}

/// A null kernel that always returns errors (used when no kernel is available)
#[derive(Debug, Default)]
pub struct NullKernel;

impl GeometryKernel for NullKernel {
    fn name(&self) -> &str {
        "null"
    }

    fn execute(
        &self,
        kind: &FeatureKind,
        _parents: &[Artifact],
        _cancel: &CancelToken,
    ) -> Result<Artifact, KernelError> {
        Err(KernelError::new(format!(
            "No geometry kernel available for {}",
            kind.feature_type().display_name()
        )))
    }
}
