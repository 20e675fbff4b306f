//! Parametric Feature History Engine
//!
//! This crate provides:
//! - A dependency graph over modeling features with cycle detection
//! - Incremental, failure-isolated regeneration through a geometry kernel
//! - Branch-scoped copies of the whole history (fork/switch)
//! - Document export and import in JSON and RON

pub mod branch;
pub mod cancel;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod feature;
pub mod graph;
pub mod kernel;
pub mod regen;
pub mod store;

// Re-exports for convenience
pub use branch::{Branch, BranchMetadata, BranchStore};
pub use cancel::{CancelToken, RegenCanceller, RegenTicket};
pub use config::{ConfigError, EngineConfig};
pub use document::{
    Document, DocumentFormat, DocumentMetadata, DocumentNode, SCHEMA_VERSION, SchemaError,
};
pub use engine::Engine;
pub use error::{HistoryError, HistoryResult};
pub use feature::{
    ChamferParams, CircularPatternParams, CurvePatternParams, DeleteFaceParams, EdgeIndex,
    ExtrudeDirection, ExtrudeParams, FaceIndex, Feature, FeatureId, FeatureKind, FeatureMetadata,
    FeatureType, FillPatternParams, FilletParams, LinearPatternParams, MirrorFaceParams,
    OffsetFaceParams, ReplaceFaceParams, SketchParams,
};
pub use graph::DependencyGraph;
pub use kernel::{
    Artifact, GeometryKernel, KernelError, NullKernel, PreviewKernel, TessellatedMesh,
};
pub use regen::{BlockReason, NodeError, RegenerationResult, Regenerator};
pub use store::{FeatureNode, FeatureStore, NodeView};
