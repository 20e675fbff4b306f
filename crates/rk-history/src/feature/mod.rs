//! Feature definitions
//!
//! A feature is one parametric modeling step. Parameters are a closed tagged
//! union with one record per feature type, so kernel dispatch is exhaustive.

mod params;

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use params::{
    ChamferParams, CircularPatternParams, CurvePatternParams, DeleteFaceParams, EdgeIndex,
    ExtrudeDirection, ExtrudeParams, FaceIndex, FillPatternParams, FilletParams,
    LinearPatternParams, MirrorFaceParams, OffsetFaceParams, ReplaceFaceParams, SketchParams,
};

/// Unique identifier of a feature within a branch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(String);

impl FeatureId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for FeatureId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for FeatureId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Feature type tag, as written in documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureType {
    Sketch,
    Extrude,
    Fillet,
    Chamfer,
    OffsetFace,
    DeleteFace,
    ReplaceFace,
    MirrorFace,
    LinearPattern,
    CircularPattern,
    CurvePattern,
    FillPattern,
}

impl FeatureType {
    pub const ALL: [FeatureType; 12] = [
        FeatureType::Sketch,
        FeatureType::Extrude,
        FeatureType::Fillet,
        FeatureType::Chamfer,
        FeatureType::OffsetFace,
        FeatureType::DeleteFace,
        FeatureType::ReplaceFace,
        FeatureType::MirrorFace,
        FeatureType::LinearPattern,
        FeatureType::CircularPattern,
        FeatureType::CurvePattern,
        FeatureType::FillPattern,
    ];

    /// Tag used in serialized documents
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::Sketch => "sketch",
            FeatureType::Extrude => "extrude",
            FeatureType::Fillet => "fillet",
            FeatureType::Chamfer => "chamfer",
            FeatureType::OffsetFace => "offset-face",
            FeatureType::DeleteFace => "delete-face",
            FeatureType::ReplaceFace => "replace-face",
            FeatureType::MirrorFace => "mirror-face",
            FeatureType::LinearPattern => "linear-pattern",
            FeatureType::CircularPattern => "circular-pattern",
            FeatureType::CurvePattern => "curve-pattern",
            FeatureType::FillPattern => "fill-pattern",
        }
    }

    /// Human-readable name for the feature tree
    pub fn display_name(&self) -> &'static str {
        match self {
            FeatureType::Sketch => "Sketch",
            FeatureType::Extrude => "Extrude",
            FeatureType::Fillet => "Fillet",
            FeatureType::Chamfer => "Chamfer",
            FeatureType::OffsetFace => "Offset Face",
            FeatureType::DeleteFace => "Delete Face",
            FeatureType::ReplaceFace => "Replace Face",
            FeatureType::MirrorFace => "Mirror Face",
            FeatureType::LinearPattern => "Linear Pattern",
            FeatureType::CircularPattern => "Circular Pattern",
            FeatureType::CurvePattern => "Curve Pattern",
            FeatureType::FillPattern => "Fill Pattern",
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for FeatureType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| s.to_owned())
    }
}

/// Type and parameters of a feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "parameters", rename_all = "kebab-case")]
pub enum FeatureKind {
    Sketch(SketchParams),
    Extrude(ExtrudeParams),
    Fillet(FilletParams),
    Chamfer(ChamferParams),
    OffsetFace(OffsetFaceParams),
    DeleteFace(DeleteFaceParams),
    ReplaceFace(ReplaceFaceParams),
    MirrorFace(MirrorFaceParams),
    LinearPattern(LinearPatternParams),
    CircularPattern(CircularPatternParams),
    CurvePattern(CurvePatternParams),
    FillPattern(FillPatternParams),
}

impl FeatureKind {
    pub fn feature_type(&self) -> FeatureType {
        match self {
            FeatureKind::Sketch(_) => FeatureType::Sketch,
            FeatureKind::Extrude(_) => FeatureType::Extrude,
            FeatureKind::Fillet(_) => FeatureType::Fillet,
            FeatureKind::Chamfer(_) => FeatureType::Chamfer,
            FeatureKind::OffsetFace(_) => FeatureType::OffsetFace,
            FeatureKind::DeleteFace(_) => FeatureType::DeleteFace,
            FeatureKind::ReplaceFace(_) => FeatureType::ReplaceFace,
            FeatureKind::MirrorFace(_) => FeatureType::MirrorFace,
            FeatureKind::LinearPattern(_) => FeatureType::LinearPattern,
            FeatureKind::CircularPattern(_) => FeatureType::CircularPattern,
            FeatureKind::CurvePattern(_) => FeatureType::CurvePattern,
            FeatureKind::FillPattern(_) => FeatureType::FillPattern,
        }
    }

    /// Parameters as a self-describing value, without the type tag
    pub fn parameters_value(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            FeatureKind::Sketch(p) => serde_json::to_value(p),
            FeatureKind::Extrude(p) => serde_json::to_value(p),
            FeatureKind::Fillet(p) => serde_json::to_value(p),
            FeatureKind::Chamfer(p) => serde_json::to_value(p),
            FeatureKind::OffsetFace(p) => serde_json::to_value(p),
            FeatureKind::DeleteFace(p) => serde_json::to_value(p),
            FeatureKind::ReplaceFace(p) => serde_json::to_value(p),
            FeatureKind::MirrorFace(p) => serde_json::to_value(p),
            FeatureKind::LinearPattern(p) => serde_json::to_value(p),
            FeatureKind::CircularPattern(p) => serde_json::to_value(p),
            FeatureKind::CurvePattern(p) => serde_json::to_value(p),
            FeatureKind::FillPattern(p) => serde_json::to_value(p),
        }
    }

    /// Rebuild a kind from its type tag and parameter value
    pub fn from_parameters(
        feature_type: FeatureType,
        parameters: serde_json::Value,
    ) -> serde_json::Result<Self> {
        use serde_json::from_value;

        match feature_type {
            FeatureType::Sketch => from_value(parameters).map(FeatureKind::Sketch),
            FeatureType::Extrude => from_value(parameters).map(FeatureKind::Extrude),
            FeatureType::Fillet => from_value(parameters).map(FeatureKind::Fillet),
            FeatureType::Chamfer => from_value(parameters).map(FeatureKind::Chamfer),
            FeatureType::OffsetFace => from_value(parameters).map(FeatureKind::OffsetFace),
            FeatureType::DeleteFace => from_value(parameters).map(FeatureKind::DeleteFace),
            FeatureType::ReplaceFace => from_value(parameters).map(FeatureKind::ReplaceFace),
            FeatureType::MirrorFace => from_value(parameters).map(FeatureKind::MirrorFace),
            FeatureType::LinearPattern => from_value(parameters).map(FeatureKind::LinearPattern),
            FeatureType::CircularPattern => {
                from_value(parameters).map(FeatureKind::CircularPattern)
            }
            FeatureType::CurvePattern => from_value(parameters).map(FeatureKind::CurvePattern),
            FeatureType::FillPattern => from_value(parameters).map(FeatureKind::FillPattern),
        }
    }
}

/// Descriptive metadata attached when a feature is added
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureMetadata {
    pub description: String,
    pub tags: Vec<String>,
}

impl FeatureMetadata {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// One parametric modeling step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Unique identifier
    pub id: FeatureId,
    /// Name shown in the feature tree
    pub name: String,
    /// Type and parameters
    pub kind: FeatureKind,
    /// Excluded from regeneration but kept in history
    #[serde(default)]
    pub suppressed: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Feature {
    /// Create a feature with a fresh ID
    pub fn new(name: impl Into<String>, kind: FeatureKind) -> Self {
        Self {
            id: FeatureId::generate(),
            name: name.into(),
            kind,
            suppressed: false,
            description: String::new(),
            tags: Vec::new(),
        }
    }

    /// Replace the generated ID
    pub fn with_id(mut self, id: impl Into<FeatureId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_metadata(mut self, metadata: FeatureMetadata) -> Self {
        self.description = metadata.description;
        self.tags = metadata.tags;
        self
    }

    pub fn suppressed(mut self, suppressed: bool) -> Self {
        self.suppressed = suppressed;
        self
    }

    pub fn feature_type(&self) -> FeatureType {
        self.kind.feature_type()
    }

    /// Create a sketch feature
    pub fn sketch(name: impl Into<String>, params: SketchParams) -> Self {
        Self::new(name, FeatureKind::Sketch(params))
    }

    /// Create an extrude feature
    pub fn extrude(name: impl Into<String>, distance: f32, direction: ExtrudeDirection) -> Self {
        Self::new(
            name,
            FeatureKind::Extrude(ExtrudeParams {
                distance,
                direction,
                draft_angle: 0.0,
            }),
        )
    }

    /// Create a fillet feature
    pub fn fillet(name: impl Into<String>, edges: Vec<EdgeIndex>, radius: f32) -> Self {
        Self::new(name, FeatureKind::Fillet(FilletParams { radius, edges }))
    }

    /// Create a chamfer feature
    pub fn chamfer(name: impl Into<String>, edges: Vec<EdgeIndex>, distance: f32) -> Self {
        Self::new(name, FeatureKind::Chamfer(ChamferParams { distance, edges }))
    }

    /// Create a linear pattern feature
    pub fn linear_pattern(
        name: impl Into<String>,
        direction: glam::Vec3,
        spacing: f32,
        count: u32,
    ) -> Self {
        Self::new(
            name,
            FeatureKind::LinearPattern(LinearPatternParams {
                direction,
                spacing,
                count,
            }),
        )
    }

    /// Create a circular pattern feature spanning a full turn
    pub fn circular_pattern(name: impl Into<String>, axis_direction: glam::Vec3, count: u32) -> Self {
        Self::new(
            name,
            FeatureKind::CircularPattern(CircularPatternParams {
                axis_origin: glam::Vec3::ZERO,
                axis_direction,
                count,
                total_angle: std::f32::consts::TAU,
            }),
        )
    }
}
