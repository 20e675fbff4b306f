//! Parameter records, one per feature type

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Index of an edge on the parent body
pub type EdgeIndex = u32;

/// Index of a face on the parent body
pub type FaceIndex = u32;

/// 2D profile drawn on a plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SketchParams {
    /// Origin of the sketch plane in 3D
    pub origin: Vec3,
    /// Normal of the sketch plane
    pub normal: Vec3,
    /// Profile points in plane coordinates
    pub points: Vec<Vec2>,
    /// Whether the profile is a closed loop
    #[serde(default = "default_closed")]
    pub closed: bool,
}

fn default_closed() -> bool {
    true
}

impl SketchParams {
    /// Closed profile from points on the XY plane
    pub fn new(points: Vec<Vec2>) -> Self {
        Self {
            origin: Vec3::ZERO,
            normal: Vec3::Z,
            points,
            closed: true,
        }
    }

    /// Centered rectangle on the XY plane
    pub fn rectangle(width: f32, height: f32) -> Self {
        let hw = width / 2.0;
        let hh = height / 2.0;
        Self::new(vec![
            Vec2::new(-hw, -hh),
            Vec2::new(hw, -hh),
            Vec2::new(hw, hh),
            Vec2::new(-hw, hh),
        ])
    }
}

/// Direction for extrusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtrudeDirection {
    /// Extrude along the sketch normal
    #[default]
    Positive,
    /// Extrude against the sketch normal
    Negative,
    /// Extrude half the distance each way
    Symmetric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtrudeParams {
    /// Extrusion distance
    pub distance: f32,
    #[serde(default)]
    pub direction: ExtrudeDirection,
    /// Draft angle in radians (0 = no draft)
    #[serde(default)]
    pub draft_angle: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilletParams {
    pub radius: f32,
    /// Edges to round; empty means every edge
    #[serde(default)]
    pub edges: Vec<EdgeIndex>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChamferParams {
    pub distance: f32,
    /// Edges to bevel; empty means every edge
    #[serde(default)]
    pub edges: Vec<EdgeIndex>,
}

/// Push or pull faces along their normals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetFaceParams {
    pub faces: Vec<FaceIndex>,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteFaceParams {
    pub faces: Vec<FaceIndex>,
    /// Grow neighbouring faces to close the gap
    #[serde(default = "default_heal")]
    pub heal: bool,
}

fn default_heal() -> bool {
    true
}

/// Replace faces of the first parent with the surface of the second parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceFaceParams {
    pub faces: Vec<FaceIndex>,
    #[serde(default)]
    pub offset: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorFaceParams {
    /// Faces to mirror; empty mirrors the whole body
    #[serde(default)]
    pub faces: Vec<FaceIndex>,
    pub plane_origin: Vec3,
    pub plane_normal: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPatternParams {
    pub direction: Vec3,
    pub spacing: f32,
    /// Total number of instances, including the original
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircularPatternParams {
    pub axis_origin: Vec3,
    pub axis_direction: Vec3,
    /// Total number of instances, including the original
    pub count: u32,
    /// Angle spanned by the pattern in radians
    #[serde(default = "default_total_angle")]
    pub total_angle: f32,
}

fn default_total_angle() -> f32 {
    std::f32::consts::TAU
}

/// Instances placed along a polyline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePatternParams {
    pub path: Vec<Vec3>,
    pub count: u32,
}

/// Instances filling a planar region on a grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillPatternParams {
    pub boundary: Vec<Vec2>,
    pub spacing: f32,
    /// Offset every other row by half the spacing
    #[serde(default)]
    pub stagger: bool,
}
