//! Lightweight placeholder kernel
//!
//! Validates parameters the way a real kernel would and answers with box
//! meshes sized from the parent bounds. Good enough for demos, the CLI and
//! tests; it does no solid modeling.

use glam::{Mat3, Mat4, Quat, Vec2, Vec3};

use super::{Artifact, GeometryKernel, KernelError, TessellatedMesh};
use crate::cancel::CancelToken;
use crate::feature::{
    ChamferParams, CircularPatternParams, CurvePatternParams, DeleteFaceParams, ExtrudeDirection,
    ExtrudeParams, FeatureKind, FillPatternParams, FilletParams, LinearPatternParams,
    MirrorFaceParams, OffsetFaceParams, ReplaceFaceParams, SketchParams,
};

/// Thickness given to flat sketch profiles so they still have a volume
const SKETCH_THICKNESS: f32 = 1e-3;

/// Upper bound on instances produced by one pattern
const MAX_PATTERN_INSTANCES: usize = 10_000;

/// Faces on a preview body (every body is a box)
const BOX_FACES: u32 = 6;

/// Edges on a preview body
const BOX_EDGES: u32 = 12;

#[derive(Debug, Default)]
pub struct PreviewKernel;

impl PreviewKernel {
    pub fn new() -> Self {
        Self
    }
}

impl GeometryKernel for PreviewKernel {
    fn name(&self) -> &str {
        "preview"
    }

    fn execute(
        &self,
        kind: &FeatureKind,
        parents: &[Artifact],
        cancel: &CancelToken,
    ) -> Result<Artifact, KernelError> {
        match kind {
            FeatureKind::Sketch(p) => sketch(p, parents),
            FeatureKind::Extrude(p) => extrude(p, parents),
            FeatureKind::Fillet(p) => fillet(p, parents),
            FeatureKind::Chamfer(p) => chamfer(p, parents),
            FeatureKind::OffsetFace(p) => offset_face(p, parents),
            FeatureKind::DeleteFace(p) => delete_face(p, parents),
            FeatureKind::ReplaceFace(p) => replace_face(p, parents),
            FeatureKind::MirrorFace(p) => mirror_face(p, parents),
            FeatureKind::LinearPattern(p) => linear_pattern(p, parents, cancel),
            FeatureKind::CircularPattern(p) => circular_pattern(p, parents, cancel),
            FeatureKind::CurvePattern(p) => curve_pattern(p, parents, cancel),
            FeatureKind::FillPattern(p) => fill_pattern(p, parents, cancel),
        }
    }
}

fn sketch(params: &SketchParams, parents: &[Artifact]) -> Result<Artifact, KernelError> {
    expect_parents("Sketch", parents, 0)?;
    let required = if params.closed { 3 } else { 2 };
    if params.points.len() < required {
        return Err(KernelError::new(format!(
            "sketch profile needs at least {required} points, got {}",
            params.points.len()
        )));
    }
    if !params.points.iter().all(|p| p.is_finite()) {
        return Err(KernelError::new("sketch profile has non-finite points"));
    }
    let normal = params.normal.try_normalize().ok_or_else(|| {
        KernelError::new("sketch plane normal must be non-zero")
    })?;

    let (lo, hi) = params
        .points
        .iter()
        .fold((Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)), |(lo, hi), p| {
            (lo.min(*p), hi.max(*p))
        });
    let flat = TessellatedMesh::cuboid(lo.extend(0.0), hi.extend(SKETCH_THICKNESS));
    let placement = Mat4::from_rotation_translation(
        Quat::from_rotation_arc(Vec3::Z, normal),
        params.origin,
    );
    Ok(Artifact::new(flat.transformed(placement)))
}

fn extrude(params: &ExtrudeParams, parents: &[Artifact]) -> Result<Artifact, KernelError> {
    let parent = single_parent("Extrude", parents)?;
    if !(params.distance.is_finite() && params.distance > 0.0) {
        return Err(KernelError::new(format!(
            "invalid extrude distance {}",
            params.distance
        )));
    }
    if params.draft_angle.abs() >= std::f32::consts::FRAC_PI_2 {
        return Err(KernelError::new("draft angle must be below 90 degrees"));
    }

    let (mut lo, mut hi) = bounds_of(parent)?;
    // The thinnest axis of the profile is the extrusion axis
    let extent = hi - lo;
    let axis = if extent.x <= extent.y && extent.x <= extent.z {
        0
    } else if extent.y <= extent.z {
        1
    } else {
        2
    };
    let (start, end) = match params.direction {
        ExtrudeDirection::Positive => (lo[axis], lo[axis] + params.distance),
        ExtrudeDirection::Negative => (hi[axis] - params.distance, hi[axis]),
        ExtrudeDirection::Symmetric => {
            let mid = (lo[axis] + hi[axis]) * 0.5;
            (mid - params.distance * 0.5, mid + params.distance * 0.5)
        }
    };
    lo[axis] = start;
    hi[axis] = end;
    Ok(Artifact::new(TessellatedMesh::cuboid(lo, hi)))
}

fn fillet(params: &FilletParams, parents: &[Artifact]) -> Result<Artifact, KernelError> {
    let parent = single_parent("Fillet", parents)?;
    if !(params.radius.is_finite() && params.radius > 0.0) {
        return Err(KernelError::new(format!(
            "invalid fillet radius {}",
            params.radius
        )));
    }
    check_indices("edge", &params.edges, BOX_EDGES)?;
    check_fits("fillet radius", params.radius, parent)?;
    Ok(Artifact::shared(parent.mesh.clone()))
}

fn chamfer(params: &ChamferParams, parents: &[Artifact]) -> Result<Artifact, KernelError> {
    let parent = single_parent("Chamfer", parents)?;
    if !(params.distance.is_finite() && params.distance > 0.0) {
        return Err(KernelError::new(format!(
            "invalid chamfer distance {}",
            params.distance
        )));
    }
    check_indices("edge", &params.edges, BOX_EDGES)?;
    check_fits("chamfer distance", params.distance, parent)?;
    Ok(Artifact::shared(parent.mesh.clone()))
}

fn offset_face(params: &OffsetFaceParams, parents: &[Artifact]) -> Result<Artifact, KernelError> {
    let parent = single_parent("Offset Face", parents)?;
    require_faces(&params.faces)?;
    if !params.distance.is_finite() {
        return Err(KernelError::new("offset distance must be finite"));
    }

    let (lo, hi) = bounds_of(parent)?;
    let grow = Vec3::splat(params.distance);
    let (lo, hi) = (lo - grow, hi + grow);
    if hi.cmple(lo).any() {
        return Err(KernelError::new(format!(
            "offset {} collapses the body",
            params.distance
        )));
    }
    Ok(Artifact::new(TessellatedMesh::cuboid(lo, hi)))
}

fn delete_face(params: &DeleteFaceParams, parents: &[Artifact]) -> Result<Artifact, KernelError> {
    let parent = single_parent("Delete Face", parents)?;
    require_faces(&params.faces)?;
    if !params.heal && params.faces.len() as u32 >= BOX_FACES {
        return Err(KernelError::new("cannot delete every face without healing"));
    }
    Ok(Artifact::shared(parent.mesh.clone()))
}

fn replace_face(
    params: &ReplaceFaceParams,
    parents: &[Artifact],
) -> Result<Artifact, KernelError> {
    expect_parents("Replace Face", parents, 2)?;
    require_faces(&params.faces)?;

    let (lo, hi) = bounds_of(&parents[0])?;
    let (tool_lo, tool_hi) = bounds_of(&parents[1])?;
    let offset = Vec3::splat(params.offset);
    Ok(Artifact::new(TessellatedMesh::cuboid(
        lo.min(tool_lo - offset),
        hi.max(tool_hi + offset),
    )))
}

fn mirror_face(params: &MirrorFaceParams, parents: &[Artifact]) -> Result<Artifact, KernelError> {
    let parent = single_parent("Mirror Face", parents)?;
    check_indices("face", &params.faces, BOX_FACES)?;
    let normal = params
        .plane_normal
        .try_normalize()
        .ok_or_else(|| KernelError::new("mirror plane normal must be non-zero"))?;

    let reflect = Mat3::from_cols(
        Vec3::X - 2.0 * normal.x * normal,
        Vec3::Y - 2.0 * normal.y * normal,
        Vec3::Z - 2.0 * normal.z * normal,
    );
    let transform = Mat4::from_translation(params.plane_origin)
        * Mat4::from_mat3(reflect)
        * Mat4::from_translation(-params.plane_origin);

    let mut mirrored = parent.mesh.transformed(transform);
    // Reflection flips handedness; restore counter-clockwise winding
    for tri in mirrored.indices.chunks_exact_mut(3) {
        tri.swap(1, 2);
    }

    let mut mesh = (*parent.mesh).clone();
    mesh.append(&mirrored);
    Ok(Artifact::new(mesh))
}

fn linear_pattern(
    params: &LinearPatternParams,
    parents: &[Artifact],
    cancel: &CancelToken,
) -> Result<Artifact, KernelError> {
    let parent = single_parent("Linear Pattern", parents)?;
    check_count(params.count)?;
    let direction = params
        .direction
        .try_normalize()
        .ok_or_else(|| KernelError::new("pattern direction must be non-zero"))?;
    if !params.spacing.is_finite() {
        return Err(KernelError::new("pattern spacing must be finite"));
    }

    let offsets = (0..params.count).map(|i| direction * params.spacing * i as f32);
    instantiate(parent, offsets.map(Mat4::from_translation), cancel)
}

fn circular_pattern(
    params: &CircularPatternParams,
    parents: &[Artifact],
    cancel: &CancelToken,
) -> Result<Artifact, KernelError> {
    let parent = single_parent("Circular Pattern", parents)?;
    check_count(params.count)?;
    let axis = params
        .axis_direction
        .try_normalize()
        .ok_or_else(|| KernelError::new("pattern axis must be non-zero"))?;

    // A full turn places the last instance one step short of the first
    let full_turn = (params.total_angle.abs() - std::f32::consts::TAU).abs() < 1e-4;
    let steps = if full_turn || params.count == 1 {
        params.count
    } else {
        params.count - 1
    };
    let step = params.total_angle / steps as f32;

    let origin = params.axis_origin;
    let transforms = (0..params.count).map(move |i| {
        Mat4::from_translation(origin)
            * Mat4::from_quat(Quat::from_axis_angle(axis, step * i as f32))
            * Mat4::from_translation(-origin)
    });
    instantiate(parent, transforms, cancel)
}

fn curve_pattern(
    params: &CurvePatternParams,
    parents: &[Artifact],
    cancel: &CancelToken,
) -> Result<Artifact, KernelError> {
    let parent = single_parent("Curve Pattern", parents)?;
    check_count(params.count)?;
    if params.path.len() < 2 {
        return Err(KernelError::new("curve pattern path needs at least 2 points"));
    }

    let lengths: Vec<f32> = params
        .path
        .windows(2)
        .map(|w| w[0].distance(w[1]))
        .collect();
    let total: f32 = lengths.iter().sum();
    if total <= f32::EPSILON {
        return Err(KernelError::new("curve pattern path has zero length"));
    }

    let start = params.path[0];
    let intervals = params.count.saturating_sub(1).max(1) as f32;
    let offsets: Vec<Vec3> = (0..params.count)
        .map(|i| point_along(&params.path, &lengths, total * i as f32 / intervals) - start)
        .collect();
    instantiate(
        parent,
        offsets.into_iter().map(Mat4::from_translation),
        cancel,
    )
}

fn fill_pattern(
    params: &FillPatternParams,
    parents: &[Artifact],
    cancel: &CancelToken,
) -> Result<Artifact, KernelError> {
    let parent = single_parent("Fill Pattern", parents)?;
    if params.boundary.len() < 3 {
        return Err(KernelError::new("fill boundary needs at least 3 points"));
    }
    if !(params.spacing.is_finite() && params.spacing > 0.0) {
        return Err(KernelError::new(format!(
            "invalid fill spacing {}",
            params.spacing
        )));
    }

    let (lo, hi) = params
        .boundary
        .iter()
        .fold((Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)), |(lo, hi), p| {
            (lo.min(*p), hi.max(*p))
        });
    // One instance per grid cell centre
    let rows = ((hi.y - lo.y) / params.spacing).ceil().max(1.0) as usize;
    let cols = ((hi.x - lo.x) / params.spacing).ceil().max(1.0) as usize;
    if rows.saturating_mul(cols) > MAX_PATTERN_INSTANCES {
        return Err(KernelError::new("fill pattern is too dense"));
    }

    let anchor = lo + Vec2::splat(params.spacing * 0.5);
    let mut offsets = Vec::new();
    for row in 0..rows {
        if cancel.is_cancelled() {
            return Err(KernelError::cancelled());
        }
        let shift = if params.stagger && row % 2 == 1 {
            params.spacing * 0.5
        } else {
            0.0
        };
        for col in 0..cols {
            let p = anchor + Vec2::new(shift + params.spacing * col as f32, params.spacing * row as f32);
            if contains_point(&params.boundary, p) {
                offsets.push((p - anchor).extend(0.0));
            }
        }
    }
    if offsets.is_empty() {
        return Err(KernelError::new("fill boundary contains no instances"));
    }
    instantiate(
        parent,
        offsets.into_iter().map(Mat4::from_translation),
        cancel,
    )
}

/// Copy the parent mesh once per transform
fn instantiate(
    parent: &Artifact,
    transforms: impl Iterator<Item = Mat4>,
    cancel: &CancelToken,
) -> Result<Artifact, KernelError> {
    let mut mesh = TessellatedMesh::new();
    for transform in transforms {
        if cancel.is_cancelled() {
            return Err(KernelError::cancelled());
        }
        mesh.append(&parent.mesh.transformed(transform));
    }
    Ok(Artifact::new(mesh))
}

fn expect_parents(feature: &str, parents: &[Artifact], count: usize) -> Result<(), KernelError> {
    if parents.len() == count {
        Ok(())
    } else {
        Err(KernelError::new(format!(
            "{feature} expects {count} parent(s), got {}",
            parents.len()
        )))
    }
}

fn single_parent<'a>(feature: &str, parents: &'a [Artifact]) -> Result<&'a Artifact, KernelError> {
    expect_parents(feature, parents, 1)?;
    Ok(&parents[0])
}

fn bounds_of(artifact: &Artifact) -> Result<(Vec3, Vec3), KernelError> {
    artifact
        .mesh
        .bounds()
        .ok_or_else(|| KernelError::new("parent body is empty"))
}

fn check_fits(what: &str, size: f32, parent: &Artifact) -> Result<(), KernelError> {
    let (lo, hi) = bounds_of(parent)?;
    let thinnest = (hi - lo).min_element();
    if size * 2.0 > thinnest {
        return Err(KernelError::new(format!(
            "{what} {size} is too large for a body {thinnest} thick"
        )));
    }
    Ok(())
}

fn check_indices(what: &str, indices: &[u32], available: u32) -> Result<(), KernelError> {
    match indices.iter().find(|i| **i >= available) {
        Some(bad) => Err(KernelError::new(format!("{what} {bad} does not exist"))),
        None => Ok(()),
    }
}

fn require_faces(faces: &[u32]) -> Result<(), KernelError> {
    if faces.is_empty() {
        return Err(KernelError::new("no faces selected"));
    }
    check_indices("face", faces, BOX_FACES)
}

fn check_count(count: u32) -> Result<(), KernelError> {
    if count == 0 {
        return Err(KernelError::new("pattern count must be at least 1"));
    }
    if count as usize > MAX_PATTERN_INSTANCES {
        return Err(KernelError::new(format!("pattern count {count} is too large")));
    }
    Ok(())
}

fn point_along(path: &[Vec3], lengths: &[f32], distance: f32) -> Vec3 {
    let mut remaining = distance;
    for (segment, length) in path.windows(2).zip(lengths) {
        if remaining <= *length {
            if *length <= f32::EPSILON {
                return segment[0];
            }
            return segment[0].lerp(segment[1], remaining / length);
        }
        remaining -= length;
    }
    path[path.len() - 1]
}

/// Even-odd point in polygon test
fn contains_point(polygon: &[Vec2], p: Vec2) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn run(kind: FeatureKind, parents: &[Artifact]) -> Result<Artifact, KernelError> {
        PreviewKernel::new().execute(&kind, parents, &CancelToken::never())
    }

    fn unit_box() -> Artifact {
        Artifact::new(TessellatedMesh::cuboid(Vec3::ZERO, Vec3::splat(10.0)))
    }

    #[test]
    fn test_sketch_then_extrude() {
        let profile = run(FeatureKind::Sketch(SketchParams::rectangle(4.0, 2.0)), &[]).unwrap();
        let (lo, hi) = profile.mesh.bounds().unwrap();
        assert_relative_eq!(hi.x - lo.x, 4.0, epsilon = 1e-5);
        assert_relative_eq!(hi.y - lo.y, 2.0, epsilon = 1e-5);

        let solid = run(
            FeatureKind::Extrude(ExtrudeParams {
                distance: 5.0,
                direction: ExtrudeDirection::Positive,
                draft_angle: 0.0,
            }),
            &[profile],
        )
        .unwrap();
        let (lo, hi) = solid.mesh.bounds().unwrap();
        assert_relative_eq!(hi.z - lo.z, 5.0, epsilon = 1e-5);
        assert_relative_eq!(hi.x - lo.x, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_sketch_on_tilted_plane() {
        let mut params = SketchParams::rectangle(2.0, 2.0);
        params.normal = Vec3::X;
        params.origin = Vec3::new(5.0, 0.0, 0.0);
        let profile = run(FeatureKind::Sketch(params), &[]).unwrap();
        let (lo, hi) = profile.mesh.bounds().unwrap();
        assert_relative_eq!(lo.x, 5.0, epsilon = 1e-4);
        assert!(hi.x - lo.x < 0.01);
    }

    #[test]
    fn test_invalid_fillet_radius() {
        let err = run(
            FeatureKind::Fillet(FilletParams {
                radius: -1.0,
                edges: vec![0],
            }),
            &[unit_box()],
        )
        .unwrap_err();
        assert_eq!(err.message, "invalid fillet radius -1");

        let err = run(
            FeatureKind::Fillet(FilletParams {
                radius: 6.0,
                edges: vec![],
            }),
            &[unit_box()],
        )
        .unwrap_err();
        assert!(err.message.contains("too large"));
    }

    #[test]
    fn test_parent_count_is_checked() {
        let err = run(
            FeatureKind::Chamfer(ChamferParams {
                distance: 1.0,
                edges: vec![],
            }),
            &[],
        )
        .unwrap_err();
        assert_eq!(err.message, "Chamfer expects 1 parent(s), got 0");
    }

    #[test]
    fn test_linear_pattern_copies() {
        let out = run(
            FeatureKind::LinearPattern(LinearPatternParams {
                direction: Vec3::X,
                spacing: 20.0,
                count: 3,
            }),
            &[unit_box()],
        )
        .unwrap();
        assert_eq!(out.mesh.triangle_count(), 36);
        let (_, hi) = out.mesh.bounds().unwrap();
        assert_relative_eq!(hi.x, 50.0, epsilon = 1e-4);
    }

    #[test]
    fn test_circular_pattern_half_turn() {
        let body = Artifact::new(TessellatedMesh::cuboid(
            Vec3::new(10.0, -1.0, -1.0),
            Vec3::new(12.0, 1.0, 1.0),
        ));
        let out = run(
            FeatureKind::CircularPattern(CircularPatternParams {
                axis_origin: Vec3::ZERO,
                axis_direction: Vec3::Z,
                count: 2,
                total_angle: std::f32::consts::PI,
            }),
            &[body],
        )
        .unwrap();
        let (lo, hi) = out.mesh.bounds().unwrap();
        assert_relative_eq!(lo.x, -12.0, epsilon = 1e-3);
        assert_relative_eq!(hi.x, 12.0, epsilon = 1e-3);
    }

    #[test]
    fn test_mirror_doubles_body() {
        let out = run(
            FeatureKind::MirrorFace(MirrorFaceParams {
                faces: vec![],
                plane_origin: Vec3::ZERO,
                plane_normal: Vec3::X,
            }),
            &[unit_box()],
        )
        .unwrap();
        let (lo, hi) = out.mesh.bounds().unwrap();
        assert_relative_eq!(lo.x, -10.0, epsilon = 1e-4);
        assert_relative_eq!(hi.x, 10.0, epsilon = 1e-4);
        assert_eq!(out.mesh.triangle_count(), 24);
    }

    #[test]
    fn test_fill_pattern_inside_boundary() {
        let out = run(
            FeatureKind::FillPattern(FillPatternParams {
                boundary: vec![
                    Vec2::new(0.0, 0.0),
                    Vec2::new(30.0, 0.0),
                    Vec2::new(30.0, 20.0),
                    Vec2::new(0.0, 20.0),
                ],
                spacing: 10.0,
                stagger: false,
            }),
            &[unit_box()],
        )
        .unwrap();
        // 3 columns x 2 rows of cell centres
        assert_eq!(out.mesh.triangle_count(), 6 * 12);
        let (lo, hi) = out.mesh.bounds().unwrap();
        assert_relative_eq!(lo.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(hi.x, 30.0, epsilon = 1e-4);
    }

    #[test]
    fn test_curve_pattern_ends_on_path() {
        let out = run(
            FeatureKind::CurvePattern(CurvePatternParams {
                path: vec![Vec3::ZERO, Vec3::new(30.0, 0.0, 0.0), Vec3::new(30.0, 30.0, 0.0)],
                count: 3,
            }),
            &[unit_box()],
        )
        .unwrap();
        let (_, hi) = out.mesh.bounds().unwrap();
        assert_relative_eq!(hi.x, 40.0, epsilon = 1e-4);
        assert_relative_eq!(hi.y, 40.0, epsilon = 1e-4);
    }

    #[test]
    fn test_pattern_observes_cancel() {
        let token = CancelToken::never();
        token.abandon();
        let err = PreviewKernel::new()
            .execute(
                &FeatureKind::LinearPattern(LinearPatternParams {
                    direction: Vec3::X,
                    spacing: 1.0,
                    count: 2,
                }),
                &[unit_box()],
                &token,
            )
            .unwrap_err();
        assert_eq!(err, KernelError::cancelled());
    }

    #[test]
    fn test_offset_cannot_collapse() {
        let err = run(
            FeatureKind::OffsetFace(OffsetFaceParams {
                faces: vec![0],
                distance: -6.0,
            }),
            &[unit_box()],
        )
        .unwrap_err();
        assert!(err.message.contains("collapses"));
    }
}
