//! Tessellated meshes carried by artifacts

use glam::{Mat4, Vec3};

/// A tessellated mesh output from the geometry kernel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TessellatedMesh {
    /// Vertex positions
    pub vertices: Vec<[f32; 3]>,
    /// Vertex normals (one per vertex)
    pub normals: Vec<[f32; 3]>,
    /// Triangle indices (3 per triangle)
    pub indices: Vec<u32>,
}

impl TessellatedMesh {
    /// Create an empty tessellated mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Axis-aligned box spanning `min`..`max`
    ///
    /// 24 vertices (4 per face) so each face keeps a flat normal.
    pub fn cuboid(min: Vec3, max: Vec3) -> Self {
        let (lo, hi) = (min.min(max), min.max(max));
        let mut mesh = Self {
            vertices: Vec::with_capacity(24),
            normals: Vec::with_capacity(24),
            indices: Vec::with_capacity(36),
        };

        let mut add_face = |corners: [[f32; 3]; 4], normal: [f32; 3]| {
            let base = mesh.vertices.len() as u32;
            for corner in corners {
                mesh.vertices.push(corner);
                mesh.normals.push(normal);
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        };

        // +X / -X
        add_face(
            [
                [hi.x, lo.y, lo.z],
                [hi.x, hi.y, lo.z],
                [hi.x, hi.y, hi.z],
                [hi.x, lo.y, hi.z],
            ],
            [1.0, 0.0, 0.0],
        );
        add_face(
            [
                [lo.x, hi.y, lo.z],
                [lo.x, lo.y, lo.z],
                [lo.x, lo.y, hi.z],
                [lo.x, hi.y, hi.z],
            ],
            [-1.0, 0.0, 0.0],
        );
        // +Y / -Y
        add_face(
            [
                [hi.x, hi.y, lo.z],
                [lo.x, hi.y, lo.z],
                [lo.x, hi.y, hi.z],
                [hi.x, hi.y, hi.z],
            ],
            [0.0, 1.0, 0.0],
        );
        add_face(
            [
                [lo.x, lo.y, lo.z],
                [hi.x, lo.y, lo.z],
                [hi.x, lo.y, hi.z],
                [lo.x, lo.y, hi.z],
            ],
            [0.0, -1.0, 0.0],
        );
        // +Z (top) / -Z (bottom)
        add_face(
            [
                [lo.x, lo.y, hi.z],
                [hi.x, lo.y, hi.z],
                [hi.x, hi.y, hi.z],
                [lo.x, hi.y, hi.z],
            ],
            [0.0, 0.0, 1.0],
        );
        add_face(
            [
                [lo.x, hi.y, lo.z],
                [hi.x, hi.y, lo.z],
                [hi.x, lo.y, lo.z],
                [lo.x, lo.y, lo.z],
            ],
            [0.0, 0.0, -1.0],
        );

        mesh
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Axis-aligned bounds, `None` for an empty mesh
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut iter = self.vertices.iter().map(|v| Vec3::from(*v));
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Copy of this mesh with every vertex and normal transformed
    pub fn transformed(&self, transform: Mat4) -> Self {
        Self {
            vertices: self
                .vertices
                .iter()
                .map(|v| transform.transform_point3(Vec3::from(*v)).to_array())
                .collect(),
            normals: self
                .normals
                .iter()
                .map(|n| {
                    transform
                        .transform_vector3(Vec3::from(*n))
                        .normalize_or_zero()
                        .to_array()
                })
                .collect(),
            indices: self.indices.clone(),
        }
    }

    /// Append another mesh, re-basing its indices
    pub fn append(&mut self, other: &TessellatedMesh) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.normals.extend_from_slice(&other.normals);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cuboid_mesh() {
        let mesh = TessellatedMesh::cuboid(Vec3::ZERO, Vec3::ONE);
        assert_eq!(mesh.vertices.len(), 24); // 6 faces * 4 vertices
        assert_eq!(mesh.normals.len(), 24);
        assert_eq!(mesh.triangle_count(), 12);
    }

    #[test]
    fn test_cuboid_bounds() {
        let mesh = TessellatedMesh::cuboid(Vec3::new(2.0, 4.0, 6.0), Vec3::new(-2.0, 0.0, 1.0));
        let (lo, hi) = mesh.bounds().unwrap();
        assert_relative_eq!(lo.x, -2.0);
        assert_relative_eq!(hi.y, 4.0);
        assert_relative_eq!(hi.z - lo.z, 5.0);
    }

    #[test]
    fn test_append_rebases_indices() {
        let mut mesh = TessellatedMesh::cuboid(Vec3::ZERO, Vec3::ONE);
        let moved = mesh.transformed(Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0)));
        mesh.append(&moved);
        assert_eq!(mesh.triangle_count(), 24);
        assert_eq!(*mesh.indices.iter().max().unwrap(), 47);
        let (lo, hi) = mesh.bounds().unwrap();
        assert_relative_eq!(lo.x, 0.0);
        assert_relative_eq!(hi.x, 4.0);
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        assert!(TessellatedMesh::new().bounds().is_none());
    }
}
