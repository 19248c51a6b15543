//! Flat mesh buffers produced by the geometry builder.
//!
//! This module provides:
//! - [`SurfaceRole`] - Material role of a triangle range (body, side, profile face)
//! - [`MaterialGroup`] - Contiguous index range bound to one role
//! - [`MeshBuffers`] - Positions, UVs, indices and groups ready for upload

use serde::{Deserialize, Serialize};

use crate::math::{Aabb, Vec3};

/// Surface role of a triangle. The discriminant is the material index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SurfaceRole {
    /// Top and bottom faces.
    Body = 0,
    /// Plain square-cut sides and drip grooves.
    Side = 1,
    /// Processed sides and corner joints.
    Profile = 2,
}

impl SurfaceRole {
    /// Emission order of the groups.
    pub const ALL: [SurfaceRole; 3] = [SurfaceRole::Body, SurfaceRole::Side, SurfaceRole::Profile];

    pub fn material_index(self) -> u32 {
        self as u32
    }

    pub fn from_material_index(index: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.material_index() == index)
    }
}

/// A contiguous range of the index buffer drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialGroup {
    /// First index (not triangle) of the range.
    pub start: u32,
    /// Number of indices in the range.
    pub count: u32,
    pub material_index: u32,
}

impl MaterialGroup {
    pub fn role(&self) -> Option<SurfaceRole> {
        SurfaceRole::from_material_index(self.material_index)
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start as usize..(self.start + self.count) as usize
    }
}

/// Structural problems found by [`MeshBuffers::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("position buffer length {0} is not a multiple of 3")]
    PositionLength(usize),
    #[error("uv buffer holds {uvs} entries for {vertices} vertices")]
    UvLength { uvs: usize, vertices: usize },
    #[error("index buffer length {0} is not a multiple of 3")]
    IndexLength(usize),
    #[error("index {index} at position {at} is out of range for {vertices} vertices")]
    IndexOutOfRange { at: usize, index: u32, vertices: usize },
    #[error("material group {group} does not start where the previous one ended")]
    GroupGap { group: usize },
    #[error("material groups cover {covered} of {total} indices")]
    GroupCoverage { covered: usize, total: usize },
}

/// Output of the geometry builder.
///
/// Serialized with the field names the preview front end consumes
/// (`positions`, `uvs`, `indices`, `groups[{start, count, materialIndex}]`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshBuffers {
    /// `[x, y, z]` per vertex.
    pub positions: Vec<f32>,
    /// `[u, v]` per vertex.
    pub uvs: Vec<f32>,
    /// Three indices per triangle.
    pub indices: Vec<u32>,
    pub groups: Vec<MaterialGroup>,
}

impl MeshBuffers {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Position of vertex `i`.
    pub fn position(&self, i: u32) -> Vec3 {
        let base = i as usize * 3;
        Vec3::new(
            self.positions[base],
            self.positions[base + 1],
            self.positions[base + 2],
        )
    }

    /// UV of vertex `i`.
    pub fn uv(&self, i: u32) -> [f32; 2] {
        let base = i as usize * 2;
        [self.uvs[base], self.uvs[base + 1]]
    }

    /// All triangles in index-buffer order.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Triangles of one material group.
    pub fn group_triangles(&self, group: &MaterialGroup) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices[group.range()]
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
    }

    /// Group emitted for `role`, if that role produced any triangle.
    pub fn group_for(&self, role: SurfaceRole) -> Option<&MaterialGroup> {
        self.groups
            .iter()
            .find(|g| g.material_index == role.material_index())
    }

    pub fn bounds(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for i in 0..self.vertex_count() as u32 {
            aabb.expand(self.position(i));
        }
        aabb
    }

    /// Raw position bytes for GPU upload.
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Raw UV bytes for GPU upload.
    pub fn uv_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.uvs)
    }

    /// Raw u32 index bytes for GPU upload.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Approximate heap footprint in bytes.
    pub fn byte_size(&self) -> usize {
        self.position_bytes().len()
            + self.uv_bytes().len()
            + self.index_bytes().len()
            + self.groups.len() * std::mem::size_of::<MaterialGroup>()
    }

    /// Check buffer lengths, index ranges and group layout.
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.positions.len() % 3 != 0 {
            return Err(MeshError::PositionLength(self.positions.len()));
        }
        let vertices = self.vertex_count();
        if self.uvs.len() != vertices * 2 {
            return Err(MeshError::UvLength {
                uvs: self.uvs.len(),
                vertices,
            });
        }
        if self.indices.len() % 3 != 0 {
            return Err(MeshError::IndexLength(self.indices.len()));
        }
        if let Some((at, &index)) = self
            .indices
            .iter()
            .enumerate()
            .find(|(_, i)| **i as usize >= vertices)
        {
            return Err(MeshError::IndexOutOfRange {
                at,
                index,
                vertices,
            });
        }

        let mut cursor = 0u32;
        for (group, g) in self.groups.iter().enumerate() {
            if g.start != cursor {
                return Err(MeshError::GroupGap { group });
            }
            cursor += g.count;
        }
        if cursor as usize != self.indices.len() {
            return Err(MeshError::GroupCoverage {
                covered: cursor as usize,
                total: self.indices.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshBuffers {
        MeshBuffers {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
            uvs: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            indices: vec![0, 1, 2],
            groups: vec![MaterialGroup {
                start: 0,
                count: 3,
                material_index: 1,
            }],
        }
    }

    #[test]
    fn counts() {
        let mesh = triangle();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.index_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.position_bytes().len(), 36);
        assert_eq!(mesh.index_bytes().len(), 12);
    }

    #[test]
    fn group_lookup() {
        let mesh = triangle();
        assert!(mesh.group_for(SurfaceRole::Body).is_none());
        let side = mesh.group_for(SurfaceRole::Side).unwrap();
        assert_eq!(side.role(), Some(SurfaceRole::Side));
        assert_eq!(mesh.group_triangles(side).count(), 1);
    }

    #[test]
    fn validate_ok() {
        assert_eq!(triangle().validate(), Ok(()));
    }

    #[test]
    fn validate_index_out_of_range() {
        let mut mesh = triangle();
        mesh.indices[2] = 7;
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::IndexOutOfRange { index: 7, .. })
        ));
    }

    #[test]
    fn validate_group_coverage() {
        let mut mesh = triangle();
        mesh.groups.clear();
        assert_eq!(
            mesh.validate(),
            Err(MeshError::GroupCoverage {
                covered: 0,
                total: 3
            })
        );
    }

    #[test]
    fn serializes_with_camel_case_groups() {
        let json = serde_json::to_string(&triangle()).unwrap();
        assert!(json.contains("\"materialIndex\":1"));
    }

    #[test]
    fn error_display() {
        let err = MeshError::IndexLength(4);
        assert_eq!(err.to_string(), "index buffer length 4 is not a multiple of 3");
    }

    #[test]
    fn bounds_of_triangle() {
        let b = triangle().bounds();
        assert_eq!(b.min, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 0.0, 1.0));
    }
}
