//! Procedural slab geometry.
//!
//! [`build_slab`] turns [`SlabParams`] into [`MeshBuffers`]:
//!
//! 1. one [`ProfilePath`] per edge,
//! 2. two pillars per corner (one per adjoining edge), welded on a 1 µm grid,
//! 3. bottom and top caps,
//! 4. one strip per side and one per corner, stitched with clamped indices,
//! 5. drip grooves under the flagged edges,
//! 6. planar UVs over the footprint.
//!
//! The builder is total for valid dimensions and fully deterministic.

use std::collections::HashMap;

use crate::math::{DVec2, DVec3, weld_key, weld_tolerance};
use crate::slab::{Corner, Dimensions, Edge, GrooveSpec, ProfilePath, SlabParams};

use super::buffers::{MaterialGroup, MeshBuffers, SurfaceRole};

/// Build the preview mesh of one slab.
pub fn build_slab(params: &SlabParams) -> MeshBuffers {
    let dims = params.dimensions;
    let paths: [ProfilePath; 4] = Edge::ALL.map(|edge| params.edge_path(edge));

    let mut builder = SlabBuilder::new(dims);

    // Pillars, in perimeter order: start then end corner of every edge.
    let pillars: [[Vec<u32>; 2]; 4] = Edge::ALL.map(|edge| {
        [edge.start(), edge.end()].map(|corner| builder.pillar(&paths, edge, corner))
    });
    let pillar = |edge: Edge, corner: Corner| -> &[u32] {
        let side = usize::from(corner != edge.start());
        &pillars[edge as usize][side]
    };

    // Caps. Each corner contributes its incoming then outgoing pillar end.
    let mut bottom = Vec::with_capacity(8);
    let mut top = Vec::with_capacity(8);
    for corner in Corner::ALL {
        for edge in [corner.incoming(), corner.outgoing()] {
            let p = pillar(edge, corner);
            bottom.push(p[0]);
            top.push(p[p.len() - 1]);
        }
    }
    bottom.reverse();
    builder.polygon(SurfaceRole::Body, &bottom);
    builder.polygon(SurfaceRole::Body, &top);

    for edge in Edge::ALL {
        let role = if params.processed_edges.contains(edge) {
            SurfaceRole::Profile
        } else {
            SurfaceRole::Side
        };
        builder.stitch(
            role,
            pillar(edge, edge.start()),
            pillar(edge, edge.end()),
        );
    }

    for corner in Corner::ALL {
        builder.stitch(
            SurfaceRole::Profile,
            pillar(corner.incoming(), corner),
            pillar(corner.outgoing(), corner),
        );
    }

    for edge in params.drip_edges.iter() {
        if params.groove.fits(&dims) {
            builder.groove(edge, &params.groove);
        } else {
            log::warn!(
                "Drip groove on {} edge does not fit a {:.3} x {:.3} slab, skipped",
                edge.name(),
                dims.length,
                dims.width
            );
        }
    }

    builder.finish()
}

/// Accumulates welded vertices and per-role triangle lists.
struct SlabBuilder {
    dims: Dimensions,
    tolerance: f64,
    positions: Vec<DVec3>,
    lookup: HashMap<[i64; 3], u32>,
    triangles: [Vec<u32>; 3],
    dropped: usize,
}

impl SlabBuilder {
    fn new(dims: Dimensions) -> Self {
        Self {
            dims,
            tolerance: weld_tolerance(dims.length.min(dims.width).min(dims.height)),
            positions: Vec::new(),
            lookup: HashMap::new(),
            triangles: Default::default(),
            dropped: 0,
        }
    }

    /// Index of the vertex at `p`, merging with any earlier vertex on the same weld cell.
    fn vertex(&mut self, p: DVec3) -> u32 {
        let key = weld_key(&p, self.tolerance);
        if let Some(&index) = self.lookup.get(&key) {
            return index;
        }
        let index = self.raw_vertex(p);
        self.lookup.insert(key, index);
        index
    }

    /// Push a vertex that never welds.
    fn raw_vertex(&mut self, p: DVec3) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(p);
        index
    }

    /// Vertices of `edge`'s path extruded at `corner`.
    ///
    /// The adjoining edge's silhouette is sampled at the same height so that
    /// both pillars of a corner meet along the mitre line and share their
    /// bottom and top vertices.
    fn pillar(&mut self, paths: &[ProfilePath; 4], edge: Edge, corner: Corner) -> Vec<u32> {
        let adjacent = if corner.incoming() == edge {
            corner.outgoing()
        } else {
            corner.incoming()
        };
        let own = &paths[edge as usize];
        let other = &paths[adjacent as usize];
        let base = corner.position(&self.dims);

        own.points()
            .iter()
            .map(|p| {
                let xz: DVec2 =
                    base + edge.normal() * p.x + adjacent.normal() * other.offset_at(p.y);
                self.vertex(DVec3::new(xz.x, p.y, xz.y))
            })
            .collect()
    }

    /// Emit one triangle, dropping it if any two indices repeat.
    fn triangle(&mut self, role: SurfaceRole, a: u32, b: u32, c: u32) {
        if a == b || b == c || a == c {
            self.dropped += 1;
            return;
        }
        self.triangles[role as usize].extend_from_slice(&[a, b, c]);
    }

    fn quad(&mut self, role: SurfaceRole, a: u32, b: u32, c: u32, d: u32) {
        self.triangle(role, a, b, c);
        self.triangle(role, a, c, d);
    }

    /// Connect two vertex sequences into a strip.
    ///
    /// Unequal lengths are tolerated by clamping to the last index of the
    /// shorter sequence, which turns the tail of the strip into a fan.
    fn stitch(&mut self, role: SurfaceRole, a: &[u32], b: &[u32]) {
        let steps = a.len().max(b.len()).saturating_sub(1);
        let at = |s: &[u32], i: usize| s[i.min(s.len() - 1)];
        for i in 0..steps {
            let (a0, a1) = (at(a, i), at(a, i + 1));
            let (b0, b1) = (at(b, i), at(b, i + 1));
            self.triangle(role, a0, b0, b1);
            self.triangle(role, a0, b1, a1);
        }
    }

    /// Fan-triangulate a convex polygon after removing repeated neighbours.
    fn polygon(&mut self, role: SurfaceRole, ring: &[u32]) {
        let mut unique: Vec<u32> = Vec::with_capacity(ring.len());
        for &v in ring {
            if unique.last() != Some(&v) {
                unique.push(v);
            }
        }
        while unique.len() > 1 && unique.first() == unique.last() {
            unique.pop();
        }
        for i in 1..unique.len().saturating_sub(1) {
            self.triangle(role, unique[0], unique[i], unique[i + 1]);
        }
    }

    /// Rectangular channel below the bottom face along `edge`.
    ///
    /// The run is inset by the groove offset at both ends so that grooves on
    /// perpendicular edges stay inside the footprint.
    fn groove(&mut self, edge: Edge, spec: &GrooveSpec) {
        let start = edge.start().position(&self.dims);
        let end = edge.end().position(&self.dims);
        let tangent = (end - start).normalize();
        let inward = -edge.normal();

        let run_start = start + tangent * spec.offset;
        let run_end = end - tangent * spec.offset;
        let outer = inward * spec.offset;
        let inner = inward * (spec.offset + spec.width);

        let mut v = |xz: DVec2, y: f64| self.raw_vertex(DVec3::new(xz.x, y, xz.y));
        let ot0 = v(run_start + outer, 0.0);
        let ot1 = v(run_end + outer, 0.0);
        let it0 = v(run_start + inner, 0.0);
        let it1 = v(run_end + inner, 0.0);
        let ob0 = v(run_start + outer, -spec.depth);
        let ob1 = v(run_end + outer, -spec.depth);
        let ib0 = v(run_start + inner, -spec.depth);
        let ib1 = v(run_end + inner, -spec.depth);

        let role = SurfaceRole::Side;
        self.quad(role, ob0, ib0, ib1, ob1);
        self.quad(role, ot0, ob0, ob1, ot1);
        self.quad(role, it0, it1, ib1, ib0);
        self.quad(role, ot0, it0, ib0, ob0);
        self.quad(role, ot1, ob1, ib1, it1);
    }

    fn finish(self) -> MeshBuffers {
        if self.dropped > 0 {
            log::trace!("Slab build dropped {} degenerate triangles", self.dropped);
        }

        let half_l = self.dims.length * 0.5;
        let half_w = self.dims.width * 0.5;

        let mut positions = Vec::with_capacity(self.positions.len() * 3);
        let mut uvs = Vec::with_capacity(self.positions.len() * 2);
        for p in &self.positions {
            positions.extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
            let u = ((p.x + half_l) / self.dims.length).clamp(0.0, 1.0);
            let v = ((p.z + half_w) / self.dims.width).clamp(0.0, 1.0);
            uvs.extend_from_slice(&[u as f32, v as f32]);
        }

        let mut indices = Vec::with_capacity(self.triangles.iter().map(Vec::len).sum());
        let mut groups = Vec::new();
        for role in SurfaceRole::ALL {
            let tris = &self.triangles[role as usize];
            if tris.is_empty() {
                continue;
            }
            groups.push(MaterialGroup {
                start: indices.len() as u32,
                count: tris.len() as u32,
                material_index: role.material_index(),
            });
            indices.extend_from_slice(tris);
        }

        MeshBuffers {
            positions,
            uvs,
            indices,
            groups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slab::{EdgeSelector, ProfileSpec};

    fn flat_box() -> SlabParams {
        SlabParams::new(Dimensions::new(1.0, 0.6, 0.03))
    }

    #[test]
    fn flat_box_is_eight_vertices() {
        let mesh = build_slab(&flat_box());
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.index_count(), 36);
        assert_eq!(mesh.groups.len(), 2);
        assert_eq!(mesh.group_for(SurfaceRole::Body).unwrap().count, 12);
        assert_eq!(mesh.group_for(SurfaceRole::Side).unwrap().count, 24);
        assert!(mesh.group_for(SurfaceRole::Profile).is_none());
        mesh.validate().unwrap();
    }

    #[test]
    fn flat_box_bounds_match_dimensions() {
        let b = build_slab(&flat_box()).bounds();
        assert!((b.min.x + 0.5).abs() < 1e-6 && (b.max.x - 0.5).abs() < 1e-6);
        assert!((b.min.z + 0.3).abs() < 1e-6 && (b.max.z - 0.3).abs() < 1e-6);
        assert!(b.min.y.abs() < 1e-6 && (b.max.y - 0.03).abs() < 1e-6);
    }

    #[test]
    fn uvs_span_footprint() {
        let mesh = build_slab(&flat_box());
        for i in 0..mesh.vertex_count() as u32 {
            let [u, v] = mesh.uv(i);
            assert!(u == 0.0 || u == 1.0);
            assert!(v == 0.0 || v == 1.0);
        }
    }

    #[test]
    fn top_face_is_single_quad_with_profile() {
        let params = flat_box().with_profile(
            ProfileSpec::QuarterRound { radius: 0.01 },
            EdgeSelector::ALL,
        );
        let mesh = build_slab(&params);
        let body = mesh.group_for(SurfaceRole::Body).unwrap();
        // Two triangles on the bottom, two on the top.
        assert_eq!(body.count, 12);
    }

    #[test]
    fn all_edges_processed_mitre_without_corner_fill() {
        let params =
            flat_box().with_profile(ProfileSpec::Chamfer { size: 0.01 }, EdgeSelector::ALL);
        let mesh = build_slab(&params);
        // Four chamfered sides of two quads each; every corner collapses to a mitre.
        let profile = mesh.group_for(SurfaceRole::Profile).unwrap();
        assert_eq!(profile.count, 4 * 2 * 2 * 3);
        assert!(mesh.group_for(SurfaceRole::Side).is_none());
        // 4 bottom corners, 4 chamfer knees, 4 top corners.
        assert_eq!(mesh.vertex_count(), 12);
    }

    #[test]
    fn stitch_clamps_shorter_sequence() {
        let mut b = SlabBuilder::new(Dimensions::new(1.0, 1.0, 1.0));
        b.stitch(SurfaceRole::Side, &[0, 1], &[0, 2, 3, 1]);
        let tris: Vec<_> = b.triangles[SurfaceRole::Side as usize]
            .chunks(3)
            .map(|t| t.to_vec())
            .collect();
        assert_eq!(tris, vec![vec![0, 2, 1], vec![1, 2, 3]]);
        assert_eq!(b.dropped, 4);
    }

    #[test]
    fn polygon_removes_repeats() {
        let mut b = SlabBuilder::new(Dimensions::new(1.0, 1.0, 1.0));
        b.polygon(SurfaceRole::Body, &[0, 0, 1, 1, 2, 2, 3, 0]);
        assert_eq!(b.triangles[0], vec![0, 1, 2, 0, 2, 3]);
    }
}
