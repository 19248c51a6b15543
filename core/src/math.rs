//! Math type aliases and helper functions.
//!
//! Geometry is computed in f64 and narrowed to f32 only when written into
//! [`MeshBuffers`](crate::mesh::MeshBuffers).

pub use nalgebra;

// ===== Construction math (f64) =====

/// 2D vector (f64), used for XZ footprint work.
pub type DVec2 = nalgebra::Vector2<f64>;

/// 3D vector (f64).
pub type DVec3 = nalgebra::Vector3<f64>;

// ===== Output math (f32) =====

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// Grid used when welding coincident vertices (1 µm).
pub const WELD_TOLERANCE: f64 = 1e-6;

/// Weld grid for a part whose smallest dimension is `smallest`.
///
/// [`WELD_TOLERANCE`], refined to a thousandth of `smallest` for sub-millimetre
/// parts so opposite faces never land in the same cell.
pub fn weld_tolerance(smallest: f64) -> f64 {
    WELD_TOLERANCE.min(smallest * 1e-3)
}

/// Quantize a position onto a weld grid of cell size `tolerance`.
///
/// Two points that round to the same key are treated as one vertex.
pub fn weld_key(p: &DVec3, tolerance: f64) -> [i64; 3] {
    let q = |v: f64| (v / tolerance).round() as i64;
    [q(p.x), q(p.y), q(p.z)]
}

/// Linear interpolation between `a` and `b`.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An inverted box that any point will expand.
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::INFINITY),
            max: Vec3::repeat(f32::NEG_INFINITY),
        }
    }

    /// Grow the box to include `p`.
    pub fn expand(&mut self, p: Vec3) {
        self.min = self.min.inf(&p);
        self.max = self.max.sup(&p);
    }

    /// Whether no point has been added yet.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::zeros()
        } else {
            self.max - self.min
        }
    }
}
