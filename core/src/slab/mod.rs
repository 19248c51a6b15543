//! Slab description types.
//!
//! This module provides the validated input of the geometry builder:
//!
//! - [`Dimensions`] - Slab length, width and height in metres
//! - [`Edge`] / [`Corner`] - Named perimeter edges and corners
//! - [`EdgeSelector`] - Four per-edge flags (processed edges, drip edges)
//! - [`GrooveSpec`] - Drip-groove cross-section
//! - [`SlabParams`] - Everything [`build_slab`](crate::mesh::build_slab) needs
//!
//! Frame: X runs along the length, Z along the width, Y up. The footprint is
//! centred on the origin and the slab occupies `y ∈ [0, H]`.

mod profile;
mod request;

pub use profile::{PROFILE_EPSILON, ProfileDescriptor, ProfilePath, ProfileSpec};
pub use request::{
    FinishSpec, MaterialSpec, OrderConfig, OrderDimensions, RequestError, SlabRequest,
};

use serde::{Deserialize, Serialize};

use crate::math::DVec2;

/// Slab extents in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(length: f64, width: f64, height: f64) -> Self {
        Self {
            length,
            width,
            height,
        }
    }

    /// All three extents are finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        [self.length, self.width, self.height]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
    }

    /// Half the smaller planar extent.
    pub fn half_min_planar(&self) -> f64 {
        self.length.min(self.width) * 0.5
    }
}

/// A perimeter edge, listed in counter-clockwise order seen from above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Edge {
    /// +Z side.
    Front,
    /// +X side.
    Right,
    /// -Z side.
    Back,
    /// -X side.
    Left,
}

impl Edge {
    /// Perimeter order. Each edge starts at the corner where the previous one ends.
    pub const ALL: [Edge; 4] = [Edge::Front, Edge::Right, Edge::Back, Edge::Left];

    /// Outward normal in the XZ plane.
    pub fn normal(self) -> DVec2 {
        match self {
            Edge::Front => DVec2::new(0.0, 1.0),
            Edge::Right => DVec2::new(1.0, 0.0),
            Edge::Back => DVec2::new(0.0, -1.0),
            Edge::Left => DVec2::new(-1.0, 0.0),
        }
    }

    /// Corner the edge runs from.
    pub fn start(self) -> Corner {
        match self {
            Edge::Front => Corner::FrontLeft,
            Edge::Right => Corner::FrontRight,
            Edge::Back => Corner::BackRight,
            Edge::Left => Corner::BackLeft,
        }
    }

    /// Corner the edge runs to.
    pub fn end(self) -> Corner {
        self.next().start()
    }

    /// The edge that follows this one around the perimeter.
    pub fn next(self) -> Edge {
        match self {
            Edge::Front => Edge::Right,
            Edge::Right => Edge::Back,
            Edge::Back => Edge::Left,
            Edge::Left => Edge::Front,
        }
    }

    /// Edge length along the perimeter.
    pub fn span(self, dims: &Dimensions) -> f64 {
        match self {
            Edge::Front | Edge::Back => dims.length,
            Edge::Right | Edge::Left => dims.width,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Edge::Front => "front",
            Edge::Right => "right",
            Edge::Back => "back",
            Edge::Left => "left",
        }
    }
}

/// A footprint corner, identified by the two edges that meet there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    FrontLeft,
    FrontRight,
    BackRight,
    BackLeft,
}

impl Corner {
    /// Same order as [`Edge::ALL`] start corners.
    pub const ALL: [Corner; 4] = [
        Corner::FrontLeft,
        Corner::FrontRight,
        Corner::BackRight,
        Corner::BackLeft,
    ];

    /// Edge that ends at this corner.
    pub fn incoming(self) -> Edge {
        match self {
            Corner::FrontLeft => Edge::Left,
            Corner::FrontRight => Edge::Front,
            Corner::BackRight => Edge::Right,
            Corner::BackLeft => Edge::Back,
        }
    }

    /// Edge that starts at this corner.
    pub fn outgoing(self) -> Edge {
        self.incoming().next()
    }

    /// XZ position of the corner for a slab of the given size.
    pub fn position(self, dims: &Dimensions) -> DVec2 {
        let a = dims.length * 0.5;
        let b = dims.width * 0.5;
        match self {
            Corner::FrontLeft => DVec2::new(-a, b),
            Corner::FrontRight => DVec2::new(a, b),
            Corner::BackRight => DVec2::new(a, -b),
            Corner::BackLeft => DVec2::new(-a, -b),
        }
    }
}

/// One flag per perimeter edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeSelector {
    pub front: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
}

impl EdgeSelector {
    pub const NONE: EdgeSelector = EdgeSelector {
        front: false,
        back: false,
        left: false,
        right: false,
    };

    pub const ALL: EdgeSelector = EdgeSelector {
        front: true,
        back: true,
        left: true,
        right: true,
    };

    /// Selector with exactly the given edges set.
    pub fn only(edges: &[Edge]) -> Self {
        let mut sel = Self::NONE;
        for &edge in edges {
            sel.set(edge, true);
        }
        sel
    }

    pub fn contains(&self, edge: Edge) -> bool {
        match edge {
            Edge::Front => self.front,
            Edge::Right => self.right,
            Edge::Back => self.back,
            Edge::Left => self.left,
        }
    }

    pub fn set(&mut self, edge: Edge, value: bool) {
        match edge {
            Edge::Front => self.front = value,
            Edge::Right => self.right = value,
            Edge::Back => self.back = value,
            Edge::Left => self.left = value,
        }
    }

    /// Selected edges in perimeter order.
    pub fn iter(&self) -> impl Iterator<Item = Edge> + '_ {
        Edge::ALL.into_iter().filter(|e| self.contains(*e))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Parse a comma separated list such as `"front,left"`.
    ///
    /// Unknown names are ignored with a warning. `"all"` and `"none"` are accepted.
    pub fn parse_list(list: &str) -> Self {
        let mut sel = Self::NONE;
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name.to_ascii_lowercase().as_str() {
                "all" => sel = Self::ALL,
                "none" => sel = Self::NONE,
                "front" => sel.front = true,
                "back" => sel.back = true,
                "left" => sel.left = true,
                "right" => sel.right = true,
                other => log::warn!("Unknown edge name \"{other}\" ignored"),
            }
        }
        sel
    }
}

/// Cross-section of a drip groove (okapnik), in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrooveSpec {
    /// Distance from the slab edge to the outer groove wall.
    pub offset: f64,
    /// Distance between the outer and inner walls.
    pub width: f64,
    /// Depth below the bottom face.
    pub depth: f64,
}

impl GrooveSpec {
    pub const DEFAULT_OFFSET_MM: f64 = 20.0;
    pub const DEFAULT_WIDTH_MM: f64 = 8.0;
    pub const DEFAULT_DEPTH_MM: f64 = 5.0;

    /// Build from millimetre values.
    pub fn from_mm(offset: f64, width: f64, depth: f64) -> Self {
        Self {
            offset: offset / 1000.0,
            width: width / 1000.0,
            depth: depth / 1000.0,
        }
    }

    /// Whether a groove with this section fits inside a slab footprint.
    pub fn fits(&self, dims: &Dimensions) -> bool {
        self.offset >= 0.0
            && self.width > 0.0
            && self.depth > 0.0
            && self.offset + self.width <= dims.half_min_planar()
    }
}

impl Default for GrooveSpec {
    fn default() -> Self {
        Self::from_mm(
            Self::DEFAULT_OFFSET_MM,
            Self::DEFAULT_WIDTH_MM,
            Self::DEFAULT_DEPTH_MM,
        )
    }
}

/// Complete input of the geometry builder.
///
/// The profile is already parsed; the builder never sees descriptor strings.
#[derive(Debug, Clone, PartialEq)]
pub struct SlabParams {
    pub dimensions: Dimensions,
    pub profile: ProfileSpec,
    pub processed_edges: EdgeSelector,
    pub drip_edges: EdgeSelector,
    pub groove: GrooveSpec,
}

impl SlabParams {
    /// A plain box with no processed edges and no grooves.
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            profile: ProfileSpec::Flat,
            processed_edges: EdgeSelector::NONE,
            drip_edges: EdgeSelector::NONE,
            groove: GrooveSpec::default(),
        }
    }

    pub fn with_profile(mut self, profile: ProfileSpec, edges: EdgeSelector) -> Self {
        self.profile = profile;
        self.processed_edges = edges;
        self
    }

    pub fn with_drip_edges(mut self, edges: EdgeSelector) -> Self {
        self.drip_edges = edges;
        self
    }

    pub fn with_groove(mut self, groove: GrooveSpec) -> Self {
        self.groove = groove;
        self
    }

    /// Profile after clamping against the slab dimensions.
    pub fn effective_profile(&self) -> ProfileSpec {
        self.profile.clamped(&self.dimensions)
    }

    /// Cross-section path of one edge.
    pub fn edge_path(&self, edge: Edge) -> ProfilePath {
        self.effective_profile().path(
            self.dimensions.height,
            self.processed_edges.contains(edge),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perimeter_is_closed() {
        for edge in Edge::ALL {
            assert_eq!(edge.end(), edge.next().start());
            assert_eq!(edge.end().incoming(), edge);
            assert_eq!(edge.start().outgoing(), edge);
        }
    }

    #[test]
    fn corner_positions_centered() {
        let dims = Dimensions::new(2.0, 1.0, 0.03);
        assert_eq!(Corner::FrontLeft.position(&dims), DVec2::new(-1.0, 0.5));
        assert_eq!(Corner::BackRight.position(&dims), DVec2::new(1.0, -0.5));
    }

    #[test]
    fn edge_selector_parse_list() {
        let sel = EdgeSelector::parse_list("front, Left,bogus");
        assert!(sel.front && sel.left);
        assert!(!sel.back && !sel.right);
        assert_eq!(EdgeSelector::parse_list("all"), EdgeSelector::ALL);
        assert_eq!(EdgeSelector::parse_list(""), EdgeSelector::NONE);
    }

    #[test]
    fn edge_selector_iter_in_perimeter_order() {
        let sel = EdgeSelector::only(&[Edge::Left, Edge::Front]);
        let edges: Vec<_> = sel.iter().collect();
        assert_eq!(edges, vec![Edge::Front, Edge::Left]);
    }

    #[test]
    fn default_groove_in_metres() {
        let g = GrooveSpec::default();
        assert!((g.offset - 0.02).abs() < 1e-12);
        assert!((g.width - 0.008).abs() < 1e-12);
        assert!((g.depth - 0.005).abs() < 1e-12);
    }

    #[test]
    fn groove_fit() {
        let g = GrooveSpec::default();
        assert!(g.fits(&Dimensions::new(1.0, 0.6, 0.03)));
        assert!(!g.fits(&Dimensions::new(1.0, 0.05, 0.03)));
    }

    #[test]
    fn dimensions_validity() {
        assert!(Dimensions::new(1.0, 1.0, 0.02).is_valid());
        assert!(!Dimensions::new(0.0, 1.0, 0.02).is_valid());
        assert!(!Dimensions::new(1.0, f64::NAN, 0.02).is_valid());
    }
}
