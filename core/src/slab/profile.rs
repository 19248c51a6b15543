//! Edge profiles: descriptor parsing, clamping and cross-section paths.

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

use crate::math::{DVec2, lerp};

use super::Dimensions;

/// Profile sizes below this collapse to [`ProfileSpec::Flat`] (metres).
pub const PROFILE_EPSILON: f64 = 1e-6;

/// Angular resolution of round profiles.
pub const ARC_SEGMENTS: usize = 12;

/// Default chamfer leg when the descriptor carries no size (mm).
const DEFAULT_CHAMFER_MM: f64 = 8.0;

/// Default quarter-round radius when the descriptor carries no size (mm).
const DEFAULT_ROUND_MM: f64 = 10.0;

/// Profile as written on an order form.
///
/// `radius` is in millimetres; zero means "use the size embedded in the
/// name, or the default for the profile kind".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDescriptor {
    pub name: String,
    #[serde(default)]
    pub radius: f64,
}

impl ProfileDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            radius: 0.0,
        }
    }

    pub fn with_radius_mm(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }
}

/// Parsed edge profile. Sizes are in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProfileSpec {
    /// Square cut.
    Flat,
    /// 45° cut with equal legs.
    Chamfer { size: f64 },
    /// Quarter circle rolling the top edge inward.
    QuarterRound { radius: f64 },
    /// Full semicircle over the whole edge height. The radius is always
    /// forced to half the slab height on clamping.
    HalfRound { radius: f64 },
}

impl ProfileSpec {
    /// Parse an order-form descriptor.
    ///
    /// Unrecognized names fall back to [`ProfileSpec::Flat`] with a warning.
    pub fn from_descriptor(desc: &ProfileDescriptor) -> Self {
        let name = desc.name.trim().to_lowercase();
        let size_mm = |default: f64| {
            if desc.radius > 0.0 {
                desc.radius
            } else {
                embedded_number(&name).unwrap_or(default)
            }
        };

        // "polu-zaobljen" also contains "zaobljen", so half-round is matched first.
        if name.is_empty() || ["flat", "straight", "ravn"].iter().any(|k| name.contains(k)) {
            ProfileSpec::Flat
        } else if ["polu", "half", "bullnose"].iter().any(|k| name.contains(k)) {
            ProfileSpec::HalfRound {
                radius: size_mm(0.0) / 1000.0,
            }
        } else if ["zaobljen", "round", "quarter", "fillet"]
            .iter()
            .any(|k| name.contains(k))
            || is_tagged(&name, 'r')
        {
            ProfileSpec::QuarterRound {
                radius: size_mm(DEFAULT_ROUND_MM) / 1000.0,
            }
        } else if ["chamfer", "faza", "bevel"].iter().any(|k| name.contains(k))
            || is_tagged(&name, 'c')
        {
            ProfileSpec::Chamfer {
                size: size_mm(DEFAULT_CHAMFER_MM) / 1000.0,
            }
        } else {
            log::warn!(
                "Unrecognized edge profile \"{}\", falling back to flat",
                desc.name
            );
            ProfileSpec::Flat
        }
    }

    /// Size of the profile (chamfer leg or radius); zero for flat.
    pub fn size(&self) -> f64 {
        match *self {
            ProfileSpec::Flat => 0.0,
            ProfileSpec::Chamfer { size } => size,
            ProfileSpec::QuarterRound { radius } | ProfileSpec::HalfRound { radius } => radius,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, ProfileSpec::Flat)
    }

    /// Clamp against the slab dimensions.
    ///
    /// `R = min(R, H / (half-round ? 1 : 2), L / 2, W / 2)`. Half-round is
    /// forced to `H / 2` before clamping. Sizes under [`PROFILE_EPSILON`]
    /// collapse to flat.
    pub fn clamped(self, dims: &Dimensions) -> Self {
        let planar = dims.half_min_planar();
        let clamp = |r: f64, height_div: f64| {
            let r = if r > 0.0 { r } else { 0.0 };
            r.min(dims.height / height_div).min(planar)
        };

        let spec = match self {
            ProfileSpec::Flat => ProfileSpec::Flat,
            ProfileSpec::Chamfer { size } => ProfileSpec::Chamfer {
                size: clamp(size, 2.0),
            },
            ProfileSpec::QuarterRound { radius } => ProfileSpec::QuarterRound {
                radius: clamp(radius, 2.0),
            },
            ProfileSpec::HalfRound { .. } => ProfileSpec::HalfRound {
                radius: clamp(dims.height * 0.5, 1.0),
            },
        };

        if !spec.is_flat() && spec.size() < PROFILE_EPSILON {
            ProfileSpec::Flat
        } else {
            spec
        }
    }

    /// Cross-section path of one edge of a slab of the given height.
    ///
    /// The profile is expected to be [clamped](Self::clamped) already.
    pub fn path(&self, height: f64, processed: bool) -> ProfilePath {
        let h = height;
        let mut points = vec![DVec2::new(0.0, 0.0)];

        match *self {
            _ if !processed => points.push(DVec2::new(0.0, h)),
            ProfileSpec::Flat => points.push(DVec2::new(0.0, h)),
            ProfileSpec::Chamfer { size: r } => {
                points.push(DVec2::new(0.0, h - r));
                points.push(DVec2::new(-r, h));
            }
            ProfileSpec::QuarterRound { radius: r } => {
                points.push(DVec2::new(0.0, h - r));
                for k in 1..ARC_SEGMENTS {
                    let theta = k as f64 / ARC_SEGMENTS as f64 * FRAC_PI_2;
                    points.push(DVec2::new(-r + r * theta.cos(), h - r + r * theta.sin()));
                }
                points.push(DVec2::new(-r, h));
            }
            ProfileSpec::HalfRound { radius: r } => {
                let base = h - 2.0 * r;
                if base > PROFILE_EPSILON {
                    points.push(DVec2::new(0.0, base));
                } else {
                    points.clear();
                    points.push(DVec2::new(0.0, 0.0));
                }
                for k in 1..ARC_SEGMENTS {
                    let phi = -FRAC_PI_2 + k as f64 / ARC_SEGMENTS as f64 * PI;
                    points.push(DVec2::new(r * phi.cos(), h - r + r * phi.sin()));
                }
                points.push(DVec2::new(0.0, h));
            }
        }

        ProfilePath { points }
    }
}

/// `c8`, `c 8`, `r5.5`: a single letter tag followed by a number.
fn is_tagged(name: &str, tag: char) -> bool {
    let mut chars = name.chars();
    chars.next() == Some(tag)
        && chars
            .as_str()
            .trim_start()
            .starts_with(|c: char| c.is_ascii_digit())
}

/// First decimal number appearing in `name`.
fn embedded_number(name: &str) -> Option<f64> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let rest = &name[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(rest.len());
    rest[..end].replace(',', ".").parse().ok()
}

/// Cross-section silhouette of one edge.
///
/// Points are `(outward offset, height)`, ordered bottom to top. The first
/// point is always `(0, 0)` and the last one sits at the slab height.
/// Negative offsets move inward.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilePath {
    points: Vec<DVec2>,
}

impl ProfilePath {
    pub fn points(&self) -> &[DVec2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Offset of the silhouette at `height`, linearly interpolated between
    /// path points. Heights outside the path clamp to its ends.
    pub fn offset_at(&self, height: f64) -> f64 {
        let Some(first) = self.points.first() else {
            return 0.0;
        };
        if height <= first.y {
            return first.x;
        }
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if height <= b.y {
                let span = b.y - a.y;
                if span <= f64::EPSILON {
                    return b.x;
                }
                return lerp(a.x, b.x, (height - a.y) / span);
            }
        }
        self.points.last().map_or(0.0, |p| p.x)
    }
}
