//! Wire shapes that arrive from the configurator.
//!
//! [`SlabRequest`] is the job input (metres). [`OrderConfig`] is the full
//! order form (millimetres) that the configurator persists. Both are parsed
//! into [`SlabParams`] exactly once, before any job is submitted.

use serde::{Deserialize, Serialize};

use super::{Dimensions, EdgeSelector, GrooveSpec, ProfileDescriptor, ProfileSpec, SlabParams};

/// Errors raised while turning a request into builder parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("slab dimensions must be finite and positive, got {length} x {width} x {height}")]
    InvalidDimensions { length: f64, width: f64, height: f64 },
}

/// Geometry job input.
///
/// ```json
/// { "L": 1.0, "W": 0.6, "H": 0.03,
///   "profile": { "name": "C8" },
///   "processedEdges": { "front": true },
///   "okapnikEdges": null }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlabRequest {
    #[serde(rename = "L")]
    pub length: f64,
    #[serde(rename = "W")]
    pub width: f64,
    #[serde(rename = "H")]
    pub height: f64,
    #[serde(default)]
    pub profile: ProfileDescriptor,
    #[serde(rename = "processedEdges", default)]
    pub processed_edges: EdgeSelector,
    #[serde(rename = "okapnikEdges", default)]
    pub okapnik_edges: Option<EdgeSelector>,
}

impl SlabRequest {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.length, self.width, self.height)
    }

    /// Validate and parse into builder parameters.
    pub fn to_params(&self, groove: GrooveSpec) -> Result<SlabParams, RequestError> {
        let dimensions = self.dimensions();
        if !dimensions.is_valid() {
            return Err(RequestError::InvalidDimensions {
                length: self.length,
                width: self.width,
                height: self.height,
            });
        }

        Ok(SlabParams::new(dimensions)
            .with_profile(
                ProfileSpec::from_descriptor(&self.profile),
                self.processed_edges,
            )
            .with_drip_edges(self.okapnik_edges.unwrap_or_default())
            .with_groove(groove))
    }
}

/// Order-form slab size in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderDimensions {
    pub length: f64,
    pub width: f64,
    /// Slab thickness.
    pub height: f64,
}

/// Stone selection on an order form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub name: String,
    #[serde(default = "default_material_color")]
    pub color: String,
    /// Optional albedo texture URL or path.
    #[serde(default)]
    pub texture: Option<String>,
}

fn default_material_color() -> String {
    "#f5f5dc".into()
}

/// Surface finish on an order form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishSpec {
    pub name: String,
    #[serde(default = "default_finish_roughness")]
    pub roughness: f32,
}

fn default_finish_roughness() -> f32 {
    0.1
}

/// Full order configuration as persisted by the configurator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfig {
    pub dims: OrderDimensions,
    pub material: MaterialSpec,
    pub finish: FinishSpec,
    pub profile: ProfileDescriptor,
    #[serde(rename = "processedEdges", default)]
    pub processed_edges: EdgeSelector,
    #[serde(rename = "okapnikEdges", default)]
    pub okapnik_edges: EdgeSelector,
}

impl OrderConfig {
    /// Job input in metres.
    pub fn slab_request(&self) -> SlabRequest {
        SlabRequest {
            length: self.dims.length / 1000.0,
            width: self.dims.width / 1000.0,
            height: self.dims.height / 1000.0,
            profile: self.profile.clone(),
            processed_edges: self.processed_edges,
            okapnik_edges: Some(self.okapnik_edges),
        }
    }

    /// Cache key for the slab material, `"{material}_{finish}"`.
    pub fn material_key(&self) -> String {
        crate::material::material_key(&self.material.name, &self.finish.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST_JSON: &str = r#"{
        "L": 1.2, "W": 0.6, "H": 0.03,
        "profile": { "name": "C8" },
        "processedEdges": { "front": true, "back": false, "left": false, "right": false },
        "okapnikEdges": null
    }"#;

    #[test]
    fn parse_slab_request() {
        let req: SlabRequest = serde_json::from_str(REQUEST_JSON).unwrap();
        assert_eq!(req.length, 1.2);
        assert!(req.processed_edges.front);
        assert!(req.okapnik_edges.is_none());

        let params = req.to_params(GrooveSpec::default()).unwrap();
        assert_eq!(params.profile, ProfileSpec::Chamfer { size: 0.008 });
        assert!(params.drip_edges.is_empty());
    }

    #[test]
    fn missing_edge_flags_default_to_false() {
        let req: SlabRequest =
            serde_json::from_str(r#"{"L":1,"W":1,"H":0.02,"profile":{"name":"flat"}}"#).unwrap();
        assert_eq!(req.processed_edges, EdgeSelector::NONE);
    }

    #[test]
    fn invalid_dimensions_rejected() {
        let req: SlabRequest =
            serde_json::from_str(r#"{"L":0,"W":1,"H":0.02,"profile":{"name":"flat"}}"#).unwrap();
        assert!(matches!(
            req.to_params(GrooveSpec::default()),
            Err(RequestError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn order_converts_millimetres() {
        let order: OrderConfig = serde_json::from_str(
            r#"{
                "dims": { "length": 1200, "width": 600, "height": 30 },
                "material": { "name": "Marble Carrara" },
                "finish": { "name": "Polished" },
                "profile": { "name": "Polu-zaobljena" },
                "okapnikEdges": { "front": true }
            }"#,
        )
        .unwrap();

        assert_eq!(order.material.color, "#f5f5dc");
        assert_eq!(order.material_key(), "marble_carrara_polished");

        let req = order.slab_request();
        assert!((req.length - 1.2).abs() < 1e-12);
        assert!((req.height - 0.03).abs() < 1e-12);
        assert_eq!(req.okapnik_edges, Some(EdgeSelector::only(&[super::super::Edge::Front])));
    }
}
