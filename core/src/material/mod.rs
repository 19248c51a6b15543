//! Stone PBR materials.
//!
//! - [`PbrMaterialParams`] - Metal/roughness parameters used to create a material
//! - [`PbrMaterial`] - A created material, shared via `Arc` by the resource cache
//! - [`Finish`] - Surface finish adjustments (polished, honed, ...)
//! - [`preset`] - Reference values for common stones
//!
//! Materials are keyed `"{material}_{finish}"`, see [`material_key`].

use std::sync::Arc;

use crate::slab::{FinishSpec, MaterialSpec};
use crate::texture::CpuTexture;

/// Fallback base colour for unknown stones (`#f5f5dc`).
pub const DEFAULT_BASE_COLOR: [f32; 3] = [245.0 / 255.0, 245.0 / 255.0, 220.0 / 255.0];

/// Metal/roughness material parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PbrMaterialParams {
    /// Linear RGB.
    pub base_color: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
    pub ior: f32,
    pub clearcoat: f32,
    pub clearcoat_roughness: f32,
    pub subsurface: f32,
    /// Optional albedo texture URL, resolved by the resource manager.
    pub albedo_texture: Option<String>,
}

impl Default for PbrMaterialParams {
    fn default() -> Self {
        Self {
            base_color: DEFAULT_BASE_COLOR,
            metallic: 0.0,
            roughness: 0.5,
            ior: 1.5,
            clearcoat: 0.0,
            clearcoat_roughness: 0.03,
            subsurface: 0.0,
            albedo_texture: None,
        }
    }
}

impl PbrMaterialParams {
    fn stone(base_color: [f32; 3], roughness: f32, ior: f32) -> Self {
        Self {
            base_color,
            roughness,
            ior,
            ..Self::default()
        }
    }

    fn with_clearcoat(mut self, clearcoat: f32) -> Self {
        self.clearcoat = clearcoat;
        self
    }

    fn with_subsurface(mut self, subsurface: f32) -> Self {
        self.subsurface = subsurface;
        self
    }

    pub fn with_albedo_texture(mut self, url: impl Into<String>) -> Self {
        self.albedo_texture = Some(url.into());
        self
    }

    /// Parameters for an order's material and finish.
    ///
    /// Known stones start from their [`preset`]; anything else uses the
    /// order's hex colour. The finish roughness on the order always wins.
    pub fn from_order(material: &MaterialSpec, finish: &FinishSpec) -> Self {
        let stone = normalize_name(&material.name);
        let mut params = preset(&stone).unwrap_or_else(|| {
            let base_color = parse_hex_color(&material.color).unwrap_or_else(|| {
                log::warn!(
                    "Invalid material colour \"{}\" for {}, using default",
                    material.color,
                    material.name
                );
                DEFAULT_BASE_COLOR
            });
            Self {
                base_color,
                ..Self::default()
            }
        });

        if let Some(f) = Finish::parse(&finish.name) {
            params = f.apply(params);
        }
        params.roughness = finish.roughness.clamp(0.0, 1.0);
        params.albedo_texture = material.texture.clone();
        params
    }
}

/// Reference parameters for a stone, by database name (e.g. `"marble_carrara"`).
pub fn preset(name: &str) -> Option<PbrMaterialParams> {
    let p = match name {
        "marble_carrara" => PbrMaterialParams::stone([0.95, 0.95, 0.93], 0.15, 1.486)
            .with_clearcoat(0.1)
            .with_subsurface(0.02),
        "marble_calacatta" => PbrMaterialParams::stone([0.98, 0.96, 0.92], 0.12, 1.486)
            .with_clearcoat(0.15)
            .with_subsurface(0.025),
        "granite_polished" => {
            PbrMaterialParams::stone([0.35, 0.35, 0.37], 0.08, 1.54).with_clearcoat(0.2)
        }
        "granite_honed" => PbrMaterialParams::stone([0.35, 0.35, 0.37], 0.45, 1.54),
        "quartz_premium" => {
            PbrMaterialParams::stone([0.9, 0.9, 0.88], 0.1, 1.54).with_clearcoat(0.3)
        }
        "quartz_leather" => PbrMaterialParams::stone([0.85, 0.85, 0.83], 0.65, 1.54),
        "soapstone" => {
            PbrMaterialParams::stone([0.25, 0.28, 0.26], 0.7, 1.53).with_subsurface(0.05)
        }
        "travertine" => {
            PbrMaterialParams::stone([0.82, 0.75, 0.65], 0.55, 1.52).with_subsurface(0.03)
        }
        "slate" => PbrMaterialParams::stone([0.18, 0.2, 0.22], 0.8, 1.57),
        _ => return None,
    };
    Some(p)
}

/// Names accepted by [`preset`].
pub const PRESET_NAMES: [&str; 9] = [
    "marble_carrara",
    "marble_calacatta",
    "granite_polished",
    "granite_honed",
    "quartz_premium",
    "quartz_leather",
    "soapstone",
    "travertine",
    "slate",
];

/// Surface finish of a slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finish {
    Polished,
    Honed,
    Leather,
    Flamed,
    Brushed,
}

impl Finish {
    /// Parse a finish name, accepting the configurator's local names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "polished" | "polirano" | "polirana" => Some(Self::Polished),
            "honed" | "brušeno" | "bruseno" | "matt" | "matte" => Some(Self::Honed),
            "leather" | "leathered" => Some(Self::Leather),
            "flamed" | "plameno" => Some(Self::Flamed),
            "brushed" | "četkano" | "cetkano" => Some(Self::Brushed),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Polished => "polished",
            Self::Honed => "honed",
            Self::Leather => "leather",
            Self::Flamed => "flamed",
            Self::Brushed => "brushed",
        }
    }

    /// Roughness and clearcoat for this finish applied to `params`.
    pub fn apply(self, mut params: PbrMaterialParams) -> PbrMaterialParams {
        let (roughness, clearcoat) = match self {
            Self::Polished => (0.08, 0.2),
            Self::Honed => (0.4, 0.0),
            Self::Leather => (0.65, 0.0),
            Self::Flamed => (0.85, 0.0),
            Self::Brushed => (0.3, 0.05),
        };
        params.roughness = roughness;
        params.clearcoat = clearcoat;
        params
    }
}

/// A created material. Owned by the resource cache and shared by `Arc`.
#[derive(Debug, Clone)]
pub struct PbrMaterial {
    pub name: String,
    pub params: PbrMaterialParams,
    /// Resolved albedo texture, when the parameters name one and it is loaded.
    pub albedo: Option<Arc<CpuTexture>>,
}

impl PbrMaterial {
    pub fn new(name: impl Into<String>, params: PbrMaterialParams) -> Self {
        Self {
            name: name.into(),
            params,
            albedo: None,
        }
    }

    pub fn with_albedo(mut self, texture: Arc<CpuTexture>) -> Self {
        self.albedo = Some(texture);
        self
    }
}

/// Cache key of a material/finish pair.
pub fn material_key(material: &str, finish: &str) -> String {
    format!("{}_{}", normalize_name(material), normalize_name(finish))
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Parse `#rgb` or `#rrggbb` into linear RGB.
pub fn parse_hex_color(hex: &str) -> Option<[f32; 3]> {
    let digits = hex.trim().trim_start_matches('#');
    if !digits.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    let srgb = match digits.len() {
        6 => [
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        ],
        3 => {
            let expand = |i: usize| channel(&digits[i..i + 1]).map(|v| v * 17);
            [expand(0)?, expand(1)?, expand(2)?]
        }
        _ => return None,
    };
    Some(srgb.map(|c| srgb_to_linear(c as f32 / 255.0)))
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
