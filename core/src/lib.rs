//! # Stonecut Core
//!
//! Slab model, geometry builder, stone materials and the compute primitives
//! shared by the job scheduler and the resource cache.

pub mod compute;
pub mod material;
pub mod math;
pub mod mesh;
pub mod slab;
pub mod texture;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
