//! CPU-side slab mesh types and the geometry builder.
//!
//! - [`MeshBuffers`] - Flat positions / UVs / indices plus material groups
//! - [`SurfaceRole`] / [`MaterialGroup`] - Index ranges by surface role
//! - [`build_slab`] - Procedural slab generator

mod buffers;
mod slab;

pub use buffers::{MaterialGroup, MeshBuffers, MeshError, SurfaceRole};
pub use slab::build_slab;
