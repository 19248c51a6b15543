//! # Stonecut Cache
//!
//! Reference-counted storage for the resources a slab preview shares:
//! decoded textures, PBR materials, and built meshes.
//!
//! - [`ResourceCache`] - One keyed class with refcounts and LRU eviction
//! - [`ResourceManager`] - Texture, material, geometry and misc caches plus
//!   de-duplicated asynchronous texture loads
//! - [`FileTextureLoader`] - Disk loader backed by a small tokio runtime

mod cache;
mod config;
mod loader;
mod manager;

pub use cache::ResourceCache;
pub use config::CacheConfig;
pub use loader::{FileTextureLoader, TextureLoadError, TextureLoader, TextureResult, decode_texture};
pub use manager::{CacheStats, ResourceManager, TextureRequest};
