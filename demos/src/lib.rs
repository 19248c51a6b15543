//! # Stonecut Demos
//!
//! A headless slab preview that wires the geometry pool and the resource
//! cache together the way an interactive configurator does.
//!
//! ## Binaries
//!
//! - `slab_preview` - Rebuilds a slab from CLI flags or an order file and
//!   logs mesh, pool and cache statistics

mod config;
mod session;

pub use config::{ConfigError, GrooveConfig, PreviewConfig, load_order};
pub use session::{DisplayedSlab, PreviewError, PreviewSession, UpdateStatus};

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
