//! # Stonecut Jobs
//!
//! A small supervised worker pool. Slab meshes are rebuilt on worker
//! threads so the interactive loop never blocks on geometry.
//!
//! ```ignore
//! let pool = MeshWorkerPool::mesh_builder(PoolConfig::default())?;
//! let mut handle = pool.execute(params, JobOptions::new().with_priority(Priority::INTERACTIVE))?;
//! // later, once per frame:
//! if let Some(result) = handle.try_result() { /* upload */ }
//! ```

mod config;
mod error;
mod handle;
mod pool;
mod queue;
mod stats;
mod worker;

pub use config::{DEFAULT_WORKERS, MAX_WORKERS, PoolConfig};
pub use error::{JobError, PoolError};
pub use handle::{JobHandle, JobId};
pub use pool::{JobOptions, MeshWorkerPool, WorkerPool};
pub use stats::PoolStats;
pub use stonecut_core::compute::{CancellationToken, Priority};
