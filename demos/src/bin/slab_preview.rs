//! # Slab Preview
//!
//! Headless preview loop: builds a slab on the worker pool, caches the mesh
//! and material, and logs what a renderer would upload.
//!
//! ```text
//! slab_preview --config demos/data/preview.toml --order demos/data/order.json
//! slab_preview --profile C8 --edges front,right --grooves front
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use stonecut_cache::{FileTextureLoader, ResourceManager};
use stonecut_core::mesh::SurfaceRole;
use stonecut_core::slab::{EdgeSelector, ProfileDescriptor, SlabRequest};
use stonecut_demos::{PreviewConfig, PreviewSession, UpdateStatus, load_order};
use stonecut_jobs::{MeshWorkerPool, Priority};

const FRAME_TIME: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(
    name = "slab_preview",
    about = "Rebuild a stone slab off-thread and report the result",
    version
)]
struct Args {
    /// Preview settings (TOML). Missing file means defaults.
    #[arg(long, default_value = "preview.toml")]
    config: PathBuf,

    /// Order form (JSON, millimetres). Overrides the slab flags below.
    #[arg(long)]
    order: Option<PathBuf>,

    /// Slab length in metres.
    #[arg(long, default_value = "1.2")]
    length: f64,

    /// Slab width in metres.
    #[arg(long, default_value = "0.6")]
    width: f64,

    /// Slab thickness in metres.
    #[arg(long, default_value = "0.03")]
    height: f64,

    /// Edge profile name, e.g. "flat", "C8", "R10", "Polu-zaobljena".
    #[arg(long, default_value = "flat")]
    profile: String,

    /// Processed edges, comma separated (front,right,back,left or all).
    #[arg(long, default_value = "front")]
    edges: String,

    /// Edges with a drip groove underneath, comma separated.
    #[arg(long)]
    grooves: Option<String>,

    /// Give up after this many frames.
    #[arg(long, default_value = "300")]
    frames: u32,
}

impl Args {
    fn slab_request(&self) -> SlabRequest {
        SlabRequest {
            length: self.length,
            width: self.width,
            height: self.height,
            profile: ProfileDescriptor::new(self.profile.as_str()),
            processed_edges: EdgeSelector::parse_list(&self.edges),
            okapnik_edges: self.grooves.as_deref().map(EdgeSelector::parse_list),
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = PreviewConfig::load(&args.config)?;
    let loader = FileTextureLoader::new(&config.texture_root)?;
    let mut resources = ResourceManager::new(config.cache, loader);
    let pool = MeshWorkerPool::mesh_builder(config.pool.clone())?;
    let mut session = PreviewSession::new(pool, &mut resources, config.groove.spec());

    match &args.order {
        Some(path) => {
            let order = load_order(path)?;
            log::info!(
                "Order: {} x {} x {} mm, {} / {}",
                order.dims.length,
                order.dims.width,
                order.dims.height,
                order.material.name,
                order.finish.name
            );
            session.request_order(&order, Priority::INTERACTIVE)?;
        }
        None => {
            session.request_rebuild(&args.slab_request(), Priority::INTERACTIVE)?;
        }
    }

    for frame in 0..args.frames {
        match session.update() {
            UpdateStatus::Pending => std::thread::sleep(FRAME_TIME),
            UpdateStatus::Rebuilt | UpdateStatus::Idle => {
                log::info!("Frame {frame}: slab ready");
                break;
            }
            UpdateStatus::Failed(err) => return Err(err.into()),
        }
    }

    match session.displayed() {
        Some(slab) => {
            let mesh = &slab.mesh;
            let size = mesh.bounds().size();
            log::info!(
                "Mesh: {} vertices, {} triangles, {} bytes, bounds {:.3} x {:.3} x {:.3}",
                mesh.vertex_count(),
                mesh.triangle_count(),
                mesh.byte_size(),
                size.x,
                size.y,
                size.z
            );
            for role in SurfaceRole::ALL {
                if let Some(group) = mesh.group_for(role) {
                    log::info!("  {role:?}: {} indices from {}", group.count, group.start);
                }
            }
            if let Some(material) = &slab.material {
                log::info!(
                    "Material {}: roughness {:.2}, ior {:.2}",
                    material.name,
                    material.params.roughness,
                    material.params.ior
                );
            }
        }
        None => log::warn!("No slab finished within {} frames", args.frames),
    }

    let pool = session.pool_stats();
    log::info!(
        "Pool: {} workers, {} processed, {} failed, avg {:?}",
        pool.total_workers,
        pool.total_processed,
        pool.total_failed,
        pool.average_execution_time
    );
    let cache = session.resources().stats();
    log::info!(
        "Cache: {} geometries, {} materials, {} textures, {} references",
        cache.geometries,
        cache.materials,
        cache.textures,
        cache.total_ref_count
    );
    Ok(())
}
