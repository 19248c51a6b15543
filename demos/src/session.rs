use std::sync::Arc;

use stonecut_cache::{ResourceManager, TextureRequest};
use stonecut_core::material::{PbrMaterial, PbrMaterialParams};
use stonecut_core::mesh::MeshBuffers;
use stonecut_core::slab::{GrooveSpec, OrderConfig, RequestError, SlabRequest};
use stonecut_core::texture::TextureOptions;
use stonecut_jobs::{
    CancellationToken, JobError, JobHandle, JobId, JobOptions, MeshWorkerPool, PoolStats, Priority,
};

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Job(#[from] JobError),
}

/// What [`PreviewSession::update`] observed this frame.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateStatus {
    /// Nothing in flight.
    Idle,
    /// A rebuild is still running.
    Pending,
    /// A new mesh is on display.
    Rebuilt,
    /// The latest rebuild failed; the previous mesh stays on display.
    Failed(JobError),
}

/// The slab currently shown, with the cache references it holds.
#[derive(Debug, Clone)]
pub struct DisplayedSlab {
    pub geometry_key: String,
    pub mesh: Arc<MeshBuffers>,
    pub material: Option<Arc<PbrMaterial>>,
}

struct MaterialRequest {
    key: String,
    params: PbrMaterialParams,
}

struct InFlight {
    handle: JobHandle<MeshBuffers>,
    token: CancellationToken,
    geometry_key: String,
    material: Option<MaterialRequest>,
}

/// Interactive slab preview.
///
/// Every edit calls [`request_rebuild`](Self::request_rebuild); the frame
/// loop calls [`update`](Self::update). Only the latest request is shown:
/// submitting a new one cancels the previous job. The session holds exactly
/// one geometry reference, at most one material reference and at most one
/// texture reference (the albedo of the latest order), and gives them back
/// when the displayed slab changes or the session is dropped.
pub struct PreviewSession<'a> {
    pool: MeshWorkerPool,
    resources: &'a mut ResourceManager,
    groove: GrooveSpec,
    in_flight: Option<InFlight>,
    displayed: Option<DisplayedSlab>,
    held_material: Option<String>,
    texture: Option<TextureRequest>,
    held_texture: Option<String>,
}

impl<'a> PreviewSession<'a> {
    pub fn new(pool: MeshWorkerPool, resources: &'a mut ResourceManager, groove: GrooveSpec) -> Self {
        Self {
            pool,
            resources,
            groove,
            in_flight: None,
            displayed: None,
            held_material: None,
            texture: None,
            held_texture: None,
        }
    }

    /// Cache key of the mesh for `request`.
    pub fn geometry_key(request: &SlabRequest) -> String {
        // Serialising the request captures every field that shapes the mesh.
        match serde_json::to_string(request) {
            Ok(json) => format!("slab:{json}"),
            Err(_) => format!("slab:{request:?}"),
        }
    }

    /// Rebuilds the slab for `request` without a material.
    pub fn request_rebuild(
        &mut self,
        request: &SlabRequest,
        priority: Priority,
    ) -> Result<Option<JobId>, PreviewError> {
        self.submit(request, None, priority)
    }

    /// Rebuilds the slab of an order and shows it in the order's material.
    ///
    /// Starts loading the material's albedo texture if it names one.
    pub fn request_order(
        &mut self,
        order: &OrderConfig,
        priority: Priority,
    ) -> Result<Option<JobId>, PreviewError> {
        let params = PbrMaterialParams::from_order(&order.material, &order.finish);
        match params.albedo_texture.as_deref() {
            Some(url) => self.request_texture(url),
            None => {
                self.abandon_texture();
                self.release_texture();
            }
        }
        let material = MaterialRequest {
            key: order.material_key(),
            params,
        };
        self.submit(&order.slab_request(), Some(material), priority)
    }

    /// Submits a rebuild. Returns `None` when the mesh was already cached
    /// and is displayed immediately.
    fn submit(
        &mut self,
        request: &SlabRequest,
        material: Option<MaterialRequest>,
        priority: Priority,
    ) -> Result<Option<JobId>, PreviewError> {
        let params = request.to_params(self.groove)?;
        let geometry_key = Self::geometry_key(request);

        if let Some(previous) = self.in_flight.take() {
            log::debug!("Superseding job {}", previous.handle.id());
            previous.token.cancel();
        }

        if let Some(mesh) = self.resources.get_geometry(&geometry_key) {
            self.resources.acquire_geometry(&geometry_key);
            log::debug!("Reusing cached mesh {geometry_key}");
            self.display(geometry_key, mesh, material);
            return Ok(None);
        }

        let token = CancellationToken::new();
        let options = JobOptions::new()
            .with_priority(priority)
            .with_cancellation(token.clone());
        let handle = self.pool.execute(params, options)?;
        let id = handle.id();
        log::debug!("Submitted rebuild job {id}");

        self.in_flight = Some(InFlight {
            handle,
            token,
            geometry_key,
            material,
        });
        Ok(Some(id))
    }

    /// Polls texture loads and the in-flight rebuild. Call once per frame.
    pub fn update(&mut self) -> UpdateStatus {
        self.resources.poll_textures();
        self.collect_texture();
        self.refresh_material();

        let Some(in_flight) = self.in_flight.as_mut() else {
            return UpdateStatus::Idle;
        };
        let Some(result) = in_flight.handle.try_result() else {
            return UpdateStatus::Pending;
        };
        let Some(in_flight) = self.in_flight.take() else {
            return UpdateStatus::Idle;
        };

        match result {
            Ok(mesh) => {
                log::info!(
                    "Slab rebuilt: {} vertices, {} triangles",
                    mesh.vertex_count(),
                    mesh.triangle_count()
                );
                let mesh = self.resources.set_geometry(&in_flight.geometry_key, mesh);
                self.display(in_flight.geometry_key, mesh, in_flight.material);
                UpdateStatus::Rebuilt
            }
            Err(err) => {
                log::warn!("Rebuild failed: {err}");
                UpdateStatus::Failed(err)
            }
        }
    }

    /// Swaps in a mesh whose geometry reference the caller already took.
    fn display(
        &mut self,
        geometry_key: String,
        mesh: Arc<MeshBuffers>,
        material: Option<MaterialRequest>,
    ) {
        let material = material.map(|request| {
            let material = self.resources.get_pbr_material(&request.key, &request.params);
            (request.key, material)
        });

        if let Some(previous) = self.displayed.take() {
            self.resources.release_geometry(&previous.geometry_key);
        }
        if let Some(previous) = self.held_material.take() {
            self.resources.release_material(&previous);
        }

        let (held_material, material) = match material {
            Some((key, material)) => (Some(key), Some(material)),
            None => {
                self.abandon_texture();
                self.release_texture();
                (None, None)
            }
        };
        self.held_material = held_material;
        self.displayed = Some(DisplayedSlab {
            geometry_key,
            mesh,
            material,
        });
    }

    /// Starts loading `url` unless it is already held or on its way.
    fn request_texture(&mut self, url: &str) {
        let options = TextureOptions::default();
        let key = options.cache_key(url);
        let requested = self.held_texture.as_deref() == Some(key.as_str())
            || self.texture.as_ref().is_some_and(|t| t.key() == key);
        if !requested {
            self.abandon_texture();
            self.texture = Some(self.resources.load_texture(url, options));
        }
    }

    /// Takes the reference delivered for the pending texture request. The
    /// session keeps one texture reference, so an older one is given back.
    fn collect_texture(&mut self) {
        let Some(result) = self.texture.as_ref().and_then(TextureRequest::try_result) else {
            return;
        };
        let Some(request) = self.texture.take() else {
            return;
        };
        match result {
            Ok(_) => {
                self.release_texture();
                self.held_texture = Some(request.key().to_string());
            }
            Err(err) => log::warn!("Texture unavailable: {err}"),
        }
    }

    /// Drops the pending texture request, giving back the reference it may
    /// already have been handed.
    fn abandon_texture(&mut self) {
        if let Some(request) = self.texture.take()
            && let Some(Ok(_)) = request.try_result()
        {
            self.resources.release_texture(request.key());
        }
    }

    fn release_texture(&mut self) {
        if let Some(key) = self.held_texture.take() {
            self.resources.release_texture(&key);
        }
    }

    /// Swaps in the cached material once its albedo has been attached.
    fn refresh_material(&mut self) {
        let Some(displayed) = self.displayed.as_mut() else {
            return;
        };
        let Some(material) = displayed.material.as_ref() else {
            return;
        };
        if material.albedo.is_some() || material.params.albedo_texture.is_none() {
            return;
        }
        if let Some(cached) = self.resources.get_material(&material.name)
            && cached.albedo.is_some()
        {
            log::debug!("Material {} now has its albedo", cached.name);
            displayed.material = Some(cached);
        }
    }

    pub fn displayed(&self) -> Option<&DisplayedSlab> {
        self.displayed.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn resources(&self) -> &ResourceManager {
        &*self.resources
    }
}

impl Drop for PreviewSession<'_> {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.token.cancel();
        }
        if let Some(displayed) = self.displayed.take() {
            self.resources.release_geometry(&displayed.geometry_key);
        }
        if let Some(key) = self.held_material.take() {
            self.resources.release_material(&key);
        }
        self.abandon_texture();
        self.release_texture();
    }
}
