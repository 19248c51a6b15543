use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::mpsc;
use std::task::{Context, Poll};

use stonecut_core::compute::{IoHandle, noop_waker};
use stonecut_core::material::{PbrMaterial, PbrMaterialParams};
use stonecut_core::mesh::MeshBuffers;
use stonecut_core::texture::{CpuTexture, TextureOptions};

use crate::cache::ResourceCache;
use crate::config::CacheConfig;
use crate::loader::{TextureLoadError, TextureLoader, TextureResult};

type SharedTextureResult = Result<Arc<CpuTexture>, TextureLoadError>;

/// Pending or completed texture load handed to one caller.
///
/// Resolves during [`ResourceManager::poll_textures`]. On success the
/// caller owns one reference to the cache entry and should release it with
/// [`ResourceManager::release_texture`] using [`key()`](Self::key).
pub struct TextureRequest {
    key: String,
    receiver: mpsc::Receiver<SharedTextureResult>,
}

impl TextureRequest {
    fn new(key: String) -> (Self, mpsc::Sender<SharedTextureResult>) {
        let (sender, receiver) = mpsc::channel();
        (Self { key, receiver }, sender)
    }

    /// Cache key of the texture (URL plus options).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Takes the result once it has been delivered.
    pub fn try_result(&self) -> Option<SharedTextureResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(TextureLoadError::Cancelled {
                url: self.key.clone(),
            })),
        }
    }
}

impl fmt::Debug for TextureRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureRequest").field("key", &self.key).finish()
    }
}

struct PendingTexture {
    url: String,
    handle: IoHandle<TextureResult>,
    waiters: Vec<mpsc::Sender<SharedTextureResult>>,
}

/// Entry counts per resource class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub textures: usize,
    pub materials: usize,
    pub geometries: usize,
    pub other: usize,
    pub total_ref_count: u64,
}

/// Owner of every shared rendering resource.
///
/// Constructed explicitly and passed by `&mut`; there is no global
/// instance. Textures, materials and geometries are handed out as `Arc`s
/// and counted per `acquire`/`release`.
pub struct ResourceManager {
    textures: ResourceCache<Arc<CpuTexture>>,
    materials: ResourceCache<Arc<PbrMaterial>>,
    geometries: ResourceCache<Arc<MeshBuffers>>,
    other: ResourceCache<Box<dyn Any>>,
    pending: HashMap<String, PendingTexture>,
    loader: Box<dyn TextureLoader>,
}

impl ResourceManager {
    pub fn new(config: CacheConfig, loader: impl TextureLoader + 'static) -> Self {
        Self {
            textures: ResourceCache::with_dispose_hook(config.textures, |key, _| {
                log::debug!("Disposed texture {key}");
            }),
            materials: ResourceCache::with_dispose_hook(config.materials, |key, _| {
                log::debug!("Disposed material {key}");
            }),
            geometries: ResourceCache::with_dispose_hook(config.geometries, |key, _| {
                log::debug!("Disposed geometry {key}");
            }),
            other: ResourceCache::with_dispose_hook(config.other, |key, _| {
                log::debug!("Disposed resource {key}");
            }),
            pending: HashMap::new(),
            loader: Box::new(loader),
        }
    }

    // -----------------------------------------------------------------------
    // Textures
    // -----------------------------------------------------------------------

    /// Requests `url` decoded with `options`.
    ///
    /// A cached texture resolves immediately with one more reference. A load
    /// already in flight for the same key is shared rather than restarted.
    pub fn load_texture(&mut self, url: &str, options: TextureOptions) -> TextureRequest {
        let key = options.cache_key(url);
        let (request, sender) = TextureRequest::new(key.clone());

        if let Some(texture) = self.textures.get(&key).cloned() {
            self.textures.acquire(&key);
            let _ = sender.send(Ok(texture));
            return request;
        }

        if let Some(pending) = self.pending.get_mut(&key) {
            log::trace!("Joining pending load of {key}");
            pending.waiters.push(sender);
            return request;
        }

        let handle = self.loader.load(url, options);
        self.pending.insert(
            key,
            PendingTexture {
                url: url.to_string(),
                handle,
                waiters: vec![sender],
            },
        );
        request
    }

    /// Number of texture loads still in flight.
    pub fn pending_textures(&self) -> usize {
        self.pending.len()
    }

    /// Delivers finished texture loads. Call once per frame.
    ///
    /// A loaded texture is cached with one reference per waiter that still
    /// holds its [`TextureRequest`]; if every waiter is gone it is not
    /// cached at all. Cached materials waiting on the texture pick it up as
    /// their albedo. A failure is delivered to every waiter. Returns the
    /// number of loads resolved.
    pub fn poll_textures(&mut self) -> usize {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut finished = Vec::new();
        for (key, pending) in &mut self.pending {
            if let Poll::Ready(outcome) = Pin::new(&mut pending.handle).poll(&mut cx) {
                finished.push((key.clone(), outcome));
            }
        }

        let resolved = finished.len();
        for (key, outcome) in finished {
            let Some(pending) = self.pending.remove(&key) else {
                continue;
            };
            let result = outcome.unwrap_or_else(|| {
                Err(TextureLoadError::Cancelled {
                    url: pending.url.clone(),
                })
            });
            match result {
                Ok(texture) => {
                    let texture = Arc::new(texture);
                    let delivered = pending
                        .waiters
                        .into_iter()
                        .filter(|waiter| waiter.send(Ok(Arc::clone(&texture))).is_ok())
                        .count() as u32;
                    if delivered == 0 {
                        log::debug!("Loaded texture {key} but every request was dropped");
                        continue;
                    }
                    self.textures.set(key.as_str(), Arc::clone(&texture), delivered);
                    log::debug!("Loaded texture {key} for {delivered} waiter(s)");
                    self.attach_albedo(&key, &texture);
                }
                Err(err) => {
                    log::warn!("{err}");
                    for waiter in pending.waiters {
                        let _ = waiter.send(Err(err.clone()));
                    }
                }
            }
        }
        resolved
    }

    /// Rebuilds cached materials whose albedo is `texture_key` but which were
    /// created before it finished loading. Reference counts are kept.
    fn attach_albedo(&mut self, texture_key: &str, texture: &Arc<CpuTexture>) {
        let waiting: Vec<(String, PbrMaterial)> = self
            .materials
            .iter()
            .filter(|(_, material)| {
                material.albedo.is_none()
                    && material
                        .params
                        .albedo_texture
                        .as_deref()
                        .is_some_and(|url| TextureOptions::default().cache_key(url) == texture_key)
            })
            .map(|(key, material)| {
                let upgraded = PbrMaterial::new(key, material.params.clone())
                    .with_albedo(Arc::clone(texture));
                (key.to_string(), upgraded)
            })
            .collect();

        for (key, material) in waiting {
            log::debug!("Attached albedo {texture_key} to material {key}");
            self.materials.replace(&key, Arc::new(material));
        }
    }

    pub fn get_texture(&mut self, key: &str) -> Option<Arc<CpuTexture>> {
        self.textures.get(key).cloned()
    }

    pub fn acquire_texture(&mut self, key: &str) -> bool {
        self.textures.acquire(key)
    }

    pub fn release_texture(&mut self, key: &str) -> bool {
        self.textures.release(key)
    }

    // -----------------------------------------------------------------------
    // Materials
    // -----------------------------------------------------------------------

    /// Returns the material cached under `key`, creating it from `params`
    /// if needed. Every call takes one reference.
    ///
    /// The albedo texture is attached when it is already loaded with
    /// default options. Otherwise it is attached by the
    /// [`poll_textures`](Self::poll_textures) call that completes its load;
    /// `Arc`s handed out earlier keep the old material, so holders should
    /// look the key up again with [`get_material`](Self::get_material).
    pub fn get_pbr_material(&mut self, key: &str, params: &PbrMaterialParams) -> Arc<PbrMaterial> {
        if let Some(material) = self.materials.get(key).cloned() {
            self.materials.acquire(key);
            return material;
        }

        let mut material = PbrMaterial::new(key, params.clone());
        if let Some(url) = &params.albedo_texture {
            let texture_key = TextureOptions::default().cache_key(url);
            if let Some(texture) = self.textures.get(&texture_key).cloned() {
                material = material.with_albedo(texture);
            }
        }
        let material = Arc::new(material);
        self.materials.set(key, Arc::clone(&material), 1);
        log::debug!("Created material {key}");
        material
    }

    /// Looks up a cached material without taking a reference.
    pub fn get_material(&mut self, key: &str) -> Option<Arc<PbrMaterial>> {
        self.materials.get(key).cloned()
    }

    pub fn acquire_material(&mut self, key: &str) -> bool {
        self.materials.acquire(key)
    }

    pub fn release_material(&mut self, key: &str) -> bool {
        self.materials.release(key)
    }

    // -----------------------------------------------------------------------
    // Geometry
    // -----------------------------------------------------------------------

    /// Caches `mesh` under `key` with one reference.
    ///
    /// If `key` is already cached the existing mesh is returned and its
    /// count goes up by one.
    pub fn set_geometry(&mut self, key: &str, mesh: MeshBuffers) -> Arc<MeshBuffers> {
        Arc::clone(self.geometries.set(key, Arc::new(mesh), 1))
    }

    pub fn get_geometry(&mut self, key: &str) -> Option<Arc<MeshBuffers>> {
        self.geometries.get(key).cloned()
    }

    pub fn acquire_geometry(&mut self, key: &str) -> bool {
        self.geometries.acquire(key)
    }

    pub fn release_geometry(&mut self, key: &str) -> bool {
        self.geometries.release(key)
    }

    // -----------------------------------------------------------------------
    // Other resources
    // -----------------------------------------------------------------------

    pub fn set_other<T: Any>(&mut self, key: &str, value: T, initial_ref_count: u32) {
        self.other.set(key, Box::new(value), initial_ref_count);
    }

    /// Typed lookup; `None` if absent or of another type.
    pub fn get_other<T: Any>(&mut self, key: &str) -> Option<&T> {
        self.other.get(key)?.as_ref().downcast_ref::<T>()
    }

    pub fn acquire_other(&mut self, key: &str) -> bool {
        self.other.acquire(key)
    }

    pub fn release_other(&mut self, key: &str) -> bool {
        self.other.release(key)
    }

    // -----------------------------------------------------------------------
    // Whole cache
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            textures: self.textures.len(),
            materials: self.materials.len(),
            geometries: self.geometries.len(),
            other: self.other.len(),
            total_ref_count: self.textures.total_ref_count()
                + self.materials.total_ref_count()
                + self.geometries.total_ref_count()
                + self.other.total_ref_count(),
        }
    }

    /// Drops every cached resource and abandons pending loads. Waiting
    /// requests resolve with [`TextureLoadError::Cancelled`].
    pub fn dispose_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            for waiter in pending.waiters {
                let _ = waiter.send(Err(TextureLoadError::Cancelled {
                    url: pending.url.clone(),
                }));
            }
        }
        self.textures.dispose_all();
        self.materials.dispose_all();
        self.geometries.dispose_all();
        self.other.dispose_all();
        log::info!("Resource cache cleared");
    }
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("stats", &self.stats())
            .field("pending", &self.pending.len())
            .finish()
    }
}
