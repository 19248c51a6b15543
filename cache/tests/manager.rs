//! Resource manager behaviour: shared loads, reference counts, stats.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rstest::rstest;
use stonecut_cache::{
    CacheConfig, FileTextureLoader, ResourceManager, TextureLoadError, TextureLoader,
    TextureResult,
};
use stonecut_core::compute::IoHandle;
use stonecut_core::material::PbrMaterialParams;
use stonecut_core::mesh::build_slab;
use stonecut_core::slab::{Dimensions, SlabParams};
use stonecut_core::texture::{CpuTexture, TextureFormat, TextureOptions};

/// Loader whose loads complete only when the test says so.
#[derive(Clone, Default)]
struct ManualLoader {
    started: Arc<Mutex<Vec<(String, mpsc::Sender<TextureResult>)>>>,
}

impl ManualLoader {
    fn load_count(&self) -> usize {
        self.started.lock().len()
    }

    fn complete(&self, index: usize, result: TextureResult) {
        let started = self.started.lock();
        started[index].1.send(result).unwrap();
    }

    fn abandon(&self, index: usize) {
        let mut started = self.started.lock();
        let (url, _) = started.remove(index);
        started.insert(index, (url, mpsc::channel().0));
    }
}

impl TextureLoader for ManualLoader {
    fn load(&self, url: &str, _options: TextureOptions) -> IoHandle<TextureResult> {
        let (sender, receiver) = mpsc::channel();
        self.started.lock().push((url.to_string(), sender));
        IoHandle::new(receiver)
    }
}

fn manager() -> (ResourceManager, ManualLoader) {
    let loader = ManualLoader::default();
    (ResourceManager::new(CacheConfig::default(), loader.clone()), loader)
}

fn texel() -> CpuTexture {
    CpuTexture::solid([200, 200, 190, 255], TextureFormat::Rgba8UnormSrgb)
}

// ---------------------------------------------------------------------------
// Textures
// ---------------------------------------------------------------------------

#[test]
fn concurrent_loads_share_one_fetch() {
    let (mut manager, loader) = manager();
    let a = manager.load_texture("marble.png", TextureOptions::default());
    let b = manager.load_texture("marble.png", TextureOptions::default());
    assert_eq!(loader.load_count(), 1);
    assert_eq!(manager.pending_textures(), 1);
    assert!(a.try_result().is_none());

    loader.complete(0, Ok(texel()));
    assert_eq!(manager.poll_textures(), 1);
    assert_eq!(manager.pending_textures(), 0);

    let a = a.try_result().unwrap().unwrap();
    let b = b.try_result().unwrap().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(manager.stats().textures, 1);
    assert_eq!(manager.stats().total_ref_count, 2);
}

#[test]
fn different_options_load_separately() {
    let (mut manager, loader) = manager();
    let _srgb = manager.load_texture("marble.png", TextureOptions::default());
    let _linear = manager.load_texture("marble.png", TextureOptions::linear());
    assert_eq!(loader.load_count(), 2);
}

#[test]
fn cached_texture_resolves_immediately() {
    let (mut manager, loader) = manager();
    let first = manager.load_texture("slate.jpg", TextureOptions::default());
    loader.complete(0, Ok(texel()));
    manager.poll_textures();
    first.try_result().unwrap().unwrap();

    let second = manager.load_texture("slate.jpg", TextureOptions::default());
    assert!(second.try_result().unwrap().is_ok());
    assert_eq!(loader.load_count(), 1);
    assert_eq!(manager.stats().total_ref_count, 2);

    assert!(manager.release_texture(second.key()));
    assert!(manager.release_texture(first.key()));
    assert_eq!(manager.stats().textures, 0);
}

#[test]
fn failure_rejects_every_waiter_and_clears_pending() {
    let (mut manager, loader) = manager();
    let a = manager.load_texture("missing.png", TextureOptions::default());
    let b = manager.load_texture("missing.png", TextureOptions::default());

    let err = TextureLoadError::Io {
        url: "missing.png".into(),
        message: "not found".into(),
    };
    loader.complete(0, Err(err.clone()));
    manager.poll_textures();

    assert_eq!(a.try_result(), Some(Err(err.clone())));
    assert_eq!(b.try_result(), Some(Err(err)));
    assert_eq!(manager.pending_textures(), 0);
    assert_eq!(manager.stats().textures, 0);

    // A later request starts a fresh load.
    let _retry = manager.load_texture("missing.png", TextureOptions::default());
    assert_eq!(loader.load_count(), 2);
}

#[test]
fn abandoned_load_is_cancelled() {
    let (mut manager, loader) = manager();
    let request = manager.load_texture("granite.png", TextureOptions::default());
    loader.abandon(0);
    assert_eq!(manager.poll_textures(), 1);
    assert!(matches!(
        request.try_result(),
        Some(Err(TextureLoadError::Cancelled { .. }))
    ));
}

#[test]
fn dropped_request_takes_no_reference() {
    let (mut manager, loader) = manager();
    let kept = manager.load_texture("onyx.png", TextureOptions::default());
    let dropped = manager.load_texture("onyx.png", TextureOptions::default());
    drop(dropped);

    loader.complete(0, Ok(texel()));
    manager.poll_textures();
    kept.try_result().unwrap().unwrap();
    assert_eq!(manager.stats().total_ref_count, 1);

    assert!(manager.release_texture(kept.key()));
    assert_eq!(manager.stats().textures, 0);
    assert_eq!(manager.stats().total_ref_count, 0);
}

#[test]
fn load_with_no_remaining_requests_is_not_cached() {
    let (mut manager, loader) = manager();
    drop(manager.load_texture("basalt.png", TextureOptions::default()));
    loader.complete(0, Ok(texel()));
    assert_eq!(manager.poll_textures(), 1);
    assert_eq!(manager.pending_textures(), 0);
    assert_eq!(manager.stats(), Default::default());
}

#[test]
fn dispose_all_cancels_pending_loads() {
    let (mut manager, _loader) = manager();
    let request = manager.load_texture("quartz.png", TextureOptions::default());
    manager.dispose_all();
    assert!(matches!(
        request.try_result(),
        Some(Err(TextureLoadError::Cancelled { .. }))
    ));
    assert_eq!(manager.pending_textures(), 0);
}

// ---------------------------------------------------------------------------
// Materials and geometry
// ---------------------------------------------------------------------------

#[test]
fn material_created_once_and_counted_per_call() {
    let (mut manager, _loader) = manager();
    let params = PbrMaterialParams::default();
    let a = manager.get_pbr_material("granite_polished", &params);
    let b = manager.get_pbr_material("granite_polished", &params);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(manager.stats().materials, 1);
    assert_eq!(manager.stats().total_ref_count, 2);

    assert!(manager.release_material("granite_polished"));
    assert!(manager.release_material("granite_polished"));
    assert_eq!(manager.stats().materials, 0);
    assert!(!manager.release_material("granite_polished"));
}

#[test]
fn material_picks_up_loaded_albedo() {
    let (mut manager, loader) = manager();
    let request = manager.load_texture("calacatta.jpg", TextureOptions::default());
    loader.complete(0, Ok(texel()));
    manager.poll_textures();
    let texture = request.try_result().unwrap().unwrap();

    let params = PbrMaterialParams::default().with_albedo_texture("calacatta.jpg");
    let material = manager.get_pbr_material("calacatta_polished", &params);
    assert!(Arc::ptr_eq(material.albedo.as_ref().unwrap(), &texture));
}

#[test]
fn material_gets_albedo_when_texture_arrives_later() {
    let (mut manager, loader) = manager();
    let params = PbrMaterialParams::default().with_albedo_texture("nero.jpg");
    let early = manager.get_pbr_material("nero_honed", &params);
    assert!(early.albedo.is_none());

    let request = manager.load_texture("nero.jpg", TextureOptions::default());
    loader.complete(0, Ok(texel()));
    manager.poll_textures();
    let texture = request.try_result().unwrap().unwrap();

    let refreshed = manager.get_material("nero_honed").unwrap();
    assert!(Arc::ptr_eq(refreshed.albedo.as_ref().unwrap(), &texture));
    assert_eq!(refreshed.params, early.params);
    // One material reference and one texture reference, unchanged by the swap.
    assert_eq!(manager.stats().total_ref_count, 2);
}

#[test]
fn geometry_set_get_release() {
    let (mut manager, _loader) = manager();
    let mesh = build_slab(&SlabParams::new(Dimensions::new(1.0, 0.6, 0.03)));
    let stored = manager.set_geometry("slab-1", mesh.clone());
    assert_eq!(*stored, mesh);

    let fetched = manager.get_geometry("slab-1").unwrap();
    assert!(Arc::ptr_eq(&stored, &fetched));
    assert!(manager.acquire_geometry("slab-1"));
    assert_eq!(manager.stats().total_ref_count, 2);

    assert!(manager.release_geometry("slab-1"));
    assert!(manager.release_geometry("slab-1"));
    assert!(manager.get_geometry("slab-1").is_none());
}

#[test]
fn other_resources_are_typed() {
    let (mut manager, _loader) = manager();
    manager.set_other("order-note", String::from("polished edge"), 1);
    assert_eq!(
        manager.get_other::<String>("order-note").map(String::as_str),
        Some("polished edge")
    );
    assert!(manager.get_other::<u32>("order-note").is_none());

    manager.set_other("order-note", String::from("ignored"), 2);
    assert_eq!(
        manager.get_other::<String>("order-note").map(String::as_str),
        Some("polished edge")
    );
    assert_eq!(manager.stats().total_ref_count, 3);
    assert!(manager.release_other("order-note"));
    assert!(manager.release_other("order-note"));
    assert!(manager.acquire_other("order-note"));
    assert!(manager.release_other("order-note"));
    assert!(manager.release_other("order-note"));
    assert_eq!(manager.stats().other, 0);
}

#[rstest]
#[case::released_entries_evicted(1, 2)]
#[case::shared_entries_kept(2, 3)]
fn geometry_capacity(#[case] refs_per_entry: u32, #[case] expected_len: usize) {
    let config = CacheConfig {
        geometries: 2,
        ..CacheConfig::default()
    };
    let mut manager = ResourceManager::new(config, ManualLoader::default());
    let mesh = build_slab(&SlabParams::new(Dimensions::new(0.5, 0.5, 0.02)));
    for key in ["a", "b", "c"] {
        manager.set_geometry(key, mesh.clone());
        for _ in 1..refs_per_entry {
            manager.acquire_geometry(key);
        }
    }
    assert_eq!(manager.stats().geometries, expected_len);
}

// ---------------------------------------------------------------------------
// Disk loader
// ---------------------------------------------------------------------------

fn poll_until_done(manager: &mut ResourceManager) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while manager.pending_textures() > 0 && Instant::now() < deadline {
        manager.poll_textures();
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn file_loader_reads_and_decodes_png() {
    let dir = std::env::temp_dir().join(format!("stonecut-cache-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]))
        .save(dir.join("travertine.png"))
        .unwrap();

    let loader = FileTextureLoader::new(&dir).unwrap();
    let mut manager = ResourceManager::new(CacheConfig::default(), loader);
    let found = manager.load_texture("travertine.png", TextureOptions::default());
    let missing = manager.load_texture("nope.png", TextureOptions::default());
    poll_until_done(&mut manager);

    let texture = found.try_result().unwrap().unwrap();
    assert_eq!((texture.width, texture.height), (4, 2));
    assert_eq!(texture.pixel(3, 1), Some([10, 20, 30, 255]));
    assert!(matches!(
        missing.try_result(),
        Some(Err(TextureLoadError::Io { .. }))
    ));

    let _ = std::fs::remove_dir_all(&dir);
}
