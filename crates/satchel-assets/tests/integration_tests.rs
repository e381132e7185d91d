//! Integration tests for the asset system.
//!
//! These tests use tempfile to create isolated test environments.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use satchel_assets::*;

// ============================================================================
// Helper Functions
// ============================================================================

fn gradient_pixels(width: u32, height: u32) -> Vec<u8> {
    (0..width * height)
        .flat_map(|i| {
            let v = (i % 251) as u8;
            [v, v.wrapping_mul(3), 255 - v, 255]
        })
        .collect()
}

fn write_texture(
    dir: &Path,
    name: &str,
    size: u32,
    checksum: u16,
    compression: CompressionMode,
) -> Vec<u8> {
    let pixels = gradient_pixels(size, size);
    let info = TextureInfo::rgba8(size, size)
        .with_compression(compression)
        .with_original_file(format!("{}.png", name));
    let mut file = pack_texture(&info, &pixels).unwrap();
    file.checksum = checksum;
    file.save(dir.join(name)).unwrap();
    pixels
}

fn texture_manager(dir: &Path, config: AssetManagerConfig) -> TextureManager {
    AssetManager::with_config(Arc::new(FileIo::new(dir)), config)
}

// ============================================================================
// Loading Tests
// ============================================================================

#[test]
fn test_load_same_uri_twice_dedups() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_texture(temp_dir.path(), "stone.tx", 4, 11, CompressionMode::Lz4);

    let textures = texture_manager(temp_dir.path(), AssetManagerConfig::default());
    let first = textures.load("stone.tx").unwrap();
    let second = textures.load("stone.tx").unwrap();

    assert_eq!(textures.len(), 1);
    assert_eq!(first.index(), second.index());
    assert_eq!(first.checksum(), 11);
    assert_eq!(first.checksum(), second.checksum());
    assert_eq!(first, second);
    assert_eq!(textures.ref_count(&first), 2);
}

#[test]
fn test_texture_roundtrip_both_modes() {
    for mode in [CompressionMode::None, CompressionMode::Lz4] {
        let temp_dir = tempfile::tempdir().unwrap();
        let pixels = write_texture(temp_dir.path(), "grad.tx", 16, 1, mode);

        let textures = texture_manager(temp_dir.path(), AssetManagerConfig::default());
        let handle = textures.load("grad.tx").unwrap();
        let texture = textures.get(&handle).unwrap();

        assert_eq!(texture.pixels, pixels, "mode {}", mode);
        assert_eq!(texture.info.width, 16);
        assert_eq!(texture.info.height, 16);
        assert_eq!(texture.info.compression, mode);
        assert_eq!(texture.info.original_file, "grad.tx.png");
    }
}

#[test]
fn test_missing_file_is_not_found() {
    let temp_dir = tempfile::tempdir().unwrap();
    let textures = texture_manager(temp_dir.path(), AssetManagerConfig::default());

    let err = textures.load("missing.tx").unwrap_err();
    assert!(err.is_not_found());
    assert!(textures.is_empty());

    let handle = textures.load_or_invalid("missing.tx");
    assert!(!handle.is_valid());
    assert_eq!(handle.id(), HandleId::INVALID);
    assert!(textures.get(&handle).is_none());
}

#[test]
fn test_wrong_type_tag_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    pack_material(&Material::new("stone", "lit"))
        .unwrap()
        .save(temp_dir.path().join("stone.mat"))
        .unwrap();

    let textures = texture_manager(temp_dir.path(), AssetManagerConfig::default());
    let err = textures.load("stone.mat").unwrap_err();

    assert!(matches!(
        err,
        AssetError::TypeMismatch {
            expected: FileType::TEXTURE,
            found: FileType::MATERIAL,
        }
    ));
    assert!(textures.is_empty());
    assert_eq!(textures.capacity(), 0);
    assert!(!textures.load_or_invalid("stone.mat").is_valid());
}

#[test]
fn test_corrupt_container_allocates_nothing() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_texture(temp_dir.path(), "bad.tx", 8, 1, CompressionMode::Lz4);
    let path = temp_dir.path().join("bad.tx");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.truncate(bytes.len() - 3);
    std::fs::write(&path, bytes).unwrap();

    let textures = texture_manager(temp_dir.path(), AssetManagerConfig::default());
    let err = textures.load("bad.tx").unwrap_err();
    assert!(matches!(err, AssetError::CorruptPayload { .. }));
    assert!(textures.is_empty());
}

#[test]
fn test_oversized_payload_header_is_corrupt() {
    let mut info = TextureInfo::rgba8(1 << 22, 1 << 22);
    info.buffer_size = 1 << 46;
    let mut file = AssetFile::new(FileType::TEXTURE);
    file.set_metadata(&info).unwrap();

    // Swap the empty buffer for 4 LZ4 bytes claiming to restore to 64 TiB
    let mut bytes = file.to_bytes().unwrap();
    bytes.truncate(bytes.len() - 17);
    bytes.push(CompressionMode::Lz4 as u8);
    bytes.extend_from_slice(&(1u64 << 46).to_le_bytes());
    bytes.extend_from_slice(&4u64.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);

    let io = Arc::new(MemoryIo::new());
    io.insert("huge.tx", bytes);
    let textures: TextureManager = AssetManager::with_io(io);

    let err = textures.load("huge.tx").unwrap_err();
    assert!(matches!(err, AssetError::CorruptPayload { .. }));
    assert!(textures.is_empty());
}

// ============================================================================
// Handle Lifetime Tests
// ============================================================================

#[test]
fn test_stale_id_never_sees_new_asset() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_texture(temp_dir.path(), "a.tx", 2, 100, CompressionMode::Lz4);
    write_texture(temp_dir.path(), "b.tx", 3, 200, CompressionMode::Lz4);

    let textures = texture_manager(temp_dir.path(), AssetManagerConfig::new().growth_chunk(1));
    let a = textures.load("a.tx").unwrap();
    let stale = a.id();
    drop(a);
    assert!(!textures.uri_exists("a.tx"));

    let b = textures.load("b.tx").unwrap();
    assert_eq!(b.index(), stale.index, "slot should be recycled");
    assert_ne!(b.checksum(), stale.checksum);

    assert!(textures.get(stale).is_none());
    assert!(textures.user_data(stale).is_none());
    assert!(!textures.exists(stale));
    assert_eq!(textures.get(&b).unwrap().info.width, 3);
}

#[test]
fn test_out_of_range_id() {
    let temp_dir = tempfile::tempdir().unwrap();
    let textures = texture_manager(temp_dir.path(), AssetManagerConfig::default());
    assert!(textures.get(HandleId::new(500, 0)).is_none());
}

#[test]
fn test_concurrent_handle_copies_conserve_count() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_texture(temp_dir.path(), "shared.tx", 4, 1, CompressionMode::Lz4);

    let textures = texture_manager(temp_dir.path(), AssetManagerConfig::default());
    let handle = textures.load("shared.tx").unwrap();

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let workers: Vec<_> = (0..threads)
        .map(|_| {
            let handle = handle.clone();
            let textures = textures.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..1000 {
                    let copies: Vec<_> = (0..4).map(|_| handle.clone()).collect();
                    assert!(textures.get(&copies[0]).is_some());
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(textures.ref_count(&handle), 1);
    assert!(textures.uri_exists("shared.tx"));

    let id = handle.id();
    drop(handle);
    assert!(!textures.exists(id));
    assert!(textures.is_empty());
}

#[test]
fn test_concurrent_loads_share_one_slot() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_texture(temp_dir.path(), "race.tx", 8, 5, CompressionMode::Lz4);

    let textures = texture_manager(temp_dir.path(), AssetManagerConfig::default());
    let barrier = Arc::new(Barrier::new(6));
    let workers: Vec<_> = (0..6)
        .map(|_| {
            let textures = textures.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                textures.load("race.tx").unwrap()
            })
        })
        .collect();
    let handles: Vec<_> = workers
        .into_iter()
        .map(|worker| worker.join().unwrap())
        .collect();

    assert_eq!(textures.len(), 1);
    assert!(handles.iter().all(|h| *h == handles[0]));
    assert_eq!(textures.ref_count(&handles[0]), 6);
}

#[test]
fn test_growth_past_initial_capacity() {
    let temp_dir = tempfile::tempdir().unwrap();
    for i in 0..17 {
        write_texture(
            temp_dir.path(),
            &format!("t{}.tx", i),
            1 + i as u32 % 3,
            i as u16,
            CompressionMode::None,
        );
    }

    let textures = texture_manager(
        temp_dir.path(),
        AssetManagerConfig::new().initial_capacity(16).growth_chunk(16),
    );
    assert_eq!(textures.capacity(), 16);

    let handles: Vec<_> = (0..17)
        .map(|i| textures.load(&format!("t{}.tx", i)).unwrap())
        .collect();

    assert_eq!(textures.growth_events(), 1);
    assert_eq!(textures.capacity(), 32);
    assert_eq!(textures.len(), 17);

    for (i, handle) in handles.iter().enumerate() {
        assert_eq!(handle.checksum(), i as u16);
        let texture = textures.get(handle).unwrap();
        assert_eq!(texture.info.original_file, format!("t{}.tx.png", i));
    }
    let mut indices: Vec<_> = handles.iter().map(|h| h.index()).collect();
    indices.sort_unstable();
    indices.dedup();
    assert_eq!(indices.len(), 17);
}

// ============================================================================
// Callback and Payload Tests
// ============================================================================

#[derive(Default)]
struct GpuTexture {
    uploaded_bytes: usize,
}

#[test]
fn test_load_and_unload_callbacks() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_texture(temp_dir.path(), "cb.tx", 4, 1, CompressionMode::Lz4);

    let textures: TextureManager<GpuTexture> =
        AssetManager::with_io(Arc::new(FileIo::new(temp_dir.path())));

    let unloaded = Arc::new(AtomicUsize::new(0));
    textures.set_on_load_callback(|texture, gpu| {
        gpu.uploaded_bytes = texture.pixels.len();
    });
    {
        let unloaded = unloaded.clone();
        textures.set_on_unload_callback(move |texture, gpu| {
            assert!(texture.is_some());
            unloaded.fetch_add(gpu.uploaded_bytes, Ordering::SeqCst);
        });
    }

    let handle = textures.load("cb.tx").unwrap();
    assert_eq!(textures.with_user_data(&handle, |gpu| gpu.uploaded_bytes), Some(64));

    drop(handle);
    assert_eq!(unloaded.load(Ordering::SeqCst), 64);
}

#[test]
fn test_callback_replacement() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_texture(temp_dir.path(), "a.tx", 1, 1, CompressionMode::Lz4);

    let textures: TextureManager<u32> =
        AssetManager::with_io(Arc::new(FileIo::new(temp_dir.path())));
    textures.set_on_load_callback(|_, data| *data = 1);
    textures.set_on_load_callback(|_, data| *data = 2);

    let handle = textures.load("a.tx").unwrap();
    assert_eq!(textures.with_user_data(&handle, |d| *d), Some(2));
}

#[test]
fn test_dropping_payload_keeps_user_data() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_texture(temp_dir.path(), "a.tx", 2, 1, CompressionMode::Lz4);
    write_texture(temp_dir.path(), "b.tx", 2, 2, CompressionMode::Lz4);

    let textures: TextureManager<GpuTexture> = AssetManager::with_config(
        Arc::new(FileIo::new(temp_dir.path())),
        AssetManagerConfig::new().keep_payload(false),
    );
    let unloaded_without_payload = Arc::new(AtomicUsize::new(0));
    textures.set_on_load_callback(|texture, gpu| gpu.uploaded_bytes = texture.pixels.len());
    {
        let counter = unloaded_without_payload.clone();
        textures.set_on_unload_callback(move |texture, _| {
            if texture.is_none() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    let a = textures.load("a.tx").unwrap();
    assert!(textures.exists(&a));
    assert!(textures.get(&a).is_none());
    assert_eq!(textures.with_user_data(&a, |gpu| gpu.uploaded_bytes), Some(16));

    let b = textures
        .load_with("b.tx", LoadSettings::new().keep_payload(true))
        .unwrap();
    assert!(textures.get(&b).is_some());

    drop(b);
    assert_eq!(unloaded_without_payload.load(Ordering::SeqCst), 0);
    drop(a);
    assert_eq!(unloaded_without_payload.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Other Payload Kinds
// ============================================================================

#[test]
fn test_material_manager_over_memory_io() {
    let io = Arc::new(MemoryIo::new());
    let material = Material::new("brick", "lit")
        .with_texture("baseColor", "textures/brick.tx")
        .with_transparency(TransparencyMode::Masked);
    pack_material(&material)
        .unwrap()
        .save_to(io.as_ref(), Path::new("brick.mat"))
        .unwrap();

    let materials: MaterialManager = AssetManager::with_io(io);
    let handle = materials.load("brick.mat").unwrap();
    assert_eq!(*materials.get(&handle).unwrap(), material);
}

#[test]
fn test_model_manager_roundtrip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let model = Model {
        mesh_names: vec!["body".into()],
        mesh_materials: vec!["brick.mat".into()],
        mesh_parents: Default::default(),
        transforms: vec![MAT4_IDENTITY],
        meshes: vec![Mesh {
            vertex_buffer: VertexBuffer {
                input_types: vec![VertexDataType::PositionFloat2, VertexDataType::ColorFloat3],
                interleaved: true,
                data: vec![9; 60],
            },
            index_buffer: vec![0, 1, 2],
        }],
    };
    pack_model(&model, CompressionMode::Lz4)
        .unwrap()
        .save(temp_dir.path().join("body.mdl"))
        .unwrap();

    let models: ModelManager = AssetManager::with_base_path(temp_dir.path());
    let handle = models.load("body.mdl").unwrap();
    let loaded = models.get(&handle).unwrap();
    assert_eq!(*loaded, model);
    assert_eq!(loaded.meshes[0].vertex_buffer.vertex_count(), 3);
}

// ============================================================================
// Buffer Contract
// ============================================================================

#[test]
fn test_buffer_total_size_contract() {
    let src = gradient_pixels(16, 16);
    assert_eq!(src.len(), 1024);

    let mut buffer = Buffer::new();
    buffer.copy_from(&src, CompressionMode::Lz4).unwrap();
    assert_eq!(buffer.total_buffer_size(), 1024);

    let mut dst = [0u8; 1024];
    buffer.copy_to(&mut dst).unwrap();
    assert_eq!(&dst[..], &src[..]);
}
