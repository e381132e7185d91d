//! Packed asset containers and handle-based asset managers.
//!
//! This crate provides:
//! - [`AssetFile`], a single-file container with a type tag, JSON metadata and
//!   an optionally LZ4-compressed payload
//! - [`AssetManager`], a typed store that deduplicates loads by URI and hands
//!   out counted [`AssetHandle`]s over a generational slot table
//! - Codecs for the built-in payload kinds: [`Texture`], [`Material`], [`Model`]
//!
//! # Example
//!
//! ```ignore
//! use satchel_assets::prelude::*;
//!
//! let textures: TextureManager = AssetManager::with_base_path("assets");
//! let stone = textures.load("textures/stone.tx")?;
//! let info = &textures.get(&stone).unwrap().info;
//! println!("{}x{}", info.width, info.height);
//! ```

pub mod buffer;
pub mod error;
pub mod file;
pub mod handle;
pub mod io;
pub mod manager;
pub mod material;
pub mod model;
pub mod slot;
pub mod texture;

pub use buffer::{Buffer, CompressionMode};
pub use error::{AssetError, AssetResult};
pub use file::{AssetFile, FileType};
pub use handle::{AssetHandle, HandleId};
pub use io::{AssetIo, FileIo, MemoryIo};
pub use manager::{AssetManager, AssetManagerConfig, LoadSettings};
pub use material::{Material, TransparencyMode, pack_material};
pub use model::{MAT4_IDENTITY, Mat4, Mesh, Model, VertexBuffer, VertexDataType, pack_model};
pub use slot::{SlotChecksum, SlotIndex, SlotStorage, SlotTable};
pub use texture::{Texture, TextureFormat, TextureInfo, pack_texture, read_texture_info};

/// A payload type that can be stored in an [`AssetFile`].
pub trait Asset: Send + Sync + Sized + 'static {
    /// Tag a container must carry to decode as this type.
    const FILE_TYPE: FileType;

    /// Human-readable name for logging.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Build the payload from a container whose tag has already been checked.
    fn decode(file: &AssetFile) -> AssetResult<Self>;

    /// Pack the payload into a fresh container.
    fn encode(&self) -> AssetResult<AssetFile>;
}

pub type TextureManager<U = ()> = AssetManager<Texture, U>;
pub type MaterialManager<U = ()> = AssetManager<Material, U>;
pub type ModelManager<U = ()> = AssetManager<Model, U>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Asset, AssetError, AssetFile, AssetHandle, AssetIo, AssetManager, AssetManagerConfig,
        AssetResult, CompressionMode, FileType, HandleId, LoadSettings, Material, MaterialManager,
        Model, ModelManager, Texture, TextureManager,
    };
}
