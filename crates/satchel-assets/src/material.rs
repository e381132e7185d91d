//! Material containers (`MATX`). Everything lives in the JSON metadata; the
//! payload is empty.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Asset;
use crate::error::AssetResult;
use crate::file::{AssetFile, FileType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum TransparencyMode {
    #[default]
    Opaque,
    Transparent,
    Masked,
}

impl From<String> for TransparencyMode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "transparent" => TransparencyMode::Transparent,
            "masked" => TransparencyMode::Masked,
            _ => TransparencyMode::Opaque,
        }
    }
}

// The misspelled parameter keys are part of the on-disk format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Material {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "baseEffect", default)]
    pub base_effect: String,
    /// Texture slot name to relative container path.
    #[serde(default)]
    pub textures: BTreeMap<String, String>,
    #[serde(rename = "floatParamters", default)]
    pub float_parameters: BTreeMap<String, f32>,
    #[serde(rename = "intParamters", default)]
    pub int_parameters: BTreeMap<String, i32>,
    #[serde(rename = "float3Paramters", default)]
    pub float3_parameters: BTreeMap<String, [f32; 3]>,
    #[serde(rename = "float4Paramters", default)]
    pub float4_parameters: BTreeMap<String, [f32; 4]>,
    #[serde(default)]
    pub transparency: TransparencyMode,
}

impl Material {
    pub fn new(name: impl Into<String>, base_effect: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_effect: base_effect.into(),
            ..Default::default()
        }
    }

    pub fn with_texture(mut self, slot: impl Into<String>, path: impl Into<String>) -> Self {
        self.textures.insert(slot.into(), path.into());
        self
    }

    pub fn with_transparency(mut self, transparency: TransparencyMode) -> Self {
        self.transparency = transparency;
        self
    }
}

pub fn pack_material(material: &Material) -> AssetResult<AssetFile> {
    let mut file = AssetFile::new(FileType::MATERIAL);
    file.set_metadata(material)?;
    Ok(file)
}

impl Asset for Material {
    const FILE_TYPE: FileType = FileType::MATERIAL;

    fn decode(file: &AssetFile) -> AssetResult<Self> {
        if !file.blob.is_empty() {
            tracing::warn!(
                bytes = file.blob.total_buffer_size(),
                "Ignoring payload bytes in a material container"
            );
        }
        file.metadata()
    }

    fn encode(&self) -> AssetResult<AssetFile> {
        pack_material(self)
    }
}
