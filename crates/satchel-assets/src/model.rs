//! Model containers (`MODL`).
//!
//! Mesh names, materials and the parent hierarchy live in the JSON metadata.
//! Vertex and index data are packed into the payload, all little-endian:
//!
//! ```text
//! u64 mesh count
//! per mesh:
//!   u8 attribute count, then one u16 per attribute
//!   u8 interleaved flag
//!   u64 vertex byte count, then the vertex bytes
//!   u64 index count, then one u32 per index
//! ```

use std::collections::BTreeMap;
use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::Asset;
use crate::buffer::{Buffer, CompressionMode};
use crate::error::{AssetError, AssetResult};
use crate::file::{AssetFile, FileType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum VertexDataType {
    PositionFloat2 = 0,
    PositionFloat3 = 1,
    NormalFloat3 = 2,
    ColorFloat2 = 3,
    ColorFloat3 = 4,
    TexCoordFloat2 = 5,
}

impl VertexDataType {
    /// Size of one attribute in bytes.
    pub fn size(&self) -> u32 {
        let floats = match self {
            VertexDataType::PositionFloat2
            | VertexDataType::ColorFloat2
            | VertexDataType::TexCoordFloat2 => 2,
            VertexDataType::PositionFloat3
            | VertexDataType::NormalFloat3
            | VertexDataType::ColorFloat3 => 3,
        };
        floats * std::mem::size_of::<f32>() as u32
    }
}

impl TryFrom<u16> for VertexDataType {
    type Error = AssetError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => VertexDataType::PositionFloat2,
            1 => VertexDataType::PositionFloat3,
            2 => VertexDataType::NormalFloat3,
            3 => VertexDataType::ColorFloat2,
            4 => VertexDataType::ColorFloat3,
            5 => VertexDataType::TexCoordFloat2,
            other => {
                return Err(AssetError::corrupt(format!(
                    "unknown vertex attribute {}",
                    other
                )));
            }
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexBuffer {
    pub input_types: Vec<VertexDataType>,
    pub interleaved: bool,
    pub data: Vec<u8>,
}

impl VertexBuffer {
    /// Bytes per vertex.
    pub fn stride(&self) -> u32 {
        self.input_types.iter().map(VertexDataType::size).sum()
    }

    pub fn vertex_count(&self) -> usize {
        match self.stride() {
            0 => 0,
            stride => self.data.len() / stride as usize,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mesh {
    pub vertex_buffer: VertexBuffer,
    pub index_buffer: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ModelMetadata {
    #[serde(rename = "meshNames", default)]
    mesh_names: Vec<String>,
    #[serde(rename = "meshMaterials", default)]
    mesh_materials: Vec<String>,
    #[serde(rename = "meshParents", default)]
    mesh_parents: BTreeMap<u64, u64>,
    #[serde(rename = "transformMatrix", default)]
    transforms: Vec<Mat4>,
}

/// Column-major 4x4 matrix.
pub type Mat4 = [f32; 16];

#[rustfmt::skip]
pub const MAT4_IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
    0.0, 0.0, 0.0, 1.0,
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub mesh_names: Vec<String>,
    pub mesh_materials: Vec<String>,
    /// Child mesh index to parent mesh index.
    pub mesh_parents: BTreeMap<u64, u64>,
    /// Local transform of each mesh node, indexed like `meshes`.
    pub transforms: Vec<Mat4>,
    pub meshes: Vec<Mesh>,
}

impl Model {
    pub fn parent_of(&self, mesh: u64) -> Option<u64> {
        self.mesh_parents.get(&mesh).copied()
    }

    /// Local transform of `mesh`, identity when none was stored.
    pub fn transform_of(&self, mesh: usize) -> Mat4 {
        self.transforms.get(mesh).copied().unwrap_or(MAT4_IDENTITY)
    }
}

fn write_meshes(meshes: &[Mesh]) -> AssetResult<Vec<u8>> {
    let mut out = Vec::new();
    out.write_u64::<LittleEndian>(meshes.len() as u64)?;
    for mesh in meshes {
        let vb = &mesh.vertex_buffer;
        let attributes = u8::try_from(vb.input_types.len()).map_err(|_| AssetError::Other {
            message: format!("{} vertex attributes is more than 255", vb.input_types.len()),
        })?;
        out.write_u8(attributes)?;
        for ty in &vb.input_types {
            out.write_u16::<LittleEndian>(*ty as u16)?;
        }
        out.write_u8(vb.interleaved as u8)?;
        out.write_u64::<LittleEndian>(vb.data.len() as u64)?;
        out.extend_from_slice(&vb.data);
        out.write_u64::<LittleEndian>(mesh.index_buffer.len() as u64)?;
        for &index in &mesh.index_buffer {
            out.write_u32::<LittleEndian>(index)?;
        }
    }
    Ok(out)
}

fn read_meshes(mut bytes: &[u8]) -> AssetResult<Vec<Mesh>> {
    let count = bytes.read_u64::<LittleEndian>()?;
    let mut meshes = Vec::new();
    for _ in 0..count {
        let attributes = bytes.read_u8()?;
        let input_types = (0..attributes)
            .map(|_| VertexDataType::try_from(bytes.read_u16::<LittleEndian>()?))
            .collect::<AssetResult<Vec<_>>>()?;
        let interleaved = bytes.read_u8()? != 0;

        let vertex_bytes = bytes.read_u64::<LittleEndian>()?;
        if vertex_bytes > bytes.len() as u64 {
            return Err(AssetError::corrupt(format!(
                "mesh claims {} vertex bytes, {} left",
                vertex_bytes,
                bytes.len()
            )));
        }
        let mut data = vec![0u8; vertex_bytes as usize];
        bytes.read_exact(&mut data)?;

        let index_count = bytes.read_u64::<LittleEndian>()?;
        if index_count.saturating_mul(4) > bytes.len() as u64 {
            return Err(AssetError::corrupt(format!(
                "mesh claims {} indices, {} bytes left",
                index_count,
                bytes.len()
            )));
        }
        let index_buffer = (0..index_count)
            .map(|_| bytes.read_u32::<LittleEndian>())
            .collect::<std::io::Result<Vec<_>>>()?;

        meshes.push(Mesh {
            vertex_buffer: VertexBuffer {
                input_types,
                interleaved,
                data,
            },
            index_buffer,
        });
    }

    if !bytes.is_empty() {
        return Err(AssetError::corrupt(format!(
            "{} trailing bytes after mesh data",
            bytes.len()
        )));
    }
    Ok(meshes)
}

/// Pack a model, compressing the mesh data with `compression`.
pub fn pack_model(model: &Model, compression: CompressionMode) -> AssetResult<AssetFile> {
    let mut file = AssetFile::new(FileType::MODEL);
    file.set_metadata(&ModelMetadata {
        mesh_names: model.mesh_names.clone(),
        mesh_materials: model.mesh_materials.clone(),
        mesh_parents: model.mesh_parents.clone(),
        transforms: model.transforms.clone(),
    })?;
    file.blob = Buffer::from_slice(&write_meshes(&model.meshes)?, compression)?;
    Ok(file)
}

impl Asset for Model {
    const FILE_TYPE: FileType = FileType::MODEL;

    fn decode(file: &AssetFile) -> AssetResult<Self> {
        let metadata: ModelMetadata = file.metadata()?;
        let meshes = read_meshes(&file.blob.to_vec()?)?;
        if !metadata.mesh_names.is_empty() && metadata.mesh_names.len() != meshes.len() {
            tracing::warn!(
                names = metadata.mesh_names.len(),
                meshes = meshes.len(),
                "Model mesh names do not match mesh count"
            );
        }
        if !metadata.transforms.is_empty() && metadata.transforms.len() != meshes.len() {
            tracing::warn!(
                transforms = metadata.transforms.len(),
                meshes = meshes.len(),
                "Model transforms do not match mesh count"
            );
        }
        Ok(Self {
            mesh_names: metadata.mesh_names,
            mesh_materials: metadata.mesh_materials,
            mesh_parents: metadata.mesh_parents,
            transforms: metadata.transforms,
            meshes,
        })
    }

    fn encode(&self) -> AssetResult<AssetFile> {
        pack_model(self, CompressionMode::Lz4)
    }
}
