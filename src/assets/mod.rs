//! Background loading of the model file into a [`SceneNode`](crate::scene::SceneNode).
//!
//! | Format | Extensions       | Notes |
//! |--------|------------------|-------|
//! | glTF   | `.glb`, `.gltf`  | Triangle primitives, PBR factors, `KHR_materials_ior`, `KHR_materials_emissive_strength` |
//! | STL    | `.stl`           | Binary and ASCII, one surface, no UVs |
//!
//! Draco-compressed primitives are decoded by a [`MeshDecoder`] registered on
//! [`LoaderConfig`]; no codec is bundled. glTF files that *require* Draco
//! without a registered decoder, or that require meshopt, are rejected with
//! [`LoadError::UnsupportedCompression`].

mod decoder;
mod error;
mod gltf_scene;
mod loader;
mod stl_mesh;

pub use decoder::{
    CompressedPrimitive, DRACO_EXTENSION, DecodedPrimitive, MeshDecoder, MeshDecoders,
};
pub use error::LoadError;
pub use loader::{AssetLoader, LoadEvent, LoadProgress, LoadStatus, LoaderConfig, PendingLoad};

use std::path::Path;

use crate::scene::SceneNode;

/// Model formats the loader understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    Gltf,
    Stl,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "glb" | "gltf" => Ok(ModelFormat::Gltf),
            "stl" => Ok(ModelFormat::Stl),
            _ => Err(LoadError::UnknownFormat(ext)),
        }
    }
}

/// Decodes a whole model file that has already been read into memory.
///
/// `path` names the model and resolves external glTF buffers.
pub fn decode_model(
    path: &Path,
    bytes: &[u8],
    decoders: &MeshDecoders,
) -> Result<SceneNode, LoadError> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("model")
        .to_string();

    match ModelFormat::from_path(path)? {
        ModelFormat::Gltf => gltf_scene::decode(bytes, path.parent(), name, decoders),
        ModelFormat::Stl => stl_mesh::decode(bytes, name),
    }
}
