use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use glam::{Quat, Vec3};
use gltf::json::Value;

use super::LoadError;
use super::decoder::{CompressedPrimitive, DRACO_EXTENSION, DecodedPrimitive, MeshDecoders};
use crate::scene::{Material, MeshData, NodeKind, SceneNode, Surface, Transform, Vertex3d};

/// Compression extensions whose codecs are not bundled.
const COMPRESSION_EXTENSIONS: [&str; 2] = [DRACO_EXTENSION, "EXT_meshopt_compression"];

/// Decodes a `.glb` or `.gltf` file into a node tree rooted at a group named `name`.
///
/// Compressed primitives go through the matching entry in `decoders`.
pub(super) fn decode(
    bytes: &[u8],
    base: Option<&Path>,
    name: String,
    decoders: &MeshDecoders,
) -> Result<SceneNode, LoadError> {
    let gltf::Gltf { document, blob } = parse(bytes, decoders)?;
    let buffers = gltf::import_buffers(&document, base, blob)
        .map_err(|e| LoadError::Decode(format!("glTF buffers: {e}")))?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| LoadError::Decode("glTF file has no scenes".into()))?;

    let mut decoder = Decoder {
        document: &document,
        buffers: &buffers,
        decoders,
        meshes: HashMap::new(),
    };

    let mut root = SceneNode::group(name);
    for node in scene.nodes() {
        root.children.push(decoder.node(&node)?);
    }

    log::info!(
        "decoded glTF `{}`: {} nodes, {} meshes, {} surfaces",
        root.name,
        document.nodes().len(),
        decoder.meshes.len(),
        root.surface_count()
    );
    Ok(root)
}

fn parse(bytes: &[u8], decoders: &MeshDecoders) -> Result<gltf::Gltf, LoadError> {
    match gltf::Gltf::from_slice(bytes) {
        Ok(parsed) => match undecodable_compression(&parsed.document, decoders) {
            Some(ext) => Err(LoadError::UnsupportedCompression(ext)),
            None => Ok(parsed),
        },
        Err(err) => {
            // Validation rejects required extensions it does not know, codecs included.
            let Ok(unchecked) = gltf::Gltf::from_slice_without_validation(bytes) else {
                return Err(LoadError::Decode(err.to_string()));
            };
            if let Some(ext) = undecodable_compression(&unchecked.document, decoders) {
                return Err(LoadError::UnsupportedCompression(ext));
            }
            if !requires_decoder(&unchecked.document, decoders) {
                return Err(LoadError::Decode(err.to_string()));
            }
            log::debug!("validation skipped for compressed glTF: {err}");
            Ok(unchecked)
        }
    }
}

/// The first required compression extension no registered decoder handles.
///
/// Meshopt compresses buffer views rather than primitives, so it never has a decoder.
fn undecodable_compression(document: &gltf::Document, decoders: &MeshDecoders) -> Option<String> {
    document
        .extensions_required()
        .filter(|ext| COMPRESSION_EXTENSIONS.contains(ext))
        .find(|ext| *ext != DRACO_EXTENSION || !decoders.handles(ext))
        .map(str::to_string)
}

fn requires_decoder(document: &gltf::Document, decoders: &MeshDecoders) -> bool {
    document
        .extensions_required()
        .any(|ext| ext == DRACO_EXTENSION && decoders.handles(ext))
}

struct Decoder<'a> {
    document: &'a gltf::Document,
    buffers: &'a [gltf::buffer::Data],
    decoders: &'a MeshDecoders,
    /// Decoded primitives per glTF mesh index, shared by every node instancing it.
    meshes: HashMap<usize, Vec<Surface>>,
}

impl Decoder<'_> {
    fn node(&mut self, node: &gltf::Node<'_>) -> Result<SceneNode, LoadError> {
        let (translation, rotation, scale) = node.transform().decomposed();
        let transform = Transform {
            position: Vec3::from(translation),
            rotation: Quat::from_array(rotation),
            scale: Vec3::from(scale),
        };

        let kind = match node.mesh() {
            Some(mesh) => NodeKind::Mesh(self.mesh(&mesh)?),
            None if node.camera().is_some() => NodeKind::Other,
            None => NodeKind::Group,
        };

        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node {}", node.index()));

        let mut out = SceneNode::new(name, kind).with_transform(transform);
        for child in node.children() {
            out.children.push(self.node(&child)?);
        }
        Ok(out)
    }

    fn mesh(&mut self, mesh: &gltf::Mesh<'_>) -> Result<Vec<Surface>, LoadError> {
        if let Some(surfaces) = self.meshes.get(&mesh.index()) {
            return Ok(surfaces.clone());
        }

        let mut surfaces = Vec::new();
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "skipping {:?} primitive in mesh `{}`",
                    primitive.mode(),
                    mesh.name().unwrap_or("?")
                );
                continue;
            }

            let geometry = self.primitive(&primitive)?;
            surfaces.push(Surface::new(Arc::new(geometry), material(&primitive.material())));
        }

        self.meshes.insert(mesh.index(), surfaces.clone());
        Ok(surfaces)
    }

    fn primitive(&self, primitive: &gltf::Primitive<'_>) -> Result<MeshData, LoadError> {
        let decoded = match self.compressed(primitive)? {
            Some(decoded) => decoded,
            None => self.read(primitive)?,
        };
        geometry(decoded)
    }

    /// Runs the registered decoder if the primitive carries a codec it handles.
    ///
    /// Primitives that merely list the extension keep their uncompressed fallback.
    fn compressed(&self, primitive: &gltf::Primitive<'_>) -> Result<Option<DecodedPrimitive>, LoadError> {
        let Some(decoder) = self.decoders.get(DRACO_EXTENSION) else {
            return Ok(None);
        };
        let Some(params) = primitive.extension_value(DRACO_EXTENSION) else {
            return Ok(None);
        };

        let view_index = params
            .get("bufferView")
            .and_then(Value::as_u64)
            .ok_or_else(|| LoadError::Decode(format!("{DRACO_EXTENSION} without a bufferView")))?;
        let data = self.view_bytes(view_index as usize)?;
        let attributes = params
            .get("attributes")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(semantic, id)| Some((semantic.clone(), id.as_u64()?)))
                    .collect()
            })
            .unwrap_or_default();

        let request = CompressedPrimitive {
            extension: DRACO_EXTENSION,
            data,
            attributes,
        };
        decoder.decode(&request).map(Some)
    }

    fn view_bytes(&self, index: usize) -> Result<&[u8], LoadError> {
        let view = self
            .document
            .views()
            .nth(index)
            .ok_or_else(|| LoadError::Decode(format!("bufferView {index} does not exist")))?;
        self.buffers
            .get(view.buffer().index())
            .and_then(|buffer| buffer.0.get(view.offset()..view.offset() + view.length()))
            .ok_or_else(|| LoadError::Decode(format!("bufferView {index} is out of bounds")))
    }

    fn read(&self, primitive: &gltf::Primitive<'_>) -> Result<DecodedPrimitive, LoadError> {
        let reader = primitive.reader(|buffer| self.buffers.get(buffer.index()).map(|d| &d.0[..]));

        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .ok_or_else(|| LoadError::Decode("primitive has no positions".into()))?
            .collect();
        let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);
        let uvs: Option<Vec<[f32; 2]>> = reader
            .read_tex_coords(0)
            .map(|coords| coords.into_f32().collect());
        let indices: Vec<u32> = reader
            .read_indices()
            .map(|indices| indices.into_u32().collect())
            .unwrap_or_default();

        Ok(DecodedPrimitive {
            positions,
            normals,
            uvs,
            indices,
        })
    }
}

fn geometry(decoded: DecodedPrimitive) -> Result<MeshData, LoadError> {
    let DecodedPrimitive {
        positions,
        normals,
        uvs,
        mut indices,
    } = decoded;

    if indices.is_empty() {
        indices = (0..positions.len() as u32).collect();
    }

    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
        return Err(LoadError::Decode(format!(
            "index {bad} out of range for {} vertices",
            positions.len()
        )));
    }

    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, &position)| {
            let normal = normals.as_ref().and_then(|n| n.get(i)).copied().unwrap_or_default();
            let uv = uvs.as_ref().and_then(|t| t.get(i)).copied().unwrap_or_default();
            Vertex3d::new(position, normal, uv)
        })
        .collect();

    let mut geometry = MeshData::new(vertices, indices);
    if normals.is_none() {
        geometry.recalculate_normals();
    }
    Ok(geometry)
}

fn material(source: &gltf::Material<'_>) -> Material {
    let pbr = source.pbr_metallic_roughness();
    let [r, g, b, a] = pbr.base_color_factor();
    let blended = source.alpha_mode() == gltf::material::AlphaMode::Blend;

    Material {
        name: source.name().unwrap_or_default().to_string(),
        color: Vec3::new(r, g, b),
        roughness: pbr.roughness_factor(),
        metalness: pbr.metallic_factor(),
        emissive: Vec3::from(source.emissive_factor()),
        emissive_intensity: source.emissive_strength().unwrap_or(1.0),
        opacity: if blended { a } else { 1.0 },
        transparent: blended,
        ior: source.ior().unwrap_or(1.5),
        ..Material::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One triangle, two nodes instancing the same mesh, material "glass".
    fn triangle_gltf(extra: &str) -> String {
        // 3 positions (36 bytes) followed by 3 u16 indices (6 bytes).
        let mut bytes = Vec::new();
        for v in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in v {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
        }
        for i in [0u16, 1, 2] {
            bytes.extend_from_slice(&i.to_le_bytes());
        }
        let uri = format!("data:application/octet-stream;base64,{}", base64(&bytes));

        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  {extra}
  "scene": 0,
  "scenes": [{{ "nodes": [0, 1] }}],
  "nodes": [
    {{ "name": "left", "mesh": 0, "translation": [-1, 0, 0] }},
    {{ "name": "right", "mesh": 0, "translation": [1, 0, 0] }}
  ],
  "materials": [{{
    "name": "glass",
    "alphaMode": "BLEND",
    "pbrMetallicRoughness": {{ "baseColorFactor": [1, 1, 1, 0.5], "roughnessFactor": 0.2 }}
  }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1, "material": 0 }}] }}],
  "buffers": [{{ "byteLength": 42, "uri": "{uri}" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0, 0, 0], "max": [1, 1, 0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#
        )
    }

    fn base64(bytes: &[u8]) -> String {
        const TABLE: &[u8; 64] =
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
        let mut out = String::new();
        for chunk in bytes.chunks(3) {
            let n = chunk.iter().enumerate().fold(0u32, |acc, (i, &b)| acc | (b as u32) << (16 - 8 * i));
            for i in 0..4 {
                if i <= chunk.len() {
                    out.push(TABLE[(n >> (18 - 6 * i) & 63) as usize] as char);
                } else {
                    out.push('=');
                }
            }
        }
        out
    }

    #[test]
    fn decodes_nodes_materials_and_shared_meshes() {
        let json = triangle_gltf("");
        let root = decode(json.as_bytes(), None, "loft".into(), &MeshDecoders::default()).unwrap();

        assert_eq!(root.name, "loft");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.surface_count(), 2);

        let left = root.find("left").unwrap();
        let right = root.find("right").unwrap();
        assert_eq!(left.transform.position, Vec3::new(-1.0, 0.0, 0.0));
        assert!(Arc::ptr_eq(
            &left.surfaces()[0].geometry,
            &right.surfaces()[0].geometry
        ));

        let glass = &left.surfaces()[0].material;
        assert_eq!(glass.name, "glass");
        assert!(glass.transparent);
        assert_eq!(glass.opacity, 0.5);
        assert_eq!(glass.roughness, 0.2);
    }

    #[test]
    fn missing_normals_are_generated() {
        let json = triangle_gltf("");
        let root = decode(json.as_bytes(), None, "loft".into(), &MeshDecoders::default()).unwrap();

        let geometry = &root.find("left").unwrap().surfaces()[0].geometry;
        for v in &geometry.vertices {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn draco_requirement_is_reported() {
        let json = triangle_gltf(
            r#""extensionsUsed": ["KHR_draco_mesh_compression"],
  "extensionsRequired": ["KHR_draco_mesh_compression"],"#,
        );

        assert_eq!(
            decode(json.as_bytes(), None, "loft".into(), &MeshDecoders::default()).unwrap_err(),
            LoadError::UnsupportedCompression("KHR_draco_mesh_compression".into())
        );
    }

    #[test]
    fn meshopt_is_rejected_even_with_a_draco_decoder() {
        let json = triangle_gltf(
            r#""extensionsUsed": ["EXT_meshopt_compression"],
  "extensionsRequired": ["EXT_meshopt_compression"],"#,
        );
        let decoders = MeshDecoders::new().with(
            DRACO_EXTENSION,
            |_: &CompressedPrimitive<'_>| -> Result<DecodedPrimitive, LoadError> {
                Ok(DecodedPrimitive::default())
            },
        );

        assert_eq!(
            decode(json.as_bytes(), None, "loft".into(), &decoders).unwrap_err(),
            LoadError::UnsupportedCompression("EXT_meshopt_compression".into())
        );
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        assert!(matches!(
            decode(b"{ not json", None, "x".into(), &MeshDecoders::default()),
            Err(LoadError::Decode(_))
        ));
    }
}
