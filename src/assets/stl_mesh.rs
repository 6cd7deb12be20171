use std::io::Cursor;
use std::sync::Arc;

use super::LoadError;
use crate::scene::{Material, MeshData, SceneNode, Surface, Vertex3d};

/// Decodes binary or ASCII STL into a single-surface mesh node.
///
/// STL carries no materials; the surface gets a default material named after
/// the file so material rules can still target it.
pub(super) fn decode(bytes: &[u8], name: String) -> Result<SceneNode, LoadError> {
    let stl = stl_io::read_stl(&mut Cursor::new(bytes))
        .map_err(|e| LoadError::Decode(format!("STL parse error: {e}")))?;

    let mut vertices = Vec::with_capacity(stl.faces.len() * 3);
    let mut indices = Vec::with_capacity(stl.faces.len() * 3);

    // Faces are unrolled so every triangle keeps its facet normal.
    for face in &stl.faces {
        let normal: [f32; 3] = face.normal.into();
        for &vertex_idx in &face.vertices {
            let position = stl
                .vertices
                .get(vertex_idx)
                .copied()
                .ok_or_else(|| LoadError::Decode(format!("STL vertex {vertex_idx} out of range")))?;
            indices.push(vertices.len() as u32);
            vertices.push(Vertex3d::new(position.into(), normal, [0.0, 0.0]));
        }
    }

    let mut geometry = MeshData::new(vertices, indices);
    if geometry
        .vertices
        .iter()
        .any(|v| v.normal == [0.0, 0.0, 0.0])
    {
        geometry.recalculate_normals();
    }

    let surface = Surface::new(Arc::new(geometry), Material::named(name.clone()));
    Ok(SceneNode::mesh(name, vec![surface]))
}
