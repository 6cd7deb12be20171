//! CPU-side triangle geometry as decoded from model files.

use glam::Vec3;

/// Interleaved vertex as uploaded to the GPU (32 bytes).
///
/// | Attribute | Format    | Offset | Location |
/// |-----------|-----------|--------|----------|
/// | position  | Float32x3 | 0      | 0        |
/// | normal    | Float32x3 | 12     | 1        |
/// | uv        | Float32x2 | 24     | 2        |
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3d {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex3d {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex3d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &Self::ATTRIBUTES,
    };

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Indexed triangle list in model space.
///
/// Shared between surfaces through `Arc`; the scene pass uploads each distinct
/// `MeshData` once.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex3d>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<Vertex3d>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);

        for v in &self.vertices {
            let p = Vec3::from(v.position);
            min = min.min(p);
            max = max.max(p);
        }

        (min, max)
    }

    pub fn center(&self) -> Vec3 {
        let (min, max) = self.bounds();
        (min + max) * 0.5
    }

    /// Rebuilds smooth normals by area-weighted averaging of face normals.
    pub fn recalculate_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];

        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if a >= normals.len() || b >= normals.len() || c >= normals.len() {
                continue;
            }

            let p0 = Vec3::from(self.vertices[a].position);
            let p1 = Vec3::from(self.vertices[b].position);
            let p2 = Vec3::from(self.vertices[c].position);
            let face = (p1 - p0).cross(p2 - p0);

            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }

        for (vertex, normal) in self.vertices.iter_mut().zip(normals) {
            vertex.normal = normal.normalize_or_zero().into();
        }
    }

    /// UV sphere centered at the origin.
    pub fn sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut vertices = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);
        let mut indices = Vec::with_capacity((segments * rings * 6) as usize);

        for ring in 0..=rings {
            let phi = std::f32::consts::PI * ring as f32 / rings as f32;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for seg in 0..=segments {
                let theta = std::f32::consts::TAU * seg as f32 / segments as f32;
                let normal = Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin());
                vertices.push(Vertex3d::new(
                    (normal * radius).into(),
                    normal.into(),
                    [seg as f32 / segments as f32, ring as f32 / rings as f32],
                ));
            }
        }

        for ring in 0..rings {
            for seg in 0..segments {
                let current = ring * (segments + 1) + seg;
                let next = current + segments + 1;
                indices.extend_from_slice(&[current, next, current + 1]);
                indices.extend_from_slice(&[current + 1, next, next + 1]);
            }
        }

        Self::new(vertices, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(positions: &[[f32; 3]], indices: Vec<u32>) -> MeshData {
        let vertices = positions
            .iter()
            .map(|&p| Vertex3d::new(p, [0.0, 1.0, 0.0], [0.0, 0.0]))
            .collect();
        MeshData::new(vertices, indices)
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let mesh = flat(
            &[[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-1.0, -1.0, -1.0]],
            vec![0, 1, 2],
        );

        let (min, max) = mesh.bounds();
        assert_eq!(min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(max, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(mesh.center(), Vec3::new(0.0, 0.5, 1.0));
    }

    #[test]
    fn recalculated_normals_face_up_for_floor_quad() {
        let mut mesh = flat(
            &[
                [0.0, 0.0, 0.0],
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 1.0],
                [1.0, 0.0, 0.0],
            ],
            vec![0, 1, 2, 2, 3, 0],
        );
        for v in &mut mesh.vertices {
            v.normal = [0.0; 3];
        }

        mesh.recalculate_normals();

        for v in &mesh.vertices {
            assert!((Vec3::from(v.normal) - Vec3::Y).length() < 1e-5);
        }
    }

    #[test]
    fn sphere_vertices_sit_on_radius() {
        let bulb = MeshData::sphere(0.09, 16, 8);

        assert_eq!(bulb.vertices.len(), 17 * 9);
        assert_eq!(bulb.triangle_count(), 16 * 8 * 2);
        for v in &bulb.vertices {
            assert!((Vec3::from(v.position).length() - 0.09).abs() < 1e-5);
        }
    }
}
