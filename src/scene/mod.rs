//! The renderable world: camera, lights and the loaded model.

mod graph;
mod light;
mod material;
mod mesh_data;
mod node;

pub use graph::{PlacedSurface, SceneError, SceneGraph};
pub use light::{
    BULB_RADIUS, LOFT_POINT_LIGHTS, Light, PointLight, ShadowSettings, SpotLight, loft_lights,
    loft_spot,
};
pub use material::{Material, Shading, hex_to_linear, srgb_to_linear};
pub use mesh_data::{MeshData, Vertex3d};
pub use node::{NodeKind, SceneNode, Surface, Transform};
