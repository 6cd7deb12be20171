use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use super::light::Light;
use super::material::Material;
use super::mesh_data::MeshData;

/// Position, rotation and scale relative to the parent node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// One renderable primitive: geometry plus its own material.
#[derive(Clone, Debug)]
pub struct Surface {
    pub geometry: Arc<MeshData>,
    pub material: Material,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Surface {
    pub fn new(geometry: Arc<MeshData>, material: Material) -> Self {
        Self {
            geometry,
            material,
            cast_shadow: false,
            receive_shadow: false,
        }
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Mesh(Vec<Surface>),
    Light(Light),
    Group,
    /// Anything the viewer does not render (cameras, empties from the file).
    Other,
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            kind,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn mesh(name: impl Into<String>, surfaces: Vec<Surface>) -> Self {
        Self::new(name, NodeKind::Mesh(surfaces))
    }

    pub fn light(name: impl Into<String>, light: Light) -> Self {
        Self::new(name, NodeKind::Light(light))
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn surfaces(&self) -> &[Surface] {
        match &self.kind {
            NodeKind::Mesh(surfaces) => surfaces,
            _ => &[],
        }
    }

    /// Visits every surface in this subtree, depth first.
    pub fn visit_surfaces_mut(&mut self, visit: &mut impl FnMut(&mut Surface)) {
        if let NodeKind::Mesh(surfaces) = &mut self.kind {
            surfaces.iter_mut().for_each(&mut *visit);
        }
        for child in &mut self.children {
            child.visit_surfaces_mut(visit);
        }
    }

    /// Visits every surface with its world matrix.
    pub fn visit_surfaces<'a>(&'a self, parent: Mat4, visit: &mut impl FnMut(Mat4, &'a Surface)) {
        let world = parent * self.transform.matrix();
        for surface in self.surfaces() {
            visit(world, surface);
        }
        for child in &self.children {
            child.visit_surfaces(world, visit);
        }
    }

    pub fn visit_lights(&self, visit: &mut impl FnMut(&Light)) {
        if let NodeKind::Light(light) = &self.kind {
            visit(light);
        }
        for child in &self.children {
            child.visit_lights(visit);
        }
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces().len()
            + self
                .children
                .iter()
                .map(SceneNode::surface_count)
                .sum::<usize>()
    }

    /// First node with the given name, depth first.
    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }
}
