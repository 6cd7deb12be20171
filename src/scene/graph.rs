use std::sync::Arc;

use glam::Mat4;
use thiserror::Error;

use crate::camera::PerspectiveCamera;
use crate::surface::ViewportSize;

use super::light::{BULB_RADIUS, Light, loft_lights};
use super::material::Material;
use super::mesh_data::MeshData;
use super::node::{SceneNode, Surface, Transform};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("a model (`{existing}`) is already attached")]
    ModelAlreadyAttached { existing: String },
}

/// A surface with its resolved world matrix.
#[derive(Clone, Copy, Debug)]
pub struct PlacedSurface<'a> {
    pub world: Mat4,
    pub surface: &'a Surface,
}

/// The camera, the fixed lights and the model slot.
///
/// Lights are created with the graph and live as long as it does. The model
/// slot is filled exactly once.
pub struct SceneGraph {
    camera: PerspectiveCamera,
    root: SceneNode,
    model: Option<usize>,
    revision: u64,
}

impl SceneGraph {
    pub fn new(camera: PerspectiveCamera, lights: Vec<Light>) -> Self {
        let bulb = Arc::new(MeshData::sphere(BULB_RADIUS, 32, 16));
        let mut root = SceneNode::group("scene");

        for (index, light) in lights.into_iter().enumerate() {
            let mut node = SceneNode::light(format!("light {index}"), light);
            if let Light::Point(point) = light {
                let material = Material::unlit("bulb", point.color);
                node = node.with_child(
                    SceneNode::mesh("bulb", vec![Surface::new(bulb.clone(), material)])
                        .with_transform(Transform::from_position(point.position)),
                );
            }
            root.children.push(node);
        }

        Self {
            camera,
            root,
            model: None,
            revision: 0,
        }
    }

    /// The loft scene before its model arrives.
    pub fn loft(viewport: ViewportSize) -> Self {
        Self::new(PerspectiveCamera::for_viewport(viewport), loft_lights())
    }

    /// Places the loaded model under the root. Fails if one is already attached.
    pub fn attach_model(&mut self, model: SceneNode) -> Result<(), SceneError> {
        if let Some(existing) = self.model() {
            return Err(SceneError::ModelAlreadyAttached {
                existing: existing.name.clone(),
            });
        }

        log::info!(
            "attaching model `{}` ({} surfaces)",
            model.name,
            model.surface_count()
        );
        self.model = Some(self.root.children.len());
        self.root.children.push(model);
        self.revision += 1;
        Ok(())
    }

    pub fn model(&self) -> Option<&SceneNode> {
        self.model.and_then(|index| self.root.children.get(index))
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut PerspectiveCamera {
        &mut self.camera
    }

    /// Bumped whenever renderable content changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn surfaces(&self) -> Vec<PlacedSurface<'_>> {
        let mut placed = Vec::new();
        self.root.visit_surfaces(Mat4::IDENTITY, &mut |world, surface| {
            placed.push(PlacedSurface { world, surface });
        });
        placed
    }

    pub fn lights(&self) -> Vec<Light> {
        let mut lights = Vec::new();
        self.root.visit_lights(&mut |light| lights.push(*light));
        lights
    }
}
