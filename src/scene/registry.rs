//! Arena-style in-memory scene.
//!
//! Objects are plain records keyed by id in insertion order; no reference
//! counting, no live component system. Used as the scene backing for tests
//! and simple offline drivers.

use glam::Vec4;

use crate::geom::MeshData;
use crate::scene::{Material, ObjectId, Scene, VIEW_MASK_NORMAL};
use crate::util::math::{BBox3f, Mat4, Quat};

struct SceneObject {
    id: ObjectId,
    mesh: MeshData,
    transform: Mat4,
    rotation: Quat,
    bounds: BBox3f,
    view_mask: u32,
    material: Material,
}

/// In-memory [`Scene`] implementation.
pub struct SceneRegistry {
    objects: Vec<SceneObject>,
    next_id: ObjectId,
    fog_color: Vec4,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            next_id: 1,
            fog_color: Vec4::new(0.5, 0.5, 0.7, 1.0),
        }
    }

    /// Add an object with the given mesh and world transform. Rotation is
    /// extracted from the transform; bounds are computed from the transformed
    /// vertex positions.
    pub fn add_object(&mut self, mesh: MeshData, transform: Mat4) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;

        let (_, rotation, _) = transform.to_scale_rotation_translation();
        let bounds = BBox3f::from_points(
            mesh.positions()
                .into_iter()
                .map(|p| transform.transform_point3(p)),
        );

        self.objects.push(SceneObject {
            id,
            mesh,
            transform,
            rotation,
            bounds,
            view_mask: VIEW_MASK_NORMAL,
            material: Material::default(),
        });
        id
    }

    fn find(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    fn find_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }
}

impl Default for SceneRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for SceneRegistry {
    fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.iter().map(|o| o.id).collect()
    }

    fn mesh(&self, id: ObjectId) -> Option<&MeshData> {
        self.find(id).map(|o| &o.mesh)
    }

    fn world_transform(&self, id: ObjectId) -> Option<Mat4> {
        self.find(id).map(|o| o.transform)
    }

    fn world_rotation(&self, id: ObjectId) -> Option<Quat> {
        self.find(id).map(|o| o.rotation)
    }

    fn world_bounds(&self, id: ObjectId) -> Option<BBox3f> {
        self.find(id).map(|o| o.bounds)
    }

    fn view_mask(&self, id: ObjectId) -> Option<u32> {
        self.find(id).map(|o| o.view_mask)
    }

    fn set_view_mask(&mut self, id: ObjectId, mask: u32) {
        if let Some(o) = self.find_mut(id) {
            o.view_mask = mask;
        }
    }

    fn material(&self, id: ObjectId) -> Option<Material> {
        self.find(id).map(|o| o.material.clone())
    }

    fn set_material(&mut self, id: ObjectId, material: Material) {
        if let Some(o) = self.find_mut(id) {
            o.material = material;
        }
    }

    fn fog_color(&self) -> Vec4 {
        self.fog_color
    }

    fn set_fog_color(&mut self, color: Vec4) {
        self.fog_color = color;
    }
}
