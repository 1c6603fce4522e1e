//! Scene collaborator contract.
//!
//! The scene graph itself is external; baking sees it through the [`Scene`]
//! trait: enumerate objects, read mesh data and transforms, flip view masks,
//! swap materials and override scene-wide fog. [`SceneRegistry`] is a plain
//! arena-style implementation of that contract used by tests and drivers.

use std::sync::Arc;

use glam::Vec4;

use crate::capture::CaptureImage;
use crate::geom::MeshData;
use crate::util::math::{BBox3f, Mat4, Quat};

pub mod registry;

pub use registry::SceneRegistry;

/// Identifier of a scene object.
pub type ObjectId = u32;

/// View mask bit for ordinary scene rendering.
pub const VIEW_MASK_NORMAL: u32 = 1 << 0;
/// View mask bit for the capture-only visibility layer: the direct-pass
/// camera renders only objects carrying this bit.
pub const VIEW_MASK_CAPTURE: u32 = 1 << 7;

/// Render technique selector for a material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Technique {
    /// Ordinary textured rendering.
    Diffuse,
    /// Flat-lit rendering used while capturing the direct pass.
    DiffuseBake,
    /// Final technique sampling the baked lightmap as emissive.
    DiffuseLightmap,
}

/// Material state baking reads, clones and replaces.
#[derive(Clone, Debug)]
pub struct Material {
    pub technique: Technique,
    pub emissive_color: Vec4,
    /// Baked lightmap bound after the indirect pass completes.
    pub emissive_texture: Option<Arc<CaptureImage>>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            technique: Technique::Diffuse,
            emissive_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            emissive_texture: None,
        }
    }
}

/// Access to the external scene graph. All per-object queries return `None`
/// for ids the scene does not know.
pub trait Scene {
    /// Ids of every object with a renderable mesh.
    fn object_ids(&self) -> Vec<ObjectId>;

    /// Mesh data of an object.
    fn mesh(&self, id: ObjectId) -> Option<&MeshData>;

    /// Full world transform of an object.
    fn world_transform(&self, id: ObjectId) -> Option<Mat4>;

    /// World rotation of an object, used to transform normals.
    fn world_rotation(&self, id: ObjectId) -> Option<Quat>;

    /// World-space bounding box of an object.
    fn world_bounds(&self, id: ObjectId) -> Option<BBox3f>;

    /// Current view mask of an object.
    fn view_mask(&self, id: ObjectId) -> Option<u32>;

    /// Replace an object's view mask.
    fn set_view_mask(&mut self, id: ObjectId, mask: u32);

    /// Clone an object's material.
    fn material(&self, id: ObjectId) -> Option<Material>;

    /// Replace an object's material.
    fn set_material(&mut self, id: ObjectId, material: Material);

    /// Scene-wide fog color, overridden to black during baking.
    fn fog_color(&self) -> Vec4;

    /// Set the scene-wide fog color.
    fn set_fog_color(&mut self, color: Vec4);
}
