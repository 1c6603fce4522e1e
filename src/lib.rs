//! # lightbake
//!
//! CPU lightmap baker. Bakes static lighting for 3D scene objects into
//! texture maps in two passes: a direct pass captures a single orthographic
//! view per object, and an indirect pass rasterizes every UV-space texel of
//! an object's surface to a world-space sample point, captures a
//! hemispherical image there, and integrates it into an irradiance value.
//!
//! The renderer, scene graph and driver application are external
//! collaborators accessed through traits; the crate itself owns the
//! triangle→texel rasterizer, the per-object bake state machine and the
//! scene-level scheduler.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (math, errors)
//! - [`geom`] - Mesh data, geometry sampling and the texel rasterizer
//! - [`capture`] - Capture images, camera poses and the renderer contract
//! - [`scene`] - Scene collaborator trait and an in-memory registry
//! - [`bake`] - Per-object bake jobs and the scene orchestrator
//!
//! ## Example
//!
//! ```ignore
//! use lightbake::bake::{BakeConfig, LightmapCreator};
//!
//! let mut creator = LightmapCreator::new("out/", BakeConfig::default());
//! let events = creator.events();
//! creator.init(&mut scene);
//! creator.generate(&mut scene);
//! while !creator.update(&mut scene, &mut engine) {}
//! ```

pub mod util;
pub mod geom;
pub mod capture;
pub mod scene;
pub mod bake;

// Re-export commonly used types
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result};
    pub use crate::geom::{MeshData, SampleTexel, SampledGeometry, SurfaceVertex};
    pub use crate::capture::{CameraPose, CaptureEngine, CaptureImage, CaptureRequest, Projection};
    pub use crate::scene::{Material, ObjectId, Scene, SceneRegistry};
    pub use crate::bake::{BakeConfig, BakeEvent, BakePhase, LightmapCreator, LightmapJob};
}
