//! Mesh data, geometry sampling and the UV-space texel rasterizer.
//!
//! - [`mesh`] - Interleaved vertex buffers, index normalization and world-space
//!   geometry sampling
//! - [`raster`] - Triangle→texel rasterization and lightmap composition

pub mod mesh;
pub mod raster;

pub use mesh::{
    sample_geometry, IndexData, MeshData, SampledGeometry, SurfaceVertex, ELEMENT_COLOR,
    ELEMENT_NORMAL, ELEMENT_POSITION, ELEMENT_TEXCOORD1, ELEMENT_TEXCOORD2,
};
pub use raster::{compose_lightmap, rasterize, triangle_count, SampleTexel};
