//! Interleaved vertex buffers and world-space geometry sampling.
//!
//! Mesh vertex data arrives the way renderers keep it: one interleaved byte
//! buffer per mesh with an element mask describing which attributes each
//! vertex carries, plus a 16- or 32-bit index buffer. Baking consumes only
//! position, normal and the second UV channel; color and the first UV channel
//! are skipped over. [`sample_geometry`] flattens all of that into plain
//! world-space [`SurfaceVertex`] data owned by the bake job.

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::util::{Error, Result};

/// Vertex carries a position attribute (3 x f32).
pub const ELEMENT_POSITION: u32 = 1 << 0;
/// Vertex carries a normal attribute (3 x f32).
pub const ELEMENT_NORMAL: u32 = 1 << 1;
/// Vertex carries a packed color attribute (u32), not consumed by baking.
pub const ELEMENT_COLOR: u32 = 1 << 2;
/// Vertex carries a first UV channel (2 x f32), not consumed by baking.
pub const ELEMENT_TEXCOORD1: u32 = 1 << 3;
/// Vertex carries a second UV channel (2 x f32), the baking-space unwrap.
pub const ELEMENT_TEXCOORD2: u32 = 1 << 4;

/// Index buffer, normalized to `u32` on access.
#[derive(Clone, Debug)]
pub enum IndexData {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexData {
    /// Number of indices.
    pub fn len(&self) -> usize {
        match self {
            IndexData::U16(v) => v.len(),
            IndexData::U32(v) => v.len(),
        }
    }

    /// True if the buffer holds no indices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index at `i`, widened to `u32`.
    #[inline]
    pub fn get(&self, i: usize) -> u32 {
        match self {
            IndexData::U16(v) => v[i] as u32,
            IndexData::U32(v) => v[i],
        }
    }

    /// Flatten to a `u32` index list.
    pub fn to_u32(&self) -> Vec<u32> {
        match self {
            IndexData::U16(v) => v.iter().map(|&i| i as u32).collect(),
            IndexData::U32(v) => v.clone(),
        }
    }
}

/// Renderable mesh data as handed over by the scene collaborator.
#[derive(Clone, Debug)]
pub struct MeshData {
    /// Interleaved vertex bytes, `vertex_count * vertex_size` long.
    pub vertex_data: Vec<u8>,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Stride of one vertex in bytes.
    pub vertex_size: u32,
    /// `ELEMENT_*` mask describing the interleaved layout.
    pub elements: u32,
    /// Triangle list indices.
    pub indices: IndexData,
}

impl MeshData {
    /// Pack separate position/normal/uv2 attribute arrays into an
    /// interleaved mesh. All three arrays must be the same length.
    pub fn from_attributes(
        positions: &[Vec3],
        normals: &[Vec3],
        uv2: &[Vec2],
        indices: IndexData,
    ) -> Self {
        assert_eq!(positions.len(), normals.len());
        assert_eq!(positions.len(), uv2.len());

        let stride: usize = 3 * 4 + 3 * 4 + 2 * 4;
        let mut data = Vec::with_capacity(positions.len() * stride);
        for i in 0..positions.len() {
            data.extend_from_slice(bytemuck::bytes_of(&positions[i].to_array()));
            data.extend_from_slice(bytemuck::bytes_of(&normals[i].to_array()));
            data.extend_from_slice(bytemuck::bytes_of(&uv2[i].to_array()));
        }

        Self {
            vertex_data: data,
            vertex_count: positions.len() as u32,
            vertex_size: stride as u32,
            elements: ELEMENT_POSITION | ELEMENT_NORMAL | ELEMENT_TEXCOORD2,
            indices,
        }
    }

    /// True if the mesh carries the second UV channel required for baking.
    pub fn has_uv2(&self) -> bool {
        self.elements & ELEMENT_TEXCOORD2 != 0
    }

    /// Object-space vertex positions. Empty if the mesh has no position
    /// attribute; position is always the first interleaved element.
    pub fn positions(&self) -> Vec<Vec3> {
        if self.elements & ELEMENT_POSITION == 0 {
            return Vec::new();
        }
        (0..self.vertex_count as usize)
            .map(|i| read_vec3(&self.vertex_data, i * self.vertex_size as usize))
            .collect()
    }

    /// Number of triangles in the index buffer.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// One mesh vertex resolved to world space. Immutable once sampled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceVertex {
    /// World-space position (full transform applied).
    pub position: Vec3,
    /// World-space normal (rotation only applied).
    pub normal: Vec3,
    /// Lightmap UV from the second texture channel.
    pub uv2: Vec2,
}

/// World-space geometry of one object, owned by its bake job.
#[derive(Clone, Debug, Default)]
pub struct SampledGeometry {
    pub vertices: Vec<SurfaceVertex>,
    /// Flattened triangle list, three indices per triangle.
    pub indices: Vec<u32>,
}

impl SampledGeometry {
    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[inline]
fn read_vec3(data: &[u8], offset: usize) -> Vec3 {
    Vec3::from_array(bytemuck::pod_read_unaligned::<[f32; 3]>(
        &data[offset..offset + 12],
    ))
}

#[inline]
fn read_vec2(data: &[u8], offset: usize) -> Vec2 {
    Vec2::from_array(bytemuck::pod_read_unaligned::<[f32; 2]>(
        &data[offset..offset + 8],
    ))
}

/// Extract world-space surface vertices and a flattened index list from a
/// mesh. Positions are transformed by `world`, normals by `rotation` only.
///
/// Fails with [`Error::MissingUv2`] when the mesh lacks the second UV
/// channel; such objects cannot be baked and are excluded upstream by the
/// orchestrator's eligibility filter.
pub fn sample_geometry(mesh: &MeshData, world: Mat4, rotation: Quat) -> Result<SampledGeometry> {
    if !mesh.has_uv2() {
        return Err(Error::MissingUv2);
    }

    let expected = mesh.vertex_count as usize * mesh.vertex_size as usize;
    if mesh.vertex_data.len() < expected {
        return Err(Error::InvalidVertexData(format!(
            "vertex buffer holds {} bytes, layout requires {}",
            mesh.vertex_data.len(),
            expected
        )));
    }

    let mut vertices = Vec::with_capacity(mesh.vertex_count as usize);

    for i in 0..mesh.vertex_count as usize {
        let base = i * mesh.vertex_size as usize;
        let mut offset = base;
        let mut vertex = SurfaceVertex {
            position: Vec3::ZERO,
            normal: Vec3::ZERO,
            uv2: Vec2::ZERO,
        };

        if mesh.elements & ELEMENT_POSITION != 0 {
            vertex.position = world.transform_point3(read_vec3(&mesh.vertex_data, offset));
            offset += 12;
        }
        if mesh.elements & ELEMENT_NORMAL != 0 {
            vertex.normal = rotation * read_vec3(&mesh.vertex_data, offset);
            offset += 12;
        }
        if mesh.elements & ELEMENT_COLOR != 0 {
            offset += 4;
        }
        if mesh.elements & ELEMENT_TEXCOORD1 != 0 {
            offset += 8;
        }
        if mesh.elements & ELEMENT_TEXCOORD2 != 0 {
            vertex.uv2 = read_vec2(&mesh.vertex_data, offset);
        }

        vertices.push(vertex);
    }

    Ok(SampledGeometry {
        vertices,
        indices: mesh.indices.to_u32(),
    })
}
