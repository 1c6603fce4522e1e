//! Triangle→texel rasterization in lightmap UV space.
//!
//! For every triangle of a sampled mesh the rasterizer clips the triangle's
//! UV bounding box to the target texture, tests each covered texel center for
//! barycentric containment and emits one world-space sample point per covered
//! texel. The output order is deterministic: triangles in index-buffer order,
//! texels in increasing-x-then-y order within a triangle.
//!
//! No deduplication is performed. A texel sitting on the shared edge of two
//! adjacent triangles may appear twice; composition resolves that with a
//! last-write-wins rule.

use glam::{Vec2, Vec3, Vec4};

use crate::capture::CaptureImage;
use crate::geom::mesh::SampledGeometry;
use crate::util::{bary_inside, barycentric};

/// One rasterized texel: a world-space sample point on the object's surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleTexel {
    /// First-index offset of the owning triangle in the flattened index list.
    pub triangle_id: u32,
    /// Barycentric-interpolated world position.
    pub world_position: Vec3,
    /// Barycentric-interpolated world normal, renormalized.
    pub world_normal: Vec3,
    /// Texel center in normalized UV space.
    pub uv: Vec2,
    /// Integrated irradiance, written exactly once by the capture step.
    pub color: Vec4,
}

/// Rasterize a sampled mesh into the texel list driving the indirect pass.
///
/// Cost is O(triangles x covered texel area); triangles are expected to
/// occupy small UV regions, so no acceleration structure is used.
pub fn rasterize(geometry: &SampledGeometry, width: u32, height: u32) -> Vec<SampleTexel> {
    let size_x = width as i32;
    let size_y = height as i32;
    let inv_x = 1.0 / width as f32;
    let inv_y = 1.0 / height as f32;

    // covered area can slightly exceed the texel count at triangle edges
    let mut texels = Vec::with_capacity((width * height) as usize + (width * height) as usize / 16);

    for tri in 0..geometry.indices.len() / 3 {
        let base = tri * 3;
        let i0 = geometry.indices[base] as usize;
        let i1 = geometry.indices[base + 1] as usize;
        let i2 = geometry.indices[base + 2] as usize;

        let v0 = &geometry.vertices[i0];
        let v1 = &geometry.vertices[i1];
        let v2 = &geometry.vertices[i2];

        let uv_min = v0.uv2.min(v1.uv2).min(v2.uv2);
        let uv_max = v0.uv2.max(v1.uv2).max(v2.uv2);

        // The +-1 pad keeps triangles whose edge lands exactly on a texel
        // center from being dropped by floating-point rounding.
        let px_min_x = ((uv_min.x * size_x as f32).floor() as i32 - 1).max(0);
        let px_max_x = ((uv_max.x * size_x as f32).ceil() as i32 + 1).min(size_x);
        let px_min_y = ((uv_min.y * size_y as f32).floor() as i32 - 1).max(0);
        let px_max_y = ((uv_max.y * size_y as f32).ceil() as i32 + 1).min(size_y);

        for x in px_min_x..px_max_x {
            for y in px_min_y..px_max_y {
                let uv = Vec2::new((x as f32 + 0.5) * inv_x, (y as f32 + 0.5) * inv_y);
                let bary = barycentric(v0.uv2, v1.uv2, v2.uv2, uv);

                if bary_inside(bary) {
                    let position =
                        v0.position * bary.x + v1.position * bary.y + v2.position * bary.z;
                    let normal = (v0.normal * bary.x + v1.normal * bary.y + v2.normal * bary.z)
                        .normalize_or_zero();

                    texels.push(SampleTexel {
                        triangle_id: base as u32,
                        world_position: position,
                        world_normal: normal,
                        uv,
                        color: Vec4::ZERO,
                    });
                }
            }
        }
    }

    texels
}

/// Count the triangles that produced at least one texel: distinct consecutive
/// `triangle_id` runs in rasterization order.
pub fn triangle_count(texels: &[SampleTexel]) -> u32 {
    let mut prev = u32::MAX;
    let mut count = 0;
    for texel in texels {
        if texel.triangle_id != prev {
            prev = texel.triangle_id;
            count += 1;
        }
    }
    count
}

/// Compose the final lightmap: a zero-cleared image with every texel's color
/// written at the pixel containing its UV coordinate. Later entries overwrite
/// earlier ones, so shared-edge texels resolve as last-rasterized-wins.
pub fn compose_lightmap(texels: &[SampleTexel], width: u32, height: u32) -> CaptureImage {
    let mut image = CaptureImage::new(width, height);

    for texel in texels {
        let x = ((texel.uv.x * width as f32).floor() as i64).clamp(0, width as i64 - 1) as u32;
        let y = ((texel.uv.y * height as f32).floor() as i64).clamp(0, height as i64 - 1) as u32;
        image.set_pixel(x, y, texel.color);
    }

    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::mesh::SurfaceVertex;

    /// Flat mesh in the z=0 plane whose world XY coordinates equal its UVs.
    fn flat_geometry(uvs: &[Vec2], indices: &[u32]) -> SampledGeometry {
        SampledGeometry {
            vertices: uvs
                .iter()
                .map(|&uv| SurfaceVertex {
                    position: Vec3::new(uv.x, uv.y, 0.0),
                    normal: Vec3::Z,
                    uv2: uv,
                })
                .collect(),
            indices: indices.to_vec(),
        }
    }

    #[test]
    fn test_single_texel_coverage() {
        // triangle around the center of texel (0,0) at 4x4; only that center
        // is inside (the diagonal passes through it, inclusive)
        let geom = flat_geometry(
            &[
                Vec2::new(0.0, 0.0),
                Vec2::new(0.25, 0.0),
                Vec2::new(0.0, 0.25),
            ],
            &[0, 1, 2],
        );
        let texels = rasterize(&geom, 4, 4);

        assert_eq!(texels.len(), 1);
        assert_eq!(texels[0].uv, Vec2::new(0.125, 0.125));
        assert_eq!(texels[0].triangle_id, 0);

        let bary = barycentric(
            geom.vertices[0].uv2,
            geom.vertices[1].uv2,
            geom.vertices[2].uv2,
            texels[0].uv,
        );
        assert!((bary.x + bary.y + bary.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_unit_square_triangle_4x4() {
        // UVs (0,0),(1,0),(0,1) at 4x4: texel centers with u+v <= 1,
        // i.e. x+y <= 3, in x-outer y-inner order
        let geom = flat_geometry(
            &[
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 1.0),
            ],
            &[0, 1, 2],
        );
        let texels = rasterize(&geom, 4, 4);

        let cells: Vec<(u32, u32)> = texels
            .iter()
            .map(|t| {
                (
                    (t.uv.x * 4.0).floor() as u32,
                    (t.uv.y * 4.0).floor() as u32,
                )
            })
            .collect();
        let expected = vec![
            (0, 0),
            (0, 1),
            (0, 2),
            (0, 3),
            (1, 0),
            (1, 1),
            (1, 2),
            (2, 0),
            (2, 1),
            (3, 0),
        ];
        assert_eq!(cells, expected);
    }

    #[test]
    fn test_interpolated_position_matches_uv() {
        // world XY mirrors UV, so the interpolated position must reproduce
        // the sample coordinate
        let geom = flat_geometry(
            &[
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 1.0),
            ],
            &[0, 1, 2],
        );
        for texel in rasterize(&geom, 8, 8) {
            assert!((texel.world_position.x - texel.uv.x).abs() < 1e-5);
            assert!((texel.world_position.y - texel.uv.y).abs() < 1e-5);
            assert!((texel.world_normal - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn test_determinism() {
        let geom = flat_geometry(
            &[
                Vec2::new(0.05, 0.1),
                Vec2::new(0.9, 0.2),
                Vec2::new(0.3, 0.85),
                Vec2::new(0.95, 0.9),
            ],
            &[0, 1, 2, 1, 3, 2],
        );
        let a = rasterize(&geom, 16, 16);
        let b = rasterize(&geom, 16, 16);
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn test_triangle_ids_and_count() {
        let geom = flat_geometry(
            &[
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
            ],
            &[0, 1, 2, 1, 3, 2],
        );
        let texels = rasterize(&geom, 8, 8);

        assert!(texels.iter().any(|t| t.triangle_id == 0));
        assert!(texels.iter().any(|t| t.triangle_id == 3));
        assert_eq!(triangle_count(&texels), 2);
        assert_eq!(triangle_count(&[]), 0);
    }

    #[test]
    fn test_degenerate_triangle_emits_nothing() {
        let geom = flat_geometry(
            &[Vec2::new(0.5, 0.5), Vec2::new(0.5, 0.5), Vec2::new(0.5, 0.5)],
            &[0, 1, 2],
        );
        assert!(rasterize(&geom, 8, 8).is_empty());
    }

    #[test]
    fn test_compose_last_write_wins() {
        let mut a = SampleTexel {
            triangle_id: 0,
            world_position: Vec3::ZERO,
            world_normal: Vec3::Z,
            uv: Vec2::new(0.125, 0.125),
            color: Vec4::new(1.0, 0.0, 0.0, 1.0),
        };
        let mut b = a;
        b.triangle_id = 3;
        b.color = Vec4::new(0.0, 1.0, 0.0, 1.0);

        let image = compose_lightmap(&[a, b], 4, 4);
        assert_eq!(image.get_pixel(0, 0), Vec4::new(0.0, 1.0, 0.0, 1.0));

        // order flipped, the red entry wins instead
        std::mem::swap(&mut a, &mut b);
        let image = compose_lightmap(&[a, b], 4, 4);
        assert_eq!(image.get_pixel(0, 0), Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_compose_untouched_pixels_are_zero() {
        let image = compose_lightmap(&[], 2, 2);
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(image.get_pixel(x, y), Vec4::ZERO);
            }
        }
    }
}
