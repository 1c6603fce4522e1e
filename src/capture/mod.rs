//! Capture images, camera poses and the renderer contract.
//!
//! The actual renderer lives outside this crate. Baking talks to it through
//! [`CaptureEngine`]: one camera pose plus projection parameters in, one
//! rendered RGBA image out. Two projections are used: an orthographic frustum
//! for the direct pass and a wide hemispherical frustum for per-texel
//! indirect captures.

use std::path::Path;

use glam::{Vec2, Vec3, Vec4};

use crate::scene::Scene;
use crate::util::Result;

/// Near clip used by both capture projections.
pub const NEAR_CLIP: f32 = 1.0e-4;
/// Far clip for hemispherical captures.
pub const FAR_CLIP: f32 = 300.0;
/// Field of view of the hemispherical capture frustum, degrees.
pub const HEMISPHERE_FOV_DEG: f32 = 180.0;

/// Camera placement for a capture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    /// Unit view direction.
    pub direction: Vec3,
}

/// Projection parameters for a capture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    /// Orthographic frustum, used for the direct-light pass.
    Orthographic { size: Vec2, near: f32, far: f32 },
    /// Wide-fov perspective frustum approximating a hemisphere, used for
    /// per-texel indirect captures.
    Hemisphere { fov_deg: f32, near: f32, far: f32 },
}

impl Projection {
    /// Hemispherical capture frustum with the standard clip planes.
    pub fn hemisphere() -> Self {
        Projection::Hemisphere {
            fov_deg: HEMISPHERE_FOV_DEG,
            near: NEAR_CLIP,
            far: FAR_CLIP,
        }
    }

    /// Orthographic capture frustum of the given XY extents.
    pub fn orthographic(size: Vec2) -> Self {
        Projection::Orthographic {
            size,
            near: NEAR_CLIP,
            far: FAR_CLIP,
        }
    }
}

/// One capture request handed to the renderer.
#[derive(Clone, Copy, Debug)]
pub struct CaptureRequest {
    pub pose: CameraPose,
    pub projection: Projection,
    /// Output image width in pixels.
    pub width: u32,
    /// Output image height in pixels.
    pub height: u32,
    /// Visibility mask the capture camera renders with; objects whose view
    /// mask shares no bits with it are excluded from the frame.
    pub view_mask: u32,
}

/// Renderer collaborator: renders one frame of the scene from the requested
/// pose and returns the resulting pixel buffer.
pub trait CaptureEngine {
    fn request_capture(&mut self, scene: &dyn Scene, request: &CaptureRequest)
        -> Result<CaptureImage>;
}

/// RGBA image with f32 channels, as returned by captures and written out as
/// the baked lightmap.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureImage {
    width: u32,
    height: u32,
    pixels: Vec<Vec4>,
}

impl CaptureImage {
    /// Create a zero-cleared (transparent black) image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Vec4::ZERO; (width * height) as usize],
        }
    }

    /// Create an image filled with a single color.
    pub fn filled(width: u32, height: u32, color: Vec4) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Vec4) {
        self.pixels[(y * self.width + x) as usize] = color;
    }

    /// Sum of all pixels, alpha included.
    pub fn sum(&self) -> Vec4 {
        self.pixels.iter().copied().sum()
    }

    /// Encode as 8-bit RGBA PNG, channels clamped to `[0, 1]`.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = image::RgbaImage::new(self.width, self.height);
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            let c = self.get_pixel(x, y).clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
            *pixel = image::Rgba([c.x as u8, c.y as u8, c.z as u8, c.w as u8]);
        }
        out.save(path)?;
        Ok(())
    }
}
