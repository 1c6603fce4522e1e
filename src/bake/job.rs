//! Per-object bake state machine.
//!
//! A [`LightmapJob`] owns one object's bake lifecycle. The direct pass is a
//! single capture-restore-save step. The indirect pass walks the phase
//! machine: geometry sampling on the scheduling thread, texel rasterization
//! on a background worker, then one hemispherical capture per tick until
//! every texel holds an integrated irradiance value and the composed lightmap
//! is written out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use glam::{Vec2, Vec3, Vec4};
use tracing::{info, warn};

use crate::bake::worker::RasterWorker;
use crate::bake::{BakePhase, JobEvent};
use crate::capture::{
    CameraPose, CaptureEngine, CaptureImage, CaptureRequest, Projection,
};
use crate::geom::{compose_lightmap, sample_geometry, triangle_count, SampleTexel};
use crate::scene::{Material, ObjectId, Scene, Technique, VIEW_MASK_CAPTURE, VIEW_MASK_NORMAL};

/// Bake state for one scene object.
pub struct LightmapJob {
    object_id: ObjectId,
    output_dir: PathBuf,
    texture_size: u32,
    save_files: bool,

    phase: BakePhase,
    /// Hemisphere solid angle spread over the capture's pixel count.
    solid_angle: f32,

    worker: Option<RasterWorker>,
    texels: Vec<SampleTexel>,
    current: usize,
    camera: CameraPose,
    started: Option<Instant>,

    original_material: Option<Material>,
    original_mask: u32,
    temp_mask: u32,

    direct_image: Option<CaptureImage>,
    baked_image: Option<Arc<CaptureImage>>,
}

impl LightmapJob {
    pub fn new(
        object_id: ObjectId,
        output_dir: impl Into<PathBuf>,
        texture_size: u32,
        save_files: bool,
    ) -> Self {
        Self {
            object_id,
            output_dir: output_dir.into(),
            texture_size,
            save_files,
            phase: BakePhase::Idle,
            solid_angle: 2.0 * std::f32::consts::PI
                / (texture_size as f32 * texture_size as f32),
            worker: None,
            texels: Vec::new(),
            current: 0,
            camera: CameraPose {
                position: Vec3::ZERO,
                direction: Vec3::NEG_Z,
            },
            started: None,
            original_material: None,
            original_mask: VIEW_MASK_NORMAL,
            temp_mask: VIEW_MASK_NORMAL,
            direct_image: None,
            baked_image: None,
        }
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub fn phase(&self) -> BakePhase {
        self.phase
    }

    /// Texels rasterized so far (fully populated once the indirect capture
    /// loop starts).
    pub fn texels(&self) -> &[SampleTexel] {
        &self.texels
    }

    /// Direct-pass capture, if the direct pass has run.
    pub fn direct_image(&self) -> Option<&CaptureImage> {
        self.direct_image.as_ref()
    }

    /// Composed indirect lightmap, if the indirect pass has finished.
    pub fn baked_image(&self) -> Option<&Arc<CaptureImage>> {
        self.baked_image.as_ref()
    }

    /// Save the object's original material and view mask, then assign the
    /// temporary mask used throughout the bake. Must run before either pass.
    pub fn init_model_settings(&mut self, scene: &mut dyn Scene) -> bool {
        let (Some(material), Some(mask)) = (
            scene.material(self.object_id),
            scene.view_mask(self.object_id),
        ) else {
            return false;
        };

        self.original_material = Some(material);
        self.original_mask = mask;
        self.temp_mask = VIEW_MASK_NORMAL;
        scene.set_view_mask(self.object_id, self.temp_mask);
        true
    }

    /// Restore the material and view mask saved by
    /// [`init_model_settings`](Self::init_model_settings).
    pub fn restore_model_settings(&self, scene: &mut dyn Scene) {
        if let Some(material) = &self.original_material {
            scene.set_material(self.object_id, material.clone());
            scene.set_view_mask(self.object_id, self.original_mask);
        }
    }

    /// Run the direct-light pass: one orthographic capture centered on the
    /// object's bounding box, written to `node<id>_direct.png`. The bake
    /// technique and capture view mask are applied for the duration of the
    /// capture and restored afterwards.
    pub fn bake_direct(
        &mut self,
        scene: &mut dyn Scene,
        engine: &mut dyn CaptureEngine,
    ) -> Vec<JobEvent> {
        // init_model_settings must have run first
        let Some(original) = self.original_material.clone() else {
            warn!(object = self.object_id, "direct bake before model init, skipping");
            return Vec::new();
        };
        let Some(bounds) = scene.world_bounds(self.object_id) else {
            // no bounds means no camera placement; a zero image still has to
            // count as a completion or the object never leaves the queue
            warn!(object = self.object_id, "direct bake without bounds, using zero image");
            return self.complete_direct(CaptureImage::new(self.texture_size, self.texture_size));
        };

        // flat-lit bake technique and capture-layer visibility while the
        // capture camera renders
        let mut bake_material = original.clone();
        bake_material.technique = Technique::DiffuseBake;
        scene.set_material(self.object_id, bake_material);
        scene.set_view_mask(self.object_id, self.temp_mask | VIEW_MASK_CAPTURE);

        let half = bounds.half_size();
        let request = CaptureRequest {
            pose: CameraPose {
                position: bounds.center() + Vec3::Z * half.z,
                direction: Vec3::NEG_Z,
            },
            projection: Projection::orthographic(Vec2::new(
                bounds.size().x,
                bounds.size().y,
            )),
            width: self.texture_size,
            height: self.texture_size,
            view_mask: VIEW_MASK_CAPTURE,
        };

        let image = match engine.request_capture(&*scene, &request) {
            Ok(image) => image,
            Err(err) => {
                warn!(object = self.object_id, %err, "direct capture failed, using zero image");
                CaptureImage::new(self.texture_size, self.texture_size)
            }
        };

        scene.set_material(self.object_id, original);
        scene.set_view_mask(self.object_id, self.temp_mask);

        self.complete_direct(image)
    }

    fn complete_direct(&mut self, image: CaptureImage) -> Vec<JobEvent> {
        if self.save_files {
            let path = self
                .output_dir
                .join(format!("node{}_direct.png", self.object_id));
            if let Err(err) = image.save_png(&path) {
                warn!(object = self.object_id, %err, "failed to write direct lightmap");
            }
        }
        self.direct_image = Some(image);

        vec![JobEvent::DirectCompleted]
    }

    /// Enter the indirect pass; [`tick`](Self::tick) drives it from here.
    pub fn begin_indirect(&mut self) {
        self.phase = BakePhase::CreateGeomData;
    }

    /// Advance the indirect pass by one unit of foreground work. Never
    /// blocks; while the background worker rasterizes, a tick is only a poll.
    pub fn tick(
        &mut self,
        scene: &mut dyn Scene,
        engine: &mut dyn CaptureEngine,
    ) -> Vec<JobEvent> {
        match self.phase {
            BakePhase::Idle | BakePhase::Done => Vec::new(),
            BakePhase::CreateGeomData => self.create_geom_data(scene),
            BakePhase::CreatePixelData => {
                if let Some(texels) = self.worker.as_mut().and_then(RasterWorker::try_take) {
                    self.texels = texels;
                    self.phase = BakePhase::IndirectBegin;
                }
                Vec::new()
            }
            BakePhase::IndirectBegin => self.indirect_begin(),
            BakePhase::IndirectProcessing => self.indirect_step(scene, engine),
        }
    }

    fn create_geom_data(&mut self, scene: &mut dyn Scene) -> Vec<JobEvent> {
        let geometry = match scene.mesh(self.object_id) {
            None => Err(crate::util::Error::MeshUnavailable(self.object_id)),
            Some(mesh) => {
                let world = scene
                    .world_transform(self.object_id)
                    .unwrap_or(glam::Mat4::IDENTITY);
                let rotation = scene
                    .world_rotation(self.object_id)
                    .unwrap_or(glam::Quat::IDENTITY);
                sample_geometry(mesh, world, rotation)
            }
        };

        match geometry {
            Ok(geometry) => {
                self.worker = Some(RasterWorker::spawn(
                    geometry,
                    self.texture_size,
                    self.texture_size,
                ));
                self.phase = BakePhase::CreatePixelData;
                Vec::new()
            }
            Err(err) => {
                // eligibility filtering upstream makes this unreachable in
                // practice; degrade to an empty bake rather than stall
                warn!(object = self.object_id, %err, "geometry sampling failed, empty bake");
                self.finish_indirect();
                vec![JobEvent::TriangleInfo { count: 0 }, JobEvent::IndirectCompleted]
            }
        }
    }

    fn indirect_begin(&mut self) -> Vec<JobEvent> {
        // worker already delivered; joining releases the thread handle
        self.worker = None;
        self.current = 0;

        let count = triangle_count(&self.texels);
        let mut events = vec![JobEvent::TriangleInfo { count }];

        if self.texels.is_empty() {
            self.finish_indirect();
            events.push(JobEvent::IndirectCompleted);
            return events;
        }

        self.camera = Self::texel_pose(&self.texels[0]);
        self.started = Some(Instant::now());
        self.phase = BakePhase::IndirectProcessing;
        events
    }

    fn indirect_step(
        &mut self,
        scene: &mut dyn Scene,
        engine: &mut dyn CaptureEngine,
    ) -> Vec<JobEvent> {
        let request = CaptureRequest {
            pose: self.camera,
            projection: Projection::hemisphere(),
            width: self.texture_size,
            height: self.texture_size,
            view_mask: u32::MAX,
        };

        // a failed capture contributes zero, the bake carries on
        let color = match engine.request_capture(&*scene, &request) {
            Ok(image) => image.sum() * self.solid_angle,
            Err(err) => {
                warn!(object = self.object_id, %err, "indirect capture failed, zero texel");
                Vec4::ZERO
            }
        };
        self.texels[self.current].color = color;

        let prev_triangle = self.texels[self.current].triangle_id;
        self.current += 1;

        let mut events = Vec::new();
        if self.current >= self.texels.len() {
            if let Some(started) = self.started {
                info!(
                    object = self.object_id,
                    "indirect pass completed in {:.2} sec",
                    started.elapsed().as_secs_f32()
                );
            }
            self.finish_indirect();
            events.push(JobEvent::TriangleCompleted);
            events.push(JobEvent::IndirectCompleted);
        } else {
            self.camera = Self::texel_pose(&self.texels[self.current]);
            if self.texels[self.current].triangle_id != prev_triangle {
                events.push(JobEvent::TriangleCompleted);
            }
        }
        events
    }

    fn finish_indirect(&mut self) {
        let image = compose_lightmap(&self.texels, self.texture_size, self.texture_size);

        if self.save_files {
            let path = self
                .output_dir
                .join(format!("node{}_indirect.png", self.object_id));
            if let Err(err) = image.save_png(&path) {
                warn!(object = self.object_id, %err, "failed to write indirect lightmap");
            }
        }

        self.baked_image = Some(Arc::new(image));
        self.phase = BakePhase::Done;
    }

    /// Swap the object's material to the lightmap technique with the baked
    /// image bound as emissive texture.
    pub fn swap_to_lightmap_technique(&self, scene: &mut dyn Scene) {
        let (Some(mut material), Some(baked)) =
            (scene.material(self.object_id), self.baked_image.as_ref())
        else {
            return;
        };

        material.technique = Technique::DiffuseLightmap;
        material.emissive_color = Vec4::new(0.0, 0.0, 0.0, 1.0);
        material.emissive_texture = Some(Arc::clone(baked));
        scene.set_material(self.object_id, material);
    }

    fn texel_pose(texel: &SampleTexel) -> CameraPose {
        CameraPose {
            position: texel.world_position,
            direction: texel.world_normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::mesh::{IndexData, MeshData};
    use crate::scene::SceneRegistry;
    use crate::util::Result;
    use glam::Mat4;

    /// Engine returning a constant color and recording request projections.
    struct ConstEngine {
        color: Vec4,
        fail: bool,
        requests: Vec<CaptureRequest>,
    }

    impl ConstEngine {
        fn new(color: Vec4) -> Self {
            Self {
                color,
                fail: false,
                requests: Vec::new(),
            }
        }
    }

    impl CaptureEngine for ConstEngine {
        fn request_capture(
            &mut self,
            _scene: &dyn Scene,
            request: &CaptureRequest,
        ) -> Result<CaptureImage> {
            self.requests.push(*request);
            if self.fail {
                return Err(crate::util::Error::CaptureFailed("mock failure".into()));
            }
            Ok(CaptureImage::filled(request.width, request.height, self.color))
        }
    }

    fn unit_triangle_scene() -> (SceneRegistry, crate::scene::ObjectId) {
        let mesh = MeshData::from_attributes(
            &[Vec3::ZERO, Vec3::X, Vec3::Y],
            &[Vec3::Z; 3],
            &[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
            IndexData::U16(vec![0, 1, 2]),
        );
        let mut scene = SceneRegistry::new();
        let id = scene.add_object(mesh, Mat4::IDENTITY);
        (scene, id)
    }

    #[test]
    fn test_direct_restores_material_and_mask() {
        let (mut scene, id) = unit_triangle_scene();
        let mut engine = ConstEngine::new(Vec4::ONE);
        let mut job = LightmapJob::new(id, "unused", 4, false);

        assert!(job.init_model_settings(&mut scene));
        let events = job.bake_direct(&mut scene, &mut engine);

        assert_eq!(events, vec![JobEvent::DirectCompleted]);
        assert!(job.direct_image().is_some());
        assert_eq!(scene.view_mask(id), Some(VIEW_MASK_NORMAL));
        assert_eq!(scene.material(id).unwrap().technique, Technique::Diffuse);

        // the capture itself ran with the ortho projection on the capture layer
        let request = &engine.requests[0];
        assert!(matches!(request.projection, Projection::Orthographic { .. }));
        assert_eq!(request.view_mask, VIEW_MASK_CAPTURE);
    }

    /// Scene whose objects report no world bounds.
    struct BoundlessScene(SceneRegistry);

    impl Scene for BoundlessScene {
        fn object_ids(&self) -> Vec<crate::scene::ObjectId> {
            self.0.object_ids()
        }
        fn mesh(&self, id: crate::scene::ObjectId) -> Option<&MeshData> {
            self.0.mesh(id)
        }
        fn world_transform(&self, id: crate::scene::ObjectId) -> Option<Mat4> {
            self.0.world_transform(id)
        }
        fn world_rotation(&self, id: crate::scene::ObjectId) -> Option<glam::Quat> {
            self.0.world_rotation(id)
        }
        fn world_bounds(&self, _id: crate::scene::ObjectId) -> Option<crate::util::math::BBox3f> {
            None
        }
        fn view_mask(&self, id: crate::scene::ObjectId) -> Option<u32> {
            self.0.view_mask(id)
        }
        fn set_view_mask(&mut self, id: crate::scene::ObjectId, mask: u32) {
            self.0.set_view_mask(id, mask);
        }
        fn material(&self, id: crate::scene::ObjectId) -> Option<Material> {
            self.0.material(id)
        }
        fn set_material(&mut self, id: crate::scene::ObjectId, material: Material) {
            self.0.set_material(id, material);
        }
        fn fog_color(&self) -> Vec4 {
            self.0.fog_color()
        }
        fn set_fog_color(&mut self, color: Vec4) {
            self.0.set_fog_color(color);
        }
    }

    #[test]
    fn test_direct_without_bounds_completes_with_zero_image() {
        let (scene, id) = unit_triangle_scene();
        let mut scene = BoundlessScene(scene);
        let mut engine = ConstEngine::new(Vec4::ONE);
        let mut job = LightmapJob::new(id, "unused", 4, false);

        assert!(job.init_model_settings(&mut scene));
        let events = job.bake_direct(&mut scene, &mut engine);

        // no camera to place, so no capture, but the pass still completes
        assert_eq!(events, vec![JobEvent::DirectCompleted]);
        assert!(engine.requests.is_empty());
        let image = job.direct_image().expect("zero image recorded");
        assert_eq!(image.get_pixel(0, 0), Vec4::ZERO);
    }

    #[test]
    fn test_direct_without_init_is_noop() {
        let (mut scene, id) = unit_triangle_scene();
        let mut engine = ConstEngine::new(Vec4::ONE);
        let mut job = LightmapJob::new(id, "unused", 4, false);

        let events = job.bake_direct(&mut scene, &mut engine);
        assert!(events.is_empty());
        assert!(engine.requests.is_empty());
    }

    #[test]
    fn test_indirect_phase_monotonicity() {
        let (mut scene, id) = unit_triangle_scene();
        let mut engine = ConstEngine::new(Vec4::splat(0.5));
        let mut job = LightmapJob::new(id, "unused", 4, false);
        job.init_model_settings(&mut scene);
        job.begin_indirect();

        let mut phases = vec![job.phase()];
        let mut all_events = Vec::new();
        for _ in 0..10_000 {
            if job.phase() == BakePhase::Done {
                break;
            }
            all_events.extend(job.tick(&mut scene, &mut engine));
            phases.push(job.phase());
            std::thread::yield_now();
        }

        assert_eq!(job.phase(), BakePhase::Done);
        for pair in phases.windows(2) {
            assert!(pair[0] <= pair[1], "phase regressed: {:?}", pair);
        }

        // one hemispherical capture per texel
        assert_eq!(engine.requests.len(), job.texels().len());
        assert!(all_events.contains(&JobEvent::IndirectCompleted));
        assert!(job.baked_image().is_some());
    }

    #[test]
    fn test_capture_failure_degrades_to_zero() {
        let (mut scene, id) = unit_triangle_scene();
        let mut engine = ConstEngine::new(Vec4::ONE);
        engine.fail = true;
        let mut job = LightmapJob::new(id, "unused", 4, false);
        job.init_model_settings(&mut scene);
        job.begin_indirect();

        for _ in 0..10_000 {
            if job.phase() == BakePhase::Done {
                break;
            }
            job.tick(&mut scene, &mut engine);
            std::thread::yield_now();
        }

        assert_eq!(job.phase(), BakePhase::Done);
        assert!(job.texels().iter().all(|t| t.color == Vec4::ZERO));
    }

    #[test]
    fn test_integration_scale() {
        // uniform capture of 0.5 integrates to 0.5 * pixels * solid_angle
        let (mut scene, id) = unit_triangle_scene();
        let mut engine = ConstEngine::new(Vec4::splat(0.5));
        let size = 4u32;
        let mut job = LightmapJob::new(id, "unused", size, false);
        job.init_model_settings(&mut scene);
        job.begin_indirect();

        for _ in 0..10_000 {
            if job.phase() == BakePhase::Done {
                break;
            }
            job.tick(&mut scene, &mut engine);
            std::thread::yield_now();
        }

        let expected = 0.5 * (size * size) as f32 * 2.0 * std::f32::consts::PI
            / (size * size) as f32;
        for texel in job.texels() {
            assert!((texel.color.x - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_swap_to_lightmap_technique() {
        let (mut scene, id) = unit_triangle_scene();
        let mut engine = ConstEngine::new(Vec4::ONE);
        let mut job = LightmapJob::new(id, "unused", 4, false);
        job.init_model_settings(&mut scene);
        job.begin_indirect();
        for _ in 0..10_000 {
            if job.phase() == BakePhase::Done {
                break;
            }
            job.tick(&mut scene, &mut engine);
            std::thread::yield_now();
        }

        job.swap_to_lightmap_technique(&mut scene);
        let material = scene.material(id).unwrap();
        assert_eq!(material.technique, Technique::DiffuseLightmap);
        assert!(material.emissive_texture.is_some());
        assert_eq!(material.emissive_color, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }
}
