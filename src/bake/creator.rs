//! Scene-level bake orchestration.
//!
//! [`LightmapCreator`] enumerates bakeable objects, drives the direct pass
//! one object at a time (the shared offscreen capture surface admits only a
//! single live capture camera), then runs indirect passes with up to
//! `max_parallel` objects in flight, aggregating triangle progress across all
//! of them. Once every object is done it swaps materials to the baked
//! lightmaps and restores the scene state it altered.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};

use glam::Vec4;
use tracing::{debug, info, warn};

use crate::bake::job::LightmapJob;
use crate::bake::{BakeEvent, BakePhase, JobEvent, DEFAULT_IMAGE_SIZE};
use crate::capture::{CaptureEngine, CaptureImage};
use crate::scene::{ObjectId, Scene};

/// Tunables for a scene bake.
#[derive(Clone, Copy, Debug)]
pub struct BakeConfig {
    /// Width and height of every baked lightmap.
    pub texture_size: u32,
    /// Indirect-phase concurrency cap.
    pub max_parallel: usize,
    /// Write `node<id>_direct.png` / `node<id>_indirect.png` output files.
    pub save_files: bool,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            texture_size: DEFAULT_IMAGE_SIZE,
            max_parallel: 8,
            save_files: true,
        }
    }
}

/// Orchestrator lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CreatorState {
    UnInit,
    DirectLight,
    IndirectBegin,
    IndirectProcessing,
    SwapMaterials,
    RestoreScene,
    Complete,
}

/// Schedules baking across every eligible object of a scene.
pub struct LightmapCreator {
    output_dir: PathBuf,
    config: BakeConfig,
    state: CreatorState,
    initialized: bool,

    /// Every eligible object, in enumeration order.
    eligible: Vec<ObjectId>,
    /// Objects waiting to be admitted into the current phase.
    pending: VecDeque<ObjectId>,
    /// Objects currently holding capture resources.
    in_flight: Vec<ObjectId>,
    jobs: HashMap<ObjectId, LightmapJob>,

    total: u32,
    completed: u32,
    total_triangles: u32,
    completed_triangles: u32,
    objects_completed_indirect: u32,

    original_fog: Option<Vec4>,

    events_tx: Sender<BakeEvent>,
    events_rx: Option<Receiver<BakeEvent>>,
}

impl LightmapCreator {
    pub fn new(output_dir: impl Into<PathBuf>, config: BakeConfig) -> Self {
        let (events_tx, events_rx) = channel();
        Self {
            output_dir: output_dir.into(),
            config,
            state: CreatorState::UnInit,
            initialized: false,
            eligible: Vec::new(),
            pending: VecDeque::new(),
            in_flight: Vec::new(),
            jobs: HashMap::new(),
            total: 0,
            completed: 0,
            total_triangles: 0,
            completed_triangles: 0,
            objects_completed_indirect: 0,
            original_fog: None,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Take the progress event receiver. Yields `Some` only on the first
    /// call; progress is optional and a dropped receiver never stalls a bake.
    pub fn events(&mut self) -> Option<Receiver<BakeEvent>> {
        self.events_rx.take()
    }

    pub fn state(&self) -> CreatorState {
        self.state
    }

    /// Objects currently holding capture resources.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Aggregate indirect-phase triangle counters.
    pub fn triangle_progress(&self) -> (u32, u32) {
        (self.total_triangles, self.completed_triangles)
    }

    /// Current phase of an object's bake job.
    pub fn job_phase(&self, id: ObjectId) -> Option<BakePhase> {
        self.jobs.get(&id).map(LightmapJob::phase)
    }

    /// Baked indirect lightmap of an object, once its pass has finished.
    pub fn baked_image(&self, id: ObjectId) -> Option<&CaptureImage> {
        self.jobs
            .get(&id)
            .and_then(LightmapJob::baked_image)
            .map(|arc| arc.as_ref())
    }

    /// Enumerate bakeable objects and snapshot their model settings. An
    /// object qualifies iff its mesh carries the second UV channel. Returns
    /// the eligible count.
    pub fn init(&mut self, scene: &mut dyn Scene) -> usize {
        self.eligible.clear();
        self.jobs.clear();

        for id in scene.object_ids() {
            let eligible = scene.mesh(id).map(|m| m.has_uv2()).unwrap_or(false);
            if !eligible {
                debug!(object = id, "skipping object without second UV channel");
                continue;
            }

            let mut job = LightmapJob::new(
                id,
                &self.output_dir,
                self.config.texture_size,
                self.config.save_files,
            );
            if job.init_model_settings(scene) {
                self.eligible.push(id);
                self.jobs.insert(id, job);
            }
        }

        self.initialized = true;
        info!(count = self.eligible.len(), "enumerated bakeable objects");
        self.eligible.len()
    }

    /// Start the bake. Requires [`init`](Self::init); otherwise a warned
    /// no-op. With nothing eligible the bake completes immediately.
    pub fn generate(&mut self, scene: &mut dyn Scene) {
        if !self.initialized {
            warn!("generate called before init, ignoring");
            return;
        }

        // fog would leak into every capture; black it out for the bake
        self.original_fog = Some(scene.fog_color());
        scene.set_fog_color(Vec4::new(0.0, 0.0, 0.0, 1.0));

        self.pending = self.eligible.iter().copied().collect();
        self.in_flight.clear();
        self.total = self.eligible.len() as u32;
        self.completed = 0;

        if self.eligible.is_empty() {
            info!("nothing to bake");
            self.restore_scene(scene);
            return;
        }

        self.state = CreatorState::DirectLight;
        info!(total = self.total, "direct light phase started");
    }

    /// Advance the bake by one cooperative tick. Returns true once the bake
    /// is complete.
    pub fn update(&mut self, scene: &mut dyn Scene, engine: &mut dyn CaptureEngine) -> bool {
        match self.state {
            CreatorState::UnInit | CreatorState::Complete => {}
            CreatorState::DirectLight => self.update_direct(scene, engine),
            CreatorState::IndirectBegin => self.setup_indirect(),
            CreatorState::IndirectProcessing => self.update_indirect(scene, engine),
            CreatorState::SwapMaterials => {
                for id in &self.eligible {
                    if let Some(job) = self.jobs.get(id) {
                        job.swap_to_lightmap_technique(scene);
                    }
                }
                self.state = CreatorState::RestoreScene;
            }
            CreatorState::RestoreScene => self.restore_scene(scene),
        }

        self.state == CreatorState::Complete
    }

    /// Direct phase: strictly one object in flight; its single capture
    /// completes within the tick.
    fn update_direct(&mut self, scene: &mut dyn Scene, engine: &mut dyn CaptureEngine) {
        if self.in_flight.is_empty() {
            if let Some(id) = self.pending.pop_front() {
                self.in_flight.push(id);
            }
        }

        let Some(&id) = self.in_flight.first() else {
            return;
        };
        let Some(job) = self.jobs.get_mut(&id) else {
            self.in_flight.clear();
            return;
        };

        let events = job.bake_direct(scene, engine);
        for event in events {
            if event == JobEvent::DirectCompleted {
                self.in_flight.retain(|&o| o != id);
                self.completed += 1;
                self.send(BakeEvent::DirectObjectDone { object: id });
                self.send(BakeEvent::DirectStatus {
                    total: self.total,
                    completed: self.completed,
                });
            }
        }

        if self.completed == self.total {
            // direct captures done; put every model back before the indirect
            // phase re-reads it
            for id in &self.eligible {
                if let Some(job) = self.jobs.get(id) {
                    job.restore_model_settings(scene);
                }
            }
            self.state = CreatorState::IndirectBegin;
            info!("direct light phase complete");
        }
    }

    fn setup_indirect(&mut self) {
        self.total_triangles = 0;
        self.completed_triangles = 0;
        self.objects_completed_indirect = 0;

        self.pending = self.eligible.iter().copied().collect();
        self.in_flight.clear();
        self.admit_indirect_jobs();

        self.state = CreatorState::IndirectProcessing;
        info!(
            parallel = self.config.max_parallel,
            "indirect light phase started"
        );
    }

    fn admit_indirect_jobs(&mut self) {
        // a zero cap would never admit anything
        let cap = self.config.max_parallel.max(1);
        while !self.pending.is_empty() && self.in_flight.len() < cap {
            let Some(id) = self.pending.pop_front() else {
                break;
            };
            if let Some(job) = self.jobs.get_mut(&id) {
                job.begin_indirect();
                self.in_flight.push(id);
            }
        }
    }

    fn update_indirect(&mut self, scene: &mut dyn Scene, engine: &mut dyn CaptureEngine) {
        let active: Vec<ObjectId> = self.in_flight.clone();
        let mut collected: Vec<(ObjectId, JobEvent)> = Vec::new();

        for id in active {
            if let Some(job) = self.jobs.get_mut(&id) {
                for event in job.tick(scene, engine) {
                    collected.push((id, event));
                }
            }
        }

        for (id, event) in collected {
            match event {
                JobEvent::TriangleInfo { count } => {
                    self.total_triangles += count;
                    self.send_indirect_status();
                }
                JobEvent::TriangleCompleted => {
                    self.completed_triangles += 1;
                    self.send_indirect_status();
                }
                JobEvent::IndirectCompleted => {
                    self.objects_completed_indirect += 1;
                    self.in_flight.retain(|&o| o != id);
                    self.send(BakeEvent::IndirectObjectDone { object: id });
                    self.admit_indirect_jobs();
                }
                JobEvent::DirectCompleted => {}
            }
        }

        if self.objects_completed_indirect as usize == self.eligible.len() {
            self.send_indirect_status();
            self.state = CreatorState::SwapMaterials;
            info!("indirect light phase complete");
        }
    }

    fn restore_scene(&mut self, scene: &mut dyn Scene) {
        if let Some(fog) = self.original_fog.take() {
            scene.set_fog_color(fog);
        }
        self.state = CreatorState::Complete;
        self.send(BakeEvent::Finished);
        info!("lightmap bake complete");
    }

    fn send_indirect_status(&self) {
        self.send(BakeEvent::IndirectStatus {
            total_triangles: self.total_triangles,
            completed_triangles: self.completed_triangles,
        });
    }

    fn send(&self, event: BakeEvent) {
        let _ = self.events_tx.send(event);
    }
}
