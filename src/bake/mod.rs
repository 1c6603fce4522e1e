//! Per-object bake jobs and the scene-level orchestrator.
//!
//! - [`worker`] - One-shot background rasterization worker
//! - [`job`] - [`LightmapJob`], the per-object bake state machine
//! - [`creator`] - [`LightmapCreator`], scheduling across the whole scene

use crate::scene::ObjectId;

pub mod creator;
pub mod job;
pub mod worker;

pub use creator::{BakeConfig, CreatorState, LightmapCreator};
pub use job::LightmapJob;
pub use worker::RasterWorker;

/// Default lightmap resolution.
pub const DEFAULT_IMAGE_SIZE: u32 = 512;

/// Lifecycle of one object's indirect bake. Transitions are strictly
/// monotonic; the direct pass completes in a single step and never enters the
/// intermediate phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BakePhase {
    Idle,
    /// Sampling world-space geometry on the scheduling thread.
    CreateGeomData,
    /// Background thread rasterizing the texel list; foreground polls.
    CreatePixelData,
    /// Texel list handed over; capture camera being set up.
    IndirectBegin,
    /// One hemispherical capture per tick.
    IndirectProcessing,
    Done,
}

/// Progress reported over the orchestrator's event channel. Delivery is
/// fire-and-forget; a dropped receiver never stalls the bake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BakeEvent {
    /// Direct-phase progress across the scene.
    DirectStatus { total: u32, completed: u32 },
    /// An object finished its direct capture.
    DirectObjectDone { object: ObjectId },
    /// Indirect-phase triangle progress aggregated across in-flight objects.
    IndirectStatus {
        total_triangles: u32,
        completed_triangles: u32,
    },
    /// An object finished its indirect pass.
    IndirectObjectDone { object: ObjectId },
    /// The whole bake is complete and the scene restored.
    Finished,
}

/// Events a job hands back to the orchestrator from one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobEvent {
    /// Rasterization finished; the object contributes this many triangles.
    TriangleInfo { count: u32 },
    /// The capture loop moved past one triangle.
    TriangleCompleted,
    /// The object's indirect pass is done and its lightmap written.
    IndirectCompleted,
    /// The object's direct capture is done and its image written.
    DirectCompleted,
}
