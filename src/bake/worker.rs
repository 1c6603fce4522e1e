//! Background rasterization worker.
//!
//! Rasterizing a full texel map is the slow CPU half of an indirect bake, so
//! it runs on a short-lived thread while the foreground keeps ticking. The
//! result comes back over a one-shot channel: the worker is the only writer,
//! the polling job the only reader, and the handoff happens exactly once.

use std::sync::mpsc::{channel, Receiver};
use std::thread::{self, JoinHandle};

use crate::geom::{rasterize, SampleTexel, SampledGeometry};

/// Handle to one in-flight background rasterization.
pub struct RasterWorker {
    rx: Receiver<Vec<SampleTexel>>,
    handle: Option<JoinHandle<()>>,
}

impl RasterWorker {
    /// Spawn a worker rasterizing `geometry` at the given resolution.
    pub fn spawn(geometry: SampledGeometry, width: u32, height: u32) -> Self {
        let (tx, rx) = channel();

        let handle = thread::spawn(move || {
            let texels = rasterize(&geometry, width, height);
            // receiver may already be gone if the job was dropped
            let _ = tx.send(texels);
        });

        Self {
            rx,
            handle: Some(handle),
        }
    }

    /// Poll for the finished texel list (non-blocking). Returns `Some` at
    /// most once.
    pub fn try_take(&mut self) -> Option<Vec<SampleTexel>> {
        self.rx.try_recv().ok()
    }

    /// Wait for the thread to finish.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RasterWorker {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::mesh::SurfaceVertex;
    use glam::{Vec2, Vec3};

    fn unit_triangle() -> SampledGeometry {
        let uvs = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        SampledGeometry {
            vertices: uvs
                .iter()
                .map(|&uv| SurfaceVertex {
                    position: Vec3::new(uv.x, uv.y, 0.0),
                    normal: Vec3::Z,
                    uv2: uv,
                })
                .collect(),
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn test_worker_matches_foreground_rasterization() {
        let geom = unit_triangle();
        let expected = rasterize(&geom, 4, 4);

        let mut worker = RasterWorker::spawn(geom, 4, 4);
        let texels = loop {
            if let Some(t) = worker.try_take() {
                break t;
            }
            thread::yield_now();
        };
        worker.join();

        assert_eq!(texels, expected);
    }

    #[test]
    fn test_drop_before_take() {
        // dropping the handle mid-flight must not hang or panic
        let worker = RasterWorker::spawn(unit_triangle(), 64, 64);
        drop(worker);
    }
}
