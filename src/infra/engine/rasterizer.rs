use std::time::{Duration, Instant};

use image::RgbaImage;
use tracing::debug;

use crate::domain::layout::Layout;

use super::{EngineError, pool::PooledHandle};

/// Drives one checked-out engine through load, settle and capture.
#[derive(Debug, Clone, Copy)]
pub struct Rasterizer {
    stable_timeout: Duration,
}

impl Rasterizer {
    pub fn new(stable_timeout: Duration) -> Self {
        Self { stable_timeout }
    }

    pub fn stable_timeout(&self) -> Duration {
        self.stable_timeout
    }

    /// Paint `layout` on the engine behind `pooled` and return the raw frame.
    ///
    /// [`EngineError::Timeout`] means the paint did not settle in time; the
    /// caller should replace the handle after any error.
    pub async fn render(
        &self,
        pooled: &mut PooledHandle,
        layout: &Layout,
    ) -> Result<RgbaImage, EngineError> {
        let started = Instant::now();
        let handle = pooled
            .handle_mut()
            .ok_or_else(|| EngineError::load("render handle was already returned"))?;

        let engine = handle.engine();
        engine.load(layout).await?;
        engine.wait_stable(self.stable_timeout).await?;
        let frame = engine.capture().await?;
        handle.record_render();

        debug!(
            target = "tategaki::rasterizer",
            op = "render",
            handle_id = handle.id(),
            renders = handle.renders(),
            width = frame.width(),
            height = frame.height(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "frame captured"
        );
        Ok(frame)
    }
}
