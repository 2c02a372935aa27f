use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use image::RgbaImage;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::layout::Layout;

use super::{EngineError, RenderEngine, RenderEngineFactory, paint};

/// A paint running on the blocking pool, with the flag that stops it.
#[derive(Debug)]
struct PendingPaint {
    task: JoinHandle<Result<RgbaImage, EngineError>>,
    cancel: Arc<AtomicBool>,
}

/// CPU render engine. Each load paints on the blocking thread pool; the
/// finished frame is held until captured.
///
/// Blocking tasks cannot be aborted, so a paint that outlives its deadline
/// is cancelled cooperatively and awaited before the engine is reused or
/// disposed.
#[derive(Debug, Default)]
pub struct SwashEngine {
    pending: Option<PendingPaint>,
    frame: Option<RgbaImage>,
}

impl SwashEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any in-flight paint and wait for its worker to let go.
    async fn stop_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.store(true, Ordering::Relaxed);
            if let Err(err) = pending.task.await {
                debug!(
                    target = "tategaki::engine",
                    op = "stop_pending",
                    error = %err,
                    "cancelled paint task ended abnormally"
                );
            }
        }
        self.frame = None;
    }
}

#[async_trait]
impl RenderEngine for SwashEngine {
    async fn load(&mut self, layout: &Layout) -> Result<(), EngineError> {
        self.stop_pending().await;
        let layout = layout.clone();
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let task = tokio::task::spawn_blocking(move || paint::paint(&layout, &flag));
        self.pending = Some(PendingPaint { task, cancel });
        Ok(())
    }

    async fn wait_stable(&mut self, timeout: Duration) -> Result<(), EngineError> {
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| EngineError::load("no layout has been loaded"))?;

        match tokio::time::timeout(timeout, &mut pending.task).await {
            Err(_) => {
                // Left in place so reset or dispose can wait for the worker.
                pending.cancel.store(true, Ordering::Relaxed);
                Err(EngineError::timeout(timeout))
            }
            Ok(joined) => {
                self.pending = None;
                match joined {
                    Err(join) => Err(EngineError::load(format!("paint task failed: {join}"))),
                    Ok(painted) => {
                        self.frame = Some(painted?);
                        Ok(())
                    }
                }
            }
        }
    }

    async fn capture(&mut self) -> Result<RgbaImage, EngineError> {
        self.frame
            .take()
            .ok_or_else(|| EngineError::capture("nothing has been painted"))
    }

    async fn reset(&mut self) -> Result<(), EngineError> {
        self.stop_pending().await;
        Ok(())
    }

    async fn dispose(&mut self) {
        self.stop_pending().await;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SwashEngineFactory;

#[async_trait]
impl RenderEngineFactory for SwashEngineFactory {
    async fn create(&self) -> Result<Box<dyn RenderEngine>, EngineError> {
        Ok(Box::new(SwashEngine::new()))
    }
}
