//! Render engines and the pool that shares them between requests.
//!
//! A [`RenderEngine`] is stateful and expensive to create. Requests never
//! talk to an engine directly: they check one out of the
//! [`RenderEnginePool`], drive it through the [`Rasterizer`] and hand it back.

use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use thiserror::Error;

use crate::domain::layout::Layout;

mod paint;
mod pool;
mod rasterizer;
mod swash_engine;

pub use pool::{PoolError, PooledHandle, RenderEnginePool, RenderHandle, WarmupProbe, WarmupSummary};
pub use rasterizer::Rasterizer;
pub use swash_engine::{SwashEngine, SwashEngineFactory};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("render engine could not be created: {message}")]
    Create { message: String },
    #[error("layout could not be loaded: {message}")]
    Load { message: String },
    #[error("paint did not settle within {waited_ms} ms")]
    Timeout { waited_ms: u64 },
    #[error("paint was cancelled")]
    Cancelled,
    #[error("frame capture failed: {message}")]
    Capture { message: String },
    #[error("engine reset failed: {message}")]
    Reset { message: String },
}

impl EngineError {
    pub fn create(message: impl Into<String>) -> Self {
        Self::Create {
            message: message.into(),
        }
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }

    pub fn timeout(waited: Duration) -> Self {
        Self::Timeout {
            waited_ms: waited.as_millis() as u64,
        }
    }

    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture {
            message: message.into(),
        }
    }

    pub fn reset(message: impl Into<String>) -> Self {
        Self::Reset {
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// One long-lived, stateful renderer. Used by exactly one job at a time.
#[async_trait]
pub trait RenderEngine: Send {
    /// Start painting `layout`. Painting may continue in the background.
    async fn load(&mut self, layout: &Layout) -> Result<(), EngineError>;

    /// Wait until the loaded layout has been fully painted.
    async fn wait_stable(&mut self, timeout: Duration) -> Result<(), EngineError>;

    /// Take the painted frame.
    async fn capture(&mut self) -> Result<RgbaImage, EngineError>;

    /// Drop any per-render state so the engine can be reused.
    async fn reset(&mut self) -> Result<(), EngineError>;

    async fn dispose(&mut self);
}

#[async_trait]
pub trait RenderEngineFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn RenderEngine>, EngineError>;
}
