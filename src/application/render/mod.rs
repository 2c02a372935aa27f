//! Render service: turns validated requests into trimmed, transparent PNGs.
//!
//! Text and layout work is pure and happens before any engine is touched;
//! only rasterization goes through the shared engine pool.

mod batch;
mod encode;
mod renderer;
mod trim;
mod types;

pub use batch::BatchCoordinator;
pub use renderer::TategakiRenderer;
pub use trim::{TrimOutcome, Trimmer};
pub use types::{
    BatchItem, BatchItemResponse, BatchItemResult, BatchJob, BatchRenderResponse, HealthReport,
    RenderResponse, RenderResult, RendererSettings,
};
