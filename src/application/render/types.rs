use std::{num::NonZeroUsize, time::Duration};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::{
    application::error::{ErrorBody, RenderError},
    config::Settings,
    domain::request::RenderOptionsPatch,
};

/// A finished render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResult {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub processing_time_ms: f64,
    pub trimmed: bool,
    pub font: &'static str,
}

impl RenderResult {
    pub fn to_response(&self) -> RenderResponse {
        RenderResponse {
            image_base64: STANDARD.encode(&self.png),
            width: self.width,
            height: self.height,
            processing_time_ms: self.processing_time_ms,
            trimmed: self.trimmed,
            font: self.font.to_string(),
        }
    }
}

/// JSON payload of a single render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderResponse {
    pub image_base64: String,
    pub width: u32,
    pub height: u32,
    pub processing_time_ms: f64,
    pub trimmed: bool,
    pub font: String,
}

/// A batch of independent renders sharing optional defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    #[serde(default)]
    pub defaults: RenderOptionsPatch,
    pub items: Vec<BatchItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub text: String,
    #[serde(flatten)]
    pub options: RenderOptionsPatch,
}

impl BatchItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: RenderOptionsPatch::default(),
        }
    }

    pub fn with_options(mut self, options: RenderOptionsPatch) -> Self {
        self.options = options;
        self
    }
}

/// Outcome of one batch item. Failures stay in their slot.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchItemResult {
    Rendered(RenderResult),
    Failed(ErrorBody),
}

impl BatchItemResult {
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered(_))
    }

    pub fn to_response(&self) -> BatchItemResponse {
        match self {
            Self::Rendered(result) => BatchItemResponse::Rendered(result.to_response()),
            Self::Failed(error) => BatchItemResponse::Failed {
                error: error.clone(),
            },
        }
    }
}

impl From<Result<RenderResult, RenderError>> for BatchItemResult {
    fn from(outcome: Result<RenderResult, RenderError>) -> Self {
        match outcome {
            Ok(result) => Self::Rendered(result),
            Err(err) => Self::Failed(err.body()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchItemResponse {
    Rendered(RenderResponse),
    Failed { error: ErrorBody },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRenderResponse {
    pub results: Vec<BatchItemResponse>,
}

impl BatchRenderResponse {
    pub fn from_results(results: &[BatchItemResult]) -> Self {
        Self {
            results: results.iter().map(BatchItemResult::to_response).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub ready: bool,
    /// `healthy`, `starting` or `unavailable`.
    pub status: &'static str,
    pub pool_capacity: usize,
    pub pool_in_use: usize,
    pub timestamp: String,
}

/// Runtime knobs of [`super::TategakiRenderer`].
#[derive(Debug, Clone)]
pub struct RendererSettings {
    /// `None` waits for an engine indefinitely.
    pub acquire_timeout: Option<Duration>,
    pub render_timeout: Duration,
    pub batch_max_items: NonZeroUsize,
    pub batch_concurrency: NonZeroUsize,
    pub precreate: bool,
    pub warmup_render: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            acquire_timeout: Some(Duration::from_secs(30)),
            render_timeout: Duration::from_secs(30),
            batch_max_items: NonZeroUsize::new(50).unwrap_or(NonZeroUsize::MIN),
            batch_concurrency: NonZeroUsize::new(2).unwrap_or(NonZeroUsize::MIN),
            precreate: true,
            warmup_render: true,
        }
    }
}

impl From<&Settings> for RendererSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            acquire_timeout: settings.pool.acquire_timeout,
            render_timeout: settings.pool.render_timeout,
            batch_max_items: settings.batch.max_items,
            batch_concurrency: settings.batch.concurrency,
            precreate: settings.pool.precreate,
            warmup_render: settings.pool.warmup_render,
        }
    }
}
