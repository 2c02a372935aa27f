use std::{sync::Arc, time::Instant};

use metrics::{counter, histogram};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::{
    application::error::RenderError,
    domain::{
        fonts::FontAssetCache,
        kinsoku::{KinsokuEngine, KinsokuRules},
        layout::{Layout, LayoutBuilder, LayoutParams, LayoutPreview},
        request::{FontSelector, RenderOptions, RenderRequest},
        segment::{TextSegmenter, balanced_line_length},
    },
    infra::engine::{Rasterizer, RenderEnginePool, WarmupProbe, WarmupSummary},
};

use super::{
    batch::BatchCoordinator,
    encode::encode_png,
    trim::Trimmer,
    types::{BatchItemResult, BatchJob, HealthReport, RenderResult, RendererSettings},
};

pub(crate) const METRIC_RENDER_TOTAL: &str = "tategaki_render_total";
pub(crate) const METRIC_RENDER_MS: &str = "tategaki_render_ms";

const WARMUP_TEXT: &str = "起動確認";

/// Entry point for every render: validation, layout, pooled rasterization,
/// trimming and encoding.
#[derive(Debug, Clone)]
pub struct TategakiRenderer {
    pool: RenderEnginePool,
    fonts: Arc<FontAssetCache>,
    segmenter: TextSegmenter,
    kinsoku: KinsokuEngine,
    layout: LayoutBuilder,
    rasterizer: Rasterizer,
    trimmer: Trimmer,
    batch: BatchCoordinator,
    settings: RendererSettings,
}

impl TategakiRenderer {
    pub fn new(
        pool: RenderEnginePool,
        fonts: Arc<FontAssetCache>,
        settings: RendererSettings,
    ) -> Self {
        Self {
            pool,
            fonts,
            segmenter: TextSegmenter::new(),
            kinsoku: KinsokuEngine::default(),
            layout: LayoutBuilder::new(),
            rasterizer: Rasterizer::new(settings.render_timeout),
            trimmer: Trimmer::new(),
            batch: BatchCoordinator::new(settings.batch_max_items, settings.batch_concurrency),
            settings,
        }
    }

    pub fn with_kinsoku_rules(mut self, rules: KinsokuRules) -> Self {
        self.kinsoku = KinsokuEngine::new(rules);
        self
    }

    pub fn pool(&self) -> &RenderEnginePool {
        &self.pool
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Compute the layout `request` would be painted with.
    pub fn preview_layout(&self, request: &RenderRequest) -> Result<LayoutPreview, RenderError> {
        Ok(self.build_layout(request)?.preview())
    }

    pub async fn render(&self, request: &RenderRequest) -> Result<RenderResult, RenderError> {
        let correlation_id = Uuid::new_v4();
        let span = info_span!("render", correlation_id = %correlation_id);
        let started = Instant::now();

        let outcome = self.render_inner(request, started).instrument(span).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &outcome {
            Ok(result) => {
                counter!(METRIC_RENDER_TOTAL, "result" => "ok").increment(1);
                info!(
                    target = "tategaki::render",
                    op = "render",
                    %correlation_id,
                    result = "ok",
                    font = result.font,
                    width = result.width,
                    height = result.height,
                    trimmed = result.trimmed,
                    chars = request.text().chars().count(),
                    elapsed_ms = elapsed_ms as u64,
                    "text rendered"
                );
            }
            Err(err) => {
                counter!(METRIC_RENDER_TOTAL, "result" => err.kind().metric_label()).increment(1);
                warn!(
                    target = "tategaki::render",
                    op = "render",
                    %correlation_id,
                    result = err.code(),
                    error = %err,
                    elapsed_ms = elapsed_ms as u64,
                    "render failed"
                );
            }
        }
        histogram!(METRIC_RENDER_MS).record(elapsed_ms);
        outcome
    }

    /// Render every item of `job`, at most `min(batch.concurrency, pool
    /// capacity)` at a time. Results come back in item order.
    pub async fn render_batch(&self, job: BatchJob) -> Result<Vec<BatchItemResult>, RenderError> {
        self.batch
            .run(job, self.pool.capacity(), |request| async move {
                self.render(&request).await
            })
            .await
    }

    pub fn health(&self) -> HealthReport {
        let ready = self.pool.is_ready();
        let status = match (ready, self.pool.is_warmed()) {
            (true, _) => "healthy",
            (false, true) => "unavailable",
            (false, false) => "starting",
        };
        HealthReport {
            ready,
            status,
            pool_capacity: self.pool.capacity(),
            pool_in_use: self.pool.in_use(),
            timestamp: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
        }
    }

    /// Pre-create engines and paint a probe on each, as configured. At least
    /// one engine is always built so readiness reflects a usable handle. Never
    /// fails; problems are logged and show up in [`TategakiRenderer::health`].
    pub async fn warm_up(&self) -> WarmupSummary {
        let count = if self.settings.precreate {
            self.pool.capacity()
        } else {
            1
        };

        let probe_layout = if self.settings.warmup_render {
            match self.warmup_layout() {
                Ok(layout) => Some(layout),
                Err(err) => {
                    warn!(
                        target = "tategaki::render",
                        op = "warm_up",
                        result = "layout_failed",
                        error = %err,
                        "warm-up layout could not be built; skipping probe renders"
                    );
                    None
                }
            }
        } else {
            None
        };

        let probe = probe_layout.as_ref().map(|layout| WarmupProbe {
            layout,
            rasterizer: self.rasterizer,
        });
        self.pool.warm_up(count, probe).await
    }

    async fn render_inner(
        &self,
        request: &RenderRequest,
        started: Instant,
    ) -> Result<RenderResult, RenderError> {
        let layout = self.build_layout(request)?;
        let font = layout.font_name();

        let mut pooled = self.pool.acquire(self.settings.acquire_timeout).await?;
        let frame = match self.rasterizer.render(&mut pooled, &layout).await {
            Ok(frame) => {
                self.pool.release(pooled).await;
                frame
            }
            Err(err) => {
                self.pool.replace(pooled).await;
                return Err(err.into());
            }
        };

        let trimmer = self.trimmer;
        let (outcome, png) = tokio::task::spawn_blocking(move || {
            let outcome = trimmer.trim(frame);
            let png = encode_png(&outcome.image)?;
            Ok::<_, RenderError>((outcome, png))
        })
        .await
        .map_err(|err| RenderError::internal(format!("encode task failed: {err}")))??;

        Ok(RenderResult {
            png,
            width: outcome.image.width(),
            height: outcome.image.height(),
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            trimmed: outcome.trimmed,
            font,
        })
    }

    fn build_layout(&self, request: &RenderRequest) -> Result<Layout, RenderError> {
        let options = request.options();
        let limit = match options.max_chars_per_line {
            Some(limit) => Some(limit as usize),
            None if options.use_alternate_layout_mode => {
                Some(balanced_line_length(request.text()))
            }
            None => None,
        };

        let lines = self.segmenter.segment(request.text(), limit)?;
        let annotated = self.kinsoku.apply(&lines);

        let font = self.fonts.resolve(options.font);
        if request.font_fell_back() || font.selector() != options.font {
            warn!(
                target = "tategaki::render",
                op = "resolve_font",
                requested = request.requested_font().unwrap_or(options.font.name()),
                resolved = font.name(),
                "requested font unavailable; using default face"
            );
        }

        Ok(self
            .layout
            .build(annotated, font, &LayoutParams::from(options))?)
    }

    fn warmup_layout(&self) -> Result<Layout, RenderError> {
        let options = RenderOptions {
            font: FontSelector::Default,
            font_size: 16,
            line_height: 1.5,
            letter_spacing: 0.02,
            padding: 8,
            max_chars_per_line: None,
            use_alternate_layout_mode: false,
        };
        let request = RenderRequest::new(WARMUP_TEXT, options)?;
        self.build_layout(&request)
    }
}
