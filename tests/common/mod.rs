#![allow(dead_code)]

use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use tategaki::{
    application::render::{RendererSettings, TategakiRenderer},
    domain::{fonts::FontAssetCache, layout::Layout, request::FontSelector},
    infra::engine::{EngineError, RenderEngine, RenderEngineFactory, RenderEnginePool},
};

/// Text containing this marker fails to paint.
pub const FAIL_MARKER: &str = "失敗";
/// Text containing this marker never settles.
pub const HANG_MARKER: &str = "停止";

#[derive(Default)]
pub struct FakeState {
    pub created: AtomicUsize,
    pub disposed: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub fail_create: AtomicBool,
}

impl FakeState {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Paints every layout cell as an opaque black square.
pub struct FakeEngine {
    state: Arc<FakeState>,
    paint_delay: Duration,
    loaded: Option<Layout>,
    frame: Option<RgbaImage>,
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn load(&mut self, layout: &Layout) -> Result<(), EngineError> {
        self.loaded = Some(layout.clone());
        Ok(())
    }

    async fn wait_stable(&mut self, timeout: Duration) -> Result<(), EngineError> {
        let layout = self
            .loaded
            .take()
            .ok_or_else(|| EngineError::load("nothing loaded"))?;
        let text: String = layout.cells().map(|cell| cell.cluster.text()).collect();

        let now = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(now, Ordering::SeqCst);

        let outcome = if text.contains(HANG_MARKER) {
            tokio::time::sleep(timeout).await;
            Err(EngineError::timeout(timeout))
        } else if text.contains(FAIL_MARKER) {
            Err(EngineError::load("injected paint failure"))
        } else {
            tokio::time::sleep(self.paint_delay).await;
            self.frame = Some(paint_cells(&layout));
            Ok(())
        };

        self.state.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn capture(&mut self) -> Result<RgbaImage, EngineError> {
        self.frame
            .take()
            .ok_or_else(|| EngineError::capture("nothing painted"))
    }

    async fn reset(&mut self) -> Result<(), EngineError> {
        self.loaded = None;
        self.frame = None;
        Ok(())
    }

    async fn dispose(&mut self) {
        self.state.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

fn paint_cells(layout: &Layout) -> RgbaImage {
    let mut image = RgbaImage::new(layout.bounds.width, layout.bounds.height);
    for cell in layout.cells() {
        for y in cell.y..(cell.y + layout.font_size).min(image.height()) {
            for x in cell.x..(cell.x + layout.font_size).min(image.width()) {
                image.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
    }
    image
}

pub struct FakeFactory {
    pub state: Arc<FakeState>,
    pub paint_delay: Duration,
}

impl FakeFactory {
    pub fn new(paint_delay: Duration) -> Self {
        Self {
            state: Arc::new(FakeState::default()),
            paint_delay,
        }
    }
}

#[async_trait]
impl RenderEngineFactory for FakeFactory {
    async fn create(&self) -> Result<Box<dyn RenderEngine>, EngineError> {
        if self.state.fail_create.load(Ordering::SeqCst) {
            return Err(EngineError::create("injected create failure"));
        }
        self.state.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeEngine {
            state: Arc::clone(&self.state),
            paint_delay: self.paint_delay,
            loaded: None,
            frame: None,
        }))
    }
}

/// Font bytes are never parsed by the fake engine.
pub fn fonts() -> Arc<FontAssetCache> {
    Arc::new(FontAssetCache::new(vec![1_u8; 8]).with_face(FontSelector::Gothic, vec![2_u8; 8]))
}

pub fn settings() -> RendererSettings {
    RendererSettings {
        acquire_timeout: Some(Duration::from_secs(5)),
        render_timeout: Duration::from_millis(200),
        ..RendererSettings::default()
    }
}

pub fn renderer(
    capacity: usize,
    paint_delay: Duration,
    settings: RendererSettings,
) -> (TategakiRenderer, Arc<FakeState>) {
    let factory = FakeFactory::new(paint_delay);
    let state = Arc::clone(&factory.state);
    let pool = RenderEnginePool::new(
        NonZeroUsize::new(capacity).expect("non-zero capacity"),
        Arc::new(factory),
    );
    (TategakiRenderer::new(pool, fonts(), settings), state)
}
