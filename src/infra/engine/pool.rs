use std::{
    collections::VecDeque,
    fmt,
    num::NonZeroUsize,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use metrics::{counter, gauge, histogram};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::{domain::layout::Layout, util::lock::mutex_lock};

use super::{EngineError, RenderEngine, RenderEngineFactory, rasterizer::Rasterizer};

pub(crate) const METRIC_POOL_IN_USE: &str = "tategaki_pool_in_use";
pub(crate) const METRIC_POOL_ACQUIRE_TIMEOUT_TOTAL: &str = "tategaki_pool_acquire_timeout_total";
pub(crate) const METRIC_POOL_REPLACE_TOTAL: &str = "tategaki_pool_replace_total";
pub(crate) const METRIC_POOL_ACQUIRE_WAIT_MS: &str = "tategaki_pool_acquire_wait_ms";

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no render handle became available within {waited_ms} ms")]
    Exhausted { waited_ms: u64 },
    #[error("render pool has been closed")]
    Closed,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// One pooled engine plus its bookkeeping.
pub struct RenderHandle {
    id: u64,
    renders: u64,
    engine: Box<dyn RenderEngine>,
    _live: LiveSlot,
}

impl RenderHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Completed renders on this handle since it was created.
    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn engine(&mut self) -> &mut dyn RenderEngine {
        self.engine.as_mut()
    }

    pub(crate) fn record_render(&mut self) {
        self.renders += 1;
    }
}

impl fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderHandle")
            .field("id", &self.id)
            .field("renders", &self.renders)
            .finish_non_exhaustive()
    }
}

/// Counts a handle as live for exactly as long as it exists.
struct LiveSlot(Arc<AtomicUsize>);

impl Drop for LiveSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Holds a semaphore permit and the in-use count for one checkout. The count
/// is decremented before the permit is returned.
struct Lease {
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Lease {
    fn new(pool: Arc<PoolInner>, permit: OwnedSemaphorePermit) -> Self {
        let now = pool.in_use.fetch_add(1, Ordering::SeqCst) + 1;
        gauge!(METRIC_POOL_IN_USE).set(now as f64);
        Self {
            pool,
            _permit: permit,
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let now = self
            .pool
            .in_use
            .fetch_sub(1, Ordering::SeqCst)
            .saturating_sub(1);
        gauge!(METRIC_POOL_IN_USE).set(now as f64);
    }
}

/// A handle checked out of the pool.
///
/// Give it back with [`RenderEnginePool::release`] or
/// [`RenderEnginePool::replace`]. If it is dropped instead (for example
/// because the owning task was cancelled), the engine is replaced on a
/// background task and the slot stays occupied until that finishes.
pub struct PooledHandle {
    handle: Option<RenderHandle>,
    lease: Option<Lease>,
    pool: Arc<PoolInner>,
}

impl PooledHandle {
    pub fn id(&self) -> Option<u64> {
        self.handle.as_ref().map(RenderHandle::id)
    }

    /// `None` only once the handle has been given back.
    pub fn handle_mut(&mut self) -> Option<&mut RenderHandle> {
        self.handle.as_mut()
    }

    fn into_parts(mut self) -> (Option<RenderHandle>, Option<Lease>) {
        (self.handle.take(), self.lease.take())
    }
}

impl fmt::Debug for PooledHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledHandle")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl Drop for PooledHandle {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let lease = self.lease.take();

        warn!(
            target = "tategaki::pool",
            op = "drop",
            handle_id = handle.id,
            result = "cancelled",
            "render handle dropped while checked out; replacing"
        );

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let pool = Arc::clone(&self.pool);
            runtime.spawn(async move {
                pool.replace_handle(handle, "cancelled").await;
                drop(lease);
            });
        }
    }
}

struct PoolInner {
    capacity: usize,
    factory: Arc<dyn RenderEngineFactory>,
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<RenderHandle>>,
    live: Arc<AtomicUsize>,
    in_use: AtomicUsize,
    next_id: AtomicU64,
    warmed: AtomicBool,
}

impl PoolInner {
    fn pop_idle(&self) -> Option<RenderHandle> {
        mutex_lock(&self.idle, "infra::engine::pool", "pop_idle").pop_front()
    }

    fn push_idle(&self, handle: RenderHandle) {
        mutex_lock(&self.idle, "infra::engine::pool", "push_idle").push_back(handle);
    }

    fn idle_len(&self) -> usize {
        mutex_lock(&self.idle, "infra::engine::pool", "idle_len").len()
    }

    async fn create_handle(&self) -> Result<RenderHandle, EngineError> {
        let engine = self.factory.create().await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_add(1, Ordering::SeqCst);
        debug!(
            target = "tategaki::pool",
            op = "create",
            handle_id = id,
            "render handle created"
        );
        Ok(RenderHandle {
            id,
            renders: 0,
            engine,
            _live: LiveSlot(Arc::clone(&self.live)),
        })
    }

    /// Dispose `handle` and park a fresh one in its place. When a fresh
    /// engine cannot be built the slot is left empty and refilled on demand.
    async fn replace_handle(&self, mut handle: RenderHandle, reason: &'static str) {
        counter!(METRIC_POOL_REPLACE_TOTAL, "reason" => reason).increment(1);
        let old_id = handle.id;
        handle.engine.dispose().await;
        drop(handle);

        match self.create_handle().await {
            Ok(fresh) => {
                info!(
                    target = "tategaki::pool",
                    op = "replace",
                    reason,
                    old_handle_id = old_id,
                    new_handle_id = fresh.id,
                    result = "ok",
                    "render handle replaced"
                );
                self.push_idle(fresh);
            }
            Err(err) => {
                warn!(
                    target = "tategaki::pool",
                    op = "replace",
                    reason,
                    old_handle_id = old_id,
                    result = "deferred",
                    error = %err,
                    "replacement engine could not be created; slot will be refilled lazily"
                );
            }
        }
    }
}

/// Throwaway render performed on each handle during warm-up.
#[derive(Debug, Clone, Copy)]
pub struct WarmupProbe<'a> {
    pub layout: &'a Layout,
    pub rasterizer: Rasterizer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupSummary {
    pub handles: usize,
    pub probed: usize,
    pub failed: usize,
}

/// Bounded set of render engines shared by all requests.
#[derive(Clone)]
pub struct RenderEnginePool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for RenderEnginePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderEnginePool")
            .field("capacity", &self.capacity())
            .field("live", &self.live())
            .field("in_use", &self.in_use())
            .finish()
    }
}

impl RenderEnginePool {
    pub fn new(capacity: NonZeroUsize, factory: Arc<dyn RenderEngineFactory>) -> Self {
        let capacity = capacity.get();
        Self {
            inner: Arc::new(PoolInner {
                capacity,
                factory,
                permits: Arc::new(Semaphore::new(capacity)),
                idle: Mutex::new(VecDeque::with_capacity(capacity)),
                live: Arc::new(AtomicUsize::new(0)),
                in_use: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
                warmed: AtomicBool::new(false),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }

    pub fn idle(&self) -> usize {
        self.inner.idle_len()
    }

    /// True once [`RenderEnginePool::warm_up`] has completed.
    pub fn is_warmed(&self) -> bool {
        self.inner.warmed.load(Ordering::SeqCst)
    }

    /// Warmed and holding at least one usable handle.
    pub fn is_ready(&self) -> bool {
        self.is_warmed() && self.live() > 0
    }

    /// Check out a handle, waiting at most `timeout` for a free slot
    /// (forever when `None`). Idle handles are reused before new ones are built.
    pub async fn acquire(&self, timeout: Option<Duration>) -> Result<PooledHandle, PoolError> {
        let started = Instant::now();
        let semaphore = Arc::clone(&self.inner.permits);

        let permit = match timeout {
            Some(limit) => match tokio::time::timeout(limit, semaphore.acquire_owned()).await {
                Ok(permit) => permit,
                Err(_) => {
                    let waited_ms = started.elapsed().as_millis() as u64;
                    counter!(METRIC_POOL_ACQUIRE_TIMEOUT_TOTAL).increment(1);
                    warn!(
                        target = "tategaki::pool",
                        op = "acquire",
                        result = "timeout",
                        waited_ms,
                        capacity = self.inner.capacity,
                        "no render handle became available"
                    );
                    return Err(PoolError::Exhausted { waited_ms });
                }
            },
            None => semaphore.acquire_owned().await,
        }
        .map_err(|_| PoolError::Closed)?;

        histogram!(METRIC_POOL_ACQUIRE_WAIT_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        let lease = Lease::new(Arc::clone(&self.inner), permit);
        let handle = match self.inner.pop_idle() {
            Some(handle) => handle,
            None => self.inner.create_handle().await?,
        };

        debug!(
            target = "tategaki::pool",
            op = "acquire",
            handle_id = handle.id,
            result = "ok",
            "render handle checked out"
        );

        Ok(PooledHandle {
            handle: Some(handle),
            lease: Some(lease),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Reset the engine and return it to the idle queue. A failed reset
    /// replaces the engine instead.
    pub async fn release(&self, pooled: PooledHandle) {
        let (Some(mut handle), lease) = pooled.into_parts() else {
            return;
        };

        match handle.engine.reset().await {
            Ok(()) => self.inner.push_idle(handle),
            Err(err) => {
                warn!(
                    target = "tategaki::pool",
                    op = "release",
                    handle_id = handle.id,
                    result = "reset_failed",
                    error = %err,
                    "engine reset failed; replacing"
                );
                self.inner.replace_handle(handle, "reset_failed").await;
            }
        }
        drop(lease);
    }

    /// Dispose the engine behind `pooled` and build a fresh one in its slot.
    pub async fn replace(&self, pooled: PooledHandle) {
        let (Some(handle), lease) = pooled.into_parts() else {
            return;
        };
        self.inner.replace_handle(handle, "render_failed").await;
        drop(lease);
    }

    /// Pre-create up to `min(count, capacity)` handles, optionally running
    /// `probe` once on each, then mark the pool ready. Failures are counted,
    /// never returned.
    pub async fn warm_up(&self, count: usize, probe: Option<WarmupProbe<'_>>) -> WarmupSummary {
        let started = Instant::now();
        let target = count.min(self.inner.capacity);
        let mut summary = WarmupSummary::default();

        let mut held = Vec::with_capacity(target);
        for _ in 0..target {
            match self.acquire(None).await {
                Ok(pooled) => held.push(pooled),
                Err(err) => {
                    summary.failed += 1;
                    warn!(
                        target = "tategaki::pool",
                        op = "warm_up",
                        result = "create_failed",
                        error = %err,
                        "render handle could not be pre-created"
                    );
                    break;
                }
            }
        }
        summary.handles = held.len();

        for mut pooled in held {
            let Some(probe) = probe else {
                self.release(pooled).await;
                continue;
            };
            match probe.rasterizer.render(&mut pooled, probe.layout).await {
                Ok(_) => {
                    summary.probed += 1;
                    self.release(pooled).await;
                }
                Err(err) => {
                    summary.failed += 1;
                    warn!(
                        target = "tategaki::pool",
                        op = "warm_up",
                        handle_id = pooled.id(),
                        result = "probe_failed",
                        error = %err,
                        "warm-up render failed"
                    );
                    self.replace(pooled).await;
                }
            }
        }

        self.inner.warmed.store(true, Ordering::SeqCst);
        info!(
            target = "tategaki::pool",
            op = "warm_up",
            handles = summary.handles,
            probed = summary.probed,
            failed = summary.failed,
            live = self.live(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "render pool warmed"
        );
        summary
    }
}
