use std::{future::Future, num::NonZeroUsize, time::Instant};

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::{application::error::RenderError, domain::request::RenderRequest};

use super::types::{BatchItemResult, BatchJob, RenderResult};

/// Fans the items of a [`BatchJob`] out with bounded concurrency and
/// collects their results in input order.
#[derive(Debug, Clone, Copy)]
pub struct BatchCoordinator {
    max_items: NonZeroUsize,
    concurrency_limit: NonZeroUsize,
}

impl BatchCoordinator {
    pub fn new(max_items: NonZeroUsize, concurrency_limit: NonZeroUsize) -> Self {
        Self {
            max_items,
            concurrency_limit,
        }
    }

    pub fn max_items(&self) -> usize {
        self.max_items.get()
    }

    /// Items in flight at once: never more than the pool can serve.
    pub fn concurrency(&self, pool_capacity: usize) -> usize {
        self.concurrency_limit.get().min(pool_capacity).max(1)
    }

    pub fn validate(&self, job: &BatchJob) -> Result<(), RenderError> {
        if job.items.is_empty() {
            return Err(RenderError::invalid_input("batch must contain at least one item"));
        }
        if job.items.len() > self.max_items.get() {
            return Err(RenderError::invalid_input(format!(
                "batch has {} items; at most {} are allowed",
                job.items.len(),
                self.max_items
            )));
        }
        Ok(())
    }

    /// Run every item through `render`. Item options override the batch
    /// defaults field by field; an item whose request is invalid fails in
    /// its own slot without reaching `render`.
    pub async fn run<F, Fut>(
        &self,
        job: BatchJob,
        pool_capacity: usize,
        render: F,
    ) -> Result<Vec<BatchItemResult>, RenderError>
    where
        F: Fn(RenderRequest) -> Fut,
        Fut: Future<Output = Result<RenderResult, RenderError>>,
    {
        self.validate(&job)?;

        let started = Instant::now();
        let concurrency = self.concurrency(pool_capacity);
        let total = job.items.len();
        let BatchJob { defaults, items } = job;

        let requests: Vec<_> = items
            .into_iter()
            .map(|item| RenderRequest::from_patch(item.text, &item.options.merged_over(&defaults)))
            .collect();

        let render = &render;
        let results: Vec<BatchItemResult> = stream::iter(requests.into_iter().enumerate())
            .map(move |(index, request)| async move {
                let outcome = match request {
                    Ok(request) => render(request).await,
                    Err(err) => Err(RenderError::from(err)),
                };
                if let Err(err) = &outcome {
                    warn!(
                        target = "tategaki::batch",
                        op = "item",
                        index,
                        result = err.code(),
                        error = %err,
                        "batch item failed"
                    );
                }
                BatchItemResult::from(outcome)
            })
            .buffered(concurrency)
            .collect()
            .await;

        let rendered = results.iter().filter(|result| result.is_rendered()).count();
        info!(
            target = "tategaki::batch",
            op = "run",
            items = total,
            rendered,
            failed = total - rendered,
            concurrency,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch finished"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use super::*;
    use crate::{
        application::{error::ErrorKind, render::types::BatchItem},
        domain::request::RenderOptionsPatch,
    };

    fn coordinator(max_items: usize, concurrency: usize) -> BatchCoordinator {
        BatchCoordinator::new(
            NonZeroUsize::new(max_items).expect("non-zero"),
            NonZeroUsize::new(concurrency).expect("non-zero"),
        )
    }

    fn echo(request: &RenderRequest) -> RenderResult {
        RenderResult {
            png: request.text().as_bytes().to_vec(),
            width: request.options().font_size,
            height: request.options().padding,
            processing_time_ms: 0.0,
            trimmed: false,
            font: request.options().font.name(),
        }
    }

    #[test]
    fn concurrency_is_bounded_by_pool_capacity() {
        assert_eq!(coordinator(50, 4).concurrency(2), 2);
        assert_eq!(coordinator(50, 1).concurrency(8), 1);
        assert_eq!(coordinator(50, 4).concurrency(0), 1);
    }

    #[tokio::test]
    async fn rejects_empty_and_oversized_batches() {
        let coordinator = coordinator(2, 2);
        let render = |request: RenderRequest| async move { Ok(echo(&request)) };

        let err = coordinator
            .run(BatchJob::default(), 2, render)
            .await
            .expect_err("empty batch");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let job = BatchJob {
            items: vec![BatchItem::new("一"), BatchItem::new("二"), BatchItem::new("三")],
            ..Default::default()
        };
        let err = coordinator.run(job, 2, render).await.expect_err("too many");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn preserves_order_and_merges_defaults() {
        let job = BatchJob {
            defaults: RenderOptionsPatch {
                font: Some("gothic".to_string()),
                font_size: Some(30),
                ..Default::default()
            },
            items: vec![
                BatchItem::new("遅い"),
                BatchItem::new("速い").with_options(RenderOptionsPatch {
                    font_size: Some(12),
                    ..Default::default()
                }),
                BatchItem::new("中"),
            ],
        };

        let results = coordinator(10, 3)
            .run(job, 3, |request: RenderRequest| async move {
                let delay = match request.text() {
                    "遅い" => 40,
                    "中" => 20,
                    _ => 0,
                };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(echo(&request))
            })
            .await
            .expect("batch runs");

        let rendered: Vec<_> = results
            .iter()
            .map(|result| match result {
                BatchItemResult::Rendered(result) => {
                    (String::from_utf8(result.png.clone()).expect("utf-8"), result.width)
                }
                BatchItemResult::Failed(body) => panic!("unexpected failure: {body:?}"),
            })
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("遅い".to_string(), 30),
                ("速い".to_string(), 12),
                ("中".to_string(), 30)
            ]
        );
        assert!(matches!(
            &results[0],
            BatchItemResult::Rendered(result) if result.font == "gothic"
        ));
    }

    #[tokio::test]
    async fn item_failures_stay_in_their_slot() {
        let job = BatchJob {
            defaults: RenderOptionsPatch::default(),
            items: vec![
                BatchItem::new("正常"),
                BatchItem::new("   "),
                BatchItem::new("大きすぎ").with_options(RenderOptionsPatch {
                    font_size: Some(500),
                    ..Default::default()
                }),
                BatchItem::new("失敗"),
                BatchItem::new("最後"),
            ],
        };

        let calls = Arc::new(AtomicUsize::new(0));
        let results = coordinator(10, 2)
            .run(job, 2, |request: RenderRequest| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if request.text() == "失敗" {
                        return Err(RenderError::new(ErrorKind::RenderFailure, "engine crashed"));
                    }
                    Ok(echo(&request))
                }
            })
            .await
            .expect("batch runs");

        assert_eq!(results.len(), 5);
        assert!(results[0].is_rendered());
        assert!(matches!(&results[1], BatchItemResult::Failed(body) if body.code == "INVALID_INPUT"));
        assert!(matches!(&results[2], BatchItemResult::Failed(body) if body.code == "INVALID_OPTION"));
        assert!(matches!(&results[3], BatchItemResult::Failed(body) if body.code == "RENDER_ERROR"));
        assert!(results[4].is_rendered());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_exceeds_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let job = BatchJob {
            items: (0..12).map(|i| BatchItem::new(format!("{i}"))).collect(),
            ..Default::default()
        };

        let results = coordinator(50, 8)
            .run(job, 3, |request: RenderRequest| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(echo(&request))
                }
            })
            .await
            .expect("batch runs");

        assert_eq!(results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
