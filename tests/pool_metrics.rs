mod common;

use std::{collections::HashSet, time::Duration};

use metrics_util::debugging::DebuggingRecorder;
use tategaki::{
    application::render::RendererSettings,
    domain::request::{RenderOptionsPatch, RenderRequest},
};

use common::{FAIL_MARKER, HANG_MARKER, renderer};

fn request(text: &str) -> RenderRequest {
    RenderRequest::from_patch(text, &RenderOptionsPatch::default()).expect("valid request")
}

#[tokio::test]
async fn render_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let (renderer, _) = renderer(
        1,
        Duration::ZERO,
        RendererSettings {
            acquire_timeout: Some(Duration::from_millis(20)),
            render_timeout: Duration::from_millis(200),
            ..RendererSettings::default()
        },
    );

    // Success, then a failure that forces a replacement.
    renderer.render(&request("成功")).await.expect("render");
    renderer
        .render(&request(FAIL_MARKER))
        .await
        .expect_err("injected failure");

    // A hung paint holds the only engine while a second caller times out.
    let blocker = request(HANG_MARKER);
    let waiter = request("待機");
    let (_, exhausted) = tokio::join!(renderer.render(&blocker), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        renderer.render(&waiter).await
    });
    assert_eq!(exhausted.expect_err("exhausted").code(), "POOL_EXHAUSTED");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "tategaki_render_total",
        "tategaki_render_ms",
        "tategaki_pool_in_use",
        "tategaki_pool_acquire_wait_ms",
        "tategaki_pool_acquire_timeout_total",
        "tategaki_pool_replace_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
