use std::{path::PathBuf, process, sync::Arc};

use serde::Serialize;
use tategaki::{
    application::{
        error::AppError,
        render::{BatchItemResult, BatchJob, BatchRenderResponse, RendererSettings, TategakiRenderer},
    },
    config::{self, BatchArgs, Command, LayoutArgs, RenderArgs, Settings, TextArgs},
    domain::request::RenderRequest,
    infra::{
        engine::{RenderEnginePool, SwashEngineFactory},
        fonts::load_font_cache,
        telemetry,
    },
};
use tokio::io::AsyncReadExt;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(target = "tategaki::main", error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(target = "tategaki::main", error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::Render(args) => run_render(&settings, args).await,
        Command::Batch(args) => run_batch(&settings, args).await,
        Command::Layout(args) => run_layout(&settings, args).await,
        Command::Health => run_health(&settings).await,
    }
}

async fn build_renderer(settings: &Settings) -> Result<TategakiRenderer, AppError> {
    let fonts = Arc::new(load_font_cache(&settings.fonts).await?);
    let pool = RenderEnginePool::new(settings.pool.size, Arc::new(SwashEngineFactory));
    Ok(TategakiRenderer::new(
        pool,
        fonts,
        RendererSettings::from(settings),
    ))
}

#[derive(Debug, Serialize)]
struct RenderSummary {
    output: PathBuf,
    width: u32,
    height: u32,
    processing_time_ms: f64,
    trimmed: bool,
    font: &'static str,
}

async fn run_render(settings: &Settings, args: RenderArgs) -> Result<(), AppError> {
    let request = read_request(&args.text).await?;
    let renderer = build_renderer(settings).await?;

    let result = renderer.render(&request).await?;
    tokio::fs::write(&args.output, &result.png).await?;

    print_json(&RenderSummary {
        output: args.output,
        width: result.width,
        height: result.height,
        processing_time_ms: result.processing_time_ms,
        trimmed: result.trimmed,
        font: result.font,
    })
}

async fn run_batch(settings: &Settings, args: BatchArgs) -> Result<(), AppError> {
    let raw = tokio::fs::read_to_string(&args.input).await?;
    let job: BatchJob = serde_json::from_str(&raw).map_err(|err| {
        AppError::validation(format!(
            "batch file `{}` is not a valid job: {err}",
            args.input.display()
        ))
    })?;

    let renderer = build_renderer(settings).await?;
    renderer.warm_up().await;
    let results = renderer.render_batch(job).await?;

    if let Some(dir) = args.output_dir.as_ref() {
        tokio::fs::create_dir_all(dir).await?;
        for (index, result) in results.iter().enumerate() {
            if let BatchItemResult::Rendered(rendered) = result {
                tokio::fs::write(dir.join(format!("{index}.png")), &rendered.png).await?;
            }
        }
        info!(
            target = "tategaki::main",
            op = "batch",
            dir = %dir.display(),
            "batch images written"
        );
    }

    print_json(&BatchRenderResponse::from_results(&results))
}

async fn run_layout(settings: &Settings, args: LayoutArgs) -> Result<(), AppError> {
    let request = read_request(&args.text).await?;
    let renderer = build_renderer(settings).await?;
    print_json(&renderer.preview_layout(&request)?)
}

async fn run_health(settings: &Settings) -> Result<(), AppError> {
    let renderer = build_renderer(settings).await?;
    renderer.warm_up().await;
    print_json(&renderer.health())
}

/// Build a request from the positional text, or from stdin when it is absent.
async fn read_request(args: &TextArgs) -> Result<RenderRequest, AppError> {
    let text = match args.text.as_ref() {
        Some(text) => text.clone(),
        None => {
            let mut buffer = String::new();
            tokio::io::stdin().read_to_string(&mut buffer).await?;
            buffer.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    Ok(RenderRequest::from_patch(text, &args.options_patch())?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to serialize output: {err}")))?;
    println!("{json}");
    Ok(())
}
