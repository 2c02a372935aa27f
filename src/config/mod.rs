//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{
    BatchArgs, CliArgs, Command, LayoutArgs, RenderArgs, RuntimeOverrides, TextArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "tategaki";
const ENV_PREFIX: &str = "TATEGAKI";
const DEFAULT_POOL_SIZE: u64 = 2;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_RENDER_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_BATCH_MAX_ITEMS: u64 = 50;
const DEFAULT_BATCH_CONCURRENCY: u64 = 2;
pub(crate) const DEFAULT_FONT_PATH: &str = "fonts/GenEiAntiqueNv5-M.ttf";
pub(crate) const DEFAULT_GOTHIC_FONT_PATH: &str = "fonts/GenEiMGothic2-Regular.ttf";
pub(crate) const DEFAULT_MINCHO_FONT_PATH: &str = "fonts/GenEiChikugoMin3-R.ttf";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub pool: PoolSettings,
    pub batch: BatchSettings,
    pub fonts: FontSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub size: NonZeroUsize,
    /// `None` waits for a free engine indefinitely.
    pub acquire_timeout: Option<Duration>,
    pub render_timeout: Duration,
    pub precreate: bool,
    pub warmup_render: bool,
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub max_items: NonZeroUsize,
    pub concurrency: NonZeroUsize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSettings {
    pub default_path: PathBuf,
    pub gothic_path: Option<PathBuf>,
    pub mincho_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    pool: RawPoolSettings,
    batch: RawBatchSettings,
    fonts: RawFontSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &RuntimeOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(size) = overrides.pool_size {
            self.pool.size = Some(size);
        }
        if let Some(ms) = overrides.pool_acquire_timeout_ms {
            self.pool.acquire_timeout_ms = Some(ms);
        }
        if let Some(ms) = overrides.pool_render_timeout_ms {
            self.pool.render_timeout_ms = Some(ms);
        }
        if let Some(precreate) = overrides.pool_precreate {
            self.pool.precreate = Some(precreate);
        }
        if let Some(warmup) = overrides.pool_warmup_render {
            self.pool.warmup_render = Some(warmup);
        }
        if let Some(max) = overrides.batch_max_items {
            self.batch.max_items = Some(max);
        }
        if let Some(concurrency) = overrides.batch_concurrency {
            self.batch.concurrency = Some(concurrency);
        }
        if let Some(path) = overrides.font_default.as_ref() {
            self.fonts.default_path = Some(path.clone());
        }
        if let Some(path) = overrides.font_gothic.as_ref() {
            self.fonts.gothic_path = Some(path.clone());
        }
        if let Some(path) = overrides.font_mincho.as_ref() {
            self.fonts.mincho_path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            pool,
            batch,
            fonts,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            pool: build_pool_settings(pool)?,
            batch: build_batch_settings(batch)?,
            fonts: build_font_settings(fonts)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_pool_settings(pool: RawPoolSettings) -> Result<PoolSettings, LoadError> {
    let size = non_zero_usize(pool.size.unwrap_or(DEFAULT_POOL_SIZE), "pool.size")?;

    let acquire_ms = pool
        .acquire_timeout_ms
        .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_MS);
    let acquire_timeout = (acquire_ms > 0).then(|| Duration::from_millis(acquire_ms));

    let render_ms = pool.render_timeout_ms.unwrap_or(DEFAULT_RENDER_TIMEOUT_MS);
    if render_ms == 0 {
        return Err(LoadError::invalid(
            "pool.render_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(PoolSettings {
        size,
        acquire_timeout,
        render_timeout: Duration::from_millis(render_ms),
        precreate: pool.precreate.unwrap_or(true),
        warmup_render: pool.warmup_render.unwrap_or(true),
    })
}

fn build_batch_settings(batch: RawBatchSettings) -> Result<BatchSettings, LoadError> {
    let max_items = non_zero_usize(
        batch.max_items.unwrap_or(DEFAULT_BATCH_MAX_ITEMS),
        "batch.max_items",
    )?;
    let concurrency = non_zero_usize(
        batch.concurrency.unwrap_or(DEFAULT_BATCH_CONCURRENCY),
        "batch.concurrency",
    )?;
    Ok(BatchSettings {
        max_items,
        concurrency,
    })
}

fn build_font_settings(fonts: RawFontSettings) -> Result<FontSettings, LoadError> {
    let default_path = match fonts.default_path {
        Some(path) if path.as_os_str().is_empty() => {
            return Err(LoadError::invalid(
                "fonts.default_path",
                "a default font is required",
            ));
        }
        Some(path) => path,
        None => PathBuf::from(DEFAULT_FONT_PATH),
    };

    Ok(FontSettings {
        default_path,
        gothic_path: optional_font_path(fonts.gothic_path, DEFAULT_GOTHIC_FONT_PATH),
        mincho_path: optional_font_path(fonts.mincho_path, DEFAULT_MINCHO_FONT_PATH),
    })
}

/// An explicitly empty path disables the face.
fn optional_font_path(value: Option<PathBuf>, default: &str) -> Option<PathBuf> {
    match value {
        Some(path) if path.as_os_str().is_empty() => None,
        Some(path) => Some(path),
        None => Some(PathBuf::from(default)),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPoolSettings {
    size: Option<u64>,
    acquire_timeout_ms: Option<u64>,
    render_timeout_ms: Option<u64>,
    precreate: Option<bool>,
    warmup_render: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBatchSettings {
    max_items: Option<u64>,
    concurrency: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFontSettings {
    default_path: Option<PathBuf>,
    gothic_path: Option<PathBuf>,
    mincho_path: Option<PathBuf>,
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
