use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

use crate::domain::request::RenderOptionsPatch;

/// Command-line arguments for the tategaki binary.
#[derive(Debug, Parser)]
#[command(
    name = "tategaki",
    version,
    about = "Render Japanese vertical text to transparent PNG images"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "TATEGAKI_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: RuntimeOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Render text into a PNG file and print a JSON summary.
    Render(RenderArgs),
    /// Render every item of a batch job file and print the results as JSON.
    Batch(BatchArgs),
    /// Print the computed layout as JSON without rasterizing.
    Layout(LayoutArgs),
    /// Warm the render pool and print a health report.
    Health,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub text: TextArgs,

    /// Where to write the PNG.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct BatchArgs {
    /// JSON file holding `{"items": [...], "defaults": {...}}`.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Also write each successful image as `<index>.png` into this directory.
    #[arg(long = "output-dir", value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct LayoutArgs {
    #[command(flatten)]
    pub text: TextArgs,
}

/// Text and per-request options shared by `render` and `layout`.
#[derive(Debug, Args, Clone, Default)]
pub struct TextArgs {
    /// Text to render; read from stdin when omitted.
    #[arg(value_name = "TEXT")]
    pub text: Option<String>,

    /// Font face (antique|gothic|mincho); unknown names use the default face.
    #[arg(long, value_name = "NAME")]
    pub font: Option<String>,

    /// Font size in pixels.
    #[arg(long = "font-size", value_name = "PX")]
    pub font_size: Option<u32>,

    /// Column pitch as a multiple of the font size.
    #[arg(long = "line-height", value_name = "RATIO")]
    pub line_height: Option<f32>,

    /// Extra space between characters, in em.
    #[arg(long = "letter-spacing", value_name = "EM")]
    pub letter_spacing: Option<f32>,

    /// Transparent margin around the text, in pixels.
    #[arg(long, value_name = "PX")]
    pub padding: Option<u32>,

    /// Wrap columns after this many characters.
    #[arg(long = "max-chars-per-line", value_name = "COUNT")]
    pub max_chars_per_line: Option<u32>,

    /// Balance column lengths automatically when no limit is given.
    #[arg(long = "alternate-layout", alias = "use-tategaki-js", action = clap::ArgAction::SetTrue)]
    pub alternate_layout: bool,
}

impl TextArgs {
    pub fn options_patch(&self) -> RenderOptionsPatch {
        RenderOptionsPatch {
            font: self.font.clone(),
            font_size: self.font_size,
            line_height: self.line_height,
            letter_spacing: self.letter_spacing,
            padding: self.padding,
            max_chars_per_line: self.max_chars_per_line,
            use_alternate_layout_mode: self.alternate_layout.then_some(true),
        }
    }
}

/// Settings overrides accepted by every subcommand.
#[derive(Debug, Args, Default, Clone)]
pub struct RuntimeOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the number of render engines.
    #[arg(long = "pool-size", value_name = "COUNT", global = true)]
    pub pool_size: Option<u64>,

    /// Override how long a request waits for an engine (0 waits forever).
    #[arg(long = "pool-acquire-timeout-ms", value_name = "MS", global = true)]
    pub pool_acquire_timeout_ms: Option<u64>,

    /// Override how long one paint may take.
    #[arg(long = "pool-render-timeout-ms", value_name = "MS", global = true)]
    pub pool_render_timeout_ms: Option<u64>,

    /// Toggle creating every engine at startup.
    #[arg(
        long = "pool-precreate",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub pool_precreate: Option<bool>,

    /// Toggle the throwaway render performed at startup.
    #[arg(
        long = "pool-warmup-render",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub pool_warmup_render: Option<bool>,

    /// Override the largest accepted batch.
    #[arg(long = "batch-max-items", value_name = "COUNT", global = true)]
    pub batch_max_items: Option<u64>,

    /// Override how many batch items render at once.
    #[arg(long = "batch-concurrency", value_name = "COUNT", global = true)]
    pub batch_concurrency: Option<u64>,

    /// Override the default (antique) font file.
    #[arg(long = "font-default", value_name = "PATH", value_hint = ValueHint::FilePath, global = true)]
    pub font_default: Option<PathBuf>,

    /// Override the gothic font file.
    #[arg(long = "font-gothic", value_name = "PATH", value_hint = ValueHint::FilePath, global = true)]
    pub font_gothic: Option<PathBuf>,

    /// Override the mincho font file.
    #[arg(long = "font-mincho", value_name = "PATH", value_hint = ValueHint::FilePath, global = true)]
    pub font_mincho: Option<PathBuf>,
}
