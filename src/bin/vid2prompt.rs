//! CLI binary for vid2prompt.
//!
//! A thin shim over the library crate: flags map to `GenerationConfig`,
//! subcommands map to `server::serve`, `generate_from_paths` and
//! `list_models`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use vid2prompt::{
    generate_from_paths, list_models, server, FileState, GenerationConfig,
    GenerationProgressCallback, InstructionTemplate, MediaRole, ProgressCallback, RemoteFile,
    Stage, SubmissionMode,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Spinner showing the current stage, with one log line per upload and per
/// status change. Both inputs report concurrently, so every line names its role.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Instant,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            started: Instant::now(),
        })
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        let prefix = match stage {
            Stage::Storing => "Storing",
            Stage::Uploading => "Uploading",
            Stage::Polling => "Processing",
            Stage::Generating => "Generating",
        };
        self.bar.set_prefix(prefix);
        self.bar.set_message(stage.to_string());
    }

    fn on_uploaded(&self, role: MediaRole, file: &RemoteFile) {
        self.bar.println(format!(
            "  {} {:<6}  uploaded as {}",
            green("✓"),
            role,
            dim(&file.name)
        ));
    }

    fn on_poll(&self, role: MediaRole, state: FileState, attempt: u32) {
        match state {
            FileState::Processing => self
                .bar
                .set_message(format!("{role} video still processing (check {attempt})")),
            FileState::Failed => self
                .bar
                .println(format!("  {} {:<6}  processing failed", red("✗"), role)),
            FileState::Ready | FileState::Unknown => self.bar.println(format!(
                "  {} {:<6}  {} after {} check{}",
                green("✓"),
                role,
                state,
                attempt,
                if attempt == 1 { "" } else { "s" }
            )),
        }
    }

    fn on_complete(&self, result_len: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} prompt generated  {}  {}",
            green("✔"),
            dim(&format!("{result_len} chars")),
            dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64())),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on port 3000
  vid2prompt serve --port 3000

  # One-off generation from two local files
  vid2prompt generate sketch.mp4 final.mp4

  # Style-only prompt written to a file
  vid2prompt --template style-only generate a.mov b.mov -o prompt.txt

  # Full JSON output (handles, timings)
  vid2prompt generate a.mp4 b.mp4 --json

  # Which models does this key see?
  vid2prompt models

HTTP API (serve):
  POST /generate        multipart: styleVideo, targetVideo
                        or JSON:   {"styleUri": "...", "targetUri": "..."}
  POST /api/generate    same as /generate
  GET  /health          {"status":"ok"}

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY        Google Gemini API key (required)
  VID2PROMPT_MODEL      Override model ID (default: gemini-2.5-flash)
  RUST_LOG              Override log filter (e.g. vid2prompt=debug)
"#;

/// Generate video-generation prompts from a style video and a target video.
#[derive(Parser, Debug)]
#[command(
    name = "vid2prompt",
    version,
    about = "Generate video-generation prompts from a style video and a target video with Gemini",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Address to bind.
        #[arg(long, env = "VID2PROMPT_HOST", default_value = "127.0.0.1")]
        host: IpAddr,

        /// Port to bind.
        #[arg(long, env = "VID2PROMPT_PORT", default_value_t = 3000)]
        port: u16,
    },

    /// Generate a prompt from two local video files.
    Generate {
        /// Style / structure reference video (video 1).
        style: PathBuf,

        /// Target output video (video 2).
        target: PathBuf,

        /// Output the full result (handles, timings) as JSON.
        #[arg(long)]
        json: bool,

        /// Write the prompt to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Disable the progress spinner.
        #[arg(long, env = "VID2PROMPT_NO_PROGRESS")]
        no_progress: bool,
    },

    /// List models available to the API key.
    Models {
        /// Include models that cannot serve generateContent.
        #[arg(long)]
        all: bool,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID, with or without the `models/` prefix.
    #[arg(long, env = "VID2PROMPT_MODEL", global = true, default_value = vid2prompt::config::DEFAULT_MODEL)]
    model: String,

    /// Built-in instruction template.
    #[arg(long, env = "VID2PROMPT_TEMPLATE", global = true, value_enum, default_value = "scene-narrative")]
    template: TemplateArg,

    /// Path to a text file with a custom instruction (overrides --template).
    #[arg(long, env = "VID2PROMPT_INSTRUCTION_FILE", global = true)]
    instruction_file: Option<PathBuf>,

    /// Accepted HTTP submission forms: any, upload, uri.
    #[arg(long, env = "VID2PROMPT_SUBMISSION_MODE", global = true, value_enum, default_value = "any")]
    submission_mode: SubmissionArg,

    /// Wait between status queries, in milliseconds.
    #[arg(long, env = "VID2PROMPT_POLL_INTERVAL_MS", global = true, default_value_t = 2000,
          value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: u64,

    /// Maximum processing wait per video in seconds (0 = bounded only by --request-timeout).
    #[arg(long, env = "VID2PROMPT_MAX_POLL_WAIT", global = true, default_value_t = 240)]
    max_poll_wait: u64,

    /// Budget for a whole request in seconds.
    #[arg(long, env = "VID2PROMPT_REQUEST_TIMEOUT", global = true, default_value_t = 300,
          value_parser = clap::value_parser!(u64).range(1..))]
    request_timeout: u64,

    /// Per-call timeout for the Gemini API in seconds.
    #[arg(long, env = "VID2PROMPT_API_TIMEOUT", global = true, default_value_t = 120)]
    api_timeout: u64,

    /// Gemini REST base URL.
    #[arg(long, env = "VID2PROMPT_API_BASE_URL", global = true, default_value = vid2prompt::config::DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// Directory for temporary upload copies (default: OS temp dir).
    #[arg(long, env = "VID2PROMPT_TEMP_DIR", global = true)]
    temp_dir: Option<PathBuf>,

    /// Maximum request body size in MiB (serve only).
    #[arg(long, env = "VID2PROMPT_MAX_UPLOAD_MB", global = true, default_value_t = 100)]
    max_upload_mb: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "VID2PROMPT_VERBOSE", global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "VID2PROMPT_QUIET", global = true)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TemplateArg {
    SceneNarrative,
    StyleOnly,
    EditList,
}

impl From<TemplateArg> for InstructionTemplate {
    fn from(v: TemplateArg) -> Self {
        match v {
            TemplateArg::SceneNarrative => InstructionTemplate::SceneNarrative,
            TemplateArg::StyleOnly => InstructionTemplate::StyleOnly,
            TemplateArg::EditList => InstructionTemplate::EditList,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SubmissionArg {
    Any,
    Upload,
    Uri,
}

impl From<SubmissionArg> for SubmissionMode {
    fn from(v: SubmissionArg) -> Self {
        match v {
            SubmissionArg::Any => SubmissionMode::Any,
            SubmissionArg::Upload => SubmissionMode::Upload,
            SubmissionArg::Uri => SubmissionMode::UriReference,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let common = &cli.common;

    // ── Logging setup ────────────────────────────────────────────────────
    // A one-off `generate` with the spinner keeps library logs at error so
    // the two do not interleave; `serve` logs at info by default.
    let show_progress = matches!(
        cli.command,
        Command::Generate { json: false, no_progress: false, .. }
    ) && !common.quiet;
    let filter = if common.verbose {
        "debug"
    } else if common.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve { host, port } => {
            let config = build_config(common, None).await?;
            server::serve(SocketAddr::new(host, port), config)
                .await
                .context("HTTP server failed")?;
        }

        Command::Generate {
            ref style,
            ref target,
            json,
            ref output,
            ..
        } => {
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn GenerationProgressCallback>)
            } else {
                None
            };
            let config = build_config(common, progress).await?;

            let result = generate_from_paths(style, target, &config)
                .await
                .map_err(|e| anyhow::anyhow!(e.diagnostic()))
                .context("Prompt generation failed")?;

            let text = if json {
                serde_json::to_string_pretty(&result).context("Failed to serialise output")?
            } else {
                result.result.clone()
            };

            if let Some(path) = output {
                tokio::fs::write(path, format!("{text}\n"))
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                if !common.quiet {
                    eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
                }
            } else {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                writeln!(handle, "{text}").context("Failed to write to stdout")?;
            }

            if !common.quiet && !show_progress && !json {
                eprintln!(
                    "Generated {} chars in {}ms ({} status queries)",
                    result.result.len(),
                    result.stats.total_duration_ms,
                    result.stats.poll_queries
                );
            }
        }

        Command::Models { all } => {
            let config = build_config(common, None).await?;
            let models = list_models(&config)
                .await
                .map_err(|e| anyhow::anyhow!(e.diagnostic()))
                .context("Listing models failed")?;

            for model in models.iter().filter(|m| all || m.supports_generation()) {
                let id = model.name.strip_prefix("models/").unwrap_or(&model.name);
                match model.display_name {
                    Some(ref display) => println!("{id:<40} {}", dim(display)),
                    None => println!("{id}"),
                }
            }
        }
    }

    Ok(())
}

/// Map CLI args to `GenerationConfig`.
async fn build_config(args: &CommonArgs, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .model(&args.model)
        .instruction(args.template.into())
        .submission_mode(args.submission_mode.into())
        .api_base_url(&args.api_base_url)
        .poll_interval_ms(args.poll_interval_ms)
        .max_poll_wait((args.max_poll_wait > 0).then(|| Duration::from_secs(args.max_poll_wait)))
        .request_timeout_secs(args.request_timeout)
        .api_timeout_secs(args.api_timeout)
        .max_upload_bytes(args.max_upload_mb.saturating_mul(1024 * 1024));

    if let Some(ref key) = args.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref path) = args.instruction_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction from {}", path.display()))?;
        builder = builder.custom_instruction(text);
    }
    if let Some(ref dir) = args.temp_dir {
        builder = builder.temp_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
