//! CLI binary for ocr2md.
//!
//! An interactive terminal session over the library: upload a file (type its
//! path), watch the per-page progress, read the extracted Markdown, repeat.
//! Files given on the command line are processed the same way, one session
//! each. Failures are shown as banners and never end the loop.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ocr2md::{
    write_markdown, Session, SessionConfig, SessionOutput, SessionProgressCallback, SessionState,
    DEFAULT_MODEL, SUPPORTED_MODELS,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

fn error_banner(msg: &str) {
    eprintln!("{} {}", red("✘"), red(msg));
}

fn warning_banner(msg: &str) {
    eprintln!("{} {}", yellow("⚠"), yellow(msg));
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while the upload is prepared, then
/// a page bar with one log line per page. A fresh bar is created for every
/// upload so consecutive sessions in the interactive loop do not share state.
struct CliProgressCallback {
    bar: Mutex<Option<ProgressBar>>,
    page_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
            page_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Some(bar) = self.bar.lock().unwrap().as_ref() {
            f(bar);
        }
    }

    fn start_spinner(&self) {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Processing file");
        bar.set_message("…");
        bar.enable_steady_tick(Duration::from_millis(80));
        self.errors.store(0, Ordering::SeqCst);
        *self.bar.lock().unwrap() = Some(bar);
    }

    fn page_elapsed(&self) -> f64 {
        self.page_started
            .lock()
            .unwrap()
            .take()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl SessionProgressCallback for CliProgressCallback {
    fn on_state_change(&self, state: SessionState) {
        match state {
            SessionState::FileReceived => self.start_spinner(),
            SessionState::Rasterizing => self.with_bar(|bar| {
                bar.set_message("Processing PDF file… This may take a moment.");
            }),
            SessionState::DirectEncode => self.with_bar(|bar| bar.set_message("Encoding image…")),
            SessionState::Idle => {
                // Fatal error or nothing to show: drop the bar without a summary.
                if let Some(bar) = self.bar.lock().unwrap().take() {
                    bar.finish_and_clear();
                }
            }
            _ => {}
        }
    }

    fn on_session_start(&self, total_pages: usize) {
        self.with_bar(|bar| {
            let style = ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);
            bar.set_length(total_pages as u64);
            bar.set_style(style);
            bar.set_prefix("OCR");
            bar.reset_eta();
        });
    }

    fn on_page_start(&self, page_num: usize, total: usize) {
        *self.page_started.lock().unwrap() = Some(Instant::now());
        self.with_bar(|bar| bar.set_message(format!("Processing page {page_num} of {total}...")));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, markdown_len: usize) {
        let secs = self.page_elapsed();
        self.with_bar(|bar| {
            bar.println(format!(
                "  {} Page {:>3}/{:<3}  {:<8}  {}",
                green("✓"),
                page_num,
                total,
                dim(&format!("{markdown_len:>5} chars")),
                dim(&format!("{secs:.1}s")),
            ));
            bar.inc(1);
        });
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.page_elapsed();
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 100 {
            let mut s: String = error.chars().take(99).collect();
            s.push('\u{2026}');
            s
        } else {
            error.to_string()
        };

        self.with_bar(|bar| {
            bar.println(format!(
                "  {} Page {:>3}/{:<3}  {}  {}",
                red("✗"),
                page_num,
                total,
                red(&msg),
                dim(&format!("{secs:.1}s")),
            ));
            bar.inc(1);
        });
    }

    fn on_session_complete(&self, total_pages: usize, success_count: usize) {
        if let Some(bar) = self.bar.lock().unwrap().take() {
            bar.finish_and_clear();
        }
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} of {} pages converted",
                green("✔"),
                bold(&success_count.to_string()),
                total_pages
            );
        } else {
            eprintln!(
                "{} {}/{} pages converted  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Interactive session: type a path, get Markdown, repeat
  ocr2md

  # One-shot conversion of an image and a PDF
  ocr2md receipt.jpg report.pdf

  # Save the Markdown as well as printing it
  ocr2md scan.png -o scan.md

  # Structured output with per-page results
  ocr2md --json report.pdf > report.json

SUPPORTED INPUTS:
  .jpg / .jpeg / .png   sent as a single page
  .pdf                  rasterised page by page with poppler's pdftoppm

ENVIRONMENT VARIABLES:
  GROQ_API_KEY      API key for the hosted vision model (required)
  GROQ_BASE_URL     Override the API root (default https://api.groq.com/openai/v1)
  POPPLER_PATH      Directory containing pdftoppm, or the binary itself
  RUST_LOG          Log filter, e.g. ocr2md=debug

SETUP:
  1. Set API key:      export GROQ_API_KEY=gsk_...
  2. Install poppler:  brew install poppler   |   sudo apt-get install poppler-utils
  3. Run:              ocr2md
"#;

/// Extract Markdown from images and PDFs with a hosted vision model.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2md",
    version,
    about = "OCR images and PDFs to Markdown with a hosted vision model",
    long_about = "Upload an image (JPG/PNG) or a PDF and get its content back as Markdown. \
PDF pages are rasterised with poppler's pdftoppm and every page is sent, in order, to a \
vision-language model on Groq. Without FILE arguments an interactive session starts.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files to process, each as its own session. Omit for interactive mode.
    files: Vec<PathBuf>,

    /// Also write the Markdown to this file.
    #[arg(short, long, env = "OCR2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Vision model ID.
    #[arg(long, env = "OCR2MD_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// API key for the hosted model.
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API root URL (OpenAI-compatible).
    #[arg(long, env = "GROQ_BASE_URL")]
    base_url: Option<String>,

    /// Rendering DPI for PDF pages (72–400).
    #[arg(long, env = "OCR2MD_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Max model output tokens per page.
    #[arg(long, env = "OCR2MD_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: u32,

    /// Model temperature (0.0–2.0).
    #[arg(long, env = "OCR2MD_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Per-page request timeout in seconds.
    #[arg(long, env = "OCR2MD_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Path to a text file containing a custom instruction prompt.
    #[arg(long, env = "OCR2MD_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Output structured JSON (SessionOutput) instead of Markdown.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "OCR2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except the Markdown and errors.
    #[arg(short, long, env = "OCR2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides all the feedback that matters; keep library
    // INFO logs out of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    if cli.output.is_some() && cli.files.len() > 1 {
        anyhow::bail!("--output takes a single input file (got {})", cli.files.len());
    }

    let config = build_config(&cli).await?;
    let mut session = Session::from_config(Arc::new(config)).context("Failed to start session")?;
    if show_progress {
        session = session.with_progress(CliProgressCallback::new());
    }

    if !cli.quiet && !cli.json {
        eprintln!("{}", bold("OCR to Markdown with Groq"));
        eprintln!(
            "{}",
            dim(&format!(
                "model: {}  (available: {})",
                session.config().model,
                SUPPORTED_MODELS.join(", ")
            ))
        );
    }

    // PDFs need poppler; images do not. Warn now rather than on first upload.
    if let Err(e) = poppler_locate::locate_pdftoppm() {
        if !cli.quiet {
            warning_banner(&format!("{e}\nImages will still work; PDF uploads will fail."));
        }
    }

    if cli.files.is_empty() {
        interactive(&session, &cli).await?;
    } else {
        for path in &cli.files {
            process_one(&session, &cli, path, show_progress).await;
        }
    }

    Ok(())
}

/// Prompt for paths until an empty line or EOF.
async fn interactive(session: &Session, cli: &Cli) -> Result<()> {
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!(
            "\n{} ",
            cyan("Upload an image (JPG/PNG) or PDF. Path (empty to quit):")
        );
        io::stderr().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let path = clean_path_input(&line);
        if path.is_empty() {
            break;
        }
        process_one(session, cli, Path::new(path), show_progress).await;
    }

    Ok(())
}

/// Run one upload and render the outcome. Never fails: errors become banners.
async fn process_one(session: &Session, cli: &Cli, path: &Path, show_progress: bool) {
    let output = match session.process_path(path).await {
        Ok(output) => output,
        Err(e) => {
            error_banner(&e.to_string());
            return;
        }
    };

    // The progress callback already printed page failures.
    if !show_progress && !cli.quiet {
        for err in output.page_errors() {
            error_banner(&err.to_string());
        }
    }

    if let Err(e) = display(&output, cli).await {
        error_banner(&format!("{e:#}"));
    }
}

async fn display(output: &SessionOutput, cli: &Cli) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        println!("{json}");
    } else if output.is_displayable() {
        if !cli.quiet {
            eprintln!("\n{}\n", bold("### Extracted Markdown Content"));
        }
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.markdown.as_bytes())
            .context("Failed to write to stdout")?;
        handle.flush().ok();
    }

    if let Some(ref out) = cli.output {
        if output.is_displayable() {
            write_markdown(out, &output.markdown).await?;
            if !cli.quiet {
                eprintln!("{} saved to {}", green("✔"), bold(&out.display().to_string()));
            }
        }
    }

    Ok(())
}

/// Trim whitespace and the quotes terminals add around dragged-in paths.
fn clean_path_input(line: &str) -> &str {
    let t = line.trim();
    for q in ['"', '\''] {
        if t.len() >= 2 && t.starts_with(q) && t.ends_with(q) {
            return &t[1..t.len() - 1];
        }
    }
    t
}

/// Map CLI args to `SessionConfig`.
async fn build_config(cli: &Cli) -> Result<SessionConfig> {
    let mut builder = SessionConfig::from_env()
        .model(cli.model.clone())
        .dpi(cli.dpi)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}
