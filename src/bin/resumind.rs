//! CLI binary for resumind.
//!
//! A thin shim over the library crate: it injects the local client, runs the
//! upload workflow and prints stored reviews.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use resumind::backend::{local_client, ProviderSettings};
use resumind::pipeline::input::resolve_input;
use resumind::{
    format_size, AppConfig, Capabilities, Environment, Feedback, FeedbackReport, ProgressCallback,
    Rasterizer, ResumeRecord, ResumeStore, ScoreBadge, Submission, TipKind, UploadOrchestrator,
    UploadProgressCallback, UploadStage,
};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

fn score_colour(score: u8) -> String {
    let text = format!("{score:>3}/100");
    match score {
        70..=100 => green(&text),
        50..=69 => cyan(&text),
        _ => red(&text),
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that logs one line per finished workflow stage.
struct CliProgressCallback {
    bar: ProgressBar,
    /// The stage currently running and when it started.
    current: Mutex<Option<(UploadStage, Instant)>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            current: Mutex::new(None),
        })
    }

    /// Log the stage that just ended, if any.
    fn close_current(&self, ok: bool) {
        let previous = self
            .current
            .lock()
            .map(|mut current| current.take())
            .unwrap_or(None);
        if let Some((stage, started)) = previous {
            let mark = if ok { green("✓") } else { red("✗") };
            self.bar.println(format!(
                "  {} {:<42} {}",
                mark,
                stage.status_text(),
                dim(&format!("{:.1}s", started.elapsed().as_secs_f64())),
            ));
        }
    }
}

impl UploadProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: UploadStage, status: &str) {
        self.close_current(true);
        if stage == UploadStage::Complete {
            return;
        }
        if let Ok(mut current) = self.current.lock() {
            *current = Some((stage, Instant::now()));
        }
        self.bar.set_prefix("Working");
        self.bar.set_message(status.to_string());
    }

    fn on_error(&self, message: &str) {
        self.close_current(false);
        self.bar.finish_and_clear();

        // Keep long provider errors on one line.
        let msg = if message.chars().count() > 120 {
            let cut: String = message.chars().take(119).collect();
            format!("{cut}\u{2026}")
        } else {
            message.to_string()
        };
        eprintln!("{} {}", red("✘"), red(&msg));
    }

    fn on_complete(&self, id: &str) {
        self.close_current(true);
        self.bar.finish_and_clear();
        eprintln!("{} Review saved as {}", green("✔"), bold(id));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a resume against a job posting
  resumind analyze cv.pdf --company Acme --job-title "Backend Engineer" \
      --job-description-file posting.txt

  # Analyse a resume from a URL, JSON output
  resumind --json analyze https://example.com/cv.pdf --job-title "Data Analyst"

  # List stored reviews, newest first
  resumind list

  # Show one review in full
  resumind show 3f1c0b9e-...

  # Delete every stored file and record
  resumind wipe --yes

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium; the system library is used otherwise
  RESUMIND_DATA_DIR       Where files and records are stored (default .resumind)

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Analyse:         resumind analyze cv.pdf --job-title "Engineer"
"#;

/// Upload PDF resumes and get structured AI feedback.
#[derive(Parser, Debug)]
#[command(
    name = "resumind",
    version,
    about = "Upload a PDF resume and get structured AI feedback",
    long_about = "Upload a PDF resume (local file or URL), render a preview of its first page, \
and get an ATS-style review from a Vision LLM. Reviews are stored locally and can be listed, \
shown and wiped. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any \
OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding uploaded files and stored records.
    #[arg(long, global = true, env = "RESUMIND_DATA_DIR", default_value = ".resumind")]
    data_dir: PathBuf,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Retries on LLM failure.
    #[arg(long, global = true, env = "RESUMIND_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Path to an existing libpdfium.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Name of the local user.
    #[arg(long, global = true, env = "RESUMIND_USER", default_value = "local")]
    user: String,

    /// Output JSON instead of text.
    #[arg(long, global = true, env = "RESUMIND_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "RESUMIND_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "RESUMIND_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a resume and request an AI review.
    Analyze {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Company the application is for.
        #[arg(long, default_value = "")]
        company: String,

        /// Job title applied for.
        #[arg(long, default_value = "")]
        job_title: String,

        /// Job description text.
        #[arg(long, default_value = "", conflicts_with = "job_description_file")]
        job_description: String,

        /// Read the job description from this file.
        #[arg(long)]
        job_description_file: Option<PathBuf>,

        /// Maximum accepted PDF size in MiB.
        #[arg(long, env = "RESUMIND_MAX_UPLOAD_MB", default_value_t = 20)]
        max_upload_mb: u64,

        /// HTTP download timeout in seconds.
        #[arg(long, env = "RESUMIND_DOWNLOAD_TIMEOUT", default_value_t = 120)]
        download_timeout: u64,
    },

    /// List stored reviews, newest first.
    List,

    /// Show one stored review.
    Show {
        /// Record id as printed by `analyze` or `list`.
        id: String,
    },

    /// Delete every stored file and record.
    Wipe {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },

    /// Print the signed-in user.
    Whoami,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback that matters while analysing.
    let show_progress = !cli.quiet && !cli.json && matches!(cli.command, Command::Analyze { .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress || cli.json {
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

    // ── Build config and inject the local client ─────────────────────────
    let mut builder = AppConfig::builder()
        .client_name("Local client")
        .data_dir(&cli.data_dir);
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(path);
    }
    if let Command::Analyze {
        max_upload_mb,
        download_timeout,
        ..
    } = &cli.command
    {
        builder = builder
            .max_upload_bytes(max_upload_mb.saturating_mul(1024 * 1024))
            .download_timeout_secs(*download_timeout);
    }
    let config = builder.build().context("Invalid configuration")?;

    let settings = ProviderSettings {
        provider_name: cli.provider.clone(),
        model: cli.model.clone(),
        max_retries: cli.max_retries,
        ..Default::default()
    };

    let rasterizer = Arc::new(Rasterizer::new(&config));
    let client = local_client(&config, &cli.user, settings, Arc::clone(&rasterizer))
        .await
        .with_context(|| format!("Failed to open data directory {:?}", config.data_dir))?;
    let caps = Arc::new(Capabilities::new(Environment::with_client(client), &config));
    if !caps.init().await {
        let reason = caps.state().error.unwrap_or_default();
        bail!("Capability client unavailable: {reason}");
    }

    match cli.command {
        Command::Analyze {
            ref input,
            ref company,
            ref job_title,
            ref job_description,
            ref job_description_file,
            ..
        } => {
            let job_description = match job_description_file {
                Some(path) => tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read job description from {:?}", path))?,
                None => job_description.clone(),
            };

            let file = resolve_input(input, config.max_upload_bytes, config.download_timeout_secs)
                .await
                .with_context(|| format!("Failed to load resume from {input}"))?;
            if !cli.quiet && !cli.json {
                eprintln!(
                    "{} {}",
                    cyan("◆"),
                    bold(&format!("Analysing {} ({})…", file.name, format_size(file.size())))
                );
            }

            let mut uploader = UploadOrchestrator::new(Arc::clone(&caps), rasterizer, &config);
            if show_progress {
                uploader = uploader.with_progress(CliProgressCallback::new() as ProgressCallback);
            }

            let outcome = uploader
                .submit(Submission::new(file).with_job(
                    company.as_str(),
                    job_title.as_str(),
                    job_description,
                ))
                .await
                .context("Analysis failed")?;

            if cli.json {
                print_json(&outcome.record)?;
            } else {
                print_record(&outcome.record);
            }
        }

        Command::List => {
            let summaries = ResumeStore::new(caps)
                .summaries()
                .await
                .context("Failed to list reviews")?;
            if cli.json {
                print_json(&summaries)?;
            } else if summaries.is_empty() {
                println!("No reviews yet. Run `resumind analyze <file>` to add one.");
            } else {
                for summary in &summaries {
                    let badge = match summary.badge {
                        ScoreBadge::Scored(score) => score_colour(score),
                        ScoreBadge::Pending => dim("pending"),
                        ScoreBadge::Unscored => dim("unscored"),
                    };
                    let title = match summary.subtitle {
                        Some(ref sub) => format!("{} {}", bold(&summary.title), dim(sub)),
                        None => bold(&summary.title),
                    };
                    println!(
                        "{}  {:<9}  {}  {}",
                        dim(&summary.created_at.format("%Y-%m-%d %H:%M").to_string()),
                        badge,
                        title,
                        dim(&summary.id),
                    );
                }
            }
        }

        Command::Show { ref id } => {
            let record = ResumeStore::new(caps)
                .get(id)
                .await
                .with_context(|| format!("Failed to load review {id}"))?;
            let Some(record) = record else {
                bail!("No review with id {id}");
            };
            if cli.json {
                print_json(&record)?;
            } else {
                print_record(&record);
            }
        }

        Command::Wipe { yes } => {
            if !yes {
                bail!("Refusing to delete every stored file and record without --yes");
            }
            let report = ResumeStore::new(caps).wipe().await.context("Wipe failed")?;
            if cli.json {
                print_json(&report)?;
            } else if !cli.quiet {
                eprintln!(
                    "{} Deleted {} files; records {}",
                    green("✔"),
                    bold(&report.files_deleted.to_string()),
                    if report.kv_flushed { "flushed" } else { "not flushed" },
                );
            }
        }

        Command::Whoami => {
            let Some(user) = caps.auth().get_user() else {
                bail!("Not signed in");
            };
            if cli.json {
                print_json(&user)?;
            } else {
                println!("{}  {}", bold(&user.username), dim(&user.uuid));
            }
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

fn print_record(record: &ResumeRecord) {
    let heading = match (record.company_name.is_empty(), record.job_title.is_empty()) {
        (false, false) => format!("{}: {}", record.company_name, record.job_title),
        (false, true) => record.company_name.clone(),
        (true, false) => record.job_title.clone(),
        (true, true) => "Resume".to_string(),
    };
    println!("{}", bold(&heading));
    println!(
        "{}",
        dim(&format!(
            "{}  {}  {}",
            record.id,
            record.resume_path,
            record.created_at.format("%Y-%m-%d %H:%M")
        ))
    );
    println!();

    match &record.feedback {
        Feedback::Pending => println!("{}", dim("Analysis pending.")),
        Feedback::Raw(text) => println!("{text}"),
        Feedback::Structured(report) => print_report(report),
    }
}

fn print_report(report: &FeedbackReport) {
    println!("Overall  {}", score_colour(report.overall_score));
    println!();
    for (heading, category) in report.categories() {
        println!("{}  {}", bold(&format!("{heading:<13}")), score_colour(category.score));
        for tip in &category.tips {
            let mark = match tip.kind {
                TipKind::Good => green("✓"),
                TipKind::Improve => cyan("!"),
            };
            println!("  {mark} {}", tip.tip);
            if let Some(ref explanation) = tip.explanation {
                println!("    {}", dim(explanation));
            }
        }
    }
}
