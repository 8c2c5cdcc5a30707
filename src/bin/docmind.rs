//! CLI binary for docmind.
//!
//! A thin shim over the library crate that drives one workflow run: submit,
//! show the detected category, confirm, extract, print/export the table.

use anyhow::{Context, Result};
use clap::Parser;
use docmind::{
    default_csv_filename, export_csv, GatewayConfig, GeminiGateway, Session, WorkflowController,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Classify and extract, interactive confirmation
  docmind invoice.pdf

  # Non-interactive, export CSV next to the terminal output
  docmind invoice.pdf --yes -o invoice.csv

  # CSV named after the detected category (Invoice_data.csv, ...)
  docmind statement.pdf --yes --csv

  # Raw JSON reply instead of the rendered table
  docmind report.pdf --yes --json

  # Use a different model
  docmind --model gemini-2.5-pro claim.pdf

CATEGORIES:
  The classifier answers with one of: Invoice, Medical, Education, Insurance.
  Unrecognised replies fall back to "Unknown"; extraction still runs, the
  prompt just loses its category hint.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY       API key for the hosted model service (required)
  DOCMIND_MODEL        Override model ID
  DOCMIND_BASE_URL     Override service base URL (e.g. a local emulator)

SETUP:
  1. Set API key:   export GEMINI_API_KEY=...
  2. Run:           docmind document.pdf
"#;

/// Classify a PDF document and extract its fields as a table.
#[derive(Parser, Debug)]
#[command(
    name = "docmind",
    version,
    about = "Classify PDF documents and extract structured field data using a hosted LLM",
    long_about = "Upload a PDF to a hosted LLM file API, detect its category \
(Invoice, Medical, Education, Insurance), extract the category's fields, and \
render the result as a table with optional CSV export.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Write the extracted table as CSV to this file.
    #[arg(short, long, env = "DOCMIND_OUTPUT")]
    output: Option<PathBuf>,

    /// Write CSV to <Category>_data.csv in the current directory.
    #[arg(long, conflicts_with = "output")]
    csv: bool,

    /// Skip the confirmation prompt between classification and extraction.
    #[arg(short = 'y', long)]
    yes: bool,

    /// Print the raw JSON extraction reply instead of the rendered table.
    #[arg(long)]
    json: bool,

    /// Model ID used for classification and extraction.
    #[arg(long, env = "DOCMIND_MODEL")]
    model: Option<String>,

    /// Base URL of the model service.
    #[arg(long, env = "DOCMIND_BASE_URL")]
    base_url: Option<String>,

    /// API key; falls back to GEMINI_API_KEY.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Upload timeout in seconds.
    #[arg(long, env = "DOCMIND_UPLOAD_TIMEOUT", default_value_t = 120)]
    upload_timeout: u64,

    /// Per-generation-call timeout in seconds.
    #[arg(long, env = "DOCMIND_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Disable the spinner.
    #[arg(long, env = "DOCMIND_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCMIND_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the table itself.
    #[arg(short, long, env = "DOCMIND_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build gateway + controller ───────────────────────────────────────
    let config = build_config(&cli)?;
    let gateway = GeminiGateway::new(config).context("Failed to initialise the model gateway")?;
    let controller = WorkflowController::new(Arc::new(gateway));
    let mut session = Session::new();

    let show_progress = !cli.quiet && !cli.no_progress;

    // ── Stage 1+2: upload and classify ───────────────────────────────────
    let spinner = start_spinner(show_progress, "Uploading and analyzing document…");
    let submitted = controller.submit_document(&mut session, &cli.input).await;
    finish_spinner(spinner);

    let category = match submitted {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}", red("✘"), e);
            std::process::exit(1);
        }
    };

    if !cli.quiet {
        eprintln!(
            "{} Document detected as: {}",
            green("✔"),
            bold(&category)
        );
    }

    // ── Confirm advance ──────────────────────────────────────────────────
    if !cli.yes && !confirm(&format!("Extract data for {category}? [Y/n] "))? {
        eprintln!("{}", dim("Aborted before extraction."));
        return Ok(());
    }

    // ── Stage 3: extract ─────────────────────────────────────────────────
    let spinner = start_spinner(
        show_progress,
        &format!("Extracting details for {category}…"),
    );
    let extracted = controller.extract(&mut session).await;
    finish_spinner(spinner);

    let table = match extracted {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{} Extraction failed: {}", red("✘"), e);
            std::process::exit(1);
        }
    };

    // ── Output ───────────────────────────────────────────────────────────
    if cli.json {
        let raw = session.raw_result().cloned().unwrap_or_default();
        println!(
            "{}",
            serde_json::to_string_pretty(&raw).context("Failed to serialise reply")?
        );
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(table.render_text().as_bytes())
            .context("Failed to write to stdout")?;
    }

    let csv_path = if cli.csv {
        Some(PathBuf::from(default_csv_filename(&category)))
    } else {
        cli.output.clone()
    };

    if let Some(path) = csv_path {
        export_csv(&table, &path)
            .await
            .context("CSV export failed")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} rows  →  {}",
                green("✔"),
                table.rows.len(),
                bold(&path.display().to_string()),
            );
        }
    } else if !cli.quiet {
        eprintln!(
            "{}",
            dim(&format!(
                "{} columns × {} rows extracted",
                table.headers.len(),
                table.rows.len()
            ))
        );
    }

    Ok(())
}

/// Map CLI args to `GatewayConfig`.
fn build_config(cli: &Cli) -> Result<GatewayConfig> {
    let mut builder = GatewayConfig::builder()
        .upload_timeout_secs(cli.upload_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }

    builder.build().context("Invalid configuration")
}

/// Ask a yes/no question on stderr; empty answer means yes.
fn confirm(question: &str) -> Result<bool> {
    eprint!("{} {}", cyan("?"), question);
    io::stderr().flush().ok();

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    let answer = answer.trim().to_lowercase();
    Ok(answer.is_empty() || answer == "y" || answer == "yes")
}

fn start_spinner(enabled: bool, message: &str) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    Some(bar)
}

fn finish_spinner(bar: Option<ProgressBar>) {
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
}
