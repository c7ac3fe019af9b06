//! CLI binary for edgequake-doc2json.
//!
//! A thin shim over the library crate: flags map to `EngineConfig` /
//! `LlmConfig`, outcomes are printed as JSON on stdout, and the exit status
//! is non-zero when any outcome is a failure.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_doc2json::{
    extract_from_file, BatchProgressCallback, ConversionOutcome, DocumentEngine, EngineConfig,
    ExtractionTemplate, LlmConfig, ProgressCallback, ProviderKind, StructuredExtractor,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar for batch conversion. Files finish out of order, so each
/// completion prints its own line above the bar.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos:>3}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_item_start(&self, _index: usize, _total: usize, input: &Path) {
        self.bar.set_message(input.display().to_string());
    }

    fn on_item_complete(&self, index: usize, total: usize, outcome: &ConversionOutcome) {
        let line = match outcome {
            ConversionOutcome::Success {
                output_path,
                file_size,
                ..
            } => format!(
                "  {} {:>3}/{:<3} {}  {}",
                green("✓"),
                index + 1,
                total,
                output_path.display(),
                dim(&format!("{file_size} bytes"))
            ),
            ConversionOutcome::Failure { error, .. } => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                format!("  {} {:>3}/{:<3} {}", red("✗"), index + 1, total, error)
            }
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();
        let mark = if failed == 0 { green("✔") } else { red("✘") };
        eprintln!("{mark}  {success_count}/{total} files converted");
    }
}

// ── CLI definition ───────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  doc2json convert report.docx --to pdf
  doc2json convert *.xlsx --to csv --concurrency 4
  doc2json text scan.pdf -o scan.txt
  doc2json extract invoice.docx --template invoice.json

ENVIRONMENT:
  LLM_PROVIDER        openai (default), anthropic, or any edgequake-llm provider
  LLM_MODEL           Model ID (default: gpt-3.5-turbo)
  LLM_API_KEY         API key (falls back to OPENAI_API_KEY / ANTHROPIC_API_KEY)
  LLM_BASE_URL        Override the provider's API base URL
  LLM_TEMPERATURE     Sampling temperature (default: 0.1)
  LLM_MAX_TOKENS      Output token ceiling (default: 4000)
  DOC2JSON_CONVERTER  Converter executable (default: libreoffice)
  PDFIUM_LIB_PATH     pdfium shared library, or the directory holding it
"#;

/// Convert office documents and extract structured JSON with LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "doc2json",
    version,
    about = "Convert office documents and extract structured JSON with LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    engine: EngineArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOC2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "DOC2JSON_QUIET")]
    quiet: bool,
}

#[derive(Args, Debug)]
struct EngineArgs {
    /// Storage root; converted files go to <storage>/conversions.
    #[arg(long, global = true, env = "DOC2JSON_STORAGE", default_value = "./storage")]
    storage: PathBuf,

    /// Converter executable (libreoffice, soffice, …).
    #[arg(long, global = true, env = "DOC2JSON_CONVERTER")]
    converter: Option<String>,

    /// Converter timeout in seconds.
    #[arg(long, global = true, env = "DOC2JSON_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Pass explicit LibreOffice export filters (`pdf:writer_pdf_Export`).
    #[arg(long, global = true, env = "DOC2JSON_EXPLICIT_FILTERS")]
    explicit_filters: bool,

    /// pdfium shared library, or the directory holding it.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert documents with the external converter.
    Convert {
        /// Input documents.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Target format: pdf, txt, csv, html.
        #[arg(long = "to", default_value = "pdf")]
        format: String,

        /// Maximum concurrent converter runs.
        #[arg(short, long, env = "DOC2JSON_CONCURRENCY", default_value_t = 2)]
        concurrency: usize,

        /// Disable the progress bar.
        #[arg(long)]
        no_progress: bool,
    },

    /// Print the plain text of a document.
    Text {
        input: PathBuf,

        /// Write text to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract a JSON record from a document with a template.
    Extract {
        input: PathBuf,

        /// Template JSON file.
        #[arg(short, long)]
        template: PathBuf,

        #[command(flatten)]
        llm: LlmArgs,
    },
}

#[derive(Args, Debug)]
struct LlmArgs {
    /// LLM provider: openai, anthropic, ollama, gemini, …
    #[arg(long, env = "LLM_PROVIDER", default_value = "openai")]
    provider: String,

    /// Model ID.
    #[arg(long, env = "LLM_MODEL", default_value = "gpt-3.5-turbo")]
    model: String,

    /// API key.
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API base URL override.
    #[arg(long, env = "LLM_BASE_URL")]
    base_url: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "LLM_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Output token ceiling.
    #[arg(long, env = "LLM_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: usize,

    /// HTTP timeout per LLM call, in seconds.
    #[arg(long, env = "LLM_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
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
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let engine = DocumentEngine::new(build_engine_config(&cli.engine)?);

    match cli.command {
        Command::Convert {
            ref inputs,
            ref format,
            concurrency,
            no_progress,
        } => {
            let progress: Option<ProgressCallback> = if !cli.quiet && !no_progress {
                Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
            } else {
                None
            };
            let outcomes = engine
                .convert_batch_with_progress(inputs, format, concurrency, progress.as_ref())
                .await;

            let json = if outcomes.len() == 1 {
                serde_json::to_string_pretty(&outcomes[0])
            } else {
                serde_json::to_string_pretty(&outcomes)
            }
            .context("Failed to serialise outcomes")?;
            println!("{json}");

            let failed = outcomes.iter().filter(|o| !o.is_success()).count();
            if failed > 0 {
                bail!("{failed} of {} conversions failed", outcomes.len());
            }
        }

        Command::Text {
            ref input,
            ref output,
        } => {
            let text = engine.extract_text(input).await;
            match output {
                Some(path) => tokio::fs::write(path, &text)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => {
                    let mut handle = io::stdout().lock();
                    handle
                        .write_all(text.as_bytes())
                        .context("Failed to write to stdout")?;
                    if !text.ends_with('\n') {
                        handle.write_all(b"\n").ok();
                    }
                }
            }
        }

        Command::Extract {
            ref input,
            ref template,
            ref llm,
        } => {
            let template = ExtractionTemplate::from_json_file(template)
                .await
                .context("Failed to load template")?;
            let extractor = StructuredExtractor::from_config(&build_llm_config(llm)?)
                .context("Failed to configure LLM provider")?;

            let spinner = (!cli.quiet).then(|| {
                let bar = ProgressBar::new_spinner();
                bar.set_message(format!(
                    "{} / {} on {}",
                    extractor.provider_name(),
                    extractor.model(),
                    input.display()
                ));
                bar.enable_steady_tick(Duration::from_millis(80));
                bar
            });

            let outcome = extract_from_file(&engine, &extractor, input, &template).await;
            if let Some(bar) = spinner {
                bar.finish_and_clear();
            }

            println!(
                "{}",
                serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?
            );
            if !outcome.is_success() {
                bail!(
                    "Extraction failed: {}",
                    outcome.error_message().unwrap_or("unknown error")
                );
            }
            if !cli.quiet {
                eprintln!(
                    "{}  {} in {:.1}s",
                    green("✔"),
                    template.name,
                    outcome.elapsed_ms() as f64 / 1000.0
                );
            }
        }
    }

    Ok(())
}

fn build_engine_config(args: &EngineArgs) -> Result<EngineConfig> {
    let mut builder = EngineConfig::builder()
        .storage_root(&args.storage)
        .converter_timeout_secs(args.timeout)
        .explicit_filters(args.explicit_filters);
    if let Some(ref program) = args.converter {
        builder = builder.converter_program(program);
    }
    if let Some(ref lib) = args.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    builder.build().context("Invalid engine configuration")
}

fn build_llm_config(args: &LlmArgs) -> Result<LlmConfig> {
    let provider: ProviderKind = args.provider.parse().context("Invalid --provider")?;
    let mut builder = LlmConfig::builder()
        .provider(provider)
        .model(&args.model)
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .request_timeout_secs(args.api_timeout);
    if let Some(ref key) = args.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref url) = args.base_url {
        builder = builder.base_url(url);
    }
    builder.build().context("Invalid LLM configuration")
}
