//! CLI binary for contract-reader.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` / `ModelConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contract_reader::{
    AnalysisResult, ContractAnalyzer, ContractError, Delimiter, DocumentFormat, ExtractedText,
    ExtractionConfig, ExtractionMethod, ExtractionObserver, ExtractionPipeline, LlmService,
    ModelConfig, TextTable,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner while the text layer is read, switching to a
/// page bar if the OCR fallback kicks in.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Reading");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("OCR");
        self.bar.reset_eta();
    }
}

impl ExtractionObserver for CliObserver {
    fn on_extraction_start(&self, filename: &str, format: DocumentFormat) {
        self.bar.set_message(format!("{filename} ({format})"));
    }

    fn on_direct_complete(&self, format: DocumentFormat, chars: usize) {
        if chars > 0 {
            self.bar
                .set_message(format!("{format} text layer: {chars} chars"));
        }
    }

    fn on_ocr_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "No text layer found; running OCR on {total_pages} pages…"
            ))
        ));
    }

    fn on_ocr_page(&self, page: usize, total: usize, chars: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page,
            total,
            dim(&format!("{chars:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, method: ExtractionMethod, chars: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} chars extracted {}",
            green("✔"),
            bold(&chars.to_string()),
            dim(&format!("({method})"))
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Plain text of a contract (stdout)
  contract-reader extract lease.pdf

  # Structure only, no OCR and no API key needed
  contract-reader inspect signed-scan.pdf

  # Ask a question
  contract-reader ask nda.docx "When does the confidentiality obligation end?"

  # Six-category risk analysis as JSON
  contract-reader analyze supply-agreement.pdf > risks.json

  # Tabulate a pipe-separated fee schedule into CSV
  contract-reader table --delimiter pipe --header-line 3 msa.docx -o fees.csv

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID (used together with the provider)
  PDFIUM_LIB_PATH         libpdfium file or directory, needed for OCR only

OCR:
  Scanned PDFs without a text layer are rasterised with pdfium and read with
  tesseract. Both are needed only for such documents:
    Debian/Ubuntu:  apt install tesseract-ocr
    macOS:          brew install tesseract
"#;

/// Read contracts (PDF, DOCX) and analyse them with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "contract-reader",
    version,
    about = "Extract text from contracts (PDF, DOCX) and analyse them with an LLM",
    long_about = "Extract the text of PDF and DOCX contracts, falling back to OCR for scanned \
PDFs, then ask questions about them or run a structured six-category risk analysis through \
Google Gemini, OpenAI, Anthropic or any provider supported by edgequake-llm.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// OCR rasterisation DPI (72–600).
    #[arg(long, global = true, env = "CONTRACT_READER_OCR_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    ocr_dpi: u32,

    /// Tesseract language pack(s), e.g. eng or eng+deu.
    #[arg(long, global = true, env = "CONTRACT_READER_OCR_LANGUAGE", default_value = "eng")]
    ocr_language: String,

    /// Tesseract binary.
    #[arg(long, global = true, env = "CONTRACT_READER_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// libpdfium file or directory (falls back to PDFIUM_LIB_PATH, then the system library).
    #[arg(long, global = true, env = "CONTRACT_READER_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, global = true, env = "CONTRACT_READER_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (default: gemini-2.0-flash).
    #[arg(long, global = true, env = "CONTRACT_READER_MODEL")]
    model: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "CONTRACT_READER_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, global = true, env = "CONTRACT_READER_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Retries on rate-limit or transient LLM failures (0-10).
    #[arg(
        long,
        global = true,
        env = "CONTRACT_READER_MAX_RETRIES",
        default_value_t = 2,
        value_parser = clap::value_parser!(u32).range(0..=10)
    )]
    max_retries: u32,

    /// LLM call timeout in seconds.
    #[arg(long, global = true, env = "CONTRACT_READER_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Emit JSON (results and errors) instead of plain text.
    #[arg(long, global = true, env = "CONTRACT_READER_JSON")]
    json: bool,

    /// Disable the progress display.
    #[arg(long, global = true, env = "CONTRACT_READER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "CONTRACT_READER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "CONTRACT_READER_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the extracted text of a document.
    Extract {
        /// PDF or DOCX file.
        file: PathBuf,
        /// Write the text to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show format, page/paragraph count and whether OCR would be needed.
    Inspect {
        /// PDF or DOCX file.
        file: PathBuf,
    },
    /// Ask a question about a document.
    Ask {
        /// PDF or DOCX file.
        file: PathBuf,
        /// The question.
        question: String,
    },
    /// Run the six-category contract risk analysis.
    Analyze {
        /// PDF or DOCX file.
        file: PathBuf,
    },
    /// Split the extracted text into a table and print it as CSV.
    Table {
        /// PDF or DOCX file.
        file: PathBuf,
        /// Non-blank line (1-based) holding the column names.
        #[arg(long, default_value_t = 1)]
        header_line: usize,
        /// Column delimiter.
        #[arg(long, value_enum, default_value = "tab")]
        delimiter: DelimiterArg,
        /// Write the CSV to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum DelimiterArg {
    Tab,
    Comma,
    Semicolon,
    Pipe,
    Whitespace,
}

impl From<DelimiterArg> for Delimiter {
    fn from(v: DelimiterArg) -> Self {
        match v {
            DelimiterArg::Tab => Delimiter::Tab,
            DelimiterArg::Comma => Delimiter::Comma,
            DelimiterArg::Semicolon => Delimiter::Semicolon,
            DelimiterArg::Pipe => Delimiter::Pipe,
            DelimiterArg::Whitespace => Delimiter::Whitespace,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress display is active;
    // it provides all the feedback that matters to the user.
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

    match run(&cli, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e, cli.json);
            ExitCode::FAILURE
        }
    }
}

/// Print a failure: the structured report in JSON mode, the context chain otherwise.
fn report_error(e: &anyhow::Error, json: bool) {
    let contract_err = e.downcast_ref::<ContractError>();

    if json {
        let value = match contract_err {
            Some(ce) => serde_json::to_value(ce.report()),
            None => Ok(serde_json::json!({
                "kind": "internal",
                "code": "internal",
                "status": 500,
                "detail": format!("{e:#}"),
            })),
        };
        match value.and_then(|v| serde_json::to_string_pretty(&v)) {
            Ok(s) => println!("{s}"),
            Err(_) => eprintln!("{} {e:#}", red("✘")),
        }
        return;
    }

    let code = contract_err
        .map(|ce| format!(" [{}]", ce.kind()))
        .unwrap_or_default();
    eprintln!("{}{} {:#}", red("✘"), dim(&code), e);
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    match &cli.command {
        Command::Extract { file, output } => {
            let text = extract_file(cli, file, show_progress).await?;
            if cli.json {
                print_json(&text)?;
            } else if let Some(path) = output {
                std::fs::write(path, text.as_str())
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                if !cli.quiet {
                    eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
                }
            } else {
                write_stdout(text.as_str())?;
            }
        }

        Command::Inspect { file } => {
            let (name, bytes) = read_upload(file)?;
            let pipeline = ExtractionPipeline::new(build_extraction_config(cli, None)?);
            let info = pipeline
                .inspect(&name, &bytes)
                .context("Failed to inspect document")?;

            if cli.json {
                print_json(&info)?;
            } else {
                println!("File:         {}", info.filename);
                println!("Format:       {}", info.format);
                println!("Size:         {} bytes", info.size_bytes);
                if let Some(pages) = info.pages {
                    println!("Pages:        {}", pages);
                }
                if let Some(paras) = info.paragraphs {
                    println!("Paragraphs:   {}", paras);
                }
                println!(
                    "Text layer:   {}",
                    if info.has_text_layer {
                        "yes".to_string()
                    } else if info.format == DocumentFormat::Pdf {
                        "no (OCR will be used)".to_string()
                    } else {
                        "no".to_string()
                    }
                );
            }
        }

        Command::Ask { file, question } => {
            let text = extract_file(cli, file, show_progress).await?;
            let analyzer = build_analyzer(cli)?;
            let answer = analyzer
                .ask(text.as_str(), question)
                .await
                .context("Question failed")?;

            if cli.json {
                print_json(&serde_json::json!({ "answer": answer }))?;
            } else {
                write_stdout(&answer)?;
            }
        }

        Command::Analyze { file } => {
            let text = extract_file(cli, file, show_progress).await?;
            let analyzer = build_analyzer(cli)?;
            let analysis = analyzer
                .analyze_risks(text.as_str())
                .await
                .context("Risk analysis failed")?;

            if cli.json {
                print_json(&serde_json::json!({ "analysis": analysis }))?;
            } else {
                print_analysis(&analysis)?;
            }
        }

        Command::Table {
            file,
            header_line,
            delimiter,
            output,
        } => {
            let text = extract_file(cli, file, show_progress).await?;
            let table = TextTable::from_text(text.as_str(), *header_line, delimiter.clone().into())
                .context("Failed to tabulate text")?;

            if table.is_empty() {
                if !cli.quiet {
                    eprintln!("{} No tabular data detected in the document.", cyan("⚠"));
                }
            } else if cli.json {
                print_json(&table)?;
            } else if let Some(path) = output {
                std::fs::write(path, table.to_csv())
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                if !cli.quiet {
                    eprintln!(
                        "{}  {} rows  →  {}",
                        green("✔"),
                        table.rows.len(),
                        bold(&path.display().to_string())
                    );
                }
            } else {
                write_stdout(&table.to_csv())?;
            }
        }
    }

    Ok(())
}

/// Read a file and return its declared name (for format detection) and bytes.
fn read_upload(file: &Path) -> Result<(String, Vec<u8>)> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    Ok((name, bytes))
}

async fn extract_file(cli: &Cli, file: &Path, show_progress: bool) -> Result<ExtractedText> {
    let (name, bytes) = read_upload(file)?;

    let observer: Option<Arc<dyn ExtractionObserver>> = if show_progress {
        Some(CliObserver::new() as Arc<dyn ExtractionObserver>)
    } else {
        None
    };

    let pipeline = ExtractionPipeline::new(build_extraction_config(cli, observer)?);
    pipeline
        .extract_async(name, bytes)
        .await
        .with_context(|| format!("Failed to extract text from {}", file.display()))
}

/// Map CLI args to `ExtractionConfig`.
fn build_extraction_config(
    cli: &Cli,
    observer: Option<Arc<dyn ExtractionObserver>>,
) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .ocr_dpi(cli.ocr_dpi)
        .ocr_language(cli.ocr_language.clone())
        .tesseract_path(cli.tesseract.clone());

    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib.clone());
    }
    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}

/// Map CLI args to `ModelConfig` and build the analyzer.
fn build_analyzer(cli: &Cli) -> Result<ContractAnalyzer> {
    let mut builder = ModelConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }

    let config = builder.build().context("Invalid configuration")?;
    let service = LlmService::from_config(&config).context("Failed to initialise LLM provider")?;
    Ok(ContractAnalyzer::new(Arc::new(service)))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

fn write_stdout(s: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(s.as_bytes())
        .context("Failed to write to stdout")?;
    if !s.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

/// Human-readable rendering of a risk analysis.
fn print_analysis(analysis: &AnalysisResult) -> Result<()> {
    let Some(report) = analysis.risk_report() else {
        // Raw reply or unexpected JSON: show it as-is.
        return match analysis {
            AnalysisResult::Raw { raw_analysis } => write_stdout(raw_analysis),
            other => print_json(other),
        };
    };

    println!(
        "{}  {}",
        bold("Overall risk:"),
        bold(&report.overall_risk_level)
    );
    for cat in &report.risk_categories {
        println!();
        println!("{} {}  {}", cyan("◆"), bold(&cat.category), dim(&cat.level));
        if !cat.description.is_empty() {
            println!("  {}", cat.description);
        }
        for clause in &cat.specific_clauses {
            println!("  {} {}", dim("clause:"), clause);
        }
        for rec in &cat.recommendations {
            println!("  {} {}", green("→"), rec);
        }
    }
    if !report.key_concerns.is_empty() {
        println!();
        println!("{}", bold("Key concerns:"));
        for c in &report.key_concerns {
            println!("  {} {}", red("•"), c);
        }
    }
    if !report.missing_protections.is_empty() {
        println!();
        println!("{}", bold("Missing protections:"));
        for m in &report.missing_protections {
            println!("  • {}", m);
        }
    }
    if !report.summary.is_empty() {
        println!();
        println!("{}", report.summary);
    }
    Ok(())
}
