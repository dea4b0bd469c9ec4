//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use pricedoc_core::clock::SystemClock;
use pricedoc_core::export;
use pricedoc_core::pipeline::{
    ProgressReporter, TransformConfig, TransformResult, resolve_platforms, transform_csv,
};
use pricedoc_shared::{
    AppConfig, OutputFormat, init_config, load_config, load_config_from, validate_config,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// pricedoc — turn flat pricing exports into nested documents.
#[derive(Parser)]
#[command(
    name = "pricedoc",
    version,
    about = "Convert a retail-pricing CSV export into document-database JSON.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.pricedoc/pricedoc.toml.
    #[arg(long = "config", global = true, env = "PRICEDOC_CONFIG")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Export format flag.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum FormatArg {
    Json,
    Jsonl,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Jsonl => OutputFormat::Jsonl,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Transform a CSV export into documents.
    Transform(TransformArgs),

    /// List the platform columns that would be read.
    Platforms {
        /// Discover platforms from this CSV header instead of the config.
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments for `pricedoc transform`.
#[derive(clap::Args)]
pub(crate) struct TransformArgs {
    /// CSV file to transform.
    pub csv: PathBuf,

    /// Stop after this many documents.
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Batch label for `metadata.data_source` (defaults to the file stem).
    #[arg(short, long)]
    pub data_source: Option<String>,

    /// Write documents to this file instead of printing a sample.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Output format for --out.
    #[arg(short, long)]
    pub format: Option<FormatArg>,

    /// Only write the first N documents to --out.
    #[arg(long, requires = "out")]
    pub sample: Option<usize>,

    /// CSV field delimiter (use \t for tab).
    #[arg(long)]
    pub delimiter: Option<String>,

    /// Read every "<Name> MRP" header column as a platform.
    #[arg(long)]
    pub discover_platforms: bool,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pricedoc=info",
        1 => "pricedoc=debug",
        _ => "pricedoc=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_file;
    match cli.command {
        Command::Transform(args) => cmd_transform(config_path.as_deref(), args),
        Command::Platforms { csv } => cmd_platforms(config_path.as_deref(), csv),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

/// Load the config file named by `--config`, or the default one.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_transform(config_path: Option<&Path>, args: TransformArgs) -> Result<()> {
    let mut app = resolve_config(config_path)?;

    // Flags override config file values.
    if let Some(label) = args.data_source {
        app.defaults.data_source = Some(label);
    }
    if args.limit.is_some() {
        app.defaults.limit = args.limit;
    }
    if let Some(delimiter) = args.delimiter {
        app.defaults.delimiter = delimiter;
    }
    if let Some(format) = args.format {
        app.defaults.format = format.into();
    }
    if args.discover_platforms {
        app.defaults.discover_platforms = true;
    }
    validate_config(&app)?;

    if !args.csv.exists() {
        return Err(eyre!("CSV file not found: '{}'", args.csv.display()));
    }

    let config = TransformConfig::new(&args.csv, &app)?;

    info!(
        csv = %args.csv.display(),
        data_source = %config.data_source,
        limit = ?config.limit,
        "transforming pricing export"
    );

    let reporter = CliProgress::new()?;
    let result = transform_csv(&config, SystemClock, &reporter)?;

    match &args.out {
        Some(out) => {
            let written = export::write_documents(
                out,
                &result.documents,
                app.defaults.format,
                args.sample,
            )?;
            println!("  Wrote {written} documents to {}", out.display());
        }
        None => match result.documents.first() {
            Some(doc) => {
                println!("Sample document structure:");
                println!("{}", serde_json::to_string_pretty(doc)?);
            }
            None => println!("No documents produced."),
        },
    }

    print_summary(&result);
    Ok(())
}

fn print_summary(result: &TransformResult) {
    println!();
    println!("  Transform complete!");
    println!("  Source:    {}", result.data_source);
    println!("  Platforms: {}", result.platforms.names().join(", "));
    println!("  Rows read: {}", result.rows_read);
    println!("  Documents: {}", result.documents.len());
    println!("  Skipped:   {}", result.skipped.len());
    println!("  Warnings:  {}", result.warnings.len());
    println!("  Time:      {:.2}s", result.elapsed.as_secs_f64());

    for malformed in result.skipped.iter().take(5) {
        println!("    - {malformed}");
    }
    if result.skipped.len() > 5 {
        println!("    ... and {} more", result.skipped.len() - 5);
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Ok(Self { spinner })
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn document_built(&self, sku: &str, count: usize) {
        self.spinner.set_message(format!("Transforming [{count}] {sku}"));
    }

    fn done(&self, _result: &TransformResult) {
        self.spinner.finish_and_clear();
    }
}

fn cmd_platforms(config_path: Option<&Path>, csv: Option<PathBuf>) -> Result<()> {
    let mut app = resolve_config(config_path)?;

    let platforms = match csv {
        Some(path) => {
            app.defaults.discover_platforms = true;
            let config = TransformConfig::new(&path, &app)?;
            resolve_platforms(&config)?
        }
        None => app.platform_set()?,
    };

    if platforms.is_empty() {
        println!("No platform columns found.");
        return Ok(());
    }

    for (i, platform) in platforms.iter().enumerate() {
        println!("  {:>2}. {:<12} <- {}", i + 1, platform.name, platform.column);
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
