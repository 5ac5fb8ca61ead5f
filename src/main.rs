//! CLI entry point for `eml2pdf`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::error;

use eml2pdf::body::images::{HttpFetcher, ImageFetcher};
use eml2pdf::config::{self, Config};
use eml2pdf::convert::{self, ConvertOptions, RunReport, RunStatus};
use eml2pdf::error::ConvertError;
use eml2pdf::export::pdf::{RenderEnvironment, Wkhtmltopdf};
use eml2pdf::parser::eml::read_input;

/// Convert an email into a PDF of its body plus its attachments.
#[derive(Parser)]
#[command(name = "eml2pdf", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Email to convert ("-" reads stdin)
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    input_file: String,

    /// Character encoding of the input (transcoded to UTF-8 before parsing)
    #[arg(long, value_name = "ENCODING")]
    input_encoding: Option<String>,

    /// Output PDF path; must not exist. Defaults to a timestamped name in the output directory
    #[arg(short, long, value_name = "FILE")]
    output_file: Option<PathBuf>,

    /// Directory for the PDF and the attachments; must exist
    #[arg(short = 'd', long, value_name = "DIR")]
    output_directory: Option<PathBuf>,

    /// Don't render the body, only extract attachments
    #[arg(long, conflicts_with = "no_attachments")]
    no_body: bool,

    /// Don't extract attachments, only render the body
    #[arg(long)]
    no_attachments: bool,

    /// Print Subject, From, To and Date above the body
    #[arg(long)]
    headers: bool,

    /// Prefix attachment names with today's date unless they contain one
    #[arg(long)]
    add_prefix_date: bool,

    /// Skip attachments that have no filename
    #[arg(long)]
    ignore_floating_attachments: bool,

    /// Don't exit with a failure status for warnings; still write the sidecar files
    #[arg(long, conflicts_with = "verbose")]
    mostly_hide_warnings: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print a JSON report of the run to stdout
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let generated = match cli.command {
        Some(Commands::Completions { shell }) => Some(cmd_completions(shell)),
        Some(Commands::Manpage) => Some(cmd_manpage()),
        None => None,
    };
    if let Some(result) = generated {
        return match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {e:?}");
                ExitCode::from(RunStatus::Internal.code())
            }
        };
    }

    // Load configuration
    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 if cli.mostly_hide_warnings => "error",
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let status = cmd_convert(&cli, &config);
    ExitCode::from(status.code())
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "eml2pdf.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
        tracing::debug!(path = %config::log_file_path(config).display(), "Logging to file");
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Command-line flags layered over the configuration file.
fn build_options(cli: &Cli, config: &Config) -> ConvertOptions {
    ConvertOptions {
        output_file: cli.output_file.clone(),
        output_directory: cli
            .output_directory
            .clone()
            .or_else(|| config.output.default_output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(".")),
        body: !cli.no_body,
        attachments: !cli.no_attachments,
        headers: cli.headers || config.output.headers,
        add_prefix_date: cli.add_prefix_date || config.output.add_prefix_date,
        ignore_floating_attachments: cli.ignore_floating_attachments
            || config.output.ignore_floating_attachments,
        image_blacklist: config.images.load_blacklist.clone(),
        render_env: RenderEnvironment::from_process(config.render.extra_benign_patterns.clone()),
    }
}

/// Run one conversion and report its outcome.
fn cmd_convert(cli: &Cli, config: &Config) -> RunStatus {
    let options = build_options(cli, config);
    tracing::info!(
        input = %cli.input_file,
        output_directory = %options.output_directory.display(),
        body = options.body,
        attachments = options.attachments,
        "Options used"
    );

    let renderer = Wkhtmltopdf::new(config.render.command.clone());
    let result = read_input(&cli.input_file, cli.input_encoding.as_deref()).and_then(|input| {
        let fetcher = if options.body && config.images.check_remote {
            Some(HttpFetcher::new()?)
        } else {
            None
        };
        convert::run(
            &options,
            &input,
            &renderer,
            fetcher.as_ref().map(|f| f as &dyn ImageFetcher),
        )
    });

    let status = RunStatus::classify(&result, cli.mostly_hide_warnings);
    match &result {
        Ok(report) => {
            if cli.json {
                if let Err(e) = print_report_json(report) {
                    eprintln!("Error: {e:?}");
                    return RunStatus::Internal;
                }
            }
        }
        Err(e) if e.is_fatal() => error!("{e}"),
        Err(e) => print_internal_error(e),
    }
    status
}

/// Unexpected failures get the full error chain.
fn print_internal_error(e: &ConvertError) {
    eprintln!("Unexpected error: {e}");
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
    eprintln!("{e:?}");
}

/// Print the run report as JSON, with human-readable attachment sizes.
fn print_report_json(report: &RunReport) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let mut value = serde_json::to_value(report)?;
    if let Some(items) = value.get_mut("attachments").and_then(|a| a.as_array_mut()) {
        for (item, attachment) in items.iter_mut().zip(&report.attachments) {
            item["size_human"] = serde_json::Value::String(format_size(attachment.size, BINARY));
        }
    }
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "eml2pdf", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
