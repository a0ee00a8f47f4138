use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gcp_inventory::config::Config;
use gcp_inventory::crawler::{run_crawler, CrawlOptions};
use gcp_inventory::gcp::client::{ApiClient, BlockingClient, GcpClient};
use gcp_inventory::gcp::http::format_gcp_error;
use gcp_inventory::progress::{CrawlProgress, Summary};
use gcp_inventory::resource;
use gcp_inventory::storage::JsonLinesStorage;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Crawl a GCP resource hierarchy into a JSON-lines inventory
#[derive(Parser, Debug)]
#[command(name = "gcp-inventory", version = gcp_inventory::VERSION, about, long_about = None)]
struct Args {
    /// Root resource: organizations/<id>, folders/<id> or projects/<id>
    #[arg(short, long)]
    root: Option<String>,

    /// Crawl depth-first on a single thread instead of a worker pool
    #[arg(long)]
    sequential: bool,

    /// Worker threads for the parallel crawler
    #[arg(short, long)]
    threads: Option<usize>,

    /// Inventory file to write (JSON lines)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Crawl variable as key=value, repeatable; values are parsed as JSON when possible
    #[arg(long = "var", value_parser = parse_variable)]
    variables: Vec<(String, Value)>,

    /// Remember root, threads and output as defaults for later runs
    #[arg(long)]
    save: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn parse_variable(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    if key.is_empty() {
        return Err("variable name must not be empty".to_string());
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// One-line message shown when the crawl cannot complete
fn failure_message(error: &anyhow::Error) -> String {
    format!("Crawl failed: {}", format_gcp_error(error))
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let (non_blocking, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(log_file.is_none())
        .with_target(true)
        .with_thread_names(true)
        .init();

    tracing::info!("gcp-inventory {} started with log level: {:?}", gcp_inventory::VERSION, level);

    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_guard = setup_logging(args.log_level, args.log_file.as_deref())?;

    // CLI > config file > gcloud default project
    let mut config = Config::load();
    let root_id = args
        .root
        .clone()
        .or_else(|| config.effective_root())
        .context("No root resource configured. Use --root organizations/<id> or set a gcloud default project")?;
    let threads = args.threads.unwrap_or_else(|| config.effective_threads());
    let output = args.output.clone().unwrap_or_else(|| config.effective_output());

    if args.save {
        config.root_resource_id = Some(root_id.clone());
        config.threads = Some(threads);
        config.output_path = Some(output.clone());
        config.save()?;
    }

    let mut variables = config.variables.clone();
    variables.extend(args.variables.iter().cloned());
    variables.insert("root_resource_id".to_string(), Value::String(root_id.clone()));

    let client = GcpClient::new().await?;
    let api: Arc<dyn ApiClient> = Arc::new(BlockingClient::new(client, tokio::runtime::Handle::current()));
    let storage = Arc::new(JsonLinesStorage::create(&output)?);
    let progress = Arc::new(CrawlProgress::new());

    let options = CrawlOptions {
        parallel: !args.sequential,
        threads,
        variables,
    };

    // Crawler workers block on API calls, keep them off the async runtime
    let crawl_storage = Arc::clone(&storage);
    let outcome = tokio::task::spawn_blocking(move || -> Result<Summary> {
        let root = resource::from_root_id(api.as_ref(), &root_id)?;
        run_crawler(crawl_storage, progress, api, root, &options)
    })
    .await
    .context("Crawler thread panicked")?;

    storage.flush()?;

    match outcome {
        Ok(summary) => {
            tracing::info!(
                "Inventory {} written to {}: {} resources, {} errors, {} warnings",
                storage.inventory_id(),
                storage.path().display(),
                summary.objects,
                summary.errors,
                summary.warnings
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(error) => {
            tracing::error!("Crawl failed: {:#}", error);
            eprintln!("{}", failure_message(&error));
            drop(log_guard);
            std::process::exit(1);
        }
    }
}
