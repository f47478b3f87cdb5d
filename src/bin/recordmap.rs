//! recordmap CLI - extract, encode, decode and submit form records
//!
//! Reads service metadata from the metadata directory and a JSON store
//! fixture, and writes JSON to stdout. Logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use recordmap::{
    check_record, coverage_report, AppConfig, DocumentEncoder, ExtractedRecord, InMemoryStore,
    RecordExtractor, ServiceMetadata, SubmissionClient,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const RECORD_ID_VARS: &[&str] = &["RECORDMAP_RECORD_ID", "RECORD_ID"];

#[derive(Parser)]
#[command(name = "recordmap")]
#[command(version, about = "Metadata-driven mapping between form records and JSON documents", long_about = None)]
struct Cli {
    /// Directory holding <service>.yml and form_structure.yaml
    #[arg(long, global = true)]
    metadata_dir: Option<PathBuf>,

    /// Configuration file (default: recordmap.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Where a record comes from
#[derive(Args)]
struct RecordSource {
    /// JSON store fixture: {"tables": {"<table>": [{"<column>": "<value>"}]}}
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Root record id (default: $RECORDMAP_RECORD_ID or $RECORD_ID)
    #[arg(short, long)]
    id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a service's metadata and report mapping coverage
    Validate {
        service: String,
    },

    /// Extract a record from a store and print it as JSON
    Extract {
        service: String,

        #[command(flatten)]
        source: RecordSource,
    },

    /// Encode a record into a document
    Encode {
        service: String,

        #[command(flatten)]
        source: RecordSource,

        /// Previously extracted record JSON, instead of a store
        #[arg(short, long, conflicts_with = "store")]
        record: Option<PathBuf>,

        /// Wrap the document as {"testData": [document]}
        #[arg(short, long)]
        wrap: bool,
    },

    /// Decode a document back into a record
    Decode {
        service: String,

        /// Document JSON file
        #[arg(short, long)]
        document: PathBuf,
    },

    /// Extract, encode and submit a record to the configured endpoint
    Submit {
        service: String,

        #[command(flatten)]
        source: RecordSource,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = cli.metadata_dir {
        config.metadata.dir = dir;
    }
    debug!(metadata_dir = %config.metadata.dir.display(), "Configuration loaded");

    match cli.command {
        Commands::Validate { service } => validate(&config, &service),
        Commands::Extract { service, source } => {
            let metadata = load_metadata(&config, &service)?;
            let record = extract(&metadata, &source)?;
            print_json(&record.to_json())
        }
        Commands::Encode { service, source, record, wrap } => {
            let metadata = load_metadata(&config, &service)?;
            let record = match record {
                Some(path) => {
                    let json = read_json(&path)?;
                    ExtractedRecord::from_json(&json)
                        .with_context(|| format!("Invalid record in {}", path.display()))?
                }
                None => extract(&metadata, &source)?,
            };
            let encoder = DocumentEncoder::new(&metadata);
            println!("{}", encoder.encode_to_string(&record, wrap || config.submission.wrap_test_data));
            Ok(())
        }
        Commands::Decode { service, document } => {
            let metadata = load_metadata(&config, &service)?;
            let document = read_json(&document)?;
            let record = DocumentEncoder::new(&metadata).decode(&document);
            print_json(&record.to_json())
        }
        Commands::Submit { service, source } => submit(&config, &service, &source),
    }
}

fn load_metadata(config: &AppConfig, service: &str) -> Result<ServiceMetadata> {
    config
        .metadata_loader()
        .load(service)
        .with_context(|| format!("Failed to load metadata for service '{}'", service))
}

fn validate(config: &AppConfig, service: &str) -> Result<()> {
    let metadata = load_metadata(config, service)?;
    println!("✓ Loaded service '{}' with {} sections", metadata.id, metadata.sections.len());
    for section in &metadata.sections {
        if section.is_collection() && section.foreign_key_column.is_none() {
            println!("  ⚠ Collection '{}' has no resolvable foreign key", section.name);
        }
        if section.is_collection() && section.document_path.is_none() {
            println!("  ⚠ Collection '{}' has no document_path", section.name);
        }
    }
    print!("{}", coverage_report(&metadata));
    Ok(())
}

fn extract(metadata: &ServiceMetadata, source: &RecordSource) -> Result<ExtractedRecord> {
    let Some(store_path) = &source.store else {
        bail!("A store file is required (--store)");
    };
    let store = InMemoryStore::from_file(store_path)
        .with_context(|| format!("Failed to read store {}", store_path.display()))?;
    let root_id = record_id(source)?;

    let record = RecordExtractor::new(metadata, &store).extract(&root_id);
    if record.is_empty() {
        info!(root_id = %root_id, "Extraction produced no data");
    }
    Ok(record)
}

fn record_id(source: &RecordSource) -> Result<String> {
    if let Some(id) = source.id.as_deref().filter(|id| !id.trim().is_empty()) {
        return Ok(id.trim().to_string());
    }
    RECORD_ID_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .map(|v| v.trim().to_string())
        .context("A root record id is required (--id, RECORDMAP_RECORD_ID or RECORD_ID)")
}

fn submit(config: &AppConfig, service: &str, source: &RecordSource) -> Result<()> {
    let metadata = load_metadata(config, service)?;
    let record = extract(&metadata, source)?;

    if config.submission.validate_before_sending {
        let check = check_record(&metadata, &record);
        if !check.has_data {
            bail!("Record '{}' holds no data, not submitting", check.root_id);
        }
        if !check.missing.is_empty() {
            let missing: Vec<String> = check.missing.iter().map(ToString::to_string).collect();
            bail!("Record '{}' is missing required fields: {}", check.root_id, missing.join(", "));
        }
    }

    let document = DocumentEncoder::new(&metadata).encode(&record);
    let client = SubmissionClient::new(config.submission.clone())?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let response = runtime.block_on(client.submit(&document))?;

    print_json(&serde_json::to_value(&response)?)?;
    if !response.success {
        bail!(
            "Submission rejected with status {}",
            response.status.map_or_else(|| "none".to_string(), |s| s.to_string())
        );
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
