//! # docbase CLI
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docbase extract <file>` | Print the text extracted from one file |
//! | `docbase build [files]` | Ingest documents and report what was indexed |
//! | `docbase query "<text>"` | Ingest documents, then print the nearest chunks |
//! | `docbase serve` | Start the HTTP API |
//!
//! Documents come from positional file arguments, `--docs <dir>` (repeatable),
//! or `[assets].root` when neither is given. The index lives in memory, so
//! `build` and `query` ingest on every run.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docbase::assets::{read_document, scan_assets, scan_dir};
use docbase::config::{load_config, Config};
use docbase::extract::{extract_document, ExtractStatus};
use docbase::knowledge::{BuildOutcome, KnowledgeBase};
use docbase::server::run_server;
use docbase_core::models::Document;

/// docbase: extract, chunk, embed and search your documents.
#[derive(Parser)]
#[command(name = "docbase", version)]
struct Cli {
    /// Path to a TOML configuration file. Built-in defaults apply without one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and print the text of a single document.
    Extract {
        file: PathBuf,
    },

    /// Ingest documents and report the outcome.
    Build {
        #[command(flatten)]
        input: DocumentArgs,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ingest documents, then run a similarity query.
    Query {
        text: String,

        /// Number of results (defaults to `[retrieval].default_k`).
        #[arg(short)]
        k: Option<usize>,

        #[command(flatten)]
        input: DocumentArgs,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API.
    Serve {
        /// Build from this directory before accepting requests.
        #[arg(long)]
        docs: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct DocumentArgs {
    /// Directory to scan for documents (repeatable).
    #[arg(long)]
    docs: Vec<PathBuf>,

    /// Individual files to ingest.
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract { file } => {
            let doc = read_document(&file)?;
            let extraction = extract_document(&doc);
            match &extraction.status {
                ExtractStatus::Complete => {}
                ExtractStatus::Fallback(reason) => eprintln!("warning: {}", reason),
                ExtractStatus::Failed(reason) => bail!("{}: {}", doc.id, reason),
            }
            println!("{}", extraction.text);
        }
        Commands::Build { input, json } => {
            let documents = collect_documents(&config, &input)?;
            let outcome = blocking(move || {
                let kb = KnowledgeBase::start(&config)?;
                Ok(kb.build(&documents)?)
            })
            .await?;
            print_outcome(&outcome, json)?;
        }
        Commands::Query {
            text,
            k,
            input,
            json,
        } => {
            let documents = collect_documents(&config, &input)?;
            let k = k.unwrap_or(config.retrieval.default_k);
            let results = blocking(move || {
                let kb = KnowledgeBase::start(&config)?;
                kb.build(&documents)?;
                Ok(kb.query(&text, k)?)
            })
            .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No results.");
            } else {
                for (rank, meta) in results.iter().enumerate() {
                    println!(
                        "{}. {} #{} [{}..{})",
                        rank + 1,
                        meta.source,
                        meta.sequence_index,
                        meta.char_start,
                        meta.char_end
                    );
                    println!("   {}", meta.preview_text.replace('\n', " "));
                }
            }
        }
        Commands::Serve { docs } => {
            let mut config = config;
            if docs.is_some() {
                config.assets.root = docs;
            }
            let startup = config.clone();
            let kb = blocking(move || {
                let kb = KnowledgeBase::start(&startup)?;
                if startup.assets.root.is_some() {
                    let outcome = kb.build(&scan_assets(&startup.assets)?)?;
                    tracing::info!(chunks = outcome.chunks_ingested(), "initial build complete");
                }
                Ok(kb)
            })
            .await?;
            run_server(&config, Arc::new(kb)).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "docbase=debug" } else { "docbase=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run model loading and indexing off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

fn collect_documents(config: &Config, input: &DocumentArgs) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for dir in &input.docs {
        documents.extend(scan_dir(dir, &config.assets)?);
    }
    for file in &input.files {
        documents.push(read_document(file)?);
    }
    if documents.is_empty() && input.docs.is_empty() && input.files.is_empty() {
        match config.assets.root.as_deref() {
            Some(root) => documents = scan_dir(root, &config.assets)?,
            None => bail!("No documents given: pass files, --docs <dir>, or set [assets].root"),
        }
    }
    Ok(documents)
}

fn print_outcome(outcome: &BuildOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    match outcome {
        BuildOutcome::Ingested(report) => println!(
            "Ingested {} chunks from {} documents.",
            report.chunks_ingested, report.documents_ingested
        ),
        BuildOutcome::NoData { .. } => println!("No data: no document produced any text."),
    }
    for skipped in outcome.skipped() {
        println!("  skipped {}: {}", skipped.source, skipped.reason);
    }
    Ok(())
}

