use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use searchsync::{
    ChangeKind, Combinator, CommitBatch, JsonRecord, QuerySpec, Record, SearchConfig,
    SearchService, SyncMetrics,
};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "searchsync")]
#[command(about = "Schema-driven full-text index kept in sync with a record store", long_about = None)]
struct Args {
    /// JSON configuration file (index root, analyzer, record types)
    #[arg(long, env = "SEARCHSYNC_CONFIG")]
    config: PathBuf,

    /// Print Prometheus metrics after the command
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index JSON-lines records (one object per line) and commit once
    Index {
        /// Record type of every record in the input
        #[arg(long = "type")]
        record_type: String,

        /// Input file; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,

        /// Treat records as updates of already indexed records
        #[arg(long)]
        update: bool,
    },

    /// Delete records by identifier
    Delete {
        #[arg(long = "type")]
        record_type: String,

        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Replace a whole index with the JSON-lines records of the input
    Reindex {
        #[arg(long = "type")]
        record_type: String,

        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Run a query and print matching identifiers, best first
    Search {
        #[arg(long = "type")]
        record_type: String,

        query: String,

        /// Comma-separated fields for unqualified terms
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        #[arg(long)]
        limit: Option<usize>,

        /// Any clause suffices instead of all
        #[arg(long)]
        or: bool,

        /// Print scores next to identifiers
        #[arg(long)]
        scores: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    info!("searchsync v{}", searchsync::VERSION);

    let config = SearchConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let metrics = Arc::new(SyncMetrics::new()?);
    let service = SearchService::open_with_metrics(config, Arc::clone(&metrics))?;

    match args.command {
        Command::Index {
            record_type,
            file,
            update,
        } => {
            let kind = if update {
                ChangeKind::Updated
            } else {
                ChangeKind::Inserted
            };
            let mut batch = CommitBatch::new();
            for record in read_records(&record_type, file)? {
                batch.push(Arc::new(record), kind);
            }
            let report = service.apply_batch(&batch);
            for failure in &report.failures {
                eprintln!("skipped {} record: {}", failure.record_type, failure.error);
            }
            if let Some(failure) = report.commit_failures.first() {
                bail!("commit failed for {}: {}", failure.record_type, failure.error);
            }
            println!(
                "staged {} of {} records, {} skipped",
                report.staged,
                batch.len(),
                report.failures.len()
            );
        }
        Command::Delete { record_type, ids } => {
            let schema = service
                .registry()
                .schema(&record_type)
                .with_context(|| format!("record type '{}' is not configured", record_type))?;
            let mut batch = CommitBatch::new();
            for id in ids {
                let mut fields = Map::new();
                fields.insert(schema.identifier_name().to_string(), Value::String(id));
                let record = JsonRecord::new(record_type.as_str(), fields);
                batch.push(Arc::new(record), ChangeKind::Deleted);
            }
            let report = service.apply_batch(&batch);
            if let Some(failure) = report.commit_failures.first() {
                bail!("commit failed for {}: {}", failure.record_type, failure.error);
            }
            println!("deleted {} records", report.staged);
        }
        Command::Reindex { record_type, file } => {
            let records = read_records(&record_type, file)?;
            let stats = service.reindex(&record_type, records.iter().map(|r| r as &dyn Record))?;
            println!(
                "reindexed {}: {} documents, generation {}",
                record_type, stats.doc_count, stats.generation
            );
        }
        Command::Search {
            record_type,
            query,
            fields,
            limit,
            or,
            scores,
        } => {
            let mut spec = QuerySpec::new(query).with_combinator(if or {
                Combinator::Or
            } else {
                Combinator::And
            });
            if !fields.is_empty() {
                spec = spec.with_fields(fields);
            }
            spec.limit = limit;

            for hit in service.query_hits(&record_type, &spec)? {
                if scores {
                    println!("{}\t{:.4}", hit.identifier, hit.score);
                } else {
                    println!("{}", hit.identifier);
                }
            }
        }
    }

    if args.metrics {
        print!("{}", metrics.gather_text());
    }
    Ok(())
}

fn read_records(record_type: &str, file: Option<PathBuf>) -> Result<Vec<JsonRecord>> {
    let reader: Box<dyn Read> = match file {
        Some(path) => Box::new(
            File::open(&path).with_context(|| format!("opening {}", path.display()))?,
        ),
        None => Box::new(io::stdin()),
    };

    let mut records = Vec::new();
    for (line, value) in serde_json::Deserializer::from_reader(BufReader::new(reader))
        .into_iter::<Value>()
        .enumerate()
    {
        let value = value.with_context(|| format!("invalid JSON in record {}", line + 1))?;
        records.push(
            JsonRecord::from_value(record_type, value)
                .with_context(|| format!("record {} is not an object", line + 1))?,
        );
    }
    Ok(records)
}
