//! json-normalize: Flatten nested JSON into entity tables
//!
//! Usage:
//!   # Normalize a JSON document, print {"entities": ..., "result": ...}
//!   json-normalize --schema blog.schema.json posts.json
//!
//!   # Read from stdin with an explicit root shape
//!   cat post.json | json-normalize --schema blog.schema.json --root posts
//!
//!   # Process NDJSON, write one .jsonl file per entity type
//!   json-normalize --schema blog.schema.json --ndjson events.jsonl --output-dir ./tables

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use json_normalize::{
    normalize_json, MergeStrategy, NormalizeConfig, NormalizedOutput, Normalizer, SchemaDocument, SingleWriter,
    TableWriter,
};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MergeArg {
    LastWriteWins,
    FirstWriteWins,
    Reject,
}

impl From<MergeArg> for MergeStrategy {
    fn from(arg: MergeArg) -> Self {
        match arg {
            MergeArg::LastWriteWins => MergeStrategy::LastWriteWins,
            MergeArg::FirstWriteWins => MergeStrategy::FirstWriteWins,
            MergeArg::Reject => MergeStrategy::Reject,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "json-normalize")]
#[command(about = "Flatten nested JSON into entity tables keyed by ID", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Schema document describing entity types and relations
    #[arg(long, short = 's')]
    schema: String,

    /// Root shape, e.g. `posts` or `["posts"]` (overrides the document's root)
    #[arg(long)]
    root: Option<String>,

    /// Process newline-delimited JSON (one record per line, each matching the root shape)
    #[arg(long)]
    ndjson: bool,

    /// Maximum traversal depth (default: 64)
    #[arg(long)]
    max_depth: Option<usize>,

    /// How repeated occurrences of an entity are merged
    #[arg(long, value_enum, default_value = "last-write-wins")]
    merge: MergeArg,

    /// Output directory for one .jsonl file per entity type plus result.json
    #[arg(long, short = 'o', conflicts_with = "tagged")]
    output_dir: Option<String>,

    /// Write all records to stdout as one stream tagged with type and ID,
    /// followed by a final `{"_result": ...}` line
    #[arg(long)]
    tagged: bool,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let document = SchemaDocument::from_path(&args.schema)?;
    let shape = document.resolve_root(args.root.as_deref())?;

    // Build config
    let mut config = NormalizeConfig {
        merge: args.merge.into(),
        ..NormalizeConfig::default()
    };
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }

    let reader = if let Some(file_path) = &args.input {
        Box::new(BufReader::new(
            File::open(file_path).with_context(|| format!("Failed to open input: {}", file_path))?,
        )) as Box<dyn Read>
    } else {
        Box::new(std::io::stdin()) as Box<dyn Read>
    };

    let output = if args.ndjson {
        normalize_json(BufReader::new(reader), &document.registry, &shape, config)?
    } else {
        let value = read_document(reader)?;
        Normalizer::new(&document.registry, config).normalize(&value, &shape)?
    };

    tracing::info!(
        tables = output.entities.0.len(),
        entities = output.entities.entity_count(),
        "normalization complete"
    );

    write_output(&args, &output)
}

/// Read a single JSON document using SIMD-accelerated parsing when possible
fn read_document(reader: Box<dyn Read>) -> Result<Value> {
    let mut content = Vec::new();
    let mut buf_reader = BufReader::new(reader);
    buf_reader.read_to_end(&mut content).context("Failed to read input")?;

    // simd-json parses in place, so keep the original bytes for the fallback
    let mut scratch = content.clone();
    match simd_json::serde::from_slice::<Value>(&mut scratch) {
        Ok(value) => Ok(value),
        Err(err) => {
            tracing::debug!(error = %err, "simd-json rejected input, falling back to serde_json");
            serde_json::from_slice(&content).context("Failed to parse JSON")
        }
    }
}

fn write_output(args: &Args, output: &NormalizedOutput) -> Result<()> {
    if let Some(output_dir) = &args.output_dir {
        let writer = TableWriter::new(output_dir)?;
        let tables = writer.write_tables(&output.entities)?;
        let result = writer.write_result(&output.result)?;

        eprintln!("✓ Wrote {} tables and {}", tables.len(), result.display());
        return Ok(());
    }

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    if args.tagged {
        let mut writer = SingleWriter::new(&mut handle);
        writer.write_tables(&output.entities)?;
        writer.write_result(&output.result)?;
        return writer.flush();
    }

    let json = if args.compact {
        serde_json::to_string(output)?
    } else {
        serde_json::to_string_pretty(output)?
    };
    writeln!(handle, "{}", json)?;
    Ok(())
}
