//! json-denormalize: Rebuild nested JSON from entity tables
//!
//! Usage:
//!   # Input is the {"entities": ..., "result": ...} document json-normalize prints
//!   json-denormalize --schema blog.schema.json normalized.json
//!
//!   json-normalize -s blog.schema.json posts.json | json-denormalize -s blog.schema.json

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use json_normalize::{Denormalizer, NormalizeConfig, NormalizedOutput, SchemaDocument};
use std::fs::File;
use std::io::{stdin, BufReader, Read};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "json-denormalize")]
#[command(about = "Rebuild nested JSON from entity tables and a result shape", long_about = None)]
struct Args {
    /// Normalized input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Schema document used to normalize the input
    #[arg(long, short = 's')]
    schema: String,

    /// Root shape (overrides the document's root)
    #[arg(long)]
    root: Option<String>,

    /// Maximum traversal depth (default: 64)
    #[arg(long)]
    max_depth: Option<usize>,

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

    let mut config = NormalizeConfig::default();
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }

    // Create reader based on input source
    let reader: Box<dyn Read> = if let Some(file_path) = &args.input {
        Box::new(File::open(file_path).with_context(|| format!("Failed to open input: {}", file_path))?)
    } else {
        Box::new(stdin())
    };

    let normalized: NormalizedOutput =
        serde_json::from_reader(BufReader::new(reader)).context("Failed to parse normalized input")?;

    let restored = Denormalizer::new(&document.registry, &normalized.entities, config)
        .denormalize(&normalized.result, &shape)?;

    tracing::info!(entities = normalized.entities.entity_count(), "denormalization complete");

    let json = if args.compact {
        serde_json::to_string(&restored)?
    } else {
        serde_json::to_string_pretty(&restored)?
    };
    println!("{}", json);

    Ok(())
}
