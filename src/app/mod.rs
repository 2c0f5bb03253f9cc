use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;

use crate::cidr::CidrSet;
use crate::config::SnapshotConfig;
use crate::context::MembershipContext;
use crate::inventory::{Directory, EntityKey};
use crate::query::{OperatorRegistry, parse_query};
use crate::render;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Query string, e.g. "pool = api and attr memory.size >= 32G"
    pub query: String,

    /// Inventory snapshot file (YAML)
    #[arg(short, long)]
    pub inventory: PathBuf,

    /// Restrict the candidate set to this entity kind
    #[arg(short = 't', long = "kind")]
    pub kind: Option<String>,

    /// Restrict the candidate set to this entity name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Membership root names (default: every pool and datacenter)
    #[arg(long)]
    pub scope: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "names")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum OutputFormat {
    Names,
    Keys,
    Json,
}

/// Run one query against the snapshot and print the matches; returns
/// the match count.
pub fn run(cli: &Cli) -> Result<u64> {
    let snapshot = SnapshotConfig::load(&cli.inventory)
        .with_context(|| format!("CLI: Failed to load inventory {:?}", cli.inventory))?;
    let directory =
        Directory::from_snapshot(snapshot).context("CLI: Failed to build the entity store")?;

    let candidates: BTreeSet<EntityKey> = directory
        .list(cli.name.as_deref(), cli.kind.as_deref())
        .into_iter()
        .collect();
    tracing::info!("Inventory: {} candidate entities", candidates.len());

    let ops = OperatorRegistry::with_default_operators();
    let ast = parse_query(&cli.query, &ops)
        .with_context(|| format!("Query: Failed to parse '{}'", cli.query))?;
    tracing::debug!("Query AST: {:?}", ast);

    let ctx = MembershipContext::new(&directory, cli.scope.clone());
    let matches = ast.run(&candidates, &ctx);

    let private = CidrSet::rfc1918();
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    for key in &matches {
        let line = match cli.format {
            OutputFormat::Names => render::name_line(key),
            OutputFormat::Keys => render::key_line(key),
            OutputFormat::Json => render::json_line(key, &ctx, &private)
                .with_context(|| format!("Render: Failed to format {}", key))?,
        };
        writeln!(out, "{}", line)?;
    }
    out.flush()?;

    Ok(matches.len() as u64)
}
