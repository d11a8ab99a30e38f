//! search - run a free-text query against an existing index

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;

use tarsearch::cli::{init_tracing, SearchArgs};
use tarsearch::{ResultPrinter, StoreConfig, TextIndex};

fn main() {
    init_tracing();
    let args = SearchArgs::parse();

    if let Err(err) = run(&args) {
        tracing::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(args: &SearchArgs) -> Result<()> {
    let query = args.query();
    tracing::info!("Searching {:?} for: {}", args.index, query);

    let index = TextIndex::open(&args.index, StoreConfig::default())
        .with_context(|| format!("Error opening index '{}'", args.index.display()))?;
    let results = index.query(&query, &args.query_options())?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    ResultPrinter::new(args.json).print_results(&mut out, &query, &results)?;
    out.flush()?;

    index.close()?;
    Ok(())
}
