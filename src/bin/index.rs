//! index - ingest a tar.gz archive into a new full-text index

use anyhow::{Context, Result};
use clap::Parser;

use tarsearch::cli::{init_tracing, IndexArgs};
use tarsearch::ingest::{ingest, TracingObserver};
use tarsearch::{ArchiveReader, TextIndex};

fn main() {
    init_tracing();
    let args = IndexArgs::parse();

    if let Err(err) = run(&args) {
        tracing::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(args: &IndexArgs) -> Result<()> {
    tracing::info!(
        "Indexing {:?} into {:?} (batch size {})",
        args.archive,
        args.index,
        args.batch_size
    );

    // Open the archive first so a missing file leaves no empty index behind
    let mut reader = ArchiveReader::open(&args.archive)?;
    let mut index = TextIndex::create(&args.index, args.store_config())?;

    let stats = ingest(&mut reader, &mut index, &args.ingest_config(), &mut TracingObserver)
        .with_context(|| {
            format!(
                "Error indexing '{}' into '{}'",
                args.archive.display(),
                args.index.display()
            )
        })?;
    tracing::info!(
        "Index {:?} holds {} documents",
        index.path(),
        index.num_docs()?
    );
    index.close()?;

    println!("\n✨ Indexing complete!");
    println!("   Files indexed: {}", stats.entries);
    println!("   Entries skipped: {}", stats.skipped);
    println!("   Batches: {}", stats.batches);
    println!("   Bytes: {:.2} MB", stats.bytes as f64 / 1_048_576.0);
    println!("   Time: {:.2}s", stats.duration_secs);

    Ok(())
}
