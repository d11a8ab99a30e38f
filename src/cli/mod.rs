//! CLI definitions using clap derive macros
//!
//! Two executables share these definitions:
//! - index: ingest a tar.gz archive into a new index
//! - search: query an existing index

use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::indexer::{QueryOptions, StoreConfig};
use crate::ingest::IngestConfig;

/// Index every regular file of a tar.gz archive into a new full-text index
#[derive(Parser, Debug)]
#[command(name = "index")]
#[command(author, version, about, long_about = None)]
pub struct IndexArgs {
    /// Gzip-compressed tar archive to ingest
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Directory of the index to create (must not already hold an index)
    #[arg(value_name = "INDEX")]
    pub index: PathBuf,

    /// Documents committed per bulk write
    #[arg(short, long, default_value = "100")]
    pub batch_size: NonZeroUsize,

    /// Memory budget of the index writer in megabytes
    #[arg(long, default_value = "50")]
    pub writer_memory_mb: usize,
}

impl IndexArgs {
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            batch_size: self.batch_size,
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            writer_heap_bytes: self.writer_memory_mb.saturating_mul(1_000_000),
        }
    }
}

/// Run a free-text query against an index
#[derive(Parser, Debug)]
#[command(name = "search")]
#[command(author, version, about, long_about = None)]
pub struct SearchArgs {
    /// Directory of an existing index
    #[arg(value_name = "INDEX")]
    pub index: PathBuf,

    /// Query terms, joined with spaces into a single query
    #[arg(
        value_name = "TERMS",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub terms: Vec<String>,

    /// Maximum number of results to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Do not highlight matches in the contents
    #[arg(long, default_value = "false")]
    pub no_highlight: bool,

    /// Output results as JSON (for tool integration)
    #[arg(long, default_value = "false")]
    pub json: bool,
}

impl SearchArgs {
    pub fn query(&self) -> String {
        self.terms.join(" ")
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            page_size: self.limit,
            highlight: !self.no_highlight,
            ..QueryOptions::default()
        }
    }
}

/// Install the global subscriber. Logs go to stderr so stdout carries only
/// results.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_defaults() {
        let args = IndexArgs::try_parse_from(["index", "data.tar.gz", "data.idx"]).unwrap();

        assert_eq!(args.archive, PathBuf::from("data.tar.gz"));
        assert_eq!(args.index, PathBuf::from("data.idx"));
        assert_eq!(args.ingest_config().batch_size.get(), 100);
        assert_eq!(args.store_config().writer_heap_bytes, 50_000_000);
    }

    #[test]
    fn test_index_rejects_zero_batch_size() {
        let result =
            IndexArgs::try_parse_from(["index", "--batch-size", "0", "data.tar.gz", "data.idx"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_index_requires_both_paths() {
        assert!(IndexArgs::try_parse_from(["index", "data.tar.gz"]).is_err());
    }

    #[test]
    fn test_search_joins_terms() {
        let args =
            SearchArgs::try_parse_from(["search", "data.idx", "quick", "+fox", "-dog"]).unwrap();

        assert_eq!(args.query(), "quick +fox -dog");
        let options = args.query_options();
        assert_eq!(options.page_size, 20);
        assert!(options.highlight);
    }

    #[test]
    fn test_search_options() {
        let args = SearchArgs::try_parse_from([
            "search",
            "--limit",
            "5",
            "--no-highlight",
            "data.idx",
            "fox",
        ])
        .unwrap();

        let options = args.query_options();
        assert_eq!(options.page_size, 5);
        assert!(!options.highlight);
    }

    #[test]
    fn test_search_requires_terms() {
        assert!(SearchArgs::try_parse_from(["search", "data.idx"]).is_err());
    }
}
