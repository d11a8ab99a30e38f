//! tarsearch - full-text indexing of tar.gz archives
//!
//! Streams regular files out of a gzip-compressed tar archive into a Tantivy
//! index in bounded batches, and renders free-text query results with
//! highlighted fragments and term positions.

pub mod archive;
pub mod cli;
pub mod error;
pub mod indexer;
pub mod ingest;
pub mod output;

pub use archive::{ArchiveEntry, ArchiveReader};
pub use error::{ArchiveError, IngestError, StoreError};
pub use indexer::{IndexEntry, QueryOptions, ResultSet, StoreConfig, TextIndex};
pub use ingest::{ingest, DocumentStore, FlushEvent, FlushObserver, IngestConfig, IngestStats};
pub use output::ResultPrinter;
