//! Error types for the archive, store and ingestion layers
//!
//! Every error is fatal to the run. Variants carry the file name, index path,
//! entry name or batch number needed to diagnose a failure without re-running.

use std::io;
use std::path::PathBuf;
use tantivy::query::QueryParserError;
use tantivy::TantivyError;
use thiserror::Error;

/// Failures while opening, decompressing or unpacking an archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("unable to open {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to unzip {source_name}: {reason}")]
    Decompress { source_name: String, reason: String },

    #[error("unable to read tar file {source_name}")]
    Corrupt {
        source_name: String,
        #[source]
        source: io::Error,
    },

    #[error("error reading {entry} from {source_name}")]
    ReadEntry {
        source_name: String,
        entry: String,
        #[source]
        source: io::Error,
    },
}

/// Failures reported by the document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unable to create index directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to create index {path}")]
    Create {
        path: PathBuf,
        #[source]
        source: TantivyError,
    },

    #[error("unable to open index {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: TantivyError,
    },

    #[error("index {path} has no field '{field}'")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("bulk write to {path} failed")]
    Write {
        path: PathBuf,
        #[source]
        source: TantivyError,
    },

    #[error("invalid query '{query}'")]
    Parse {
        query: String,
        #[source]
        source: QueryParserError,
    },

    #[error("search in {path} failed")]
    Search {
        path: PathBuf,
        #[source]
        source: TantivyError,
    },

    #[error("unable to close index {path}")]
    Close {
        path: PathBuf,
        #[source]
        source: TantivyError,
    },
}

/// Failures that abort an ingestion run
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("error indexing batch {batch} (last entry {entry}) from {source_name}")]
    Flush {
        batch: usize,
        entry: String,
        source_name: String,
        #[source]
        source: StoreError,
    },
}
