//! Batched bulk ingestion of archive entries into a document store
//!
//! The pipeline pulls one archive entry at a time, turns it into an
//! `IndexEntry` keyed by its path, and hands it to a `BatchAccumulator`.
//! Only `batch_size` entries are ever buffered; each full batch is committed
//! with a single bulk write, and a trailing partial batch is committed once
//! the archive is exhausted. Every flush is timed and reported to a
//! `FlushObserver`.

use std::io::Read;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use crate::archive::ArchiveReader;
use crate::error::{IngestError, StoreError};
use crate::indexer::IndexEntry;

/// The write side of a document store
pub trait DocumentStore {
    /// Commit `batch` as one transaction. Entries sharing an id are upserted
    /// in order.
    fn bulk_write(&mut self, batch: Vec<IndexEntry>) -> Result<(), StoreError>;
}

/// Configuration for an ingestion run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Entries buffered before a bulk write
    pub batch_size: NonZeroUsize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

/// Timing of one committed batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlushEvent {
    /// 1-based batch number within the run
    pub batch: usize,
    /// Records committed
    pub size: usize,
    pub elapsed: Duration,
}

impl FlushEvent {
    /// Committed records per second
    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.size as f64 / secs
        } else {
            f64::INFINITY
        }
    }
}

/// Receives a `FlushEvent` after every successful bulk write
pub trait FlushObserver {
    fn on_flush(&mut self, event: &FlushEvent);
}

impl<F: FnMut(&FlushEvent)> FlushObserver for F {
    fn on_flush(&mut self, event: &FlushEvent) {
        self(event)
    }
}

/// Logs every flush through `tracing`
#[derive(Debug, Default)]
pub struct TracingObserver;

impl FlushObserver for TracingObserver {
    fn on_flush(&mut self, event: &FlushEvent) {
        tracing::info!(
            "batch {} size={} time={:?} ops/sec={:.2}",
            event.batch,
            event.size,
            event.elapsed,
            event.ops_per_sec()
        );
    }
}

/// Statistics from an ingestion run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestStats {
    /// Regular files staged for indexing
    pub entries: usize,
    /// Non-regular entries passed over
    pub skipped: usize,
    /// Bulk writes issued
    pub batches: usize,
    /// Content bytes read
    pub bytes: u64,
    pub duration_secs: f64,
}

/// Bounded buffer of pending entries in front of a store
pub struct BatchAccumulator<'a, S: DocumentStore, O: FlushObserver> {
    store: &'a mut S,
    observer: &'a mut O,
    source_name: String,
    batch_size: usize,
    pending: Vec<IndexEntry>,
    batches: usize,
}

impl<'a, S: DocumentStore, O: FlushObserver> BatchAccumulator<'a, S, O> {
    /// `source_name` identifies the archive in errors
    pub fn new(
        store: &'a mut S,
        observer: &'a mut O,
        source_name: impl Into<String>,
        batch_size: NonZeroUsize,
    ) -> Self {
        Self {
            store,
            observer,
            source_name: source_name.into(),
            batch_size: batch_size.get(),
            pending: Vec::with_capacity(batch_size.get()),
            batches: 0,
        }
    }

    /// Stage one entry. Duplicate ids are not checked here.
    pub fn add(&mut self, entry: IndexEntry) {
        self.pending.push(entry);
    }

    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of batches committed so far
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Commit all pending entries in one bulk write. A no-op when empty.
    pub fn flush(&mut self) -> Result<(), IngestError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        let size = batch.len();
        let last_entry = batch.last().map(|e| e.id.clone()).unwrap_or_default();
        let number = self.batches + 1;

        tracing::debug!("Indexing batch {} ({} entries)...", number, size);
        let start = Instant::now();
        self.store
            .bulk_write(batch)
            .map_err(|source| IngestError::Flush {
                batch: number,
                entry: last_entry,
                source_name: self.source_name.clone(),
                source,
            })?;
        let elapsed = start.elapsed();

        self.batches = number;
        self.observer.on_flush(&FlushEvent {
            batch: number,
            size,
            elapsed,
        });

        Ok(())
    }
}

/// Stream every regular file of `reader` into `store`
pub fn ingest<R, S, O>(
    reader: &mut ArchiveReader<R>,
    store: &mut S,
    config: &IngestConfig,
    observer: &mut O,
) -> Result<IngestStats, IngestError>
where
    R: Read,
    S: DocumentStore,
    O: FlushObserver,
{
    let start = Instant::now();
    let mut stats = IngestStats::default();

    let source_name = reader.source_name().to_string();
    let mut accumulator = BatchAccumulator::new(store, observer, source_name, config.batch_size);
    let mut entries = reader.entries()?;

    for entry in entries.by_ref() {
        let entry = entry?;
        stats.entries += 1;
        stats.bytes += entry.content.len() as u64;

        let contents = match String::from_utf8(entry.content) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("{} is not valid UTF-8, decoding lossily", entry.name);
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        accumulator.add(IndexEntry::new(entry.name, contents));
        if accumulator.is_full() {
            accumulator.flush()?;
        }
    }

    accumulator.flush()?;

    stats.skipped = entries.skipped();
    stats.batches = accumulator.batches();
    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Ingested {} entries in {} batches ({} skipped)",
        stats.entries,
        stats.batches,
        stats.skipped
    );

    Ok(stats)
}
