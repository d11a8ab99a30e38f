//! Tantivy-backed document store for archive entries
//!
//! One `TextIndex` is the single store handle of a run. It is either freshly
//! created (empty) or opened (possibly non-empty). The index writer is only
//! acquired on the first bulk write, so a handle opened for searching never
//! takes the directory lock.

mod schema;

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{Query, QueryParser};
use tantivy::schema::{Field, Value};
use tantivy::snippet::SnippetGenerator;
use tantivy::tokenizer::{TextAnalyzer, TokenStream};
use tantivy::{doc, Index, IndexWriter, TantivyDocument, TantivyError, Term};

use crate::error::StoreError;
use crate::ingest::DocumentStore;

pub use schema::{
    Fields, Hit, IndexEntry, ResultSet, TermLocation, TermLocations, CONTENTS_FIELD, ID_FIELD,
};

/// Store-side tuning
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Memory budget shared by the indexing threads
    pub writer_heap_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            writer_heap_bytes: 50_000_000, // 50MB heap
        }
    }
}

/// Options for a single query
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Maximum number of hits returned; 0 only counts matches
    pub page_size: usize,
    /// Attach highlighted fragments of the contents field to each hit
    pub highlight: bool,
    /// Maximum length of a highlighted fragment
    pub fragment_chars: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            page_size: 20,
            highlight: true,
            fragment_chars: 200,
        }
    }
}

/// Handle to an on-disk full-text index
pub struct TextIndex {
    path: PathBuf,
    index: Index,
    fields: Fields,
    config: StoreConfig,
    writer: Option<IndexWriter>,
}

impl TextIndex {
    /// Create a new, empty index. Fails if an index already exists at `path`.
    pub fn create(path: &Path, config: StoreConfig) -> Result<Self, StoreError> {
        fs::create_dir_all(path).map_err(|source| StoreError::CreateDir {
            path: path.to_path_buf(),
            source,
        })?;

        let index = Index::create_in_dir(path, schema::build_schema()).map_err(|source| {
            StoreError::Create {
                path: path.to_path_buf(),
                source,
            }
        })?;

        tracing::debug!("Created index at {:?}", path);
        Self::from_index(path, index, config)
    }

    /// Open an existing index
    pub fn open(path: &Path, config: StoreConfig) -> Result<Self, StoreError> {
        let index = Index::open_in_dir(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!("Opened index at {:?}", path);
        Self::from_index(path, index, config)
    }

    fn from_index(path: &Path, index: Index, config: StoreConfig) -> Result<Self, StoreError> {
        let schema = index.schema();
        let field = |name: &'static str| {
            schema.get_field(name).map_err(|_| StoreError::MissingField {
                path: path.to_path_buf(),
                field: name,
            })
        };
        let fields = Fields {
            id: field(ID_FIELD)?,
            contents: field(CONTENTS_FIELD)?,
        };

        Ok(Self {
            path: path.to_path_buf(),
            index,
            fields,
            config,
            writer: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live documents in the last committed state
    pub fn num_docs(&self) -> Result<u64, StoreError> {
        let reader = self.index.reader().map_err(|e| self.search_error(e))?;
        Ok(reader.searcher().num_docs())
    }

    /// Run a free-text query against the contents and id fields
    pub fn query(&self, text: &str, options: &QueryOptions) -> Result<ResultSet, StoreError> {
        let reader = self.index.reader().map_err(|e| self.search_error(e))?;
        let searcher = reader.searcher();

        let query_parser =
            QueryParser::for_index(&self.index, vec![self.fields.contents, self.fields.id]);
        let query = query_parser
            .parse_query(text)
            .map_err(|source| StoreError::Parse {
                query: text.to_string(),
                source,
            })?;

        // TopDocs rejects a zero limit
        if options.page_size == 0 {
            let total_hits = searcher
                .search(&query, &Count)
                .map_err(|e| self.search_error(e))?;
            return Ok(ResultSet {
                total_hits,
                hits: Vec::new(),
            });
        }

        let (top_docs, total_hits) = searcher
            .search(&query, &(TopDocs::with_limit(options.page_size), Count))
            .map_err(|e| self.search_error(e))?;

        let snippet_generator = if options.highlight {
            let mut generator = SnippetGenerator::create(&searcher, &*query, self.fields.contents)
                .map_err(|e| self.search_error(e))?;
            generator.set_max_num_chars(options.fragment_chars);
            Some(generator)
        } else {
            None
        };

        let terms = self.field_terms(&*query, self.fields.contents);
        let id_terms = self.field_terms(&*query, self.fields.id);
        let mut analyzer = self
            .index
            .tokenizer_for_field(self.fields.contents)
            .map_err(|e| self.search_error(e))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved_doc: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| self.search_error(e))?;

            let id = text_value(&retrieved_doc, self.fields.id);
            let contents = text_value(&retrieved_doc, self.fields.contents);

            let mut fragments = BTreeMap::new();
            if let Some(generator) = &snippet_generator {
                let snippet = generator.snippet(&contents);
                if !snippet.highlighted().is_empty() {
                    fragments.insert(CONTENTS_FIELD.to_string(), vec![snippet.to_html()]);
                }
            }

            let mut locations = BTreeMap::new();
            let found = locate_terms(&mut analyzer, &contents, &terms);
            if !found.is_empty() {
                locations.insert(CONTENTS_FIELD.to_string(), found);
            }
            // ids are indexed untokenized, so a match spans the whole value
            if id_terms.contains(&id) {
                let span = TermLocation {
                    pos: 1,
                    start: 0,
                    end: id.len(),
                };
                locations.insert(
                    ID_FIELD.to_string(),
                    TermLocations::from([(id.clone(), vec![span])]),
                );
            }

            hits.push(Hit {
                id,
                score,
                fragments,
                locations,
            });
        }

        Ok(ResultSet { total_hits, hits })
    }

    /// Release the handle, waiting for background merges to finish
    pub fn close(mut self) -> Result<(), StoreError> {
        if let Some(writer) = self.writer.take() {
            writer
                .wait_merging_threads()
                .map_err(|source| StoreError::Close {
                    path: self.path.clone(),
                    source,
                })?;
        }
        tracing::debug!("Closed index at {:?}", self.path);
        Ok(())
    }

    fn writer(&mut self) -> Result<&mut IndexWriter, StoreError> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => self
                .index
                .writer(self.config.writer_heap_bytes)
                .map_err(|source| StoreError::Write {
                    path: self.path.clone(),
                    source,
                })?,
        };
        Ok(self.writer.insert(writer))
    }

    /// Terms of the query that target `field`
    fn field_terms(&self, query: &dyn Query, field: Field) -> HashSet<String> {
        let mut terms = HashSet::new();
        query.query_terms(&mut |term, _| {
            if term.field() == field {
                if let Some(text) = term.value().as_str() {
                    terms.insert(text.to_string());
                }
            }
        });
        terms
    }

    fn search_error(&self, source: TantivyError) -> StoreError {
        StoreError::Search {
            path: self.path.clone(),
            source,
        }
    }
}

impl DocumentStore for TextIndex {
    /// Upsert every entry and commit once.
    ///
    /// Each add is preceded by a delete on the id, so the last entry staged
    /// for an id wins, both within a batch and across runs.
    fn bulk_write(&mut self, batch: Vec<IndexEntry>) -> Result<(), StoreError> {
        let fields = self.fields;
        let path = self.path.clone();
        let write_error = |source: TantivyError| StoreError::Write {
            path: path.clone(),
            source,
        };

        let writer = self.writer()?;
        for entry in batch {
            writer.delete_term(Term::from_field_text(fields.id, &entry.id));
            writer
                .add_document(doc!(
                    fields.id => entry.id,
                    fields.contents => entry.contents
                ))
                .map_err(write_error)?;
        }
        writer.commit().map_err(write_error)?;

        Ok(())
    }
}

fn text_value(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Re-tokenize `text` and record where any of `terms` occur
fn locate_terms(analyzer: &mut TextAnalyzer, text: &str, terms: &HashSet<String>) -> TermLocations {
    let mut found = TermLocations::new();
    if terms.is_empty() {
        return found;
    }

    let mut stream = analyzer.token_stream(text);
    while stream.advance() {
        let token = stream.token();
        if terms.contains(&token.text) {
            found
                .entry(token.text.clone())
                .or_default()
                .push(TermLocation {
                    pos: token.position + 1,
                    start: token.offset_from,
                    end: token.offset_to,
                });
        }
    }
    found
}
