//! Tantivy schema for archive documents
//!
//! Fields:
//! - id: raw string, stored + indexed (exact match, used for upserts)
//! - contents: tokenized with positions, stored (main search target)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tantivy::schema::*;

pub const ID_FIELD: &str = "id";
pub const CONTENTS_FIELD: &str = "contents";

/// A document as staged for indexing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub contents: String,
}

impl IndexEntry {
    pub fn new(id: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            contents: contents.into(),
        }
    }
}

/// Where a query term matched inside a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermLocation {
    /// 1-based token position
    pub pos: usize,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
}

/// term -> locations
pub type TermLocations = BTreeMap<String, Vec<TermLocation>>;

/// A single search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: String,
    pub score: f32,
    /// field -> highlighted fragments
    pub fragments: BTreeMap<String, Vec<String>>,
    /// field -> term -> locations
    pub locations: BTreeMap<String, TermLocations>,
}

/// The outcome of one query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Number of matching documents, independent of the page size
    pub total_hits: usize,
    pub hits: Vec<Hit>,
}

/// Resolved schema fields
#[derive(Debug, Clone, Copy)]
pub struct Fields {
    pub id: Field,
    pub contents: Field,
}

/// Build the Tantivy schema for archive documents
pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    schema_builder.add_text_field(ID_FIELD, STRING | STORED);

    schema_builder.add_text_field(
        CONTENTS_FIELD,
        TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer("default")
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions),
            )
            .set_stored(),
    );

    schema_builder.build()
}
