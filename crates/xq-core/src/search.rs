//! Optional full-text index over package records.
//!
//! The field classification lives in [`SEARCH_SCHEMA`], a plain table that
//! knows nothing about tantivy. [`TantivyIndexer`] turns it into an in-RAM
//! index per architecture. Hits are reported as record slots so the owning
//! [`RepoData`](crate::repodata::RepoData) can map them back to records.

use chrono::{DateTime, Utc};
use tantivy::collector::TopDocs;
use tantivy::query::{QueryParser, QueryParserError};
use tantivy::schema::{
    FAST, Field, INDEXED, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing,
    TextOptions, Value,
};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, TantivyError};
use thiserror::Error;
use xq_schema::Record;

/// Documents added between commits.
pub const BATCH_SIZE: usize = 1000;

/// Catch-all field fed from every `combined` field.
pub const ALL_FIELD: &str = "_all";

/// Stored record slot.
pub const SLOT_FIELD: &str = "_slot";

const STEM_TOKENIZER: &str = "en_stem";
const HEAP_PER_THREAD: usize = 32_000_000;
const MAX_WRITER_THREADS: usize = 4;

/// Full-text index failures.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Building, committing, or reading the index failed.
    #[error("search index error: {0}")]
    Index(#[from] TantivyError),

    /// The query text does not parse.
    #[error("invalid search query: {0}")]
    Query(#[from] QueryParserError),

    /// A hit lacks a field the index always stores.
    #[error("field {0} missing from search schema")]
    MissingField(&'static str),
}

/// How a record field is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Exact, untokenized term.
    Keyword,
    /// Tokenized and stemmed prose.
    Text,
    /// Unsigned integer.
    Numeric,
    /// Timestamp.
    Date,
    /// Flag.
    Bool,
}

/// One row of [`SEARCH_SCHEMA`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Record field name, also used as the index field name.
    pub name: &'static str,
    /// Indexing mode.
    pub kind: FieldKind,
    /// Also copied into [`ALL_FIELD`].
    pub combined: bool,
}

impl FieldSpec {
    const fn new(name: &'static str, kind: FieldKind, combined: bool) -> Self {
        Self {
            name,
            kind,
            combined,
        }
    }
}

/// Indexed record fields.
pub const SEARCH_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("name", FieldKind::Keyword, true),
    FieldSpec::new("version", FieldKind::Keyword, true),
    FieldSpec::new("license", FieldKind::Keyword, true),
    FieldSpec::new("homepage", FieldKind::Keyword, true),
    FieldSpec::new("build_options", FieldKind::Keyword, true),
    FieldSpec::new("short_desc", FieldKind::Text, true),
    FieldSpec::new("maintainer", FieldKind::Text, true),
    FieldSpec::new("revision", FieldKind::Numeric, false),
    FieldSpec::new("build_date", FieldKind::Date, false),
    FieldSpec::new("preserve", FieldKind::Bool, false),
];

/// A record field read through the schema table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    /// Keyword or text.
    Str(&'a str),
    /// Numeric.
    U64(u64),
    /// Date.
    Date(DateTime<Utc>),
    /// Bool.
    Bool(bool),
}

/// Value of the schema field `name` for `record`; `None` when unset.
pub fn field_value<'a>(record: &'a Record, name: &str) -> Option<FieldValue<'a>> {
    let value = match name {
        "name" => FieldValue::Str(&record.name),
        "version" => FieldValue::Str(&record.version),
        "license" => FieldValue::Str(&record.license),
        "homepage" => FieldValue::Str(&record.homepage),
        "build_options" => FieldValue::Str(&record.build_options),
        "short_desc" => FieldValue::Str(&record.short_desc),
        "maintainer" => FieldValue::Str(&record.maintainer),
        "revision" => FieldValue::U64(u64::from(record.revision)),
        "build_date" => FieldValue::Date(record.build_date?),
        "preserve" => FieldValue::Bool(record.preserve),
        _ => return None,
    };
    match value {
        FieldValue::Str(s) if s.is_empty() => None,
        v => Some(v),
    }
}

/// Builds a full-text handle for one architecture's records.
pub trait SearchIndexer: Send + Sync {
    /// # Errors
    ///
    /// Any failure aborts the whole build; no partial handle is returned.
    fn index(&self, arch: &str, records: &[Record]) -> Result<Box<dyn SearchHandle>, SearchError>;
}

/// A built full-text index. Released when dropped.
pub trait SearchHandle: Send + Sync {
    /// Best matches first, as record slots.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Query`] for a query that does not parse.
    fn search(&self, text: &str, limit: usize) -> Result<Vec<usize>, SearchError>;

    /// Number of indexed documents.
    fn len(&self) -> usize;

    /// True when no document was indexed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct SchemaFields {
    schema: Schema,
    fields: Vec<(FieldSpec, Field)>,
    all: Field,
    slot: Field,
}

fn stemmed() -> TextOptions {
    TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(STEM_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    )
}

fn build_schema(table: &[FieldSpec]) -> SchemaFields {
    let mut builder = Schema::builder();

    let fields = table
        .iter()
        .map(|spec| {
            let field = match spec.kind {
                FieldKind::Keyword => builder.add_text_field(spec.name, STRING),
                FieldKind::Text => builder.add_text_field(spec.name, stemmed()),
                FieldKind::Numeric => builder.add_u64_field(spec.name, INDEXED | FAST),
                FieldKind::Date => builder.add_date_field(spec.name, INDEXED | FAST),
                FieldKind::Bool => builder.add_bool_field(spec.name, INDEXED),
            };
            (*spec, field)
        })
        .collect();

    let all = builder.add_text_field(ALL_FIELD, stemmed());
    let slot = builder.add_u64_field(SLOT_FIELD, STORED);

    SchemaFields {
        schema: builder.build(),
        fields,
        all,
        slot,
    }
}

impl SchemaFields {
    fn document(&self, slot: usize, record: &Record) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        let mut combined = Vec::new();

        for (spec, field) in &self.fields {
            let Some(value) = field_value(record, spec.name) else {
                continue;
            };
            match value {
                FieldValue::Str(s) => {
                    doc.add_text(*field, s);
                    if spec.combined {
                        combined.push(s);
                    }
                }
                FieldValue::U64(n) => doc.add_u64(*field, n),
                FieldValue::Date(d) => {
                    doc.add_date(*field, tantivy::DateTime::from_timestamp_secs(d.timestamp()));
                }
                FieldValue::Bool(b) => doc.add_bool(*field, b),
            }
        }

        if !combined.is_empty() {
            doc.add_text(self.all, combined.join(" "));
        }
        doc.add_u64(self.slot, slot as u64);
        doc
    }

    /// Fields searched when a query term names no field.
    fn default_fields(&self) -> Vec<Field> {
        let mut fields = vec![self.all];
        fields.extend(
            self.fields
                .iter()
                .filter(|(spec, _)| spec.kind == FieldKind::Text)
                .map(|(_, field)| *field),
        );
        fields
    }
}

/// Builds in-RAM tantivy indices from [`SEARCH_SCHEMA`].
#[derive(Debug, Clone)]
pub struct TantivyIndexer {
    threads: usize,
}

impl TantivyIndexer {
    /// An indexer using up to four writer threads.
    pub fn new() -> Self {
        Self {
            threads: num_cpus::get().clamp(1, MAX_WRITER_THREADS),
        }
    }
}

impl Default for TantivyIndexer {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchIndexer for TantivyIndexer {
    fn index(&self, arch: &str, records: &[Record]) -> Result<Box<dyn SearchHandle>, SearchError> {
        let fields = build_schema(SEARCH_SCHEMA);
        let index = Index::create_in_ram(fields.schema.clone());
        let mut writer: IndexWriter =
            index.writer_with_num_threads(self.threads, self.threads * HEAP_PER_THREAD)?;

        let mut indexed = 0;
        for batch in records.chunks(BATCH_SIZE) {
            for (offset, record) in batch.iter().enumerate() {
                writer.add_document(fields.document(indexed + offset, record))?;
            }
            writer.commit()?;
            indexed += batch.len();
            tracing::debug!(arch, indexed, total = records.len(), "search index batch committed");
        }
        if records.is_empty() {
            writer.commit()?;
        }
        writer.wait_merging_threads()?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        let default_fields = fields.default_fields();
        Ok(Box::new(TantivyHandle {
            index,
            reader,
            default_fields,
            slot: fields.slot,
            docs: records.len(),
        }))
    }
}

struct TantivyHandle {
    index: Index,
    reader: IndexReader,
    default_fields: Vec<Field>,
    slot: Field,
    docs: usize,
}

impl SearchHandle for TantivyHandle {
    fn search(&self, text: &str, limit: usize) -> Result<Vec<usize>, SearchError> {
        let parser = QueryParser::for_index(&self.index, self.default_fields.clone());
        let query = parser.parse_query(text)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut slots = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let slot = doc
                .get_first(self.slot)
                .and_then(|v| v.as_u64())
                .ok_or(SearchError::MissingField(SLOT_FIELD))?;
            slots.push(slot as usize);
        }
        Ok(slots)
    }

    fn len(&self) -> usize {
        self.docs
    }
}
