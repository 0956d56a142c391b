use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, ConstScoreQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use retrieve_core::traits::KeywordStore;
use retrieve_core::types::{Candidate, Embeddable, KeywordFilter, Meta};

use crate::schema::{build_schema, register_tokenizer, Fields};

const WRITER_HEAP_BYTES: usize = 50_000_000;

struct Inner {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: Fields,
}

/// Keyword store over a tantivy index. Rows are keyed by `id`; an upsert
/// replaces any previous row with the same id.
#[derive(Clone)]
pub struct TantivyKeywordStore {
    inner: Arc<Inner>,
}

impl TantivyKeywordStore {
    /// Open the index in `dir`, creating it when absent.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        let directory = MmapDirectory::open(dir)?;
        let index = Index::open_or_create(directory, build_schema())?;
        info!("Opened keyword index at {}", dir.display());
        Self::from_index(index)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()))
    }

    fn from_index(index: Index) -> Result<Self> {
        register_tokenizer(&index);
        let fields = Fields::from_schema(&index.schema())?;
        let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
        let writer = index.writer(WRITER_HEAP_BYTES)?;
        Ok(Self { inner: Arc::new(Inner { index, reader, writer: Mutex::new(writer), fields }) })
    }

    pub fn num_docs(&self) -> u64 {
        self.inner.reader.searcher().num_docs()
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner)).await?
    }
}

impl Inner {
    fn to_document(&self, doc: &Embeddable) -> Result<TantivyDocument> {
        let f = &self.fields;
        let mut out = TantivyDocument::default();
        out.add_text(f.id, &doc.owner_id);
        out.add_text(f.content, &doc.content);
        out.add_text(f.owner_kind, doc.owner_kind.as_str());
        if let Some(move_type) = doc.move_type {
            out.add_text(f.move_type, move_type.as_str());
        }
        if let Some(document_id) = &doc.document_id {
            out.add_text(f.document_id, document_id);
        }
        if let Some(source) = &doc.source {
            out.add_text(f.source, source);
        }
        if !doc.metadata.is_empty() {
            out.add_text(f.metadata, serde_json::to_string(&doc.metadata)?);
        }
        Ok(out)
    }

    fn upsert(&self, docs: &[Embeddable]) -> Result<()> {
        let mut writer = self.writer.lock();
        for doc in docs {
            writer.delete_term(Term::from_field_text(self.fields.id, &doc.owner_id));
            writer.add_document(self.to_document(doc)?)?;
        }
        writer.commit()?;
        drop(writer);
        self.reader.reload()?;
        debug!("Indexed {} keyword rows", docs.len());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.delete_term(Term::from_field_text(self.fields.id, id));
        writer.commit()?;
        drop(writer);
        self.reader.reload()?;
        Ok(())
    }

    /// The parsed text query, narrowed by zero-scored exact-term clauses.
    fn scoped_query(&self, or_query: &str, filter: &KeywordFilter) -> Result<Box<dyn Query>> {
        let parser = QueryParser::for_index(&self.index, vec![self.fields.content]);
        let text = parser.parse_query(or_query).map_err(|e| anyhow!("parsing {or_query:?}: {e}"))?;
        if filter.is_empty() {
            return Ok(text);
        }
        let exact = |field: Field, value: &str| -> (Occur, Box<dyn Query>) {
            let term = TermQuery::new(Term::from_field_text(field, value), IndexRecordOption::Basic);
            let zero_scored: Box<dyn Query> = Box::new(ConstScoreQuery::new(Box::new(term), 0.0));
            (Occur::Must, zero_scored)
        };
        let mut clauses = vec![(Occur::Must, text)];
        if let Some(kind) = filter.owner_kind {
            clauses.push(exact(self.fields.owner_kind, kind.as_str()));
        }
        if let Some(move_type) = filter.move_type {
            clauses.push(exact(self.fields.move_type, move_type.as_str()));
        }
        Ok(Box::new(BooleanQuery::new(clauses)))
    }

    fn search(&self, or_query: &str, filter: &KeywordFilter, limit: usize) -> Result<Vec<Candidate>> {
        let searcher = self.reader.searcher();
        let query = self.scoped_query(or_query, filter)?;
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit.max(1)))?;

        let f = &self.fields;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let text = |field| doc.get_first(field).and_then(|v| v.as_str()).map(str::to_string);
            let mut metadata = match text(f.metadata) {
                Some(raw) => serde_json::from_str::<Meta>(&raw)?,
                None => Meta::new(),
            };
            if let Some(kind) = text(f.owner_kind) {
                metadata.entry("owner_kind").or_insert(kind.into());
            }
            hits.push(Candidate {
                id: text(f.id).unwrap_or_default(),
                content: text(f.content).unwrap_or_default(),
                source: text(f.source),
                metadata,
                score: f64::from(score),
            });
        }
        Ok(hits)
    }
}

#[async_trait]
impl KeywordStore for TantivyKeywordStore {
    async fn upsert(&self, docs: &[Embeddable]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let docs = docs.to_vec();
        self.blocking(move |inner| inner.upsert(&docs)).await
    }

    async fn search(&self, or_query: &str, filter: &KeywordFilter, limit: usize) -> Result<Vec<Candidate>> {
        let q = or_query.to_string();
        let filter = *filter;
        self.blocking(move |inner| inner.search(&q, &filter, limit)).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.blocking(move |inner| inner.delete(&id)).await
    }
}
