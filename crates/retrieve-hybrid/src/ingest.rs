use futures::{stream, StreamExt};
use serde::Serialize;
use tracing::info;

use retrieve_core::analysis::Analysis;
use retrieve_core::chunking::TextChunker;
use retrieve_core::types::{Chunk, Embeddable, Meta, OwnerKind};
use retrieve_core::Result;

use crate::index::{KeywordIndex, UpsertOutcome, VectorIndex};

const UPSERT_CONCURRENCY: usize = 4;

/// Per-document ingestion counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub chunks: usize,
    pub embedded: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl IngestReport {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Written => self.embedded += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
            UpsertOutcome::Failed => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: IngestReport) {
        self.chunks += other.chunks;
        self.embedded += other.embedded;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }
}

pub fn chunk_id(document_id: &str, index: usize) -> String {
    format!("{document_id}:{index}")
}

#[derive(Clone)]
pub struct Ingestor {
    chunker: TextChunker,
    vector: VectorIndex,
    keyword: KeywordIndex,
}

impl Ingestor {
    pub fn new(chunker: TextChunker, vector: VectorIndex, keyword: KeywordIndex) -> Self {
        Self { chunker, vector, keyword }
    }

    /// Chunk `text` and write every chunk to both indexes.
    ///
    /// Embedding failures are counted in the report; only a keyword store
    /// failure aborts the call.
    pub async fn ingest_document(
        &self,
        document_id: &str,
        text: &str,
        filename: Option<&str>,
        metadata: Option<&Meta>,
    ) -> Result<IngestReport> {
        let chunks = self.chunker.chunk(text, metadata);
        let items: Vec<Embeddable> =
            chunks.iter().map(|c| chunk_embeddable(document_id, filename, c)).collect();
        let mut report = IngestReport { chunks: items.len(), ..IngestReport::default() };
        if items.is_empty() {
            return Ok(report);
        }

        self.keyword.upsert(&items).await?;

        let outcomes: Vec<UpsertOutcome> = stream::iter(items.iter())
            .map(|item| self.vector.upsert(item))
            .buffer_unordered(UPSERT_CONCURRENCY)
            .collect()
            .await;
        for outcome in outcomes {
            report.record(outcome);
        }

        info!(
            document_id,
            chunks = report.chunks,
            embedded = report.embedded,
            unchanged = report.unchanged,
            failed = report.failed,
            "ingested document"
        );
        Ok(report)
    }

    /// Store a concept in both indexes.
    pub async fn ingest_concept(&self, concept_id: &str, name: &str, description: Option<&str>) -> Result<UpsertOutcome> {
        let item = Embeddable::new(concept_id, OwnerKind::Concept, retrieve_core::concept_content(name, description));
        self.keyword.upsert(std::slice::from_ref(&item)).await?;
        Ok(self.vector.embed_concept(concept_id, name, description).await)
    }

    /// Store an analysis in both indexes, tagged with its move type.
    pub async fn ingest_analysis(&self, analysis: &Analysis) -> Result<UpsertOutcome> {
        let item = analysis.embeddable()?;
        self.keyword.upsert(std::slice::from_ref(&item)).await?;
        let outcome = self.vector.upsert(&item).await;
        info!(analysis_id = %analysis.analysis_id, move_type = %analysis.move_type, ?outcome, "ingested analysis");
        Ok(outcome)
    }
}

fn chunk_embeddable(document_id: &str, filename: Option<&str>, chunk: &Chunk) -> Embeddable {
    let mut meta = chunk.metadata.clone();
    meta.insert("chunk_index".into(), chunk.index.into());
    meta.insert("start_char".into(), chunk.start_char.into());
    meta.insert("end_char".into(), chunk.end_char.into());
    Embeddable::new(chunk_id(document_id, chunk.index), OwnerKind::DocumentChunk, chunk.text.clone())
        .with_document(document_id)
        .with_source(filename.map(str::to_string))
        .with_metadata(meta)
}
