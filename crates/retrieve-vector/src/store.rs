use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::path::Path;
use tracing::debug;

use arrow_array::RecordBatchIterator;

use retrieve_core::traits::VectorStore;
use retrieve_core::types::{Candidate, EmbeddingRecord, VectorFilter};

use crate::schema::{batch_to_candidates, build_embeddings_schema, first_vector, records_to_batch, string_column};
use crate::table::{ensure_embeddings_table, open_db, quote};

/// Embedding rows in a LanceDB table, one row per `owner_id`.
#[derive(Clone)]
pub struct LanceVectorStore {
    _conn: Connection,
    table: Table,
    dim: usize,
}

impl LanceVectorStore {
    /// Open `table_name` under `db_path`, creating it with a `dim`-wide vector
    /// column. An existing table of another width is a dimension mismatch.
    pub async fn open(db_path: &Path, table_name: &str, dim: usize) -> Result<Self> {
        std::fs::create_dir_all(db_path)?;
        let conn = open_db(db_path.to_string_lossy().as_ref()).await?;
        let table = ensure_embeddings_table(&conn, table_name, dim).await?;
        Ok(Self { _conn: conn, table, dim })
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.table.count_rows(None).await?)
    }

    async fn first_row(&self, owner_id: &str) -> Result<Option<arrow_array::RecordBatch>> {
        let mut stream = self
            .table
            .query()
            .only_if(format!("owner_id = {}", quote(owner_id)))
            .limit(1)
            .execute()
            .await?;
        while let Some(batch) = stream.try_next().await? {
            if batch.num_rows() > 0 {
                return Ok(Some(batch));
            }
        }
        Ok(None)
    }
}

/// SQL predicate for a filter, `None` when nothing is restricted.
pub fn filter_predicate(filter: &VectorFilter) -> Option<String> {
    let mut clauses = Vec::new();
    if let Some(kind) = filter.owner_kind {
        clauses.push(format!("owner_kind = {}", quote(kind.as_str())));
    }
    if let Some(move_type) = filter.move_type {
        clauses.push(format!("move_type = {}", quote(move_type.as_str())));
    }
    if !filter.document_ids.is_empty() {
        let ids: Vec<String> = filter.document_ids.iter().map(|d| quote(d)).collect();
        clauses.push(format!("document_id IN ({})", ids.join(", ")));
    }
    if let Some(owner) = &filter.exclude_owner {
        clauses.push(format!("owner_id != {}", quote(owner)));
    }
    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" AND "))
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn content_hash(&self, owner_id: &str) -> Result<Option<String>> {
        match self.first_row(owner_id).await? {
            Some(batch) => Ok(Some(string_column(&batch, "content_hash")?.value(0).to_string())),
            None => Ok(None),
        }
    }

    async fn write(&self, record: EmbeddingRecord) -> Result<()> {
        let batch = records_to_batch(std::slice::from_ref(&record), self.dim)?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), build_embeddings_schema(self.dim)));
        let mut mi = self.table.merge_insert(&["owner_id"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(reader).await?;
        debug!(owner_id = %record.owner_id, "wrote embedding row");
        Ok(())
    }

    async fn vector_of(&self, owner_id: &str) -> Result<Option<Vec<f32>>> {
        match self.first_row(owner_id).await? {
            Some(batch) => first_vector(&batch),
            None => Ok(None),
        }
    }

    async fn search(
        &self,
        query: &[f32],
        filter: &VectorFilter,
        threshold: Option<f64>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        if limit == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }
        let mut q = self.table.vector_search(query.to_vec())?.distance_type(DistanceType::Cosine).limit(limit);
        if let Some(pred) = filter_predicate(filter) {
            q = q.only_if(pred);
        }
        let mut stream = q.execute().await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            hits.extend(batch_to_candidates(&batch)?);
        }
        if let Some(min) = threshold {
            hits.retain(|h| h.score >= min);
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete(&self, owner_id: &str) -> Result<()> {
        self.table.delete(&format!("owner_id = {}", quote(owner_id))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrieve_core::analysis::MoveType;
    use retrieve_core::types::OwnerKind;

    #[test]
    fn empty_filter_has_no_predicate() {
        assert_eq!(filter_predicate(&VectorFilter::default()), None);
    }

    #[test]
    fn filter_clauses_are_and_joined() {
        let filter = VectorFilter {
            owner_kind: Some(OwnerKind::DocumentChunk),
            move_type: None,
            document_ids: vec!["d1".into(), "it's".into()],
            exclude_owner: Some("d1:0".into()),
        };
        assert_eq!(
            filter_predicate(&filter).unwrap(),
            "owner_kind = 'document_chunk' AND document_id IN ('d1', 'it''s') AND owner_id != 'd1:0'"
        );
    }

    #[test]
    fn move_type_clause_follows_owner_kind() {
        let filter = VectorFilter {
            owner_kind: Some(OwnerKind::Analysis),
            move_type: Some(MoveType::RdsBarbell),
            ..VectorFilter::default()
        };
        assert_eq!(filter_predicate(&filter).unwrap(), "owner_kind = 'analysis' AND move_type = 'rds-barbell'");
    }
}
