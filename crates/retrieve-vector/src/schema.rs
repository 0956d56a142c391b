//! Arrow layout of the embeddings table and row conversion.
use anyhow::{anyhow, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, StringArray, TimestampMillisecondArray};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

use retrieve_core::types::{Candidate, EmbeddingRecord, Meta};

pub fn build_embeddings_schema(dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("owner_id", DataType::Utf8, false),
        Field::new("owner_kind", DataType::Utf8, false),
        Field::new("move_type", DataType::Utf8, true),
        Field::new("document_id", DataType::Utf8, true),
        Field::new("source", DataType::Utf8, true),
        Field::new("content", DataType::Utf8, false),
        Field::new("content_hash", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32),
            true,
        ),
    ]))
}

/// Width of the `vector` column, if the schema has one.
pub fn vector_width(schema: &Schema) -> Option<usize> {
    match schema.field_with_name("vector").ok()?.data_type() {
        DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
        _ => None,
    }
}

pub fn records_to_batch(records: &[EmbeddingRecord], dim: usize) -> Result<RecordBatch> {
    let mut owner_ids = Vec::with_capacity(records.len());
    let mut kinds = Vec::with_capacity(records.len());
    let mut moves = Vec::with_capacity(records.len());
    let mut document_ids = Vec::with_capacity(records.len());
    let mut sources = Vec::with_capacity(records.len());
    let mut contents = Vec::with_capacity(records.len());
    let mut hashes = Vec::with_capacity(records.len());
    let mut metadata = Vec::with_capacity(records.len());
    let mut updated = Vec::with_capacity(records.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(records.len());
    for r in records {
        if r.vector.len() != dim {
            return Err(anyhow!("vector for {} has {} dimensions, table expects {}", r.owner_id, r.vector.len(), dim));
        }
        owner_ids.push(r.owner_id.clone());
        kinds.push(r.owner_kind.as_str().to_string());
        moves.push(r.move_type.map(|m| m.as_str().to_string()));
        document_ids.push(r.document_id.clone());
        sources.push(r.source.clone());
        contents.push(r.content.clone());
        hashes.push(r.content_hash.clone());
        metadata.push(serde_json::to_string(&r.metadata)?);
        updated.push(r.updated_at);
        vectors.push(Some(r.vector.iter().map(|&x| Some(x)).collect()));
    }
    let batch = RecordBatch::try_new(
        build_embeddings_schema(dim),
        vec![
            Arc::new(StringArray::from(owner_ids)),
            Arc::new(StringArray::from(kinds)),
            Arc::new(StringArray::from(moves)),
            Arc::new(StringArray::from(document_ids)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(hashes)),
            Arc::new(StringArray::from(metadata)),
            Arc::new(TimestampMillisecondArray::from(updated)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim as i32)),
        ],
    )?;
    Ok(batch)
}

pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("{name} column missing"))
}

fn optional_string(col: &StringArray, i: usize) -> Option<String> {
    if col.is_null(i) {
        None
    } else {
        Some(col.value(i).to_string())
    }
}

/// Convert a vector-search batch into candidates scored by `1 - _distance`.
///
/// The stored owner kind, move type and document id are surfaced through the
/// candidate metadata so callers can tell rows apart.
pub fn batch_to_candidates(batch: &RecordBatch) -> Result<Vec<Candidate>> {
    let ids = string_column(batch, "owner_id")?;
    let kinds = string_column(batch, "owner_kind")?;
    let moves = string_column(batch, "move_type")?;
    let document_ids = string_column(batch, "document_id")?;
    let sources = string_column(batch, "source")?;
    let contents = string_column(batch, "content")?;
    let metadata = string_column(batch, "metadata")?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| anyhow!("_distance column missing"))?;

    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let mut meta: Meta = match metadata.value(i) {
            "" => Meta::new(),
            raw => serde_json::from_str(raw)?,
        };
        meta.entry("owner_kind").or_insert_with(|| kinds.value(i).into());
        if let Some(move_type) = optional_string(moves, i) {
            meta.entry("move_type").or_insert_with(|| move_type.into());
        }
        if let Some(doc) = optional_string(document_ids, i) {
            meta.entry("document_id").or_insert_with(|| doc.into());
        }
        out.push(Candidate {
            id: ids.value(i).to_string(),
            content: contents.value(i).to_string(),
            source: optional_string(sources, i),
            metadata: meta,
            score: 1.0 - f64::from(distances.value(i)),
        });
    }
    Ok(out)
}

pub fn first_vector(batch: &RecordBatch) -> Result<Option<Vec<f32>>> {
    if batch.num_rows() == 0 {
        return Ok(None);
    }
    let col = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| anyhow!("vector column missing"))?;
    if col.is_null(0) {
        return Ok(None);
    }
    let list = col.value(0);
    Ok(Some(list.as_primitive::<Float32Type>().values().to_vec()))
}
