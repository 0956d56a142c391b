//! LanceDB connection and table housekeeping.
use anyhow::Result;
use arrow_array::RecordBatchIterator;
use arrow_schema::Schema;
use lancedb::{connect, Connection, Table};
use std::sync::Arc;
use tracing::info;

use retrieve_core::Error;

use crate::schema::{build_embeddings_schema, vector_width};

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<Table> {
    let names = conn.table_names().execute().await?;
    if names.iter().any(|n| n == name) {
        return Ok(conn.open_table(name).execute().await?);
    }
    info!("Creating table {}", name);
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    Ok(conn.create_table(name, Box::new(iter)).execute().await?)
}

/// Open or create the embeddings table and check its vector column width.
pub async fn ensure_embeddings_table(conn: &Connection, name: &str, dim: usize) -> Result<Table> {
    let table = ensure_table(conn, name, build_embeddings_schema(dim)).await?;
    let schema = table.schema().await?;
    match vector_width(&schema) {
        Some(width) if width == dim => Ok(table),
        Some(width) => Err(Error::DimensionMismatch { expected: width, actual: dim }.into()),
        None => Err(Error::InvalidConfig(format!("table {name} has no fixed-size vector column")).into()),
    }
}

/// Single-quoted SQL string literal.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
