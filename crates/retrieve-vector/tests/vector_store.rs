use retrieve_core::analysis::MoveType;
use retrieve_core::hash::content_hash;
use retrieve_core::traits::VectorStore;
use retrieve_core::types::{EmbeddingRecord, Meta, OwnerKind, VectorFilter};
use retrieve_core::Error;
use retrieve_vector::LanceVectorStore;

fn record(id: &str, kind: OwnerKind, doc: Option<&str>, vector: [f32; 4]) -> EmbeddingRecord {
    let content = format!("content of {id}");
    EmbeddingRecord {
        owner_id: id.to_string(),
        owner_kind: kind,
        document_id: doc.map(str::to_string),
        source: doc.map(|d| format!("{d}.md")),
        content_hash: content_hash(&content),
        content,
        move_type: None,
        vector: vector.to_vec(),
        metadata: Meta::new(),
        updated_at: chrono::Utc::now().timestamp_millis(),
    }
}

async fn seeded(dir: &std::path::Path) -> LanceVectorStore {
    let store = LanceVectorStore::open(dir, "document_embeddings", 4).await.unwrap();
    for r in [
        record("a", OwnerKind::DocumentChunk, Some("d1"), [1.0, 0.0, 0.0, 0.0]),
        record("b", OwnerKind::DocumentChunk, Some("d2"), [0.8, 0.6, 0.0, 0.0]),
        record("c", OwnerKind::Concept, None, [0.0, 1.0, 0.0, 0.0]),
        record("d", OwnerKind::Concept, None, [-1.0, 0.0, 0.0, 0.0]),
    ] {
        store.write(r).await.unwrap();
    }
    store
}

#[tokio::test]
async fn search_orders_by_cosine_similarity_and_applies_threshold() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = seeded(tmp.path()).await;

    let q = [1.0, 0.0, 0.0, 0.0];
    let all = store.search(&q, &VectorFilter::default(), None, 10).await?;
    let ids: Vec<_> = all.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
    assert!((all[0].score - 1.0).abs() < 1e-4);
    assert!((all[1].score - 0.8).abs() < 1e-4);

    let above = store.search(&q, &VectorFilter::default(), Some(0.5), 10).await?;
    assert_eq!(above.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(above[0].source.as_deref(), Some("d1.md"));
    assert_eq!(above[0].metadata["owner_kind"], "document_chunk");

    let top = store.search(&q, &VectorFilter::default(), None, 1).await?;
    assert_eq!(top.len(), 1);
    Ok(())
}

#[tokio::test]
async fn filters_restrict_candidates() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = seeded(tmp.path()).await;
    let q = [1.0, 0.0, 0.0, 0.0];

    let concepts = VectorFilter { owner_kind: Some(OwnerKind::Concept), ..VectorFilter::default() };
    let hits = store.search(&q, &concepts, None, 10).await?;
    assert!(hits.iter().all(|h| h.id == "c" || h.id == "d"));
    assert_eq!(hits.len(), 2);

    let in_doc = VectorFilter { document_ids: vec!["d2".into()], ..VectorFilter::default() };
    let hits = store.search(&q, &in_doc, None, 10).await?;
    assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["b"]);

    let not_a = VectorFilter { exclude_owner: Some("a".into()), ..VectorFilter::default() };
    let hits = store.search(&q, &not_a, None, 10).await?;
    assert_eq!(hits[0].id, "b");
    Ok(())
}

#[tokio::test]
async fn move_type_filter_selects_analyses() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = seeded(tmp.path()).await;
    for (id, move_type, vector) in
        [("an-1", MoveType::ZoomIn, [0.9, 0.1, 0.0, 0.0]), ("an-2", MoveType::PCircle, [1.0, 0.0, 0.0, 0.0])]
    {
        let mut row = record(id, OwnerKind::Analysis, None, vector);
        row.move_type = Some(move_type);
        store.write(row).await?;
    }
    let q = [1.0, 0.0, 0.0, 0.0];

    let analyses = VectorFilter { owner_kind: Some(OwnerKind::Analysis), ..VectorFilter::default() };
    assert_eq!(store.search(&q, &analyses, None, 10).await?.len(), 2);

    let zoom_in = VectorFilter { move_type: Some(MoveType::ZoomIn), ..analyses };
    let hits = store.search(&q, &zoom_in, None, 10).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "an-1");
    assert_eq!(hits[0].metadata["move_type"], "zoom-in");
    Ok(())
}

#[tokio::test]
async fn write_replaces_row_for_same_owner() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = seeded(tmp.path()).await;
    assert_eq!(store.count().await?, 4);

    let mut replacement = record("a", OwnerKind::DocumentChunk, Some("d1"), [0.0, 0.0, 1.0, 0.0]);
    replacement.content = "rewritten".into();
    replacement.content_hash = content_hash("rewritten");
    store.write(replacement).await?;

    assert_eq!(store.count().await?, 4);
    assert_eq!(store.content_hash("a").await?, Some(content_hash("rewritten")));
    assert_eq!(store.vector_of("a").await?, Some(vec![0.0, 0.0, 1.0, 0.0]));
    Ok(())
}

#[tokio::test]
async fn missing_rows_and_delete() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = seeded(tmp.path()).await;

    assert_eq!(store.content_hash("nope").await?, None);
    assert_eq!(store.vector_of("nope").await?, None);

    store.delete("b").await?;
    assert_eq!(store.count().await?, 3);
    assert_eq!(store.content_hash("b").await?, None);
    Ok(())
}

#[tokio::test]
async fn empty_table_search_is_empty() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = LanceVectorStore::open(tmp.path(), "document_embeddings", 4).await?;
    let hits = store.search(&[1.0, 0.0, 0.0, 0.0], &VectorFilter::default(), None, 5).await?;
    assert!(hits.is_empty());
    Ok(())
}

#[tokio::test]
async fn reopening_with_other_width_is_a_dimension_mismatch() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    drop(seeded(tmp.path()).await);

    let err = match LanceVectorStore::open(tmp.path(), "document_embeddings", 8).await {
        Ok(_) => panic!("width change must be rejected"),
        Err(e) => e,
    };
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::DimensionMismatch { expected: 4, actual: 8 })
    ));

    let reopened = LanceVectorStore::open(tmp.path(), "document_embeddings", 4).await?;
    assert_eq!(reopened.count().await?, 4);
    Ok(())
}
