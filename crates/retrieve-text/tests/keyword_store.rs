use retrieve_core::query::or_query;
use retrieve_core::traits::KeywordStore;
use retrieve_core::analysis::MoveType;
use retrieve_core::types::{Embeddable, KeywordFilter, Meta, OwnerKind};
use retrieve_text::TantivyKeywordStore;
use tempfile::TempDir;

fn chunk(id: &str, content: &str) -> Embeddable {
    Embeddable::new(id, OwnerKind::DocumentChunk, content).with_document("doc-1")
}

fn all() -> KeywordFilter {
    KeywordFilter::default()
}

async fn seeded(store: &TantivyKeywordStore) {
    let mut meta = Meta::new();
    meta.insert("page".into(), 3.into());
    store
        .upsert(&[
            chunk("a", "Systems thinking looks at systems and the thinking behind them.")
                .with_source(Some("guide.md".into()))
                .with_metadata(meta),
            chunk("b", "A system is a set of parts."),
            chunk("c", "Banana bread needs ripe bananas."),
        ])
        .await
        .unwrap();
}

#[tokio::test]
async fn or_query_ranks_by_bm25() {
    let store = TantivyKeywordStore::in_memory().unwrap();
    seeded(&store).await;

    let q = or_query("systems thinking").unwrap();
    let hits = store.search(&q, &all(), 10).await.unwrap();

    assert_eq!(hits[0].id, "a");
    assert!(hits.iter().all(|h| h.id != "c"));
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(hits[0].source.as_deref(), Some("guide.md"));
    assert_eq!(hits[0].metadata["page"], 3);
}

#[tokio::test]
async fn any_term_is_enough_to_match() {
    let store = TantivyKeywordStore::in_memory().unwrap();
    seeded(&store).await;

    let hits = store.search(&or_query("zebra bread").unwrap(), &all(), 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "c");
}

#[tokio::test]
async fn stopword_only_query_matches_nothing() {
    let store = TantivyKeywordStore::in_memory().unwrap();
    seeded(&store).await;

    let hits = store.search(&or_query("the and OR").unwrap(), &all(), 10).await.unwrap_or_default();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn upsert_replaces_and_delete_removes() {
    let store = TantivyKeywordStore::in_memory().unwrap();
    seeded(&store).await;
    assert_eq!(store.num_docs(), 3);

    store.upsert(&[chunk("c", "Sourdough starter care.")]).await.unwrap();
    assert_eq!(store.num_docs(), 3);
    assert!(store.search(&or_query("banana").unwrap(), &all(), 10).await.unwrap().is_empty());
    assert_eq!(store.search(&or_query("sourdough").unwrap(), &all(), 10).await.unwrap()[0].id, "c");

    store.delete("c").await.unwrap();
    assert_eq!(store.num_docs(), 2);
    assert!(store.search(&or_query("sourdough").unwrap(), &all(), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn limit_truncates_results() {
    let store = TantivyKeywordStore::in_memory().unwrap();
    let docs: Vec<_> = (0..5).map(|i| chunk(&format!("n{i}"), "recurring keyword text")).collect();
    store.upsert(&docs).await.unwrap();

    let hits = store.search(&or_query("keyword").unwrap(), &all(), 2).await.unwrap();
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn index_persists_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("kw");
    {
        let store = TantivyKeywordStore::open(&dir).unwrap();
        seeded(&store).await;
    }
    let store = TantivyKeywordStore::open(&dir).unwrap();
    assert_eq!(store.num_docs(), 3);
    let hits = store.search(&or_query("bananas").unwrap(), &all(), 5).await.unwrap();
    assert_eq!(hits[0].id, "c");
}

#[tokio::test]
async fn filter_scopes_by_kind_and_move_without_changing_scores() {
    let store = TantivyKeywordStore::in_memory().unwrap();
    store
        .upsert(&[
            Embeddable::new("k1", OwnerKind::Concept, "Concept: Entropy"),
            Embeddable::new("an1", OwnerKind::Analysis, "DSRP Analysis (zoom-in):\nEntropy has parts.")
                .with_move_type(Some(MoveType::ZoomIn)),
            Embeddable::new("an2", OwnerKind::Analysis, "DSRP Analysis (is-is-not):\nEntropy is not energy.")
                .with_move_type(Some(MoveType::IsIsNot)),
        ])
        .await
        .unwrap();
    let q = or_query("entropy").unwrap();

    let unscoped = store.search(&q, &all(), 10).await.unwrap();
    assert_eq!(unscoped.len(), 3);

    let analyses = KeywordFilter { owner_kind: Some(OwnerKind::Analysis), move_type: None };
    let hits = store.search(&q, &analyses, 10).await.unwrap();
    let mut ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, ["an1", "an2"]);
    assert!(hits.iter().all(|h| h.metadata["owner_kind"] == "analysis"));

    let zoom_in = KeywordFilter { owner_kind: None, move_type: Some(MoveType::ZoomIn) };
    let hits = store.search(&q, &zoom_in, 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "an1");
    let unscoped_score = unscoped.iter().find(|h| h.id == "an1").unwrap().score;
    assert!((hits[0].score - unscoped_score).abs() < 1e-6);
}
