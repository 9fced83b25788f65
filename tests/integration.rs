//! Integration tests for runtara-document-store
//!
//! These tests run the schema synthesizer and the row upsert engine end to end
//! against the in-memory storage handle. See `tests/postgres.rs` for the same
//! flows against a real database.

use std::sync::Arc;

use async_trait::async_trait;
use runtara_document_store::store::MemoryTransaction;
use runtara_document_store::{
    Block, CollectionConfig, DocumentStore, DocumentStoreError, FieldDefinition as F, IdType,
    MemoryDatabase, Predicate, Row, SchemaRegistry, StoreConfig, TableAccess, Transaction,
    Transactional, UpsertArgs, build_schema, upsert_row_in,
};
use serde_json::{Value, json};

fn pages() -> CollectionConfig {
    CollectionConfig::new(
        "pages",
        vec![
            F::text("title"),
            F::text("summary").localized(),
            F::array(
                "items",
                vec![F::text("text").required(), F::text("caption")],
            )
            .localized(),
            F::array("links", vec![F::text("url")]),
            F::select("tags", ["news", "tech", "life"]).has_many(),
            F::number("scores").has_many(),
            F::checkbox("featured"),
            F::group("meta", vec![F::text("description"), F::date("published")]),
            F::blocks(
                "layout",
                vec![
                    Block::new("hero", vec![F::text("heading")]),
                    Block::new(
                        "section",
                        vec![
                            F::text("heading"),
                            F::blocks("content", vec![Block::new("hero", vec![F::text("heading")])]),
                        ],
                    ),
                ],
            ),
        ],
    )
}

fn registry_with(config: StoreConfig) -> Arc<SchemaRegistry> {
    Arc::new(build_schema(&config, &[pages()]).unwrap())
}

fn setup() -> (DocumentStore<MemoryDatabase>, MemoryDatabase) {
    let registry = registry_with(StoreConfig::builder("memory://").locales(["en", "es"]).build());
    let db = MemoryDatabase::new(registry.clone());
    (DocumentStore::new(db.clone(), registry), db)
}

fn setup_with(collection: CollectionConfig) -> (DocumentStore<MemoryDatabase>, MemoryDatabase) {
    let config = StoreConfig::builder("memory://").locales(["en", "es"]).build();
    let registry = Arc::new(build_schema(&config, &[collection]).unwrap());
    let db = MemoryDatabase::new(registry.clone());
    (DocumentStore::new(db.clone(), registry), db)
}

fn items_of(document: &Value) -> Vec<Value> {
    document["items"].as_array().cloned().unwrap_or_default()
}

// ==================== Schema Tests ====================

#[test]
fn test_schema_is_deterministic() {
    let config = StoreConfig::builder("memory://").locales(["en", "es"]).build();
    let first = build_schema(&config, &[pages()]).unwrap();
    let second = build_schema(&config, &[pages()]).unwrap();

    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[test]
fn test_schema_table_names() {
    let registry = registry_with(StoreConfig::builder("memory://").locales(["en", "es"]).build());
    let names: Vec<&str> = registry.tables.keys().map(String::as_str).collect();

    for expected in [
        "pages",
        "pages_locales",
        "pages_items",
        "pages_links",
        "pages_tags",
        "pages_numbers",
        "pages_blocks_hero",
        "pages_blocks_section",
    ] {
        assert!(names.contains(&expected), "missing table {}", expected);
    }

    // The nested hero occurrence reuses the root-level table
    assert_eq!(
        names.iter().filter(|n| n.starts_with("pages_blocks_hero")).count(),
        1
    );
}

#[test]
fn test_has_many_unique_number_fails() {
    let config = StoreConfig::builder("memory://").build();
    let result = build_schema(
        &config,
        &[CollectionConfig::new(
            "stats",
            vec![F::number("values").has_many().unique()],
        )],
    );

    assert!(matches!(result, Err(DocumentStoreError::InvalidConfiguration(_))));
}

#[test]
fn test_reused_hero_block_single_table() {
    let config = StoreConfig::builder("memory://").build();
    let hero = || Block::new("hero", vec![F::text("heading"), F::text("subheading")]);
    let registry = build_schema(
        &config,
        &[CollectionConfig::new(
            "pages",
            vec![F::blocks("top", vec![hero()]), F::blocks("bottom", vec![hero()])],
        )],
    )
    .unwrap();

    let block_tables: Vec<&String> = registry
        .tables
        .keys()
        .filter(|n| n.starts_with("pages_blocks_"))
        .collect();
    assert_eq!(block_tables, vec!["pages_blocks_hero"]);
}

// ==================== Round Trip Tests ====================

#[tokio::test]
async fn test_round_trip() {
    let (store, _) = setup();

    let created = store
        .create(
            "pages",
            &json!({
                "title": "Home",
                "summary": "Welcome",
                "items": [{"text": "first"}, {"text": "second", "caption": "2nd"}],
                "featured": true,
                "meta": {"description": "Landing", "published": "2024-05-01T10:00:00+02:00"}
            }),
            Some("en"),
        )
        .await
        .unwrap();

    let id = created["id"].clone();
    let found = store.find_by_id("pages", &id, Some("en")).await.unwrap().unwrap();

    assert_eq!(found, created);
    assert_eq!(found["title"], json!("Home"));
    assert_eq!(found["summary"], json!("Welcome"));
    assert_eq!(found["featured"], json!(true));
    assert_eq!(found["meta"]["description"], json!("Landing"));
    assert_eq!(found["meta"]["published"], json!("2024-05-01T08:00:00.000Z"));

    let items = items_of(&found);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["text"], json!("first"));
    assert_eq!(items[1]["text"], json!("second"));
    assert_eq!(items[1]["caption"], json!("2nd"));
    assert!(items[0]["id"].as_str().is_some());

    assert!(found["createdAt"].as_str().is_some());
    assert!(found["updatedAt"].as_str().is_some());
    assert_eq!(found["links"], json!([]));
    assert_eq!(found["layout"], json!([]));
}

#[tokio::test]
async fn test_localized_values_per_locale() {
    let (store, _) = setup();

    let created = store
        .create("pages", &json!({"title": "Home", "summary": "Hello"}), Some("en"))
        .await
        .unwrap();
    let id = created["id"].clone();

    store
        .update("pages", &id, &json!({"summary": "Hola"}), Some("es"))
        .await
        .unwrap();

    let en = store.find_by_id("pages", &id, Some("en")).await.unwrap().unwrap();
    let es = store.find_by_id("pages", &id, Some("es")).await.unwrap().unwrap();

    assert_eq!(en["summary"], json!("Hello"));
    assert_eq!(es["summary"], json!("Hola"));
    assert_eq!(es["title"], json!("Home"));
}

#[tokio::test]
async fn test_default_locale_used_when_none_given() {
    let (store, _) = setup();

    let created = store
        .create("pages", &json!({"summary": "Hello"}), None)
        .await
        .unwrap();
    let en = store
        .find_by_id("pages", &created["id"], Some("en"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(en["summary"], json!("Hello"));

    let unknown = store.create("pages", &json!({}), Some("fr")).await;
    assert!(matches!(unknown, Err(DocumentStoreError::Validation(_))));
}

// ==================== Replacement Tests ====================

#[tokio::test]
async fn test_locale_isolation() {
    let (store, db) = setup();

    let created = store
        .create(
            "pages",
            &json!({"items": [{"text": "en one"}, {"text": "en two"}]}),
            Some("en"),
        )
        .await
        .unwrap();
    let id = created["id"].clone();

    store
        .update("pages", &id, &json!({"items": [{"text": "es one"}]}), Some("es"))
        .await
        .unwrap();
    assert_eq!(db.row_count("pages_items").await, 3);

    let updated = store
        .update("pages", &id, &json!({"items": []}), Some("en"))
        .await
        .unwrap();
    assert!(items_of(&updated).is_empty());

    let es = store.find_by_id("pages", &id, Some("es")).await.unwrap().unwrap();
    let es_items = items_of(&es);
    assert_eq!(es_items.len(), 1);
    assert_eq!(es_items[0]["text"], json!("es one"));
    assert_eq!(db.row_count("pages_items").await, 1);
}

#[tokio::test]
async fn test_shared_array_keeps_other_locale_values() {
    let (store, db) = setup_with(CollectionConfig::new(
        "posts",
        vec![F::array(
            "items",
            vec![
                F::text("label"),
                F::text("caption").localized(),
                F::array("notes", vec![F::text("text")]).localized(),
            ],
        )],
    ));

    let created = store
        .create(
            "posts",
            &json!({"items": [{
                "id": "a",
                "label": "x",
                "caption": "en cap",
                "notes": [{"text": "en note"}]
            }]}),
            Some("en"),
        )
        .await
        .unwrap();
    let id = created["id"].clone();

    store
        .update(
            "posts",
            &id,
            &json!({"items": [{
                "id": "a",
                "label": "y",
                "caption": "es cap",
                "notes": [{"text": "es note"}]
            }]}),
            Some("es"),
        )
        .await
        .unwrap();

    let en = store.find_by_id("posts", &id, Some("en")).await.unwrap().unwrap();
    let es = store.find_by_id("posts", &id, Some("es")).await.unwrap().unwrap();

    assert_eq!(en["items"][0]["label"], json!("y"));
    assert_eq!(en["items"][0]["caption"], json!("en cap"));
    assert_eq!(en["items"][0]["notes"][0]["text"], json!("en note"));
    assert_eq!(es["items"][0]["caption"], json!("es cap"));
    assert_eq!(es["items"][0]["notes"][0]["text"], json!("es note"));
    assert_eq!(db.row_count("posts_items").await, 1);
    assert_eq!(db.row_count("posts_items_locales").await, 2);
    assert_eq!(db.row_count("posts_items_notes").await, 2);

    // Dropping the item from the shared array removes every locale's values
    store
        .update("posts", &id, &json!({"items": []}), Some("es"))
        .await
        .unwrap();
    assert_eq!(db.row_count("posts_items_locales").await, 0);
    assert_eq!(db.row_count("posts_items_notes").await, 0);
}

#[tokio::test]
async fn test_read_back_written_into_another_locale() {
    let (store, db) = setup();

    let created = store
        .create(
            "pages",
            &json!({"items": [{"text": "one"}, {"text": "two"}]}),
            Some("en"),
        )
        .await
        .unwrap();
    let id = created["id"].clone();
    let en_items = items_of(&created);

    let es = store
        .update("pages", &id, &json!({"items": en_items}), Some("es"))
        .await
        .unwrap();
    let es_items = items_of(&es);
    assert_eq!(es_items.len(), 2);
    assert_eq!(es_items[0]["text"], json!("one"));
    assert_eq!(es_items[1]["text"], json!("two"));
    assert_ne!(es_items[0]["id"], en_items[0]["id"]);
    assert_eq!(db.row_count("pages_items").await, 4);

    let en = store.find_by_id("pages", &id, Some("en")).await.unwrap().unwrap();
    assert_eq!(items_of(&en), en_items);

    // Writing the same locale back keeps the ids
    let en = store
        .update("pages", &id, &json!({"items": en_items}), Some("en"))
        .await
        .unwrap();
    assert_eq!(items_of(&en), en_items);
    assert_eq!(db.row_count("pages_items").await, 4);
}

#[tokio::test]
async fn test_row_id_of_another_document_rejected() {
    let (store, db) = setup();

    let created = store
        .create("pages", &json!({"items": [{"id": "i1", "text": "one"}]}), Some("en"))
        .await
        .unwrap();

    let err = store
        .create(
            "pages",
            &json!({"title": "copy", "items": [{"id": "i1", "text": "one"}]}),
            Some("en"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Validation(_)));
    assert!(err.to_string().contains("items.0"), "{}", err);
    assert_eq!(db.row_count("pages").await, 1);

    let duplicate = store
        .update(
            "pages",
            &created["id"],
            &json!({"items": [{"id": "i2", "text": "a"}, {"id": "i2", "text": "b"}]}),
            Some("en"),
        )
        .await
        .unwrap_err();
    assert!(matches!(duplicate, DocumentStoreError::Validation(_)));
    assert!(duplicate.to_string().contains("items.1"), "{}", duplicate);
}

#[tokio::test]
async fn test_replacement_leaves_single_row() {
    let (store, db) = setup();

    let created = store
        .create(
            "pages",
            &json!({"links": [{"url": "/a"}, {"url": "/b"}]}),
            None,
        )
        .await
        .unwrap();
    let id = created["id"].clone();

    store
        .update("pages", &id, &json!({"links": [{"url": "/c"}]}), None)
        .await
        .unwrap();

    let rows = db.rows("pages_links").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["_order"], json!(0));
    assert_eq!(rows[0]["url"], json!("/c"));
}

#[tokio::test]
async fn test_absent_collections_untouched_and_null_clears() {
    let (store, db) = setup();

    let created = store
        .create(
            "pages",
            &json!({"title": "a", "links": [{"url": "/a"}]}),
            None,
        )
        .await
        .unwrap();
    let id = created["id"].clone();

    let updated = store
        .update("pages", &id, &json!({"title": "b"}), None)
        .await
        .unwrap();
    assert_eq!(updated["title"], json!("b"));
    assert_eq!(db.row_count("pages_links").await, 1);

    store
        .update("pages", &id, &json!({"links": null}), None)
        .await
        .unwrap();
    assert_eq!(db.row_count("pages_links").await, 0);
}

#[tokio::test]
async fn test_update_is_idempotent() {
    let (store, db) = setup();

    let created = store.create("pages", &json!({"title": "a"}), None).await.unwrap();
    let id = created["id"].clone();
    let document = json!({
        "title": "b",
        "items": [{"id": "i1", "text": "one"}, {"id": "i2", "text": "two"}],
        "tags": ["tech", "news"],
        "scores": [1, 2],
        "layout": [{"id": "h1", "blockType": "hero", "heading": "Top"}]
    });

    let first = store.update("pages", &id, &document, None).await.unwrap();
    let tables = ["pages_items", "pages_tags", "pages_numbers", "pages_blocks_hero"];
    let mut after_first = Vec::new();
    for table in tables {
        after_first.push(db.rows(table).await.len());
    }

    let second = store.update("pages", &id, &document, None).await.unwrap();
    let mut after_second = Vec::new();
    for table in tables {
        after_second.push(db.rows(table).await.len());
    }

    assert_eq!(after_first, vec![2, 2, 2, 1]);
    assert_eq!(after_first, after_second);
    assert_eq!(first["items"], second["items"]);
    assert_eq!(first["tags"], second["tags"]);
    assert_eq!(db.rows("pages_items").await[0]["id"], json!("i1"));
}

// ==================== Nested Value Tests ====================

#[tokio::test]
async fn test_has_many_select_and_numbers() {
    let (store, _) = setup();

    let created = store
        .create(
            "pages",
            &json!({"tags": ["tech", "news"], "scores": [3, "4.5"]}),
            None,
        )
        .await
        .unwrap();

    assert_eq!(created["tags"], json!(["tech", "news"]));
    assert_eq!(created["scores"], json!([3, 4.5]));

    let invalid = store.create("pages", &json!({"tags": ["sports"]}), None).await;
    assert!(matches!(invalid, Err(DocumentStoreError::Validation(_))));
}

#[tokio::test]
async fn test_blocks_nested_paths_and_purge() {
    let (store, db) = setup();

    let created = store
        .create(
            "pages",
            &json!({
                "layout": [
                    {"blockType": "hero", "heading": "Top"},
                    {
                        "blockType": "section",
                        "heading": "Body",
                        "content": [{"blockType": "hero", "heading": "Inner"}]
                    }
                ]
            }),
            None,
        )
        .await
        .unwrap();

    let layout = created["layout"].as_array().unwrap();
    assert_eq!(layout.len(), 2);
    assert_eq!(layout[0]["blockType"], json!("hero"));
    assert_eq!(layout[0]["heading"], json!("Top"));
    assert_eq!(layout[1]["blockType"], json!("section"));
    assert_eq!(layout[1]["content"][0]["heading"], json!("Inner"));

    let paths: Vec<Value> = db
        .rows("pages_blocks_hero")
        .await
        .iter()
        .map(|r| r["_path"].clone())
        .collect();
    assert!(paths.contains(&json!("layout")));
    assert!(paths.contains(&json!("layout.1.content")));

    let id = created["id"].clone();
    let updated = store
        .update(
            "pages",
            &id,
            &json!({"layout": [{"blockType": "hero", "heading": "Only"}]}),
            None,
        )
        .await
        .unwrap();

    assert_eq!(updated["layout"].as_array().unwrap().len(), 1);
    assert_eq!(db.row_count("pages_blocks_hero").await, 1);
    assert_eq!(db.row_count("pages_blocks_section").await, 0);
}

#[tokio::test]
async fn test_unknown_block_type_rejected() {
    let (store, db) = setup();

    let result = store
        .create("pages", &json!({"layout": [{"blockType": "banner"}]}), None)
        .await;

    assert!(matches!(result, Err(DocumentStoreError::Validation(_))));
    assert_eq!(db.row_count("pages").await, 0);
}

// ==================== Transaction Tests ====================

/// Counts the deletes an upsert issues through a memory transaction
struct CountingTransaction {
    inner: MemoryTransaction,
    deletes: usize,
}

#[async_trait]
impl TableAccess for CountingTransaction {
    async fn insert_rows(
        &mut self,
        table: &str,
        rows: Vec<Row>,
    ) -> runtara_document_store::Result<Vec<Row>> {
        self.inner.insert_rows(table, rows).await
    }

    async fn update_rows(
        &mut self,
        table: &str,
        values: Row,
        predicate: &Predicate,
    ) -> runtara_document_store::Result<u64> {
        self.inner.update_rows(table, values, predicate).await
    }

    async fn delete_rows(
        &mut self,
        table: &str,
        predicate: &Predicate,
    ) -> runtara_document_store::Result<u64> {
        self.deletes += 1;
        self.inner.delete_rows(table, predicate).await
    }

    async fn select_rows(
        &mut self,
        table: &str,
        predicate: &Predicate,
    ) -> runtara_document_store::Result<Vec<Row>> {
        self.inner.select_rows(table, predicate).await
    }
}

#[tokio::test]
async fn test_create_issues_no_deletes() {
    let (store, db) = setup();
    let mut tx = CountingTransaction {
        inner: db.begin().await.unwrap(),
        deletes: 0,
    };
    let data = json!({
        "title": "Home",
        "summary": "Hello",
        "items": [{"text": "one"}],
        "links": [{"url": "/a"}],
        "tags": ["tech"],
        "layout": [{"blockType": "hero", "heading": "Top"}]
    });

    let created = upsert_row_in(
        &mut tx,
        store.registry(),
        UpsertArgs {
            table: "pages",
            data: &data,
            id: None,
            locale: Some("en"),
        },
    )
    .await
    .unwrap();
    assert_eq!(tx.deletes, 0);

    upsert_row_in(
        &mut tx,
        store.registry(),
        UpsertArgs {
            table: "pages",
            data: &data,
            id: Some(&created["id"]),
            locale: Some("en"),
        },
    )
    .await
    .unwrap();
    assert!(tx.deletes > 0);

    tx.inner.commit().await.unwrap();
    assert_eq!(db.row_count("pages_items").await, 1);
    assert_eq!(db.row_count("pages_links").await, 1);
}

#[tokio::test]
async fn test_failed_update_rolls_back() {
    let (store, db) = setup();

    let created = store
        .create(
            "pages",
            &json!({"title": "before", "items": [{"text": "kept"}]}),
            Some("en"),
        )
        .await
        .unwrap();
    let id = created["id"].clone();
    let before = db.snapshot().await;

    // `text` is required, so inserting the replacement item fails after the
    // root row was updated and the old items were deleted
    let result = store
        .update(
            "pages",
            &id,
            &json!({"title": "after", "items": [{"caption": "no text"}]}),
            Some("en"),
        )
        .await;
    assert!(matches!(result, Err(DocumentStoreError::Constraint(_))));

    let found = store.find_by_id("pages", &id, Some("en")).await.unwrap().unwrap();
    assert_eq!(found["title"], json!("before"));
    assert_eq!(db.snapshot().await, before);
}

#[tokio::test]
async fn test_validation_error_persists_nothing() {
    let (store, db) = setup();

    let result = store.create("pages", &json!({"title": 5}), None).await;
    assert!(matches!(result, Err(DocumentStoreError::Validation(_))));

    let result = store.create("pages", &json!("not an object"), None).await;
    assert!(matches!(result, Err(DocumentStoreError::Validation(_))));

    assert_eq!(db.row_count("pages").await, 0);
}

#[tokio::test]
async fn test_update_missing_document() {
    let (store, _) = setup();

    let result = store
        .update("pages", &json!(42), &json!({"title": "x"}), None)
        .await;
    assert!(matches!(result, Err(DocumentStoreError::DocumentNotFound(_))));

    let missing = store.find_by_id("pages", &json!(42), None).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_unknown_collection() {
    let (store, _) = setup();
    let result = store.create("posts", &json!({}), None).await;
    assert!(matches!(result, Err(DocumentStoreError::CollectionNotFound(_))));
}

// ==================== Delete Tests ====================

#[tokio::test]
async fn test_delete_cascades() {
    let (store, db) = setup();

    let created = store
        .create(
            "pages",
            &json!({
                "summary": "Hello",
                "items": [{"text": "one"}],
                "tags": ["life"],
                "scores": [1],
                "layout": [{"blockType": "hero", "heading": "Top"}]
            }),
            Some("en"),
        )
        .await
        .unwrap();
    let id = created["id"].clone();

    store.delete("pages", &id).await.unwrap();

    for table in [
        "pages",
        "pages_locales",
        "pages_items",
        "pages_tags",
        "pages_numbers",
        "pages_blocks_hero",
    ] {
        assert_eq!(db.row_count(table).await, 0, "rows left in {}", table);
    }

    let again = store.delete("pages", &id).await;
    assert!(matches!(again, Err(DocumentStoreError::DocumentNotFound(_))));
}

// ==================== Configuration Tests ====================

#[tokio::test]
async fn test_uuid_ids() {
    let registry = registry_with(
        StoreConfig::builder("memory://")
            .id_type(IdType::Uuid)
            .timestamps(false)
            .build(),
    );
    let db = MemoryDatabase::new(registry.clone());
    let store = DocumentStore::new(db.clone(), registry);

    let created = store
        .create("pages", &json!({"title": "x", "links": [{"url": "/a"}]}), None)
        .await
        .unwrap();

    let id = created["id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
    assert!(created.get("createdAt").is_none());
    assert_eq!(db.rows("pages_links").await[0]["_parent_id"], json!(id));
}

#[tokio::test]
async fn test_localization_disabled() {
    let registry = registry_with(StoreConfig::builder("memory://").build());
    assert!(!registry.tables.contains_key("pages_locales"));

    let db = MemoryDatabase::new(registry.clone());
    let store = DocumentStore::new(db, registry);

    let created = store
        .create(
            "pages",
            &json!({"summary": "inline", "items": [{"text": "one"}]}),
            Some("en"),
        )
        .await
        .unwrap();
    assert_eq!(created["summary"], json!("inline"));
    assert_eq!(items_of(&created).len(), 1);
}
