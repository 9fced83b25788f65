//! # runtara-document-store
//!
//! Nested document schemas compiled onto normalized PostgreSQL tables.
//!
//! Collections are described as trees of fields: scalars, groups, tabs, arrays,
//! block lists, hasMany selects and numbers, and relationships. The schema
//! synthesizer compiles every collection into a deterministic set of tables,
//! enums and relation descriptors. The row upsert engine then writes whole
//! documents into those tables and reads them back, replacing nested collections
//! per locale inside one transaction.
//!
//! ## Features
//!
//! - **Deterministic Naming**: Table, column and enum names derive from field paths only
//! - **Localization**: Localized fields live in `<table>_locales` side-tables; localized
//!   arrays and blocks carry a `_locale` column
//! - **Shared Blocks**: Every occurrence of a block slug under one root shares one table
//! - **Collection Replacement**: Nested collections are deleted and re-inserted, never diffed
//! - **Pluggable Storage**: PostgreSQL through sqlx, or an in-memory handle for tests
//! - **SQL Injection Prevention**: All identifiers are validated and quoted
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use runtara_document_store::{
//!     build_schema, CollectionConfig, DocumentStore, FieldDefinition, PgDatabase, StoreConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoreConfig::builder("postgres://localhost/mydb")
//!         .locales(["en", "es"])
//!         .build();
//!
//!     let pages = CollectionConfig::new(
//!         "pages",
//!         vec![
//!             FieldDefinition::text("title").required(),
//!             FieldDefinition::text("summary").localized(),
//!             FieldDefinition::array("items", vec![FieldDefinition::text("text")]),
//!         ],
//!     );
//!
//!     let registry = Arc::new(build_schema(&config, &[pages])?);
//!     let db = PgDatabase::connect(&config.database_url, registry.clone()).await?;
//!     db.push_schema().await?;
//!
//!     let store = DocumentStore::new(db, registry);
//!     let page = store
//!         .create(
//!             "pages",
//!             &serde_json::json!({
//!                 "title": "Home",
//!                 "summary": "Welcome",
//!                 "items": [{"text": "one"}, {"text": "two"}]
//!             }),
//!             Some("en"),
//!         )
//!         .await?;
//!
//!     println!("{}", page);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use runtara_document_store::{IdType, StoreConfig};
//!
//! let config = StoreConfig::builder("postgres://localhost/mydb")
//!     .locales(["en", "de"])       // Enable localization; first locale is the default
//!     .strict_validation(true)     // Reject divergent reused blocks (default)
//!     .disable_unique(false)       // Keep unique field indexes unique (default)
//!     .id_type(IdType::Uuid)       // Text UUID root ids instead of SERIAL
//!     .timestamps(true)            // created_at / updated_at on root tables (default)
//!     .build();
//! ```
//!
//! ## Concurrency
//!
//! Each write runs in its own transaction. Concurrent writes to the same document
//! and the same nested collection are not serialized by this crate; callers rely
//! on the database isolation level or hold their own document lock.

pub mod config;
pub mod error;
pub mod fields;
pub mod naming;
pub mod query;
pub mod schema;
pub mod sql;
pub mod store;
pub mod types;
pub mod upsert;

// Re-export main types for convenience
pub use config::{IdType, LocalizationConfig, StoreConfig, StoreConfigBuilder};
pub use error::{DocumentStoreError, Result};
pub use fields::{Block, CollectionConfig, FieldDefinition, RelationTo, Tab};
pub use query::{JoinStep, QueryTranslator, ResolvedField, resolve_field_path};
pub use schema::{
    Cardinality, CollectionSchema, RelationDescriptor, RelationSet, SchemaRegistry, build_schema,
};
pub use store::{
    DocumentStore, MemoryDatabase, PgDatabase, Predicate, Row, TableAccess, Transaction,
    Transactional,
};
pub use types::{ColumnDefinition, ColumnType, IndexDefinition, TableDefinition, TableKind};
pub use upsert::{UpsertArgs, delete_row, find_row, upsert_row, upsert_row_in};

// Re-export SQL utilities for advanced users
pub use sql::condition::build_predicate_clause;
pub use sql::ddl::DdlGenerator;
pub use sql::sanitize::{quote_identifier, validate_identifier};
