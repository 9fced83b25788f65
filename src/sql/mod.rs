//! SQL utilities for the document store
//!
//! Provides DDL generation, identifier sanitization, and WHERE clause building.

pub mod condition;
pub mod ddl;
pub mod sanitize;

pub use condition::build_predicate_clause;
pub use ddl::DdlGenerator;
pub use sanitize::{escape_like, quote_identifier, validate_identifier};
