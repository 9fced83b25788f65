//! DDL Generation for synthesized schemas
//!
//! Generates PostgreSQL DDL statements for every table of a schema registry.
//! Enums are rendered as TEXT columns with a CHECK constraint, so the schema
//! needs no `CREATE TYPE` and can be dropped table by table.

use crate::schema::SchemaRegistry;
use crate::sql::sanitize::quote_identifier;
use crate::types::{ColumnDefinition, ForeignKey, IndexDefinition, TableDefinition, UniqueConstraint};

/// DDL Generator for a schema registry
pub struct DdlGenerator<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> DdlGenerator<'a> {
    /// Create a new DDL generator for the given registry
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Every CREATE TABLE statement, parents first, followed by every index
    pub fn create_statements(&self) -> Vec<String> {
        let tables = self.registry.tables_in_dependency_order();

        let mut statements: Vec<String> = tables
            .iter()
            .map(|table| Self::generate_create_table(table))
            .collect();
        for table in &tables {
            for index in &table.indexes {
                statements.push(Self::generate_create_index(&table.name, index));
            }
        }
        statements
    }

    /// DROP TABLE statements, children first
    pub fn drop_statements(&self) -> Vec<String> {
        self.registry
            .tables_in_dependency_order()
            .iter()
            .rev()
            .map(|table| Self::generate_drop_table(&table.name))
            .collect()
    }

    /// Generate CREATE TABLE statement with constraints
    ///
    /// Creates a table with:
    /// - Columns in declaration order, with PRIMARY KEY and NOT NULL
    /// - Named UNIQUE constraints
    /// - Foreign keys to the parent table's `id`
    pub fn generate_create_table(table: &TableDefinition) -> String {
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(Self::format_column_definition)
            .collect();

        parts.extend(table.unique_constraints.iter().map(Self::format_unique));
        parts.extend(table.foreign_keys.iter().map(Self::format_foreign_key));

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(&table.name),
            parts.join(", ")
        )
    }

    /// Generate DROP TABLE statement
    pub fn generate_drop_table(table_name: &str) -> String {
        let quoted_table = quote_identifier(table_name);
        format!("DROP TABLE IF EXISTS {} CASCADE", quoted_table)
    }

    /// Generate CREATE INDEX statement
    pub fn generate_create_index(table_name: &str, index: &IndexDefinition) -> String {
        let quoted_table = quote_identifier(table_name);
        let quoted_index_name = quote_identifier(&index.name);

        let quoted_columns: Vec<String> = index
            .columns
            .iter()
            .map(|col| quote_identifier(col))
            .collect();

        let unique_clause = if index.unique { "UNIQUE " } else { "" };

        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            unique_clause,
            quoted_index_name,
            quoted_table,
            quoted_columns.join(", ")
        )
    }

    /// Format a single column definition for CREATE TABLE
    pub fn format_column_definition(col: &ColumnDefinition) -> String {
        let mut parts = vec![
            quote_identifier(&col.name),
            col.column_type.to_sql_type(&col.name),
        ];

        if col.primary_key {
            parts.push("PRIMARY KEY".to_string());
        } else if !col.nullable {
            parts.push("NOT NULL".to_string());
        }

        parts.join(" ")
    }

    fn format_unique(constraint: &UniqueConstraint) -> String {
        let columns: Vec<String> = constraint
            .columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect();
        format!(
            "CONSTRAINT {} UNIQUE ({})",
            quote_identifier(&constraint.name),
            columns.join(", ")
        )
    }

    fn format_foreign_key(fk: &ForeignKey) -> String {
        let on_delete = if fk.on_delete_cascade {
            " ON DELETE CASCADE"
        } else {
            ""
        };
        format!(
            "FOREIGN KEY ({}) REFERENCES {} ({}){}",
            quote_identifier(&fk.column),
            quote_identifier(&fk.references_table),
            quote_identifier(&fk.references_column),
            on_delete
        )
    }
}
