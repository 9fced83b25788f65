//! Core type definitions for synthesized schemas
//!
//! Includes column types, column definitions, index, constraint and table definitions.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, Result};
use crate::naming;
use crate::sql::sanitize::quote_identifier;

// ============================================================================
// Column Types
// ============================================================================

/// Storage kind of a synthesized column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColumnType {
    /// Auto-incrementing integer primary key (maps to SERIAL)
    Serial,

    /// Integer (order indexes and references to serial keys, maps to INTEGER)
    Integer,

    /// Arbitrary precision number (maps to NUMERIC)
    Numeric,

    /// Text field (maps to TEXT)
    Text,

    /// Structured value serialized as JSON text (maps to TEXT)
    Json,

    /// Timestamp serialized as RFC 3339 UTC text with millisecond precision
    Date,

    /// Boolean stored as integer 0/1
    Boolean,

    /// Text restricted to the values of a named enum
    Enum {
        /// Enum name in the schema registry
        name: String,
        /// Allowed values in declaration order
        values: Vec<String>,
    },
}

impl ColumnType {
    pub fn enumeration(name: impl Into<String>, values: Vec<String>) -> Self {
        ColumnType::Enum {
            name: name.into(),
            values,
        }
    }

    /// Convert column type to PostgreSQL type string
    pub fn to_sql_type(&self, column_name: &str) -> String {
        match self {
            ColumnType::Serial => "SERIAL".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Numeric => "NUMERIC".to_string(),
            ColumnType::Text | ColumnType::Json | ColumnType::Date => "TEXT".to_string(),
            ColumnType::Boolean => {
                format!("INTEGER CHECK ({} IN (0, 1))", quote_identifier(column_name))
            }
            ColumnType::Enum { values, .. } => {
                // Enums use TEXT with a CHECK constraint
                format!(
                    "TEXT CHECK ({} IN ({}))",
                    quote_identifier(column_name),
                    values
                        .iter()
                        .map(|v| format!("'{}'", v.replace('\'', "''")))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
        }
    }

    /// Convert a document value into its stored representation.
    ///
    /// Null passes through; nullability is enforced by the storage handle.
    pub fn coerce_value(
        &self,
        value: &serde_json::Value,
    ) -> std::result::Result<serde_json::Value, String> {
        use serde_json::Value;

        if value.is_null() {
            return Ok(Value::Null);
        }

        match (self, value) {
            (ColumnType::Serial | ColumnType::Integer, Value::Number(n)) => n
                .as_i64()
                .map(Value::from)
                .ok_or_else(|| format!("Expected integer, got {}", n)),
            // Allow string-to-integer coercion
            (ColumnType::Serial | ColumnType::Integer, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("Cannot convert '{}' to integer", s)),
            (ColumnType::Numeric, Value::Number(_)) => Ok(value.clone()),
            (ColumnType::Numeric, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("Cannot convert '{}' to number", s)),
            (ColumnType::Text, Value::String(_)) => Ok(value.clone()),
            (ColumnType::Json, _) => serde_json::to_string(value)
                .map(Value::String)
                .map_err(|e| format!("Cannot serialize JSON value: {}", e)),
            (ColumnType::Date, Value::String(s)) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|ts| {
                    Value::String(
                        ts.with_timezone(&chrono::Utc)
                            .to_rfc3339_opts(SecondsFormat::Millis, true),
                    )
                })
                .map_err(|e| format!("Invalid timestamp format: {}", e)),
            (ColumnType::Boolean, Value::Bool(b)) => Ok(Value::from(i64::from(*b))),
            // Allow string-to-boolean coercion
            (ColumnType::Boolean, Value::String(s)) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Value::from(1)),
                "false" | "0" | "no" => Ok(Value::from(0)),
                _ => Err(format!("Cannot convert '{}' to boolean", s)),
            },
            (ColumnType::Boolean, Value::Number(n)) => match n.as_i64() {
                Some(0) => Ok(Value::from(0)),
                Some(1) => Ok(Value::from(1)),
                _ => Err(format!("Cannot convert {} to boolean", n)),
            },
            (ColumnType::Enum { name, values }, Value::String(s)) => {
                if values.contains(s) {
                    Ok(value.clone())
                } else {
                    Err(format!("Value '{}' not in {}: {:?}", s, name, values))
                }
            }
            _ => Err(format!(
                "Type mismatch: expected {}, got {}",
                self.kind_name(),
                value
            )),
        }
    }

    /// Convert a stored value back into its document representation
    pub fn decode_value(&self, stored: &serde_json::Value) -> serde_json::Value {
        use serde_json::Value;

        match (self, stored) {
            (ColumnType::Boolean, Value::Number(n)) => Value::Bool(n.as_i64() == Some(1)),
            (ColumnType::Json, Value::String(s)) => {
                serde_json::from_str(s).unwrap_or_else(|_| stored.clone())
            }
            _ => stored.clone(),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            ColumnType::Serial | ColumnType::Integer => "integer",
            ColumnType::Numeric => "number",
            ColumnType::Text => "string",
            ColumnType::Json => "json",
            ColumnType::Date => "timestamp",
            ColumnType::Boolean => "boolean",
            ColumnType::Enum { .. } => "enum value",
        }
    }
}

fn default_nullable() -> bool {
    true
}

// ============================================================================
// Column, Index and Constraint Definitions
// ============================================================================

/// Column definition of a synthesized table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDefinition {
    /// Column name (valid PostgreSQL identifier)
    pub name: String,

    /// Storage kind
    #[serde(flatten)]
    pub column_type: ColumnType,

    /// Whether the column allows NULL values (default: true)
    #[serde(default = "default_nullable")]
    pub nullable: bool,

    #[serde(default, rename = "primaryKey")]
    pub primary_key: bool,
}

impl ColumnDefinition {
    /// Create a new column definition with a name and type
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
        }
    }

    /// Set the column as non-nullable
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set the column as primary key (implies non-nullable)
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

/// Index definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexDefinition {
    /// Index name
    pub name: String,

    /// Columns included in the index
    pub columns: Vec<String>,

    /// Whether this is a UNIQUE index (default: false)
    #[serde(default)]
    pub unique: bool,
}

impl IndexDefinition {
    /// Create a new index definition
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
        }
    }

    /// Set the index as unique
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Multi-column uniqueness constraint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

impl UniqueConstraint {
    pub fn new(name: impl Into<String>, columns: Vec<&str>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(String::from).collect(),
        }
    }
}

/// Reference from a child column to a parent table key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForeignKey {
    pub column: String,
    #[serde(rename = "referencesTable")]
    pub references_table: String,
    #[serde(rename = "referencesColumn")]
    pub references_column: String,
    #[serde(rename = "onDeleteCascade")]
    pub on_delete_cascade: bool,
}

// ============================================================================
// Table Definitions
// ============================================================================

/// Role of a table within a collection's table tree
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// One row per document
    Root,
    /// Ordered rows of an array field
    Array,
    /// Rows of one block slug, shared by every occurrence under a root
    Block,
    /// Per-locale values of the owning table
    Locales,
    /// Values of a hasMany select field
    Select,
    /// Values of every hasMany number field of the owning table
    Numbers,
}

/// Table produced by schema synthesis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub kind: TableKind,
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
    #[serde(default, rename = "uniqueConstraints")]
    pub unique_constraints: Vec<UniqueConstraint>,
    #[serde(default, rename = "foreignKeys")]
    pub foreign_keys: Vec<ForeignKey>,
    /// Table referenced by the parent foreign key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>, kind: TableKind) -> Self {
        Self {
            name: name.into(),
            kind,
            columns: Vec::new(),
            indexes: Vec::new(),
            unique_constraints: Vec::new(),
            foreign_keys: Vec::new(),
            parent: None,
        }
    }

    /// Append a column, rejecting a second column with the same name
    pub fn add_column(&mut self, column: ColumnDefinition) -> Result<()> {
        if self.has_column(&column.name) {
            return Err(DocumentStoreError::invalid_configuration(format!(
                "Duplicate column '{}' in table '{}'",
                column.name, self.name
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Add the parent foreign key column and its constraint
    pub fn add_parent_reference(
        &mut self,
        column: &str,
        column_type: ColumnType,
        parent_table: &str,
    ) -> Result<()> {
        self.add_column(ColumnDefinition::new(column, column_type).not_null())?;
        self.foreign_keys.push(ForeignKey {
            column: column.to_string(),
            references_table: parent_table.to_string(),
            references_column: naming::ID.to_string(),
            on_delete_cascade: true,
        });
        self.parent = Some(parent_table.to_string());
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Storage kind of the primary key
    pub fn id_type(&self) -> Option<&ColumnType> {
        self.column(naming::ID).map(|c| &c.column_type)
    }

    /// Column holding the parent reference, if this is a child table
    pub fn parent_column(&self) -> Option<&str> {
        self.foreign_keys.first().map(|fk| fk.column.as_str())
    }

    /// Locale column of this table, if its rows are locale-scoped
    pub fn locale_column(&self) -> Option<&'static str> {
        let column = match self.kind {
            TableKind::Select | TableKind::Numbers => naming::VALUE_LOCALE,
            _ => naming::LOCALE,
        };
        self.has_column(column).then_some(column)
    }

    /// Order column of this table, if its rows are ordered
    pub fn order_column(&self) -> Option<&'static str> {
        let column = match self.kind {
            TableKind::Select | TableKind::Numbers => naming::VALUE_ORDER,
            _ => naming::ORDER,
        };
        self.has_column(column).then_some(column)
    }
}
