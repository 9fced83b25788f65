//! Document reassembly
//!
//! Fetches the root row and walks the relation graph breadth-first, loading each
//! child table once with an `IN` over the parent ids of the previous level. The
//! fetched rows are then folded back into the nested document for one locale.

use std::collections::{HashMap, VecDeque};

use serde_json::{Map, Value};

use crate::error::Result;
use crate::fields::{ArrayField, Block, BlocksField, FieldAttributes, FieldDefinition};
use crate::naming;
use crate::schema::SchemaRegistry;
use crate::store::{Predicate, Row, TableAccess, value_text};
use crate::types::TableDefinition;

use super::FieldScope;

/// Load a document by root id, or `None` when no root row exists
pub async fn find_row<T: TableAccess + ?Sized>(
    tx: &mut T,
    registry: &SchemaRegistry,
    table: &str,
    id: &Value,
    locale: Option<&str>,
) -> Result<Option<Value>> {
    let root = registry.table(table)?;
    let collection = registry.collection_for_table(table)?;
    let locale = registry.resolve_locale(locale)?;

    let Some(row) = tx
        .select_rows(table, &Predicate::eq(naming::ID, id.clone()))
        .await?
        .into_iter()
        .next()
    else {
        return Ok(None);
    };

    let fetched = fetch_descendants(tx, registry, table, &row).await?;
    tracing::debug!(
        table = %table,
        id = %id,
        tables = fetched.len(),
        "Fetched document rows"
    );

    let assembler = Assembler {
        registry,
        fetched: &fetched,
        locale: locale.as_deref(),
        root_id: row.get(naming::ID).cloned().unwrap_or(Value::Null),
    };
    let mut document = assembler.row(
        &FieldScope::for_row(registry, root, String::new()),
        &collection.fields,
        &row,
    );

    if registry.settings.timestamps {
        for (column, key) in [
            (naming::CREATED_AT, "createdAt"),
            (naming::UPDATED_AT, "updatedAt"),
        ] {
            if let Some(value) = row.get(column) {
                document.insert(key.to_string(), value.clone());
            }
        }
    }

    Ok(Some(Value::Object(document)))
}

async fn fetch_descendants<T: TableAccess + ?Sized>(
    tx: &mut T,
    registry: &SchemaRegistry,
    table: &str,
    root: &Row,
) -> Result<HashMap<String, Vec<Row>>> {
    let mut fetched: HashMap<String, Vec<Row>> = HashMap::new();
    let mut queue: VecDeque<(String, Vec<Value>)> = VecDeque::new();
    queue.push_back((
        table.to_string(),
        root.get(naming::ID).cloned().into_iter().collect(),
    ));

    while let Some((parent, ids)) = queue.pop_front() {
        if ids.is_empty() {
            continue;
        }
        for relation in registry.child_relations(&parent) {
            let rows = tx
                .select_rows(
                    &relation.child_table,
                    &Predicate::is_in(&relation.foreign_key, ids.clone()),
                )
                .await?;
            let child_ids = rows
                .iter()
                .filter_map(|r| r.get(naming::ID))
                .cloned()
                .collect();
            fetched
                .entry(relation.child_table.clone())
                .or_default()
                .extend(rows);
            queue.push_back((relation.child_table.clone(), child_ids));
        }
    }

    Ok(fetched)
}

fn same(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a.and_then(value_text), b.and_then(value_text)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn order_of(row: &Row, column: &str) -> i64 {
    row.get(column).and_then(Value::as_i64).unwrap_or(i64::MAX)
}

struct Assembler<'a> {
    registry: &'a SchemaRegistry,
    fetched: &'a HashMap<String, Vec<Row>>,
    locale: Option<&'a str>,
    root_id: Value,
}

impl<'a> Assembler<'a> {
    /// Rows of `table` referencing `parent`, restricted to the request locale
    /// when the table is locale-scoped
    fn children(&self, table: &TableDefinition, parent: &Value) -> Vec<&'a Row> {
        let Some(rows) = self.fetched.get(&table.name) else {
            return Vec::new();
        };
        let Some(parent_column) = table.parent_column() else {
            return Vec::new();
        };
        let locale = self.locale.map(Value::from);
        let locale_column = table.locale_column();

        rows.iter()
            .filter(|r| same(r.get(parent_column), Some(parent)))
            .filter(|r| match (locale_column, &locale) {
                (Some(column), Some(locale)) => same(r.get(column), Some(locale)),
                _ => true,
            })
            .collect()
    }

    fn row(&self, scope: &FieldScope<'_>, fields: &[FieldDefinition], row: &Row) -> Map<String, Value> {
        let id = row.get(naming::ID).cloned().unwrap_or(Value::Null);
        let locale_row = scope
            .locales
            .and_then(|locales| self.children(locales, &id).into_iter().next());

        let mut out = Map::new();
        out.insert(naming::ID.to_string(), id.clone());
        self.fields(scope, fields, row, locale_row, &id, &mut out);
        out
    }

    fn fields(
        &self,
        scope: &FieldScope<'_>,
        fields: &[FieldDefinition],
        row: &Row,
        locale_row: Option<&Row>,
        id: &Value,
        out: &mut Map<String, Value>,
    ) {
        for field in fields {
            if field.attributes().is_some_and(|a| a.name == naming::ID) {
                continue;
            }

            match field {
                FieldDefinition::Text(f)
                | FieldDefinition::Email(f)
                | FieldDefinition::Code(f)
                | FieldDefinition::Textarea(f)
                | FieldDefinition::RichText(f)
                | FieldDefinition::Json(f)
                | FieldDefinition::Date(f)
                | FieldDefinition::Checkbox(f) => {
                    self.leaf(scope, &f.attributes, row, locale_row, out);
                }
                FieldDefinition::Number(f) if f.has_many => {
                    let values = self.many_numbers(scope, &f.attributes, id);
                    out.insert(f.attributes.name.clone(), values);
                }
                FieldDefinition::Number(f) => self.leaf(scope, &f.attributes, row, locale_row, out),
                FieldDefinition::Select(f) | FieldDefinition::Radio(f) if f.has_many => {
                    let values = self.many_select(scope, &f.attributes, id);
                    out.insert(f.attributes.name.clone(), values);
                }
                FieldDefinition::Select(f) | FieldDefinition::Radio(f) => {
                    self.leaf(scope, &f.attributes, row, locale_row, out);
                }
                FieldDefinition::Array(f) => {
                    let items = self.array(scope, f, id);
                    out.insert(f.attributes.name.clone(), items);
                }
                FieldDefinition::Blocks(f) => {
                    let items = self.blocks(scope, f);
                    out.insert(f.attributes.name.clone(), items);
                }
                FieldDefinition::Group(g) => match &g.name {
                    Some(name) => {
                        let nested = scope.nested_group(name, g.localized);
                        let mut group = Map::new();
                        self.fields(&nested, &g.fields, row, locale_row, id, &mut group);
                        out.insert(name.clone(), Value::Object(group));
                    }
                    None => self.fields(scope, &g.fields, row, locale_row, id, out),
                },
                FieldDefinition::Tabs(t) => {
                    for tab in &t.tabs {
                        match &tab.name {
                            Some(name) => {
                                let nested = scope.nested_group(name, tab.localized);
                                let mut group = Map::new();
                                self.fields(&nested, &tab.fields, row, locale_row, id, &mut group);
                                out.insert(name.clone(), Value::Object(group));
                            }
                            None => self.fields(scope, &tab.fields, row, locale_row, id, out),
                        }
                    }
                }
                FieldDefinition::Row(l) | FieldDefinition::Collapsible(l) => {
                    self.fields(scope, &l.fields, row, locale_row, id, out);
                }
                FieldDefinition::Relationship(_)
                | FieldDefinition::Upload(_)
                | FieldDefinition::Point(_)
                | FieldDefinition::Unknown => {}
            }
        }
    }

    fn leaf(
        &self,
        scope: &FieldScope<'_>,
        attributes: &FieldAttributes,
        row: &Row,
        locale_row: Option<&Row>,
        out: &mut Map<String, Value>,
    ) {
        let column = naming::column_name(&scope.column_prefix, &attributes.name);
        let (table, source) = if scope.is_localized(attributes.localized, self.locale) {
            (scope.locales, locale_row)
        } else {
            (Some(scope.table), Some(row))
        };
        let Some(definition) = table.and_then(|t| t.column(&column)) else {
            return;
        };

        let value = source
            .and_then(|r| r.get(&column))
            .map(|v| definition.column_type.decode_value(v))
            .unwrap_or(Value::Null);
        out.insert(attributes.name.clone(), value);
    }

    fn many_numbers(&self, scope: &FieldScope<'_>, attributes: &FieldAttributes, id: &Value) -> Value {
        let Some(table) = self
            .registry
            .tables
            .get(&naming::numbers_table_name(&scope.table.name))
        else {
            return Value::Array(Vec::new());
        };
        let path = Value::String(scope.path(&attributes.name));
        let localized = scope.is_localized(attributes.localized, self.locale);

        let mut rows: Vec<&Row> = self
            .fetched
            .get(&table.name)
            .into_iter()
            .flatten()
            .filter(|r| same(r.get(naming::VALUE_PARENT_ID), Some(id)))
            .filter(|r| same(r.get(naming::VALUE_PATH), Some(&path)))
            .filter(|r| {
                !localized
                    || same(
                        r.get(naming::VALUE_LOCALE),
                        self.locale.map(Value::from).as_ref(),
                    )
            })
            .collect();
        rows.sort_by_key(|r| order_of(r, naming::VALUE_ORDER));

        Value::Array(
            rows.into_iter()
                .map(|r| r.get(naming::NUMBER_VALUE).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }

    fn many_select(&self, scope: &FieldScope<'_>, attributes: &FieldAttributes, id: &Value) -> Value {
        let name = naming::nested_table_name(
            &scope.scope,
            &format!("{}{}", scope.field_prefix, attributes.name),
        );
        let Some(table) = self.registry.tables.get(&name) else {
            return Value::Array(Vec::new());
        };

        let order = table.order_column().unwrap_or(naming::VALUE_ORDER);
        let mut rows = self.children(table, id);
        rows.sort_by_key(|r| order_of(r, order));
        Value::Array(
            rows.into_iter()
                .map(|r| r.get(naming::SELECT_VALUE).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }

    fn array(&self, scope: &FieldScope<'_>, field: &ArrayField, id: &Value) -> Value {
        let name = &field.attributes.name;
        let Some(table) = self
            .registry
            .tables
            .get(&naming::nested_table_name(&scope.scope, name))
        else {
            return Value::Array(Vec::new());
        };

        let order = table.order_column().unwrap_or(naming::ORDER);
        let mut rows = self.children(table, id);
        rows.sort_by_key(|r| order_of(r, order));

        Value::Array(
            rows.into_iter()
                .enumerate()
                .map(|(i, r)| {
                    let child = FieldScope::for_row(
                        self.registry,
                        table,
                        format!("{}.{}.", scope.path(name), i),
                    );
                    Value::Object(self.row(&child, &field.fields, r))
                })
                .collect(),
        )
    }

    fn blocks(&self, scope: &FieldScope<'_>, field: &BlocksField) -> Value {
        let path = Value::String(scope.path(&field.attributes.name));
        let root_table = self.root_of(&scope.table.name);

        let mut rows: Vec<(&Row, &TableDefinition, &Block)> = Vec::new();
        for block in &field.blocks {
            let Some(table) = self
                .registry
                .tables
                .get(&naming::block_table_name(&root_table, &block.slug))
            else {
                continue;
            };
            for row in self.children(table, &self.root_id) {
                if same(row.get(naming::PATH), Some(&path)) {
                    rows.push((row, table, block));
                }
            }
        }
        rows.sort_by_key(|(r, _, _)| order_of(r, naming::ORDER));

        Value::Array(
            rows.into_iter()
                .enumerate()
                .map(|(i, (r, table, block))| {
                    let child = FieldScope::for_row(
                        self.registry,
                        table,
                        format!("{}.{}.", scope.path(&field.attributes.name), i),
                    );
                    let mut item = self.row(&child, &block.fields, r);
                    item.insert("blockType".to_string(), Value::String(block.slug.clone()));
                    Value::Object(item)
                })
                .collect(),
        )
    }

    /// Block tables always hang off the root table
    fn root_of(&self, table: &str) -> String {
        let mut current = table.to_string();
        while let Some(parent) = self
            .registry
            .tables
            .get(&current)
            .and_then(|t| t.parent.clone())
        {
            current = parent;
        }
        current
    }
}
