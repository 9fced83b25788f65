//! Document decomposition
//!
//! Turns one incoming document into the root row values, the root locale row and
//! a flat list of descendant rows ordered parent before child, plus the delete
//! scopes an update has to clear first. Array and block rows carry text ids taken
//! from the item or freshly generated, so every descendant knows its parent id
//! before anything is written. Only the root id may be unknown until insert.

use serde_json::{Map, Value};

use crate::error::{DocumentStoreError, Result};
use crate::fields::{
    ArrayField, BlocksField, FieldAttributes, FieldDefinition, NumberField, SelectField,
};
use crate::naming;
use crate::schema::SchemaRegistry;
use crate::store::Row;
use crate::types::{ColumnDefinition, TableDefinition};

use super::FieldScope;
use super::delete::DeleteScope;

/// Parent of a pending row
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParentRef {
    /// The document's root row, whose id may not exist yet
    Root,
    Row(String),
}

#[derive(Debug, Clone)]
pub(crate) struct PendingRow {
    pub table: String,
    pub parent: ParentRef,
    /// Values without the parent reference column
    pub values: Row,
    /// Document path of the item or value, e.g. `items.0`
    pub path: String,
    /// The `id` value came from the document rather than being generated
    pub supplied_id: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Decomposition {
    pub root: Row,
    pub root_locale: Row,
    pub rows: Vec<PendingRow>,
    pub scopes: Vec<DeleteScope>,
}

/// Values of one row and of its locale side row
#[derive(Debug, Default)]
struct RowValues {
    values: Row,
    locale_values: Row,
}

pub(crate) fn decompose(
    registry: &SchemaRegistry,
    root: &TableDefinition,
    fields: &[FieldDefinition],
    data: &Map<String, Value>,
    locale: Option<&str>,
) -> Result<Decomposition> {
    let mut decomposer = Decomposer {
        registry,
        root_table: &root.name,
        locale,
        rows: Vec::new(),
        scopes: Vec::new(),
    };

    let scope = FieldScope::for_row(registry, root, String::new());
    let mut values = RowValues::default();
    decomposer.walk(&scope, fields, data, &mut values, &ParentRef::Root, true)?;

    Ok(Decomposition {
        root: values.values,
        root_locale: values.locale_values,
        rows: decomposer.rows,
        scopes: decomposer.scopes,
    })
}

fn mismatch(table: &str, detail: impl std::fmt::Display) -> DocumentStoreError {
    DocumentStoreError::validation(format!(
        "Document does not fit table '{}': {}",
        table, detail
    ))
}

fn expect_array<'v>(value: &'v Value, path: &str) -> Result<Option<&'v Vec<Value>>> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => Ok(Some(items)),
        other => Err(DocumentStoreError::validation(format!(
            "Field '{}' expects a list, got {}",
            path, other
        ))),
    }
}

/// Id of an array or block item and whether the document supplied it
fn row_id(item: &Map<String, Value>) -> (String, bool) {
    match item.get(naming::ID) {
        Some(Value::String(id)) if !id.is_empty() => (id.clone(), true),
        Some(Value::Number(id)) => (id.to_string(), true),
        _ => (uuid::Uuid::new_v4().to_string(), false),
    }
}

struct Decomposer<'a> {
    registry: &'a SchemaRegistry,
    root_table: &'a str,
    locale: Option<&'a str>,
    rows: Vec<PendingRow>,
    scopes: Vec<DeleteScope>,
}

impl<'a> Decomposer<'a> {
    fn table(&self, name: &str) -> Result<&'a TableDefinition> {
        self.registry
            .tables
            .get(name)
            .ok_or_else(|| mismatch(name, "table does not exist"))
    }

    fn walk(
        &mut self,
        scope: &FieldScope<'a>,
        fields: &[FieldDefinition],
        data: &Map<String, Value>,
        target: &mut RowValues,
        owner: &ParentRef,
        at_root: bool,
    ) -> Result<()> {
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
                    self.leaf(scope, &f.attributes, data, target)?;
                }
                FieldDefinition::Number(f) if f.has_many => {
                    self.many_numbers(scope, f, data, owner, at_root)?;
                }
                FieldDefinition::Number(f) => self.leaf(scope, &f.attributes, data, target)?,
                FieldDefinition::Select(f) | FieldDefinition::Radio(f) if f.has_many => {
                    self.many_select(scope, f, data, owner, at_root)?;
                }
                FieldDefinition::Select(f) | FieldDefinition::Radio(f) => {
                    self.leaf(scope, &f.attributes, data, target)?;
                }
                FieldDefinition::Array(f) => self.array(scope, f, data, owner, at_root)?,
                FieldDefinition::Blocks(f) => self.blocks(scope, f, data, at_root)?,
                FieldDefinition::Group(g) => match &g.name {
                    Some(name) => {
                        if let Some(Value::Object(group)) = data.get(name) {
                            let nested = scope.nested_group(name, g.localized);
                            self.walk(&nested, &g.fields, group, target, owner, at_root)?;
                        }
                    }
                    None => self.walk(scope, &g.fields, data, target, owner, at_root)?,
                },
                FieldDefinition::Tabs(t) => {
                    for tab in &t.tabs {
                        match &tab.name {
                            Some(name) => {
                                if let Some(Value::Object(group)) = data.get(name) {
                                    let nested = scope.nested_group(name, tab.localized);
                                    self.walk(&nested, &tab.fields, group, target, owner, at_root)?;
                                }
                            }
                            None => self.walk(scope, &tab.fields, data, target, owner, at_root)?,
                        }
                    }
                }
                FieldDefinition::Row(l) | FieldDefinition::Collapsible(l) => {
                    self.walk(scope, &l.fields, data, target, owner, at_root)?;
                }
                // Relationship values belong to the join-table builder
                FieldDefinition::Relationship(_)
                | FieldDefinition::Upload(_)
                | FieldDefinition::Point(_)
                | FieldDefinition::Unknown => {}
            }
        }
        Ok(())
    }

    fn leaf(
        &self,
        scope: &FieldScope<'a>,
        attributes: &FieldAttributes,
        data: &Map<String, Value>,
        target: &mut RowValues,
    ) -> Result<()> {
        let Some(value) = data.get(&attributes.name) else {
            return Ok(());
        };

        let column = naming::column_name(&scope.column_prefix, &attributes.name);
        let localized = scope.is_localized(attributes.localized, self.locale);
        let table = if localized {
            scope
                .locales
                .ok_or_else(|| mismatch(&scope.table.name, "no locale side-table"))?
        } else {
            scope.table
        };
        let definition = table
            .column(&column)
            .ok_or_else(|| mismatch(&table.name, format!("missing column '{}'", column)))?;

        let stored = Self::coerce(definition, value, &scope.path(&attributes.name))?;
        if localized {
            target.locale_values.insert(column, stored);
        } else {
            target.values.insert(column, stored);
        }
        Ok(())
    }

    fn coerce(definition: &ColumnDefinition, value: &Value, path: &str) -> Result<Value> {
        definition
            .column_type
            .coerce_value(value)
            .map_err(|e| DocumentStoreError::validation(format!("Field '{}': {}", path, e)))
    }

    fn many_numbers(
        &mut self,
        scope: &FieldScope<'a>,
        field: &NumberField,
        data: &Map<String, Value>,
        owner: &ParentRef,
        at_root: bool,
    ) -> Result<()> {
        let name = &field.attributes.name;
        let Some(value) = data.get(name) else {
            return Ok(());
        };
        let path = scope.path(name);
        let items = expect_array(value, &path)?;

        let table = self.table(&naming::numbers_table_name(&scope.table.name))?;
        let number = table
            .column(naming::NUMBER_VALUE)
            .ok_or_else(|| mismatch(&table.name, "missing number column"))?;
        let locale = if scope.is_localized(field.attributes.localized, self.locale) {
            if !table.has_column(naming::VALUE_LOCALE) {
                return Err(mismatch(&table.name, "missing locale column"));
            }
            self.locale
        } else {
            None
        };

        if at_root {
            self.push_path_scope(&table.name, naming::VALUE_PATH, &path, locale);
        }

        for (i, item) in items.into_iter().flatten().enumerate() {
            let mut values = Row::new();
            values.insert(naming::VALUE_ORDER.to_string(), Value::from(i));
            values.insert(naming::VALUE_PATH.to_string(), Value::String(path.clone()));
            let item_path = format!("{}.{}", path, i);
            values.insert(
                naming::NUMBER_VALUE.to_string(),
                Self::coerce(number, item, &item_path)?,
            );
            if let Some(locale) = locale {
                values.insert(naming::VALUE_LOCALE.to_string(), Value::from(locale));
            }
            self.rows.push(PendingRow {
                table: table.name.clone(),
                parent: owner.clone(),
                values,
                path: item_path,
                supplied_id: false,
            });
        }
        Ok(())
    }

    fn many_select(
        &mut self,
        scope: &FieldScope<'a>,
        field: &SelectField,
        data: &Map<String, Value>,
        owner: &ParentRef,
        at_root: bool,
    ) -> Result<()> {
        let name = &field.attributes.name;
        let Some(value) = data.get(name) else {
            return Ok(());
        };
        let path = scope.path(name);
        let items = expect_array(value, &path)?;

        let table_name =
            naming::nested_table_name(&scope.scope, &format!("{}{}", scope.field_prefix, name));
        let table = self.table(&table_name)?;
        let value_column = table
            .column(naming::SELECT_VALUE)
            .ok_or_else(|| mismatch(&table.name, "missing value column"))?;
        let locale = table.locale_column().and(self.locale);

        if at_root {
            self.scopes.push(DeleteScope::Children {
                table: table.name.clone(),
                locale: locale.map(String::from),
            });
        }

        for (i, item) in items.into_iter().flatten().enumerate() {
            let mut values = Row::new();
            values.insert(naming::VALUE_ORDER.to_string(), Value::from(i));
            let item_path = format!("{}.{}", path, i);
            values.insert(
                naming::SELECT_VALUE.to_string(),
                Self::coerce(value_column, item, &item_path)?,
            );
            if let Some(locale) = locale {
                values.insert(naming::VALUE_LOCALE.to_string(), Value::from(locale));
            }
            self.rows.push(PendingRow {
                table: table.name.clone(),
                parent: owner.clone(),
                values,
                path: item_path,
                supplied_id: false,
            });
        }
        Ok(())
    }

    fn array(
        &mut self,
        scope: &FieldScope<'a>,
        field: &ArrayField,
        data: &Map<String, Value>,
        owner: &ParentRef,
        at_root: bool,
    ) -> Result<()> {
        let name = &field.attributes.name;
        let Some(value) = data.get(name) else {
            return Ok(());
        };
        let path = scope.path(name);
        let items = expect_array(value, &path)?;

        let table = self.table(&naming::nested_table_name(&scope.scope, name))?;
        let locale = table
            .has_column(naming::LOCALE)
            .then_some(self.locale)
            .flatten();

        if at_root {
            self.scopes.push(DeleteScope::Children {
                table: table.name.clone(),
                locale: locale.map(String::from),
            });
            self.scopes.push(DeleteScope::Subtree {
                prefix: format!("{}.", path),
                locale: locale.map(String::from),
            });
        }

        for (i, item) in items.into_iter().flatten().enumerate() {
            let Value::Object(item) = item else {
                return Err(DocumentStoreError::validation(format!(
                    "Field '{}.{}' expects an object",
                    path, i
                )));
            };

            let (id, supplied) = row_id(item);
            let mut seed = Row::new();
            seed.insert(naming::ID.to_string(), Value::String(id));
            seed.insert(naming::ORDER.to_string(), Value::from(i));
            if let Some(locale) = locale {
                seed.insert(naming::LOCALE.to_string(), Value::from(locale));
            }

            let child_scope = FieldScope::for_row(self.registry, table, format!("{}.{}.", path, i));
            self.nested_row(&child_scope, &field.fields, item, seed, owner.clone(), supplied)?;
        }
        Ok(())
    }

    fn blocks(
        &mut self,
        scope: &FieldScope<'a>,
        field: &BlocksField,
        data: &Map<String, Value>,
        at_root: bool,
    ) -> Result<()> {
        let name = &field.attributes.name;
        let Some(value) = data.get(name) else {
            return Ok(());
        };
        let path = scope.path(name);
        let items = expect_array(value, &path)?;

        if at_root {
            let mut localized = false;
            for block in &field.blocks {
                let table = self.table(&naming::block_table_name(self.root_table, &block.slug))?;
                let locale = table.locale_column().and(self.locale);
                localized |= locale.is_some();
                self.push_path_scope(&table.name, naming::PATH, &path, locale);
            }
            self.scopes.push(DeleteScope::Subtree {
                prefix: format!("{}.", path),
                locale: localized.then_some(self.locale).flatten().map(String::from),
            });
        }

        for (i, item) in items.into_iter().flatten().enumerate() {
            let Value::Object(item) = item else {
                return Err(DocumentStoreError::validation(format!(
                    "Field '{}.{}' expects an object",
                    path, i
                )));
            };
            let block_type = item.get("blockType").and_then(Value::as_str).ok_or_else(|| {
                DocumentStoreError::validation(format!("Block '{}.{}' has no blockType", path, i))
            })?;
            let block = field.block(block_type).ok_or_else(|| {
                DocumentStoreError::validation(format!(
                    "Unknown block type '{}' in field '{}'",
                    block_type, path
                ))
            })?;
            let table = self.table(&naming::block_table_name(self.root_table, &block.slug))?;

            let (id, supplied) = row_id(item);
            let mut seed = Row::new();
            seed.insert(naming::ID.to_string(), Value::String(id));
            seed.insert(naming::ORDER.to_string(), Value::from(i));
            seed.insert(naming::PATH.to_string(), Value::String(path.clone()));
            if let Some(locale) = table.locale_column().and(self.locale) {
                seed.insert(naming::LOCALE.to_string(), Value::from(locale));
            }

            let child_scope = FieldScope::for_row(self.registry, table, format!("{}.{}.", path, i));
            self.nested_row(&child_scope, &block.fields, item, seed, ParentRef::Root, supplied)?;
        }
        Ok(())
    }

    /// Queue an array or block row, then its descendants, then its locale row
    fn nested_row(
        &mut self,
        scope: &FieldScope<'a>,
        fields: &[FieldDefinition],
        item: &Map<String, Value>,
        seed: Row,
        parent: ParentRef,
        supplied_id: bool,
    ) -> Result<()> {
        let owner = match seed.get(naming::ID) {
            Some(Value::String(id)) => ParentRef::Row(id.clone()),
            _ => return Err(mismatch(&scope.table.name, "row has no id")),
        };
        let path = scope.path_prefix.trim_end_matches('.').to_string();
        let slot = self.rows.len();
        self.rows.push(PendingRow {
            table: scope.table.name.clone(),
            parent,
            values: Row::new(),
            path: path.clone(),
            supplied_id,
        });

        let mut values = RowValues {
            values: seed,
            locale_values: Row::new(),
        };
        self.walk(scope, fields, item, &mut values, &owner, false)?;
        self.rows[slot].values = values.values;

        if !values.locale_values.is_empty() {
            if let (Some(locales), Some(locale)) = (scope.locales, self.locale) {
                let mut locale_row = values.locale_values;
                locale_row.insert(naming::LOCALE.to_string(), Value::from(locale));
                self.rows.push(PendingRow {
                    table: locales.name.clone(),
                    parent: owner,
                    values: locale_row,
                    path,
                    supplied_id: false,
                });
            }
        }
        Ok(())
    }

    fn push_path_scope(
        &mut self,
        table: &str,
        path_column: &'static str,
        path: &str,
        locale: Option<&str>,
    ) {
        let locale = locale.map(String::from);
        for scope in &mut self.scopes {
            if let DeleteScope::Paths {
                table: t,
                path_column: c,
                paths,
                locale: l,
            } = scope
            {
                if t == table && *c == path_column && *l == locale {
                    if !paths.iter().any(|p| p == path) {
                        paths.push(path.to_string());
                    }
                    return;
                }
            }
        }
        self.scopes.push(DeleteScope::Paths {
            table: table.to_string(),
            path_column,
            paths: vec![path.to_string()],
            locale,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::fields::{Block, CollectionConfig, FieldDefinition as F};
    use crate::schema::build_schema;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        let config = StoreConfig::builder("memory://").locales(["en", "es"]).build();
        build_schema(
            &config,
            &[CollectionConfig::new(
                "pages",
                vec![
                    F::text("title"),
                    F::text("summary").localized(),
                    F::number("scores").has_many(),
                    F::array(
                        "items",
                        vec![F::text("text"), F::text("note").localized()],
                    ),
                    F::blocks("layout", vec![Block::new("hero", vec![F::text("heading")])]),
                ],
            )],
        )
        .unwrap()
    }

    fn decompose_doc(registry: &SchemaRegistry, doc: Value) -> Result<Decomposition> {
        let root = registry.table("pages").unwrap();
        let fields = &registry.collection("pages").unwrap().fields;
        decompose(registry, root, fields, doc.as_object().unwrap(), Some("en"))
    }

    #[test]
    fn test_decompose_root_and_locale_values() {
        let registry = registry();
        let plan = decompose_doc(&registry, json!({"title": "Hello", "summary": "Hi"})).unwrap();

        assert_eq!(plan.root["title"], json!("Hello"));
        assert!(!plan.root.contains_key("summary"));
        assert_eq!(plan.root_locale["summary"], json!("Hi"));
        assert!(plan.rows.is_empty());
        assert!(plan.scopes.is_empty());
    }

    #[test]
    fn test_decompose_array_rows_parent_first() {
        let registry = registry();
        let plan = decompose_doc(
            &registry,
            json!({"items": [{"id": "a", "text": "one", "note": "n"}, {"text": "two"}]}),
        )
        .unwrap();

        let tables: Vec<&str> = plan.rows.iter().map(|r| r.table.as_str()).collect();
        assert_eq!(tables, vec!["pages_items", "pages_items_locales", "pages_items"]);

        let first = &plan.rows[0];
        assert_eq!(first.parent, ParentRef::Root);
        assert_eq!(first.values["id"], json!("a"));
        assert_eq!(first.values["_order"], json!(0));
        assert_eq!(first.values["text"], json!("one"));
        assert_eq!(first.path, "items.0");
        assert!(first.supplied_id);

        let locale_row = &plan.rows[1];
        assert_eq!(locale_row.parent, ParentRef::Row("a".to_string()));
        assert_eq!(locale_row.values["_locale"], json!("en"));
        assert_eq!(locale_row.values["note"], json!("n"));

        assert_eq!(plan.rows[2].values["_order"], json!(1));
        assert!(!plan.rows[2].supplied_id);
        assert!(plan.rows[2].values["id"].as_str().is_some_and(|id| !id.is_empty()));

        assert_eq!(
            plan.scopes,
            vec![
                DeleteScope::Children {
                    table: "pages_items".to_string(),
                    locale: None
                },
                DeleteScope::Subtree {
                    prefix: "items.".to_string(),
                    locale: None
                },
            ]
        );
    }

    #[test]
    fn test_decompose_blocks_and_numbers() {
        let registry = registry();
        let plan = decompose_doc(
            &registry,
            json!({
                "scores": [3, "4.5"],
                "layout": [{"blockType": "hero", "heading": "Welcome"}]
            }),
        )
        .unwrap();

        let numbers: Vec<&PendingRow> = plan
            .rows
            .iter()
            .filter(|r| r.table == "pages_numbers")
            .collect();
        assert_eq!(numbers.len(), 2);
        assert_eq!(numbers[1].values["number"], json!(4.5));
        assert_eq!(numbers[1].values["path"], json!("scores"));

        let hero = plan.rows.iter().find(|r| r.table == "pages_blocks_hero").unwrap();
        assert_eq!(hero.parent, ParentRef::Root);
        assert_eq!(hero.values["_path"], json!("layout"));
        assert_eq!(hero.values["heading"], json!("Welcome"));

        assert!(plan.scopes.contains(&DeleteScope::Paths {
            table: "pages_numbers".to_string(),
            path_column: "path",
            paths: vec!["scores".to_string()],
            locale: None,
        }));
        assert!(plan.scopes.contains(&DeleteScope::Paths {
            table: "pages_blocks_hero".to_string(),
            path_column: "_path",
            paths: vec!["layout".to_string()],
            locale: None,
        }));
    }

    #[test]
    fn test_decompose_rejects_bad_values() {
        let registry = registry();

        let err = decompose_doc(&registry, json!({"title": 5})).unwrap_err();
        assert!(matches!(err, DocumentStoreError::Validation(_)));

        let err = decompose_doc(&registry, json!({"items": "nope"})).unwrap_err();
        assert!(matches!(err, DocumentStoreError::Validation(_)));

        let err = decompose_doc(&registry, json!({"layout": [{"blockType": "banner"}]})).unwrap_err();
        assert!(err.to_string().contains("Unknown block type"));
    }

    #[test]
    fn test_decompose_null_collection_clears() {
        let registry = registry();
        let plan = decompose_doc(&registry, json!({"items": null})).unwrap();
        assert!(plan.rows.is_empty());
        assert_eq!(plan.scopes.len(), 2);
    }
}
