//! Query path resolution
//!
//! A filter translator sees logical field paths such as `items.text` or
//! `layout.hero.heading`. [`resolve_field_path`] maps such a path onto the table
//! and column that hold the value and the joins needed to reach them, using only
//! the naming rules and the relation descriptors of the registry.
//!
//! Block paths name the slug after the blocks field: `<field>.<slug>.<subfield>`.

use serde_json::Value;

use crate::error::{DocumentStoreError, Result};
use crate::fields::{FieldDefinition, Tab};
use crate::naming;
use crate::schema::{RelationDescriptor, SchemaRegistry};
use crate::types::{ColumnType, TableDefinition};
use crate::upsert::FieldScope;

/// Contract of a filter-to-SQL translator built on top of the registry
pub trait QueryTranslator {
    type Plan;

    /// Translate a filter over logical field paths of `collection` into a plan
    fn translate(
        &self,
        registry: &SchemaRegistry,
        collection: &str,
        filter: &Value,
        locale: Option<&str>,
    ) -> Result<Self::Plan>;
}

/// One hop from a parent table to a child table
#[derive(Debug, Clone, PartialEq)]
pub struct JoinStep {
    pub relation: RelationDescriptor,
    /// Required value of the child's path column; `*` matches any row index
    pub path: Option<String>,
    /// Required value of the child's locale column
    pub locale: Option<String>,
}

/// Storage location of a logical field path
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub table: String,
    pub column: String,
    pub column_type: ColumnType,
    /// Joins from the root table, outermost first
    pub joins: Vec<JoinStep>,
}

enum Node<'f> {
    Field(&'f FieldDefinition),
    Tab(&'f Tab),
}

/// Find a named field, looking through unnamed groups, tabs, rows and collapsibles
fn find_field<'f>(fields: &'f [FieldDefinition], name: &str) -> Option<Node<'f>> {
    for field in fields {
        match field {
            FieldDefinition::Group(g) if g.name.is_none() => {
                if let Some(found) = find_field(&g.fields, name) {
                    return Some(found);
                }
            }
            FieldDefinition::Row(l) | FieldDefinition::Collapsible(l) => {
                if let Some(found) = find_field(&l.fields, name) {
                    return Some(found);
                }
            }
            FieldDefinition::Tabs(t) => {
                for tab in &t.tabs {
                    match &tab.name {
                        Some(tab_name) if tab_name == name => return Some(Node::Tab(tab)),
                        Some(_) => {}
                        None => {
                            if let Some(found) = find_field(&tab.fields, name) {
                                return Some(found);
                            }
                        }
                    }
                }
            }
            other if other.name() == Some(name) => return Some(Node::Field(other)),
            _ => {}
        }
    }
    None
}

struct Resolver<'r> {
    registry: &'r SchemaRegistry,
    root_table: &'r str,
    locale: Option<String>,
    path: &'r str,
    joins: Vec<JoinStep>,
}

impl<'r> Resolver<'r> {
    fn unknown(&self, detail: &str) -> DocumentStoreError {
        DocumentStoreError::validation(format!("Cannot resolve field path '{}': {}", self.path, detail))
    }

    fn join(
        &mut self,
        parent: &str,
        key: &str,
        path: Option<String>,
        localized: bool,
    ) -> Result<&'r TableDefinition> {
        let registry = self.registry;
        let relation = registry
            .relation(parent, key)
            .ok_or_else(|| self.unknown(&format!("no relation '{}' on '{}'", key, parent)))?
            .clone();
        let child = registry.table(&relation.child_table)?;
        let locale = if localized && relation.locale_column.is_some() {
            self.locale.clone()
        } else {
            None
        };
        self.joins.push(JoinStep {
            relation,
            path,
            locale,
        });
        Ok(child)
    }

    fn column(
        &self,
        table: &TableDefinition,
        column: &str,
    ) -> Result<(String, String, ColumnType)> {
        let definition = table
            .column(column)
            .ok_or_else(|| self.unknown(&format!("no column '{}' on '{}'", column, table.name)))?;
        Ok((
            table.name.clone(),
            definition.name.clone(),
            definition.column_type.clone(),
        ))
    }

    fn resolve(
        &mut self,
        scope: FieldScope<'r>,
        fields: &'r [FieldDefinition],
        segments: &[&str],
    ) -> Result<(String, String, ColumnType)> {
        let Some((&name, rest)) = segments.split_first() else {
            return Err(self.unknown("path ends at a container field"));
        };
        let node = find_field(fields, name).ok_or_else(|| self.unknown(&format!("no field '{}'", name)))?;

        let field = match node {
            Node::Tab(tab) => {
                let nested = scope.nested_group(name, tab.localized);
                return self.resolve(nested, &tab.fields, rest);
            }
            Node::Field(field) => field,
        };

        let leaf = |resolver: &mut Self, localized: bool| -> Result<(String, String, ColumnType)> {
            if !rest.is_empty() {
                return Err(resolver.unknown(&format!("'{}' has no subfields", name)));
            }
            let column = naming::column_name(&scope.column_prefix, name);
            if scope.is_localized(localized, resolver.locale.as_deref()) {
                let locales = resolver.join(&scope.table.name, naming::LOCALES_RELATION, None, true)?;
                resolver.column(locales, &column)
            } else {
                resolver.column(scope.table, &column)
            }
        };

        match field {
            FieldDefinition::Text(f)
            | FieldDefinition::Email(f)
            | FieldDefinition::Code(f)
            | FieldDefinition::Textarea(f)
            | FieldDefinition::RichText(f)
            | FieldDefinition::Json(f)
            | FieldDefinition::Date(f)
            | FieldDefinition::Checkbox(f) => leaf(self, f.attributes.localized),
            FieldDefinition::Number(f) if f.has_many => {
                if !rest.is_empty() {
                    return Err(self.unknown(&format!("'{}' has no subfields", name)));
                }
                let localized = scope.is_localized(f.attributes.localized, self.locale.as_deref());
                let numbers = self.join(
                    &scope.table.name,
                    naming::NUMBERS_RELATION,
                    Some(scope.path(name)),
                    localized,
                )?;
                self.column(numbers, naming::NUMBER_VALUE)
            }
            FieldDefinition::Number(f) => leaf(self, f.attributes.localized),
            FieldDefinition::Select(f) | FieldDefinition::Radio(f) if f.has_many => {
                if !rest.is_empty() {
                    return Err(self.unknown(&format!("'{}' has no subfields", name)));
                }
                let key = format!("{}{}", scope.field_prefix, name);
                let values = self.join(&scope.table.name, &key, None, true)?;
                self.column(values, naming::SELECT_VALUE)
            }
            FieldDefinition::Select(f) | FieldDefinition::Radio(f) => {
                leaf(self, f.attributes.localized)
            }
            FieldDefinition::Array(f) => {
                let key = format!("{}{}", scope.field_prefix, name);
                let table = self.join(&scope.table.name, &key, None, true)?;
                let nested = FieldScope::for_row(self.registry, table, format!("{}.*.", scope.path(name)));
                self.resolve(nested, &f.fields, rest)
            }
            FieldDefinition::Blocks(f) => {
                let Some((&slug, rest)) = rest.split_first() else {
                    return Err(self.unknown(&format!("blocks field '{}' needs a block slug", name)));
                };
                let block = f
                    .block(slug)
                    .ok_or_else(|| self.unknown(&format!("no block '{}' in '{}'", slug, name)))?;
                let table = self.join(
                    self.root_table,
                    &naming::block_relation_key(&block.slug),
                    Some(scope.path(name)),
                    true,
                )?;
                let nested = FieldScope::for_row(self.registry, table, format!("{}.*.", scope.path(name)));
                self.resolve(nested, &block.fields, rest)
            }
            FieldDefinition::Group(g) => {
                let nested = scope.nested_group(name, g.localized);
                self.resolve(nested, &g.fields, rest)
            }
            FieldDefinition::Relationship(_)
            | FieldDefinition::Upload(_)
            | FieldDefinition::Point(_)
            | FieldDefinition::Tabs(_)
            | FieldDefinition::Row(_)
            | FieldDefinition::Collapsible(_)
            | FieldDefinition::Unknown => Err(self.unknown(&format!("'{}' is not stored in a column", name))),
        }
    }
}

/// Resolve a dotted field path of the collection rooted at `table`
pub fn resolve_field_path(
    registry: &SchemaRegistry,
    table: &str,
    path: &str,
    locale: Option<&str>,
) -> Result<ResolvedField> {
    let root = registry.table(table)?;
    let collection = registry.collection_for_table(table)?;
    let locale = registry.resolve_locale(locale)?;
    let segments: Vec<&str> = path.split('.').collect();

    let mut resolver = Resolver {
        registry,
        root_table: &root.name,
        locale,
        path,
        joins: Vec::new(),
    };

    if segments == [naming::ID] {
        let (table, column, column_type) = resolver.column(root, naming::ID)?;
        return Ok(ResolvedField {
            table,
            column,
            column_type,
            joins: Vec::new(),
        });
    }

    let scope = FieldScope::for_row(registry, root, String::new());
    let (table, column, column_type) = resolver.resolve(scope, &collection.fields, &segments)?;

    Ok(ResolvedField {
        table,
        column,
        column_type,
        joins: resolver.joins,
    })
}
