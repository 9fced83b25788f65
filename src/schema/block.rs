//! Shape comparison for reused blocks
//!
//! A block table is shared by every occurrence of its slug under one root, so
//! every occurrence must describe the same columns. Two occurrences are identical
//! when their field trees agree on names, kinds, localization and hasMany. Whether
//! the block rows are locale-scoped is decided per table, not per occurrence.

use crate::fields::{Block, FieldDefinition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockShape {
    fields: Vec<FieldShape>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldShape {
    name: Option<String>,
    kind: &'static str,
    localized: bool,
    has_many: bool,
    /// Select options, in order
    options: Vec<String>,
    children: Vec<FieldShape>,
}

impl BlockShape {
    pub fn of(block: &Block) -> Self {
        Self {
            fields: block.fields.iter().map(FieldShape::of).collect(),
        }
    }
}

impl FieldShape {
    fn of(field: &FieldDefinition) -> Self {
        let mut shape = FieldShape {
            name: field.name().map(String::from),
            kind: field.type_name(),
            localized: field.attributes().is_some_and(|a| a.localized),
            has_many: false,
            options: Vec::new(),
            children: Vec::new(),
        };

        match field {
            FieldDefinition::Number(f) => shape.has_many = f.has_many,
            FieldDefinition::Select(f) | FieldDefinition::Radio(f) => {
                shape.has_many = f.has_many;
                shape.options = f.values();
            }
            FieldDefinition::Array(f) => shape.children = f.fields.iter().map(Self::of).collect(),
            FieldDefinition::Blocks(f) => {
                shape.children = f
                    .blocks
                    .iter()
                    .map(|b| FieldShape {
                        name: Some(b.slug.clone()),
                        kind: "block",
                        localized: false,
                        has_many: false,
                        options: Vec::new(),
                        children: b.fields.iter().map(Self::of).collect(),
                    })
                    .collect();
            }
            FieldDefinition::Group(g) => {
                shape.localized = g.localized;
                shape.children = g.fields.iter().map(Self::of).collect();
            }
            FieldDefinition::Tabs(t) => {
                shape.children = t
                    .tabs
                    .iter()
                    .map(|tab| FieldShape {
                        name: tab.name.clone(),
                        kind: "tab",
                        localized: tab.localized,
                        has_many: false,
                        options: Vec::new(),
                        children: tab.fields.iter().map(Self::of).collect(),
                    })
                    .collect();
            }
            FieldDefinition::Row(l) | FieldDefinition::Collapsible(l) => {
                shape.children = l.fields.iter().map(Self::of).collect();
            }
            FieldDefinition::Relationship(f) | FieldDefinition::Upload(f) => {
                shape.has_many = f.has_many;
            }
            _ => {}
        }

        shape
    }
}
