//! Field model for document collections
//!
//! A collection is described by a tree of [`FieldDefinition`]s. The tree is plain
//! configuration: it is deserialized (or built with the helper constructors) once
//! and handed to the schema synthesizer.

use serde::{Deserialize, Serialize};

/// Attributes shared by every data-bearing field
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldAttributes {
    /// Field name as it appears in documents
    pub name: String,
    /// Store one value per locale
    #[serde(default)]
    pub localized: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub index: bool,
    /// Visibility condition. A conditional field may be absent even when required,
    /// so its column is never `NOT NULL`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<serde_json::Value>,
}

impl FieldAttributes {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Text-like, date, JSON, checkbox and point fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalarField {
    #[serde(flatten)]
    pub attributes: FieldAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumberField {
    #[serde(flatten)]
    pub attributes: FieldAttributes,
    #[serde(default, rename = "hasMany")]
    pub has_many: bool,
}

/// Option of a select or radio field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SelectOption {
    Value(String),
    Labeled { label: String, value: String },
}

impl SelectOption {
    pub fn value(&self) -> &str {
        match self {
            SelectOption::Value(v) => v,
            SelectOption::Labeled { value, .. } => value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectField {
    #[serde(flatten)]
    pub attributes: FieldAttributes,
    #[serde(default)]
    pub options: Vec<SelectOption>,
    #[serde(default, rename = "hasMany")]
    pub has_many: bool,
}

impl SelectField {
    /// Allowed values in declaration order
    pub fn values(&self) -> Vec<String> {
        self.options.iter().map(|o| o.value().to_string()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArrayField {
    #[serde(flatten)]
    pub attributes: FieldAttributes,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// A named sub-schema usable inside a blocks field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub slug: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl Block {
    pub fn new(slug: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            slug: slug.into(),
            fields,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlocksField {
    #[serde(flatten)]
    pub attributes: FieldAttributes,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl BlocksField {
    pub fn block(&self, slug: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.slug == slug)
    }
}

/// Group of fields; an unnamed group is layout only
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroupField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub localized: bool,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Tab {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub localized: bool,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TabsField {
    #[serde(default)]
    pub tabs: Vec<Tab>,
}

/// Row and collapsible: presentation only
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LayoutField {
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RelationTo {
    One(String),
    Many(Vec<String>),
}

impl RelationTo {
    pub fn targets(&self) -> Vec<&str> {
        match self {
            RelationTo::One(target) => vec![target.as_str()],
            RelationTo::Many(targets) => targets.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipField {
    #[serde(flatten)]
    pub attributes: FieldAttributes,
    #[serde(rename = "relationTo")]
    pub relation_to: RelationTo,
    #[serde(default, rename = "hasMany")]
    pub has_many: bool,
}

/// A node of the field configuration tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldDefinition {
    Text(ScalarField),
    Email(ScalarField),
    Code(ScalarField),
    Textarea(ScalarField),
    Number(NumberField),
    RichText(ScalarField),
    Json(ScalarField),
    Date(ScalarField),
    Point(ScalarField),
    Select(SelectField),
    Radio(SelectField),
    Checkbox(ScalarField),
    Array(ArrayField),
    Blocks(BlocksField),
    Group(GroupField),
    Tabs(TabsField),
    Row(LayoutField),
    Collapsible(LayoutField),
    Relationship(RelationshipField),
    Upload(RelationshipField),
    /// Any type tag this crate does not know; ignored everywhere
    #[serde(other)]
    Unknown,
}

impl FieldDefinition {
    // =========================================================================
    // Constructors
    // =========================================================================

    fn scalar(name: impl Into<String>) -> ScalarField {
        ScalarField {
            attributes: FieldAttributes::new(name),
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::Text(Self::scalar(name))
    }

    pub fn email(name: impl Into<String>) -> Self {
        Self::Email(Self::scalar(name))
    }

    pub fn code(name: impl Into<String>) -> Self {
        Self::Code(Self::scalar(name))
    }

    pub fn textarea(name: impl Into<String>) -> Self {
        Self::Textarea(Self::scalar(name))
    }

    pub fn rich_text(name: impl Into<String>) -> Self {
        Self::RichText(Self::scalar(name))
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::Json(Self::scalar(name))
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::Date(Self::scalar(name))
    }

    pub fn point(name: impl Into<String>) -> Self {
        Self::Point(Self::scalar(name))
    }

    pub fn checkbox(name: impl Into<String>) -> Self {
        Self::Checkbox(Self::scalar(name))
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::Number(NumberField {
            attributes: FieldAttributes::new(name),
            has_many: false,
        })
    }

    pub fn select<I, S>(name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Select(SelectField {
            attributes: FieldAttributes::new(name),
            options: options
                .into_iter()
                .map(|o| SelectOption::Value(o.into()))
                .collect(),
            has_many: false,
        })
    }

    pub fn radio<I, S>(name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match Self::select(name, options) {
            Self::Select(select) => Self::Radio(select),
            other => other,
        }
    }

    pub fn array(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self::Array(ArrayField {
            attributes: FieldAttributes::new(name),
            fields,
        })
    }

    pub fn blocks(name: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self::Blocks(BlocksField {
            attributes: FieldAttributes::new(name),
            blocks,
        })
    }

    pub fn group(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self::Group(GroupField {
            name: Some(name.into()),
            localized: false,
            fields,
        })
    }

    pub fn unnamed_group(fields: Vec<FieldDefinition>) -> Self {
        Self::Group(GroupField {
            name: None,
            localized: false,
            fields,
        })
    }

    pub fn tabs(tabs: Vec<Tab>) -> Self {
        Self::Tabs(TabsField { tabs })
    }

    pub fn row(fields: Vec<FieldDefinition>) -> Self {
        Self::Row(LayoutField { fields })
    }

    pub fn collapsible(fields: Vec<FieldDefinition>) -> Self {
        Self::Collapsible(LayoutField { fields })
    }

    pub fn relationship(name: impl Into<String>, relation_to: RelationTo) -> Self {
        Self::Relationship(RelationshipField {
            attributes: FieldAttributes::new(name),
            relation_to,
            has_many: false,
        })
    }

    pub fn upload(name: impl Into<String>, relation_to: impl Into<String>) -> Self {
        Self::Upload(RelationshipField {
            attributes: FieldAttributes::new(name),
            relation_to: RelationTo::One(relation_to.into()),
            has_many: false,
        })
    }

    // =========================================================================
    // Modifiers
    // =========================================================================

    pub fn localized(mut self) -> Self {
        match &mut self {
            Self::Group(group) => group.localized = true,
            other => {
                if let Some(attributes) = other.attributes_mut() {
                    attributes.localized = true;
                }
            }
        }
        self
    }

    pub fn required(mut self) -> Self {
        if let Some(attributes) = self.attributes_mut() {
            attributes.required = true;
        }
        self
    }

    pub fn unique(mut self) -> Self {
        if let Some(attributes) = self.attributes_mut() {
            attributes.unique = true;
        }
        self
    }

    pub fn index(mut self) -> Self {
        if let Some(attributes) = self.attributes_mut() {
            attributes.index = true;
        }
        self
    }

    pub fn with_condition(mut self, condition: serde_json::Value) -> Self {
        if let Some(attributes) = self.attributes_mut() {
            attributes.condition = Some(condition);
        }
        self
    }

    /// Only meaningful for number, select and relationship fields
    pub fn has_many(mut self) -> Self {
        match &mut self {
            Self::Number(f) => f.has_many = true,
            Self::Select(f) | Self::Radio(f) => f.has_many = true,
            Self::Relationship(f) | Self::Upload(f) => f.has_many = true,
            _ => {}
        }
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn attributes(&self) -> Option<&FieldAttributes> {
        match self {
            Self::Text(f)
            | Self::Email(f)
            | Self::Code(f)
            | Self::Textarea(f)
            | Self::RichText(f)
            | Self::Json(f)
            | Self::Date(f)
            | Self::Point(f)
            | Self::Checkbox(f) => Some(&f.attributes),
            Self::Number(f) => Some(&f.attributes),
            Self::Select(f) | Self::Radio(f) => Some(&f.attributes),
            Self::Array(f) => Some(&f.attributes),
            Self::Blocks(f) => Some(&f.attributes),
            Self::Relationship(f) | Self::Upload(f) => Some(&f.attributes),
            Self::Group(_)
            | Self::Tabs(_)
            | Self::Row(_)
            | Self::Collapsible(_)
            | Self::Unknown => None,
        }
    }

    pub fn attributes_mut(&mut self) -> Option<&mut FieldAttributes> {
        match self {
            Self::Text(f)
            | Self::Email(f)
            | Self::Code(f)
            | Self::Textarea(f)
            | Self::RichText(f)
            | Self::Json(f)
            | Self::Date(f)
            | Self::Point(f)
            | Self::Checkbox(f) => Some(&mut f.attributes),
            Self::Number(f) => Some(&mut f.attributes),
            Self::Select(f) | Self::Radio(f) => Some(&mut f.attributes),
            Self::Array(f) => Some(&mut f.attributes),
            Self::Blocks(f) => Some(&mut f.attributes),
            Self::Relationship(f) | Self::Upload(f) => Some(&mut f.attributes),
            Self::Group(_)
            | Self::Tabs(_)
            | Self::Row(_)
            | Self::Collapsible(_)
            | Self::Unknown => None,
        }
    }

    /// Name under which the field's value appears in a document
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Group(group) => group.name.as_deref(),
            other => other.attributes().map(|a| a.name.as_str()),
        }
    }

    /// Type tag as written in configuration
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Email(_) => "email",
            Self::Code(_) => "code",
            Self::Textarea(_) => "textarea",
            Self::Number(_) => "number",
            Self::RichText(_) => "richText",
            Self::Json(_) => "json",
            Self::Date(_) => "date",
            Self::Point(_) => "point",
            Self::Select(_) => "select",
            Self::Radio(_) => "radio",
            Self::Checkbox(_) => "checkbox",
            Self::Array(_) => "array",
            Self::Blocks(_) => "blocks",
            Self::Group(_) => "group",
            Self::Tabs(_) => "tabs",
            Self::Row(_) => "row",
            Self::Collapsible(_) => "collapsible",
            Self::Relationship(_) => "relationship",
            Self::Upload(_) => "upload",
            Self::Unknown => "unknown",
        }
    }
}

impl Tab {
    pub fn named(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            name: Some(name.into()),
            localized: false,
            fields,
        }
    }

    pub fn unnamed(fields: Vec<FieldDefinition>) -> Self {
        Self {
            name: None,
            localized: false,
            fields,
        }
    }

    pub fn localized(mut self) -> Self {
        self.localized = true;
        self
    }
}

/// One document collection: a root table plus everything nested in it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionConfig {
    pub slug: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl CollectionConfig {
    pub fn new(slug: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            slug: slug.into(),
            fields,
        }
    }
}
