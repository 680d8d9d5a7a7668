//! Checklist templates and the value maps collected against them.
//!
//! A template is a named, ordered list of sections, each holding an ordered
//! list of typed fields. Tasks never point at a template in the catalog;
//! they carry a [`TemplateSnapshot`] captured by value when the task is
//! created.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Values collected for a template, keyed by field id.
pub type ValueMap = BTreeMap<String, FieldValue>;

/// A named set of sections used to collect structured stage data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistTemplate {
    /// Template name (unique within the catalog)
    pub name: String,

    /// Ordered sections
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl ChecklistTemplate {
    /// Iterate over every field across all sections, in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    /// Look up a field by id
    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields().find(|f| f.id == id)
    }
}

/// An ordered group of fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,

    #[serde(default)]
    pub fields: Vec<Field>,
}

/// One typed input slot in a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Stable identifier, used as the key in value maps
    pub id: String,

    /// Human-readable label
    pub label: String,

    /// Type tag
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Allowed options (choice fields only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// Informational only; never blocks a stage transition
    #[serde(default)]
    pub required: bool,
}

impl Field {
    pub fn new(id: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            field_type,
            choices: Vec::new(),
            placeholder: None,
            required: false,
        }
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Field type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Boolean,
    Choice,
    ShortText,
    LongText,
    Date,
    Photo,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Boolean => "boolean",
            FieldType::Choice => "choice",
            FieldType::ShortText => "shortText",
            FieldType::LongText => "longText",
            FieldType::Date => "date",
            FieldType::Photo => "photo",
        };
        f.write_str(name)
    }
}

/// A single collected value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Bool(_) => None,
        }
    }

    /// True for `false` and for blank text
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Bool(b) => !b,
            FieldValue::Text(s) => s.trim().is_empty(),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// Which side of the execution a template collects data for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Intake,
    Outtake,
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateKind::Intake => write!(f, "intake"),
            TemplateKind::Outtake => write!(f, "outtake"),
        }
    }
}

/// A template copied by value onto a task, together with the defaults
/// seeded for it at capture time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSnapshot {
    pub template: ChecklistTemplate,
    pub defaults: ValueMap,
    pub captured_at: DateTime<Utc>,
}

impl TemplateSnapshot {
    pub fn name(&self) -> &str {
        &self.template.name
    }
}
