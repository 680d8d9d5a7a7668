//! Schema engine for checklist templates.
//!
//! Produces default value maps, captures template snapshots, and coerces
//! caller-supplied values against a snapshot's field types. Nothing here
//! renders anything.

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tracing::warn;

use crate::domain::{ChecklistTemplate, FieldType, FieldValue, TemplateSnapshot, ValueMap};

/// Errors raised while validating templates or coercing values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("Template name cannot be empty")]
    EmptyTemplateName,

    #[error("Template '{template}' has a field with an empty id")]
    EmptyFieldId { template: String },

    #[error("Template '{template}' declares field '{field}' more than once")]
    DuplicateField { template: String, field: String },

    #[error("Choice field '{field}' in template '{template}' has no options")]
    ChoiceWithoutOptions { template: String, field: String },

    #[error("Field '{field}' expects a {expected} value, got {got:?}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        got: FieldValue,
    },

    #[error("'{value}' is not an option of choice field '{field}'")]
    UnknownChoice { field: String, value: String },

    #[error("Field '{field}' expects a YYYY-MM-DD date, got '{value}'")]
    InvalidDate { field: String, value: String },
}

/// Check a template's structure before it is accepted into a catalog
pub fn validate_template(template: &ChecklistTemplate) -> Result<(), SchemaViolation> {
    if template.name.trim().is_empty() {
        return Err(SchemaViolation::EmptyTemplateName);
    }

    let mut seen = HashSet::new();
    for field in template.fields() {
        if field.id.trim().is_empty() {
            return Err(SchemaViolation::EmptyFieldId {
                template: template.name.clone(),
            });
        }
        if !seen.insert(field.id.as_str()) {
            return Err(SchemaViolation::DuplicateField {
                template: template.name.clone(),
                field: field.id.clone(),
            });
        }
        if field.field_type == FieldType::Choice && field.choices.is_empty() {
            return Err(SchemaViolation::ChoiceWithoutOptions {
                template: template.name.clone(),
                field: field.id.clone(),
            });
        }
    }

    Ok(())
}

/// Seed a value for every field: booleans false, choices their first
/// option, everything else an empty string
pub fn snapshot_defaults(template: &ChecklistTemplate) -> ValueMap {
    template
        .fields()
        .map(|field| {
            let value = match field.field_type {
                FieldType::Boolean => FieldValue::Bool(false),
                FieldType::Choice => {
                    FieldValue::Text(field.choices.first().cloned().unwrap_or_default())
                }
                FieldType::ShortText | FieldType::LongText | FieldType::Date | FieldType::Photo => {
                    FieldValue::Text(String::new())
                }
            };
            (field.id.clone(), value)
        })
        .collect()
}

/// Copy a template by value and seed its defaults
pub fn snapshot(template: &ChecklistTemplate) -> TemplateSnapshot {
    TemplateSnapshot {
        template: template.clone(),
        defaults: snapshot_defaults(template),
        captured_at: Utc::now(),
    }
}

/// Overlay incoming values on the snapshot defaults, coercing each value to
/// its field type. Unknown field ids are dropped.
pub fn coerce_values(
    snapshot: &TemplateSnapshot,
    incoming: &ValueMap,
) -> Result<ValueMap, SchemaViolation> {
    let mut values = snapshot.defaults.clone();

    for (id, value) in incoming {
        let Some(field) = snapshot.template.field(id) else {
            warn!(template = %snapshot.name(), field = %id, "Dropping value for unknown field");
            continue;
        };

        let coerced = match field.field_type {
            FieldType::Boolean => FieldValue::Bool(coerce_bool(id, value)?),
            FieldType::Choice => {
                let text = stringify(value);
                if !text.is_empty() && !field.choices.iter().any(|c| *c == text) {
                    return Err(SchemaViolation::UnknownChoice {
                        field: id.clone(),
                        value: text,
                    });
                }
                FieldValue::Text(text)
            }
            FieldType::Date => {
                let text = match value {
                    FieldValue::Text(s) => s.trim().to_string(),
                    FieldValue::Bool(_) => {
                        return Err(SchemaViolation::TypeMismatch {
                            field: id.clone(),
                            expected: FieldType::Date,
                            got: value.clone(),
                        })
                    }
                };
                if !text.is_empty() && NaiveDate::parse_from_str(&text, "%Y-%m-%d").is_err() {
                    return Err(SchemaViolation::InvalidDate {
                        field: id.clone(),
                        value: text,
                    });
                }
                FieldValue::Text(text)
            }
            FieldType::ShortText | FieldType::LongText => FieldValue::Text(stringify(value)),
            FieldType::Photo => match value {
                FieldValue::Text(s) => FieldValue::Text(s.trim().to_string()),
                FieldValue::Bool(_) => {
                    return Err(SchemaViolation::TypeMismatch {
                        field: id.clone(),
                        expected: FieldType::Photo,
                        got: value.clone(),
                    })
                }
            },
        };

        values.insert(id.clone(), coerced);
    }

    Ok(values)
}

/// Ids of required fields left empty.
///
/// Advisory only: callers log this, transitions are never blocked on it.
pub fn missing_required(snapshot: &TemplateSnapshot, values: &ValueMap) -> Vec<String> {
    snapshot
        .template
        .fields()
        .filter(|f| f.required)
        .filter(|f| values.get(&f.id).map(FieldValue::is_empty).unwrap_or(true))
        .map(|f| f.id.clone())
        .collect()
}

/// Photo references entered through photo-typed fields
pub fn photo_values(snapshot: &TemplateSnapshot, values: &ValueMap) -> Vec<String> {
    snapshot
        .template
        .fields()
        .filter(|f| f.field_type == FieldType::Photo)
        .filter_map(|f| values.get(&f.id).and_then(FieldValue::as_text))
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

fn coerce_bool(field: &str, value: &FieldValue) -> Result<bool, SchemaViolation> {
    match value {
        FieldValue::Bool(b) => Ok(*b),
        FieldValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "sim" => Ok(true),
            "false" | "no" | "0" | "nao" | "" => Ok(false),
            _ => Err(SchemaViolation::TypeMismatch {
                field: field.to_string(),
                expected: FieldType::Boolean,
                got: value.clone(),
            }),
        },
    }
}

fn stringify(value: &FieldValue) -> String {
    match value {
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Text(s) => s.clone(),
    }
}
