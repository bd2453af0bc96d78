//! File-backed stand-in for the asset metadata index.
//!
//! Records are loaded from a JSON array or JSON lines. Queries support the
//! subset of document-database filters the dispatcher needs: equality on
//! dotted paths, `$eq`, `$ne`, `$in` and `$exists`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use analysis_dispatch_core::AssetIds;
use serde_json::{Map, Value};

/// Path of the primary asset id inside a record.
pub const ASSET_ID_PATH: &str = "external_links.Code Ocean.0";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid catalog record at line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },

    #[error("catalog record {index} is invalid: {message}")]
    InvalidRecord { index: usize, message: String },

    #[error("query must be a JSON object, got {0}")]
    InvalidQuery(String),

    #[error("unsupported query operator '{0}'")]
    UnsupportedOperator(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetRecord {
    pub id: String,
    pub name: String,
    pub location: String,
    pub document: Value,
}

impl AssetRecord {
    pub fn from_document(index: usize, document: Value) -> Result<Self, CatalogError> {
        if !document.is_object() {
            return Err(CatalogError::InvalidRecord {
                index,
                message: "record must be a JSON object".to_string(),
            });
        }

        let location = lookup(&document, "location")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| CatalogError::InvalidRecord {
                index,
                message: "record has no location".to_string(),
            })?
            .to_string();

        let id = lookup(&document, "_id")
            .map(scalar_text)
            .unwrap_or_default();
        let name = lookup(&document, "name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            id,
            name,
            location,
            document,
        })
    }

    /// Linked asset id, falling back to the record id.
    pub fn asset_id(&self) -> &str {
        lookup(&self.document, ASSET_ID_PATH)
            .and_then(Value::as_str)
            .unwrap_or(&self.id)
    }

    fn linked_ids(&self) -> impl Iterator<Item = &str> {
        lookup(&self.document, "external_links.Code Ocean")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }

    /// True when `member` names this record by id, linked asset id or location.
    pub fn is_named_by(&self, member: &str) -> bool {
        (!self.id.is_empty() && self.id == member)
            || self.linked_ids().any(|id| id == member)
            || self.location == member
            || strip_scheme(&self.location) == strip_scheme(member)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetCatalog {
    records: Vec<AssetRecord>,
}

impl AssetCatalog {
    pub fn new(records: Vec<AssetRecord>) -> Self {
        Self { records }
    }

    pub fn from_documents(documents: Vec<Value>) -> Result<Self, CatalogError> {
        let records = documents
            .into_iter()
            .enumerate()
            .map(|(index, document)| AssetRecord::from_document(index, document))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(records))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        let documents = if text.trim_start().starts_with('[') {
            serde_json::from_str::<Vec<Value>>(text)
                .map_err(|source| CatalogError::Parse { line: 1, source })?
        } else {
            text.lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(index, line)| {
                    serde_json::from_str(line).map_err(|source| CatalogError::Parse {
                        line: index + 1,
                        source,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        Self::from_documents(documents)
    }

    pub fn records(&self) -> &[AssetRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records named by `member`, in catalog order.
    pub fn records_for<'a>(&'a self, member: &'a str) -> impl Iterator<Item = &'a AssetRecord> {
        self.records
            .iter()
            .filter(move |record| record.is_named_by(member))
    }

    pub fn query(&self, filter: &Value) -> Result<Vec<&AssetRecord>, CatalogError> {
        let Some(filter) = filter.as_object() else {
            return Err(CatalogError::InvalidQuery(filter.to_string()));
        };

        let mut matched = Vec::new();
        for record in &self.records {
            if matches_filter(&record.document, filter)? {
                matched.push(record);
            }
        }
        Ok(matched)
    }

    /// Asset ids matching `filter`; grouped by the values at `group_by`
    /// when any grouping field is given, in first-seen order.
    pub fn query_asset_ids(
        &self,
        filter: &Value,
        group_by: &[String],
    ) -> Result<AssetIds, CatalogError> {
        let matched = self.query(filter)?;

        if group_by.is_empty() {
            return Ok(AssetIds::Flat(
                matched
                    .into_iter()
                    .map(|record| record.asset_id().to_string())
                    .collect(),
            ));
        }

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        for record in matched {
            let key_values: Vec<Value> = group_by
                .iter()
                .map(|field| lookup(&record.document, field).cloned().unwrap_or(Value::Null))
                .collect();
            let key = Value::Array(key_values).to_string();
            let members = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                Vec::new()
            });
            members.push(record.asset_id().to_string());
        }

        Ok(AssetIds::Grouped(
            order
                .into_iter()
                .filter_map(|key| groups.remove(&key))
                .collect(),
        ))
    }
}

fn matches_filter(document: &Value, filter: &Map<String, Value>) -> Result<bool, CatalogError> {
    for (path, condition) in filter {
        if !matches_condition(lookup(document, path), condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_condition(field: Option<&Value>, condition: &Value) -> Result<bool, CatalogError> {
    let Some(operators) = operator_object(condition)? else {
        return Ok(field.is_some_and(|value| value_matches(value, condition)));
    };

    for (operator, operand) in operators {
        let satisfied = match operator.as_str() {
            "$eq" => field.is_some_and(|value| value_matches(value, operand)),
            "$ne" => !field.is_some_and(|value| value_matches(value, operand)),
            "$in" => {
                let Some(candidates) = operand.as_array() else {
                    return Err(CatalogError::InvalidQuery(format!(
                        "$in expects an array, got {operand}"
                    )));
                };
                field.is_some_and(|value| {
                    candidates
                        .iter()
                        .any(|candidate| value_matches(value, candidate))
                })
            }
            "$exists" => field.is_some() == operand.as_bool().unwrap_or(true),
            other => return Err(CatalogError::UnsupportedOperator(other.to_string())),
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

/// The condition as an operator object, or `None` for a literal value.
/// Objects mixing `$` operators with plain keys are rejected.
fn operator_object(condition: &Value) -> Result<Option<&Map<String, Value>>, CatalogError> {
    let Some(object) = condition.as_object() else {
        return Ok(None);
    };
    let operators = object.keys().filter(|key| key.starts_with('$')).count();
    if operators == 0 {
        return Ok(None);
    }
    if operators != object.len() {
        return Err(CatalogError::InvalidQuery(format!(
            "condition mixes operators with plain keys: {condition}"
        )));
    }
    Ok(Some(object))
}

/// Equality with array-contains semantics for array fields.
fn value_matches(value: &Value, expected: &Value) -> bool {
    if value == expected {
        return true;
    }
    match value {
        Value::Array(items) => items.iter().any(|item| item == expected),
        _ => false,
    }
}

/// Resolves a dotted path; numeric segments index into arrays.
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index)),
        _ => None,
    })
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn strip_scheme(location: &str) -> &str {
    location
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(location)
        .trim_end_matches('/')
}
