use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::DispatchError;

/// Asset identifiers as supplied by the caller.
///
/// A flat list dispatches each asset on its own; a grouped list keeps every
/// inner list together as one unit of work. Shapes that are neither are
/// rejected when parsing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Value")]
pub enum AssetIds {
    Flat(Vec<String>),
    Grouped(Vec<Vec<String>>),
}

impl AssetIds {
    pub fn from_json(value: &Value) -> Result<Self, DispatchError> {
        let Some(entries) = value.as_array() else {
            return Err(DispatchError::invalid_shape(
                "asset identifiers must be a JSON array",
            ));
        };

        if entries.is_empty() {
            return Err(DispatchError::invalid_shape(
                "at least one asset identifier is required",
            ));
        }

        if entries.iter().all(Value::is_string) {
            let ids = entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            return Ok(Self::Flat(ids));
        }

        if entries.iter().all(Value::is_array) {
            let mut groups = Vec::with_capacity(entries.len());
            for (index, entry) in entries.iter().enumerate() {
                let members = entry.as_array().map(Vec::as_slice).unwrap_or_default();
                let mut group = Vec::with_capacity(members.len());
                for member in members {
                    let Some(id) = member.as_str() else {
                        return Err(DispatchError::invalid_shape(format!(
                            "group {index} contains a non-string identifier: {member}"
                        )));
                    };
                    group.push(id.to_string());
                }
                groups.push(group);
            }
            return Ok(Self::Grouped(groups));
        }

        Err(DispatchError::invalid_shape(
            "identifiers must be all strings or all lists of strings, not a mix",
        ))
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Flat(ids) => ids.len(),
            Self::Grouped(groups) => groups.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TryFrom<Value> for AssetIds {
    type Error = DispatchError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(&value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedGroups {
    pub groups: Vec<Vec<String>>,
    /// Flat groups yield one task per resolved bucket; grouped ones fold every
    /// bucket of the group into a single task.
    pub is_flat: bool,
}

impl NormalizedGroups {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

pub fn normalize_groups(ids: AssetIds) -> Result<NormalizedGroups, DispatchError> {
    if ids.is_empty() {
        return Err(DispatchError::invalid_shape(
            "at least one asset identifier is required",
        ));
    }

    let (groups, is_flat) = match ids {
        AssetIds::Flat(ids) => {
            info!(assets = ids.len(), "Flat asset id list provided");
            (ids.into_iter().map(|id| vec![id]).collect::<Vec<_>>(), true)
        }
        AssetIds::Grouped(groups) => {
            info!(groups = groups.len(), "Nested asset id list provided");
            (groups, false)
        }
    };

    let mut normalized = Vec::with_capacity(groups.len());
    for (index, group) in groups.into_iter().enumerate() {
        if group.is_empty() {
            return Err(DispatchError::invalid_shape(format!(
                "group {index} is empty"
            )));
        }
        let mut members = Vec::with_capacity(group.len());
        for id in group {
            let id = id.trim();
            if id.is_empty() {
                return Err(DispatchError::invalid_shape(format!(
                    "group {index} contains a blank identifier"
                )));
            }
            members.push(id.to_string());
        }
        normalized.push(members);
    }

    Ok(NormalizedGroups {
        groups: normalized,
        is_flat,
    })
}
