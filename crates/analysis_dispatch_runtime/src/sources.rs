//! Loaders for the identifier list, the asset query and parameter sets.

use std::fs;
use std::path::{Path, PathBuf};

use analysis_dispatch_core::ParameterSet;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

pub const ASSET_ID_COLUMN: &str = "asset_id";

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("identifier source {0} contains no usable rows")]
    Empty(String),

    #[error("no csv file found at {0}")]
    MissingCsv(String),

    #[error("{path} has no '{column}' column")]
    MissingColumn { path: String, column: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("invalid JSON in {origin}: {source}")]
    Json {
        origin: String,
        source: serde_json::Error,
    },
}

/// Reads the `asset_id` column of a CSV listing.
///
/// `path` may be the file itself or a directory, in which case the first
/// `*.csv` in name order is used. Blank cells are skipped; a listing with no
/// usable ids is an error.
pub fn read_asset_id_csv(path: &Path) -> Result<Vec<String>, SourceError> {
    let csv_path = locate_csv(path)?;
    let csv_display = csv_path.display().to_string();
    let mut reader = csv::Reader::from_path(&csv_path).map_err(|source| SourceError::Csv {
        path: csv_display.clone(),
        source,
    })?;

    let headers = reader.headers().map_err(|source| SourceError::Csv {
        path: csv_display.clone(),
        source,
    })?;
    let Some(column) = headers
        .iter()
        .position(|header| header.trim() == ASSET_ID_COLUMN)
    else {
        return Err(SourceError::MissingColumn {
            path: csv_display,
            column: ASSET_ID_COLUMN.to_string(),
        });
    };

    let mut ids = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|source| SourceError::Csv {
            path: csv_display.clone(),
            source,
        })?;
        if let Some(id) = row.get(column).map(str::trim).filter(|id| !id.is_empty()) {
            ids.push(id.to_string());
        }
    }

    if ids.is_empty() {
        return Err(SourceError::Empty(csv_display));
    }
    info!(path = %csv_path.display(), assets = ids.len(), "Read asset ids from csv");
    Ok(ids)
}

fn locate_csv(path: &Path) -> Result<PathBuf, SourceError> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if !path.is_dir() {
        return Err(SourceError::MissingCsv(path.display().to_string()));
    }

    let entries = fs::read_dir(path).map_err(|source| SourceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|candidate| {
            candidate.is_file()
                && candidate
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::MissingCsv(path.display().to_string()))
}

/// Parses a query given inline or as a path to a JSON file.
pub fn load_query(raw: &str) -> Result<Value, SourceError> {
    let candidate = Path::new(raw.trim());
    if candidate.is_file() {
        info!(path = %candidate.display(), "Query input as json file");
        let text = fs::read_to_string(candidate).map_err(|source| SourceError::Io {
            path: candidate.display().to_string(),
            source,
        })?;
        return serde_json::from_str(&text).map_err(|source| SourceError::Json {
            origin: candidate.display().to_string(),
            source,
        });
    }

    serde_json::from_str(raw).map_err(|source| SourceError::Json {
        origin: "query argument".to_string(),
        source,
    })
}

#[derive(Debug, Deserialize)]
struct ParametersFile {
    #[serde(default)]
    distributed_parameters: Option<Vec<ParameterSet>>,
}

/// Loads `distributed_parameters` from a parameters file.
///
/// A missing file, a missing key and an empty list all mean "no sweep".
pub fn load_parameter_sets(path: &Path) -> Result<Option<Vec<ParameterSet>>, SourceError> {
    if !path.exists() {
        return Ok(None);
    }

    let text = fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let file: ParametersFile = serde_json::from_str(&text).map_err(|source| SourceError::Json {
        origin: path.display().to_string(),
        source,
    })?;

    let sets = file.distributed_parameters.filter(|sets| !sets.is_empty());
    if let Some(sets) = &sets {
        info!(
            parameter_sets = sets.len(),
            "Found analysis parameters file, computing product over parameters"
        );
    }
    Ok(sets)
}
