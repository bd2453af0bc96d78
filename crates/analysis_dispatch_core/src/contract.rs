use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::DispatchError;
use crate::sharding::BatchSizing;

pub const DESCRIPTOR_SCHEMA_VERSION: &str = "v1";
pub const DEFAULT_TASKS_PER_JOB: usize = 1;
pub const DEFAULT_MAX_TASKS_DISPATCHED: usize = 1_000;

/// One configuration of the analysis, keyed by option name.
///
/// Backed by a `BTreeMap` so serialized keys are always sorted, which keeps
/// fingerprints independent of the order options were declared in.
pub type ParameterSet = BTreeMap<String, Value>;

/// File-level input of a task: one path per binding when files are split,
/// or every match under a bucket when they are combined.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum FileLocation {
    Single(String),
    Combined(Vec<String>),
}

impl FileLocation {
    pub fn paths(&self) -> Vec<&str> {
        match self {
            Self::Single(path) => vec![path.as_str()],
            Self::Combined(paths) => paths.iter().map(String::as_str).collect(),
        }
    }
}

/// Output of resolving one asset group.
///
/// `file_locations` is empty unless an extension filter was requested, and is
/// otherwise index-aligned with `bucket_locations`. `asset_ids` and
/// `asset_names` are either empty or index-aligned with `bucket_locations`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub bucket_locations: Vec<String>,
    #[serde(default)]
    pub file_locations: Vec<FileLocation>,
    #[serde(default)]
    pub asset_ids: Vec<String>,
    #[serde(default)]
    pub asset_names: Vec<String>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.bucket_locations.is_empty()
    }
}

/// Atomic unit of downstream work.
///
/// Built once, never mutated. The fingerprint is computed at construction
/// from the locations, file locations and parameters only; asset ids and
/// names are carried for the analysis but never hashed.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchModel {
    s3_location: Vec<String>,
    file_location: Option<Vec<FileLocation>>,
    distributed_parameters: Option<ParameterSet>,
    asset_id: Option<Vec<String>>,
    asset_name: Option<Vec<String>>,
    fingerprint: String,
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    s3_location: &'a [String],
    file_location: Option<&'a [FileLocation]>,
    distributed_parameters: Option<&'a ParameterSet>,
}

impl DispatchModel {
    pub fn new(
        s3_location: Vec<String>,
        file_location: Option<Vec<FileLocation>>,
        distributed_parameters: Option<ParameterSet>,
    ) -> Self {
        let fingerprint = task_fingerprint(
            &s3_location,
            file_location.as_deref(),
            distributed_parameters.as_ref(),
        );
        Self {
            s3_location,
            file_location,
            distributed_parameters,
            asset_id: None,
            asset_name: None,
            fingerprint,
        }
    }

    /// Attaches the catalog ids and names behind `s3_location`.
    pub fn with_assets(
        mut self,
        asset_id: Option<Vec<String>>,
        asset_name: Option<Vec<String>>,
    ) -> Self {
        self.asset_id = asset_id;
        self.asset_name = asset_name;
        self
    }

    pub fn s3_location(&self) -> &[String] {
        &self.s3_location
    }

    pub fn file_location(&self) -> Option<&[FileLocation]> {
        self.file_location.as_deref()
    }

    pub fn distributed_parameters(&self) -> Option<&ParameterSet> {
        self.distributed_parameters.as_ref()
    }

    pub fn asset_id(&self) -> Option<&[String]> {
        self.asset_id.as_deref()
    }

    pub fn asset_name(&self) -> Option<&[String]> {
        self.asset_name.as_deref()
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn descriptor(&self) -> TaskDescriptor {
        TaskDescriptor {
            schema_version: DESCRIPTOR_SCHEMA_VERSION.to_string(),
            fingerprint: self.fingerprint.clone(),
            s3_location: self.s3_location.clone(),
            file_location: self.file_location.clone(),
            asset_id: self.asset_id.clone(),
            asset_name: self.asset_name.clone(),
            distributed_parameters: self.distributed_parameters.clone(),
        }
    }
}

/// Persisted shape of a task, one per file.
///
/// `s3_location` is always a list; the optional fields are omitted when not
/// applicable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDescriptor {
    pub schema_version: String,
    pub fingerprint: String,
    pub s3_location: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_location: Option<Vec<FileLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_name: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distributed_parameters: Option<ParameterSet>,
}

impl TaskDescriptor {
    /// Rebuilds the model and checks the stored fingerprint still matches.
    pub fn into_model(self) -> Result<DispatchModel, DispatchError> {
        let model = DispatchModel::new(
            self.s3_location,
            self.file_location,
            self.distributed_parameters,
        )
        .with_assets(self.asset_id, self.asset_name);
        if model.fingerprint() != self.fingerprint {
            return Err(DispatchError::configuration(format!(
                "descriptor fingerprint {} does not match its content ({})",
                self.fingerprint,
                model.fingerprint()
            )));
        }
        Ok(model)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchRequest {
    #[serde(default)]
    pub file_extension: String,
    #[serde(default = "default_split_files")]
    pub split_files: bool,
    pub tasks_per_job: Option<usize>,
    #[serde(default)]
    pub job_count: Option<usize>,
    #[serde(default = "default_max_tasks_dispatched")]
    pub max_tasks_dispatched: usize,
    #[serde(default)]
    pub distributed_parameters: Option<Vec<ParameterSet>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDispatchRequest {
    pub file_extension: String,
    pub split_files: bool,
    pub sizing: BatchSizing,
    pub max_tasks_dispatched: usize,
    pub distributed_parameters: Option<Vec<ParameterSet>>,
}

impl NormalizedDispatchRequest {
    pub fn parameter_sets(&self) -> Option<&[ParameterSet]> {
        self.distributed_parameters.as_deref()
    }
}

pub fn default_split_files() -> bool {
    true
}

pub fn default_max_tasks_dispatched() -> usize {
    DEFAULT_MAX_TASKS_DISPATCHED
}

pub fn normalize_request(
    payload: DispatchRequest,
) -> Result<NormalizedDispatchRequest, DispatchError> {
    if payload.tasks_per_job == Some(0) {
        return Err(DispatchError::configuration(
            "tasks_per_job must be a positive integer",
        ));
    }
    if payload.job_count == Some(0) {
        return Err(DispatchError::configuration(
            "job_count must be a positive integer",
        ));
    }

    let sizing = match (payload.job_count, payload.tasks_per_job) {
        (Some(count), _) => BatchSizing::JobCount(count),
        (None, Some(size)) => BatchSizing::TasksPerJob(size),
        (None, None) => {
            return Err(DispatchError::configuration(
                "Either tasks_per_job or job_count is required",
            ));
        }
    };

    if payload.max_tasks_dispatched == 0 {
        return Err(DispatchError::configuration(
            "max_tasks_dispatched must be a positive integer",
        ));
    }

    let distributed_parameters = payload
        .distributed_parameters
        .filter(|sets| !sets.is_empty());

    Ok(NormalizedDispatchRequest {
        file_extension: payload.file_extension.trim().to_string(),
        split_files: payload.split_files,
        sizing,
        max_tasks_dispatched: payload.max_tasks_dispatched,
        distributed_parameters,
    })
}

pub fn task_fingerprint(
    s3_location: &[String],
    file_location: Option<&[FileLocation]>,
    distributed_parameters: Option<&ParameterSet>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_contract_json(FingerprintInput {
        s3_location,
        file_location,
        distributed_parameters,
    }));
    format!("{:x}", hasher.finalize())
}

pub fn stable_contract_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).expect("serialization of contract value should not fail")
}
