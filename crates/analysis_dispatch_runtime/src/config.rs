use std::path::PathBuf;

use analysis_dispatch_core::contract::{
    DispatchRequest, DEFAULT_MAX_TASKS_DISPATCHED, DEFAULT_TASKS_PER_JOB,
};
use analysis_dispatch_core::{DispatchError, ParameterSet};
use clap::{ArgAction, Parser};
use tracing::warn;

/// Resolve data assets, expand parameter sweeps and write job batches.
#[derive(Debug, Clone, Parser)]
#[command(name = "dispatch_runtime", version)]
pub struct DispatchArgs {
    /// Asset query as inline JSON or a path to a JSON file
    #[arg(long, env = "DISPATCH_QUERY")]
    pub query: Option<String>,

    /// CSV listing with an `asset_id` column, or a directory holding one
    #[arg(long, env = "DISPATCH_ASSET_ID_CSV")]
    pub asset_id_csv: Option<PathBuf>,

    /// Asset catalog (JSON array or JSON lines)
    #[arg(long, env = "DISPATCH_CATALOG")]
    pub catalog: PathBuf,

    /// Fields grouping query results into multi-asset tasks
    #[arg(long, env = "DISPATCH_GROUP_BY", value_delimiter = ',')]
    pub group_by: Vec<String>,

    /// Only dispatch files ending with this suffix; empty keeps bucket paths
    #[arg(long, env = "DISPATCH_FILE_EXTENSION", default_value = "")]
    pub file_extension: String,

    /// One task per matched file (true) or one combined list per bucket (false)
    #[arg(
        long,
        env = "DISPATCH_SPLIT_FILES",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub split_files: bool,

    #[arg(long, env = "DISPATCH_TASKS_PER_JOB", default_value_t = DEFAULT_TASKS_PER_JOB)]
    pub tasks_per_job: usize,

    /// Split into this many balanced jobs instead of sizing by tasks per job
    #[arg(long, env = "DISPATCH_JOB_COUNT")]
    pub job_count: Option<usize>,

    #[arg(
        long,
        env = "DISPATCH_MAX_TASKS",
        default_value_t = DEFAULT_MAX_TASKS_DISPATCHED
    )]
    pub max_tasks_dispatched: usize,

    /// JSON file with a `distributed_parameters` list
    #[arg(long, env = "DISPATCH_PARAMETERS")]
    pub parameters: Option<PathBuf>,

    /// Directories of completed records whose fingerprints are skipped
    #[arg(long = "processed-dir", env = "DISPATCH_PROCESSED_DIRS", value_delimiter = ',')]
    pub processed_dirs: Vec<PathBuf>,

    #[arg(long, env = "DISPATCH_OUTPUT_DIR", default_value = "/results")]
    pub output_dir: PathBuf,

    /// Write descriptors to this bucket instead of the output directory
    #[arg(long, env = "DISPATCH_OUTPUT_S3_BUCKET")]
    pub output_s3_bucket: Option<String>,

    #[arg(long, env = "DISPATCH_OUTPUT_S3_PREFIX", default_value = "")]
    pub output_s3_prefix: String,

    /// List files from a local mirror rooted here instead of S3
    #[arg(long, env = "DISPATCH_LOCAL_ROOT")]
    pub local_root: Option<PathBuf>,

    #[arg(long, env = "DISPATCH_NO_PROGRESS", default_value_t = false)]
    pub no_progress: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    Csv(PathBuf),
    Query { raw: String, group_by: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Local(PathBuf),
    S3 { bucket: String, prefix: String },
}

impl DispatchArgs {
    /// The CSV listing wins when both sources are configured.
    pub fn asset_source(&self) -> Result<AssetSource, DispatchError> {
        let query = self
            .query
            .as_deref()
            .map(str::trim)
            .filter(|query| !query.is_empty());

        match (&self.asset_id_csv, query) {
            (Some(path), query) => {
                if query.is_some() {
                    warn!("Both an asset id csv and a query were supplied; using the csv");
                }
                Ok(AssetSource::Csv(path.clone()))
            }
            (None, Some(raw)) => Ok(AssetSource::Query {
                raw: raw.to_string(),
                group_by: self
                    .group_by
                    .iter()
                    .map(|field| field.trim())
                    .filter(|field| !field.is_empty())
                    .map(str::to_string)
                    .collect(),
            }),
            (None, None) => Err(DispatchError::configuration(
                "Either an asset query or an asset id csv is required",
            )),
        }
    }

    pub fn output_target(&self) -> OutputTarget {
        match self
            .output_s3_bucket
            .as_deref()
            .map(str::trim)
            .filter(|bucket| !bucket.is_empty())
        {
            Some(bucket) => OutputTarget::S3 {
                bucket: bucket.to_string(),
                prefix: self.output_s3_prefix.clone(),
            },
            None => OutputTarget::Local(self.output_dir.clone()),
        }
    }

    pub fn needs_s3(&self) -> bool {
        (self.local_root.is_none() && !self.file_extension.trim().is_empty())
            || matches!(self.output_target(), OutputTarget::S3 { .. })
    }

    pub fn request(&self, distributed_parameters: Option<Vec<ParameterSet>>) -> DispatchRequest {
        DispatchRequest {
            file_extension: self.file_extension.clone(),
            split_files: self.split_files,
            tasks_per_job: Some(self.tasks_per_job),
            job_count: self.job_count,
            max_tasks_dispatched: self.max_tasks_dispatched,
            distributed_parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> DispatchArgs {
        let mut argv = vec!["dispatch_runtime", "--catalog", "catalog.json"];
        argv.extend_from_slice(extra);
        DispatchArgs::try_parse_from(argv).expect("arguments parse")
    }

    #[test]
    fn defaults_match_single_task_jobs() {
        let args = parse(&["--query", "{}"]);
        assert_eq!(args.tasks_per_job, 1);
        assert_eq!(args.max_tasks_dispatched, DEFAULT_MAX_TASKS_DISPATCHED);
        assert!(args.split_files);
        assert_eq!(args.output_target(), OutputTarget::Local(PathBuf::from("/results")));
    }

    #[test]
    fn requires_some_asset_source() {
        let error = parse(&[]).asset_source().expect_err("no source");
        assert!(error.is_configuration());
    }

    #[test]
    fn csv_source_takes_precedence() {
        let args = parse(&["--query", "{}", "--asset-id-csv", "/data"]);
        assert_eq!(
            args.asset_source().expect("source"),
            AssetSource::Csv(PathBuf::from("/data"))
        );
    }

    #[test]
    fn group_by_accepts_comma_lists() {
        let args = parse(&["--query", "{}", "--group-by", "subject.subject_id,session"]);
        assert_eq!(
            args.asset_source().expect("source"),
            AssetSource::Query {
                raw: "{}".to_string(),
                group_by: vec!["subject.subject_id".to_string(), "session".to_string()],
            }
        );
    }

    #[test]
    fn split_files_can_be_disabled_and_s3_output_selected() {
        let args = parse(&[
            "--query",
            "{}",
            "--split-files",
            "false",
            "--output-s3-bucket",
            "results-bucket",
            "--output-s3-prefix",
            "dispatch/run-1",
        ]);
        assert!(!args.split_files);
        assert!(args.needs_s3());
        assert_eq!(
            args.output_target(),
            OutputTarget::S3 {
                bucket: "results-bucket".to_string(),
                prefix: "dispatch/run-1".to_string(),
            }
        );
    }

    #[test]
    fn zero_tasks_per_job_fails_validation_alongside_job_count() {
        let args = parse(&["--query", "{}", "--tasks-per-job", "0", "--job-count", "3"]);
        let error = analysis_dispatch_core::contract::normalize_request(args.request(None))
            .expect_err("zero tasks per job");
        assert!(error.is_configuration());
    }

    #[test]
    fn local_root_avoids_s3_for_listing() {
        let args = parse(&["--query", "{}", "--file-extension", ".nwb", "--local-root", "/mnt"]);
        assert!(!args.needs_s3());
        let request = args.request(None);
        assert_eq!(request.file_extension, ".nwb");
        assert_eq!(request.tasks_per_job, Some(1));
    }
}
