use tracing::info;

use crate::builder::{build_dispatch_models, BuildOptions, SkippedGroup};
use crate::contract::NormalizedDispatchRequest;
use crate::error::DispatchError;
use crate::groups::{normalize_groups, AssetIds};
use crate::processed::ProcessedJobFilter;
use crate::resolver::LocationResolver;
use crate::sharding::{partition_jobs, JobBatch};

/// Everything a dispatch run decided, before anything is written.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPlan {
    pub batches: Vec<JobBatch>,
    pub skipped: Vec<SkippedGroup>,
    pub tasks_built: usize,
    pub already_processed: usize,
    pub truncated: usize,
}

impl DispatchPlan {
    pub fn total_tasks(&self) -> usize {
        self.batches.iter().map(JobBatch::len).sum()
    }
}

/// Runs normalization, model building, processed-job filtering and
/// partitioning in that order.
pub fn plan_dispatch(
    ids: AssetIds,
    request: &NormalizedDispatchRequest,
    resolver: &dyn LocationResolver,
    processed: &dyn ProcessedJobFilter,
) -> Result<DispatchPlan, DispatchError> {
    let groups = normalize_groups(ids)?;
    let options = BuildOptions {
        file_extension: &request.file_extension,
        split_files: request.split_files,
        parameter_sets: request.parameter_sets(),
    };

    let report = build_dispatch_models(&groups, resolver, &options)?;
    let tasks_built = report.models.len();

    let remaining = processed.filter(report.models);
    let already_processed = tasks_built - remaining.len();
    let truncated = remaining.len().saturating_sub(request.max_tasks_dispatched);

    info!(
        groups = groups.len(),
        tasks_built,
        already_processed,
        truncated,
        skipped_groups = report.skipped.len(),
        "Dispatch models ready for partitioning"
    );

    let batches = partition_jobs(remaining, request.sizing, request.max_tasks_dispatched)?;

    Ok(DispatchPlan {
        batches,
        skipped: report.skipped,
        tasks_built,
        already_processed,
        truncated,
    })
}
