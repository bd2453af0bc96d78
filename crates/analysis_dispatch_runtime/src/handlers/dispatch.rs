use analysis_dispatch_core::builder::SkippedGroup;
use analysis_dispatch_core::contract::{normalize_request, NormalizedDispatchRequest};
use analysis_dispatch_core::processed::ProcessedJobFilter;
use analysis_dispatch_core::resolver::LocationResolver;
use analysis_dispatch_core::sharding::JobBatch;
use analysis_dispatch_core::storage_keys::{job_prefix, task_descriptor_key};
use analysis_dispatch_core::{plan_dispatch, AssetIds, DispatchError};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adapters::catalog::AssetCatalog;
use crate::adapters::catalog_resolver::CatalogResolver;
use crate::adapters::file_listing::{FileLister, LocalFileLister, S3FileLister};
use crate::adapters::job_store::{JobStore, LocalJobStore, S3JobStore};
use crate::adapters::ledger::load_ledger;
use crate::config::{AssetSource, DispatchArgs, OutputTarget};
use crate::error::RuntimeError;
use crate::sources::{load_parameter_sets, load_query, read_asset_id_csv};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchSummary {
    pub tasks_built: usize,
    pub already_processed: usize,
    pub truncated: usize,
    pub tasks_written: usize,
    pub jobs_written: usize,
    pub skipped_groups: Vec<SkippedGroup>,
}

/// Plans the dispatch and writes every batch to `store`.
///
/// Batches are written in index order; a failure leaves earlier batches in
/// place.
pub fn run_dispatch(
    ids: AssetIds,
    request: &NormalizedDispatchRequest,
    resolver: &dyn LocationResolver,
    processed: &dyn ProcessedJobFilter,
    store: &dyn JobStore,
    show_progress: bool,
) -> Result<DispatchSummary, RuntimeError> {
    let plan = plan_dispatch(ids, request, resolver, processed)?;

    for skipped in &plan.skipped {
        warn!(
            group_index = skipped.group_index,
            group = ?skipped.group,
            reason = %skipped.reason,
            "Group excluded from dispatch"
        );
    }

    let tasks_written = write_job_batches(&plan.batches, store, show_progress)?;

    Ok(DispatchSummary {
        tasks_built: plan.tasks_built,
        already_processed: plan.already_processed,
        truncated: plan.truncated,
        tasks_written,
        jobs_written: plan.batches.len(),
        skipped_groups: plan.skipped,
    })
}

pub fn write_job_batches(
    batches: &[JobBatch],
    store: &dyn JobStore,
    show_progress: bool,
) -> Result<usize, RuntimeError> {
    let progress = if show_progress && !batches.is_empty() {
        let bar = ProgressBar::new(batches.len() as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("Distributing jobs [{bar:40.cyan/blue}] {pos}/{len}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Some(bar)
    } else {
        None
    };

    let mut written = 0usize;
    for batch in batches {
        for entry in &batch.entries {
            let key = task_descriptor_key("", batch.job_index, &entry.task_id);
            let body = serde_json::to_vec_pretty(&entry.model.descriptor())
                .map_err(DispatchError::from)?;
            store.write_object(&key, &body)?;
            written += 1;
        }
        info!(
            job_index = batch.job_index,
            tasks = batch.len(),
            destination = %store.describe(&job_prefix("", batch.job_index)),
            "Job batch written"
        );
        if let Some(bar) = &progress {
            bar.inc(1);
        }
    }

    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    Ok(written)
}

pub fn load_asset_ids(
    source: &AssetSource,
    catalog: &AssetCatalog,
) -> Result<AssetIds, RuntimeError> {
    let ids = match source {
        AssetSource::Csv(path) => AssetIds::Flat(read_asset_id_csv(path)?),
        AssetSource::Query { raw, group_by } => {
            let query = load_query(raw)?;
            info!(query = %query, group_by = ?group_by, "Using query");
            catalog.query_asset_ids(&query, group_by)?
        }
    };
    info!(records = ids.len(), "Returned asset records");
    Ok(ids)
}

/// Wires collaborators from command-line settings and runs one dispatch.
///
/// `s3_client` is required whenever files are listed from S3 or
/// descriptors are written to S3.
pub fn run_with_args(
    args: &DispatchArgs,
    s3_client: Option<aws_sdk_s3::Client>,
) -> Result<DispatchSummary, RuntimeError> {
    let source = args.asset_source()?;
    let parameter_sets = match &args.parameters {
        Some(path) => load_parameter_sets(path)?,
        None => None,
    };
    let request = normalize_request(args.request(parameter_sets))?;

    let require_s3 = || {
        s3_client.clone().ok_or_else(|| {
            DispatchError::configuration("an S3 client is required for this configuration")
        })
    };

    let lister: Option<Box<dyn FileLister>> = match &args.local_root {
        Some(root) => Some(Box::new(LocalFileLister::new(root))),
        None if request.file_extension.is_empty() => None,
        None => Some(Box::new(S3FileLister::new(require_s3()?))),
    };
    let catalog = AssetCatalog::load(&args.catalog)?;
    let resolver = match lister {
        Some(lister) => CatalogResolver::new(catalog, lister),
        None => CatalogResolver::without_lister(catalog),
    };
    let ids = load_asset_ids(&source, resolver.catalog())?;

    let ledger = load_ledger(&args.processed_dirs)?;
    let store: Box<dyn JobStore> = match args.output_target() {
        OutputTarget::Local(dir) => Box::new(LocalJobStore::new(dir)),
        OutputTarget::S3 { bucket, prefix } => Box::new(S3JobStore::new(bucket, prefix, require_s3()?)),
    };

    let summary = run_dispatch(
        ids,
        &request,
        &resolver,
        &ledger,
        store.as_ref(),
        !args.no_progress,
    )?;
    info!(
        tasks_written = summary.tasks_written,
        jobs_written = summary.jobs_written,
        skipped_groups = summary.skipped_groups.len(),
        "Dispatch complete"
    );
    Ok(summary)
}
