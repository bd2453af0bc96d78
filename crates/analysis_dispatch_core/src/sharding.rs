use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contract::DispatchModel;
use crate::error::DispatchError;

/// How the task sequence is cut into jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchSizing {
    /// `ceil(n / size)` balanced jobs.
    TasksPerJob(usize),
    /// `min(count, n)` balanced jobs.
    JobCount(usize),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobAssignment {
    pub job_index: usize,
    pub start_index: usize,
    pub end_index_exclusive: usize,
}

impl JobAssignment {
    pub fn len(&self) -> usize {
        self.end_index_exclusive - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One task placed in a job. `task_id` only names the output file.
#[derive(Debug, Clone, PartialEq)]
pub struct JobEntry {
    pub task_id: Uuid,
    pub model: DispatchModel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobBatch {
    pub job_index: usize,
    pub entries: Vec<JobEntry>,
}

impl JobBatch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn compute_job_plan(
    total_tasks: usize,
    sizing: BatchSizing,
) -> Result<Vec<JobAssignment>, DispatchError> {
    let job_count = match sizing {
        BatchSizing::TasksPerJob(0) => {
            return Err(DispatchError::configuration(
                "tasks_per_job must be a positive integer",
            ));
        }
        BatchSizing::JobCount(0) => {
            return Err(DispatchError::configuration(
                "job_count must be a positive integer",
            ));
        }
        BatchSizing::TasksPerJob(size) => total_tasks.div_ceil(size),
        BatchSizing::JobCount(count) => count.min(total_tasks),
    };

    if job_count == 0 {
        return Ok(Vec::new());
    }

    let base_size = total_tasks / job_count;
    let remainder = total_tasks % job_count;

    let mut assignments = Vec::with_capacity(job_count);
    let mut cursor = 0usize;

    for job_index in 0..job_count {
        let current_size = base_size + usize::from(job_index < remainder);
        let start_index = cursor;
        let end_index_exclusive = cursor + current_size;
        assignments.push(JobAssignment {
            job_index,
            start_index,
            end_index_exclusive,
        });
        cursor = end_index_exclusive;
    }

    validate_assignments(total_tasks, &assignments)?;
    Ok(assignments)
}

fn validate_assignments(
    total_tasks: usize,
    assignments: &[JobAssignment],
) -> Result<(), DispatchError> {
    let (Some(first), Some(last)) = (assignments.first(), assignments.last()) else {
        return Err(DispatchError::Partition("No jobs to dispatch".to_string()));
    };

    if first.start_index != 0 || last.end_index_exclusive != total_tasks {
        return Err(DispatchError::Partition(
            "Job boundaries do not cover the full task sequence".to_string(),
        ));
    }

    for pair in assignments.windows(2) {
        if pair[0].end_index_exclusive != pair[1].start_index {
            return Err(DispatchError::Partition(
                "Job boundaries overlap or leave gaps".to_string(),
            ));
        }
    }

    if assignments.iter().any(JobAssignment::is_empty) {
        return Err(DispatchError::Partition(
            "Job plan contains an empty job".to_string(),
        ));
    }

    Ok(())
}

/// Keeps the first `max_tasks_dispatched` items, in order.
pub fn truncate_tasks<T>(mut items: Vec<T>, max_tasks_dispatched: usize) -> Vec<T> {
    items.truncate(max_tasks_dispatched);
    items
}

/// Cuts `items` along a plan produced by [`compute_job_plan`] for the same length.
pub fn split_by_plan<T>(items: Vec<T>, plan: &[JobAssignment]) -> Vec<Vec<T>> {
    let mut remaining = items.into_iter();
    plan.iter()
        .map(|assignment| remaining.by_ref().take(assignment.len()).collect())
        .collect()
}

/// Truncates then partitions models into balanced, indexed job batches.
pub fn partition_jobs(
    models: Vec<DispatchModel>,
    sizing: BatchSizing,
    max_tasks_dispatched: usize,
) -> Result<Vec<JobBatch>, DispatchError> {
    let models = truncate_tasks(models, max_tasks_dispatched);
    let plan = compute_job_plan(models.len(), sizing)?;

    Ok(plan
        .iter()
        .zip(split_by_plan(models, &plan))
        .map(|(assignment, models)| JobBatch {
            job_index: assignment.job_index,
            entries: models
                .into_iter()
                .map(|model| JobEntry {
                    task_id: Uuid::new_v4(),
                    model,
                })
                .collect(),
        })
        .collect())
}
