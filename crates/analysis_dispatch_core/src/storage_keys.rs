use uuid::Uuid;

pub const DESCRIPTOR_EXTENSION: &str = "json";

pub fn job_prefix(base_prefix: &str, job_index: usize) -> String {
    let trimmed = base_prefix.trim_matches('/');
    if trimmed.is_empty() {
        job_index.to_string()
    } else {
        format!("{trimmed}/{job_index}")
    }
}

/// Object key of one task descriptor: `<base>/<job_index>/<task_id>.json`.
pub fn task_descriptor_key(base_prefix: &str, job_index: usize, task_id: &Uuid) -> String {
    format!(
        "{}/{task_id}.{DESCRIPTOR_EXTENSION}",
        job_prefix(base_prefix, job_index)
    )
}
