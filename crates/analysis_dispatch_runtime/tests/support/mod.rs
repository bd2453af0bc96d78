#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use analysis_dispatch_core::TaskDescriptor;
use serde_json::{json, Value};

/// Catalog document for one asset stored under `s3://<bucket>/<asset>`.
pub fn asset_document(asset_id: &str, bucket: &str, subject: &str) -> Value {
    json!({
        "_id": format!("record-{asset_id}"),
        "name": format!("{asset_id}_session"),
        "location": format!("s3://{bucket}/{asset_id}"),
        "external_links": {"Code Ocean": [asset_id]},
        "subject": {"subject_id": subject},
    })
}

pub fn write_catalog(dir: &Path, documents: &[Value]) -> PathBuf {
    let path = dir.join("catalog.jsonl");
    let body: Vec<String> = documents.iter().map(Value::to_string).collect();
    fs::write(&path, body.join("\n")).expect("catalog written");
    path
}

/// Creates empty files under a local mirror of `s3://<bucket>/<asset>/`.
pub fn mirror_files(root: &Path, bucket: &str, asset_id: &str, files: &[&str]) {
    for file in files {
        let path = root.join(bucket).join(asset_id).join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mirror directory created");
        }
        fs::write(path, b"").expect("mirror file written");
    }
}

/// Descriptors found under `<output>/<job_index>/`, keyed by job index.
pub fn read_descriptors(output: &Path) -> BTreeMap<usize, Vec<TaskDescriptor>> {
    let mut jobs = BTreeMap::new();
    if !output.exists() {
        return jobs;
    }
    for job_dir in fs::read_dir(output).expect("output readable") {
        let job_dir = job_dir.expect("entry").path();
        let Some(job_index) = job_dir
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse::<usize>().ok())
        else {
            continue;
        };
        let mut descriptors = Vec::new();
        for file in fs::read_dir(&job_dir).expect("job dir readable") {
            let file = file.expect("entry").path();
            let text = fs::read_to_string(&file).expect("descriptor readable");
            descriptors.push(serde_json::from_str(&text).expect("descriptor parses"));
        }
        jobs.insert(job_index, descriptors);
    }
    jobs
}

pub fn all_locations(jobs: &BTreeMap<usize, Vec<TaskDescriptor>>) -> Vec<Vec<String>> {
    let mut locations: Vec<Vec<String>> = jobs
        .values()
        .flatten()
        .map(|descriptor| descriptor.s3_location.clone())
        .collect();
    locations.sort();
    locations
}
