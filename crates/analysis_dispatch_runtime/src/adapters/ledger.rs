use std::fs;
use std::path::{Path, PathBuf};

use analysis_dispatch_core::processed::FingerprintLedger;
use serde_json::Value;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
#[error("failed to scan processed records under {path}: {source}")]
pub struct LedgerError {
    pub path: String,
    pub source: walkdir::Error,
}

/// Collects the `fingerprint` of every JSON record under `roots`.
///
/// Missing roots count as empty. Symlinks are not followed. Files that are
/// not JSON objects with a string `fingerprint` are ignored.
pub fn load_ledger(roots: &[PathBuf]) -> Result<FingerprintLedger, LedgerError> {
    let mut ledger = FingerprintLedger::new();
    for root in roots {
        if !root.exists() {
            info!(root = %root.display(), "Processed directory does not exist yet");
            continue;
        }
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|source| LedgerError {
                path: root.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some("json")
            {
                continue;
            }
            match read_fingerprint(path) {
                Some(fingerprint) => {
                    ledger.insert(fingerprint);
                }
                None => debug!(path = %path.display(), "Skipping record without fingerprint"),
            }
        }
    }
    info!(fingerprints = ledger.len(), "Loaded processed job ledger");
    Ok(ledger)
}

fn read_fingerprint(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let value: Value = serde_json::from_str(&text).ok()?;
    value
        .get("fingerprint")
        .and_then(Value::as_str)
        .map(str::to_string)
}
