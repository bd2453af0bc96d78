use std::collections::HashSet;

use crate::contract::DispatchModel;

/// Drops models whose fingerprint already has completed output.
pub trait ProcessedJobFilter {
    fn is_processed(&self, fingerprint: &str) -> bool;

    /// Order-preserving subsequence of `models` that still needs to run.
    fn filter(&self, models: Vec<DispatchModel>) -> Vec<DispatchModel> {
        models
            .into_iter()
            .filter(|model| !self.is_processed(model.fingerprint()))
            .collect()
    }
}

/// Filter that keeps every model.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProcessedJobs;

impl ProcessedJobFilter for NoProcessedJobs {
    fn is_processed(&self, _fingerprint: &str) -> bool {
        false
    }
}

/// Fingerprints with completed output from earlier runs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FingerprintLedger {
    fingerprints: HashSet<String>,
}

impl FingerprintLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, fingerprint: impl Into<String>) -> bool {
        self.fingerprints.insert(fingerprint.into())
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for FingerprintLedger {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            fingerprints: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: Into<String>> Extend<S> for FingerprintLedger {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.fingerprints.extend(iter.into_iter().map(Into::into));
    }
}

impl ProcessedJobFilter for FingerprintLedger {
    fn is_processed(&self, fingerprint: &str) -> bool {
        self.contains(fingerprint)
    }
}
