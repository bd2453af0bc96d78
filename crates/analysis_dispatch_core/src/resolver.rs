use crate::contract::Resolution;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// An extension filter matched nothing under one record's location.
    #[error("no files ending in '{extension}' found under {location}")]
    NoMatch { extension: String, location: String },

    #[error("{0}")]
    Backend(String),
}

/// Resolves one asset group to storage locations.
///
/// Implementations may block on network I/O. No timeout or retry is applied
/// by the caller.
pub trait LocationResolver {
    fn resolve(
        &self,
        group: &[String],
        file_extension: &str,
        split_files: bool,
    ) -> Result<Resolution, ResolveError>;
}
