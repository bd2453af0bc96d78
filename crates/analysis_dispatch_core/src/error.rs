use crate::resolver::ResolveError;

/// Failures raised by the dispatch engine.
///
/// `Configuration` and `InvalidShape` are fatal and surface before any
/// resolution work starts.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid asset identifier shape: {0}")]
    InvalidShape(String),

    #[error("location resolution failed: {0}")]
    Resolver(String),

    #[error("job partition invariant violated: {0}")]
    Partition(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DispatchError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn invalid_shape(message: impl Into<String>) -> Self {
        Self::InvalidShape(message.into())
    }

    /// True for errors that abort a run before any resolution happens.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::InvalidShape(_))
    }
}

impl From<ResolveError> for DispatchError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::Backend(message) => Self::Resolver(message),
            other => Self::Resolver(other.to_string()),
        }
    }
}
