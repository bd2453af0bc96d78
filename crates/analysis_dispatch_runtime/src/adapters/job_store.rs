use std::fs;
use std::path::PathBuf;

use aws_sdk_s3::primitives::ByteStream;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to write {key}: {source}")]
    Io {
        key: String,
        source: std::io::Error,
    },

    #[error("{0}")]
    Backend(String),
}

/// Sink for task descriptors, addressed by relative key.
pub trait JobStore {
    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), StoreError>;

    /// Human-readable location of `key`, used in logs.
    fn describe(&self, key: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct LocalJobStore {
    root: PathBuf,
}

impl LocalJobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl JobStore for LocalJobStore {
    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), StoreError> {
        let path = self.root.join(key);
        let io_error = |source| StoreError::Io {
            key: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(&path, body).map_err(io_error)
    }

    fn describe(&self, key: &str) -> String {
        self.root.join(key).display().to_string()
    }
}

/// Writes descriptors under `s3://<bucket>/<prefix>/`.
///
/// Must be called from inside a multi-threaded Tokio runtime.
#[derive(Clone)]
pub struct S3JobStore {
    bucket: String,
    prefix: String,
    s3_client: aws_sdk_s3::Client,
}

impl S3JobStore {
    pub fn new(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        s3_client: aws_sdk_s3::Client,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
            s3_client,
        }
    }

    fn object_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{key}", self.prefix)
        }
    }
}

impl JobStore for S3JobStore {
    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), StoreError> {
        let bucket = self.bucket.clone();
        let object_key = self.object_key(key);
        let body_bytes = body.to_vec();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .put_object()
                    .bucket(bucket)
                    .key(object_key)
                    .content_type("application/json")
                    .body(ByteStream::from(body_bytes))
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| {
                        StoreError::Backend(format!("failed to write object to s3: {error}"))
                    })
            })
        })
    }

    fn describe(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, self.object_key(key))
    }
}
