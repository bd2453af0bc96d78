use std::path::PathBuf;

use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("invalid storage location '{0}'")]
    InvalidLocation(String),

    #[error("failed to list {location}: {source}")]
    Io {
        location: String,
        source: walkdir::Error,
    },

    #[error("{0}")]
    Backend(String),
}

/// Lists files under a bucket-level location whose name ends with an
/// extension. Returned paths are full URIs, sorted.
pub trait FileLister {
    fn list_files(&self, location: &str, extension: &str) -> Result<Vec<String>, ListingError>;
}

impl<T: FileLister + ?Sized> FileLister for Box<T> {
    fn list_files(&self, location: &str, extension: &str) -> Result<Vec<String>, ListingError> {
        (**self).list_files(location, extension)
    }
}

/// Prepends `s3://` to bare `bucket/prefix` locations.
pub fn s3_uri(location: &str) -> String {
    let trimmed = location.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("s3://{trimmed}")
    }
}

/// Splits `s3://bucket/prefix` (or `bucket/prefix`) into bucket and key prefix.
pub fn split_s3_uri(location: &str) -> Result<(String, String), ListingError> {
    let uri = s3_uri(location);
    let Some(rest) = uri.strip_prefix("s3://") else {
        return Err(ListingError::InvalidLocation(location.to_string()));
    };
    let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(ListingError::InvalidLocation(location.to_string()));
    }
    Ok((bucket.to_string(), prefix.trim_matches('/').to_string()))
}

/// Lists a local mirror laid out as `<root>/<bucket>/<prefix>/...`.
///
/// Paths are reported as `s3://` URIs so descriptors look the same as when
/// listing the bucket itself.
#[derive(Debug, Clone)]
pub struct LocalFileLister {
    root: PathBuf,
}

impl LocalFileLister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn local_dir(&self, location: &str) -> Result<PathBuf, ListingError> {
        let (bucket, prefix) = split_s3_uri(location)?;
        let mut dir = self.root.join(bucket);
        if !prefix.is_empty() {
            dir = dir.join(prefix);
        }
        Ok(dir)
    }
}

impl FileLister for LocalFileLister {
    fn list_files(&self, location: &str, extension: &str) -> Result<Vec<String>, ListingError> {
        let dir = self.local_dir(location)?;
        if !dir.is_dir() {
            debug!(location, dir = %dir.display(), "Local mirror directory missing");
            return Ok(Vec::new());
        }

        let mut relative = Vec::new();
        for entry in WalkDir::new(&dir) {
            let entry = entry.map_err(|source| ListingError::Io {
                location: location.to_string(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(extension));
            if !matches {
                continue;
            }
            if let Ok(path) = entry.path().strip_prefix(&dir) {
                let segments: Vec<_> = path
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy().into_owned())
                    .collect();
                relative.push(segments.join("/"));
            }
        }
        relative.sort();

        let base = s3_uri(location);
        Ok(relative
            .into_iter()
            .map(|path| format!("{base}/{path}"))
            .collect())
    }
}

/// Lists objects with `ListObjectsV2`, following continuation tokens.
///
/// Must be called from inside a multi-threaded Tokio runtime.
#[derive(Clone)]
pub struct S3FileLister {
    s3_client: aws_sdk_s3::Client,
}

impl S3FileLister {
    pub fn new(s3_client: aws_sdk_s3::Client) -> Self {
        Self { s3_client }
    }
}

impl FileLister for S3FileLister {
    fn list_files(&self, location: &str, extension: &str) -> Result<Vec<String>, ListingError> {
        let (bucket, prefix) = split_s3_uri(location)?;
        let key_prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };
        let client = self.s3_client.clone();
        let list_bucket = bucket.clone();

        let mut keys = tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let mut keys = Vec::new();
                let mut continuation_token: Option<String> = None;
                loop {
                    let response = client
                        .list_objects_v2()
                        .bucket(&list_bucket)
                        .prefix(&key_prefix)
                        .set_continuation_token(continuation_token.take())
                        .send()
                        .await
                        .map_err(|error| {
                            ListingError::Backend(format!(
                                "failed to list s3://{list_bucket}/{key_prefix}: {error}"
                            ))
                        })?;

                    keys.extend(
                        response
                            .contents()
                            .iter()
                            .filter_map(|object| object.key())
                            .map(str::to_string),
                    );

                    match response.next_continuation_token() {
                        Some(token) => continuation_token = Some(token.to_string()),
                        None => break,
                    }
                }
                Ok::<_, ListingError>(keys)
            })
        })?;

        keys.retain(|key| key.ends_with(extension));
        keys.sort();
        Ok(keys
            .into_iter()
            .map(|key| format!("s3://{bucket}/{key}"))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn s3_uri_adds_scheme_once() {
        assert_eq!(s3_uri("bucket/path/"), "s3://bucket/path");
        assert_eq!(s3_uri("s3://bucket/path"), "s3://bucket/path");
    }

    #[test]
    fn split_s3_uri_separates_bucket_and_prefix() {
        assert_eq!(
            split_s3_uri("s3://bucket/a/b/").expect("valid"),
            ("bucket".to_string(), "a/b".to_string())
        );
        assert_eq!(
            split_s3_uri("bucket").expect("valid"),
            ("bucket".to_string(), String::new())
        );
        assert!(split_s3_uri("gs://bucket/a").is_err());
    }

    #[test]
    fn local_lister_walks_nested_directories() {
        let root = tempfile::tempdir().expect("tempdir");
        let session = root.path().join("bucket").join("session");
        fs::create_dir_all(session.join("nwb")).expect("mkdir");
        fs::write(session.join("nwb").join("b.nwb"), b"").expect("write");
        fs::write(session.join("a.nwb"), b"").expect("write");
        fs::write(session.join("notes.txt"), b"").expect("write");

        let lister = LocalFileLister::new(root.path());
        let files = lister
            .list_files("s3://bucket/session", ".nwb")
            .expect("listing succeeds");
        assert_eq!(
            files,
            vec![
                "s3://bucket/session/a.nwb".to_string(),
                "s3://bucket/session/nwb/b.nwb".to_string(),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn local_lister_does_not_follow_symlink_cycles() {
        let root = tempfile::tempdir().expect("tempdir");
        let session = root.path().join("bucket").join("session");
        fs::create_dir_all(&session).expect("mkdir");
        fs::write(session.join("a.nwb"), b"").expect("write");
        std::os::unix::fs::symlink(&session, session.join("loop")).expect("symlink");

        let files = LocalFileLister::new(root.path())
            .list_files("s3://bucket/session", ".nwb")
            .expect("listing succeeds");
        assert_eq!(files, vec!["s3://bucket/session/a.nwb".to_string()]);
    }

    #[test]
    fn local_lister_treats_missing_directory_as_empty() {
        let root = tempfile::tempdir().expect("tempdir");
        let files = LocalFileLister::new(root.path())
            .list_files("bucket/absent", ".nwb")
            .expect("listing succeeds");
        assert!(files.is_empty());
    }
}
