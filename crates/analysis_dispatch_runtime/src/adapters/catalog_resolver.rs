use analysis_dispatch_core::resolver::{LocationResolver, ResolveError};
use analysis_dispatch_core::{FileLocation, Resolution};
use tracing::{debug, info};

use crate::adapters::catalog::{AssetCatalog, AssetRecord};
use crate::adapters::file_listing::{s3_uri, FileLister};

/// Resolves group members through the catalog and lists files with `L`.
///
/// In split mode every matched file gets its own entry and the bucket,
/// asset id and asset name are repeated alongside it, keeping every sequence
/// index-aligned. Without a lister only bucket-level resolution is possible.
pub struct CatalogResolver<L> {
    catalog: AssetCatalog,
    lister: Option<L>,
}

impl<L: FileLister> CatalogResolver<L> {
    pub fn new(catalog: AssetCatalog, lister: L) -> Self {
        Self {
            catalog,
            lister: Some(lister),
        }
    }

    pub fn without_lister(catalog: AssetCatalog) -> Self {
        Self {
            catalog,
            lister: None,
        }
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }
}

fn push_entry(
    resolution: &mut Resolution,
    record: &AssetRecord,
    bucket: String,
    file: Option<FileLocation>,
) {
    resolution.bucket_locations.push(bucket);
    resolution.asset_ids.push(record.asset_id().to_string());
    resolution.asset_names.push(record.name.clone());
    if let Some(file) = file {
        resolution.file_locations.push(file);
    }
}

impl<L: FileLister> LocationResolver for CatalogResolver<L> {
    fn resolve(
        &self,
        group: &[String],
        file_extension: &str,
        split_files: bool,
    ) -> Result<Resolution, ResolveError> {
        let mut resolution = Resolution::default();

        for member in group {
            let mut found = false;
            for record in self.catalog.records_for(member) {
                found = true;
                let bucket = s3_uri(&record.location);

                if file_extension.is_empty() {
                    push_entry(&mut resolution, record, bucket, None);
                    continue;
                }

                let Some(lister) = &self.lister else {
                    return Err(ResolveError::Backend(format!(
                        "no file lister configured to match '{file_extension}' under {bucket}"
                    )));
                };
                let files = lister
                    .list_files(&bucket, file_extension)
                    .map_err(|error| ResolveError::Backend(error.to_string()))?;
                if files.is_empty() {
                    return Err(ResolveError::NoMatch {
                        extension: file_extension.to_string(),
                        location: bucket,
                    });
                }
                info!(
                    asset = record.asset_id(),
                    files = files.len(),
                    extension = file_extension,
                    "Found matching files"
                );

                if split_files {
                    for file in files {
                        push_entry(
                            &mut resolution,
                            record,
                            bucket.clone(),
                            Some(FileLocation::Single(file)),
                        );
                    }
                } else {
                    push_entry(
                        &mut resolution,
                        record,
                        bucket,
                        Some(FileLocation::Combined(files)),
                    );
                }
            }

            if !found {
                debug!(member = member.as_str(), "No catalog record for asset");
            }
        }

        Ok(resolution)
    }
}
