use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::contract::{DispatchModel, ParameterSet, Resolution};
use crate::error::DispatchError;
use crate::expansion::{expand_parameters, LocationBinding};
use crate::groups::NormalizedGroups;
use crate::resolver::{LocationResolver, ResolveError};

#[derive(Debug, Clone, Copy)]
pub struct BuildOptions<'a> {
    pub file_extension: &'a str,
    pub split_files: bool,
    pub parameter_sets: Option<&'a [ParameterSet]>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedGroup {
    pub group_index: usize,
    pub group: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub models: Vec<DispatchModel>,
    pub skipped: Vec<SkippedGroup>,
}

/// Builds dispatch models for every group, in group order.
///
/// A group whose extension filter matches nothing, or that resolves to no
/// location at all, is recorded in `skipped` and the remaining groups are
/// still processed. Any other resolver failure aborts the build.
pub fn build_dispatch_models(
    groups: &NormalizedGroups,
    resolver: &dyn LocationResolver,
    options: &BuildOptions<'_>,
) -> Result<BuildReport, DispatchError> {
    let mut report = BuildReport::default();

    for (group_index, group) in groups.groups.iter().enumerate() {
        let resolution =
            match resolver.resolve(group, options.file_extension, options.split_files) {
                Ok(value) => value,
                Err(error @ ResolveError::NoMatch { .. }) => {
                    warn!(
                        group_index,
                        group = ?group,
                        %error,
                        "Skipping group with no matching files"
                    );
                    report.skipped.push(SkippedGroup {
                        group_index,
                        group: group.clone(),
                        reason: error.to_string(),
                    });
                    continue;
                }
                Err(error) => return Err(error.into()),
            };

        if resolution.is_empty() {
            debug!(group_index, group = ?group, "Group resolved to no locations");
            report.skipped.push(SkippedGroup {
                group_index,
                group: group.clone(),
                reason: "no locations resolved".to_string(),
            });
            continue;
        }

        for binding in bindings_for(resolution, groups.is_flat)? {
            report
                .models
                .extend(expand_parameters(&binding, options.parameter_sets));
        }
    }

    debug!(
        models = report.models.len(),
        skipped = report.skipped.len(),
        "Built dispatch models"
    );
    Ok(report)
}

fn bindings_for(
    resolution: Resolution,
    is_flat: bool,
) -> Result<Vec<LocationBinding>, DispatchError> {
    let Resolution {
        bucket_locations,
        file_locations,
        asset_ids,
        asset_names,
    } = resolution;

    for (label, len) in [
        ("file locations", file_locations.len()),
        ("asset ids", asset_ids.len()),
        ("asset names", asset_names.len()),
    ] {
        if len != 0 && len != bucket_locations.len() {
            return Err(DispatchError::Resolver(format!(
                "resolver returned {len} {label} for {} bucket locations",
                bucket_locations.len()
            )));
        }
    }

    if !is_flat {
        return Ok(vec![LocationBinding {
            s3_location: bucket_locations,
            file_location: non_empty(file_locations),
            asset_id: non_empty(asset_ids),
            asset_name: non_empty(asset_names),
        }]);
    }

    let mut files = file_locations.into_iter();
    let mut ids = asset_ids.into_iter();
    let mut names = asset_names.into_iter();
    Ok(bucket_locations
        .into_iter()
        .map(|bucket| LocationBinding {
            s3_location: vec![bucket],
            file_location: files.next().map(|file| vec![file]),
            asset_id: ids.next().map(|id| vec![id]),
            asset_name: names.next().map(|name| vec![name]),
        })
        .collect())
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::contract::FileLocation;
    use crate::groups::{normalize_groups, AssetIds};

    /// Resolves each id to `s3://bucket/<id>`; ids listed in `missing` fail the
    /// extension match and ids in `locations` override the bucket list.
    /// `named` reports asset ids and names for bucket-only resolutions.
    #[derive(Default)]
    struct FakeResolver {
        locations: BTreeMap<String, Vec<String>>,
        missing: Vec<String>,
        broken: Vec<String>,
        named: bool,
    }

    impl LocationResolver for FakeResolver {
        fn resolve(
            &self,
            group: &[String],
            file_extension: &str,
            split_files: bool,
        ) -> Result<Resolution, ResolveError> {
            let mut resolution = Resolution::default();
            for id in group {
                if self.broken.contains(id) {
                    return Err(ResolveError::Backend(format!("catalog offline for {id}")));
                }
                let buckets = self
                    .locations
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| vec![format!("s3://bucket/{id}")]);
                for bucket in buckets {
                    if file_extension.is_empty() {
                        resolution.bucket_locations.push(bucket);
                        if self.named {
                            resolution.asset_ids.push(id.clone());
                            resolution.asset_names.push(format!("{id}_session"));
                        }
                        continue;
                    }
                    if self.missing.contains(id) {
                        return Err(ResolveError::NoMatch {
                            extension: file_extension.to_string(),
                            location: bucket,
                        });
                    }
                    let files = vec![
                        format!("{bucket}/one{file_extension}"),
                        format!("{bucket}/two{file_extension}"),
                    ];
                    if split_files {
                        for file in files {
                            resolution.bucket_locations.push(bucket.clone());
                            resolution.file_locations.push(FileLocation::Single(file));
                        }
                    } else {
                        resolution.bucket_locations.push(bucket);
                        resolution.file_locations.push(FileLocation::Combined(files));
                    }
                }
            }
            Ok(resolution)
        }
    }

    fn options<'a>(
        file_extension: &'a str,
        split_files: bool,
        parameter_sets: Option<&'a [ParameterSet]>,
    ) -> BuildOptions<'a> {
        BuildOptions {
            file_extension,
            split_files,
            parameter_sets,
        }
    }

    fn flat(ids: &[&str]) -> NormalizedGroups {
        normalize_groups(AssetIds::Flat(ids.iter().map(|id| id.to_string()).collect()))
            .expect("flat ids normalize")
    }

    fn grouped(groups: &[&[&str]]) -> NormalizedGroups {
        normalize_groups(AssetIds::Grouped(
            groups
                .iter()
                .map(|group| group.iter().map(|id| id.to_string()).collect())
                .collect(),
        ))
        .expect("grouped ids normalize")
    }

    #[test]
    fn flat_ids_yield_one_single_location_task_each() {
        let report = build_dispatch_models(
            &flat(&["a", "b", "c"]),
            &FakeResolver::default(),
            &options("", true, None),
        )
        .expect("build should pass");

        assert_eq!(report.models.len(), 3);
        for (model, id) in report.models.iter().zip(["a", "b", "c"]) {
            assert_eq!(model.s3_location(), &[format!("s3://bucket/{id}")]);
            assert!(model.file_location().is_none());
            assert!(model.distributed_parameters().is_none());
        }
    }

    #[test]
    fn grouped_ids_cross_parameter_sets() {
        let sets = vec![
            ParameterSet::from([("alpha".to_string(), json!(0.1))]),
            ParameterSet::from([("alpha".to_string(), json!(0.2))]),
            ParameterSet::from([("alpha".to_string(), json!(0.3))]),
        ];
        let report = build_dispatch_models(
            &grouped(&[&["a", "b"], &["c"]]),
            &FakeResolver::default(),
            &options("", true, Some(&sets)),
        )
        .expect("build should pass");

        assert_eq!(report.models.len(), 2 * 3);
        assert_eq!(report.models[0].s3_location().len(), 2);
        assert_eq!(report.models[3].s3_location(), &["s3://bucket/c".to_string()]);
        assert_eq!(
            report.models[1].distributed_parameters().expect("parameters")["alpha"],
            json!(0.2)
        );
    }

    #[test]
    fn asset_ids_and_names_follow_their_buckets() {
        let resolver = FakeResolver {
            named: true,
            ..FakeResolver::default()
        };
        let report = build_dispatch_models(
            &flat(&["a", "b"]),
            &resolver,
            &options("", true, None),
        )
        .expect("build should pass");
        assert_eq!(report.models[1].asset_id(), Some(&["b".to_string()][..]));
        assert_eq!(
            report.models[1].asset_name(),
            Some(&["b_session".to_string()][..])
        );

        let report = build_dispatch_models(
            &grouped(&[&["a", "b"]]),
            &resolver,
            &options("", true, None),
        )
        .expect("build should pass");
        assert_eq!(
            report.models[0].asset_id(),
            Some(&["a".to_string(), "b".to_string()][..])
        );
    }

    #[test]
    fn misaligned_asset_metadata_is_rejected() {
        struct Misaligned;

        impl LocationResolver for Misaligned {
            fn resolve(
                &self,
                _group: &[String],
                _file_extension: &str,
                _split_files: bool,
            ) -> Result<Resolution, ResolveError> {
                Ok(Resolution {
                    bucket_locations: vec!["s3://bucket/a".to_string(), "s3://bucket/b".to_string()],
                    asset_ids: vec!["a".to_string()],
                    ..Resolution::default()
                })
            }
        }

        let error = build_dispatch_models(&flat(&["a"]), &Misaligned, &options("", true, None))
            .expect_err("build should fail");
        assert!(matches!(error, DispatchError::Resolver(_)));
    }

    #[test]
    fn grouped_task_spans_every_resolved_bucket() {
        let resolver = FakeResolver {
            locations: BTreeMap::from([(
                "session".to_string(),
                vec!["s3://bucket/r1".to_string(), "s3://bucket/r2".to_string()],
            )]),
            ..FakeResolver::default()
        };
        let report = build_dispatch_models(
            &grouped(&[&["session", "extra"]]),
            &resolver,
            &options("", true, None),
        )
        .expect("build should pass");

        assert_eq!(report.models.len(), 1);
        assert_eq!(report.models[0].s3_location().len(), 3);
    }

    #[test]
    fn split_files_produce_one_flat_task_per_file() {
        let report = build_dispatch_models(
            &flat(&["a"]),
            &FakeResolver::default(),
            &options(".nwb", true, None),
        )
        .expect("build should pass");

        assert_eq!(report.models.len(), 2);
        assert_eq!(
            report.models[1].file_location(),
            Some(&[FileLocation::Single("s3://bucket/a/two.nwb".to_string())][..])
        );
    }

    #[test]
    fn combined_files_stay_in_one_task() {
        let report = build_dispatch_models(
            &grouped(&[&["a", "b"]]),
            &FakeResolver::default(),
            &options(".nwb", false, None),
        )
        .expect("build should pass");

        assert_eq!(report.models.len(), 1);
        let files = report.models[0].file_location().expect("file locations");
        assert_eq!(files.len(), 2);
        assert!(matches!(&files[0], FileLocation::Combined(paths) if paths.len() == 2));
    }

    #[test]
    fn missing_extension_skips_only_that_group() {
        let resolver = FakeResolver {
            missing: vec!["b".to_string()],
            ..FakeResolver::default()
        };
        let report = build_dispatch_models(
            &flat(&["a", "b", "c"]),
            &resolver,
            &options(".nwb", false, None),
        )
        .expect("build should pass");

        assert_eq!(report.models.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].group_index, 1);
        assert_eq!(report.skipped[0].group, vec!["b".to_string()]);
        assert_eq!(
            report.skipped[0].reason,
            "no files ending in '.nwb' found under s3://bucket/b"
        );
    }

    #[test]
    fn groups_without_locations_are_dropped() {
        let resolver = FakeResolver {
            locations: BTreeMap::from([("ghost".to_string(), Vec::new())]),
            ..FakeResolver::default()
        };
        let report = build_dispatch_models(
            &flat(&["ghost", "a"]),
            &resolver,
            &options("", true, None),
        )
        .expect("build should pass");

        assert_eq!(report.models.len(), 1);
        assert_eq!(report.skipped[0].reason, "no locations resolved");
    }

    #[test]
    fn backend_failures_abort_the_build() {
        let resolver = FakeResolver {
            broken: vec!["b".to_string()],
            ..FakeResolver::default()
        };
        let error = build_dispatch_models(&flat(&["a", "b"]), &resolver, &options("", true, None))
            .expect_err("build should fail");
        assert!(matches!(error, DispatchError::Resolver(_)));
    }
}
