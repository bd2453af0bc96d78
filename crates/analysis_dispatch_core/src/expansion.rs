use crate::contract::{DispatchModel, FileLocation, ParameterSet};

/// Locations one task reads, before parameters are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationBinding {
    pub s3_location: Vec<String>,
    pub file_location: Option<Vec<FileLocation>>,
    pub asset_id: Option<Vec<String>>,
    pub asset_name: Option<Vec<String>>,
}

impl LocationBinding {
    pub fn into_model(self, parameters: Option<&ParameterSet>) -> DispatchModel {
        DispatchModel::new(self.s3_location, self.file_location, parameters.cloned())
            .with_assets(self.asset_id, self.asset_name)
    }
}

/// Cross product of one binding with the parameter sets.
///
/// Absent or empty sets yield exactly one unparameterized model. Sets are
/// applied in list order and duplicates are kept.
pub fn expand_parameters(
    binding: &LocationBinding,
    parameter_sets: Option<&[ParameterSet]>,
) -> Vec<DispatchModel> {
    match parameter_sets {
        Some(sets) if !sets.is_empty() => sets
            .iter()
            .map(|parameters| binding.clone().into_model(Some(parameters)))
            .collect(),
        _ => vec![binding.clone().into_model(None)],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn binding() -> LocationBinding {
        LocationBinding {
            s3_location: vec!["s3://bucket/a".to_string()],
            file_location: None,
            asset_id: Some(vec!["asset-a".to_string()]),
            asset_name: None,
        }
    }

    #[test]
    fn no_parameter_sets_yield_one_bare_model() {
        let models = expand_parameters(&binding(), None);
        assert_eq!(models.len(), 1);
        assert!(models[0].distributed_parameters().is_none());

        let models = expand_parameters(&binding(), Some(&[]));
        assert_eq!(models.len(), 1);
    }

    #[test]
    fn parameter_sets_expand_in_order_and_keep_duplicates() {
        let sets = vec![
            ParameterSet::from([("alpha".to_string(), json!(1))]),
            ParameterSet::from([("alpha".to_string(), json!(2))]),
            ParameterSet::from([("alpha".to_string(), json!(1))]),
        ];
        let models = expand_parameters(&binding(), Some(&sets));
        let alphas: Vec<_> = models
            .iter()
            .map(|model| model.distributed_parameters().expect("parameters")["alpha"].clone())
            .collect();
        assert_eq!(alphas, vec![json!(1), json!(2), json!(1)]);
        assert!(models
            .iter()
            .all(|model| model.asset_id() == Some(&["asset-a".to_string()][..])));
        assert_eq!(models[0].fingerprint(), models[2].fingerprint());
    }
}
