use std::collections::BTreeMap;

use serde_json::Value;

use super::{IdentityModel, NearestSvdConfig, NearestSvdModel, RegistrationModel};
use crate::error::{Error, Result};

/// Builds a model from its hyper-parameters.
pub type ModelFactory = fn(&Value) -> Result<Box<dyn RegistrationModel>>;

/// Maps model class names to the factories that build them.
///
/// `ModelRegistry::default()` knows the built-in `identity` and
/// `nearest_svd` classes.
#[derive(Clone)]
pub struct ModelRegistry {
    factories: BTreeMap<String, ModelFactory>,
}

fn build_identity(_hparams: &Value) -> Result<Box<dyn RegistrationModel>> {
    Ok(Box::new(IdentityModel))
}

fn build_nearest_svd(hparams: &Value) -> Result<Box<dyn RegistrationModel>> {
    let config: NearestSvdConfig = serde_json::from_value(hparams.clone())
        .map_err(|err| Error::invalid_argument(format!("nearest_svd hyper-parameters: {err}")))?;
    Ok(Box::new(NearestSvdModel::new(config)?))
}

impl ModelRegistry {
    /// A registry without any class.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn register(&'_ mut self, class: &str, factory: ModelFactory) -> &'_ mut ModelRegistry {
        self.factories.insert(class.to_string(), factory);
        self
    }

    pub fn contains(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Builds a model of the given class. Fails with
    /// [`Error::InvalidArgument`] if the class is unknown or the
    /// hyper-parameters don't fit it.
    pub fn build(&self, class: &str, hparams: &Value) -> Result<Box<dyn RegistrationModel>> {
        let factory = self.factories.get(class).ok_or_else(|| {
            Error::invalid_argument(format!(
                "unknown model class `{class}`, known classes: {}",
                self.classes().collect::<Vec<_>>().join(", ")
            ))
        })?;
        factory(hparams)
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register("identity", build_identity)
            .register("nearest_svd", build_nearest_svd);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builds_known_classes() {
        let registry = ModelRegistry::default();
        assert_eq!(registry.classes().collect::<Vec<_>>(), vec!["identity", "nearest_svd"]);

        let model = registry
            .build("nearest_svd", &json!({"class": "nearest_svd", "iterations": 3}))
            .unwrap();
        assert_eq!(model.name(), "nearest_svd");
        assert_eq!(registry.build("identity", &json!({})).unwrap().name(), "identity");
    }

    #[test]
    fn test_rejects_unknown_class() {
        let registry = ModelRegistry::default();
        assert!(matches!(
            registry.build("DeepGMR", &json!({})),
            Err(Error::InvalidArgument(_))
        ));
        assert!(ModelRegistry::empty().build("identity", &json!({})).is_err());
    }

    #[test]
    fn test_rejects_bad_hyper_parameters() {
        let registry = ModelRegistry::default();
        assert!(registry
            .build("nearest_svd", &json!({"iterations": "many"}))
            .is_err());
    }

    #[test]
    fn test_custom_class() {
        let mut registry = ModelRegistry::empty();
        registry.register("mine", |_| Ok(Box::new(IdentityModel) as Box<dyn RegistrationModel>));
        assert!(registry.contains("mine"));
        assert!(registry.build("mine", &Value::Null).is_ok());
    }
}
