use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ModelRegistry, RegistrationModel};
use crate::error::{Error, Result};

/// A trained model on disk: its hyper-parameters, including the model
/// `class`, and its weights.
///
/// Stored as JSON:
/// `{"hyper_parameters": {"class": "nearest_svd", ...}, "state_dict": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub hyper_parameters: Map<String, Value>,
    #[serde(default)]
    pub state_dict: Value,
}

impl Checkpoint {
    /// Reads a checkpoint. The path of the file is added to the
    /// hyper-parameters under `checkpoint`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let buffer = BufReader::new(File::open(path)?);
        let mut checkpoint: Checkpoint = serde_json::from_reader(buffer)
            .map_err(|err| Error::parser(format!("{}: {err}", path.display())))?;

        checkpoint.class()?;
        checkpoint.hyper_parameters.insert(
            "checkpoint".to_string(),
            Value::String(path.display().to_string()),
        );
        Ok(checkpoint)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), self)?;
        Ok(())
    }

    /// The model class named by the hyper-parameters.
    pub fn class(&self) -> Result<&str> {
        self.hyper_parameters
            .get("class")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::parser("checkpoint hyper-parameters have no `class`"))
    }

    pub fn build(&self, registry: &ModelRegistry) -> Result<Box<dyn RegistrationModel>> {
        registry.build(
            self.class()?,
            &Value::Object(self.hyper_parameters.clone()),
        )
    }
}

/// Loads a checkpoint and builds the model it describes.
pub fn load_from_checkpoint<P: AsRef<Path>>(
    path: P,
    registry: &ModelRegistry,
) -> Result<Box<dyn RegistrationModel>> {
    let checkpoint = Checkpoint::load(path)?;
    let model = checkpoint.build(registry)?;
    tracing::info!(class = checkpoint.class()?, "model loaded");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn sample_checkpoint() -> Checkpoint {
        let json = json!({
            "hyper_parameters": {"class": "nearest_svd", "iterations": 5, "sigma": 0.5},
            "state_dict": {"layer.weight": [0.5, 1.5]}
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.ckpt");

        let checkpoint = sample_checkpoint();
        checkpoint.save(&path).unwrap();

        let loaded = Checkpoint::load(&path).unwrap();
        assert_eq!(loaded.class().unwrap(), "nearest_svd");
        assert_eq!(loaded.state_dict, checkpoint.state_dict);
        assert_eq!(
            loaded.hyper_parameters["checkpoint"],
            json!(path.display().to_string())
        );
        assert_eq!(loaded.hyper_parameters["iterations"], json!(5));
    }

    #[test]
    fn test_load_from_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.ckpt");
        sample_checkpoint().save(&path).unwrap();

        let model = load_from_checkpoint(&path, &ModelRegistry::default()).unwrap();
        assert_eq!(model.name(), "nearest_svd");
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Checkpoint::load("does/not/exist.ckpt"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_corrupt_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"hyper_parameters\": ").unwrap();
        assert!(matches!(Checkpoint::load(file.path()), Err(Error::Parser(_))));
    }

    #[test]
    fn test_missing_class() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"hyper_parameters\": {{\"sigma\": 1.0}}}}").unwrap();
        assert!(matches!(Checkpoint::load(file.path()), Err(Error::Parser(_))));
    }
}
