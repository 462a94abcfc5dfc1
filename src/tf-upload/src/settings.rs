//! Deployment settings.
//!
//! Defaults match the Lambda package layout. Each value can be overridden by
//! an optional TOML file and then by `TF_UPLOAD_*` environment variables,
//! e.g. `TF_UPLOAD_BUCKET=my-audit-bucket`.

use std::env;
use std::path::{Path, PathBuf};

use ::config::{Config, Environment, File};
use serde::Deserialize;

use crate::{Archiver, Normalization, ObjectStore, Result};

/// Environment variable naming the optional settings file.
pub const CONFIG_PATH_VAR: &str = "TF_UPLOAD_CONFIG";

pub const DEFAULT_CONFIG_PATH: &str = "tf-upload.toml";

pub const ENV_PREFIX: &str = "TF_UPLOAD";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    /// TensorFlow SavedModel export directory
    pub model_dir: PathBuf,

    /// JSON class index: `{"0": ["n01440764", "tench"], ...}`
    pub class_index: PathBuf,

    /// Bucket receiving the audit copy of every upload
    pub bucket: String,

    /// Serving signature of the SavedModel
    pub signature: String,

    pub normalization: Normalization,

    /// Number of predictions decoded per image
    pub top_k: usize,

    pub archive_enabled: bool,
}

impl Settings {
    /// Settings from the file named by `TF_UPLOAD_CONFIG` (if any) and the
    /// environment.
    pub fn load() -> Result<Self> {
        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
        Self::from_file(Path::new(&path))
    }

    /// Settings from `path` and the environment. A missing file is not an
    /// error.
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .set_default("model_dir", "/var/task/mobilenetv2")?
            .set_default("class_index", "/var/task/imagenet_class_index.json")?
            .set_default("bucket", "request-image-not-encrypted")?
            .set_default("signature", "serving_default")?
            .set_default("normalization", "mobilenet")?
            .set_default("top_k", 5_i64)?
            .set_default("archive_enabled", true)?
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Archiver for the configured bucket, unless archiving is disabled.
    pub fn archiver<S: ObjectStore>(&self, store: S) -> Option<Archiver<S>> {
        self.archive_enabled
            .then(|| Archiver::new(store, self.bucket.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use std::io::Write;

    #[test]
    fn defaults_match_lambda_layout() {
        let settings = Settings::from_file(Path::new("/nonexistent/tf-upload.toml")).unwrap();

        assert_eq!(settings.model_dir, PathBuf::from("/var/task/mobilenetv2"));
        assert_eq!(
            settings.class_index,
            PathBuf::from("/var/task/imagenet_class_index.json")
        );
        assert_eq!(settings.bucket, "request-image-not-encrypted");
        assert_eq!(settings.signature, "serving_default");
        assert_eq!(settings.normalization, Normalization::MobileNet);
        assert_eq!(settings.top_k, 5);
        assert!(settings.archive_enabled);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "bucket = \"audit-bucket\"\nnormalization = \"unit\"\narchive_enabled = false\ntop_k = 10"
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();

        assert_eq!(settings.bucket, "audit-bucket");
        assert_eq!(settings.normalization, Normalization::Unit);
        assert_eq!(settings.top_k, 10);
        assert!(!settings.archive_enabled);
        assert!(settings.archiver(MemoryStore::new()).is_none());
    }

    #[test]
    fn archiver_uses_configured_bucket() {
        let settings = Settings::from_file(Path::new("/nonexistent/tf-upload.toml")).unwrap();
        let archiver = settings.archiver(MemoryStore::new()).unwrap();

        assert_eq!(archiver.bucket(), "request-image-not-encrypted");
    }
}
