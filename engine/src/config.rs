use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::AppError;

const ENV_PREFIX: &str = "PHISHSHIELD";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub artifacts: ArtifactPaths,
    pub eager_load: bool,
    pub block_threshold: u8,
}

/// Locations of the three model artifacts.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub label_encoder: PathBuf,
    pub feature_names: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model: dir.join("url_phishshield.json"),
            label_encoder: dir.join("label_encoder.json"),
            feature_names: dir.join("feature_names.json"),
        }
    }

    pub fn all(&self) -> [&Path; 3] {
        [
            self.model.as_path(),
            self.label_encoder.as_path(),
            self.feature_names.as_path(),
        ]
    }
}

impl Config {
    /// Defaults, then `phishshield.{toml,yaml,json}` if present, then
    /// `PHISHSHIELD_*` environment variables.
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(None)
    }

    pub fn load_from(file: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .set_default("bind_addr", "0.0.0.0:5000")?
            .set_default("artifacts.model", "artifacts/url_phishshield.json")?
            .set_default("artifacts.label_encoder", "artifacts/label_encoder.json")?
            .set_default("artifacts.feature_names", "artifacts/feature_names.json")?
            .set_default("eager_load", true)?
            .set_default("block_threshold", 80)?;

        builder = match file {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(config::File::with_name("phishshield").required(false)),
        };

        let config: Config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}
