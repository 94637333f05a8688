use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::{
    classes::LabelEncoder,
    config::ArtifactPaths,
    error::{artifact_invalid, AppError},
    models::{ClassifierArtifact, ModelCapability},
    schema::FeatureSchema,
    types::HealthResponse,
};

/// The three model artifacts, read-only once loaded.
#[derive(Debug)]
pub struct ArtifactBundle {
    pub model: ModelCapability,
    pub label_encoder: Option<LabelEncoder>,
    pub schema: FeatureSchema,
}

impl ArtifactBundle {
    pub async fn load(paths: &ArtifactPaths) -> Result<Self, AppError> {
        let artifact: ClassifierArtifact = read_json(&paths.model).await?;
        let model = artifact
            .into_capability()
            .map_err(|reason| artifact_invalid(&paths.model, reason))?;

        // the encoder file may hold `null` when the model carries its own labels
        let label_encoder: Option<LabelEncoder> = read_json(&paths.label_encoder).await?;

        let schema: FeatureSchema = read_json(&paths.feature_names).await?;
        if schema.is_empty() {
            return Err(artifact_invalid(&paths.feature_names, "feature list is empty"));
        }
        if let Some(width) = model.n_features() {
            if width != schema.len() {
                return Err(artifact_invalid(
                    &paths.feature_names,
                    format!(
                        "{} feature names for a model fitted on {} features",
                        schema.len(),
                        width
                    ),
                ));
            }
        }

        info!(
            tier = model.tier(),
            classes = model.classes().len(),
            features = schema.len(),
            encoder = label_encoder.is_some(),
            "Loaded model artifacts"
        );

        Ok(Self {
            model,
            label_encoder,
            schema,
        })
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::ArtifactMissing {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&content).map_err(|e| artifact_invalid(path, e))
}

/// Loads the artifact bundle at most once per process. A failed attempt
/// leaves nothing cached, so a later call retries.
pub struct ArtifactLoader {
    paths: ArtifactPaths,
    bundle: OnceCell<ArtifactBundle>,
}

impl ArtifactLoader {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self {
            paths,
            bundle: OnceCell::new(),
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    pub async fn load(&self) -> Result<&ArtifactBundle, AppError> {
        self.bundle
            .get_or_try_init(|| async {
                ArtifactBundle::load(&self.paths).await.map_err(|e| {
                    warn!("Artifact load failed: {}", e);
                    e
                })
            })
            .await
    }

    pub fn is_loaded(&self) -> bool {
        self.bundle.initialized()
    }

    /// Reports whether the backing files exist. Never triggers a load.
    pub fn health(&self) -> HealthResponse {
        let present = self.paths.all().iter().all(|p| p.exists());
        HealthResponse {
            status: if present { "ok" } else { "missing_artifacts" }.to_string(),
            model: file_name(&self.paths.model),
            encoder: file_name(&self.paths.label_encoder),
            features: file_name(&self.paths.feature_names),
            loaded: self.is_loaded(),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
