//! URL phishing classifier: lexical feature extraction, schema alignment,
//! tiered probability resolution and risk scoring over a pre-trained model.

pub mod artifacts;
pub mod classes;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod models;
pub mod resolver;
pub mod risk;
pub mod routes;
pub mod schema;
pub mod types;

pub use artifacts::{ArtifactBundle, ArtifactLoader};
pub use config::{ArtifactPaths, Config};
pub use engine::{predict, PhishEngine};
pub use error::{AppError, InferenceError};
pub use features::{extract_features, FeatureVector};
pub use types::PredictionResult;
