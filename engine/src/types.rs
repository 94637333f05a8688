use serde::{Deserialize, Serialize};

use crate::{features::FeatureVector, risk::RiskBand};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub url: Option<String>,
}

impl PredictRequest {
    /// Lenient body parsing: anything that is not a JSON object with a
    /// string `url` is treated as a request without a URL.
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub url: String,
    pub classes: Vec<String>,
    pub prob_phish: f64,
    pub risk_percent: u8,
    pub risk_band: RiskBand,
    pub label_pred: String,
    pub block_recommended: bool,
    pub features: FeatureVector,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub encoder: String,
    pub features: String,
    pub loaded: bool,
}
