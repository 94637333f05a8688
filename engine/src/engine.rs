use std::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    artifacts::{ArtifactBundle, ArtifactLoader},
    classes::{class_list, locate_phishing_class},
    error::AppError,
    features::extract_features,
    resolver::resolve_probabilities,
    risk::{risk_percent, should_block, RiskBand},
    types::PredictionResult,
};

/// Request-facing entry point: validates input, makes sure artifacts are
/// resident, then runs the inference pipeline.
pub struct PhishEngine {
    loader: ArtifactLoader,
    block_threshold: u8,
}

impl PhishEngine {
    pub fn new(loader: ArtifactLoader, block_threshold: u8) -> Self {
        Self {
            loader,
            block_threshold,
        }
    }

    pub fn loader(&self) -> &ArtifactLoader {
        &self.loader
    }

    pub async fn predict(&self, url: Option<&str>) -> Result<PredictionResult, AppError> {
        let start = Instant::now();

        let result = match validate_url(url) {
            Ok(url) => match self.loader.load().await {
                Ok(bundle) => predict(bundle, url, self.block_threshold),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(r) => {
                metrics::counter!("predictions_total").increment(1);
                info!(
                    url = %r.url,
                    risk_percent = r.risk_percent,
                    label = %r.label_pred,
                    "Prediction completed in {:.1}ms",
                    elapsed_ms
                );
            }
            Err(e) => {
                metrics::counter!("prediction_errors_total", "kind" => e.kind()).increment(1);
            }
        }
        metrics::histogram!("prediction_duration_ms").record(elapsed_ms);

        result
    }
}

pub fn validate_url(url: Option<&str>) -> Result<&str, AppError> {
    match url {
        Some(url) if !url.is_empty() => Ok(url),
        _ => Err(AppError::MissingUrl),
    }
}

/// Runs the full pipeline for one URL against loaded artifacts.
pub fn predict(
    bundle: &ArtifactBundle,
    url: &str,
    block_threshold: u8,
) -> Result<PredictionResult, AppError> {
    let features = extract_features(url);

    let aligned = bundle.schema.align(&features);
    if aligned.drifted() {
        warn!(
            missing = ?aligned.missing,
            "Model expects features extraction does not produce; filling with 0"
        );
        metrics::counter!("schema_drift_fallbacks_total").increment(1);
    }

    let resolution =
        resolve_probabilities(&bundle.model, &aligned.values).map_err(AppError::UninferableModel)?;

    let classes = class_list(bundle.label_encoder.as_ref(), &bundle.model);
    let phishing = locate_phishing_class(&classes);
    let dist = &resolution.distribution;
    let prob_phish = dist
        .get(phishing.index)
        .or_else(|| dist.last())
        .copied()
        .unwrap_or(0.0);

    debug!(
        source = resolution.source.as_str(),
        phishing_index = phishing.index,
        rule = ?phishing.rule,
        ?dist,
        "Resolved class distribution"
    );

    let label_pred = predicted_label(bundle, &aligned.values)?;
    let risk_percent = risk_percent(prob_phish);

    Ok(PredictionResult {
        url: url.to_string(),
        classes,
        prob_phish,
        risk_percent,
        risk_band: RiskBand::from_percent(risk_percent),
        block_recommended: should_block(risk_percent, &label_pred, block_threshold),
        label_pred,
        features,
    })
}

// The encoder names the class when present; otherwise the model's own
// label, or the bare index if the model has none.
fn predicted_label(bundle: &ArtifactBundle, x: &[f64]) -> Result<String, AppError> {
    let index = bundle.model.predict(x).map_err(AppError::ModelInference)?;
    match &bundle.label_encoder {
        Some(le) => le
            .inverse_transform(index)
            .map(str::to_string)
            .map_err(AppError::ModelInference),
        None => Ok(bundle
            .model
            .classes()
            .get(index)
            .cloned()
            .unwrap_or_else(|| index.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classes::LabelEncoder, config::ArtifactPaths, models::ClassifierArtifact,
        schema::FeatureSchema,
    };

    fn bundle(model_json: &str, encoder: Option<&[&str]>, schema: &[&str]) -> ArtifactBundle {
        ArtifactBundle {
            model: serde_json::from_str::<ClassifierArtifact>(model_json)
                .unwrap()
                .into_capability()
                .unwrap(),
            label_encoder: encoder.map(|c| LabelEncoder::new(c.iter().copied())),
            schema: FeatureSchema::new(schema.iter().copied()),
        }
    }

    // phishing probability rises with keyword hits
    const KEYWORD_MODEL: &str =
        r#"{"kind":"logistic_regression","coef":[[0.0,2.0]],"intercept":[-2.0]}"#;

    #[test]
    fn test_pipeline_with_encoder() {
        let b = bundle(
            KEYWORD_MODEL,
            Some(&["legit", "phishing"]),
            &["https", "keywords_count"],
        );
        let r = predict(&b, "http://secure-login.bank-verify.example/account", 80).unwrap();

        assert_eq!(r.classes, vec!["legit", "phishing"]);
        assert_eq!(r.features.keywords_count, 5);
        let expected = 1.0 / (1.0 + (-8.0f64).exp());
        assert!((r.prob_phish - expected).abs() < 1e-12);
        assert_eq!(r.risk_percent, 100);
        assert_eq!(r.risk_band, RiskBand::High);
        assert_eq!(r.label_pred, "phishing");
        assert!(r.block_recommended);
    }

    #[test]
    fn test_pipeline_benign_url() {
        let b = bundle(
            KEYWORD_MODEL,
            Some(&["legit", "phishing"]),
            &["https", "keywords_count"],
        );
        let r = predict(&b, "https://example.org", 80).unwrap();
        assert_eq!(r.risk_percent, 12);
        assert_eq!(r.risk_band, RiskBand::Low);
        assert_eq!(r.label_pred, "legit");
        assert!(!r.block_recommended);
    }

    #[test]
    fn test_schema_drift_is_zero_filled() {
        let b = bundle(
            r#"{"kind":"logistic_regression","coef":[[5.0,0.0]],"intercept":[0.0]}"#,
            None,
            &["page_rank", "url_length"],
        );
        let r = predict(&b, "https://example.org/a/very/long/path", 80).unwrap();
        assert_eq!(r.prob_phish, 0.5);
        assert_eq!(r.risk_percent, 50);
    }

    #[test]
    fn test_label_falls_back_to_model_classes_then_index() {
        let b = bundle(
            r#"{"kind":"nearest_centroid","centroids":[[0.0],[1.0]],"classes":["good","bad"]}"#,
            None,
            &["https"],
        );
        let r = predict(&b, "https://example.org", 80).unwrap();
        assert_eq!(r.label_pred, "bad");
        assert_eq!(r.classes, vec!["good", "bad"]);
        assert_eq!(r.prob_phish, 1.0);

        let b = bundle(
            r#"{"kind":"nearest_centroid","centroids":[[0.0],[1.0]]}"#,
            None,
            &["https"],
        );
        let r = predict(&b, "http://example.org", 80).unwrap();
        assert_eq!(r.label_pred, "0");
        assert!(r.classes.is_empty());
        // no labels: index 1 of the one-hot [1, 0]
        assert_eq!(r.prob_phish, 0.0);
    }

    #[test]
    fn test_short_distribution_uses_last_probability() {
        let b = bundle(
            r#"{"kind":"linear_svm","coef":[[1.0]],"intercept":[0.0]}"#,
            Some(&["a", "b", "c", "d"]),
            &["https"],
        );
        // locator picks index 3, distribution only has two entries
        let r = predict(&b, "https://example.org", 80).unwrap();
        let expected = 1.0 / (1.0 + (-1.0f64).exp());
        assert!((r.prob_phish - expected).abs() < 1e-12);
        assert_eq!(r.label_pred, "b");
    }

    #[test]
    fn test_encoder_shorter_than_model_is_inference_error() {
        let b = bundle(
            r#"{"kind":"nearest_centroid","centroids":[[0.0],[1.0]]}"#,
            Some(&["only"]),
            &["https"],
        );
        assert!(matches!(
            predict(&b, "https://example.org", 80),
            Err(AppError::ModelInference(_))
        ));
    }

    #[test]
    fn test_probability_and_percent_bounds() {
        let b = bundle(KEYWORD_MODEL, None, &["url_length", "keywords_count"]);
        for url in ["", "x", "https://free-paypal-login.example", "::::", "http://[::1]:80/"] {
            let r = predict(&b, url, 80).unwrap();
            assert!((0.0..=1.0).contains(&r.prob_phish), "{}", url);
            assert!(r.risk_percent <= 100, "{}", url);
        }
    }

    #[test]
    fn test_validate_url() {
        assert!(matches!(validate_url(None), Err(AppError::MissingUrl)));
        assert!(matches!(validate_url(Some("")), Err(AppError::MissingUrl)));
        assert_eq!(validate_url(Some("https://a.b")).unwrap(), "https://a.b");
    }

    #[tokio::test]
    async fn test_missing_url_does_not_load_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PhishEngine::new(ArtifactLoader::new(ArtifactPaths::in_dir(dir.path())), 80);
        assert!(matches!(engine.predict(Some("")).await, Err(AppError::MissingUrl)));
        assert!(matches!(
            engine.predict(Some("https://example.org")).await,
            Err(AppError::ArtifactMissing { .. })
        ));
        assert!(!engine.loader().is_loaded());
    }
}
