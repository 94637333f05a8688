//! Turns whatever the classifier can do into a class distribution.
//!
//! Tiers are tried in order: class probabilities, then a binary decision
//! margin squashed through the logistic function, then a one-hot vector
//! from the hard prediction. A tier only gives way to the next on a typed
//! [`InferenceError`]; the last tier's error is returned to the caller.

use tracing::warn;

use crate::{
    error::InferenceError,
    models::{DecisionScore, ModelCapability},
};

const SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbabilitySource {
    Probabilities,
    DecisionMargin,
    HardLabel,
}

impl ProbabilitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbabilitySource::Probabilities => "probabilities",
            ProbabilitySource::DecisionMargin => "decision_margin",
            ProbabilitySource::HardLabel => "hard_label",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub distribution: Vec<f64>,
    pub source: ProbabilitySource,
}

pub fn resolve_probabilities(
    model: &ModelCapability,
    x: &[f64],
) -> Result<Resolution, InferenceError> {
    match model {
        ModelCapability::Probabilistic(m) => {
            match m.predict_proba(x).and_then(validate_distribution) {
                Ok(distribution) => {
                    return Ok(Resolution {
                        distribution,
                        source: ProbabilitySource::Probabilities,
                    })
                }
                Err(e) => demoted(ProbabilitySource::Probabilities, &e),
            }
        }
        ModelCapability::Scored(m) => match m.decision_function(x).and_then(margin_distribution) {
            Ok(distribution) => {
                return Ok(Resolution {
                    distribution,
                    source: ProbabilitySource::DecisionMargin,
                })
            }
            Err(e) => demoted(ProbabilitySource::DecisionMargin, &e),
        },
        ModelCapability::HardLabel(_) => {}
    }

    let predicted = model.predict(x)?;
    Ok(Resolution {
        distribution: one_hot(predicted),
        source: ProbabilitySource::HardLabel,
    })
}

fn demoted(tier: ProbabilitySource, reason: &InferenceError) {
    warn!(tier = tier.as_str(), %reason, "Inference tier failed, falling back");
    metrics::counter!("capability_fallbacks_total", "tier" => tier.as_str()).increment(1);
}

fn validate_distribution(distribution: Vec<f64>) -> Result<Vec<f64>, InferenceError> {
    if distribution.is_empty() {
        return Err(InferenceError::InvalidDistribution("empty".into()));
    }
    if let Some(p) = distribution.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(InferenceError::InvalidDistribution(format!(
            "probability {} outside [0, 1]",
            p
        )));
    }
    let total: f64 = distribution.iter().sum();
    if (total - 1.0).abs() > SUM_TOLERANCE {
        return Err(InferenceError::InvalidDistribution(format!(
            "probabilities sum to {}",
            total
        )));
    }
    Ok(distribution)
}

fn margin_distribution(score: DecisionScore) -> Result<Vec<f64>, InferenceError> {
    match score {
        DecisionScore::Margin(m) if m.is_finite() => {
            let p1 = 1.0 / (1.0 + (-m).exp());
            Ok(vec![1.0 - p1, p1])
        }
        DecisionScore::Margin(m) => Err(InferenceError::NonFiniteMargin(m)),
        DecisionScore::PerClass(scores) => Err(InferenceError::MulticlassMargin(scores.len())),
    }
}

// index 0 stays [1, 0]; anything else is reported as the positive class
fn one_hot(predicted: usize) -> Vec<f64> {
    if predicted == 0 {
        vec![1.0, 0.0]
    } else {
        vec![0.0, 1.0]
    }
}
