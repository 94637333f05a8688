use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;

/// Ordered feature names the classifier was trained on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema(Vec<String>);

/// Model input ordered per schema, plus the schema columns that had to be
/// zero-filled because extraction no longer produces them.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFeatures {
    pub values: Vec<f64>,
    pub missing: Vec<String>,
}

impl AlignedFeatures {
    pub fn drifted(&self) -> bool {
        !self.missing.is_empty()
    }
}

impl FeatureSchema {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn align(&self, features: &FeatureVector) -> AlignedFeatures {
        let mut missing = Vec::new();
        let values = self
            .0
            .iter()
            .map(|name| {
                features.get(name).unwrap_or_else(|| {
                    missing.push(name.clone());
                    0.0
                })
            })
            .collect();

        AlignedFeatures { values, missing }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{extract_features, FEATURE_NAMES};

    #[test]
    fn test_align_reorders_to_schema() {
        let features = extract_features("https://secure-login.example.co.uk");
        let schema = FeatureSchema::new(["keywords_count", "https", "url_length"]);
        let aligned = schema.align(&features);
        assert_eq!(aligned.values, vec![2.0, 1.0, 34.0]);
        assert!(!aligned.drifted());
    }

    #[test]
    fn test_full_schema_matches_extraction_order() {
        let features = extract_features("http://a-b.c.d/1");
        let aligned = FeatureSchema::new(FEATURE_NAMES).align(&features);
        let expected: Vec<f64> = features.iter().map(|(_, v)| v).collect();
        assert_eq!(aligned.values, expected);
    }

    #[test]
    fn test_unknown_columns_zero_filled_and_reported() {
        let features = extract_features("https://example.com");
        let schema = FeatureSchema::new(["num_dots", "domain_age_days", "https", "has_ip"]);
        let aligned = schema.align(&features);
        assert_eq!(aligned.values, vec![1.0, 0.0, 1.0, 0.0]);
        assert_eq!(aligned.missing, vec!["domain_age_days", "has_ip"]);
        assert!(aligned.drifted());
    }

    #[test]
    fn test_schema_deserializes_from_json_array() {
        let schema: FeatureSchema = serde_json::from_str(r#"["url_length","https"]"#).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.names()[1], "https");
    }
}
