use serde::Deserialize;

use crate::{error::InferenceError, models::deserialize_labels, models::ModelCapability};

pub const PHISHING_ALIASES: [&str; 6] = ["phishing", "phish", "malicious", "fraud", "spam", "bad"];
pub const LEGIT_ALIASES: [&str; 6] = ["legit", "legitimate", "benign", "safe", "good", "clean"];

/// Maps the classifier's integer class indices to readable names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelEncoder {
    #[serde(deserialize_with = "deserialize_labels")]
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new<S: Into<String>>(classes: impl IntoIterator<Item = S>) -> Self {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn inverse_transform(&self, index: usize) -> Result<&str, InferenceError> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(InferenceError::LabelOutOfRange {
                index,
                len: self.classes.len(),
            })
    }
}

/// Encoder classes when the encoder has any, else the model's own labels.
pub fn class_list(encoder: Option<&LabelEncoder>, model: &ModelCapability) -> Vec<String> {
    match encoder {
        Some(le) if !le.classes().is_empty() => le.classes().to_vec(),
        _ => model.classes().to_vec(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateRule {
    PhishingAlias,
    LegitComplement,
    LastIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhishingClass {
    pub index: usize,
    pub rule: LocateRule,
}

fn is_alias(label: &str, aliases: &[&str]) -> bool {
    let label = label.trim().to_lowercase();
    aliases.contains(&label.as_str())
}

/// Picks the class index that means "phishing":
/// 1. first label that is a phishing alias;
/// 2. with exactly two labels, the one that is not a legit alias;
/// 3. the last label, or index 1 when there are no labels.
pub fn locate_phishing_class(classes: &[String]) -> PhishingClass {
    if let Some(index) = classes.iter().position(|c| is_alias(c, &PHISHING_ALIASES)) {
        return PhishingClass {
            index,
            rule: LocateRule::PhishingAlias,
        };
    }

    if classes.len() == 2 {
        if let Some(legit) = classes.iter().position(|c| is_alias(c, &LEGIT_ALIASES)) {
            return PhishingClass {
                index: 1 - legit,
                rule: LocateRule::LegitComplement,
            };
        }
    }

    let index = match classes.len() {
        0 => 1,
        n => n - 1,
    };
    PhishingClass {
        index,
        rule: LocateRule::LastIndex,
    }
}
