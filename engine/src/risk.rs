use serde::{Deserialize, Serialize};

/// Phishing probability as a whole percentage. Out-of-range input is
/// clamped; halves round to even, so 0.125 scores 12.
pub fn risk_percent(prob_phish: f64) -> u8 {
    // f64::max/min discard NaN, which therefore scores 0
    let p = prob_phish.max(0.0).min(1.0);
    (p * 100.0).round_ties_even() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Medium,
    Elevated,
    High,
}

impl RiskBand {
    pub fn from_percent(percent: u8) -> Self {
        match percent {
            0..=24 => RiskBand::Low,
            25..=49 => RiskBand::Medium,
            50..=74 => RiskBand::Elevated,
            _ => RiskBand::High,
        }
    }
}

/// Block only confident predictions whose label is literally "phishing".
pub fn should_block(percent: u8, label_pred: &str, threshold: u8) -> bool {
    percent >= threshold && label_pred.to_lowercase() == "phishing"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_percent_bounds() {
        assert_eq!(risk_percent(0.5), 50);
        assert_eq!(risk_percent(1.2), 100);
        assert_eq!(risk_percent(-0.3), 0);
        assert_eq!(risk_percent(0.0), 0);
        assert_eq!(risk_percent(1.0), 100);
        assert_eq!(risk_percent(f64::NAN), 0);
        assert_eq!(risk_percent(f64::INFINITY), 100);
    }

    #[test]
    fn test_risk_percent_rounding() {
        assert_eq!(risk_percent(0.734), 73);
        assert_eq!(risk_percent(0.736), 74);
        assert_eq!(risk_percent(0.125), 12);
        assert_eq!(risk_percent(0.375), 38);
    }

    #[test]
    fn test_bands() {
        assert_eq!(RiskBand::from_percent(0), RiskBand::Low);
        assert_eq!(RiskBand::from_percent(24), RiskBand::Low);
        assert_eq!(RiskBand::from_percent(25), RiskBand::Medium);
        assert_eq!(RiskBand::from_percent(50), RiskBand::Elevated);
        assert_eq!(RiskBand::from_percent(75), RiskBand::High);
        assert_eq!(RiskBand::from_percent(100), RiskBand::High);
    }

    #[test]
    fn test_should_block() {
        assert!(should_block(80, "Phishing", 80));
        assert!(!should_block(79, "phishing", 80));
        assert!(!should_block(95, "malicious", 80));
    }
}
