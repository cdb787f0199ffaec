//! Risk Thresholds
//!
//! Maps a model probability to a discrete risk category. The bands are fixed
//! constants; callers cannot override them per request.

use serde::{Deserialize, Serialize};

use crate::constants::{ALERT_MAX_PROBABILITY, SAFE_MAX_PROBABILITY};

/// Risk category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    /// Safe: p <= 0.4
    Aman,
    /// Alert: 0.4 < p <= 0.7
    Siaga,
    /// Danger: p > 0.7
    Awas,
}

impl RiskCategory {
    pub fn from_probability(probability: f32) -> Self {
        if probability > ALERT_MAX_PROBABILITY {
            RiskCategory::Awas
        } else if probability > SAFE_MAX_PROBABILITY {
            RiskCategory::Siaga
        } else {
            RiskCategory::Aman
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Aman => "Aman",
            RiskCategory::Siaga => "Siaga",
            RiskCategory::Awas => "Awas",
        }
    }

    /// Anything above the safe band
    pub fn is_elevated(&self) -> bool {
        !matches!(self, RiskCategory::Aman)
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probability in [0, 1] as a percentage rounded to 2 decimals
pub fn to_percentage(probability: f32) -> f64 {
    (probability as f64 * 10_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(RiskCategory::from_probability(0.0), RiskCategory::Aman);
        assert_eq!(RiskCategory::from_probability(0.4), RiskCategory::Aman);
        assert_eq!(RiskCategory::from_probability(0.40001), RiskCategory::Siaga);
        assert_eq!(RiskCategory::from_probability(0.7), RiskCategory::Siaga);
        assert_eq!(RiskCategory::from_probability(0.70001), RiskCategory::Awas);
        assert_eq!(RiskCategory::from_probability(1.0), RiskCategory::Awas);
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(serde_json::to_string(&RiskCategory::Siaga).unwrap(), "\"Siaga\"");
        assert_eq!(RiskCategory::Awas.to_string(), "Awas");
        assert!(!RiskCategory::Aman.is_elevated());
        assert!(RiskCategory::Siaga.is_elevated());
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(to_percentage(0.4), 40.0);
        assert_eq!(to_percentage(0.123456), 12.35);
        assert_eq!(to_percentage(0.0), 0.0);
        assert_eq!(to_percentage(1.0), 100.0);
    }
}
