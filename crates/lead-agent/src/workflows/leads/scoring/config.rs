use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::super::domain::ScoringFactor;

pub const DEFAULT_QUALIFICATION_THRESHOLD: f64 = 70.0;
pub const DEFAULT_PRIORITY_THRESHOLD: f64 = 85.0;
pub const DEFAULT_RESEARCH_THRESHOLD: f64 = 40.0;

/// Weight table and thresholds applied by the scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub qualification_threshold: f64,
    pub priority_threshold: f64,
    pub research_threshold: f64,
    pub weights: BTreeMap<ScoringFactor, f64>,
}

impl ScoringConfig {
    pub fn default_weights() -> BTreeMap<ScoringFactor, f64> {
        BTreeMap::from([
            (ScoringFactor::Budget, 0.30),
            (ScoringFactor::Authority, 0.20),
            (ScoringFactor::Need, 0.20),
            (ScoringFactor::Timeline, 0.10),
            (ScoringFactor::Urgency, 0.10),
            (ScoringFactor::CompanySize, 0.10),
        ])
    }

    /// Config with explicit weights; tier thresholds keep their relative defaults.
    pub fn with_weights(
        qualification_threshold: f64,
        weights: impl IntoIterator<Item = (ScoringFactor, f64)>,
    ) -> Self {
        Self {
            qualification_threshold,
            priority_threshold: DEFAULT_PRIORITY_THRESHOLD.max(qualification_threshold),
            research_threshold: DEFAULT_RESEARCH_THRESHOLD.min(qualification_threshold),
            weights: weights.into_iter().collect(),
        }
    }

    pub fn weight(&self, factor: ScoringFactor) -> f64 {
        self.weights.get(&factor).copied().unwrap_or(0.0)
    }

    /// Check the thresholds are ordered within the score range and every weight is finite.
    pub fn validate(&self) -> Result<(), ScoringConfigError> {
        for (name, value) in [
            ("qualification", self.qualification_threshold),
            ("priority", self.priority_threshold),
            ("research", self.research_threshold),
        ] {
            if !value.is_finite() || !(super::SCORE_FLOOR..=super::SCORE_CEILING).contains(&value)
            {
                return Err(ScoringConfigError::ThresholdOutOfRange { name, value });
            }
        }

        if self.priority_threshold < self.qualification_threshold {
            return Err(ScoringConfigError::ThresholdOrder {
                lower: "qualification",
                upper: "priority",
            });
        }

        if self.research_threshold > self.qualification_threshold {
            return Err(ScoringConfigError::ThresholdOrder {
                lower: "research",
                upper: "qualification",
            });
        }

        if let Some((factor, weight)) = self.weights.iter().find(|(_, weight)| !weight.is_finite())
        {
            return Err(ScoringConfigError::NonFiniteWeight {
                factor: *factor,
                weight: *weight,
            });
        }

        Ok(())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            qualification_threshold: DEFAULT_QUALIFICATION_THRESHOLD,
            priority_threshold: DEFAULT_PRIORITY_THRESHOLD,
            research_threshold: DEFAULT_RESEARCH_THRESHOLD,
            weights: Self::default_weights(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringConfigError {
    #[error("{name} threshold {value} must lie within [0, 100]")]
    ThresholdOutOfRange { name: &'static str, value: f64 },
    #[error("{lower} threshold must not exceed the {upper} threshold")]
    ThresholdOrder {
        lower: &'static str,
        upper: &'static str,
    },
    #[error("weight for {factor:?} must be finite (found {weight})")]
    NonFiniteWeight { factor: ScoringFactor, weight: f64 },
}
