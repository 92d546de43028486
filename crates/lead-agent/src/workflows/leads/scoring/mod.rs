mod config;
mod policy;
mod rules;

pub use config::{
    ScoringConfig, ScoringConfigError, DEFAULT_PRIORITY_THRESHOLD,
    DEFAULT_QUALIFICATION_THRESHOLD, DEFAULT_RESEARCH_THRESHOLD,
};

use super::domain::{LeadAttributes, QualificationTier, ScoringFactor};
use serde::{Deserialize, Serialize};

/// Lower bound of every qualification score.
pub const SCORE_FLOOR: f64 = 0.0;
/// Upper bound of every qualification score.
pub const SCORE_CEILING: f64 = 100.0;

/// Stateless scorer that applies the weight table to an attribute mapping.
///
/// Scoring is total: unknown attributes are ignored, missing or unreadable factors count as
/// zero, and the weighted sum is clamped to `[SCORE_FLOOR, SCORE_CEILING]`.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, attributes: &LeadAttributes) -> ScoreCard {
        let (components, score) = rules::weighted_score(attributes, &self.config);
        let tier = policy::tier_for(score, &self.config);

        ScoreCard {
            score,
            qualifies: score >= self.config.qualification_threshold,
            tier,
            components,
        }
    }
}

/// Discrete contribution to a score, allowing transparent audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: ScoringFactor,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

/// Scoring output: the bounded score, the verdict, and the per-factor trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub score: f64,
    pub qualifies: bool,
    pub tier: QualificationTier,
    pub components: Vec<ScoreComponent>,
}

impl ScoreCard {
    pub fn summary(&self) -> String {
        format!(
            "score {:.2} ({}), {}",
            self.score,
            self.tier.label(),
            if self.qualifies {
                "qualified"
            } else {
                "below threshold"
            }
        )
    }
}
