use super::super::domain::{AttributeKey, LeadAttributes, ScoringFactor};
use super::config::ScoringConfig;
use super::{ScoreComponent, SCORE_CEILING, SCORE_FLOOR};

/// Weighted sum over every configured factor, clamped into the score range.
pub(crate) fn weighted_score(
    attributes: &LeadAttributes,
    config: &ScoringConfig,
) -> (Vec<ScoreComponent>, f64) {
    let mut components = Vec::with_capacity(config.weights.len());
    let mut total = 0.0_f64;

    for (factor, weight) in &config.weights {
        let value = factor_value(attributes, *factor);
        let contribution = value * weight;
        total += contribution;
        components.push(ScoreComponent {
            factor: *factor,
            value,
            weight: *weight,
            contribution,
        });
    }

    (components, clamp_score(total))
}

fn factor_value(attributes: &LeadAttributes, factor: ScoringFactor) -> f64 {
    attributes
        .get_key(AttributeKey::Factor(factor))
        .and_then(|value| value.factor_value())
        .unwrap_or(0.0)
}

pub(crate) fn clamp_score(raw: f64) -> f64 {
    if raw.is_nan() {
        return SCORE_FLOOR;
    }
    raw.clamp(SCORE_FLOOR, SCORE_CEILING)
}
