use super::common::*;
use crate::workflows::leads::domain::{LeadAttributes, QualificationTier, ScoringFactor};
use crate::workflows::leads::scoring::{
    ScoringConfig, ScoringConfigError, ScoringEngine, SCORE_CEILING, SCORE_FLOOR,
};

#[test]
fn weighted_sum_matches_configured_weights() {
    let engine = ScoringEngine::new(split_scoring());
    let card = engine.score(&LeadAttributes::new().with("budget", 80.0).with("urgency", 90.0));

    assert_eq!(card.score, 85.0);
    assert!(card.qualifies);
    assert_eq!(card.tier, QualificationTier::Priority);
    assert_eq!(card.components.len(), 2);
    let budget = card
        .components
        .iter()
        .find(|component| component.factor == ScoringFactor::Budget)
        .expect("budget component");
    assert_eq!(budget.contribution, 40.0);
}

#[test]
fn missing_and_unreadable_factors_count_as_zero() {
    let engine = ScoringEngine::new(split_scoring());
    let card = engine.score(
        &LeadAttributes::new()
            .with("budget", "plenty")
            .with("shoe_size", 44.0),
    );

    assert_eq!(card.score, SCORE_FLOOR);
    assert!(!card.qualifies);
    assert_eq!(card.tier, QualificationTier::Disqualified);
}

#[test]
fn yes_no_answers_read_as_full_or_zero() {
    let engine = ScoringEngine::new(split_scoring());
    let mut attributes = LeadAttributes::new();
    attributes.insert_input("Budget", "yes");
    attributes.insert_input("urgency", "no");

    assert_eq!(engine.score(&attributes).score, 50.0);
}

#[test]
fn score_is_clamped_into_range() {
    let engine = ScoringEngine::new(budget_only_scoring(70.0));

    let high = engine.score(&LeadAttributes::new().with("budget", 1_000.0));
    assert_eq!(high.score, SCORE_CEILING);

    let low = engine.score(&LeadAttributes::new().with("budget", -250.0));
    assert_eq!(low.score, SCORE_FLOOR);

    let not_a_number = engine.score(&LeadAttributes::new().with("budget", f64::NAN));
    assert_eq!(not_a_number.score, SCORE_FLOOR);
}

#[test]
fn score_stays_in_range_for_arbitrary_inputs() {
    let engine = ScoringEngine::new(ScoringConfig::default());
    let samples = [
        -1.0e12, -100.0, -0.5, 0.0, 12.5, 50.0, 99.9, 100.0, 101.0, 1.0e12,
    ];

    for budget in samples {
        for urgency in samples {
            let card = engine.score(
                &LeadAttributes::new()
                    .with("budget", budget)
                    .with("urgency", urgency)
                    .with("company_size", f64::INFINITY),
            );
            assert!(
                (SCORE_FLOOR..=SCORE_CEILING).contains(&card.score),
                "score {} escaped the range for budget {budget}, urgency {urgency}",
                card.score
            );
        }
    }
}

#[test]
fn tiers_follow_thresholds() {
    let engine = ScoringEngine::new(budget_only_scoring(70.0));
    let tier_for = |budget: f64| {
        engine
            .score(&LeadAttributes::new().with("budget", budget))
            .tier
    };

    assert_eq!(tier_for(85.0), QualificationTier::Priority);
    assert_eq!(tier_for(70.0), QualificationTier::Nurture);
    assert_eq!(tier_for(69.9), QualificationTier::Research);
    assert_eq!(tier_for(40.0), QualificationTier::Research);
    assert_eq!(tier_for(39.0), QualificationTier::Disqualified);
}

#[test]
fn default_weights_cover_every_factor() {
    let config = ScoringConfig::default();
    assert_eq!(config.weights.len(), ScoringFactor::ordered().len());
    let total: f64 = config.weights.values().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(config.validate().is_ok());
}

#[test]
fn validation_rejects_out_of_range_threshold() {
    let mut config = ScoringConfig::default();
    config.qualification_threshold = 120.0;
    assert!(matches!(
        config.validate(),
        Err(ScoringConfigError::ThresholdOutOfRange {
            name: "qualification",
            ..
        })
    ));
}

#[test]
fn validation_rejects_non_finite_weight() {
    let config = ScoringConfig::with_weights(70.0, [(ScoringFactor::Need, f64::NAN)]);
    assert!(matches!(
        config.validate(),
        Err(ScoringConfigError::NonFiniteWeight {
            factor: ScoringFactor::Need,
            ..
        })
    ));
}
