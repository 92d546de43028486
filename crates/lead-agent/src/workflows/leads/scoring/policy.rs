use super::super::domain::QualificationTier;
use super::config::ScoringConfig;

pub(crate) fn tier_for(score: f64, config: &ScoringConfig) -> QualificationTier {
    if score >= config.priority_threshold {
        QualificationTier::Priority
    } else if score >= config.qualification_threshold {
        QualificationTier::Nurture
    } else if score >= config.research_threshold {
        QualificationTier::Research
    } else {
        QualificationTier::Disqualified
    }
}
