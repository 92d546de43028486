use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::domain::{ContactAttempt, Lead, LeadStatus, QualificationTier};
use super::store::{LeadFilter, LeadStore, StoreError};

/// Read-only summarizer over the lead store.
pub struct LeadReporter<S: ?Sized> {
    store: Arc<S>,
}

impl<S> LeadReporter<S>
where
    S: LeadStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Contact attempts count only when their lead passes `filter`.
    pub fn report(&self, filter: &LeadFilter) -> Result<LeadReport, StoreError> {
        let leads = self.store.list(filter)?;
        let attempts = self.store.attempts()?;
        Ok(LeadReport::from_records(&leads, &attempts))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

/// Aggregates over a set of leads. Every figure is zero for an empty set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadReport {
    pub total_leads: usize,
    pub status_counts: BTreeMap<LeadStatus, usize>,
    pub tier_counts: BTreeMap<QualificationTier, usize>,
    pub scored_leads: usize,
    pub score_distribution: ScoreDistribution,
    pub qualified_total: usize,
    pub converted: usize,
    pub conversion_rate: f64,
    pub total_contacts: usize,
    pub successful_contacts: usize,
    pub contact_success_rate: f64,
}

impl LeadReport {
    pub fn from_leads(leads: &[Lead]) -> Self {
        let mut report = LeadReport {
            total_leads: leads.len(),
            ..LeadReport::default()
        };

        let mut score_sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for lead in leads {
            *report.status_counts.entry(lead.status()).or_insert(0) += 1;

            if let Some(tier) = lead.tier() {
                *report.tier_counts.entry(tier).or_insert(0) += 1;
            }

            if let Some(score) = lead.score() {
                report.scored_leads += 1;
                score_sum += score;
                min = min.min(score);
                max = max.max(score);
            }

            if lead.has_reached(LeadStatus::Qualified) {
                report.qualified_total += 1;
            }

            if is_converted(lead) {
                report.converted += 1;
            }
        }

        if report.scored_leads > 0 {
            report.score_distribution = ScoreDistribution {
                min,
                max,
                average: score_sum / report.scored_leads as f64,
            };
        }

        if report.qualified_total > 0 {
            report.conversion_rate = report.converted as f64 / report.qualified_total as f64;
        }

        report
    }

    /// Lead aggregates plus the outcome of every attempt made against one of `leads`.
    pub fn from_records(leads: &[Lead], attempts: &[ContactAttempt]) -> Self {
        let mut report = Self::from_leads(leads);
        let ids: HashSet<_> = leads.iter().map(Lead::id).collect();

        for attempt in attempts.iter().filter(|attempt| ids.contains(&attempt.lead_id)) {
            report.total_contacts += 1;
            if attempt.success {
                report.successful_contacts += 1;
            }
        }

        if report.total_contacts > 0 {
            report.contact_success_rate =
                report.successful_contacts as f64 / report.total_contacts as f64;
        }

        report
    }

    pub fn count(&self, status: LeadStatus) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    pub fn average_score(&self) -> f64 {
        self.score_distribution.average
    }
}

fn is_converted(lead: &Lead) -> bool {
    match lead.status() {
        LeadStatus::Transferred => true,
        LeadStatus::Closed => lead.has_reached(LeadStatus::EoiReceived),
        _ => false,
    }
}
