mod transitions;

pub use transitions::Operation;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::domain::{
    AttributeKey, ContactAttempt, ContactChannel, ContactRecord, EoiPayload, Lead,
    LeadAttributes, LeadId, LeadStatus, TransferDestination, TransferDisposition,
    TransferRecord,
};
use super::gateways::{
    ContactGateway, ContactRequest, CrmSync, DeliveryError, Interruption, SyncError,
};
use super::intake::{LeadIntakeGuard, ValidationError};
use super::scoring::{ScoringConfig, ScoringEngine};
use super::store::{LeadStore, StoreError};

const DEFAULT_ACTOR: &str = "lead-agent";
const ID_ATTEMPTS: usize = 8;

/// Construction-time settings for the lifecycle controller.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    pub scoring: ScoringConfig,
    pub required_fields: Vec<AttributeKey>,
    pub actor: String,
}

impl LifecycleConfig {
    pub fn with_scoring(scoring: ScoringConfig) -> Self {
        Self {
            scoring,
            ..Self::default()
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            required_fields: Vec::new(),
            actor: DEFAULT_ACTOR.to_string(),
        }
    }
}

/// State machine owning every lead transition.
///
/// Each operation reads the lead, checks the transition table, performs any external call,
/// and only then commits through a compare-and-set `put`. No lock is held across the
/// contact or CRM calls; a concurrent writer surfaces as [`LifecycleError::StoreConflict`].
pub struct LeadLifecycleController<S, C, M> {
    store: Arc<S>,
    contact: Arc<C>,
    crm: Arc<M>,
    engine: ScoringEngine,
    guard: LeadIntakeGuard,
    actor: String,
    sequence: AtomicU64,
}

impl<S, C, M> LeadLifecycleController<S, C, M>
where
    S: LeadStore + 'static,
    C: ContactGateway + 'static,
    M: CrmSync + 'static,
{
    pub fn new(store: Arc<S>, contact: Arc<C>, crm: Arc<M>, config: LifecycleConfig) -> Self {
        let LifecycleConfig {
            scoring,
            required_fields,
            actor,
        } = config;

        Self {
            store,
            contact,
            crm,
            engine: ScoringEngine::new(scoring),
            guard: LeadIntakeGuard::with_required_fields(required_fields),
            actor,
            sequence: AtomicU64::new(1),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    /// Create a NEW lead from validated attributes.
    pub fn generate_lead(&self, attributes: LeadAttributes) -> Result<Lead, LifecycleError> {
        self.guard.check(&attributes)?;

        let mut attempts = 0;
        loop {
            let now = Utc::now();
            let lead = Lead::create(self.next_lead_id(now), attributes.clone(), &self.actor, now);
            match self.store.put(lead) {
                Ok(stored) => {
                    info!(lead_id = %stored.id(), "lead generated");
                    return Ok(stored);
                }
                Err(StoreError::Conflict { id, .. }) if attempts + 1 < ID_ATTEMPTS => {
                    debug!(lead_id = %id, "lead id already taken, drawing another");
                    attempts += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub fn get_lead(&self, id: &LeadId) -> Result<Lead, LifecycleError> {
        Ok(self.store.get(id)?)
    }

    /// Score the lead and move it to QUALIFIED or DISQUALIFIED.
    pub fn qualify_lead(&self, id: &LeadId) -> Result<Lead, LifecycleError> {
        let mut lead = self.load_for(id, Operation::QualifyLead)?;

        let card = self.engine.score(lead.attributes());
        debug!(
            lead_id = %id,
            score = card.score,
            components = ?card.components,
            "lead scored"
        );

        let status = if card.qualifies {
            LeadStatus::Qualified
        } else {
            LeadStatus::Disqualified
        };
        lead.apply_score(card.score, card.tier);
        lead.record(status, &self.actor, card.summary(), Utc::now());

        let stored = self.update(lead)?;
        info!(lead_id = %id, status = %stored.status(), score = card.score, "lead qualified");
        Ok(stored)
    }

    /// Deliver an outbound message to a QUALIFIED lead and mark it CONTACTED.
    pub fn send_outbound_contact(
        &self,
        id: &LeadId,
        channel: ContactChannel,
        template: &str,
    ) -> Result<Lead, LifecycleError> {
        let operation = Operation::SendOutboundContact;
        let mut lead = self.load_for(id, operation)?;

        let template = template.trim();
        if template.is_empty() {
            return Err(ValidationError::invalid("template", "template name is required").into());
        }

        let recipient_key = channel.recipient_key();
        let recipient = lead
            .attributes()
            .text(recipient_key)
            .ok_or(ValidationError::MissingField(recipient_key))?
            .to_string();

        let request = ContactRequest {
            lead_id: id.clone(),
            channel,
            recipient,
            template: template.to_string(),
            payload: contact_payload(&lead),
        };

        let delivery = match self.contact.send(&request) {
            Ok(result) if result.success => {
                self.log_attempt(&request, Some(&result.provider_ref), None);
                result
            }
            Ok(result) => {
                let err = DeliveryError::Rejected(format!(
                    "provider reported failure (ref {})",
                    result.provider_ref
                ));
                warn!(lead_id = %id, %channel, error = %err, "outbound contact failed");
                self.log_attempt(&request, Some(&result.provider_ref), Some(&err));
                return Err(LifecycleError::Delivery(err));
            }
            Err(err) => {
                warn!(lead_id = %id, %channel, error = %err, "outbound contact failed");
                self.log_attempt(&request, None, Some(&err));
                return Err(match err.interruption() {
                    Some(interruption) => LifecycleError::Interrupted {
                        operation,
                        interruption,
                    },
                    None => LifecycleError::Delivery(err),
                });
            }
        };

        let now = Utc::now();
        let note = format!(
            "contacted via {channel} using template '{template}' (ref {})",
            delivery.provider_ref
        );
        lead.set_contact(ContactRecord {
            channel,
            template: template.to_string(),
            provider_ref: delivery.provider_ref,
            at: now,
        });
        lead.record(LeadStatus::Contacted, &self.actor, note, now);

        let stored = self.update(lead)?;
        info!(lead_id = %id, %channel, "lead contacted");
        Ok(stored)
    }

    /// Record an expression of interest from a CONTACTED lead.
    pub fn process_eoi(&self, id: &LeadId, payload: EoiPayload) -> Result<Lead, LifecycleError> {
        let mut lead = self.load_for(id, Operation::ProcessEoi)?;

        if payload.product_interest.trim().is_empty() {
            return Err(
                ValidationError::invalid("product_interest", "product interest is required")
                    .into(),
            );
        }

        let note = format!("eoi received: {}", payload.summary());
        lead.set_eoi(payload);
        lead.record(LeadStatus::EoiReceived, &self.actor, note, Utc::now());

        let stored = self.update(lead)?;
        info!(lead_id = %id, "eoi processed");
        Ok(stored)
    }

    /// Push an interested lead to the CRM and hand it to `destination`.
    pub fn transfer_lead(
        &self,
        id: &LeadId,
        destination: TransferDestination,
    ) -> Result<Lead, LifecycleError> {
        let operation = Operation::TransferLead;
        let mut lead = self.load_for(id, operation)?;

        let team = destination.team.trim().to_string();
        if team.is_empty() {
            return Err(ValidationError::invalid("destination", "team is required").into());
        }

        let crm_ref = self.crm.push(&lead).map_err(|err| {
            warn!(lead_id = %id, error = %err, "crm push failed");
            match err.interruption() {
                Some(interruption) => LifecycleError::Interrupted {
                    operation,
                    interruption,
                },
                None => LifecycleError::Sync(err),
            }
        })?;

        let now = Utc::now();
        let disposition = TransferDisposition::route(lead.tier(), destination.sales_team_available);
        let note = format!(
            "transferred to {team} as {} (crm ref {crm_ref})",
            disposition.label()
        );
        lead.set_transfer(
            crm_ref,
            TransferRecord {
                team,
                disposition,
                at: now,
            },
        );
        lead.record(LeadStatus::Transferred, &self.actor, note, now);

        let stored = self.update(lead)?;
        info!(lead_id = %id, disposition = disposition.label(), "lead transferred");
        Ok(stored)
    }

    /// Close a lead. Closing a CLOSED lead returns it untouched.
    pub fn close_lead(&self, id: &LeadId, reason: &str) -> Result<Lead, LifecycleError> {
        let mut lead = self.store.get(id)?;
        if lead.status() == LeadStatus::Closed {
            debug!(lead_id = %id, "lead already closed");
            return Ok(lead);
        }

        let reason = reason.trim();
        let note = if reason.is_empty() {
            "closed without reason".to_string()
        } else {
            format!("closed: {reason}")
        };
        lead.record(LeadStatus::Closed, &self.actor, note, Utc::now());

        let stored = self.update(lead)?;
        info!(lead_id = %id, "lead closed");
        Ok(stored)
    }

    /// Merge new attributes into a lead that has not been qualified into the pipeline yet.
    pub fn amend_lead(
        &self,
        id: &LeadId,
        attributes: LeadAttributes,
    ) -> Result<Lead, LifecycleError> {
        let mut lead = self.load_for(id, Operation::AmendLead)?;
        self.guard.check_amendment(lead.attributes(), &attributes)?;

        let note = format!("attributes amended: {}", attributes.names().join(", "));
        lead.attributes_mut().merge(attributes);
        let status = lead.status();
        lead.record(status, &self.actor, note, Utc::now());

        let stored = self.update(lead)?;
        info!(lead_id = %id, "lead amended");
        Ok(stored)
    }

    fn load_for(&self, id: &LeadId, operation: Operation) -> Result<Lead, LifecycleError> {
        let lead = self.store.get(id)?;
        if !operation.permits(lead.status()) {
            warn!(
                lead_id = %id,
                %operation,
                status = %lead.status(),
                "transition rejected"
            );
            return Err(LifecycleError::InvalidState {
                operation,
                current: lead.status(),
            });
        }
        Ok(lead)
    }

    /// Append to the attempt log. A log write failure never changes the contact outcome.
    fn log_attempt(
        &self,
        request: &ContactRequest,
        provider_ref: Option<&str>,
        error: Option<&DeliveryError>,
    ) {
        let attempt = ContactAttempt {
            lead_id: request.lead_id.clone(),
            channel: request.channel,
            template: request.template.clone(),
            success: error.is_none(),
            provider_ref: provider_ref.map(str::to_string),
            error: error.map(ToString::to_string),
            at: Utc::now(),
        };
        if let Err(err) = self.store.record_attempt(attempt) {
            warn!(lead_id = %request.lead_id, error = %err, "contact attempt not logged");
        }
    }

    fn update(&self, mut lead: Lead) -> Result<Lead, LifecycleError> {
        lead.bump_revision();
        Ok(self.store.put(lead)?)
    }

    fn next_lead_id(&self, now: DateTime<Utc>) -> LeadId {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        LeadId(format!("LEAD_{}_{sequence:04}", now.format("%Y%m%d%H%M%S")))
    }
}

fn contact_payload(lead: &Lead) -> BTreeMap<String, String> {
    let mut payload = BTreeMap::new();
    payload.insert("lead_id".to_string(), lead.id().0.clone());
    for key in [AttributeKey::Name, AttributeKey::Company] {
        if let Some(value) = lead.attributes().text(key) {
            payload.insert(key.key().to_string(), value.to_string());
        }
    }
    payload
}

/// Error raised by lifecycle operations. Persisted state is unchanged whenever one is returned.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("lead {0} not found")]
    NotFound(LeadId),
    #[error("cannot {operation} while lead is {current}")]
    InvalidState {
        operation: Operation,
        current: LeadStatus,
    },
    #[error(transparent)]
    Delivery(DeliveryError),
    #[error(transparent)]
    Sync(SyncError),
    #[error("{operation} {}; lead left unchanged", .interruption.label())]
    Interrupted {
        operation: Operation,
        interruption: Interruption,
    },
    #[error("lead {0} changed concurrently; retry from a fresh read")]
    StoreConflict(LeadId),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => LifecycleError::NotFound(id),
            StoreError::Conflict { id, .. } => LifecycleError::StoreConflict(id),
            other => LifecycleError::Store(other),
        }
    }
}
