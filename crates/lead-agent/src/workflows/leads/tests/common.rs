use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use serde_json::Value;

use crate::workflows::leads::domain::{
    ContactAttempt, ContactChannel, CrmRef, EoiPayload, Lead, LeadAttributes, LeadId,
    ScoringFactor,
};
use crate::workflows::leads::gateways::{
    ContactGateway, ContactRequest, CrmSync, DeliveryError, DeliveryResult, SyncError,
};
use crate::workflows::leads::lifecycle::{LeadLifecycleController, LifecycleConfig};
use crate::workflows::leads::scoring::ScoringConfig;
use crate::workflows::leads::store::{LeadFilter, LeadStore, MemoryLeadStore, StoreError};

/// Threshold 70 with budget and urgency weighted evenly.
pub(super) fn split_scoring() -> ScoringConfig {
    ScoringConfig::with_weights(
        70.0,
        [(ScoringFactor::Budget, 0.5), (ScoringFactor::Urgency, 0.5)],
    )
}

/// Budget is the only factor, so the score equals the budget value.
pub(super) fn budget_only_scoring(threshold: f64) -> ScoringConfig {
    ScoringConfig::with_weights(threshold, [(ScoringFactor::Budget, 1.0)])
}

pub(super) fn warm_lead() -> LeadAttributes {
    LeadAttributes::new()
        .with("name", "Dana Whitfield")
        .with("company", "Harbor Logistics")
        .with("email", "dana@harbor.example")
        .with("phone", "+15550100")
        .with("budget", 80.0)
        .with("urgency", 90.0)
}

pub(super) fn cold_lead() -> LeadAttributes {
    LeadAttributes::new()
        .with("email", "cold@example.com")
        .with("budget", 5.0)
}

pub(super) struct Harness<C = MemoryContacts, M = MemoryCrm> {
    pub(super) controller: Arc<LeadLifecycleController<MemoryLeadStore, C, M>>,
    pub(super) store: Arc<MemoryLeadStore>,
    pub(super) contacts: Arc<C>,
    pub(super) crm: Arc<M>,
}

pub(super) fn harness() -> Harness {
    harness_with(
        MemoryContacts::default(),
        MemoryCrm::default(),
        LifecycleConfig::with_scoring(split_scoring()),
    )
}

pub(super) fn harness_with<C, M>(contacts: C, crm: M, config: LifecycleConfig) -> Harness<C, M>
where
    C: ContactGateway + 'static,
    M: CrmSync + 'static,
{
    let store = Arc::new(MemoryLeadStore::new());
    let contacts = Arc::new(contacts);
    let crm = Arc::new(crm);
    let controller = Arc::new(LeadLifecycleController::new(
        store.clone(),
        contacts.clone(),
        crm.clone(),
        config,
    ));
    Harness {
        controller,
        store,
        contacts,
        crm,
    }
}

#[derive(Default)]
pub(super) struct MemoryContacts {
    sent: Mutex<Vec<ContactRequest>>,
}

impl MemoryContacts {
    pub(super) fn sent(&self) -> Vec<ContactRequest> {
        self.sent.lock().expect("contact mutex poisoned").clone()
    }
}

impl ContactGateway for MemoryContacts {
    fn send(&self, request: &ContactRequest) -> Result<DeliveryResult, DeliveryError> {
        let mut sent = self.sent.lock().expect("contact mutex poisoned");
        sent.push(request.clone());
        Ok(DeliveryResult::delivered(format!("MSG-{}", sent.len())))
    }
}

/// Provider answers, but reports the message as undelivered.
pub(super) struct BouncingContacts;

impl ContactGateway for BouncingContacts {
    fn send(&self, _request: &ContactRequest) -> Result<DeliveryResult, DeliveryError> {
        Ok(DeliveryResult {
            success: false,
            provider_ref: "MSG-BOUNCE".to_string(),
        })
    }
}

/// Holds every send until the paired sender releases it, or times out after five seconds.
pub(super) struct GatedContacts {
    release: Mutex<mpsc::Receiver<()>>,
}

impl GatedContacts {
    pub(super) fn new() -> (Self, mpsc::Sender<()>) {
        let (sender, receiver) = mpsc::channel();
        let gate = Self {
            release: Mutex::new(receiver),
        };
        (gate, sender)
    }
}

impl ContactGateway for GatedContacts {
    fn send(&self, _request: &ContactRequest) -> Result<DeliveryResult, DeliveryError> {
        let release = self.release.lock().unwrap();
        match release.recv_timeout(Duration::from_secs(5)) {
            Ok(()) => Ok(DeliveryResult::delivered("MSG-GATED")),
            Err(_) => Err(DeliveryError::TimedOut),
        }
    }
}

pub(super) struct FailingContacts(pub(super) DeliveryError);

impl ContactGateway for FailingContacts {
    fn send(&self, _request: &ContactRequest) -> Result<DeliveryResult, DeliveryError> {
        Err(self.0.clone())
    }
}

/// Writes a newer revision of the lead while the delivery is in flight.
pub(super) struct RacingContacts {
    pub(super) store: Arc<MemoryLeadStore>,
}

impl ContactGateway for RacingContacts {
    fn send(&self, request: &ContactRequest) -> Result<DeliveryResult, DeliveryError> {
        let mut lead = self
            .store
            .get(&request.lead_id)
            .expect("lead present during delivery");
        lead.bump_revision();
        self.store.put(lead).expect("racing write lands");
        Ok(DeliveryResult::delivered("MSG-RACE"))
    }
}

#[derive(Default)]
pub(super) struct MemoryCrm {
    pushed: Mutex<Vec<LeadId>>,
    sequence: AtomicU64,
}

impl MemoryCrm {
    pub(super) fn pushed(&self) -> Vec<LeadId> {
        self.pushed.lock().expect("crm mutex poisoned").clone()
    }
}

impl CrmSync for MemoryCrm {
    fn push(&self, lead: &Lead) -> Result<CrmRef, SyncError> {
        self.pushed
            .lock()
            .expect("crm mutex poisoned")
            .push(lead.id().clone());
        let next = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CrmRef(format!("CRM-{next:06}")))
    }
}

pub(super) struct FailingCrm(pub(super) SyncError);

impl CrmSync for FailingCrm {
    fn push(&self, _lead: &Lead) -> Result<CrmRef, SyncError> {
        Err(self.0.clone())
    }
}

pub(super) struct UnavailableStore;

impl LeadStore for UnavailableStore {
    fn get(&self, _id: &LeadId) -> Result<Lead, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn put(&self, _lead: Lead) -> Result<Lead, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _filter: &LeadFilter) -> Result<Vec<Lead>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn record_attempt(&self, _attempt: ContactAttempt) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn attempts(&self) -> Result<Vec<ContactAttempt>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Drive a fresh lead up to `EOI_RECEIVED`.
pub(super) fn interested_lead<C, M>(
    controller: &LeadLifecycleController<MemoryLeadStore, C, M>,
) -> Lead
where
    C: ContactGateway + 'static,
    M: CrmSync + 'static,
{
    let lead = controller.generate_lead(warm_lead()).expect("lead generated");
    controller.qualify_lead(lead.id()).expect("qualified");
    controller
        .send_outbound_contact(lead.id(), ContactChannel::Email, "intro")
        .expect("contacted");
    controller
        .process_eoi(lead.id(), EoiPayload::new("Fleet telematics"))
        .expect("eoi processed")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
