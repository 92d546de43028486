use std::sync::{Arc, Mutex};

use lead_agent::workflows::leads::{
    ContactChannel, ContactGateway, ContactRequest, CrmRef, CrmSync, DeliveryError,
    DeliveryResult, EoiPayload, Lead, LeadAttributes, LeadFilter, LeadLifecycleController,
    LeadReporter, LeadStatus, LifecycleConfig, LifecycleError, MemoryLeadStore, ScoringConfig,
    ScoringFactor, SyncError, TransferDestination,
};

#[derive(Default)]
struct RecordingContacts {
    requests: Mutex<Vec<ContactRequest>>,
}

impl ContactGateway for RecordingContacts {
    fn send(&self, request: &ContactRequest) -> Result<DeliveryResult, DeliveryError> {
        self.requests
            .lock()
            .expect("contact mutex poisoned")
            .push(request.clone());
        Ok(DeliveryResult::delivered("provider-1"))
    }
}

struct StaticCrm;

impl CrmSync for StaticCrm {
    fn push(&self, lead: &Lead) -> Result<CrmRef, SyncError> {
        Ok(CrmRef(format!("CRM-{}", lead.id())))
    }
}

fn controller() -> LeadLifecycleController<MemoryLeadStore, RecordingContacts, StaticCrm> {
    let scoring = ScoringConfig::with_weights(
        70.0,
        [(ScoringFactor::Budget, 0.5), (ScoringFactor::Urgency, 0.5)],
    );
    LeadLifecycleController::new(
        Arc::new(MemoryLeadStore::new()),
        Arc::new(RecordingContacts::default()),
        Arc::new(StaticCrm),
        LifecycleConfig::with_scoring(scoring),
    )
}

#[test]
fn interested_lead_reaches_transfer_with_crm_reference() {
    let controller = controller();

    let lead = controller
        .generate_lead(
            LeadAttributes::new()
                .with("budget", 80.0)
                .with("urgency", 90.0)
                .with("email", "dana@harbor.example"),
        )
        .expect("lead generated");
    assert_eq!(lead.status(), LeadStatus::New);
    assert!(lead.score().is_none());

    let lead = controller.qualify_lead(lead.id()).expect("qualified");
    assert_eq!(lead.score(), Some(85.0));
    assert_eq!(lead.status(), LeadStatus::Qualified);

    let lead = controller
        .send_outbound_contact(lead.id(), ContactChannel::Email, "intro")
        .expect("contacted");
    assert_eq!(lead.status(), LeadStatus::Contacted);

    let lead = controller
        .process_eoi(lead.id(), EoiPayload::new("Fleet telematics"))
        .expect("eoi processed");
    assert_eq!(lead.status(), LeadStatus::EoiReceived);

    let lead = controller
        .transfer_lead(
            lead.id(),
            TransferDestination {
                team: "enterprise-sales".to_string(),
                sales_team_available: false,
            },
        )
        .expect("transferred");
    assert_eq!(lead.status(), LeadStatus::Transferred);
    assert_eq!(
        lead.crm_ref().map(|crm_ref| crm_ref.0.clone()),
        Some(format!("CRM-{}", lead.id()))
    );
}

#[test]
fn low_scoring_lead_is_disqualified_and_blocked_from_contact() {
    let controller = controller();
    let lead = controller
        .generate_lead(LeadAttributes::new().with("budget", 5.0))
        .expect("lead generated");

    let lead = controller.qualify_lead(lead.id()).expect("scored");
    assert_eq!(lead.status(), LeadStatus::Disqualified);

    let err = controller
        .send_outbound_contact(lead.id(), ContactChannel::Email, "intro")
        .expect_err("disqualified leads are not contacted");
    assert!(matches!(err, LifecycleError::InvalidState { .. }));
    assert!(err.to_string().contains("DISQUALIFIED"));
}

#[test]
fn report_summarizes_the_pipeline() {
    let controller = controller();
    for (budget, urgency) in [(80.0, 90.0), (70.0, 70.0), (10.0, 0.0)] {
        let lead = controller
            .generate_lead(
                LeadAttributes::new()
                    .with("budget", budget)
                    .with("urgency", urgency),
            )
            .expect("lead generated");
        controller.qualify_lead(lead.id()).expect("scored");
    }

    let report = LeadReporter::new(controller.store().clone())
        .report(&LeadFilter::all())
        .expect("report");

    assert_eq!(report.total_leads, 3);
    assert_eq!(report.count(LeadStatus::Qualified), 2);
    assert_eq!(report.count(LeadStatus::Disqualified), 1);
    assert!((report.average_score() - 160.0 / 3.0).abs() < 1e-9);
}
