//! Lead lifecycle: intake validation, qualification scoring, the transition controller,
//! and read-only reporting over the lead store.

pub mod domain;
pub mod gateways;
pub mod import;
pub mod intake;
pub mod lifecycle;
pub mod report;
pub mod router;
pub mod scoring;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    AttributeKey, AttributeValue, ContactAttempt, ContactChannel, ContactRecord, CrmRef,
    EoiPayload, HistoryEntry, Lead, LeadAttributes, LeadId, LeadStatus, LeadStatusView,
    QualificationTier, ScoringFactor, TransferDestination, TransferDisposition, TransferRecord,
    UnknownLabel,
};
pub use gateways::{
    ContactGateway, ContactRequest, CrmSync, DeliveryError, DeliveryResult, Interruption,
    SyncError,
};
pub use import::{import_leads, import_leads_from_path, ImportSummary, LeadImportError};
pub use intake::{LeadIntakeGuard, ValidationError};
pub use lifecycle::{LeadLifecycleController, LifecycleConfig, LifecycleError, Operation};
pub use report::{LeadReport, LeadReporter, ScoreDistribution};
pub use router::lead_router;
pub use scoring::{ScoreCard, ScoreComponent, ScoringConfig, ScoringEngine};
pub use store::{LeadFilter, LeadStore, MemoryLeadStore, StoreError};
