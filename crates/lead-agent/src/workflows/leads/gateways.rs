use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{ContactChannel, CrmRef, Lead, LeadId};

/// Outbound email/SMS delivery. Retry policy, if any, lives behind this trait.
pub trait ContactGateway: Send + Sync {
    fn send(&self, request: &ContactRequest) -> Result<DeliveryResult, DeliveryError>;
}

/// Push side of the CRM integration.
pub trait CrmSync: Send + Sync {
    fn push(&self, lead: &Lead) -> Result<CrmRef, SyncError>;
}

/// Message handed to the contact gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub lead_id: LeadId,
    pub channel: ContactChannel,
    pub recipient: String,
    pub template: String,
    pub payload: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub success: bool,
    pub provider_ref: String,
}

impl DeliveryResult {
    pub fn delivered(provider_ref: impl Into<String>) -> Self {
        Self {
            success: true,
            provider_ref: provider_ref.into(),
        }
    }
}

/// Why an external call ended without an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interruption {
    TimedOut,
    Cancelled,
}

impl Interruption {
    pub const fn label(self) -> &'static str {
        match self {
            Interruption::TimedOut => "timed out",
            Interruption::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery rejected: {0}")]
    Rejected(String),
    #[error("delivery transport unavailable: {0}")]
    Transport(String),
    #[error("delivery timed out")]
    TimedOut,
    #[error("delivery cancelled")]
    Cancelled,
}

impl DeliveryError {
    pub fn interruption(&self) -> Option<Interruption> {
        match self {
            DeliveryError::TimedOut => Some(Interruption::TimedOut),
            DeliveryError::Cancelled => Some(Interruption::Cancelled),
            DeliveryError::Rejected(_) | DeliveryError::Transport(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("crm rejected lead: {0}")]
    Rejected(String),
    #[error("crm transport unavailable: {0}")]
    Transport(String),
    #[error("crm sync timed out")]
    TimedOut,
    #[error("crm sync cancelled")]
    Cancelled,
}

impl SyncError {
    pub fn interruption(&self) -> Option<Interruption> {
        match self {
            SyncError::TimedOut => Some(Interruption::TimedOut),
            SyncError::Cancelled => Some(Interruption::Cancelled),
            SyncError::Rejected(_) | SyncError::Transport(_) => None,
        }
    }
}
