use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{ContactAttempt, Lead, LeadId, LeadStatus};

/// Storage abstraction so the lifecycle controller can be exercised in isolation.
///
/// `put` is a compare-and-set keyed on [`Lead::revision`]: a new lead must arrive at
/// revision 1 and an update must be exactly one revision ahead of the stored record.
/// Contact attempts are an append-only log next to the leads and carry no revision.
pub trait LeadStore: Send + Sync {
    fn get(&self, id: &LeadId) -> Result<Lead, StoreError>;
    fn put(&self, lead: Lead) -> Result<Lead, StoreError>;
    fn list(&self, filter: &LeadFilter) -> Result<Vec<Lead>, StoreError>;
    fn record_attempt(&self, attempt: ContactAttempt) -> Result<(), StoreError>;
    /// Attempts in the order they were recorded.
    fn attempts(&self) -> Result<Vec<ContactAttempt>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("lead {0} not found")]
    NotFound(LeadId),
    #[error("lead {id} was modified concurrently (expected revision {expected}, found {found})")]
    Conflict {
        id: LeadId,
        expected: u64,
        found: u64,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Compare-and-set check shared by store implementations.
pub fn check_revision(stored: Option<&Lead>, incoming: &Lead) -> Result<(), StoreError> {
    let found = stored.map(Lead::revision).unwrap_or(0);
    let expected = incoming.revision().saturating_sub(1);
    if found == expected && incoming.revision() > 0 {
        Ok(())
    } else {
        Err(StoreError::Conflict {
            id: incoming.id().clone(),
            expected,
            found,
        })
    }
}

/// Optional status and creation-date window applied to `list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadFilter {
    #[serde(default)]
    pub status: Option<LeadStatus>,
    #[serde(default)]
    pub created_from: Option<NaiveDate>,
    #[serde(default)]
    pub created_to: Option<NaiveDate>,
}

impl LeadFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(status: LeadStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, lead: &Lead) -> bool {
        let created_on = lead.created_at().date_naive();
        self.status.map_or(true, |status| lead.status() == status)
            && self.created_from.map_or(true, |from| created_on >= from)
            && self.created_to.map_or(true, |to| created_on <= to)
    }
}

/// Process-local store guarded by a mutex; each `put` is atomic per lead id.
#[derive(Debug, Default)]
pub struct MemoryLeadStore {
    records: Mutex<HashMap<LeadId, Lead>>,
    attempts: Mutex<Vec<ContactAttempt>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn records(&self) -> Result<MutexGuard<'_, HashMap<LeadId, Lead>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("lead store mutex poisoned".to_string()))
    }

    fn attempt_log(&self) -> Result<MutexGuard<'_, Vec<ContactAttempt>>, StoreError> {
        self.attempts
            .lock()
            .map_err(|_| StoreError::Unavailable("attempt log mutex poisoned".to_string()))
    }
}

impl LeadStore for MemoryLeadStore {
    fn get(&self, id: &LeadId) -> Result<Lead, StoreError> {
        self.records()?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn put(&self, lead: Lead) -> Result<Lead, StoreError> {
        let mut guard = self.records()?;
        check_revision(guard.get(lead.id()), &lead)?;
        guard.insert(lead.id().clone(), lead.clone());
        Ok(lead)
    }

    fn list(&self, filter: &LeadFilter) -> Result<Vec<Lead>, StoreError> {
        let guard = self.records()?;
        let mut leads: Vec<Lead> = guard
            .values()
            .filter(|lead| filter.matches(lead))
            .cloned()
            .collect();
        leads.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(leads)
    }

    fn record_attempt(&self, attempt: ContactAttempt) -> Result<(), StoreError> {
        self.attempt_log()?.push(attempt);
        Ok(())
    }

    fn attempts(&self) -> Result<Vec<ContactAttempt>, StoreError> {
        Ok(self.attempt_log()?.clone())
    }
}
