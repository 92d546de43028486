use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for tracked leads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeadId(pub String);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// High level status tracked throughout the lead lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    Qualified,
    Disqualified,
    Contacted,
    EoiReceived,
    Transferred,
    Closed,
}

impl LeadStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LeadStatus::New => "NEW",
            LeadStatus::Qualified => "QUALIFIED",
            LeadStatus::Disqualified => "DISQUALIFIED",
            LeadStatus::Contacted => "CONTACTED",
            LeadStatus::EoiReceived => "EOI_RECEIVED",
            LeadStatus::Transferred => "TRANSFERRED",
            LeadStatus::Closed => "CLOSED",
        }
    }

    pub const fn ordered() -> [LeadStatus; 7] {
        [
            LeadStatus::New,
            LeadStatus::Qualified,
            LeadStatus::Disqualified,
            LeadStatus::Contacted,
            LeadStatus::EoiReceived,
            LeadStatus::Transferred,
            LeadStatus::Closed,
        ]
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, LeadStatus::Closed)
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LeadStatus {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        LeadStatus::ordered()
            .into_iter()
            .find(|status| status.label() == normalized)
            .ok_or_else(|| UnknownLabel {
                kind: "lead status",
                value: value.to_string(),
            })
    }
}

/// Raised when a textual status, channel, or attribute key is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

/// Attributes that contribute to the qualification score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringFactor {
    Budget,
    Authority,
    Need,
    Timeline,
    Urgency,
    CompanySize,
}

impl ScoringFactor {
    pub const fn key(self) -> &'static str {
        match self {
            ScoringFactor::Budget => "budget",
            ScoringFactor::Authority => "authority",
            ScoringFactor::Need => "need",
            ScoringFactor::Timeline => "timeline",
            ScoringFactor::Urgency => "urgency",
            ScoringFactor::CompanySize => "company_size",
        }
    }

    pub const fn ordered() -> [ScoringFactor; 6] {
        [
            ScoringFactor::Budget,
            ScoringFactor::Authority,
            ScoringFactor::Need,
            ScoringFactor::Timeline,
            ScoringFactor::Urgency,
            ScoringFactor::CompanySize,
        ]
    }
}

impl FromStr for ScoringFactor {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_key(value);
        ScoringFactor::ordered()
            .into_iter()
            .find(|factor| factor.key() == normalized)
            .ok_or_else(|| UnknownLabel {
                kind: "scoring factor",
                value: value.to_string(),
            })
    }
}

/// Enumerated attribute keys the lifecycle understands. Anything else is kept for audit only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeKey {
    Name,
    Email,
    Phone,
    Company,
    Channel,
    Factor(ScoringFactor),
}

impl AttributeKey {
    pub const fn key(self) -> &'static str {
        match self {
            AttributeKey::Name => "name",
            AttributeKey::Email => "email",
            AttributeKey::Phone => "phone",
            AttributeKey::Company => "company",
            AttributeKey::Channel => "channel",
            AttributeKey::Factor(factor) => factor.key(),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match normalize_key(value).as_str() {
            "name" => Some(AttributeKey::Name),
            "email" => Some(AttributeKey::Email),
            "phone" => Some(AttributeKey::Phone),
            "company" => Some(AttributeKey::Company),
            "channel" => Some(AttributeKey::Channel),
            other => other.parse().ok().map(AttributeKey::Factor),
        }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for AttributeKey {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AttributeKey::parse(value).ok_or_else(|| UnknownLabel {
            kind: "attribute",
            value: value.to_string(),
        })
    }
}

pub(crate) fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

/// Value representation for a lead attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    /// Interpret free-form input for `key`; scoring factors accept numbers and yes/no words.
    pub fn from_input(key: &str, raw: &str) -> Self {
        let trimmed = raw.trim();
        if matches!(AttributeKey::parse(key), Some(AttributeKey::Factor(_))) {
            if let Ok(number) = trimmed.parse::<f64>() {
                return AttributeValue::Number(number);
            }
            if let Some(flag) = parse_flag(trimmed) {
                return AttributeValue::Flag(flag);
            }
        }
        AttributeValue::Text(trimmed.to_string())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, AttributeValue::Text(text) if text.trim().is_empty())
    }

    /// Numeric reading used by scoring; `None` when the value carries no usable number.
    pub(crate) fn factor_value(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(number) if number.is_finite() => Some(*number),
            AttributeValue::Number(_) => None,
            AttributeValue::Flag(flag) => Some(if *flag { 100.0 } else { 0.0 }),
            AttributeValue::Text(text) => {
                let trimmed = text.trim();
                match trimmed.parse::<f64>() {
                    Ok(number) if number.is_finite() => Some(number),
                    _ => parse_flag(trimmed).map(|flag| if flag { 100.0 } else { 0.0 }),
                }
            }
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Flag(flag) => write!(f, "{flag}"),
            AttributeValue::Number(number) => write!(f, "{number}"),
            AttributeValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Flag(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" => Some(true),
        "n" | "no" | "false" => Some(false),
        _ => None,
    }
}

/// Attribute mapping supplied at creation. Keys are normalized to lowercase snake case.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LeadAttributes(BTreeMap<String, AttributeValue>);

impl<'de> Deserialize<'de> for LeadAttributes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = BTreeMap::<String, AttributeValue>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}

impl LeadAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn insert(
        &mut self,
        name: impl AsRef<str>,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        self.0.insert(normalize_key(name.as_ref()), value.into())
    }

    /// Insert a raw text value, typing it the way [`AttributeValue::from_input`] does.
    pub fn insert_input(&mut self, name: &str, raw: &str) -> Option<AttributeValue> {
        let value = AttributeValue::from_input(name, raw);
        self.insert(name, value)
    }

    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<AttributeValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(&normalize_key(name))
    }

    pub fn get_key(&self, key: AttributeKey) -> Option<&AttributeValue> {
        self.0.get(key.key())
    }

    /// Non-blank textual value for `key`.
    pub fn text(&self, key: AttributeKey) -> Option<&str> {
        self.get_key(key)
            .and_then(AttributeValue::as_text)
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn recognized(&self) -> impl Iterator<Item = (AttributeKey, &AttributeValue)> {
        self.0
            .iter()
            .filter_map(|(name, value)| AttributeKey::parse(name).map(|key| (key, value)))
    }

    pub fn merge(&mut self, other: LeadAttributes) {
        self.0.extend(other.0);
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}

impl<K, V> FromIterator<(K, V)> for LeadAttributes
where
    K: AsRef<str>,
    V: Into<AttributeValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut attributes = LeadAttributes::new();
        for (name, value) in iter {
            attributes.insert(name, value);
        }
        attributes
    }
}

/// Qualification tier derived from the score, mirroring the sales queues a lead lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualificationTier {
    Priority,
    Nurture,
    Research,
    Disqualified,
}

impl QualificationTier {
    pub const fn label(self) -> &'static str {
        match self {
            QualificationTier::Priority => "priority",
            QualificationTier::Nurture => "nurture",
            QualificationTier::Research => "research",
            QualificationTier::Disqualified => "disqualified",
        }
    }
}

/// Outbound channels supported by the contact gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactChannel {
    Email,
    Sms,
}

impl ContactChannel {
    pub const fn label(self) -> &'static str {
        match self {
            ContactChannel::Email => "email",
            ContactChannel::Sms => "sms",
        }
    }

    /// Attribute holding the recipient address for this channel.
    pub const fn recipient_key(self) -> AttributeKey {
        match self {
            ContactChannel::Email => AttributeKey::Email,
            ContactChannel::Sms => AttributeKey::Phone,
        }
    }
}

impl fmt::Display for ContactChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ContactChannel {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "email" | "e-mail" => Ok(ContactChannel::Email),
            "sms" | "text" => Ok(ContactChannel::Sms),
            _ => Err(UnknownLabel {
                kind: "contact channel",
                value: value.to_string(),
            }),
        }
    }
}

/// External CRM identifier returned by a successful sync.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrmRef(pub String);

impl fmt::Display for CrmRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append-only audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub status: LeadStatus,
    pub actor: String,
    pub note: String,
}

/// Successful outbound contact details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub channel: ContactChannel,
    pub template: String,
    pub provider_ref: String,
    pub at: DateTime<Utc>,
}

/// One call to the contact gateway, delivered or not. Kept beside the lead, never on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactAttempt {
    pub lead_id: LeadId,
    pub channel: ContactChannel,
    pub template: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// Expression of interest captured from a contacted lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EoiPayload {
    pub product_interest: String,
    #[serde(default)]
    pub budget_range: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl EoiPayload {
    pub fn new(product_interest: impl Into<String>) -> Self {
        Self {
            product_interest: product_interest.into(),
            budget_range: None,
            notes: None,
        }
    }

    pub fn summary(&self) -> String {
        let mut summary = format!("product interest: {}", self.product_interest.trim());
        if let Some(range) = self.budget_range.as_deref().map(str::trim) {
            if !range.is_empty() {
                summary.push_str(&format!("; budget range: {range}"));
            }
        }
        if let Some(notes) = self.notes.as_deref().map(str::trim) {
            if !notes.is_empty() {
                summary.push_str(&format!("; notes: {notes}"));
            }
        }
        summary
    }
}

/// Downstream owner a lead is handed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDestination {
    pub team: String,
    #[serde(default)]
    pub sales_team_available: bool,
}

/// How the downstream team picks up a transferred lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDisposition {
    LiveTransfer,
    PriorityCallback,
    ScheduleFollowUp,
}

impl TransferDisposition {
    pub fn route(tier: Option<QualificationTier>, sales_team_available: bool) -> Self {
        match (tier, sales_team_available) {
            (Some(QualificationTier::Priority), true) => TransferDisposition::LiveTransfer,
            (Some(QualificationTier::Priority), false) => TransferDisposition::PriorityCallback,
            _ => TransferDisposition::ScheduleFollowUp,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            TransferDisposition::LiveTransfer => "live transfer",
            TransferDisposition::PriorityCallback => "priority callback",
            TransferDisposition::ScheduleFollowUp => "schedule follow-up",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub team: String,
    pub disposition: TransferDisposition,
    pub at: DateTime<Utc>,
}

/// A lead and its full audit trail.
///
/// Fields are read-only outside the crate; every mutation goes through the lifecycle
/// controller so status, score, and history stay consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    id: LeadId,
    attributes: LeadAttributes,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    tier: Option<QualificationTier>,
    status: LeadStatus,
    history: Vec<HistoryEntry>,
    #[serde(default)]
    crm_ref: Option<CrmRef>,
    #[serde(default)]
    contact: Option<ContactRecord>,
    #[serde(default)]
    eoi: Option<EoiPayload>,
    #[serde(default)]
    transfer: Option<TransferRecord>,
    created_at: DateTime<Utc>,
    revision: u64,
}

impl Lead {
    pub(crate) fn create(
        id: LeadId,
        attributes: LeadAttributes,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            attributes,
            score: None,
            tier: None,
            status: LeadStatus::New,
            history: vec![HistoryEntry {
                at,
                status: LeadStatus::New,
                actor: actor.to_string(),
                note: "lead created".to_string(),
            }],
            crm_ref: None,
            contact: None,
            eoi: None,
            transfer: None,
            created_at: at,
            revision: 1,
        }
    }

    pub fn id(&self) -> &LeadId {
        &self.id
    }

    pub fn attributes(&self) -> &LeadAttributes {
        &self.attributes
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn tier(&self) -> Option<QualificationTier> {
        self.tier
    }

    pub fn status(&self) -> LeadStatus {
        self.status
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn crm_ref(&self) -> Option<&CrmRef> {
        self.crm_ref.as_ref()
    }

    pub fn contact(&self) -> Option<&ContactRecord> {
        self.contact.as_ref()
    }

    pub fn eoi(&self) -> Option<&EoiPayload> {
        self.eoi.as_ref()
    }

    pub fn transfer(&self) -> Option<&TransferRecord> {
        self.transfer.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Store revision; the first persisted version is revision 1.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True when the history shows the lead ever reached `status`.
    pub fn has_reached(&self, status: LeadStatus) -> bool {
        self.history.iter().any(|entry| entry.status == status)
    }

    pub fn status_view(&self) -> LeadStatusView {
        LeadStatusView {
            lead_id: self.id.clone(),
            status: self.status.label(),
            score: self.score,
            tier: self.tier.map(QualificationTier::label),
            crm_ref: self.crm_ref.clone(),
            last_note: self
                .history
                .last()
                .map(|entry| entry.note.clone())
                .unwrap_or_default(),
        }
    }

    pub(crate) fn record(
        &mut self,
        status: LeadStatus,
        actor: &str,
        note: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        self.status = status;
        self.history.push(HistoryEntry {
            at,
            status,
            actor: actor.to_string(),
            note: note.into(),
        });
    }

    pub(crate) fn apply_score(&mut self, score: f64, tier: QualificationTier) {
        self.score = Some(score);
        self.tier = Some(tier);
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut LeadAttributes {
        &mut self.attributes
    }

    pub(crate) fn set_contact(&mut self, contact: ContactRecord) {
        self.contact = Some(contact);
    }

    pub(crate) fn set_eoi(&mut self, eoi: EoiPayload) {
        self.eoi = Some(eoi);
    }

    pub(crate) fn set_transfer(&mut self, crm_ref: CrmRef, transfer: TransferRecord) {
        self.crm_ref = Some(crm_ref);
        self.transfer = Some(transfer);
    }

    pub(crate) fn bump_revision(&mut self) {
        self.revision += 1;
    }

    #[cfg(test)]
    pub(crate) fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }
}

/// Sanitized representation of a lead's exposed status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadStatusView {
    pub lead_id: LeadId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crm_ref: Option<CrmRef>,
    pub last_note: String,
}
