use chrono::NaiveDate;
use lead_agent::config::{AppConfig, CrmConfig, OutboundConfig};
use lead_agent::error::AppError;
use lead_agent::workflows::leads::store::check_revision;
use lead_agent::workflows::leads::{
    ContactAttempt, ContactChannel, ContactGateway, ContactRequest, CrmRef, CrmSync,
    DeliveryError, DeliveryResult, Lead, LeadFilter, LeadId, LeadLifecycleController, LeadStore,
    StoreError, SyncError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub(crate) type LeadController =
    LeadLifecycleController<JsonFileLeadStore, LoggingContactGateway, LoggingCrmSync>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Wire the controller from configuration. Fails when the store file is unreadable or the
/// template directory cannot be listed.
pub(crate) fn build_controller(config: &AppConfig) -> Result<LeadController, AppError> {
    let store = JsonFileLeadStore::open(&config.storage.lead_store_path)?;
    let contact = LoggingContactGateway::from_config(&config.outbound)?;
    let crm = LoggingCrmSync::from_config(&config.crm);

    info!(
        store = %config.storage.lead_store_path.display(),
        leads = store.len(),
        "lead store opened"
    );

    Ok(LeadLifecycleController::new(
        Arc::new(store),
        Arc::new(contact),
        Arc::new(crm),
        config.lifecycle.clone(),
    ))
}

/// Lead store persisted as one JSON document holding the leads and the contact attempt log.
/// Every successful write rewrites the file through a sibling temp file and a rename.
#[derive(Debug)]
pub(crate) struct JsonFileLeadStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    leads: HashMap<LeadId, Lead>,
    attempts: Vec<ContactAttempt>,
}

/// On-disk layout. A bare lead array is still read so older files keep opening.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoreFile {
    Document {
        leads: Vec<Lead>,
        #[serde(default)]
        contact_attempts: Vec<ContactAttempt>,
    },
    Leads(Vec<Lead>),
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    leads: Vec<&'a Lead>,
    contact_attempts: &'a [ContactAttempt],
}

impl JsonFileLeadStore {
    pub(crate) fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => StoreState::default(),
            Ok(raw) => {
                let file: StoreFile = serde_json::from_str(&raw).map_err(|err| {
                    StoreError::Unavailable(format!("{} is not a lead store: {err}", path.display()))
                })?;
                let (leads, attempts) = match file {
                    StoreFile::Document {
                        leads,
                        contact_attempts,
                    } => (leads, contact_attempts),
                    StoreFile::Leads(leads) => (leads, Vec::new()),
                };
                StoreState {
                    leads: leads
                        .into_iter()
                        .map(|lead| (lead.id().clone(), lead))
                        .collect(),
                    attempts,
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => StoreState::default(),
            Err(err) => {
                return Err(StoreError::Unavailable(format!(
                    "cannot read {}: {err}",
                    path.display()
                )))
            }
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.state().map(|guard| guard.leads.len()).unwrap_or(0)
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("lead store mutex poisoned".to_string()))
    }

    fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        let mut leads: Vec<&Lead> = state.leads.values().collect();
        leads.sort_by(|a, b| a.id().cmp(b.id()));
        let document = StoreFileRef {
            leads,
            contact_attempts: &state.attempts,
        };

        let unavailable = |err: io::Error| {
            StoreError::Unavailable(format!("cannot write {}: {err}", self.path.display()))
        };
        let payload =
            serde_json::to_vec_pretty(&document).map_err(|err| unavailable(err.into()))?;

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(unavailable)?;
        }
        let staging = staging_path(&self.path);
        fs::write(&staging, payload).map_err(unavailable)?;
        fs::rename(&staging, &self.path).map_err(unavailable)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl LeadStore for JsonFileLeadStore {
    fn get(&self, id: &LeadId) -> Result<Lead, StoreError> {
        self.state()?
            .leads
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn put(&self, lead: Lead) -> Result<Lead, StoreError> {
        let mut guard = self.state()?;
        check_revision(guard.leads.get(lead.id()), &lead)?;

        let id = lead.id().clone();
        let previous = guard.leads.insert(id.clone(), lead.clone());
        if let Err(err) = self.persist(&guard) {
            match previous {
                Some(previous) => guard.leads.insert(id, previous),
                None => guard.leads.remove(&id),
            };
            warn!(lead_id = %lead.id(), error = %err, "lead store write failed");
            return Err(err);
        }
        Ok(lead)
    }

    fn list(&self, filter: &LeadFilter) -> Result<Vec<Lead>, StoreError> {
        let guard = self.state()?;
        let mut leads: Vec<Lead> = guard
            .leads
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
        let mut guard = self.state()?;
        guard.attempts.push(attempt);
        if let Err(err) = self.persist(&guard) {
            guard.attempts.pop();
            return Err(err);
        }
        Ok(())
    }

    fn attempts(&self) -> Result<Vec<ContactAttempt>, StoreError> {
        Ok(self.state()?.attempts.clone())
    }
}

/// Message templates keyed by file stem.
#[derive(Debug, Clone, Default)]
pub(crate) struct TemplateCatalog {
    templates: BTreeMap<String, String>,
}

impl TemplateCatalog {
    pub(crate) fn load(dir: &Path) -> io::Result<Self> {
        let mut templates = BTreeMap::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("txt") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                templates.insert(stem.to_string(), fs::read_to_string(&path)?);
            }
        }
        Ok(Self { templates })
    }

    pub(crate) fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    /// Substitute `{placeholder}` markers from the payload; unknown markers stay as written.
    pub(crate) fn render(&self, name: &str, payload: &BTreeMap<String, String>) -> Option<String> {
        let mut body = self.templates.get(name)?.clone();
        for (key, value) in payload {
            body = body.replace(&format!("{{{key}}}"), value);
        }
        Some(body)
    }
}

/// Contact gateway that records deliveries in the log instead of calling a provider.
#[derive(Debug)]
pub(crate) struct LoggingContactGateway {
    catalog: Option<TemplateCatalog>,
    email_sender: Option<String>,
    sms_sender: Option<String>,
    email_login: bool,
    sms_login: bool,
    sequence: AtomicU64,
}

impl LoggingContactGateway {
    pub(crate) fn new(catalog: Option<TemplateCatalog>) -> Self {
        Self {
            catalog,
            email_sender: None,
            sms_sender: None,
            email_login: false,
            sms_login: false,
            sequence: AtomicU64::new(0),
        }
    }

    pub(crate) fn from_config(config: &OutboundConfig) -> Result<Self, AppError> {
        let catalog = match &config.template_dir {
            Some(dir) => {
                let catalog = TemplateCatalog::load(dir)?;
                debug!(templates = ?catalog.names(), "template catalog loaded");
                Some(catalog)
            }
            None => None,
        };

        let email_login = config.email.has_login();
        let sms_login = config.sms.has_login();
        info!(
            smtp_server = config.email.smtp_server.as_deref().unwrap_or("unset"),
            smtp_port = config.email.smtp_port,
            email_login,
            sms_login,
            "contact credentials resolved"
        );

        Ok(Self {
            email_sender: config.email.sender.clone(),
            sms_sender: config.sms.from_number.clone(),
            email_login,
            sms_login,
            ..Self::new(catalog)
        })
    }
}

impl ContactGateway for LoggingContactGateway {
    fn send(&self, request: &ContactRequest) -> Result<DeliveryResult, DeliveryError> {
        let body = match &self.catalog {
            Some(catalog) => catalog
                .render(&request.template, &request.payload)
                .ok_or_else(|| {
                    DeliveryError::Rejected(format!("unknown template '{}'", request.template))
                })?,
            None => String::new(),
        };

        let (prefix, sender, authenticated) = match request.channel {
            ContactChannel::Email => ("EMAIL", self.email_sender.as_deref(), self.email_login),
            ContactChannel::Sms => ("SMS", self.sms_sender.as_deref(), self.sms_login),
        };
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let provider_ref = format!("{prefix}-{sequence:06}");

        info!(
            lead_id = %request.lead_id,
            channel = %request.channel,
            recipient = %request.recipient,
            sender = sender.unwrap_or("unset"),
            authenticated,
            template = %request.template,
            body_len = body.len(),
            %provider_ref,
            "outbound message dispatched"
        );
        Ok(DeliveryResult::delivered(provider_ref))
    }
}

/// CRM sync that logs the push and hands out sequential references.
#[derive(Debug)]
pub(crate) struct LoggingCrmSync {
    endpoint: Option<String>,
    authenticated: bool,
    sequence: AtomicU64,
}

impl LoggingCrmSync {
    pub(crate) fn new(endpoint: Option<String>) -> Self {
        Self {
            endpoint,
            authenticated: false,
            sequence: AtomicU64::new(0),
        }
    }

    pub(crate) fn from_config(config: &CrmConfig) -> Self {
        let authenticated = config.has_api_key();
        info!(
            endpoint = config.api_url.as_deref().unwrap_or("unset"),
            authenticated,
            "crm credentials resolved"
        );
        Self {
            authenticated,
            ..Self::new(config.api_url.clone())
        }
    }
}

impl CrmSync for LoggingCrmSync {
    fn push(&self, lead: &Lead) -> Result<CrmRef, SyncError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let crm_ref = CrmRef(format!("CRM-{sequence:06}"));
        info!(
            lead_id = %lead.id(),
            endpoint = self.endpoint.as_deref().unwrap_or("unset"),
            authenticated = self.authenticated,
            %crm_ref,
            "lead pushed to crm"
        );
        Ok(crm_ref)
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lead_agent::workflows::leads::{LeadAttributes, LeadStatus, LifecycleConfig};
    use tempfile::tempdir;

    fn controller_over(
        store: JsonFileLeadStore,
    ) -> LeadLifecycleController<JsonFileLeadStore, LoggingContactGateway, LoggingCrmSync> {
        LeadLifecycleController::new(
            Arc::new(store),
            Arc::new(LoggingContactGateway::new(None)),
            Arc::new(LoggingCrmSync::new(None)),
            LifecycleConfig::default(),
        )
    }

    #[test]
    fn missing_store_file_opens_empty() {
        let dir = tempdir().expect("temp dir");
        let store = JsonFileLeadStore::open(dir.path().join("leads.json")).expect("opens");
        assert_eq!(store.len(), 0);
        assert!(store
            .list(&LeadFilter::all())
            .expect("list")
            .is_empty());
    }

    #[test]
    fn corrupt_store_file_is_rejected() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("leads.json");
        fs::write(&path, "{ not json").expect("write");

        let err = JsonFileLeadStore::open(&path).expect_err("corrupt file rejected");
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn leads_survive_a_reopen() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("leads.json");

        let controller = controller_over(JsonFileLeadStore::open(&path).expect("opens"));
        let lead = controller
            .generate_lead(LeadAttributes::new().with("budget", 95.0).with("need", 90.0))
            .expect("generated");
        controller.qualify_lead(lead.id()).expect("qualified");
        assert!(!staging_path(&path).exists());

        let reopened = JsonFileLeadStore::open(&path).expect("reopens");
        let stored = reopened.get(lead.id()).expect("lead persisted");
        assert_eq!(stored.revision(), 2);
        assert_eq!(stored.history().len(), 2);
        assert!(stored.score().is_some());
        assert_ne!(stored.status(), LeadStatus::New);
    }

    #[test]
    fn contact_attempts_survive_a_reopen() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("leads.json");

        let controller = controller_over(JsonFileLeadStore::open(&path).expect("opens"));
        let lead = controller
            .generate_lead(
                LeadAttributes::new()
                    .with("email", "dana@harbor.example")
                    .with("budget", 95.0)
                    .with("need", 90.0)
                    .with("authority", 90.0)
                    .with("timeline", 90.0),
            )
            .expect("generated");
        controller.qualify_lead(lead.id()).expect("qualified");
        controller
            .send_outbound_contact(lead.id(), ContactChannel::Email, "intro")
            .expect("contacted");

        let reopened = JsonFileLeadStore::open(&path).expect("reopens");
        let attempts = reopened.attempts().expect("attempts");
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].success);
        assert_eq!(attempts[0].lead_id, *lead.id());
        assert_eq!(attempts[0].provider_ref.as_deref(), Some("EMAIL-000001"));
    }

    #[test]
    fn bare_lead_array_still_opens() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("leads.json");
        let controller = controller_over(JsonFileLeadStore::open(&path).expect("opens"));
        let lead = controller
            .generate_lead(LeadAttributes::new().with("budget", 40.0))
            .expect("generated");

        let leads = controller.store().list(&LeadFilter::all()).expect("list");
        fs::write(&path, serde_json::to_vec(&leads).expect("encode")).expect("write");

        let reopened = JsonFileLeadStore::open(&path).expect("legacy file opens");
        assert_eq!(reopened.len(), 1);
        assert!(reopened.get(lead.id()).is_ok());
        assert!(reopened.attempts().expect("attempts").is_empty());
    }

    #[test]
    fn stale_write_is_rejected_and_not_persisted() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("leads.json");
        let store = Arc::new(JsonFileLeadStore::open(&path).expect("opens"));
        let controller = LeadLifecycleController::new(
            store.clone(),
            Arc::new(LoggingContactGateway::new(None)),
            Arc::new(LoggingCrmSync::new(None)),
            LifecycleConfig::default(),
        );
        let lead = controller
            .generate_lead(LeadAttributes::new().with("budget", 10.0))
            .expect("generated");
        controller.close_lead(lead.id(), "spam").expect("closed");

        let err = store.put(lead.clone()).expect_err("stale revision");
        assert!(matches!(err, StoreError::Conflict { .. }));

        let reopened = JsonFileLeadStore::open(&path).expect("reopens");
        assert_eq!(
            reopened.get(lead.id()).expect("stored").status(),
            LeadStatus::Closed
        );
    }

    #[test]
    fn catalog_loads_txt_templates_and_renders_placeholders() {
        let dir = tempdir().expect("temp dir");
        fs::write(dir.path().join("intro.txt"), "Hi {name} at {company} ({lead_id})")
            .expect("write");
        fs::write(dir.path().join("notes.md"), "ignored").expect("write");

        let catalog = TemplateCatalog::load(dir.path()).expect("catalog loads");
        assert_eq!(catalog.names(), vec!["intro"]);

        let payload = BTreeMap::from([
            ("name".to_string(), "Dana".to_string()),
            ("company".to_string(), "Harbor".to_string()),
            ("lead_id".to_string(), "LEAD_1".to_string()),
        ]);
        assert_eq!(
            catalog.render("intro", &payload).as_deref(),
            Some("Hi Dana at Harbor (LEAD_1)")
        );
        assert!(catalog.render("missing", &payload).is_none());
    }

    #[test]
    fn gateway_rejects_unknown_template_when_catalog_loaded() {
        let gateway = LoggingContactGateway::new(Some(TemplateCatalog::default()));
        let request = ContactRequest {
            lead_id: LeadId("LEAD_1".to_string()),
            channel: ContactChannel::Email,
            recipient: "dana@harbor.example".to_string(),
            template: "intro".to_string(),
            payload: BTreeMap::new(),
        };

        let err = gateway.send(&request).expect_err("unknown template");
        assert!(matches!(err, DeliveryError::Rejected(_)));

        let open_gateway = LoggingContactGateway::new(None);
        let first = open_gateway.send(&request).expect("delivered");
        let second = open_gateway
            .send(&ContactRequest {
                channel: ContactChannel::Sms,
                ..request
            })
            .expect("delivered");
        assert_eq!(first.provider_ref, "EMAIL-000001");
        assert_eq!(second.provider_ref, "SMS-000002");
    }

    #[test]
    fn adapters_pick_up_configured_credentials() {
        let vars = [
            ("SMTP_SERVER", "smtp.harbor.example"),
            ("SMTP_USERNAME", "agent"),
            ("SMTP_PASSWORD", "hunter2"),
            ("TWILIO_ACCOUNT_SID", "AC123"),
            ("CRM_API_URL", "https://crm.harbor.example"),
            ("CRM_API_KEY", "crm-key"),
        ];
        let config = AppConfig::from_lookup(|name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        })
        .expect("config loads");

        let gateway = LoggingContactGateway::from_config(&config.outbound).expect("gateway");
        assert!(gateway.email_login);
        assert!(!gateway.sms_login);

        let crm = LoggingCrmSync::from_config(&config.crm);
        assert!(crm.authenticated);
        assert_eq!(crm.endpoint.as_deref(), Some("https://crm.harbor.example"));
        assert!(!LoggingCrmSync::new(None).authenticated);
    }

    #[test]
    fn parse_date_reports_bad_input() {
        assert_eq!(
            parse_date("2025-03-01"),
            Ok(NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid"))
        );
        assert!(parse_date("03/01/2025").is_err());
    }
}
