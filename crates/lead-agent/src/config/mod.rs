use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::leads::domain::{AttributeKey, ScoringFactor, UnknownLabel};
use crate::workflows::leads::lifecycle::LifecycleConfig;
use crate::workflows::leads::scoring::{
    ScoringConfig, ScoringConfigError, DEFAULT_PRIORITY_THRESHOLD,
    DEFAULT_QUALIFICATION_THRESHOLD, DEFAULT_RESEARCH_THRESHOLD,
};

const DEFAULT_STORE_PATH: &str = "leads.json";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_ACTOR: &str = "lead-agent";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub lifecycle: LifecycleConfig,
    pub outbound: OutboundConfig,
    pub crm: CrmConfig,
}

impl AppConfig {
    /// Load from the process environment, honoring a `.env` file when present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let environment =
            AppEnvironment::from_str(&var("APP_ENV").unwrap_or_else(|| "development".to_string()));

        let host = var("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = var("APP_PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var("APP_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let lead_store_path =
            PathBuf::from(var("LEAD_STORE_PATH").unwrap_or_else(|| DEFAULT_STORE_PATH.to_string()));

        let qualification_threshold = parse_number(
            "LEAD_QUALIFICATION_THRESHOLD",
            var("LEAD_QUALIFICATION_THRESHOLD"),
            DEFAULT_QUALIFICATION_THRESHOLD,
        )?;
        // Unset tier thresholds follow the qualification threshold so a lone override stays valid.
        let scoring = ScoringConfig {
            qualification_threshold,
            priority_threshold: parse_number(
                "LEAD_PRIORITY_THRESHOLD",
                var("LEAD_PRIORITY_THRESHOLD"),
                DEFAULT_PRIORITY_THRESHOLD.max(qualification_threshold),
            )?,
            research_threshold: parse_number(
                "LEAD_RESEARCH_THRESHOLD",
                var("LEAD_RESEARCH_THRESHOLD"),
                DEFAULT_RESEARCH_THRESHOLD.min(qualification_threshold),
            )?,
            weights: match var("LEAD_SCORING_WEIGHTS") {
                Some(raw) => parse_weights(&raw)?,
                None => ScoringConfig::default_weights(),
            },
        };
        scoring.validate().map_err(ConfigError::Scoring)?;

        let required_fields = match var("LEAD_REQUIRED_FIELDS") {
            Some(raw) => parse_required_fields(&raw)?,
            None => Vec::new(),
        };

        let actor = var("LEAD_ACTOR").unwrap_or_else(|| DEFAULT_ACTOR.to_string());

        let smtp_port = match var("SMTP_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidNumber {
                variable: "SMTP_PORT",
                value: raw,
            })?,
            None => DEFAULT_SMTP_PORT,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig { lead_store_path },
            lifecycle: LifecycleConfig {
                scoring,
                required_fields,
                actor,
            },
            outbound: OutboundConfig {
                template_dir: var("EMAIL_TEMPLATE_DIR").map(PathBuf::from),
                email: EmailCredentials {
                    sender: var("EMAIL_SENDER"),
                    smtp_server: var("SMTP_SERVER"),
                    smtp_port,
                    username: var("SMTP_USERNAME"),
                    password: var("SMTP_PASSWORD").map(Secret::new),
                },
                sms: SmsCredentials {
                    account_sid: var("TWILIO_ACCOUNT_SID"),
                    auth_token: var("TWILIO_AUTH_TOKEN").map(Secret::new),
                    from_number: var("TWILIO_PHONE_NUMBER"),
                },
            },
            crm: CrmConfig {
                api_url: var("CRM_API_URL"),
                api_key: var("CRM_API_KEY").map(Secret::new),
            },
        })
    }
}

fn parse_number(
    variable: &'static str,
    raw: Option<String>,
    default: f64,
) -> Result<f64, ConfigError> {
    match raw {
        Some(value) => value
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidNumber { variable, value }),
        None => Ok(default),
    }
}

fn parse_weights(raw: &str) -> Result<BTreeMap<ScoringFactor, f64>, ConfigError> {
    let mut weights = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (name, weight) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidWeight {
                entry: entry.to_string(),
            })?;
        let factor = name
            .parse::<ScoringFactor>()
            .map_err(|source| ConfigError::UnknownLabel {
                variable: "LEAD_SCORING_WEIGHTS",
                source,
            })?;
        let weight = weight
            .trim()
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidWeight {
                entry: entry.to_string(),
            })?;
        weights.insert(factor, weight);
    }
    Ok(weights)
}

fn parse_required_fields(raw: &str) -> Result<Vec<AttributeKey>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.parse::<AttributeKey>()
                .map_err(|source| ConfigError::UnknownLabel {
                    variable: "LEAD_REQUIRED_FIELDS",
                    source,
                })
        })
        .collect()
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Location of the lead store.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub lead_store_path: PathBuf,
}

/// Outbound contact provider settings.
#[derive(Debug, Clone)]
pub struct OutboundConfig {
    pub template_dir: Option<PathBuf>,
    pub email: EmailCredentials,
    pub sms: SmsCredentials,
}

#[derive(Debug, Clone)]
pub struct EmailCredentials {
    pub sender: Option<String>,
    pub smtp_server: Option<String>,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<Secret>,
}

impl EmailCredentials {
    /// SMTP login needs a server, a username and a non-empty password.
    pub fn has_login(&self) -> bool {
        self.smtp_server.is_some() && self.username.is_some() && is_set(&self.password)
    }
}

#[derive(Debug, Clone)]
pub struct SmsCredentials {
    pub account_sid: Option<String>,
    pub auth_token: Option<Secret>,
    pub from_number: Option<String>,
}

impl SmsCredentials {
    pub fn has_login(&self) -> bool {
        self.account_sid.is_some() && is_set(&self.auth_token)
    }
}

#[derive(Debug, Clone)]
pub struct CrmConfig {
    pub api_url: Option<String>,
    pub api_key: Option<Secret>,
}

impl CrmConfig {
    pub fn has_api_key(&self) -> bool {
        is_set(&self.api_key)
    }
}

fn is_set(secret: &Option<Secret>) -> bool {
    secret
        .as_ref()
        .is_some_and(|secret| !secret.expose().trim().is_empty())
}

/// Credential value that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidNumber {
        variable: &'static str,
        value: String,
    },
    InvalidWeight {
        entry: String,
    },
    UnknownLabel {
        variable: &'static str,
        source: UnknownLabel,
    },
    Scoring(ScoringConfigError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable, value } => {
                write!(f, "{variable} must be numeric (found '{value}')")
            }
            ConfigError::InvalidWeight { entry } => write!(
                f,
                "LEAD_SCORING_WEIGHTS entry '{entry}' must look like factor=weight"
            ),
            ConfigError::UnknownLabel { variable, source } => write!(f, "{variable}: {source}"),
            ConfigError::Scoring(err) => write!(f, "scoring configuration invalid: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::UnknownLabel { source, .. } => Some(source),
            ConfigError::Scoring(err) => Some(err),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidWeight { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "LEAD_STORE_PATH",
            "LEAD_QUALIFICATION_THRESHOLD",
            "LEAD_PRIORITY_THRESHOLD",
            "LEAD_RESEARCH_THRESHOLD",
            "LEAD_SCORING_WEIGHTS",
            "LEAD_REQUIRED_FIELDS",
            "LEAD_ACTOR",
        ] {
            env::remove_var(name);
        }
    }

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.lifecycle.scoring, ScoringConfig::default());
        assert!(config.lifecycle.required_fields.is_empty());
        assert_eq!(config.lifecycle.actor, "lead-agent");
    }

    #[test]
    fn accepts_localhost_host() {
        let config = from_pairs(&[("APP_HOST", "localhost")]).expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn parses_weight_table_and_threshold() {
        let config = from_pairs(&[
            ("LEAD_QUALIFICATION_THRESHOLD", "70"),
            ("LEAD_SCORING_WEIGHTS", "budget=0.5, urgency = 0.5"),
        ])
        .expect("config loads");

        let scoring = &config.lifecycle.scoring;
        assert_eq!(scoring.qualification_threshold, 70.0);
        assert_eq!(scoring.weights.len(), 2);
        assert_eq!(scoring.weight(ScoringFactor::Budget), 0.5);
        assert_eq!(scoring.weight(ScoringFactor::Urgency), 0.5);
        assert_eq!(scoring.weight(ScoringFactor::Need), 0.0);
    }

    #[test]
    fn rejects_unknown_weight_factor() {
        let err = from_pairs(&[("LEAD_SCORING_WEIGHTS", "budget=0.5,shoe_size=0.5")])
            .expect_err("unknown factor rejected");
        assert!(matches!(
            err,
            ConfigError::UnknownLabel {
                variable: "LEAD_SCORING_WEIGHTS",
                ..
            }
        ));
    }

    #[test]
    fn rejects_malformed_weight_entry() {
        let err = from_pairs(&[("LEAD_SCORING_WEIGHTS", "budget")]).expect_err("rejected");
        assert!(matches!(err, ConfigError::InvalidWeight { .. }));
    }

    #[test]
    fn rejects_threshold_outside_score_range() {
        let err = from_pairs(&[("LEAD_QUALIFICATION_THRESHOLD", "140")]).expect_err("rejected");
        assert!(matches!(
            err,
            ConfigError::Scoring(ScoringConfigError::ThresholdOutOfRange { .. })
        ));
    }

    #[test]
    fn lone_qualification_override_keeps_tiers_ordered() {
        let config = from_pairs(&[("LEAD_QUALIFICATION_THRESHOLD", "90")]).expect("config loads");
        let scoring = &config.lifecycle.scoring;
        assert_eq!(scoring.priority_threshold, 90.0);
        assert_eq!(scoring.research_threshold, 40.0);
    }

    #[test]
    fn rejects_inverted_explicit_thresholds() {
        let err = from_pairs(&[
            ("LEAD_QUALIFICATION_THRESHOLD", "80"),
            ("LEAD_PRIORITY_THRESHOLD", "60"),
        ])
        .expect_err("rejected");
        assert!(matches!(
            err,
            ConfigError::Scoring(ScoringConfigError::ThresholdOrder { .. })
        ));
    }

    #[test]
    fn rejects_non_numeric_threshold() {
        let err = from_pairs(&[("LEAD_QUALIFICATION_THRESHOLD", "high")]).expect_err("rejected");
        assert!(err.to_string().contains("LEAD_QUALIFICATION_THRESHOLD"));
    }

    #[test]
    fn parses_required_fields() {
        let config = from_pairs(&[("LEAD_REQUIRED_FIELDS", "email, company")]).expect("loads");
        assert_eq!(
            config.lifecycle.required_fields,
            vec![AttributeKey::Email, AttributeKey::Company]
        );
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let config = from_pairs(&[("CRM_API_KEY", "top-secret"), ("SMTP_PASSWORD", "hunter2")])
            .expect("loads");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("hunter2"));
        assert_eq!(
            config.crm.api_key.as_ref().map(Secret::expose),
            Some("top-secret")
        );
    }

    #[test]
    fn provider_logins_need_every_credential() {
        let config = from_pairs(&[
            ("SMTP_SERVER", "smtp.harbor.example"),
            ("SMTP_USERNAME", "agent"),
            ("TWILIO_ACCOUNT_SID", "AC123"),
            ("CRM_API_KEY", "crm-key"),
        ])
        .expect("loads");
        assert!(!config.outbound.email.has_login());
        assert!(!config.outbound.sms.has_login());
        assert!(config.crm.has_api_key());

        let config = from_pairs(&[
            ("SMTP_SERVER", "smtp.harbor.example"),
            ("SMTP_USERNAME", "agent"),
            ("SMTP_PASSWORD", "hunter2"),
            ("TWILIO_ACCOUNT_SID", "AC123"),
            ("TWILIO_AUTH_TOKEN", "token"),
        ])
        .expect("loads");
        assert!(config.outbound.email.has_login());
        assert!(config.outbound.sms.has_login());
        assert!(!config.crm.has_api_key());

        let blank = CrmConfig {
            api_url: None,
            api_key: Some(Secret::new("  ")),
        };
        assert!(!blank.has_api_key());
    }
}
