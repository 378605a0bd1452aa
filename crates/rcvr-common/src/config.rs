//! ---
//! rcvr_section: "01-core-functionality"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Shared primitives and utilities for the recovery runtime."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::credentials::split_key;
use crate::logging::LogFormat;
use crate::severity::Severity;

fn default_ledger_path() -> PathBuf {
    PathBuf::from("target/recovery/state.json")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 9899))
}

fn default_executor_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_recent_window() -> usize {
    20
}

fn default_check_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_check_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_website_url() -> String {
    "http://127.0.0.1:8080/".to_owned()
}

fn default_website_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_website_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("target/recovery/backups")
}

fn default_restore_dir() -> PathBuf {
    PathBuf::from("target/recovery/restore")
}

fn default_credential_candidates() -> Vec<String> {
    vec!["github.token".to_owned(), "github.fallback_token".to_owned()]
}

fn default_scan_directory() -> PathBuf {
    PathBuf::from("target/recovery/data")
}

fn default_scan_max_files() -> usize {
    10_000
}

/// Primary configuration object for the recovery runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// `[credentials.<section>]` tables of `<option> = "<value>"` pairs.
    #[serde(default)]
    pub credentials: IndexMap<String, IndexMap<String, String>>,
    /// Prerequisite token definitions keyed by token name.
    #[serde(default)]
    pub prerequisites: IndexMap<String, PrerequisiteConfig>,
    #[serde(default)]
    pub procedures: ProceduresConfig,
    #[serde(default)]
    pub health_checks: Vec<HealthCheckConfig>,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "RCVR_CONFIG";

    /// Load configuration from disk, respecting the `RCVR_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Look up a health check definition by identifier.
    pub fn health_check(&self, id: &str) -> Option<&HealthCheckConfig> {
        self.health_checks.iter().find(|check| check.id == id)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.orchestrator.validate()?;

        for (token, prerequisite) in &self.prerequisites {
            if token.trim().is_empty() {
                return Err(anyhow!("prerequisite tokens cannot be empty"));
            }
            if let PrerequisiteConfig::Credential { credential } = prerequisite {
                if split_key(credential).is_none() {
                    return Err(anyhow!(
                        "prerequisite '{}' references credential '{}' which is not in section.option form",
                        token,
                        credential
                    ));
                }
            }
        }

        let mut seen = HashSet::new();
        for check in &self.health_checks {
            check.validate()?;
            if !seen.insert(check.id.as_str()) {
                return Err(anyhow!("health check '{}' is declared twice", check.id));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
        }
    }
}

/// Tuning for the recovery orchestrator.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound on a single executor invocation before it is recorded as an error.
    #[serde(default = "default_executor_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub executor_timeout: Duration,
    /// Number of most recent history entries used for the success rate.
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.executor_timeout.is_zero() {
            return Err(anyhow!("orchestrator.executor_timeout must be greater than zero"));
        }
        if self.recent_window == 0 {
            return Err(anyhow!("orchestrator.recent_window must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            executor_timeout: default_executor_timeout(),
            recent_window: default_recent_window(),
        }
    }
}

/// Definition of a named prerequisite token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PrerequisiteConfig {
    /// Satisfied when the `section.option` credential resolves to a non-blank value.
    Credential { credential: String },
    /// Satisfied when the path exists (and is writable when requested).
    Path {
        path: PathBuf,
        #[serde(default)]
        writable: bool,
    },
}

/// Settings for the executors shipped with the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProceduresConfig {
    #[serde(default)]
    pub website: WebsiteProcedureConfig,
    #[serde(default)]
    pub data: DataProcedureConfig,
    #[serde(default)]
    pub credentials: CredentialFailoverConfig,
    #[serde(default)]
    pub scan: ScanProcedureConfig,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteProcedureConfig {
    #[serde(default = "default_website_url")]
    pub url: String,
    #[serde(default = "default_website_retry_delay")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub retry_delay: Duration,
    #[serde(default = "default_website_request_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
}

impl Default for WebsiteProcedureConfig {
    fn default() -> Self {
        Self {
            url: default_website_url(),
            retry_delay: default_website_retry_delay(),
            request_timeout: default_website_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataProcedureConfig {
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    #[serde(default = "default_restore_dir")]
    pub restore_dir: PathBuf,
}

impl Default for DataProcedureConfig {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            restore_dir: default_restore_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialFailoverConfig {
    /// Ordered `section.option` keys tried until one resolves.
    #[serde(default = "default_credential_candidates")]
    pub candidates: Vec<String>,
}

impl Default for CredentialFailoverConfig {
    fn default() -> Self {
        Self {
            candidates: default_credential_candidates(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProcedureConfig {
    #[serde(default = "default_scan_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_scan_max_files")]
    pub max_files: usize,
}

impl Default for ScanProcedureConfig {
    fn default() -> Self {
        Self {
            directory: default_scan_directory(),
            max_files: default_scan_max_files(),
        }
    }
}

/// A periodic probe declared in configuration.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    pub id: String,
    #[serde(default = "default_check_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub interval: Duration,
    #[serde(default = "default_check_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
    pub probe: ProbeConfig,
    #[serde(default)]
    pub on_unhealthy: UnhealthyAction,
}

impl HealthCheckConfig {
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(anyhow!("health check ids cannot be empty"));
        }
        if self.interval.is_zero() {
            return Err(anyhow!("health check '{}' must use a non-zero interval", self.id));
        }
        if self.timeout.is_zero() {
            return Err(anyhow!("health check '{}' must use a non-zero timeout", self.id));
        }
        if let ProbeConfig::Credential { credential } = &self.probe {
            if split_key(credential).is_none() {
                return Err(anyhow!(
                    "health check '{}' references credential '{}' which is not in section.option form",
                    self.id,
                    credential
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeConfig {
    Http {
        url: String,
    },
    Path {
        path: PathBuf,
        #[serde(default)]
        writable: bool,
    },
    Credential {
        credential: String,
    },
}

/// Reaction configured for an unhealthy verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnhealthyAction {
    #[default]
    Log,
    /// Trigger the named recovery procedure.
    Trigger(String),
    /// Open an incident for an operator instead of recovering automatically.
    Manual {
        name: String,
        #[serde(default)]
        severity: Severity,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [ledger]
        path = "/tmp/rcvr/state.json"

        [orchestrator]
        executor_timeout = 45
        recent_window = 5

        [credentials.github]
        token = "ghp_example"

        [prerequisites]
        github_access = { credential = "github.token" }
        backup_access = { path = "/var/backups", writable = true }

        [procedures.website]
        url = "https://example.invalid/health"

        [[health_checks]]
        id = "website"
        interval = 30
        probe = { kind = "http", url = "https://example.invalid/health" }
        on_unhealthy = { trigger = "website_recovery" }

        [[health_checks]]
        id = "backups"
        probe = { kind = "path", path = "/var/backups" }
        on_unhealthy = { manual = { name = "Backup volume missing", severity = "critical" } }

        [[health_checks]]
        id = "token"
        probe = { kind = "credential", credential = "github.token" }
    "#;

    #[test]
    fn parses_full_configuration() {
        let config: AppConfig = SAMPLE.parse().unwrap();
        assert_eq!(config.ledger.path, PathBuf::from("/tmp/rcvr/state.json"));
        assert_eq!(config.orchestrator.executor_timeout, Duration::from_secs(45));
        assert_eq!(config.orchestrator.recent_window, 5);
        assert_eq!(config.credentials["github"]["token"], "ghp_example");
        assert_eq!(
            config.prerequisites["backup_access"],
            PrerequisiteConfig::Path {
                path: PathBuf::from("/var/backups"),
                writable: true
            }
        );
        assert_eq!(config.procedures.website.url, "https://example.invalid/health");
        assert_eq!(config.procedures.data.backup_dir, default_backup_dir());

        let website = config.health_check("website").unwrap();
        assert_eq!(website.interval, Duration::from_secs(30));
        assert_eq!(website.timeout, default_check_timeout());
        assert_eq!(
            website.on_unhealthy,
            UnhealthyAction::Trigger("website_recovery".into())
        );
        assert_eq!(
            config.health_check("backups").unwrap().on_unhealthy,
            UnhealthyAction::Manual {
                name: "Backup volume missing".into(),
                severity: Severity::Critical
            }
        );
        assert_eq!(
            config.health_check("token").unwrap().on_unhealthy,
            UnhealthyAction::Log
        );
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config: AppConfig = "".parse().unwrap();
        assert_eq!(config.ledger.path, default_ledger_path());
        assert_eq!(config.orchestrator.executor_timeout, Duration::from_secs(300));
        assert!(config.health_checks.is_empty());
        assert_eq!(config.procedures.credentials.candidates.len(), 2);
    }

    #[test]
    fn rejects_duplicate_health_checks() {
        let raw = r#"
            [[health_checks]]
            id = "dup"
            probe = { kind = "path", path = "/tmp" }

            [[health_checks]]
            id = "dup"
            probe = { kind = "path", path = "/tmp" }
        "#;
        let err = raw.parse::<AppConfig>().unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn rejects_zero_interval_and_malformed_credentials() {
        let zero = r#"
            [[health_checks]]
            id = "fast"
            interval = 0
            probe = { kind = "path", path = "/tmp" }
        "#;
        assert!(zero.parse::<AppConfig>().is_err());

        let malformed = r#"
            [prerequisites]
            github_access = { credential = "token" }
        "#;
        assert!(malformed.parse::<AppConfig>().is_err());
    }

    #[test]
    fn load_prefers_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("rcvr.toml");
        fs::write(&present, "[orchestrator]\nrecent_window = 3\n").unwrap();
        let missing = dir.path().join("missing.toml");

        let loaded = AppConfig::load_with_source(&[missing, present.clone()]).unwrap();
        assert_eq!(loaded.source, present);
        assert_eq!(loaded.config.orchestrator.recent_window, 3);
    }
}
