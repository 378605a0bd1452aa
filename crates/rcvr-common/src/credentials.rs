//! ---
//! rcvr_section: "01-core-functionality"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Credential and configuration probes used by prerequisite checks."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
//! Credential lookup. Values are addressed as `section.option`; the
//! environment variable `SECTION_OPTION` always wins over the configuration
//! file so operators can rotate secrets without editing config.

use std::fmt;

use indexmap::IndexMap;
use tracing::debug;
use url::Url;

/// Boolean/valued presence checks over named credentials.
pub trait CredentialProbe: Send + Sync + fmt::Debug {
    /// Resolve a raw credential value. Blank values are reported as absent.
    fn lookup(&self, section: &str, option: &str) -> Option<String>;

    /// Resolve a dotted `section.option` key.
    fn lookup_key(&self, key: &str) -> Option<String> {
        let (section, option) = split_key(key)?;
        self.lookup(section, option)
    }

    /// Whether the dotted key resolves to a non-blank value.
    fn is_present(&self, key: &str) -> bool {
        self.lookup_key(key).is_some()
    }
}

/// Split a `section.option` key. Both halves must be non-empty.
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    let (section, option) = key.trim().split_once('.')?;
    if section.is_empty() || option.is_empty() {
        return None;
    }
    Some((section, option))
}

/// Environment variable consulted for a credential, e.g. `GITHUB_TOKEN`.
pub fn env_var_name(section: &str, option: &str) -> String {
    format!("{}_{}", section.to_uppercase(), option.to_uppercase())
}

/// Credential store layering environment variables over file values.
#[derive(Debug, Clone)]
pub struct EnvCredentialStore {
    file_values: IndexMap<String, IndexMap<String, String>>,
    consult_env: bool,
}

impl EnvCredentialStore {
    /// Build a store from the `[credentials]` configuration tables.
    pub fn new(file_values: IndexMap<String, IndexMap<String, String>>) -> Self {
        Self {
            file_values,
            consult_env: true,
        }
    }

    /// Build a store that ignores the process environment.
    pub fn file_only(file_values: IndexMap<String, IndexMap<String, String>>) -> Self {
        Self {
            file_values,
            consult_env: false,
        }
    }

    /// Insert or replace a file-backed value.
    pub fn with_value(
        mut self,
        section: impl Into<String>,
        option: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.file_values
            .entry(section.into())
            .or_default()
            .insert(option.into(), value.into());
        self
    }

    /// Interpret a credential as a boolean flag (`true/1/t/y/yes`).
    pub fn lookup_bool(&self, key: &str) -> Option<bool> {
        self.lookup_key(key).map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "t" | "y" | "yes"
            )
        })
    }

    /// Interpret a credential as an integer; unparsable values are absent.
    pub fn lookup_int(&self, key: &str) -> Option<i64> {
        let raw = self.lookup_key(key)?;
        match raw.trim().parse::<i64>() {
            Ok(value) => Some(value),
            Err(_) => {
                debug!(key, "credential value is not a valid integer");
                None
            }
        }
    }
}

impl Default for EnvCredentialStore {
    fn default() -> Self {
        Self::new(IndexMap::new())
    }
}

impl CredentialProbe for EnvCredentialStore {
    fn lookup(&self, section: &str, option: &str) -> Option<String> {
        if self.consult_env {
            if let Ok(value) = std::env::var(env_var_name(section, option)) {
                if !value.trim().is_empty() {
                    return Some(value);
                }
            }
        }
        self.file_values
            .get(section)
            .and_then(|options| options.get(option))
            .filter(|value| !value.trim().is_empty())
            .cloned()
    }
}

/// Parsed `scheme://[user:pass@]host:port` endpoint credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Parse an endpoint-style credential (e.g. a proxy URL).
///
/// Returns `None` unless scheme, host and an explicit port are all present.
pub fn parse_endpoint(raw: &str) -> Option<ServiceEndpoint> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;
    let port = url.port()?;
    let username = Some(url.username())
        .filter(|name| !name.is_empty())
        .map(str::to_owned);
    Some(ServiceEndpoint {
        server: format!("{}://{}:{}", url.scheme(), host, port),
        username,
        password: url.password().map(str::to_owned),
    })
}
