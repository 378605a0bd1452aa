//! ---
//! rcvr_section: "02-orchestration"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Named prerequisite predicates gating procedure execution."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use rcvr_common::{CredentialProbe, PrerequisiteConfig};
use tracing::debug;

/// A boolean capability check.
pub trait Prerequisite: Send + Sync + fmt::Debug {
    fn is_met(&self) -> bool;
}

/// Satisfied when a `section.option` credential resolves to a non-blank value.
#[derive(Debug, Clone)]
pub struct CredentialPrerequisite {
    key: String,
    probe: Arc<dyn CredentialProbe>,
}

impl CredentialPrerequisite {
    pub fn new(key: impl Into<String>, probe: Arc<dyn CredentialProbe>) -> Self {
        Self {
            key: key.into(),
            probe,
        }
    }
}

impl Prerequisite for CredentialPrerequisite {
    fn is_met(&self) -> bool {
        self.probe.is_present(&self.key)
    }
}

/// Satisfied when a path exists and, optionally, is writable.
#[derive(Debug, Clone)]
pub struct PathPrerequisite {
    path: PathBuf,
    writable: bool,
}

impl PathPrerequisite {
    pub fn new(path: impl Into<PathBuf>, writable: bool) -> Self {
        Self {
            path: path.into(),
            writable,
        }
    }
}

impl Prerequisite for PathPrerequisite {
    fn is_met(&self) -> bool {
        path_available(&self.path, self.writable)
    }
}

/// Whether `path` exists and, when `writable` is requested, whether this
/// process can actually create a file in it (or open it for writing, for a
/// regular file).
pub fn path_available(path: &Path, writable: bool) -> bool {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "path unavailable");
            return false;
        }
    };
    if !writable {
        return true;
    }
    let attempt = if metadata.is_dir() {
        tempfile::NamedTempFile::new_in(path).map(drop)
    } else {
        std::fs::OpenOptions::new().append(true).open(path).map(drop)
    };
    match attempt {
        Ok(()) => true,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "path not writable");
            false
        }
    }
}

/// Adapts a closure into a [`Prerequisite`].
pub struct FnPrerequisite<F>(pub F);

impl<F> fmt::Debug for FnPrerequisite<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnPrerequisite")
    }
}

impl<F> Prerequisite for FnPrerequisite<F>
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_met(&self) -> bool {
        (self.0)()
    }
}

/// Maps prerequisite tokens to predicates. Tokens with no registered
/// predicate are treated as unmet.
#[derive(Debug, Clone, Default)]
pub struct PrerequisiteRegistry {
    predicates: IndexMap<String, Arc<dyn Prerequisite>>,
}

impl PrerequisiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry declared under `[prerequisites]`.
    pub fn from_config(
        definitions: &IndexMap<String, PrerequisiteConfig>,
        probe: Arc<dyn CredentialProbe>,
    ) -> Self {
        let mut registry = Self::new();
        for (token, definition) in definitions {
            match definition {
                PrerequisiteConfig::Credential { credential } => registry.register(
                    token.clone(),
                    CredentialPrerequisite::new(credential.clone(), probe.clone()),
                ),
                PrerequisiteConfig::Path { path, writable } => {
                    registry.register(token.clone(), PathPrerequisite::new(path.clone(), *writable))
                }
            }
        }
        registry
    }

    /// Register or replace the predicate for `token`.
    pub fn register(&mut self, token: impl Into<String>, predicate: impl Prerequisite + 'static) {
        self.predicates.insert(token.into(), Arc::new(predicate));
    }

    pub fn with(mut self, token: impl Into<String>, predicate: impl Prerequisite + 'static) -> Self {
        self.register(token, predicate);
        self
    }

    pub fn contains(&self, token: &str) -> bool {
        self.predicates.contains_key(token)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.predicates.keys().map(String::as_str)
    }

    /// Evaluate a single token.
    pub fn evaluate(&self, token: &str) -> bool {
        match self.predicates.get(token) {
            Some(predicate) => predicate.is_met(),
            None => {
                debug!(token, "no predicate registered for prerequisite");
                false
            }
        }
    }

    /// Tokens from `required` that are not met, in the order given.
    pub fn missing<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        required
            .into_iter()
            .filter(|token| !self.evaluate(token))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcvr_common::EnvCredentialStore;
    use tempfile::tempdir;

    #[test]
    fn unknown_tokens_are_unmet() {
        let registry = PrerequisiteRegistry::new().with("always", FnPrerequisite(|| true));
        let required = vec!["always".to_string(), "mystery".to_string()];
        assert_eq!(registry.missing(&required), vec!["mystery".to_string()]);
    }

    #[test]
    fn credential_prerequisites_follow_the_store() {
        let store = EnvCredentialStore::file_only(IndexMap::new()).with_value("github", "token", "ghp_x");
        let mut definitions = IndexMap::new();
        definitions.insert(
            "github_access".to_string(),
            PrerequisiteConfig::Credential {
                credential: "github.token".into(),
            },
        );
        definitions.insert(
            "aws_access".to_string(),
            PrerequisiteConfig::Credential {
                credential: "aws.key".into(),
            },
        );
        let registry = PrerequisiteRegistry::from_config(&definitions, Arc::new(store));
        assert!(registry.evaluate("github_access"));
        assert!(!registry.evaluate("aws_access"));
        assert_eq!(registry.tokens().collect::<Vec<_>>(), vec!["github_access", "aws_access"]);
    }

    #[test]
    fn path_prerequisites_check_existence() {
        let dir = tempdir().unwrap();
        assert!(PathPrerequisite::new(dir.path(), true).is_met());
        assert!(!PathPrerequisite::new(dir.path().join("missing"), false).is_met());
    }

    #[test]
    fn writable_is_decided_by_an_actual_write() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("state.json");
        std::fs::write(&file, b"{}").unwrap();
        assert!(path_available(&file, true));
        assert_eq!(std::fs::read(&file).unwrap(), b"{}");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn writable_agrees_with_a_real_write_on_read_only_modes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        // root bypasses the mode bits, other users do not
        let can_write = std::fs::write(locked.join("attempt"), b"x").is_ok();
        let _ = std::fs::remove_file(locked.join("attempt"));
        assert_eq!(path_available(&locked, true), can_write);
        assert!(path_available(&locked, false));

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(path_available(&locked, true));
    }
}
