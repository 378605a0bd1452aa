//! ---
//! rcvr_section: "07-testing-qa"
//! rcvr_subsection: "integration-tests"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Checks that the shipped configuration wires up a complete runtime."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use rcvr_common::{AppConfig, CredentialProbe, EnvCredentialStore, OrchestratorConfig, UnhealthyAction};
use rcvr_health::{check_from_config, HealthScheduler};
use rcvr_orchestrator::{PrerequisiteRegistry, RecoveryOrchestrator};
use rcvr_procedures::{register_standard_procedures, standard_procedures};

fn read(path: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let full = Path::new(manifest_dir).join("..").join(path);
    fs::read_to_string(&full)
        .unwrap_or_else(|err| panic!("failed to read {}: {}", full.display(), err))
}

fn shipped_config() -> AppConfig {
    read("configs/rcvr.toml")
        .parse()
        .expect("configs/rcvr.toml should parse and validate")
}

#[test]
fn shipped_config_carries_frontmatter() {
    let raw = read("configs/rcvr.toml");
    assert!(raw.starts_with("# ---"), "config should open with a front-matter block");
    assert!(raw.contains("rcvr_section:"));
}

#[test]
fn shipped_config_defines_every_prerequisite_token() {
    let config = shipped_config();
    let store: Arc<dyn CredentialProbe> = Arc::new(EnvCredentialStore::file_only(IndexMap::new()));
    for procedure in standard_procedures(&config.procedures, store).unwrap() {
        for token in &procedure.prerequisites {
            assert!(
                config.prerequisites.contains_key(token),
                "procedure {} needs prerequisite '{}' which the config does not define",
                procedure.id,
                token
            );
        }
    }
}

#[test]
fn shipped_config_triggers_only_standard_procedures() {
    let config = shipped_config();
    let store: Arc<dyn CredentialProbe> = Arc::new(EnvCredentialStore::file_only(IndexMap::new()));
    let ids: Vec<String> = standard_procedures(&config.procedures, store)
        .unwrap()
        .into_iter()
        .map(|procedure| procedure.id)
        .collect();
    for check in &config.health_checks {
        if let UnhealthyAction::Trigger(procedure) = &check.on_unhealthy {
            assert!(
                ids.contains(procedure),
                "health check {} triggers unknown procedure {}",
                check.id,
                procedure
            );
        }
    }
}

#[tokio::test]
async fn shipped_health_checks_build_and_register() {
    let config = shipped_config();
    let store: Arc<dyn CredentialProbe> =
        Arc::new(EnvCredentialStore::file_only(config.credentials.clone()));
    let orchestrator = Arc::new(RecoveryOrchestrator::new(
        OrchestratorConfig::default(),
        PrerequisiteRegistry::from_config(&config.prerequisites, store.clone()),
    ));
    register_standard_procedures(&orchestrator, &config.procedures, store.clone()).unwrap();

    let scheduler = HealthScheduler::new();
    for check_config in &config.health_checks {
        let check = check_from_config(check_config, &orchestrator, store.clone()).unwrap();
        scheduler.register(check).unwrap();
    }
    let registered = scheduler.registered_checks();
    assert_eq!(registered.len(), config.health_checks.len());
    assert!(scheduler.active_checks().is_empty());
}
