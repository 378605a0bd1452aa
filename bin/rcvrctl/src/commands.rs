//! ---
//! rcvr_section: "06-operator-interfaces"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Subcommand implementations for the operator CLI."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use anyhow::Result;
use rcvr_catalog::RecoveryContext;
use rcvr_health::{check_from_config, probe_once};
use rcvr_ledger::Incident;
use rcvr_orchestrator::{Disposition, OrchestratorError, TriggerReport};
use serde::Serialize;
use serde_json::json;

use crate::remote::Resolved;
use crate::{Runtime, EXIT_FAILED, EXIT_OK, EXIT_UNKNOWN};

fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn status(runtime: &Runtime) -> Result<u8> {
    let report = runtime.orchestrator.status();
    if runtime.json {
        emit_json(&report)?;
        return Ok(EXIT_OK);
    }
    let rate = report
        .recent_success_rate
        .map(|rate| format!("{:.0}%", rate * 100.0))
        .unwrap_or_else(|| String::from("n/a"));
    println!("Active incidents: {}", report.active_incidents);
    println!("History entries:  {}", report.history_len);
    println!("Success rate:     {} (last {})", rate, report.recent_window);
    println!("Procedures:       {}", report.catalog_size);
    Ok(EXIT_OK)
}

fn daemon_unreachable(base: &str) {
    eprintln!("note: no daemon answering at {base}; working on the ledger in this process");
}

/// Prefer the daemon, which owns the in-flight set; without one, run here.
async fn trigger(runtime: &Runtime, procedure_id: &str, context: RecoveryContext) -> Result<TriggerReport> {
    if let Some(daemon) = &runtime.daemon {
        if let Some(report) = daemon.recover(procedure_id, &context).await? {
            return Ok(report);
        }
        daemon_unreachable(daemon.base());
    }
    Ok(runtime.orchestrator.trigger(procedure_id, context).await)
}

pub(crate) async fn recover(runtime: &Runtime, procedure_id: &str, context: RecoveryContext) -> Result<u8> {
    let report = trigger(runtime, procedure_id, context).await?;
    if runtime.json {
        emit_json(&report)?;
    } else {
        let verdict = if report.success() { "SUCCESS" } else { "FAILED" };
        println!("{verdict}: {}", report.message());
        if let Some(id) = &report.incident_id {
            println!("Incident: {id}");
        }
        for step in &report.result.steps {
            let mark = if step.success { "ok" } else { "FAIL" };
            println!("  [{mark}] {} {}", step.name, step.message);
        }
    }
    Ok(match report.disposition {
        Disposition::Completed => EXIT_OK,
        Disposition::UnknownProcedure => EXIT_UNKNOWN,
        _ => EXIT_FAILED,
    })
}

pub(crate) fn test(runtime: &Runtime, procedure_id: &str) -> Result<u8> {
    let report = match runtime.orchestrator.test_procedure(procedure_id) {
        Ok(report) => report,
        Err(OrchestratorError::Catalog(err)) => {
            eprintln!("{err}");
            return Ok(EXIT_UNKNOWN);
        }
        Err(err) => return Err(err.into()),
    };
    if runtime.json {
        emit_json(&report)?;
    } else if report.met {
        println!("{}: all prerequisites met", report.procedure_id);
    } else {
        println!(
            "{}: missing prerequisites: {}",
            report.procedure_id,
            report.missing.join(", ")
        );
    }
    Ok(if report.met { EXIT_OK } else { EXIT_FAILED })
}

fn incident_line(incident: &Incident) -> String {
    let duration = incident
        .duration_ms
        .map(|ms| format!("{ms}ms"))
        .unwrap_or_else(|| String::from("-"));
    let message = incident
        .result
        .as_ref()
        .map(|result| result.message.as_str())
        .unwrap_or("");
    format!(
        "{:<28} {:<10} {:<9} {:<24} {:>8} {}",
        incident.id,
        incident.status.as_str(),
        incident.severity.as_str(),
        incident.procedure_id.as_deref().unwrap_or("(manual)"),
        duration,
        message
    )
}

pub(crate) fn incidents(runtime: &Runtime, limit: usize) -> Result<u8> {
    let active = runtime.orchestrator.active_incidents();
    let history: Vec<Incident> = runtime.orchestrator.history().into_iter().take(limit).collect();
    if runtime.json {
        emit_json(&json!({ "active": active, "history": history }))?;
        return Ok(EXIT_OK);
    }
    println!("Active ({}):", active.len());
    for incident in &active {
        println!("  {}", incident_line(incident));
    }
    println!("History (newest first, up to {limit}):");
    for incident in &history {
        println!("  {}", incident_line(incident));
    }
    Ok(EXIT_OK)
}

pub(crate) fn procedures(runtime: &Runtime) -> Result<u8> {
    let procedures = runtime.orchestrator.catalog().list();
    if runtime.json {
        let listed: Vec<_> = procedures.iter().map(|procedure| procedure.as_ref()).collect();
        emit_json(&listed)?;
        return Ok(EXIT_OK);
    }
    for procedure in procedures {
        let prerequisites: Vec<&str> = procedure.prerequisites.iter().map(String::as_str).collect();
        println!(
            "{:<22} {:<9} auto={:<5} prerequisites=[{}]  {}",
            procedure.id,
            procedure.severity.as_str(),
            procedure.auto_execute,
            prerequisites.join(", "),
            procedure.description
        );
    }
    Ok(EXIT_OK)
}

fn local_resolve(runtime: &Runtime, incident_id: &str, success: bool, message: &str) -> Result<Resolved> {
    match runtime.orchestrator.resolve_incident(incident_id, success, message) {
        Ok(incident) => Ok(Resolved::Closed(incident)),
        Err(err @ OrchestratorError::IncidentNotFound(_)) => Ok(Resolved::NotFound(err.to_string())),
        Err(err @ OrchestratorError::IncidentInFlight { .. }) => Ok(Resolved::Refused(err.to_string())),
        Err(err) => Err(err.into()),
    }
}

pub(crate) async fn resolve(runtime: &Runtime, incident_id: &str, success: bool, message: &str) -> Result<u8> {
    let mut outcome = None;
    if let Some(daemon) = &runtime.daemon {
        outcome = daemon.resolve(incident_id, success, message).await?;
        if outcome.is_none() {
            daemon_unreachable(daemon.base());
        }
    }
    let outcome = match outcome {
        Some(outcome) => outcome,
        None => local_resolve(runtime, incident_id, success, message)?,
    };
    match outcome {
        Resolved::Closed(incident) => {
            if runtime.json {
                emit_json(&incident)?;
            } else {
                println!("{} closed as {}", incident.id, incident.status);
            }
            Ok(EXIT_OK)
        }
        Resolved::NotFound(reason) => {
            eprintln!("{reason}");
            Ok(EXIT_UNKNOWN)
        }
        Resolved::Refused(reason) => {
            eprintln!("{reason}");
            Ok(EXIT_FAILED)
        }
    }
}

/// Probe a configured health check once. The unhealthy handler is not run.
pub(crate) async fn check(runtime: &Runtime, check_id: &str) -> Result<u8> {
    let Some(config) = runtime.config.health_check(check_id) else {
        eprintln!("unknown health check: {check_id}");
        return Ok(EXIT_UNKNOWN);
    };
    let check = check_from_config(config, &runtime.orchestrator, runtime.credentials.clone())?;
    let verdict = probe_once(&check).await;
    if runtime.json {
        emit_json(&verdict)?;
    } else {
        let label = if verdict.healthy { "healthy" } else { "unhealthy" };
        println!("{check_id}: {label} {}", verdict.details);
    }
    Ok(if verdict.healthy { EXIT_OK } else { EXIT_FAILED })
}
