//! ---
//! rcvr_section: "02-orchestration"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "HTTP control routes that drive the daemon's orchestrator."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
//! Mutating operator commands are served by the process that owns the
//! in-flight set, so duplicate suppression and the in-flight refusal on
//! resolve hold for requests coming from `rcvrctl`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use rcvr_catalog::RecoveryContext;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::orchestrator::{OrchestratorError, RecoveryOrchestrator};
use crate::report::Disposition;

/// Body accepted by `POST /incidents/:incident_id/resolve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Path of the recover route for `procedure_id`.
pub fn recover_path(procedure_id: &str) -> String {
    format!("/recover/{procedure_id}")
}

/// Path of the resolve route for `incident_id`.
pub fn resolve_path(incident_id: &str) -> String {
    format!("/incidents/{incident_id}/resolve")
}

/// Routes:
/// - `POST /recover/:procedure_id`, optional JSON context body, answers a
///   `TriggerReport` (404 for an unknown procedure, 409 when already running).
/// - `POST /incidents/:incident_id/resolve` with a [`ResolveRequest`], answers
///   the closed incident (404 when not open, 409 while its procedure runs).
pub fn control_router(orchestrator: Arc<RecoveryOrchestrator>) -> Router {
    Router::new()
        .route("/recover/:procedure_id", post(post_recover))
        .route("/incidents/:incident_id/resolve", post(post_resolve))
        .with_state(orchestrator)
}

async fn post_recover(
    State(orchestrator): State<Arc<RecoveryOrchestrator>>,
    Path(procedure_id): Path<String>,
    body: Option<Json<RecoveryContext>>,
) -> Response {
    let context = body.map(|Json(context)| context).unwrap_or_default();
    let report = orchestrator.trigger(&procedure_id, context).await;
    let status = match report.disposition {
        Disposition::UnknownProcedure => StatusCode::NOT_FOUND,
        Disposition::DuplicateInFlight => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };
    (status, Json(report)).into_response()
}

async fn post_resolve(
    State(orchestrator): State<Arc<RecoveryOrchestrator>>,
    Path(incident_id): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> Response {
    match orchestrator.resolve_incident(&incident_id, request.success, request.message) {
        Ok(incident) => (StatusCode::OK, Json(incident)).into_response(),
        Err(err @ OrchestratorError::IncidentNotFound(_)) => error_response(StatusCode::NOT_FOUND, &err),
        Err(err @ OrchestratorError::IncidentInFlight { .. }) => error_response(StatusCode::CONFLICT, &err),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err),
    }
}

fn error_response(status: StatusCode, err: &OrchestratorError) -> Response {
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
