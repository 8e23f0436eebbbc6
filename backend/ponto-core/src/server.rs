// src/server.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::aggregate::CompetenceAggregate;
use crate::competence::Competence;
use crate::engine::{PayrollEngine, ReconciliationReport};
use crate::error::AppError;
use crate::hour_bank::HourBankStatement;
use crate::payroll::EventDefinition;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PayrollEngine>,
    /// Cancelled on shutdown; reconciliation runs use child tokens.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(engine: Arc<PayrollEngine>) -> Self {
        Self {
            engine,
            shutdown: CancellationToken::new(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let competence_routes = Router::new()
        .route("/{competence}/aggregates", get(handle_aggregates))
        .route(
            "/{competence}/employees/{employee_id}/aggregate",
            get(handle_employee_aggregate),
        )
        .route(
            "/{competence}/employees/{employee_id}/hour-bank",
            get(handle_hour_bank),
        )
        .route("/{competence}/reconcile", post(handle_reconcile));
    let api_routes = Router::new()
        .nest("/competences", competence_routes)
        .route("/event-catalog/ensure", post(handle_ensure_catalog));

    Router::new()
        .nest("/api", api_routes)
        .route("/status", get(handle_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// --- Responses ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub event_codes: Vec<EventDefinition>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    pub summary: String,
    #[serde(flatten)]
    pub report: ReconciliationReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureCatalogResponse {
    pub created: Vec<EventDefinition>,
}

// --- Handlers ---

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        event_codes: state.engine.event_codes().definitions(),
    })
}

async fn handle_aggregates(
    State(state): State<AppState>,
    Path(competence): Path<String>,
) -> Result<Json<Vec<CompetenceAggregate>>, AppError> {
    let competence: Competence = competence.parse()?;
    info!("Handling aggregates request for {}", competence);
    Ok(Json(state.engine.aggregate_competence(competence).await?))
}

async fn handle_employee_aggregate(
    State(state): State<AppState>,
    Path((competence, employee_id)): Path<(String, String)>,
) -> Result<Json<CompetenceAggregate>, AppError> {
    let competence: Competence = competence.parse()?;
    state
        .engine
        .aggregate_employee(competence, &employee_id)
        .await?
        .map(Json)
        .ok_or(AppError::EmployeeNotFound(employee_id))
}

async fn handle_hour_bank(
    State(state): State<AppState>,
    Path((competence, employee_id)): Path<(String, String)>,
) -> Result<Json<HourBankStatement>, AppError> {
    let competence: Competence = competence.parse()?;
    state
        .engine
        .hour_bank(&employee_id, competence)
        .await?
        .map(Json)
        .ok_or(AppError::EmployeeNotFound(employee_id))
}

async fn handle_reconcile(
    State(state): State<AppState>,
    Path(competence): Path<String>,
) -> Result<Json<ReconcileResponse>, AppError> {
    let competence: Competence = competence.parse()?;
    info!("Handling reconcile request for {}", competence);
    let cancel = state.shutdown.child_token();
    let report = state.engine.reconcile_competence(competence, &cancel).await?;
    Ok(Json(ReconcileResponse {
        summary: report.summary(),
        report,
    }))
}

async fn handle_ensure_catalog(
    State(state): State<AppState>,
) -> Result<Json<EnsureCatalogResponse>, AppError> {
    let created = state.engine.ensure_event_catalog().await?;
    Ok(Json(EnsureCatalogResponse { created }))
}
