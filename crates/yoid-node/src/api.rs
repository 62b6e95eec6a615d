//! HTTP API server for the YoID node.
//!
//! Domain-event intake, on-demand job runs, schema management, and wallet
//! reads.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use yoid_core::{ActivityCompletion, ErrorClass, Opportunity, Organization, SchemaType, User};
use yoid_credentials::{CredentialError, CredentialView, SchemaDefinition, SchemaRequest};
use yoid_ledger::LedgerError;
use yoid_pipeline::{CredentialFilter, JobKind, PipelineError, RunReport};

use crate::state::{EventReceipt, NodeState};

// --- Response types ---

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub job: JobKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub batches: u32,
    pub deadline_reached: bool,
    pub completed: usize,
    pub failed: usize,
    pub unresolved: usize,
}

impl From<&RunReport> for JobSummary {
    fn from(report: &RunReport) -> Self {
        Self {
            job: report.job,
            started_at: report.started_at,
            finished_at: report.finished_at,
            batches: report.batches,
            deadline_reached: report.deadline_reached,
            completed: report.completed(),
            failed: report.failed(),
            unresolved: report.unresolved(),
        }
    }
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub uptime_secs: u64,
    pub scheduler_busy: bool,
    pub last_runs: Vec<JobSummary>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub class: ErrorClass,
}

#[derive(Deserialize)]
pub struct ActivityCompletedRequest {
    pub completion: ActivityCompletion,
    pub opportunity: Opportunity,
}

#[derive(Deserialize)]
pub struct SchemaQuery {
    #[serde(default, rename = "type")]
    pub schema_type: Option<SchemaType>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: PipelineError) -> ApiError {
    let status = match &err {
        PipelineError::Credential(CredentialError::SchemaNotFound(_))
        | PipelineError::Ledger(LedgerError::Credential(CredentialError::SchemaNotFound(_))) => {
            StatusCode::NOT_FOUND
        }
        PipelineError::Credential(CredentialError::AlreadyExists(_))
        | PipelineError::Ledger(LedgerError::AlreadyExists(_)) => StatusCode::CONFLICT,
        _ => match err.class() {
            ErrorClass::Configuration => StatusCode::BAD_REQUEST,
            ErrorClass::Transient => StatusCode::BAD_GATEWAY,
            ErrorClass::DataInconsistency | ErrorClass::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
    };
    if status.is_server_error() {
        tracing::error!(error = %err, class = %err.class(), "request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            class: err.class(),
        }),
    )
}

fn not_found(what: String) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: what,
            class: ErrorClass::Configuration,
        }),
    )
}

// --- Handlers ---

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

async fn handle_status(State(state): State<Arc<NodeState>>) -> Json<StatusResponse> {
    let last_runs = [JobKind::TenantCreation, JobKind::CredentialIssuance]
        .into_iter()
        .filter_map(|job| state.last_report(job))
        .map(|report| JobSummary::from(&report))
        .collect();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        scheduler_busy: state.scheduler.is_busy(),
        last_runs,
    })
}

async fn handle_user_onboarded(
    State(state): State<Arc<NodeState>>,
    Json(user): Json<User>,
) -> Result<Json<EventReceipt>, ApiError> {
    state.user_onboarded(user).await.map(Json).map_err(api_error)
}

async fn handle_organization_approved(
    State(state): State<Arc<NodeState>>,
    Json(organization): Json<Organization>,
) -> Result<Json<EventReceipt>, ApiError> {
    state
        .organization_approved(organization)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn handle_activity_completed(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<ActivityCompletedRequest>,
) -> Result<Json<EventReceipt>, ApiError> {
    state
        .activity_completed(req.completion, req.opportunity)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn handle_run_tenant_creation(
    State(state): State<Arc<NodeState>>,
) -> Result<Json<RunReport>, ApiError> {
    state
        .run_job(JobKind::TenantCreation)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn handle_run_credential_issuance(
    State(state): State<Arc<NodeState>>,
) -> Result<Json<RunReport>, ApiError> {
    state
        .run_job(JobKind::CredentialIssuance)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn handle_list_schemas(
    State(state): State<Arc<NodeState>>,
    Query(query): Query<SchemaQuery>,
) -> Result<Json<Vec<SchemaDefinition>>, ApiError> {
    state
        .schemas
        .list(query.schema_type)
        .await
        .map(Json)
        .map_err(|e| api_error(e.into()))
}

async fn handle_get_schema(
    State(state): State<Arc<NodeState>>,
    Path(full_name): Path<String>,
) -> Result<Json<SchemaDefinition>, ApiError> {
    state
        .schemas
        .get_by_name(&full_name)
        .await
        .map(Json)
        .map_err(|e| api_error(e.into()))
}

async fn handle_create_schema(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<SchemaRequest>,
) -> Result<(StatusCode, Json<SchemaDefinition>), ApiError> {
    state
        .schemas
        .create(req)
        .await
        .map(|schema| (StatusCode::CREATED, Json(schema)))
        .map_err(|e| api_error(e.into()))
}

async fn handle_update_schema(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<SchemaRequest>,
) -> Result<Json<SchemaDefinition>, ApiError> {
    state
        .schemas
        .update(req)
        .await
        .map(Json)
        .map_err(|e| api_error(e.into()))
}

async fn handle_search_credentials(
    State(state): State<Arc<NodeState>>,
    Path(user_id): Path<Uuid>,
    Query(filter): Query<CredentialFilter>,
) -> Result<Json<Vec<CredentialView>>, ApiError> {
    state
        .wallet
        .search_user_credentials(user_id, &filter)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn handle_get_credential(
    State(state): State<Arc<NodeState>>,
    Path((user_id, credential_id)): Path<(Uuid, String)>,
) -> Result<Json<CredentialView>, ApiError> {
    match state
        .wallet
        .get_credential_by_id(user_id, &credential_id)
        .await
        .map_err(api_error)?
    {
        Some(view) => Ok(Json(view)),
        None => Err(not_found(format!("credential not found: {credential_id}"))),
    }
}

// --- Server ---

pub fn build_router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/events/user-onboarded", post(handle_user_onboarded))
        .route(
            "/events/organization-approved",
            post(handle_organization_approved),
        )
        .route("/events/activity-completed", post(handle_activity_completed))
        .route("/jobs/tenant-creation", post(handle_run_tenant_creation))
        .route(
            "/jobs/credential-issuance",
            post(handle_run_credential_issuance),
        )
        .route(
            "/schemas",
            get(handle_list_schemas)
                .post(handle_create_schema)
                .put(handle_update_schema),
        )
        .route("/schemas/{full_name}", get(handle_get_schema))
        .route("/users/{id}/credentials", get(handle_search_credentials))
        .route(
            "/users/{id}/credentials/{credential_id}",
            get(handle_get_credential),
        )
        .with_state(state)
}

pub async fn start_api_server(
    listen_addr: SocketAddr,
    state: Arc<NodeState>,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use yoid_core::CoreError;
    use yoid_provider::ProviderError;

    #[test]
    fn test_error_status_mapping() {
        let (status, _) = api_error(CredentialError::SchemaNotFound("YoID|X".into()).into());
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = api_error(CredentialError::AlreadyExists("YoID|X".into()).into());
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = api_error(CoreError::ValidationError("bad".into()).into());
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = api_error(ProviderError::Unavailable("down".into()).into());
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.class, ErrorClass::Transient);

        let (status, _) =
            api_error(CredentialError::DataInconsistency("leaked attribute".into()).into());
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_job_summary_counts() {
        let mut report = RunReport::start(JobKind::CredentialIssuance);
        report.finish();
        let summary = JobSummary::from(&report);
        assert_eq!(summary.job, JobKind::CredentialIssuance);
        assert_eq!(summary.completed, 0);
        assert!(summary.finished_at.is_some());
    }
}
