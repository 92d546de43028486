use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::domain::{
    ContactChannel, EoiPayload, Lead, LeadAttributes, LeadId, TransferDestination,
};
use super::gateways::{ContactGateway, CrmSync};
use super::lifecycle::{LeadLifecycleController, LifecycleError};
use super::report::LeadReporter;
use super::store::{LeadFilter, LeadStore};

type SharedController<S, C, M> = Arc<LeadLifecycleController<S, C, M>>;

/// Router builder exposing the lifecycle operations and the report as JSON endpoints.
pub fn lead_router<S, C, M>(controller: SharedController<S, C, M>) -> Router
where
    S: LeadStore + 'static,
    C: ContactGateway + 'static,
    M: CrmSync + 'static,
{
    Router::new()
        .route("/api/v1/leads", post(create_handler::<S, C, M>))
        .route("/api/v1/leads/report", get(report_handler::<S, C, M>))
        .route("/api/v1/leads/:lead_id", get(lead_handler::<S, C, M>))
        .route(
            "/api/v1/leads/:lead_id/qualify",
            post(qualify_handler::<S, C, M>),
        )
        .route(
            "/api/v1/leads/:lead_id/contact",
            post(contact_handler::<S, C, M>),
        )
        .route("/api/v1/leads/:lead_id/eoi", post(eoi_handler::<S, C, M>))
        .route(
            "/api/v1/leads/:lead_id/transfer",
            post(transfer_handler::<S, C, M>),
        )
        .route(
            "/api/v1/leads/:lead_id/close",
            post(close_handler::<S, C, M>),
        )
        .with_state(controller)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContactBody {
    pub(crate) channel: ContactChannel,
    pub(crate) template: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CloseBody {
    #[serde(default)]
    pub(crate) reason: String,
}

pub(crate) async fn create_handler<S, C, M>(
    State(controller): State<SharedController<S, C, M>>,
    Json(attributes): Json<LeadAttributes>,
) -> Response
where
    S: LeadStore + 'static,
    C: ContactGateway + 'static,
    M: CrmSync + 'static,
{
    off_runtime(move || match controller.generate_lead(attributes) {
        Ok(lead) => (StatusCode::CREATED, Json(lead.status_view())).into_response(),
        Err(err) => error_response(err),
    })
    .await
}

pub(crate) async fn lead_handler<S, C, M>(
    State(controller): State<SharedController<S, C, M>>,
    Path(lead_id): Path<String>,
) -> Response
where
    S: LeadStore + 'static,
    C: ContactGateway + 'static,
    M: CrmSync + 'static,
{
    off_runtime(move || match controller.get_lead(&LeadId(lead_id)) {
        Ok(lead) => (StatusCode::OK, Json(lead)).into_response(),
        Err(err) => error_response(err),
    })
    .await
}

pub(crate) async fn qualify_handler<S, C, M>(
    State(controller): State<SharedController<S, C, M>>,
    Path(lead_id): Path<String>,
) -> Response
where
    S: LeadStore + 'static,
    C: ContactGateway + 'static,
    M: CrmSync + 'static,
{
    off_runtime(move || status_response(controller.qualify_lead(&LeadId(lead_id)))).await
}

pub(crate) async fn contact_handler<S, C, M>(
    State(controller): State<SharedController<S, C, M>>,
    Path(lead_id): Path<String>,
    Json(body): Json<ContactBody>,
) -> Response
where
    S: LeadStore + 'static,
    C: ContactGateway + 'static,
    M: CrmSync + 'static,
{
    off_runtime(move || {
        status_response(controller.send_outbound_contact(
            &LeadId(lead_id),
            body.channel,
            &body.template,
        ))
    })
    .await
}

pub(crate) async fn eoi_handler<S, C, M>(
    State(controller): State<SharedController<S, C, M>>,
    Path(lead_id): Path<String>,
    Json(payload): Json<EoiPayload>,
) -> Response
where
    S: LeadStore + 'static,
    C: ContactGateway + 'static,
    M: CrmSync + 'static,
{
    off_runtime(move || status_response(controller.process_eoi(&LeadId(lead_id), payload))).await
}

pub(crate) async fn transfer_handler<S, C, M>(
    State(controller): State<SharedController<S, C, M>>,
    Path(lead_id): Path<String>,
    Json(destination): Json<TransferDestination>,
) -> Response
where
    S: LeadStore + 'static,
    C: ContactGateway + 'static,
    M: CrmSync + 'static,
{
    off_runtime(move || {
        status_response(controller.transfer_lead(&LeadId(lead_id), destination))
    })
    .await
}

pub(crate) async fn close_handler<S, C, M>(
    State(controller): State<SharedController<S, C, M>>,
    Path(lead_id): Path<String>,
    Json(body): Json<CloseBody>,
) -> Response
where
    S: LeadStore + 'static,
    C: ContactGateway + 'static,
    M: CrmSync + 'static,
{
    off_runtime(move || status_response(controller.close_lead(&LeadId(lead_id), &body.reason)))
        .await
}

pub(crate) async fn report_handler<S, C, M>(
    State(controller): State<SharedController<S, C, M>>,
    Query(filter): Query<LeadFilter>,
) -> Response
where
    S: LeadStore + 'static,
    C: ContactGateway + 'static,
    M: CrmSync + 'static,
{
    let store = controller.store().clone();
    off_runtime(move || match LeadReporter::new(store).report(&filter) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => internal_error(err.to_string()),
    })
    .await
}

/// Store and gateway calls are synchronous; keep them off the async workers.
async fn off_runtime<F>(task: F) -> Response
where
    F: FnOnce() -> Response + Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "lead handler task failed");
            internal_error(format!("lead handler task failed: {err}"))
        }
    }
}

fn internal_error(message: String) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
}

fn status_response(result: Result<Lead, LifecycleError>) -> Response {
    match result {
        Ok(lead) => (StatusCode::OK, Json(lead.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) fn error_response(err: LifecycleError) -> Response {
    let status = match &err {
        LifecycleError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
        LifecycleError::InvalidState { .. } | LifecycleError::StoreConflict(_) => {
            StatusCode::CONFLICT
        }
        LifecycleError::Delivery(_) | LifecycleError::Sync(_) => StatusCode::BAD_GATEWAY,
        LifecycleError::Interrupted { .. } => StatusCode::GATEWAY_TIMEOUT,
        LifecycleError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}
