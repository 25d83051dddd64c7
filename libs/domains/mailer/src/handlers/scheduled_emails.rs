use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::SharedState;
use crate::dispatch::DispatchReport;
use crate::error::{ErrorResponse, MailerResult};
use crate::models::{
    CreateScheduledEmail, ScheduledEmail, ScheduledEmailFilter, UpdateScheduledEmail,
};
use crate::repository::MailerStore;
use crate::transport::TransportFactory;

/// Scheduled sends to dispatch, processed in the given order; repeated ids
/// are attempted once
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DispatchRequest {
    pub ids: Vec<Uuid>,
}

pub fn router<S, F>() -> Router<SharedState<S, F>>
where
    S: MailerStore + 'static,
    F: TransportFactory + 'static,
{
    Router::new()
        .route("/", get(list_scheduled_emails).post(create_scheduled_email))
        .route("/dispatch", post(dispatch))
        .route("/dispatch-due", post(dispatch_due))
        .route(
            "/{id}",
            get(get_scheduled_email)
                .put(update_scheduled_email)
                .delete(delete_scheduled_email),
        )
}

/// List scheduled sends, earliest first
#[utoipa::path(
    get,
    path = "/api/scheduled-emails",
    tag = "scheduled-emails",
    params(ScheduledEmailFilter),
    responses(
        (status = 200, description = "List of scheduled sends", body = Vec<ScheduledEmail>),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
pub(crate) async fn list_scheduled_emails<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Query(filter): Query<ScheduledEmailFilter>,
) -> MailerResult<Json<Vec<ScheduledEmail>>> {
    let scheduled = state.service.list_scheduled_emails(filter).await?;
    Ok(Json(scheduled))
}

/// Schedule a template for a user or a cluster
#[utoipa::path(
    post,
    path = "/api/scheduled-emails",
    tag = "scheduled-emails",
    request_body = CreateScheduledEmail,
    responses(
        (status = 201, description = "Scheduled send created", body = ScheduledEmail),
        (status = 400, description = "Invalid input or unknown reference", body = ErrorResponse)
    )
)]
pub(crate) async fn create_scheduled_email<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Json(input): Json<CreateScheduledEmail>,
) -> MailerResult<impl IntoResponse> {
    let scheduled = state.service.create_scheduled_email(input).await?;
    Ok((StatusCode::CREATED, Json(scheduled)))
}

/// Get a scheduled send by ID
#[utoipa::path(
    get,
    path = "/api/scheduled-emails/{id}",
    tag = "scheduled-emails",
    params(("id" = Uuid, Path, description = "Scheduled send ID")),
    responses(
        (status = 200, description = "Scheduled send found", body = ScheduledEmail),
        (status = 404, description = "Scheduled send not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_scheduled_email<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
) -> MailerResult<Json<ScheduledEmail>> {
    let scheduled = state.service.get_scheduled_email(id).await?;
    Ok(Json(scheduled))
}

/// Update a scheduled send. `is_sent` cannot be changed here.
#[utoipa::path(
    put,
    path = "/api/scheduled-emails/{id}",
    tag = "scheduled-emails",
    params(("id" = Uuid, Path, description = "Scheduled send ID")),
    request_body = UpdateScheduledEmail,
    responses(
        (status = 200, description = "Scheduled send updated", body = ScheduledEmail),
        (status = 400, description = "Invalid input or unknown reference", body = ErrorResponse),
        (status = 404, description = "Scheduled send not found", body = ErrorResponse)
    )
)]
pub(crate) async fn update_scheduled_email<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateScheduledEmail>,
) -> MailerResult<Json<ScheduledEmail>> {
    let scheduled = state.service.update_scheduled_email(id, input).await?;
    Ok(Json(scheduled))
}

/// Delete a scheduled send
#[utoipa::path(
    delete,
    path = "/api/scheduled-emails/{id}",
    tag = "scheduled-emails",
    params(("id" = Uuid, Path, description = "Scheduled send ID")),
    responses(
        (status = 204, description = "Scheduled send deleted"),
        (status = 404, description = "Scheduled send not found", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_scheduled_email<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
) -> MailerResult<StatusCode> {
    state.service.delete_scheduled_email(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Dispatch the selected scheduled sends now.
///
/// Failures are reported per send in the body; the request itself succeeds.
#[utoipa::path(
    post,
    path = "/api/scheduled-emails/dispatch",
    tag = "scheduled-emails",
    request_body = DispatchRequest,
    responses(
        (status = 200, description = "Dispatch report", body = DispatchReport)
    )
)]
pub(crate) async fn dispatch<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Json(request): Json<DispatchRequest>,
) -> Json<DispatchReport> {
    Json(state.dispatcher.dispatch(&request.ids).await)
}

/// Dispatch every unsent send whose scheduled time has passed
#[utoipa::path(
    post,
    path = "/api/scheduled-emails/dispatch-due",
    tag = "scheduled-emails",
    responses(
        (status = 200, description = "Dispatch report", body = DispatchReport),
        (status = 500, description = "Due sends could not be listed", body = ErrorResponse)
    )
)]
pub(crate) async fn dispatch_due<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
) -> MailerResult<Json<DispatchReport>> {
    let report = state.dispatcher.dispatch_due(Utc::now()).await?;
    Ok(Json(report))
}
