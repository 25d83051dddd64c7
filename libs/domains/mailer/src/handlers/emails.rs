use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use super::SharedState;
use crate::error::{ErrorResponse, MailerResult};
use crate::models::{Email, EmailFilter};
use crate::repository::MailerStore;
use crate::transport::TransportFactory;

pub fn router<S, F>() -> Router<SharedState<S, F>>
where
    S: MailerStore + 'static,
    F: TransportFactory + 'static,
{
    Router::new()
        .route("/", get(list_emails))
        .route("/{id}", get(get_email))
}

/// List delivery log records, newest first
#[utoipa::path(
    get,
    path = "/api/emails",
    tag = "emails",
    params(EmailFilter),
    responses(
        (status = 200, description = "Delivery log records", body = Vec<Email>),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
pub(crate) async fn list_emails<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Query(filter): Query<EmailFilter>,
) -> MailerResult<Json<Vec<Email>>> {
    let emails = state.service.list_email_logs(filter).await?;
    Ok(Json(emails))
}

#[utoipa::path(
    get,
    path = "/api/emails/{id}",
    tag = "emails",
    params(("id" = Uuid, Path, description = "Email ID")),
    responses(
        (status = 200, description = "Delivery log record", body = Email),
        (status = 404, description = "Email not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_email<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
) -> MailerResult<Json<Email>> {
    let email = state.service.get_email_log(id).await?;
    Ok(Json(email))
}
