use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use super::SharedState;
use crate::error::{ErrorResponse, MailerResult};
use crate::models::{CreateSmtpProfile, SmtpProfile, SmtpProfileFilter, UpdateSmtpProfile};
use crate::repository::MailerStore;
use crate::transport::TransportFactory;

pub fn router<S, F>() -> Router<SharedState<S, F>>
where
    S: MailerStore + 'static,
    F: TransportFactory + 'static,
{
    Router::new()
        .route("/", get(list_smtp_profiles).post(create_smtp_profile))
        .route(
            "/{id}",
            get(get_smtp_profile)
                .put(update_smtp_profile)
                .delete(delete_smtp_profile),
        )
}

/// List SMTP profiles. Passwords are never returned.
#[utoipa::path(
    get,
    path = "/api/smtp-profiles",
    tag = "smtp-profiles",
    params(SmtpProfileFilter),
    responses(
        (status = 200, description = "List of SMTP profiles", body = Vec<SmtpProfile>),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
pub(crate) async fn list_smtp_profiles<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Query(filter): Query<SmtpProfileFilter>,
) -> MailerResult<Json<Vec<SmtpProfile>>> {
    let profiles = state.service.list_smtp_profiles(filter).await?;
    Ok(Json(profiles))
}

/// Create an SMTP profile
#[utoipa::path(
    post,
    path = "/api/smtp-profiles",
    tag = "smtp-profiles",
    request_body = CreateSmtpProfile,
    responses(
        (status = 201, description = "SMTP profile created", body = SmtpProfile),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Another profile is already the default", body = ErrorResponse)
    )
)]
pub(crate) async fn create_smtp_profile<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Json(input): Json<CreateSmtpProfile>,
) -> MailerResult<impl IntoResponse> {
    let profile = state.service.create_smtp_profile(input).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Get an SMTP profile by ID
#[utoipa::path(
    get,
    path = "/api/smtp-profiles/{id}",
    tag = "smtp-profiles",
    params(("id" = Uuid, Path, description = "SMTP profile ID")),
    responses(
        (status = 200, description = "SMTP profile found", body = SmtpProfile),
        (status = 404, description = "SMTP profile not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_smtp_profile<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
) -> MailerResult<Json<SmtpProfile>> {
    let profile = state.service.get_smtp_profile(id).await?;
    Ok(Json(profile))
}

/// Update an SMTP profile
#[utoipa::path(
    put,
    path = "/api/smtp-profiles/{id}",
    tag = "smtp-profiles",
    params(("id" = Uuid, Path, description = "SMTP profile ID")),
    request_body = UpdateSmtpProfile,
    responses(
        (status = 200, description = "SMTP profile updated", body = SmtpProfile),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "SMTP profile not found", body = ErrorResponse),
        (status = 409, description = "Another profile is already the default", body = ErrorResponse)
    )
)]
pub(crate) async fn update_smtp_profile<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateSmtpProfile>,
) -> MailerResult<Json<SmtpProfile>> {
    let profile = state.service.update_smtp_profile(id, input).await?;
    Ok(Json(profile))
}

/// Delete an SMTP profile
#[utoipa::path(
    delete,
    path = "/api/smtp-profiles/{id}",
    tag = "smtp-profiles",
    params(("id" = Uuid, Path, description = "SMTP profile ID")),
    responses(
        (status = 204, description = "SMTP profile deleted"),
        (status = 404, description = "SMTP profile not found", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_smtp_profile<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
) -> MailerResult<StatusCode> {
    state.service.delete_smtp_profile(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
