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
use crate::models::{CreateEmailUser, EmailUser, UpdateEmailUser, UserFilter};
use crate::repository::MailerStore;
use crate::transport::TransportFactory;

pub fn router<S, F>() -> Router<SharedState<S, F>>
where
    S: MailerStore + 'static,
    F: TransportFactory + 'static,
{
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

/// List recipients
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    params(UserFilter),
    responses(
        (status = 200, description = "List of recipients", body = Vec<EmailUser>),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
pub(crate) async fn list_users<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Query(filter): Query<UserFilter>,
) -> MailerResult<Json<Vec<EmailUser>>> {
    let users = state.service.list_users(filter).await?;
    Ok(Json(users))
}

/// Create a recipient
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = CreateEmailUser,
    responses(
        (status = 201, description = "Recipient created", body = EmailUser),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Email address already registered", body = ErrorResponse)
    )
)]
pub(crate) async fn create_user<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Json(input): Json<CreateEmailUser>,
) -> MailerResult<impl IntoResponse> {
    let user = state.service.create_user(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get a recipient by ID
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "Recipient ID")),
    responses(
        (status = 200, description = "Recipient found", body = EmailUser),
        (status = 404, description = "Recipient not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_user<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
) -> MailerResult<Json<EmailUser>> {
    let user = state.service.get_user(id).await?;
    Ok(Json(user))
}

/// Update a recipient
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "Recipient ID")),
    request_body = UpdateEmailUser,
    responses(
        (status = 200, description = "Recipient updated", body = EmailUser),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Recipient not found", body = ErrorResponse),
        (status = 409, description = "Email address already registered", body = ErrorResponse)
    )
)]
pub(crate) async fn update_user<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateEmailUser>,
) -> MailerResult<Json<EmailUser>> {
    let user = state.service.update_user(id, input).await?;
    Ok(Json(user))
}

/// Delete a recipient, removing it from clusters and deleting sends that target it
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "Recipient ID")),
    responses(
        (status = 204, description = "Recipient deleted"),
        (status = 404, description = "Recipient not found", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_user<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
) -> MailerResult<StatusCode> {
    state.service.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
