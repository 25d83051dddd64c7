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
use crate::models::{CreateEmailTemplate, EmailTemplate, TemplateFilter, UpdateEmailTemplate};
use crate::repository::MailerStore;
use crate::transport::TransportFactory;

pub fn router<S, F>() -> Router<SharedState<S, F>>
where
    S: MailerStore + 'static,
    F: TransportFactory + 'static,
{
    Router::new()
        .route("/", get(list_templates).post(create_template))
        .route(
            "/{id}",
            get(get_template).put(update_template).delete(delete_template),
        )
}

/// List email templates
#[utoipa::path(
    get,
    path = "/api/templates",
    tag = "templates",
    params(TemplateFilter),
    responses(
        (status = 200, description = "List of templates", body = Vec<EmailTemplate>),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
pub(crate) async fn list_templates<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Query(filter): Query<TemplateFilter>,
) -> MailerResult<Json<Vec<EmailTemplate>>> {
    let templates = state.service.list_templates(filter).await?;
    Ok(Json(templates))
}

/// Create an email template
#[utoipa::path(
    post,
    path = "/api/templates",
    tag = "templates",
    request_body = CreateEmailTemplate,
    responses(
        (status = 201, description = "Template created", body = EmailTemplate),
        (status = 400, description = "Invalid input or template syntax", body = ErrorResponse),
        (status = 409, description = "Name already in use", body = ErrorResponse)
    )
)]
pub(crate) async fn create_template<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Json(input): Json<CreateEmailTemplate>,
) -> MailerResult<impl IntoResponse> {
    let template = state.service.create_template(input).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

/// Get a template by ID
#[utoipa::path(
    get,
    path = "/api/templates/{id}",
    tag = "templates",
    params(("id" = Uuid, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Template found", body = EmailTemplate),
        (status = 404, description = "Template not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_template<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
) -> MailerResult<Json<EmailTemplate>> {
    let template = state.service.get_template(id).await?;
    Ok(Json(template))
}

/// Update a template
#[utoipa::path(
    put,
    path = "/api/templates/{id}",
    tag = "templates",
    params(("id" = Uuid, Path, description = "Template ID")),
    request_body = UpdateEmailTemplate,
    responses(
        (status = 200, description = "Template updated", body = EmailTemplate),
        (status = 400, description = "Invalid input or template syntax", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 409, description = "Name already in use", body = ErrorResponse)
    )
)]
pub(crate) async fn update_template<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateEmailTemplate>,
) -> MailerResult<Json<EmailTemplate>> {
    let template = state.service.update_template(id, input).await?;
    Ok(Json(template))
}

/// Delete a template with its delivery log and scheduled sends
#[utoipa::path(
    delete,
    path = "/api/templates/{id}",
    tag = "templates",
    params(("id" = Uuid, Path, description = "Template ID")),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 404, description = "Template not found", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_template<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
) -> MailerResult<StatusCode> {
    state.service.delete_template(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
