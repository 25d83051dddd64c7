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
use crate::models::{
    Cluster, ClusterFilter, CreateCluster, EmailUser, SetClusterMembers, UpdateCluster,
};
use crate::repository::MailerStore;
use crate::transport::TransportFactory;

pub fn router<S, F>() -> Router<SharedState<S, F>>
where
    S: MailerStore + 'static,
    F: TransportFactory + 'static,
{
    Router::new()
        .route("/", get(list_clusters).post(create_cluster))
        .route(
            "/{id}",
            get(get_cluster).put(update_cluster).delete(delete_cluster),
        )
        .route("/{id}/members", get(list_members).put(set_members))
}

/// List clusters
#[utoipa::path(
    get,
    path = "/api/clusters",
    tag = "clusters",
    params(ClusterFilter),
    responses(
        (status = 200, description = "List of clusters", body = Vec<Cluster>),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
pub(crate) async fn list_clusters<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Query(filter): Query<ClusterFilter>,
) -> MailerResult<Json<Vec<Cluster>>> {
    let clusters = state.service.list_clusters(filter).await?;
    Ok(Json(clusters))
}

/// Create a cluster, optionally with initial members
#[utoipa::path(
    post,
    path = "/api/clusters",
    tag = "clusters",
    request_body = CreateCluster,
    responses(
        (status = 201, description = "Cluster created", body = Cluster),
        (status = 400, description = "Invalid input or unknown members", body = ErrorResponse)
    )
)]
pub(crate) async fn create_cluster<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Json(input): Json<CreateCluster>,
) -> MailerResult<impl IntoResponse> {
    let cluster = state.service.create_cluster(input).await?;
    Ok((StatusCode::CREATED, Json(cluster)))
}

/// Get a cluster by ID
#[utoipa::path(
    get,
    path = "/api/clusters/{id}",
    tag = "clusters",
    params(("id" = Uuid, Path, description = "Cluster ID")),
    responses(
        (status = 200, description = "Cluster found", body = Cluster),
        (status = 404, description = "Cluster not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_cluster<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
) -> MailerResult<Json<Cluster>> {
    let cluster = state.service.get_cluster(id).await?;
    Ok(Json(cluster))
}

/// Rename a cluster
#[utoipa::path(
    put,
    path = "/api/clusters/{id}",
    tag = "clusters",
    params(("id" = Uuid, Path, description = "Cluster ID")),
    request_body = UpdateCluster,
    responses(
        (status = 200, description = "Cluster updated", body = Cluster),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Cluster not found", body = ErrorResponse)
    )
)]
pub(crate) async fn update_cluster<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateCluster>,
) -> MailerResult<Json<Cluster>> {
    let cluster = state.service.update_cluster(id, input).await?;
    Ok(Json(cluster))
}

/// Delete a cluster and the scheduled sends that target it
#[utoipa::path(
    delete,
    path = "/api/clusters/{id}",
    tag = "clusters",
    params(("id" = Uuid, Path, description = "Cluster ID")),
    responses(
        (status = 204, description = "Cluster deleted"),
        (status = 404, description = "Cluster not found", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_cluster<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
) -> MailerResult<StatusCode> {
    state.service.delete_cluster(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List cluster members in ascending id order
#[utoipa::path(
    get,
    path = "/api/clusters/{id}/members",
    tag = "clusters",
    params(("id" = Uuid, Path, description = "Cluster ID")),
    responses(
        (status = 200, description = "Cluster members", body = Vec<EmailUser>),
        (status = 404, description = "Cluster not found", body = ErrorResponse)
    )
)]
pub(crate) async fn list_members<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
) -> MailerResult<Json<Vec<EmailUser>>> {
    let members = state.service.list_cluster_members(id).await?;
    Ok(Json(members))
}

/// Replace the member set of a cluster
#[utoipa::path(
    put,
    path = "/api/clusters/{id}/members",
    tag = "clusters",
    params(("id" = Uuid, Path, description = "Cluster ID")),
    request_body = SetClusterMembers,
    responses(
        (status = 200, description = "Members replaced", body = Cluster),
        (status = 400, description = "Unknown members", body = ErrorResponse),
        (status = 404, description = "Cluster not found", body = ErrorResponse)
    )
)]
pub(crate) async fn set_members<S: MailerStore, F: TransportFactory>(
    State(state): State<SharedState<S, F>>,
    Path(id): Path<Uuid>,
    Json(input): Json<SetClusterMembers>,
) -> MailerResult<Json<Cluster>> {
    let cluster = state
        .service
        .set_cluster_members(id, input.member_ids)
        .await?;
    Ok(Json(cluster))
}
