use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use devcluster_core::coordinator::{ClusterView, RequestWithClusters};
use devcluster_store::{Cluster, Request};

use crate::server::AppState;

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    "OK"
}

#[derive(Debug, Deserialize)]
pub struct CreateRequestBody {
    pub requested_by: String,
    pub count: u32,
    pub zone: String,
    pub delete_in_hours: i64,
    #[serde(default)]
    pub no_subnet: bool,
}

fn internal_error(context: &str, err: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!(error = %err, "{context}");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{context}: {err}"))
}

/// Accept a new batch provisioning request.
pub async fn create_request(
    State(state): State<AppState>,
    Json(body): Json<CreateRequestBody>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let request = state
        .runtime
        .coordinator
        .create_request(
            &body.requested_by,
            body.count,
            &body.zone,
            body.delete_in_hours,
            body.no_subnet,
        )
        .await
        .map_err(|e| internal_error("failed to create request", e))?;

    Ok((StatusCode::CREATED, Json(request)))
}

#[derive(Debug, Serialize)]
pub struct ClusterResponse {
    #[serde(flatten)]
    pub cluster: Cluster,
    pub identity_provider_url: String,
    pub login_url: String,
    pub console_url: Option<String>,
    pub workshop_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RequestResponse {
    #[serde(flatten)]
    pub request: Request,
    pub clusters: Vec<ClusterResponse>,
}

impl From<ClusterView> for ClusterResponse {
    fn from(view: ClusterView) -> Self {
        Self {
            cluster: view.cluster,
            identity_provider_url: view.urls.identity_provider_url,
            login_url: view.urls.login_url,
            console_url: view.urls.console_url,
            workshop_url: view.urls.workshop_url,
        }
    }
}

impl From<RequestWithClusters> for RequestResponse {
    fn from(r: RequestWithClusters) -> Self {
        Self {
            request: r.request,
            clusters: r.clusters.into_iter().map(ClusterResponse::from).collect(),
        }
    }
}

/// Fetch a Request and its Clusters, enriched with bound-user presentation
/// URLs.
pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let result = state
        .runtime
        .coordinator
        .get_request_with_clusters(&id)
        .await
        .map_err(|e| internal_error("failed to load request", e))?;
    Ok(Json(RequestResponse::from(result)))
}

/// Return all non-deleted clusters in a zone, enriched with user info.
pub async fn get_zone_clusters(
    State(state): State<AppState>,
    Path(zone): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let views = state
        .runtime
        .coordinator
        .get_clusters_by_zone(&zone)
        .await
        .map_err(|e| internal_error("failed to list clusters", e))?;
    let responses: Vec<ClusterResponse> = views.into_iter().map(ClusterResponse::from).collect();
    Ok(Json(responses))
}

/// Delete a cluster: removes it upstream, recycles its bound user, marks the
/// local row `Deleted`.
pub async fn delete_cluster(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .runtime
        .coordinator
        .delete_cluster(&id)
        .await
        .map_err(|e| internal_error("failed to delete cluster", e))?;
    Ok(StatusCode::NO_CONTENT)
}
